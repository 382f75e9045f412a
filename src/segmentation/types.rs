//! # Shared Types for Line Segmentation

use image::GrayImage;

/// Axis-aligned, half-open pixel rectangle: rows `y0..y1`, columns `x0..x1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub y0: u32,
    pub x0: u32,
    pub y1: u32,
    pub x1: u32,
}

impl BoundingBox {
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Widens the box by `margin` on both sides, clamped to `[0, max_width]`.
    pub fn expand_horizontally(&self, margin: u32, max_width: u32) -> BoundingBox {
        BoundingBox {
            y0: self.y0,
            x0: self.x0.saturating_sub(margin),
            y1: self.y1,
            x1: self.x1.saturating_add(margin).min(max_width),
        }
    }
}

/// One connected component of the line mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Component label, starting at 1 in raster-scan order
    pub id: u32,
    pub bbox: BoundingBox,
    /// Foreground pixel count
    pub area: u64,
}

/// A single text line cut from the original page.
#[derive(Debug, Clone)]
pub struct LineCrop {
    /// 1-based position in reading order
    pub index: usize,
    /// Grayscale pixels of the original page inside `bbox`
    pub image: GrayImage,
    /// Crop rectangle after the horizontal margin was applied
    pub bbox: BoundingBox,
    /// Component bounding box before the margin
    pub raw_bbox: BoundingBox,
}

impl LineCrop {
    /// Output file name, `line_001.png` for index 1.
    pub fn file_name(&self) -> String {
        line_file_name(self.index)
    }
}

pub(crate) fn line_file_name(index: usize) -> String {
    format!("line_{:03}.png", index)
}

/// Result of segmenting one page into lines.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    /// Retained lines in reading order
    pub lines: Vec<LineCrop>,
    /// Connected components found after line merging
    pub regions_found: usize,
    /// Components dropped by the height filter
    pub regions_rejected: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
