//! # Shared Types for Image Preprocessing
//!
//! This module contains the raster and result types shared by the
//! preprocessing sub-modules and by line segmentation.

use image::{GrayImage, Luma};

use crate::errors::{PipelineError, PipelineResult};

/// A binary raster where 1 marks ink (foreground) and 0 marks background.
///
/// Pixels are stored row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    /// Creates an all-background mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Builds a mask from a grayscale image; any non-zero pixel is foreground.
    pub fn from_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image.as_raw().iter().map(|&v| u8::from(v != 0)).collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major pixel values (0 or 1).
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = u8::from(foreground);
    }

    /// Number of foreground pixels.
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Number of foreground pixels in row `y`.
    pub fn row_foreground(&self, y: u32) -> usize {
        let start = y as usize * self.width as usize;
        self.data[start..start + self.width as usize]
            .iter()
            .filter(|&&v| v != 0)
            .count()
    }

    /// Returns `self AND NOT other`.
    pub fn and_not(&self, other: &BinaryMask) -> PipelineResult<BinaryMask> {
        if self.dimensions() != other.dimensions() {
            return Err(PipelineError::DimensionMismatch {
                stage: "mask subtraction",
                expected: self.dimensions(),
                found: other.dimensions(),
            });
        }

        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a & (b ^ 1))
            .collect();

        Ok(BinaryMask::from_raw(self.width, self.height, data))
    }

    /// Renders the mask as a 0/255 grayscale image (ink is white).
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }
}

/// Rectangular structuring element, anchored at `(width / 2, height / 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    pub width: u32,
    pub height: u32,
}

impl StructuringElement {
    /// Validates a `[width, height]` pair from the configuration.
    pub fn from_config(key: &'static str, kernel: [i64; 2]) -> PipelineResult<Self> {
        let (width, height) = crate::config::validate_kernel(key, kernel)?;
        Ok(Self { width, height })
    }

    pub fn anchor(&self) -> (u32, u32) {
        (self.width / 2, self.height / 2)
    }
}

/// Types of morphological operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologicalOperation {
    /// Erosion operation (shrinks foreground)
    Erosion,
    /// Dilation operation (grows foreground)
    Dilation,
    /// Opening operation (erosion followed by dilation - keeps structures the kernel fits in)
    Opening,
    /// Closing operation (dilation followed by erosion - fills gaps)
    Closing,
}

/// Result of CLAHE contrast enhancement operation.
#[derive(Debug, Clone)]
pub struct ClaheImageResult {
    /// The contrast-enhanced image
    pub image: GrayImage,
    /// Clip limit used for histogram clipping
    pub clip_limit: f64,
    /// Tile grid actually used, as (columns, rows)
    pub tile_grid: (u32, u32),
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of local thresholding.
#[derive(Debug, Clone)]
pub struct ThresholdedMaskResult {
    /// Foreground mask, 1 where ink was detected
    pub mask: BinaryMask,
    /// Window side used for local statistics
    pub block_size: u32,
    /// Standard deviation weight
    pub k: f64,
    /// Number of foreground pixels
    pub foreground_pixels: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of morphological operations on binary masks.
#[derive(Debug, Clone)]
pub struct MorphologicalMaskResult {
    /// The morphologically processed mask
    pub mask: BinaryMask,
    /// Type of morphological operation applied
    pub operation: MorphologicalOperation,
    /// Structuring element used
    pub kernel: StructuringElement,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Result of ruled guideline suppression.
#[derive(Debug, Clone)]
pub struct GuidelineRemovalResult {
    /// Input mask with guideline pixels cleared
    pub mask: BinaryMask,
    /// Number of foreground pixels classified as guideline
    pub guide_pixels: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
