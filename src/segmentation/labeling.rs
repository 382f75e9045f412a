//! # Connected Component Labeling
//!
//! 8-connected labeling of a binary mask using an explicit work stack, so
//! arbitrarily large components cannot overflow the call stack.

use super::types::{BoundingBox, Region};
use crate::preprocessing::BinaryMask;

/// Per-pixel component labels plus one [`Region`] per component.
#[derive(Debug, Clone)]
pub struct Labeling {
    width: u32,
    height: u32,
    /// Row-major labels; 0 is background
    labels: Vec<u32>,
    /// `regions[i]` describes label `i + 1`
    pub regions: Vec<Region>,
}

impl Labeling {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Label of pixel `(x, y)`, 0 for background.
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    pub fn component_count(&self) -> usize {
        self.regions.len()
    }
}

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Labels the 8-connected foreground components of `mask`.
///
/// Components are numbered from 1 in raster-scan order of their first
/// (top-most, then left-most) pixel. Each region's bounding box is
/// half-open, so its height is `y1 - y0`.
///
/// # Examples
///
/// ```
/// use manuscript_lines::preprocessing::BinaryMask;
/// use manuscript_lines::segmentation::label_components;
///
/// let mut mask = BinaryMask::new(6, 3);
/// mask.set(0, 0, true);
/// mask.set(1, 1, true); // diagonal neighbour of (0, 0)
/// mask.set(5, 2, true);
///
/// let labeling = label_components(&mask);
/// assert_eq!(labeling.component_count(), 2);
/// assert_eq!(labeling.regions[0].area, 2);
/// ```
pub fn label_components(mask: &BinaryMask) -> Labeling {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as i64, height as i64);
    let pixels = mask.as_raw();

    let mut labels = vec![0u32; pixels.len()];
    let mut regions = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for start_y in 0..height {
        for start_x in 0..width {
            let start = start_y as usize * width as usize + start_x as usize;
            if pixels[start] == 0 || labels[start] != 0 {
                continue;
            }

            let id = regions.len() as u32 + 1;
            let mut bbox = BoundingBox {
                y0: start_y,
                x0: start_x,
                y1: start_y + 1,
                x1: start_x + 1,
            };
            let mut area = 0u64;

            labels[start] = id;
            stack.push((start_x, start_y));

            while let Some((x, y)) = stack.pop() {
                area += 1;
                bbox.x0 = bbox.x0.min(x);
                bbox.y0 = bbox.y0.min(y);
                bbox.x1 = bbox.x1.max(x + 1);
                bbox.y1 = bbox.y1.max(y + 1);

                for (dx, dy) in NEIGHBOURS {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }

                    let idx = ny as usize * width as usize + nx as usize;
                    if pixels[idx] != 0 && labels[idx] == 0 {
                        labels[idx] = id;
                        stack.push((nx as u32, ny as u32));
                    }
                }
            }

            regions.push(Region { id, bbox, area });
        }
    }

    Labeling {
        width,
        height,
        labels,
        regions,
    }
}
