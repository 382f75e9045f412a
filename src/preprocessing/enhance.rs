//! # Contrast Enhancement Module
//!
//! This module provides local contrast normalization for manuscript pages
//! using Contrast Limited Adaptive Histogram Equalization (CLAHE). Faded ink
//! and uneven paper tone are normalized per tile, and the per-tile mappings
//! are blended bilinearly so tile borders do not show.

use image::GrayImage;
use tracing;

use super::types::ClaheImageResult;
use crate::config::ClaheConfig;
use crate::errors::PipelineResult;

/// Applies Contrast Limited Adaptive Histogram Equalization (CLAHE) to enhance local contrast.
///
/// The image is divided into a grid of `tile_grid_size` tiles (columns, rows).
/// Each tile gets its own histogram, clipped at
/// `clip_limit * tile_pixels / 256` with the excess spread evenly over all
/// bins, and the clipped histogram's cumulative distribution becomes that
/// tile's intensity mapping. Every output pixel interpolates the mappings of
/// the four nearest tile centres.
///
/// # Arguments
///
/// * `image` - The grayscale page to enhance
/// * `config` - Clip limit and tile grid
///
/// # Returns
///
/// Returns a `Result` containing the enhanced image (same dimensions) and metadata,
/// or a `PipelineError::Config` when the clip limit or grid is invalid
///
/// # Examples
///
/// ```no_run
/// use manuscript_lines::config::ClaheConfig;
/// use manuscript_lines::preprocessing::apply_clahe;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let page = image::open("folio_001.jpg")?.to_luma8();
/// let enhanced = apply_clahe(&page, &ClaheConfig::default())?;
/// assert_eq!(enhanced.image.dimensions(), page.dimensions());
/// # Ok(())
/// # }
/// ```
pub fn apply_clahe(image: &GrayImage, config: &ClaheConfig) -> PipelineResult<ClaheImageResult> {
    let start_time = std::time::Instant::now();

    config.validate()?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(ClaheImageResult {
            image: image.clone(),
            clip_limit: config.clip_limit,
            tile_grid: (0, 0),
            processing_time_ms: 0,
        });
    }

    // A grid finer than the image degenerates to one tile per pixel
    let tiles_x = (config.tile_grid_size[0] as u32).min(width);
    let tiles_y = (config.tile_grid_size[1] as u32).min(height);

    let x_bounds = tile_bounds(width, tiles_x);
    let y_bounds = tile_bounds(height, tiles_y);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y as usize {
        for tx in 0..tiles_x as usize {
            luts.push(build_tile_lut(
                image,
                (x_bounds[tx], x_bounds[tx + 1]),
                (y_bounds[ty], y_bounds[ty + 1]),
                config.clip_limit,
            ));
        }
    }

    let columns = interpolation_weights(&x_bounds, width);
    let rows = interpolation_weights(&y_bounds, height);

    let mut output = GrayImage::new(width, height);
    for (y, row) in rows.iter().enumerate() {
        let top = row.low * tiles_x as usize;
        let bottom = row.high * tiles_x as usize;
        for (x, col) in columns.iter().enumerate() {
            let v = image.get_pixel(x as u32, y as u32)[0] as usize;

            let top_value = blend(luts[top + col.low][v], luts[top + col.high][v], col.weight);
            let bottom_value = blend(
                luts[bottom + col.low][v],
                luts[bottom + col.high][v],
                col.weight,
            );
            let value = top_value * (1.0 - row.weight) + bottom_value * row.weight;

            output.put_pixel(x as u32, y as u32, image::Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "line_preprocessing",
        "CLAHE applied in {:.2}ms: clip_limit={}, tile_grid={}x{}, dimensions={}x{}",
        processing_time.as_millis(),
        config.clip_limit,
        tiles_x,
        tiles_y,
        width,
        height
    );

    Ok(ClaheImageResult {
        image: output,
        clip_limit: config.clip_limit,
        tile_grid: (tiles_x, tiles_y),
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Splits `extent` into `tiles` ranges; returns the `tiles + 1` boundaries.
fn tile_bounds(extent: u32, tiles: u32) -> Vec<u32> {
    (0..=tiles as u64)
        .map(|i| (i * extent as u64 / tiles as u64) as u32)
        .collect()
}

/// Interpolation coordinates of one pixel row or column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisWeight {
    low: usize,
    high: usize,
    /// Weight of `high`; `low` gets `1 - weight`
    weight: f32,
}

/// Computes, for every pixel along one axis, the two tile centres it lies
/// between and its relative position. Pixels before the first or after the
/// last centre use that edge tile alone.
fn interpolation_weights(bounds: &[u32], extent: u32) -> Vec<AxisWeight> {
    let tiles = bounds.len() - 1;
    let centres: Vec<f32> = bounds
        .windows(2)
        .map(|w| (w[0] + w[1]) as f32 / 2.0)
        .collect();

    let mut weights = Vec::with_capacity(extent as usize);
    let mut low = 0usize;
    for p in 0..extent {
        let pos = p as f32 + 0.5;
        while low + 1 < tiles && centres[low + 1] <= pos {
            low += 1;
        }

        let weight = if pos <= centres[low] || low + 1 >= tiles {
            AxisWeight {
                low,
                high: low,
                weight: 0.0,
            }
        } else {
            AxisWeight {
                low,
                high: low + 1,
                weight: (pos - centres[low]) / (centres[low + 1] - centres[low]),
            }
        };
        weights.push(weight);
    }

    weights
}

#[inline]
fn blend(a: u8, b: u8, weight: f32) -> f32 {
    a as f32 * (1.0 - weight) + b as f32 * weight
}

/// Builds the clipped-histogram equalization mapping of one tile.
fn build_tile_lut(
    image: &GrayImage,
    (x0, x1): (u32, u32),
    (y0, y1): (u32, u32),
    clip_limit: f64,
) -> [u8; 256] {
    let total_pixels = ((x1 - x0) as u64) * ((y1 - y0) as u64);

    // Calculate histogram
    let mut histogram = [0u64; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    // Apply clip limit
    let clip_limit_pixels = ((clip_limit * total_pixels as f64 / 256.0) as u64).max(1);
    let mut excess_pixels = 0u64;

    for count in &mut histogram {
        if *count > clip_limit_pixels {
            excess_pixels += *count - clip_limit_pixels;
            *count = clip_limit_pixels;
        }
    }

    // Redistribute excess pixels uniformly
    let uniform_increment = excess_pixels / 256;
    let mut remainder = excess_pixels % 256;

    for count in &mut histogram {
        *count += uniform_increment;
        if remainder > 0 {
            *count += 1;
            remainder -= 1;
        }
    }

    // Cumulative distribution scaled to the intensity range
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[value] = ((cumulative as f64 * 255.0 / total_pixels as f64).round()).min(255.0) as u8;
    }

    lut
}
