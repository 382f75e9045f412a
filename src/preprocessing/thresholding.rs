//! # Image Thresholding Module
//!
//! This module provides local (Niblack) binarization for manuscript pages.
//! Ink density and paper tone vary across a scanned page, so the cutoff for
//! each pixel is derived from the mean and standard deviation of its own
//! neighbourhood instead of one global value.

use image::GrayImage;
use tracing;

use super::types::{BinaryMask, ThresholdedMaskResult};
use crate::config::ThresholdConfig;
use crate::errors::PipelineResult;

/// Applies Niblack local thresholding, marking ink as foreground.
///
/// For every pixel the mean `μ` and standard deviation `σ` of the
/// `block_size × block_size` window centred on it are computed, with the
/// page edges replicated outward. The pixel is foreground when its intensity
/// is strictly darker than `μ + k·σ`. A perfectly flat region has `σ = 0` and
/// therefore never produces foreground.
///
/// Window sums are maintained incrementally: a running per-column sum over
/// the window's rows, and a running horizontal sum over those column sums.
/// Each pixel costs O(1) regardless of `block_size`, and all sums are exact
/// integers, so the mask is bit-identical across runs.
///
/// # Arguments
///
/// * `image` - The enhanced grayscale page
/// * `config` - Window size and `k`
///
/// # Returns
///
/// Returns a `Result` containing the foreground mask and metadata, or a
/// `PipelineError::Config` if `block_size` is even or non-positive
///
/// # Examples
///
/// ```no_run
/// use manuscript_lines::config::ThresholdConfig;
/// use manuscript_lines::preprocessing::apply_niblack_threshold;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let page = image::open("folio_001.png")?.to_luma8();
/// let binary = apply_niblack_threshold(&page, &ThresholdConfig::default())?;
/// println!("{} ink pixels", binary.foreground_pixels);
/// # Ok(())
/// # }
/// ```
pub fn apply_niblack_threshold(
    image: &GrayImage,
    config: &ThresholdConfig,
) -> PipelineResult<ThresholdedMaskResult> {
    let start_time = std::time::Instant::now();

    config.validate()?;

    let block_size = config.block_size as u32;
    let (width, height) = image.dimensions();
    let mut mask = BinaryMask::new(width, height);

    if width > 0 && height > 0 {
        let stats = WindowStatistics::new(image, block_size);
        stats.for_each_pixel(|x, y, sum, sum_sq| {
            let value = image.get_pixel(x, y)[0];
            if is_foreground(value, sum, sum_sq, stats.area, config.k) {
                mask.set(x, y, true);
            }
        });
    }

    let foreground_pixels = mask.count_foreground();
    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "line_preprocessing",
        "Niblack thresholding completed in {:.2}ms: block_size={}, k={}, foreground={}, dimensions={}x{}",
        processing_time.as_millis(),
        block_size,
        config.k,
        foreground_pixels,
        width,
        height
    );

    Ok(ThresholdedMaskResult {
        mask,
        block_size,
        k: config.k,
        foreground_pixels,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Decides one pixel from its window sums.
#[inline]
fn is_foreground(value: u8, sum: u64, sum_sq: u64, area: u64, k: f64) -> bool {
    // n·Σv² − (Σv)² is n² times the variance and never negative in exact arithmetic
    let spread = (area as u128 * sum_sq as u128).saturating_sub(sum as u128 * sum as u128);
    let mean = sum as f64 / area as f64;
    let std_dev = (spread as f64).sqrt() / area as f64;
    (value as f64) < mean + k * std_dev
}

/// Sliding-window sums over an edge-replicated grayscale image.
struct WindowStatistics<'a> {
    image: &'a GrayImage,
    radius: i64,
    area: u64,
}

impl<'a> WindowStatistics<'a> {
    fn new(image: &'a GrayImage, block_size: u32) -> Self {
        Self {
            image,
            radius: (block_size / 2) as i64,
            area: block_size as u64 * block_size as u64,
        }
    }

    /// Visits pixels in raster order with the sum and sum of squares of their window.
    fn for_each_pixel(&self, mut visit: impl FnMut(u32, u32, u64, u64)) {
        let (width, height) = self.image.dimensions();
        let (w, h) = (width as i64, height as i64);
        let r = self.radius;

        let clamp_x = |x: i64| x.clamp(0, w - 1) as usize;
        let clamp_y = |y: i64| y.clamp(0, h - 1) as u32;

        // Per-column sums over the rows of the current window
        let mut col_sum = vec![0u64; width as usize];
        let mut col_sq = vec![0u64; width as usize];

        let raw = self.image.as_raw();
        let row = |y: u32| &raw[y as usize * width as usize..(y as usize + 1) * width as usize];

        let add_row = |col_sum: &mut [u64], col_sq: &mut [u64], y: u32| {
            for (x, &v) in row(y).iter().enumerate() {
                let v = v as u64;
                col_sum[x] += v;
                col_sq[x] += v * v;
            }
        };
        let remove_row = |col_sum: &mut [u64], col_sq: &mut [u64], y: u32| {
            for (x, &v) in row(y).iter().enumerate() {
                let v = v as u64;
                col_sum[x] -= v;
                col_sq[x] -= v * v;
            }
        };

        for dy in -r..=r {
            add_row(&mut col_sum, &mut col_sq, clamp_y(dy));
        }

        for y in 0..h {
            let mut sum = 0u64;
            let mut sum_sq = 0u64;
            for dx in -r..=r {
                sum += col_sum[clamp_x(dx)];
                sum_sq += col_sq[clamp_x(dx)];
            }

            for x in 0..w {
                visit(x as u32, y as u32, sum, sum_sq);

                let enter = clamp_x(x + r + 1);
                let leave = clamp_x(x - r);
                sum = sum + col_sum[enter] - col_sum[leave];
                sum_sq = sum_sq + col_sq[enter] - col_sq[leave];
            }

            if y + 1 < h {
                add_row(&mut col_sum, &mut col_sq, clamp_y(y + r + 1));
                remove_row(&mut col_sum, &mut col_sq, clamp_y(y - r));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;

    fn config(block_size: i64, k: f64) -> ThresholdConfig {
        ThresholdConfig { block_size, k }
    }

    /// Window statistics by direct summation, for cross-checking.
    fn naive_sums(image: &GrayImage, block_size: u32, x: u32, y: u32) -> (u64, u64) {
        let r = (block_size / 2) as i64;
        let (w, h) = (image.width() as i64, image.height() as i64);
        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        for dy in -r..=r {
            for dx in -r..=r {
                let sx = (x as i64 + dx).clamp(0, w - 1) as u32;
                let sy = (y as i64 + dy).clamp(0, h - 1) as u32;
                let v = image.get_pixel(sx, sy)[0] as u64;
                sum += v;
                sum_sq += v * v;
            }
        }
        (sum, sum_sq)
    }

    fn textured_image(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x * 37 + y * 91 + (x * y) % 13) % 256) as u8])
        })
    }

    #[test]
    fn test_window_sums_match_naive_scan() {
        let img = textured_image(13, 9);
        let stats = WindowStatistics::new(&img, 5);

        stats.for_each_pixel(|x, y, sum, sum_sq| {
            assert_eq!((sum, sum_sq), naive_sums(&img, 5, x, y), "at ({}, {})", x, y);
        });
    }

    #[test]
    fn test_window_larger_than_image() {
        let img = textured_image(3, 2);
        let stats = WindowStatistics::new(&img, 9);

        stats.for_each_pixel(|x, y, sum, sum_sq| {
            assert_eq!((sum, sum_sq), naive_sums(&img, 9, x, y));
        });
    }

    #[test]
    fn test_uniform_image_has_no_foreground() {
        let img = GrayImage::from_pixel(40, 30, image::Luma([180]));
        let result = apply_niblack_threshold(&img, &config(15, -0.2)).unwrap();

        assert_eq!(result.foreground_pixels, 0);
    }

    #[test]
    fn test_dark_stroke_is_foreground() {
        // Light page with a 3-pixel-wide dark vertical stroke
        let img = GrayImage::from_fn(30, 30, |x, _| {
            image::Luma([if (14..17).contains(&x) { 20 } else { 220 }])
        });
        let result = apply_niblack_threshold(&img, &config(11, -0.2)).unwrap();

        for y in 0..30 {
            for x in 0..30 {
                assert_eq!(result.mask.get(x, y), (14..17).contains(&x), "at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_invalid_block_size() {
        let img = textured_image(10, 10);

        assert!(matches!(
            apply_niblack_threshold(&img, &config(4, -0.2)),
            Err(PipelineError::Config { .. })
        ));
        assert!(apply_niblack_threshold(&img, &config(0, -0.2)).is_err());
        assert!(apply_niblack_threshold(&img, &config(-5, -0.2)).is_err());
    }

    #[test]
    fn test_threshold_is_deterministic() {
        let img = textured_image(64, 48);
        let a = apply_niblack_threshold(&img, &config(15, -0.3)).unwrap();
        let b = apply_niblack_threshold(&img, &config(15, -0.3)).unwrap();
        assert_eq!(a.mask, b.mask);
    }

    #[test]
    fn test_is_foreground_flat_window() {
        // σ = 0, value equal to the mean: never foreground
        assert!(!is_foreground(100, 100 * 9, 100 * 100 * 9, 9, -0.2));
        // darker than a flat mean: foreground
        assert!(is_foreground(90, 100 * 9, 100 * 100 * 9, 9, -0.2));
    }
}
