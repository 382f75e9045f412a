//! # Morphology Module
//!
//! Binary morphology with rectangular structuring elements, and the ruled
//! guideline suppression built on it.
//!
//! A rectangular min/max filter is separable, so every operation runs as a
//! horizontal pass followed by a vertical pass, each a sliding-window count
//! whose cost does not depend on the kernel size. Pixels beyond the page
//! border count as foreground for erosion and as background for dilation,
//! so a structure touching the border is not eaten away by the border itself.

use tracing;

use super::types::{
    BinaryMask, GuidelineRemovalResult, MorphologicalMaskResult, MorphologicalOperation,
    StructuringElement,
};
use crate::config::MorphologyConfig;
use crate::errors::PipelineResult;

/// Applies a morphological operation to a binary mask.
///
/// # Arguments
///
/// * `mask` - The binary mask to process
/// * `operation` - The morphological operation to apply
/// * `kernel` - Rectangular structuring element
///
/// # Examples
///
/// ```
/// use manuscript_lines::preprocessing::{
///     apply_morphological_operation, BinaryMask, MorphologicalOperation, StructuringElement,
/// };
///
/// let mut mask = BinaryMask::new(20, 5);
/// mask.set(4, 2, true);
/// mask.set(8, 2, true);
/// let kernel = StructuringElement { width: 7, height: 1 };
/// let closed = apply_morphological_operation(&mask, MorphologicalOperation::Closing, kernel);
/// assert!(closed.mask.get(6, 2));
/// ```
pub fn apply_morphological_operation(
    mask: &BinaryMask,
    operation: MorphologicalOperation,
    kernel: StructuringElement,
) -> MorphologicalMaskResult {
    let start_time = std::time::Instant::now();

    let processed = match operation {
        MorphologicalOperation::Erosion => erode(mask, kernel),
        MorphologicalOperation::Dilation => dilate(mask, kernel),
        MorphologicalOperation::Opening => dilate(&erode(mask, kernel), kernel),
        MorphologicalOperation::Closing => erode(&dilate(mask, kernel), kernel),
    };

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "line_preprocessing",
        "Morphological operation completed in {:.2}ms: operation={:?}, kernel={}x{}, dimensions={}x{}",
        processing_time.as_millis(),
        operation,
        kernel.width,
        kernel.height,
        processed.width(),
        processed.height()
    );

    MorphologicalMaskResult {
        mask: processed,
        operation,
        kernel,
        processing_time_ms: processing_time.as_millis() as u32,
    }
}

/// Suppresses long horizontal ruled guidelines.
///
/// Opening with the elongated `guide_removal_kernel` keeps only structures
/// at least as long as the kernel, which on a manuscript page are the ruled
/// guides; handwriting strokes are too short and irregular to survive. Those
/// guide pixels are then removed from the input: `output = input AND NOT guides`.
///
/// # Arguments
///
/// * `mask` - Foreground mask from thresholding
/// * `config` - Morphology configuration holding `guide_removal_kernel`
///
/// # Returns
///
/// Returns the cleaned mask, or `PipelineError::Config` if either kernel dimension is < 1
pub fn remove_guidelines(
    mask: &BinaryMask,
    config: &MorphologyConfig,
) -> PipelineResult<GuidelineRemovalResult> {
    let start_time = std::time::Instant::now();

    let kernel = StructuringElement::from_config(
        "preprocessing.morphology.guide_removal_kernel",
        config.guide_removal_kernel,
    )?;

    let guides = apply_morphological_operation(mask, MorphologicalOperation::Opening, kernel).mask;
    let guide_pixels = guides.count_foreground();
    let cleaned = mask.and_not(&guides)?;

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "line_preprocessing",
        "Guideline removal completed in {:.2}ms: kernel={}x{}, guide_pixels={}",
        processing_time.as_millis(),
        kernel.width,
        kernel.height,
        guide_pixels
    );

    Ok(GuidelineRemovalResult {
        mask: cleaned,
        guide_pixels,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Erosion: a pixel stays foreground only if the whole kernel window is foreground.
pub fn erode(mask: &BinaryMask, kernel: StructuringElement) -> BinaryMask {
    let horizontal = horizontal_pass(mask, kernel.width, Pass::Erode);
    vertical_pass(&horizontal, kernel.height, Pass::Erode)
}

/// Dilation: a pixel becomes foreground if any pixel of the kernel window is.
pub fn dilate(mask: &BinaryMask, kernel: StructuringElement) -> BinaryMask {
    let horizontal = horizontal_pass(mask, kernel.width, Pass::Dilate);
    vertical_pass(&horizontal, kernel.height, Pass::Dilate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Erode,
    Dilate,
}

impl Pass {
    /// The pixel value whose presence in the window decides the output.
    fn decisive(self) -> u8 {
        match self {
            Pass::Erode => 0,
            Pass::Dilate => 1,
        }
    }
}

/// One-dimensional sliding-window filter over `len` samples.
///
/// The window at `i` spans `[i - before, i + after]` clipped to the line;
/// with anchor `k / 2` that is `before = k / 2`, `after = k - 1 - k / 2`.
/// Out-of-line samples never hold the decisive value, which gives the
/// border behaviour described in the module docs.
fn filter_line(
    len: usize,
    kernel: u32,
    pass: Pass,
    read: impl Fn(usize) -> u8,
    mut write: impl FnMut(usize, u8),
) {
    let kernel = kernel as usize;
    if kernel <= 1 {
        for i in 0..len {
            write(i, read(i));
        }
        return;
    }

    let before = kernel / 2;
    let after = kernel - 1 - before;
    let decisive = pass.decisive();
    let hit = |i: usize| usize::from(read(i) == decisive);

    let mut hits: usize = (0..=after.min(len - 1)).map(&hit).sum();
    for i in 0..len {
        write(i, if hits > 0 { decisive } else { decisive ^ 1 });

        let enter = i + after + 1;
        if enter < len {
            hits += hit(enter);
        }
        if i >= before {
            hits -= hit(i - before);
        }
    }
}

fn horizontal_pass(mask: &BinaryMask, kernel_width: u32, pass: Pass) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = mask.as_raw();
    let mut out = vec![0u8; w * h];

    if w > 0 {
        for y in 0..h {
            let row = &src[y * w..(y + 1) * w];
            let out_row = &mut out[y * w..(y + 1) * w];
            filter_line(w, kernel_width, pass, |x| row[x], |x, v| out_row[x] = v);
        }
    }

    BinaryMask::from_raw(width, height, out)
}

fn vertical_pass(mask: &BinaryMask, kernel_height: u32, pass: Pass) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = mask.as_raw();
    let mut out = vec![0u8; w * h];

    if h > 0 {
        for x in 0..w {
            filter_line(h, kernel_height, pass, |y| src[y * w + x], |y, v| out[y * w + x] = v);
        }
    }

    BinaryMask::from_raw(width, height, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;

    fn mask_from_rows(rows: &[&str]) -> BinaryMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut mask = BinaryMask::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                mask.set(x as u32, y as u32, c == '#');
            }
        }
        mask
    }

    fn rows_of(mask: &BinaryMask) -> Vec<String> {
        (0..mask.height())
            .map(|y| {
                (0..mask.width())
                    .map(|x| if mask.get(x, y) { '#' } else { '.' })
                    .collect()
            })
            .collect()
    }

    /// Direct (non-separable) erosion/dilation for cross-checking.
    fn naive(mask: &BinaryMask, kernel: StructuringElement, pass: Pass) -> BinaryMask {
        let (ax, ay) = kernel.anchor();
        let mut out = BinaryMask::new(mask.width(), mask.height());
        for y in 0..mask.height() as i64 {
            for x in 0..mask.width() as i64 {
                let mut any = false;
                let mut all = true;
                for ky in 0..kernel.height as i64 {
                    for kx in 0..kernel.width as i64 {
                        let sx = x + kx - ax as i64;
                        let sy = y + ky - ay as i64;
                        let inside = sx >= 0
                            && sy >= 0
                            && sx < mask.width() as i64
                            && sy < mask.height() as i64;
                        if inside {
                            let v = mask.get(sx as u32, sy as u32);
                            any |= v;
                            all &= v;
                        }
                    }
                }
                let v = match pass {
                    Pass::Erode => all,
                    Pass::Dilate => any,
                };
                out.set(x as u32, y as u32, v);
            }
        }
        out
    }

    fn scattered_mask(width: u32, height: u32) -> BinaryMask {
        let mut mask = BinaryMask::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, (x * 7 + y * 3 + x * y) % 5 < 3);
            }
        }
        mask
    }

    #[test]
    fn test_separable_passes_match_naive_filter() {
        let mask = scattered_mask(17, 11);
        for (w, h) in [(1, 1), (3, 1), (4, 2), (5, 3), (1, 4), (9, 6)] {
            let kernel = StructuringElement { width: w, height: h };
            assert_eq!(erode(&mask, kernel), naive(&mask, kernel, Pass::Erode), "erode {}x{}", w, h);
            assert_eq!(dilate(&mask, kernel), naive(&mask, kernel, Pass::Dilate), "dilate {}x{}", w, h);
        }
    }

    #[test]
    fn test_dilation_grows_point() {
        let mask = mask_from_rows(&[".....", ".....", "..#..", ".....", "....."]);
        let result = dilate(&mask, StructuringElement { width: 3, height: 3 });
        assert_eq!(
            rows_of(&result),
            vec![".....", ".###.", ".###.", ".###.", "....."]
        );
    }

    #[test]
    fn test_erosion_keeps_border_structures() {
        // A full-width line touching both borders survives erosion
        let mask = mask_from_rows(&["........", "########", "........"]);
        let result = erode(&mask, StructuringElement { width: 5, height: 1 });
        assert_eq!(rows_of(&result), rows_of(&mask));
    }

    #[test]
    fn test_closing_bridges_gap() {
        let mask = mask_from_rows(&["##...##", "......."]);
        let result = apply_morphological_operation(
            &mask,
            MorphologicalOperation::Closing,
            StructuringElement { width: 5, height: 1 },
        );
        assert_eq!(result.operation, MorphologicalOperation::Closing);
        assert_eq!(rows_of(&result.mask), vec!["#######", "......."]);
    }

    #[test]
    fn test_opening_removes_short_runs() {
        let mask = mask_from_rows(&[".###........", "............", "############"]);
        let result = apply_morphological_operation(
            &mask,
            MorphologicalOperation::Opening,
            StructuringElement { width: 6, height: 1 },
        );
        assert_eq!(
            rows_of(&result.mask),
            vec!["............", "............", "############"]
        );
    }

    #[test]
    fn test_remove_guidelines_strips_rule_keeps_strokes() {
        let mask = mask_from_rows(&[
            "..#...#...#...#.",
            "..#...#...#...#.",
            "################",
            "..#...#...#...#.",
        ]);
        let config = MorphologyConfig {
            guide_removal_kernel: [8, 1],
            ..MorphologyConfig::default()
        };

        let result = remove_guidelines(&mask, &config).unwrap();
        assert_eq!(result.guide_pixels, 16);
        assert_eq!(
            rows_of(&result.mask),
            vec![
                "..#...#...#...#.",
                "..#...#...#...#.",
                "................",
                "..#...#...#...#.",
            ]
        );
    }

    #[test]
    fn test_remove_guidelines_invalid_kernel() {
        let mask = BinaryMask::new(4, 4);
        let config = MorphologyConfig {
            guide_removal_kernel: [0, 1],
            ..MorphologyConfig::default()
        };
        assert!(matches!(
            remove_guidelines(&mask, &config),
            Err(PipelineError::Config { .. })
        ));
    }

    #[test]
    fn test_empty_mask_is_handled() {
        let mask = BinaryMask::new(0, 0);
        let kernel = StructuringElement { width: 3, height: 3 };
        assert!(erode(&mask, kernel).is_empty());
        assert!(dilate(&mask, kernel).is_empty());
    }
}
