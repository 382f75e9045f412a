//! # Line Segmentation Module
//!
//! Merges the ink of each text line into one blob, labels the blobs, and
//! cuts every plausibly sized blob out of the original page in reading order.

use image::{imageops, GrayImage};
use tracing;

use super::labeling::label_components;
use super::types::{LineCrop, Region, SegmentationResult};
use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::preprocessing::{
    apply_morphological_operation, BinaryMask, MorphologicalOperation, StructuringElement,
};

/// Segments a guideline-free mask into ordered line crops of `original`.
///
/// 1. Closing with `line_closing_kernel` joins the letters of one line.
/// 2. The closed mask is labeled into 8-connected regions.
/// 3. Regions are sorted by top edge, then left edge, then label.
/// 4. Regions whose height lies outside `[min_line_height, max_line_height]` are dropped.
/// 5. Each survivor is widened by `horizontal_margin` (clamped to the page)
///    and cropped from the original grayscale page.
///
/// Indices are 1-based and contiguous over the retained regions. A page with
/// no qualifying region yields an empty result, not an error.
///
/// # Arguments
///
/// * `mask` - Guideline-free binary mask
/// * `original` - The page before enhancement, same dimensions as `mask`
/// * `config` - Pipeline configuration
///
/// # Returns
///
/// Returns the ordered crops and statistics, `PipelineError::Config` for an
/// invalid kernel or height range, or `PipelineError::DimensionMismatch`
pub fn segment_lines(
    mask: &BinaryMask,
    original: &GrayImage,
    config: &PipelineConfig,
) -> PipelineResult<SegmentationResult> {
    let start_time = std::time::Instant::now();

    config.segmentation.validate()?;
    let closing_kernel = StructuringElement::from_config(
        "preprocessing.morphology.line_closing_kernel",
        config.preprocessing.morphology.line_closing_kernel,
    )?;

    if mask.dimensions() != original.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            stage: "line segmentation",
            expected: original.dimensions(),
            found: mask.dimensions(),
        });
    }

    let merged =
        apply_morphological_operation(mask, MorphologicalOperation::Closing, closing_kernel).mask;

    let mut regions = label_components(&merged).regions;
    regions.sort_by_key(|r| (r.bbox.y0, r.bbox.x0, r.id));
    let regions_found = regions.len();

    let min_height = config.segmentation.min_line_height as u32;
    let max_height = config.segmentation.max_line_height as u32;
    let margin = config.segmentation.horizontal_margin as u32;

    let retained: Vec<Region> = regions
        .into_iter()
        .filter(|r| (min_height..=max_height).contains(&r.bbox.height()))
        .collect();
    let regions_rejected = regions_found - retained.len();

    let lines: Vec<LineCrop> = retained
        .iter()
        .enumerate()
        .map(|(i, region)| {
            let bbox = region.bbox.expand_horizontally(margin, original.width());
            let image =
                imageops::crop_imm(original, bbox.x0, bbox.y0, bbox.width(), bbox.height())
                    .to_image();
            LineCrop {
                index: i + 1,
                image,
                bbox,
                raw_bbox: region.bbox,
            }
        })
        .collect();

    let processing_time = start_time.elapsed();

    if lines.is_empty() {
        tracing::warn!(
            regions_found,
            min_line_height = min_height,
            max_line_height = max_height,
            "No text lines found on page"
        );
    }

    tracing::debug!(
        target: "line_preprocessing",
        "Line segmentation completed in {:.2}ms: regions={}, rejected={}, lines={}",
        processing_time.as_millis(),
        regions_found,
        regions_rejected,
        lines.len()
    );

    Ok(SegmentationResult {
        lines,
        regions_found,
        regions_rejected,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}
