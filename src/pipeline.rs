//! # Page Pipeline
//!
//! Chains enhancement, binarization, guideline removal and segmentation for
//! one page, and writes the page's artifacts.
//!
//! [`process_page`] is pure: rasters and configuration in, rasters and crops
//! out. [`run_page`] wraps it with decoding, output files, logging and
//! metrics.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::info;

use crate::config::PipelineConfig;
use crate::errors::{error_logging, PipelineError, PipelineResult};
use crate::observability;
use crate::page_io::{self, OutputLayout};
use crate::preprocessing::{apply_clahe, apply_niblack_threshold, remove_guidelines, BinaryMask};
use crate::recognition::{self, TextRecognizer, TranscriptFormat};
use crate::segmentation::{segment_lines, LineCrop};

/// Overlay box color
const OVERLAY_COLOR: Rgb<u8> = Rgb([220, 30, 30]);

/// Everything computed for one page.
#[derive(Debug, Clone)]
pub struct PageOutput {
    /// Page after CLAHE
    pub enhanced: GrayImage,
    /// Foreground mask after guideline removal
    pub binary: BinaryMask,
    /// Foreground pixels removed as ruled guidelines
    pub guide_pixels: usize,
    /// Line crops in reading order
    pub lines: Vec<LineCrop>,
    /// Connected components found before the height filter
    pub regions_found: usize,
}

/// Runs the four pipeline stages on a decoded page.
///
/// The configuration is validated before any stage runs. Identical inputs
/// give bit-identical masks and crops.
///
/// # Examples
///
/// ```
/// use manuscript_lines::config::PipelineConfig;
/// use manuscript_lines::pipeline::process_page;
///
/// let blank = image::GrayImage::from_pixel(64, 64, image::Luma([255]));
/// let output = process_page(&blank, &PipelineConfig::default())?;
/// assert!(output.lines.is_empty());
/// # Ok::<(), manuscript_lines::errors::PipelineError>(())
/// ```
pub fn process_page(original: &GrayImage, config: &PipelineConfig) -> PipelineResult<PageOutput> {
    config.validate()?;

    let enhanced = apply_clahe(original, &config.preprocessing.clahe)?;
    let thresholded = apply_niblack_threshold(&enhanced.image, &config.preprocessing.threshold)?;
    let cleaned = remove_guidelines(&thresholded.mask, &config.preprocessing.morphology)?;
    let segmentation = segment_lines(&cleaned.mask, original, config)?;

    Ok(PageOutput {
        enhanced: enhanced.image,
        binary: cleaned.mask,
        guide_pixels: cleaned.guide_pixels,
        lines: segmentation.lines,
        regions_found: segmentation.regions_found,
    })
}

/// Optional artifacts of a page run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Write the page with every crop box drawn on it
    pub overlay: bool,
    /// Transcript format, used only when a recognizer is supplied
    pub transcript: Option<TranscriptFormat>,
}

/// Summary of a completed page run.
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub page: PathBuf,
    pub mask_path: PathBuf,
    pub overlay_path: Option<PathBuf>,
    /// Crop files in reading order
    pub line_paths: Vec<PathBuf>,
    pub transcript_path: Option<PathBuf>,
    pub processing_time_ms: u64,
}

impl PageReport {
    pub fn line_count(&self) -> usize {
        self.line_paths.len()
    }
}

/// Processes one page file and writes its artifacts under `output_dir`.
///
/// Configuration errors are raised before anything is read or written. The
/// transcript is produced only when `recognizer` is given; its format
/// defaults to plain text.
///
/// # Arguments
///
/// * `input` - PNG or JPEG page
/// * `output_dir` - Output root; see [`crate::page_io`] for the layout
/// * `config` - Pipeline configuration
/// * `options` - Optional artifacts
/// * `recognizer` - Text recognizer for the transcript
pub fn run_page(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    options: RunOptions,
    recognizer: Option<&dyn TextRecognizer>,
) -> PipelineResult<PageReport> {
    let _span = observability::page_span(input).entered();
    let start_time = Instant::now();

    let result = run_page_inner(input, output_dir, config, options, recognizer, start_time);
    let elapsed = start_time.elapsed();

    match &result {
        Ok(report) => {
            observability::record_page_success(report.line_count(), elapsed);
            info!(
                page = %input.display(),
                lines = report.line_count(),
                processing_time_ms = report.processing_time_ms,
                "Page processed"
            );
        }
        Err(e) => {
            observability::record_page_failure(e.kind(), elapsed);
            error_logging::log_page_error(e, "run_page", input, Some(elapsed));
        }
    }

    result
}

fn run_page_inner(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    options: RunOptions,
    recognizer: Option<&dyn TextRecognizer>,
    start_time: Instant,
) -> PipelineResult<PageReport> {
    config.validate()?;

    let original = page_io::load_page(input)?;
    let output = process_page(&original, config)?;
    let layout = OutputLayout::new(output_dir, input);

    let mask_path = layout.processed_mask_path();
    page_io::save_gray_image(&mask_path, &output.binary.to_image())?;

    let line_paths = page_io::write_line_crops(&layout.lines_dir(), &output.lines)?;

    let overlay_path = if options.overlay {
        let path = layout.overlay_path();
        let overlay = draw_line_overlay(&original, &output.lines);
        overlay.save(&path).map_err(|e| PipelineError::Encode {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Some(path)
    } else {
        None
    };

    let transcript_path = match recognizer {
        Some(recognizer) => {
            let format = options.transcript.unwrap_or(TranscriptFormat::Txt);
            let path = layout.transcript_path(format.extension());
            let transcriptions = recognition::transcribe_lines(recognizer, &output.lines)?;
            recognition::write_transcript(
                &path,
                &transcriptions,
                config.ocr.confidence_threshold,
            )?;
            Some(path)
        }
        None => None,
    };

    Ok(PageReport {
        page: input.to_path_buf(),
        mask_path,
        overlay_path,
        line_paths,
        transcript_path,
        processing_time_ms: start_time.elapsed().as_millis() as u64,
    })
}

/// Draws every crop rectangle on a color copy of the page.
pub fn draw_line_overlay(original: &GrayImage, lines: &[LineCrop]) -> RgbImage {
    let mut canvas = RgbImage::from_fn(original.width(), original.height(), |x, y| {
        let v = original.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });

    for line in lines {
        let rect = Rect::at(line.bbox.x0 as i32, line.bbox.y0 as i32)
            .of_size(line.bbox.width(), line.bbox.height());
        draw_hollow_rect_mut(&mut canvas, rect, OVERLAY_COLOR);
    }

    canvas
}
