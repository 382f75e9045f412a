//! # Batch Driver
//!
//! Runs the page pipeline over every page image in a directory on a rayon
//! thread pool. Pages share nothing but the read-only configuration, so a
//! failing page is reported and skipped while the others continue.
//!
//! Artifacts are named after the page's file stem. Pages whose stems collide
//! (`folio.png` and `folio.jpg`) are failed before any worker starts, so
//! neither can overwrite the other's crops.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::errors::{error_logging, PipelineError, PipelineResult};
use crate::observability;
use crate::page_io::{is_supported_page, OutputLayout};
use crate::pipeline::{run_page, PageReport, RunOptions};
use crate::recognition::TextRecognizer;

/// Lists the page images directly inside `dir`, sorted by path.
///
/// PNG and JPEG files are matched by extension, case-insensitively.
/// Subdirectories are not searched.
pub fn discover_pages(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io("read directory", dir, e))?;

    let mut pages = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| PipelineError::io("read directory", dir, e))?
            .path();
        if path.is_file() && is_supported_page(&path) {
            pages.push(path);
        }
    }

    pages.sort();
    Ok(pages)
}

/// For each page, the first other page that would write the same artifacts.
///
/// Stems are compared case-insensitively, since `Folio.png` and `folio.jpg`
/// share an output directory on case-insensitive file systems.
fn output_conflicts(pages: &[PathBuf]) -> Vec<Option<usize>> {
    let mut by_stem: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, page) in pages.iter().enumerate() {
        let stem = OutputLayout::new(Path::new(""), page).stem().to_lowercase();
        by_stem.entry(stem).or_default().push(index);
    }

    let mut conflicts = vec![None; pages.len()];
    for group in by_stem.values().filter(|group| group.len() > 1) {
        for &index in group {
            conflicts[index] = group.iter().copied().find(|&other| other != index);
        }
    }
    conflicts
}

fn reject_conflicting_page(page: &Path, other: &Path) -> PipelineError {
    let error = PipelineError::OutputConflict {
        path: page.to_path_buf(),
        other: other.to_path_buf(),
        stem: OutputLayout::new(Path::new(""), page).stem().to_string(),
    };
    observability::record_page_failure(error.kind(), Duration::ZERO);
    error_logging::log_page_error(&error, "run_batch", page, None);
    error
}

/// Batch settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads; `None` uses rayon's default
    pub workers: Option<usize>,
    /// Options applied to every page
    pub run: RunOptions,
}

/// Outcome of one page in a batch.
#[derive(Debug)]
pub struct PageOutcome {
    pub page: PathBuf,
    pub result: PipelineResult<PageReport>,
}

impl PageOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-page outcomes of a batch, in sorted page order.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<PageOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub processing_time_ms: u64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when there was at least one page and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded == 0
    }

    /// Total line crops written across successful pages.
    pub fn lines_extracted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(PageReport::line_count)
            .sum()
    }
}

/// Processes every page in `input_dir` into `output_dir`.
///
/// Results are reported in sorted page order regardless of which worker
/// finished first, and the artifacts do not depend on the worker count.
///
/// # Errors
///
/// Fails only when the configuration is invalid, the input directory cannot
/// be listed, or the thread pool cannot be built. Individual page failures
/// are recorded in the report, including pages rejected with
/// `PipelineError::OutputConflict` because another page has the same stem.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    options: BatchOptions,
    recognizer: Option<&dyn TextRecognizer>,
) -> PipelineResult<BatchReport> {
    let start_time = Instant::now();

    config.validate()?;
    let pages = discover_pages(input_dir)?;
    let total = pages.len();
    let conflicts = output_conflicts(&pages);

    if pages.is_empty() {
        warn!(input_dir = %input_dir.display(), "No page images found");
    } else {
        info!(
            input_dir = %input_dir.display(),
            pages = total,
            workers = ?options.workers,
            "Starting batch"
        );
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = options.workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build().map_err(|e| PipelineError::Batch {
        message: format!("failed to build worker pool: {}", e),
    })?;

    let completed = AtomicUsize::new(0);
    let outcomes: Vec<PageOutcome> = pool.install(|| {
        pages
            .par_iter()
            .zip(conflicts.par_iter())
            .map(|(page, conflict)| {
                let result = match conflict {
                    Some(other) => Err(reject_conflicting_page(page, &pages[*other])),
                    None => run_page(page, output_dir, config, options.run, recognizer),
                };
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                info!(
                    page = %page.display(),
                    success = result.is_ok(),
                    "Batch progress: {}/{}",
                    done,
                    total
                );
                PageOutcome {
                    page: page.clone(),
                    result,
                }
            })
            .collect()
    });

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let report = BatchReport {
        failed: outcomes.len() - succeeded,
        succeeded,
        outcomes,
        processing_time_ms: start_time.elapsed().as_millis() as u64,
    };

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        lines = report.lines_extracted(),
        processing_time_ms = report.processing_time_ms,
        "Batch completed"
    );

    Ok(report)
}
