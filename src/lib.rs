//! # Manuscript Lines
//!
//! Preprocessing and line segmentation for scanned handwritten manuscript
//! pages. A page is contrast-normalized (CLAHE), binarized with a local
//! Niblack threshold, cleared of ruled guidelines, and cut into one image per
//! text line in reading order, ready for a line-level text recognizer.

pub mod batch;
pub mod config;
pub mod errors;
pub mod observability;
pub mod page_io;
pub mod pipeline;
pub mod preprocessing;
pub mod recognition;
pub mod segmentation;

// Re-export types for easier access
pub use config::PipelineConfig;
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{process_page, run_page, PageOutput, PageReport, RunOptions};
pub use segmentation::LineCrop;
