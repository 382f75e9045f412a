//! # Pipeline Error Types
//!
//! This module defines the error taxonomy shared by every stage of the
//! line-extraction pipeline and by the outer layers (page I/O, recognition,
//! batch driver). Each variant carries enough context (parameter name and
//! value, or the page path) for the caller to report precisely.

use std::path::PathBuf;

use thiserror::Error;

/// General pipeline error type for consistent error handling
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or missing configuration parameter
    #[error("[CONFIG] invalid value for '{key}': {value} ({reason})")]
    Config {
        key: &'static str,
        value: String,
        reason: String,
    },
    /// Configuration document could not be read or parsed
    #[error("[CONFIG] failed to load configuration from '{}': {message}", path.display())]
    ConfigLoad { path: PathBuf, message: String },
    /// Input page could not be read or decoded
    #[error("[DECODE] failed to decode page '{}': {message}", path.display())]
    Decode { path: PathBuf, message: String },
    /// Rasters derived from one page disagree on dimensions
    #[error("[DIMENSIONS] {stage}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        stage: &'static str,
        expected: (u32, u32),
        found: (u32, u32),
    },
    /// Writing an output image failed
    #[error("[ENCODE] failed to write image '{}': {message}", path.display())]
    Encode { path: PathBuf, message: String },
    /// File system errors
    #[error("[FILESYSTEM] {operation} '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Two input pages would write the same output artifacts
    #[error(
        "[CONFLICT] page '{}' shares output name '{stem}' with '{}'",
        path.display(),
        other.display()
    )]
    OutputConflict {
        path: PathBuf,
        other: PathBuf,
        stem: String,
    },
    /// Batch driver could not be set up
    #[error("[BATCH] {message}")]
    Batch { message: String },
    /// Text recognizer failed on a line
    #[error("[RECOGNITION] {line}: {message}")]
    Recognition { line: String, message: String },
}

impl PipelineError {
    /// Builds a configuration error for `key` holding `value`.
    pub fn config(key: &'static str, value: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        PipelineError::Config {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Builds an I/O error tagged with the operation and path involved.
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable label, used as a metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Batch { .. } => "batch",
            PipelineError::Config { .. } | PipelineError::ConfigLoad { .. } => "config",
            PipelineError::OutputConflict { .. } => "conflict",
            PipelineError::Decode { .. } => "decode",
            PipelineError::DimensionMismatch { .. } => "dimensions",
            PipelineError::Encode { .. } => "encode",
            PipelineError::Io { .. } => "io",
            PipelineError::Recognition { .. } => "recognition",
        }
    }
}

/// Result type alias for convenience
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use std::path::Path;
    use tracing::error;

    /// Log a page that failed to process, with the stage that failed
    pub fn log_page_error(
        error: &super::PipelineError,
        operation: &str,
        page: &Path,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            error_kind = error.kind(),
            operation = %operation,
            page = %page.display(),
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Page processing failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_source: &str) {
        error!(
            error = %error,
            config_source = %config_source,
            "Configuration error"
        );
    }
}
