//! # Observability Module
//!
//! Structured logging setup and the pipeline's metrics.
//!
//! Metrics go through the `metrics` facade. No exporter is installed here,
//! so recording is a no-op unless the embedding application installs a
//! recorder.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level for this crate's targets (`error` .. `trace`)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Initialize structured logging with tracing.
///
/// `RUST_LOG` directives are honoured; `manuscript_lines=<level>` is added on
/// top. Fails if a global subscriber is already installed or the level does
/// not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("manuscript_lines={}", config.level).parse()?)
        .add_directive(format!("line_preprocessing={}", config.level).parse()?);

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::debug!(
        log_level = %config.level,
        log_format = ?config.format,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span covering all work on one page
pub fn page_span(page: &Path) -> tracing::Span {
    tracing::info_span!("page", page = %page.display(), component = "pipeline")
}

/// Record a successfully processed page
pub fn record_page_success(lines: usize, duration: Duration) {
    metrics::counter!("pages_processed_total").increment(1);
    metrics::counter!("lines_extracted_total").increment(lines as u64);
    metrics::histogram!("page_processing_duration_seconds").record(duration.as_secs_f64());
}

/// Record a page that failed, labelled by error kind
pub fn record_page_failure(reason: &'static str, duration: Duration) {
    metrics::counter!("pages_failed_total", "reason" => reason).increment(1);
    metrics::histogram!("page_processing_duration_seconds").record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_command_line_values() {
        use clap::ValueEnum;

        assert_eq!(LogFormat::from_str("json", false), Ok(LogFormat::Json));
        assert_eq!(LogFormat::from_str("PRETTY", true), Ok(LogFormat::Pretty));
        assert!(LogFormat::from_str("xml", true).is_err());
    }

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let config = LoggingConfig {
            level: "not a level!".to_string(),
            format: LogFormat::Json,
        };
        assert!(init_tracing(&config).is_err());
    }

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        record_page_success(5, Duration::from_millis(12));
        record_page_failure("decode", Duration::from_millis(3));
    }
}
