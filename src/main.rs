//! manuscript-lines command line interface
//!
//! # Usage
//!
//! ```bash
//! manuscript-lines run pages/folio_001.jpg -o output --overlay
//! manuscript-lines batch pages/ -o output --workers 4
//! manuscript-lines batch pages/ -o output --transcript json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manuscript_lines::batch::{run_batch, BatchOptions};
use manuscript_lines::config::PipelineConfig;
use manuscript_lines::errors::error_logging;
use manuscript_lines::observability::{self, LogFormat, LoggingConfig};
use manuscript_lines::pipeline::{run_page, RunOptions};
use manuscript_lines::recognition::{TextRecognizer, TranscriptFormat};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "manuscript-lines")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract text-line images from scanned manuscript pages", long_about = None)]
struct Cli {
    /// Log level for this tool (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty", env = "LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single page
    Run {
        /// Page image (PNG or JPEG)
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also write the page with the line boxes drawn on it
        #[arg(long)]
        overlay: bool,

        /// Recognize the lines and write a transcript in this format
        #[arg(long, value_enum)]
        transcript: Option<TranscriptFormat>,
    },
    /// Process every page image in a directory
    Batch {
        /// Directory containing page images
        input_dir: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads (defaults to the number of CPUs)
        #[arg(long)]
        workers: Option<usize>,

        /// Also write the page with the line boxes drawn on it
        #[arg(long)]
        overlay: bool,

        /// Recognize the lines of every page and write transcripts in this format
        #[arg(long, value_enum)]
        transcript: Option<TranscriptFormat>,
    },
}

fn main() -> ExitCode {
    // Load .env before clap reads environment fallbacks
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
    };
    if let Err(e) = observability::init_tracing(&logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match execute(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command; `Ok(false)` means it ran but produced nothing usable.
fn execute(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            input,
            output,
            config,
            overlay,
            transcript,
        } => {
            let config = load_config(config.as_deref())?;
            let recognizer = match transcript {
                Some(_) => build_recognizer(&config)?,
                None => None,
            };

            let options = RunOptions {
                overlay,
                transcript,
            };
            let report = run_page(&input, &output, &config, options, recognizer.as_deref())
                .with_context(|| format!("Failed to process page '{}'", input.display()))?;

            info!(
                lines = report.line_count(),
                output = %output.display(),
                "Pipeline complete"
            );
            if let Some(path) = &report.transcript_path {
                info!(transcript = %path.display(), "Transcript written");
            }
            Ok(true)
        }
        Commands::Batch {
            input_dir,
            output,
            config,
            workers,
            overlay,
            transcript,
        } => {
            let config = load_config(config.as_deref())?;
            let recognizer = match transcript {
                Some(_) => build_recognizer(&config)?,
                None => None,
            };

            let options = BatchOptions {
                workers,
                run: RunOptions {
                    overlay,
                    transcript,
                },
            };

            let report = run_batch(&input_dir, &output, &config, options, recognizer.as_deref())
                .with_context(|| format!("Failed to run batch over '{}'", input_dir.display()))?;

            for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
                if let Err(e) = &outcome.result {
                    warn!(page = %outcome.page.display(), error = %e, "Page skipped");
                }
            }

            info!(
                total = report.total(),
                succeeded = report.succeeded,
                failed = report.failed,
                lines = report.lines_extracted(),
                "Batch complete"
            );
            Ok(!report.all_failed())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = PipelineConfig::load(path).map_err(|e| {
        error_logging::log_config_error(&e, "pipeline configuration");
        e
    })?;
    info!("{}", config.summary());
    Ok(config)
}

#[cfg(feature = "tesseract")]
fn build_recognizer(config: &PipelineConfig) -> Result<Option<Box<dyn TextRecognizer>>> {
    let recognizer = manuscript_lines::recognition::TesseractRecognizer::new(&config.ocr)
        .context("Failed to initialize the Tesseract recognizer")?;
    Ok(Some(Box::new(recognizer)))
}

#[cfg(not(feature = "tesseract"))]
fn build_recognizer(_config: &PipelineConfig) -> Result<Option<Box<dyn TextRecognizer>>> {
    warn!("No text recognizer available (build with --features tesseract); skipping transcript");
    Ok(None)
}
