//! # Line Recognition Module
//!
//! The seam between line extraction and a text recognizer. The pipeline only
//! depends on the [`TextRecognizer`] trait; a Tesseract-backed implementation
//! is available behind the `tesseract` feature.
//!
//! Transcripts follow two formats:
//! - JSON: every line that produced a prediction, as `{file, text, confidence}`
//! - plain text: one line of text per entry whose confidence reaches the threshold

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{PipelineError, PipelineResult};
use crate::segmentation::LineCrop;

/// One recognizer hypothesis for a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
}

impl Prediction {
    /// Creates a prediction, clamping `confidence` into `[0, 1]` (NaN becomes 0).
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A recognizer that turns one line crop into ranked predictions.
///
/// Implementations must be shareable across the batch worker threads.
pub trait TextRecognizer: Send + Sync {
    /// Recognizes a single line; predictions are ordered best first.
    fn recognize(&self, crop: &LineCrop) -> PipelineResult<Vec<Prediction>>;
}

/// Transcript entry for one line crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTranscription {
    /// Crop file name, e.g. `line_003.png`
    pub file: String,
    pub text: String,
    pub confidence: f64,
}

/// On-disk transcript format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TranscriptFormat {
    /// Plain text, thresholded by confidence
    Txt,
    /// JSON array of every recognized line
    Json,
}

impl TranscriptFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Txt => "txt",
            TranscriptFormat::Json => "json",
        }
    }
}

/// Runs `recognizer` over the crops in order.
///
/// The first prediction of each line is kept; lines without any prediction
/// are left out of the transcript.
pub fn transcribe_lines(
    recognizer: &dyn TextRecognizer,
    crops: &[LineCrop],
) -> PipelineResult<Vec<LineTranscription>> {
    let mut transcriptions = Vec::with_capacity(crops.len());

    for crop in crops {
        let predictions = recognizer.recognize(crop)?;
        match predictions.into_iter().next() {
            Some(best) => transcriptions.push(LineTranscription {
                file: crop.file_name(),
                text: best.text,
                confidence: best.confidence,
            }),
            None => debug!(line = %crop.file_name(), "Recognizer returned no prediction"),
        }
    }

    Ok(transcriptions)
}

/// Writes a transcript to `path`.
///
/// A `.json` extension selects the JSON format with every entry; anything
/// else writes plain text containing only entries whose confidence is at
/// least `confidence_threshold`.
pub fn write_transcript(
    path: &Path,
    transcriptions: &[LineTranscription],
    confidence_threshold: f64,
) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io("create directory", parent, e))?;
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let content = if is_json {
        serde_json::to_string_pretty(transcriptions).map_err(|e| PipelineError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
    } else {
        let kept: Vec<&LineTranscription> = transcriptions
            .iter()
            .filter(|t| t.confidence >= confidence_threshold)
            .collect();
        let dropped = transcriptions.len() - kept.len();
        if dropped > 0 {
            warn!(
                dropped,
                threshold = confidence_threshold,
                "Lines below confidence threshold left out of transcript"
            );
        }
        kept.iter().map(|t| format!("{}\n", t.text)).collect()
    };

    fs::write(path, content).map_err(|e| PipelineError::io("write transcript", path, e))
}

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::io::Cursor;
    use std::sync::Mutex;

    use image::{DynamicImage, ImageFormat};
    use leptess::LepTess;
    use tracing::info;

    use super::{Prediction, TextRecognizer};
    use crate::config::OcrConfig;
    use crate::errors::{PipelineError, PipelineResult};
    use crate::segmentation::LineCrop;

    /// Page segmentation mode treating the image as a single text line.
    const PSM_SINGLE_LINE: &str = "7";

    /// Tesseract recognizer; one engine instance guarded by a mutex.
    pub struct TesseractRecognizer {
        tess: Mutex<LepTess>,
    }

    impl TesseractRecognizer {
        /// Initializes Tesseract with `ocr.languages`, using `ocr.model` as the
        /// tessdata directory when set.
        pub fn new(config: &OcrConfig) -> PipelineResult<Self> {
            let init_error = |message: String| PipelineError::Recognition {
                line: "<init>".to_string(),
                message,
            };

            let tessdata = config
                .model
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned());

            let mut tess = LepTess::new(tessdata.as_deref(), &config.languages)
                .map_err(|e| init_error(format!("Failed to initialize Tesseract: {}", e)))?;

            tess.set_variable(leptess::Variable::TesseditPagesegMode, PSM_SINGLE_LINE)
                .map_err(|e| init_error(format!("Failed to set PSM mode: {}", e)))?;

            info!(
                languages = %config.languages,
                tessdata = ?tessdata,
                "Initialized Tesseract recognizer"
            );

            Ok(Self {
                tess: Mutex::new(tess),
            })
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(&self, crop: &LineCrop) -> PipelineResult<Vec<Prediction>> {
            let line_error = |message: String| PipelineError::Recognition {
                line: crop.file_name(),
                message,
            };

            let mut png = Cursor::new(Vec::new());
            DynamicImage::ImageLuma8(crop.image.clone())
                .write_to(&mut png, ImageFormat::Png)
                .map_err(|e| line_error(format!("Failed to encode line: {}", e)))?;

            let mut tess = self
                .tess
                .lock()
                .map_err(|_| line_error("Tesseract instance lock poisoned".to_string()))?;

            tess.set_image_from_mem(png.get_ref())
                .map_err(|e| line_error(format!("Failed to load line image: {}", e)))?;

            let text = tess
                .get_utf8_text()
                .map_err(|e| line_error(format!("Failed to extract text: {}", e)))?;
            let confidence = tess.mean_text_conf() as f64 / 100.0;

            let text = text.trim();
            if text.is_empty() {
                return Ok(Vec::new());
            }

            Ok(vec![Prediction::new(text, confidence)])
        }
    }
}
