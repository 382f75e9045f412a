//! # Pipeline Configuration
//!
//! This module provides the configuration consumed by every pipeline stage.
//! The configuration is an explicit, immutable value: it is loaded once
//! (from YAML or JSON), validated, and then passed by reference into each
//! stage call. Nothing is read implicitly at stage construction time.
//!
//! Numeric fields are stored signed so that a negative value in the document
//! reaches validation and is reported with its key, instead of failing as an
//! opaque parse error.
//!
//! Every preprocessing and segmentation parameter must be present in a
//! loaded document; a missing one is reported by its dotted key. The `ocr`
//! section is optional and falls back to its defaults. Unknown keys at any
//! level are rejected so a misspelled parameter cannot be silently ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{PipelineError, PipelineResult};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "MANUSCRIPT_LINES_CONFIG";

/// Fallback locations searched when no path is given
const FALLBACK_CONFIG_PATHS: [&str; 2] = ["config/config.yaml", "../config/config.yaml"];

/// Keys every configuration document must set, in document order
pub const REQUIRED_KEYS: [&str; 9] = [
    "preprocessing.clahe.clip_limit",
    "preprocessing.clahe.tile_grid_size",
    "preprocessing.threshold.block_size",
    "preprocessing.threshold.k",
    "preprocessing.morphology.guide_removal_kernel",
    "preprocessing.morphology.line_closing_kernel",
    "segmentation.min_line_height",
    "segmentation.max_line_height",
    "segmentation.horizontal_margin",
];

/// Contrast-limited adaptive histogram equalization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaheConfig {
    /// Clip limit relative to a flat histogram (must be > 0)
    pub clip_limit: f64,
    /// Tile grid as [columns, rows]
    pub tile_grid_size: [i64; 2],
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid_size: [8, 8],
        }
    }
}

impl ClaheConfig {
    /// Validate CLAHE configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.clip_limit.is_finite() || self.clip_limit <= 0.0 {
            return Err(PipelineError::config(
                "preprocessing.clahe.clip_limit",
                self.clip_limit,
                "must be a finite number > 0",
            ));
        }

        if self.tile_grid_size.iter().any(|&n| n < 1 || n > u32::MAX as i64) {
            return Err(PipelineError::config(
                "preprocessing.clahe.tile_grid_size",
                format!("{:?}", self.tile_grid_size),
                "both grid dimensions must be >= 1",
            ));
        }

        Ok(())
    }
}

/// Local (Niblack) thresholding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Side of the square statistics window (positive, odd)
    pub block_size: i64,
    /// Weight of the local standard deviation, usually negative
    pub k: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            block_size: 25,
            k: -0.2,
        }
    }
}

impl ThresholdConfig {
    /// Validate thresholding configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.block_size <= 0 || self.block_size > u32::MAX as i64 {
            return Err(PipelineError::config(
                "preprocessing.threshold.block_size",
                self.block_size,
                "must be a positive odd integer",
            ));
        }

        if self.block_size % 2 == 0 {
            return Err(PipelineError::config(
                "preprocessing.threshold.block_size",
                self.block_size,
                "must be odd",
            ));
        }

        if !self.k.is_finite() {
            return Err(PipelineError::config(
                "preprocessing.threshold.k",
                self.k,
                "must be a finite number",
            ));
        }

        Ok(())
    }
}

/// Structuring elements for the morphological stages, as [width, height]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MorphologyConfig {
    /// Opening kernel isolating ruled guidelines
    pub guide_removal_kernel: [i64; 2],
    /// Closing kernel merging the words of one line
    pub line_closing_kernel: [i64; 2],
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            guide_removal_kernel: [40, 1],
            line_closing_kernel: [30, 3],
        }
    }
}

impl MorphologyConfig {
    /// Validate both structuring elements
    pub fn validate(&self) -> PipelineResult<()> {
        validate_kernel(
            "preprocessing.morphology.guide_removal_kernel",
            self.guide_removal_kernel,
        )?;
        validate_kernel(
            "preprocessing.morphology.line_closing_kernel",
            self.line_closing_kernel,
        )?;
        Ok(())
    }
}

pub(crate) fn validate_kernel(key: &'static str, kernel: [i64; 2]) -> PipelineResult<(u32, u32)> {
    match kernel {
        [w, h] if w >= 1 && h >= 1 && w <= u32::MAX as i64 && h <= u32::MAX as i64 => {
            Ok((w as u32, h as u32))
        }
        _ => Err(PipelineError::config(
            key,
            format!("{:?}", kernel),
            "kernel width and height must be >= 1",
        )),
    }
}

/// Geometric filter and crop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentationConfig {
    /// Smallest accepted line height in pixels
    pub min_line_height: i64,
    /// Largest accepted line height in pixels
    pub max_line_height: i64,
    /// Padding added on the left and right of every crop
    pub horizontal_margin: i64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_line_height: 15,
            max_line_height: 60,
            horizontal_margin: 10,
        }
    }
}

impl SegmentationConfig {
    /// Validate segmentation configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.min_line_height < 1 || self.min_line_height > u32::MAX as i64 {
            return Err(PipelineError::config(
                "segmentation.min_line_height",
                self.min_line_height,
                "must be a positive integer",
            ));
        }

        if self.max_line_height < 1 || self.max_line_height > u32::MAX as i64 {
            return Err(PipelineError::config(
                "segmentation.max_line_height",
                self.max_line_height,
                "must be a positive integer",
            ));
        }

        if self.min_line_height > self.max_line_height {
            return Err(PipelineError::config(
                "segmentation.min_line_height",
                self.min_line_height,
                format!(
                    "cannot be greater than segmentation.max_line_height ({})",
                    self.max_line_height
                ),
            ));
        }

        if self.horizontal_margin < 0 || self.horizontal_margin > u32::MAX as i64 {
            return Err(PipelineError::config(
                "segmentation.horizontal_margin",
                self.horizontal_margin,
                "must be a non-negative integer",
            ));
        }

        Ok(())
    }
}

/// Settings for the downstream text recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    /// Lines below this confidence are left out of plain-text transcripts
    pub confidence_threshold: f64,
    /// Recognizer model or data directory
    pub model: Option<PathBuf>,
    /// Recognizer language set
    pub languages: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            model: None,
            languages: "eng".to_string(),
        }
    }
}

impl OcrConfig {
    /// Validate recognizer configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::config(
                "ocr.confidence_threshold",
                self.confidence_threshold,
                "must be within [0, 1]",
            ));
        }

        if self.languages.trim().is_empty() {
            return Err(PipelineError::config(
                "ocr.languages",
                "\"\"",
                "cannot be empty",
            ));
        }

        Ok(())
    }
}

/// Preprocessing stages grouped as in the configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessingConfig {
    pub clahe: ClaheConfig,
    pub threshold: ThresholdConfig,
    pub morphology: MorphologyConfig,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub preprocessing: PreprocessingConfig,
    pub segmentation: SegmentationConfig,
    pub ocr: OcrConfig,
}

impl PipelineConfig {
    /// Validate all configuration sections
    pub fn validate(&self) -> PipelineResult<()> {
        self.preprocessing.clahe.validate()?;
        self.preprocessing.threshold.validate()?;
        self.preprocessing.morphology.validate()?;
        self.segmentation.validate()?;
        self.ocr.validate()?;
        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(source: &str) -> PipelineResult<Self> {
        let inline = Path::new("<inline>");
        let document: Value = serde_yaml::from_str(source).map_err(|e| PipelineError::ConfigLoad {
            path: inline.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_document(document, inline)
    }

    /// Check required keys, deserialize and validate a parsed document
    fn from_document(document: Value, path: &Path) -> PipelineResult<Self> {
        if let Some(&missing) = REQUIRED_KEYS
            .iter()
            .find(|key| lookup_key(&document, key).is_none())
        {
            return Err(PipelineError::config(
                missing,
                "<missing>",
                "required key is missing",
            ));
        }

        let config: Self = serde_json::from_value(document).map_err(|e| PipelineError::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn from_path(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let document: Value = if is_json {
            serde_json::from_str(&content).map_err(|e| PipelineError::ConfigLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| PipelineError::ConfigLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        let config = Self::from_document(document, path)?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Resolve and load the configuration.
    ///
    /// An explicit path wins; otherwise the `MANUSCRIPT_LINES_CONFIG`
    /// environment variable, then the fallback paths. When nothing is found
    /// the defaults are used. A file that exists but is invalid is always an
    /// error.
    pub fn load(explicit: Option<&Path>) -> PipelineResult<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }

        if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
            info!(
                "Loading pipeline config from environment variable: {}",
                config_path
            );
            return Self::from_path(Path::new(&config_path));
        }

        for config_path in FALLBACK_CONFIG_PATHS {
            let path = Path::new(config_path);
            if path.is_file() {
                return Self::from_path(path);
            }
        }

        warn!("No pipeline config file found in any expected location. Using defaults.");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        let p = &self.preprocessing;
        format!(
            "Configuration: clip_limit={}, tile_grid={:?}, block_size={}, k={}, guide_kernel={:?}, closing_kernel={:?}, line_height=[{}, {}], margin={}",
            p.clahe.clip_limit,
            p.clahe.tile_grid_size,
            p.threshold.block_size,
            p.threshold.k,
            p.morphology.guide_removal_kernel,
            p.morphology.line_closing_kernel,
            self.segmentation.min_line_height,
            self.segmentation.max_line_height,
            self.segmentation.horizontal_margin
        )
    }
}

/// Follow a dotted key through nested mappings; explicit nulls count as absent
fn lookup_key<'a>(document: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .try_fold(document, |node, part| node.get(part))
        .filter(|value| !value.is_null())
}
