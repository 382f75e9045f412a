//! # Image Preprocessing Module
//!
//! This module turns a raw grayscale manuscript page into a clean binary
//! foreground mask ready for line segmentation.
//!
//! The module is organized into focused sub-modules:
//! - `enhance`: local contrast normalization (CLAHE)
//! - `thresholding`: adaptive local binarization (Niblack)
//! - `morphology`: binary morphology and ruled guideline removal
//! - `types`: shared raster and result types

pub mod enhance;
pub mod morphology;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{
    BinaryMask, ClaheImageResult, GuidelineRemovalResult, MorphologicalMaskResult,
    MorphologicalOperation, StructuringElement, ThresholdedMaskResult,
};

pub use enhance::apply_clahe;
pub use morphology::{apply_morphological_operation, dilate, erode, remove_guidelines};
pub use thresholding::apply_niblack_threshold;
