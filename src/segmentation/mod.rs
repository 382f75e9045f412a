//! # Line Segmentation Module
//!
//! This module splits a cleaned binary page into individual text lines.
//!
//! - `labeling`: 8-connected component labeling
//! - `lines`: line merging, ordering, filtering and cropping
//! - `types`: bounding boxes, regions and line crops

pub mod labeling;
pub mod lines;
pub mod types;

pub use labeling::{label_components, Labeling};
pub use lines::segment_lines;
pub use types::{BoundingBox, LineCrop, Region, SegmentationResult};
