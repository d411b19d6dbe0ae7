//! Data side of the vitune workspace
//!
//! - Closed dataset enumerations with per-task class counts
//! - Split datasets stored as binary tensor shards
//! - Named augmentation profiles
//! - A shuffled batching loader with an optional collate hook

pub mod catalog;
pub mod dataset;
pub mod loader;
pub mod transform;

/// Dataset enumerations and class-count tables
pub use catalog::{SourceDataset, TargetDataset, VtabTask, DG_NUM_CLASSES};

/// Split shard reader and writer
pub use dataset::{write_split, DatasetError, SplitDataset};

/// Batching loader
pub use loader::{CollateFn, Loader};

/// Augmentation profiles
pub use transform::{TransformProfile, INPUT_SIZE};
