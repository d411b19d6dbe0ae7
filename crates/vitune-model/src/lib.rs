//! Vision transformer backbone with bottleneck adapters
//!
//! This crate provides the model side of the vitune workspace:
//! - ViT encoder (patch embedding, pre-norm blocks, classification head)
//! - Bottleneck adapter modules injected in parallel with each block branch
//! - A closed backbone registry mapping backbone ids to construction and
//!   trainable-parameter rules
//! - Tagged checkpoint save/load for run directories

pub mod adapter;
pub mod attention;
pub mod backbone;
pub mod checkpoint;
pub mod config;
mod init;
pub mod mlp;
pub mod norm;
mod ops;
pub mod patch_embed;
pub mod vit;

/// Backbone registry
///
/// Closed enumeration of supported backbones with per-variant construction
/// and trainable-parameter rules.
pub use backbone::{Backbone, BackboneParams};

/// Model architecture configuration
pub use config::ViTConfig;

/// The vision transformer model
pub use vit::VisionTransformer;

/// Tagged checkpoint management for run directories
pub use checkpoint::{load_pretrained, save_checkpoint, CheckpointMetadata};

// Re-export common types for convenience
/// Result type alias for error handling
pub use anyhow::Result;
