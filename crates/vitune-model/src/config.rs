//! Model architecture configuration

use serde::{Deserialize, Serialize};

/// Architecture hyperparameters for the vision transformer
///
/// The default values describe the ViT-Base/16 encoder at 224x224 input.
/// `num_classes`, the adapter shape and the stochastic-depth rate are filled
/// in per run by the backbone registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViTConfig {
    /// Input image side length (square inputs)
    pub img_size: usize,
    /// Patch side length
    pub patch_size: usize,
    /// Input channels
    pub in_chans: usize,
    /// Token embedding dimension
    pub embed_dim: usize,
    /// Number of encoder blocks
    pub depth: usize,
    /// Number of attention heads
    pub n_head: usize,
    /// MLP hidden expansion factor
    pub mlp_ratio: usize,
    /// Classification head width
    pub num_classes: usize,
    /// Adapter bottleneck rank
    pub adapter_dim: usize,
    /// Adapter output scaling
    pub adapter_scale: f32,
    /// Stochastic depth rate on residual branches
    pub drop_path: f32,
    /// Seed for weight initialization (None = non-deterministic)
    pub seed: Option<u64>,
}

impl Default for ViTConfig {
    fn default() -> Self {
        Self {
            img_size: 224,
            patch_size: 16,
            in_chans: 3,
            embed_dim: 768,
            depth: 12,
            n_head: 12,
            mlp_ratio: 4,
            num_classes: 1000,
            adapter_dim: 2,
            adapter_scale: 1.0,
            drop_path: 0.0,
            seed: None,
        }
    }
}

impl ViTConfig {
    /// Number of patch tokens produced by the patch embedding
    pub fn num_patches(&self) -> usize {
        (self.img_size / self.patch_size) * (self.img_size / self.patch_size)
    }

    /// Flattened per-patch input width
    pub fn patch_dim(&self) -> usize {
        self.in_chans * self.patch_size * self.patch_size
    }
}
