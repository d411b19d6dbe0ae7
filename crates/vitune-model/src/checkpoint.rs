//! Tagged checkpoint save/load for run directories
//!
//! Weights go to `<run_dir>/<tag>.safetensors` with a JSON sidecar carrying
//! the epoch and validation accuracy. A tag always overwrites its own slot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aprender::nn::serialize::{load_model, save_model};
use serde::{Deserialize, Serialize};

use crate::vit::VisionTransformer;

/// Sidecar metadata written next to each checkpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epoch at which the snapshot was taken
    pub epoch: usize,
    /// Validation accuracy at snapshot time, if known
    pub accuracy: Option<f32>,
}

/// Serialize current model weights under `tag` inside `run_dir`
///
/// Returns the weight-file path. Overwrites any existing snapshot with the
/// same tag.
pub fn save_checkpoint(
    model: &VisionTransformer,
    run_dir: &Path,
    tag: &str,
    metadata: CheckpointMetadata,
) -> Result<PathBuf> {
    fs::create_dir_all(run_dir)
        .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

    let base = run_dir.join(tag);
    let weights_path = base.with_extension("safetensors");
    save_model(model, &weights_path)
        .map_err(|e| anyhow::anyhow!("Failed to save weights to {}: {}", weights_path.display(), e))?;

    let sidecar_path = base.with_extension("json");
    let json = serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;
    fs::write(&sidecar_path, json)
        .with_context(|| format!("Failed to write metadata file: {}", sidecar_path.display()))?;

    Ok(weights_path)
}

/// Load pretrained weights into an already-constructed model
pub fn load_pretrained(model: &mut VisionTransformer, path: &Path) -> Result<()> {
    load_model(model, path)
        .map_err(|e| anyhow::anyhow!("Failed to load weights from {}: {}", path.display(), e))
}
