//! Closed backbone registry
//!
//! Each supported backbone is one table row: a construction function plus
//! the naming rule that selects its trainable parameters. Adding a backbone
//! means adding an enum variant and a row, not a new conditional branch.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::ViTConfig;
use crate::vit::VisionTransformer;

/// Per-run knobs threaded into backbone construction
#[derive(Debug, Clone, Copy)]
pub struct BackboneParams {
    /// Classification head width
    pub num_classes: usize,
    /// Adapter bottleneck rank
    pub adapter_dim: usize,
    /// Adapter output scaling
    pub adapter_scale: f32,
    /// Stochastic depth rate
    pub drop_path: f32,
    /// Weight initialization seed
    pub seed: Option<u64>,
}

/// Supported backbones
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Backbone {
    /// ViT-Base/16 at 224x224, ImageNet-21k pretraining layout
    #[value(name = "vit_base_patch16_224_in21k")]
    VitBasePatch16_224In21k,
}

struct BackboneSpec {
    name: &'static str,
    adapter_marker: &'static str,
    build: fn(&BackboneParams) -> VisionTransformer,
}

fn build_vit_base(params: &BackboneParams) -> VisionTransformer {
    VisionTransformer::new(ViTConfig {
        num_classes: params.num_classes,
        adapter_dim: params.adapter_dim,
        adapter_scale: params.adapter_scale,
        drop_path: params.drop_path,
        seed: params.seed,
        ..ViTConfig::default()
    })
}

const VIT_BASE_SPEC: BackboneSpec = BackboneSpec {
    name: "vit_base_patch16_224_in21k",
    adapter_marker: "adapter",
    build: build_vit_base,
};

impl Backbone {
    fn spec(self) -> &'static BackboneSpec {
        match self {
            Backbone::VitBasePatch16_224In21k => &VIT_BASE_SPEC,
        }
    }

    /// Canonical backbone id (used in run-directory paths)
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Construct a freshly initialized model
    pub fn build(self, params: &BackboneParams) -> VisionTransformer {
        (self.spec().build)(params)
    }

    /// Whether a parameter name belongs to the trainable set:
    /// adapter parameters plus the classification head weight and bias.
    pub fn is_trainable(self, name: &str) -> bool {
        name.contains(self.spec().adapter_marker) || name == "head.weight" || name == "head.bias"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backbone_name_roundtrip() {
        let backbone =
            Backbone::from_str("vit_base_patch16_224_in21k", false).expect("known backbone");
        assert_eq!(backbone, Backbone::VitBasePatch16_224In21k);
        assert_eq!(backbone.name(), "vit_base_patch16_224_in21k");
    }

    #[test]
    fn test_unknown_backbone_rejected() {
        assert!(Backbone::from_str("resnet50", false).is_err());
    }

    #[test]
    fn test_trainable_rule() {
        let backbone = Backbone::VitBasePatch16_224In21k;
        assert!(backbone.is_trainable("blocks.3.adapter_mlp.down.weight"));
        assert!(backbone.is_trainable("head.weight"));
        assert!(backbone.is_trainable("head.bias"));
        assert!(!backbone.is_trainable("blocks.3.attn.qkv.weight"));
        assert!(!backbone.is_trainable("pos_embed"));
    }
}
