//! Trainable-parameter partition
//!
//! The backbone's trainable rule picks adapter parameters plus the
//! classification head; those are split into exactly two optimizer groups by
//! a naming rule: `.bias`-suffixed parameters take no weight decay, the rest
//! take the configured coefficient.

use vitune_model::{Backbone, VisionTransformer};

/// One optimizer partition and the decay coefficient it carries
#[derive(Debug, Clone)]
pub struct ParameterGroup {
    pub name: &'static str,
    pub weight_decay: f32,
    pub param_names: Vec<String>,
    pub numel: usize,
}

/// Split the model's trainable parameters into (no-decay, decay) groups
pub fn partition_trainable(
    model: &VisionTransformer,
    backbone: Backbone,
    weight_decay: f32,
) -> (ParameterGroup, ParameterGroup) {
    let mut no_decay = ParameterGroup {
        name: "no_decay",
        weight_decay: 0.0,
        param_names: Vec::new(),
        numel: 0,
    };
    let mut decay = ParameterGroup {
        name: "decay",
        weight_decay,
        param_names: Vec::new(),
        numel: 0,
    };

    for (name, param) in model.named_parameters() {
        if !backbone.is_trainable(&name) {
            continue;
        }
        let numel: usize = param.shape().iter().product();
        if name.ends_with(".bias") {
            no_decay.numel += numel;
            no_decay.param_names.push(name);
        } else {
            decay.numel += numel;
            decay.param_names.push(name);
        }
    }

    (no_decay, decay)
}

/// Trainable parameter count outside the classification head
pub fn trainable_backbone_numel(model: &VisionTransformer, backbone: Backbone) -> usize {
    model
        .named_parameters()
        .into_iter()
        .filter(|(name, _)| backbone.is_trainable(name) && !name.contains("head"))
        .map(|(_, param)| param.shape().iter().product::<usize>())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitune_model::ViTConfig;

    fn tiny_model() -> VisionTransformer {
        VisionTransformer::new(ViTConfig {
            img_size: 16,
            patch_size: 8,
            embed_dim: 8,
            depth: 2,
            n_head: 2,
            mlp_ratio: 2,
            num_classes: 4,
            adapter_dim: 2,
            seed: Some(42),
            ..ViTConfig::default()
        })
    }

    #[test]
    fn test_partition_covers_only_trainable_names() {
        let model = tiny_model();
        let backbone = Backbone::VitBasePatch16_224In21k;
        let (no_decay, decay) = partition_trainable(&model, backbone, 0.05);

        for name in no_decay.param_names.iter().chain(decay.param_names.iter()) {
            assert!(backbone.is_trainable(name), "{name} leaked into a group");
        }
        assert!(!no_decay.param_names.is_empty());
        assert!(!decay.param_names.is_empty());
    }

    #[test]
    fn test_bias_rule_decides_group() {
        let model = tiny_model();
        let (no_decay, decay) =
            partition_trainable(&model, Backbone::VitBasePatch16_224In21k, 0.05);

        assert!(no_decay.param_names.iter().all(|n| n.ends_with(".bias")));
        assert!(decay.param_names.iter().all(|n| !n.ends_with(".bias")));
        assert_eq!(no_decay.weight_decay, 0.0);
        assert_eq!(decay.weight_decay, 0.05);
    }

    #[test]
    fn test_frozen_backbone_excluded() {
        let model = tiny_model();
        let (no_decay, decay) =
            partition_trainable(&model, Backbone::VitBasePatch16_224In21k, 0.05);
        let all: Vec<&String> = no_decay.param_names.iter().chain(decay.param_names.iter()).collect();
        assert!(all.iter().all(|n| !n.contains("attn.qkv")));
        assert!(all.iter().all(|n| !n.starts_with("patch_embed")));
        assert!(all.iter().any(|n| n.as_str() == "head.weight"));
        assert!(all.iter().any(|n| n.as_str() == "head.bias"));
    }

    #[test]
    fn test_backbone_numel_excludes_head() {
        let model = tiny_model();
        let backbone = Backbone::VitBasePatch16_224In21k;
        let (no_decay, decay) = partition_trainable(&model, backbone, 0.05);
        let head_numel: usize = model
            .named_parameters()
            .into_iter()
            .filter(|(n, _)| n.starts_with("head"))
            .map(|(_, p)| p.shape().iter().product::<usize>())
            .sum();
        assert_eq!(
            trainable_backbone_numel(&model, backbone),
            no_decay.numel + decay.numel - head_numel
        );
    }
}
