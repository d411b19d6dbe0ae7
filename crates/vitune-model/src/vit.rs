//! Vision transformer encoder and classification head

use std::sync::Mutex;

use anyhow::Result;
use aprender::autograd::Tensor;
use aprender::nn::{Linear, Module};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::adapter::Adapter;
use crate::attention::Attention;
use crate::config::ViTConfig;
use crate::init::{normal_tensor, zeros_tensor};
use crate::mlp::Mlp;
use crate::norm::LayerNorm;
use crate::ops::{named_linear, named_linear_mut};

/// Stochastic depth on a residual branch
///
/// During training each sample's branch output is dropped with probability
/// `rate` and the survivors are rescaled by `1 / (1 - rate)`. The rng lives
/// behind a RefCell so forward can stay `&self` like the other modules.
struct DropPath {
    rate: f32,
    rng: Mutex<StdRng>,
}

impl DropPath {
    fn new(rate: f32, seed: u64) -> Self {
        Self {
            rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn forward(&self, x: &Tensor, training: bool) -> Tensor {
        if !training || self.rate <= 0.0 {
            return x.clone();
        }

        let shape = x.shape();
        let batch = shape[0];
        let per_sample: usize = shape[1..].iter().product();
        let keep_prob = 1.0 - self.rate;

        let mut rng = self.rng.lock().unwrap();
        let data = x.data();
        let mut output = vec![0.0; data.len()];
        for b in 0..batch {
            let keep = rng.gen_range(0.0_f32..1.0_f32) < keep_prob;
            if keep {
                let offset = b * per_sample;
                for i in 0..per_sample {
                    output[offset + i] = data[offset + i] / keep_prob;
                }
            }
        }

        Tensor::new(&output, shape)
    }
}

/// Pre-norm encoder block with parallel adapters
///
/// `x = x + drop_path(attn(norm1(x)) + adapter_attn(norm1(x)))`
/// `x = x + drop_path(mlp(norm2(x)) + adapter_mlp(norm2(x)))`
pub struct Block {
    norm1: LayerNorm,
    attn: Attention,
    adapter_attn: Adapter,
    norm2: LayerNorm,
    mlp: Mlp,
    adapter_mlp: Adapter,
    drop_path: DropPath,
}

impl Block {
    fn new(config: &ViTConfig, drop_path_seed: u64) -> Self {
        Self {
            norm1: LayerNorm::new(config.embed_dim),
            attn: Attention::new(config.embed_dim, config.n_head),
            adapter_attn: Adapter::new(config.embed_dim, config.adapter_dim, config.adapter_scale),
            norm2: LayerNorm::new(config.embed_dim),
            mlp: Mlp::new(config.embed_dim, config.mlp_ratio),
            adapter_mlp: Adapter::new(config.embed_dim, config.adapter_dim, config.adapter_scale),
            drop_path: DropPath::new(config.drop_path, drop_path_seed),
        }
    }

    /// Forward pass over `[batch, tokens, embed_dim]`
    pub fn forward(&self, x: &Tensor, training: bool) -> Result<Tensor> {
        let normed = self.norm1.forward(x)?;
        let branch = self
            .attn
            .forward(&normed)?
            .add(&self.adapter_attn.forward(&normed)?);
        let x = self.drop_path.forward(&branch, training).add(x);

        let normed = self.norm2.forward(&x)?;
        let branch = self
            .mlp
            .forward(&normed)?
            .add(&self.adapter_mlp.forward(&normed)?);
        Ok(self.drop_path.forward(&branch, training).add(&x))
    }

    fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Tensor)>) {
        self.norm1.named_parameters(&format!("{prefix}.norm1"), out);
        self.attn.named_parameters(&format!("{prefix}.attn"), out);
        self.adapter_attn
            .named_parameters(&format!("{prefix}.adapter_attn"), out);
        self.norm2.named_parameters(&format!("{prefix}.norm2"), out);
        self.mlp.named_parameters(&format!("{prefix}.mlp"), out);
        self.adapter_mlp
            .named_parameters(&format!("{prefix}.adapter_mlp"), out);
    }

    fn named_parameters_mut<'a>(
        &'a mut self,
        prefix: &str,
        out: &mut Vec<(String, &'a mut Tensor)>,
    ) {
        self.norm1
            .named_parameters_mut(&format!("{prefix}.norm1"), out);
        self.attn
            .named_parameters_mut(&format!("{prefix}.attn"), out);
        self.adapter_attn
            .named_parameters_mut(&format!("{prefix}.adapter_attn"), out);
        self.norm2
            .named_parameters_mut(&format!("{prefix}.norm2"), out);
        self.mlp.named_parameters_mut(&format!("{prefix}.mlp"), out);
        self.adapter_mlp
            .named_parameters_mut(&format!("{prefix}.adapter_mlp"), out);
    }
}

/// Vision transformer with class token, learned position embedding and a
/// linear classification head
pub struct VisionTransformer {
    config: ViTConfig,
    cls_token: Tensor,
    pos_embed: Tensor,
    patch_embed: crate::patch_embed::PatchEmbed,
    blocks: Vec<Block>,
    norm: LayerNorm,
    head: Linear,
    training: bool,
}

impl VisionTransformer {
    /// Build and initialize a model from its configuration
    pub fn new(config: ViTConfig) -> Self {
        let mut rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let num_tokens = config.num_patches() + 1;
        let patch_embed = crate::patch_embed::PatchEmbed::new(
            config.img_size,
            config.patch_size,
            config.in_chans,
            config.embed_dim,
        );
        let blocks = (0..config.depth)
            .map(|_| Block::new(&config, rng.gen()))
            .collect();

        let mut model = Self {
            cls_token: zeros_tensor(&[1, 1, config.embed_dim]),
            pos_embed: zeros_tensor(&[1, num_tokens, config.embed_dim]),
            patch_embed,
            blocks,
            norm: LayerNorm::new(config.embed_dim),
            head: Linear::new(config.embed_dim, config.num_classes),
            config,
            training: true,
        };
        model.init_parameters(&mut rng);
        model
    }

    /// Architecture configuration
    pub fn config(&self) -> &ViTConfig {
        &self.config
    }

    /// Toggle training mode (controls stochastic depth)
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Forward pass: `[batch, in_chans, img, img]` -> `[batch, num_classes]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let tokens = self.patch_embed.forward(x)?;
        let tokens = self.prepend_cls_and_add_pos(&tokens);

        let mut x = tokens;
        for block in &self.blocks {
            x = block.forward(&x, self.training)?;
        }

        let x = self.norm.forward(&x)?;
        let cls = self.take_cls(&x);
        Ok(self.head.forward(&cls))
    }

    /// Prepend the class token and add the position embedding
    fn prepend_cls_and_add_pos(&self, patches: &Tensor) -> Tensor {
        let shape = patches.shape();
        let (batch, n, d) = (shape[0], shape[1], shape[2]);
        let num_tokens = n + 1;

        let patch_data = patches.data();
        let cls = self.cls_token.data();
        let pos = self.pos_embed.data();

        let mut output = vec![0.0; batch * num_tokens * d];
        for b in 0..batch {
            let row = b * num_tokens * d;
            for i in 0..d {
                output[row + i] = cls[i] + pos[i];
            }
            for t in 0..n {
                for i in 0..d {
                    output[row + (t + 1) * d + i] =
                        patch_data[b * n * d + t * d + i] + pos[(t + 1) * d + i];
                }
            }
        }

        Tensor::new(&output, &[batch, num_tokens, d])
    }

    /// Extract the class-token row: `[batch, tokens, d]` -> `[batch, d]`
    fn take_cls(&self, x: &Tensor) -> Tensor {
        let shape = x.shape();
        let (batch, tokens, d) = (shape[0], shape[1], shape[2]);
        let data = x.data();

        let mut output = vec![0.0; batch * d];
        for b in 0..batch {
            output[b * d..(b + 1) * d].copy_from_slice(&data[b * tokens * d..b * tokens * d + d]);
        }

        Tensor::new(&output, &[batch, d])
    }

    /// Stable dotted names for every parameter, in declaration order
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        let mut out = Vec::new();
        out.push(("cls_token".to_string(), &self.cls_token));
        out.push(("pos_embed".to_string(), &self.pos_embed));
        self.patch_embed.named_parameters("patch_embed", &mut out);
        for (i, block) in self.blocks.iter().enumerate() {
            block.named_parameters(&format!("blocks.{i}"), &mut out);
        }
        self.norm.named_parameters("norm", &mut out);
        named_linear(&self.head, "head", &mut out);
        out
    }

    /// Mutable variant of [`named_parameters`](Self::named_parameters), same order
    pub fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let mut out = Vec::new();
        out.push(("cls_token".to_string(), &mut self.cls_token));
        out.push(("pos_embed".to_string(), &mut self.pos_embed));
        self.patch_embed
            .named_parameters_mut("patch_embed", &mut out);
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.named_parameters_mut(&format!("blocks.{i}"), &mut out);
        }
        self.norm.named_parameters_mut("norm", &mut out);
        named_linear_mut(&mut self.head, "head", &mut out);
        out
    }

    /// Seeded reinitialization by parameter kind
    ///
    /// Norm affines keep their ones/zeros construction; biases and adapter
    /// up-projections start at zero; every other weight is normal(0, 0.02).
    fn init_parameters(&mut self, rng: &mut StdRng) {
        for (name, param) in self.named_parameters_mut() {
            if name.contains("norm") {
                continue;
            }
            let shape = param.shape().to_vec();
            if name.ends_with(".bias") || (name.contains("adapter") && name.contains(".up.weight")) {
                *param = zeros_tensor(&shape);
            } else {
                *param = normal_tensor(&shape, 0.02, rng);
            }
        }
    }
}

impl Module for VisionTransformer {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.forward(input).expect("VisionTransformer forward failed")
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.named_parameters_mut()
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> ViTConfig {
        ViTConfig {
            img_size: 16,
            patch_size: 8,
            in_chans: 3,
            embed_dim: 8,
            depth: 2,
            n_head: 2,
            mlp_ratio: 2,
            num_classes: 5,
            adapter_dim: 2,
            adapter_scale: 1.0,
            drop_path: 0.0,
            seed: Some(42),
        }
    }

    #[test]
    fn test_forward_logit_shape() {
        let model = VisionTransformer::new(tiny_config());
        let x = Tensor::ones(&[2, 3, 16, 16]);
        let logits = model.forward(&x).expect("forward");
        assert_eq!(logits.shape(), &[2, 5]);
    }

    #[test]
    fn test_named_parameters_cover_adapters_and_head() {
        let model = VisionTransformer::new(tiny_config());
        let names: Vec<String> = model.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert!(names.iter().any(|n| n == "blocks.0.adapter_attn.down.weight"));
        assert!(names.iter().any(|n| n == "blocks.1.adapter_mlp.up.bias"));
        assert!(names.iter().any(|n| n == "head.weight"));
        assert!(names.iter().any(|n| n == "head.bias"));
    }

    #[test]
    fn test_named_parameter_order_matches_mut() {
        let mut model = VisionTransformer::new(tiny_config());
        let names: Vec<String> = model.named_parameters().into_iter().map(|(n, _)| n).collect();
        let names_mut: Vec<String> =
            model.named_parameters_mut().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, names_mut);
    }

    #[test]
    fn test_seeded_build_is_reproducible() {
        let a = VisionTransformer::new(tiny_config());
        let b = VisionTransformer::new(tiny_config());
        for ((_, pa), (_, pb)) in a.named_parameters().iter().zip(b.named_parameters().iter()) {
            assert_eq!(pa.data(), pb.data());
        }
    }

    #[test]
    fn test_adapter_up_starts_at_zero() {
        let model = VisionTransformer::new(tiny_config());
        for (name, param) in model.named_parameters() {
            if name.contains("adapter") && name.contains(".up.weight") {
                assert!(param.data().iter().all(|&v| v == 0.0), "{name} not zero");
            }
        }
    }
}
