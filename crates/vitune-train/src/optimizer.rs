//! Grouped AdamW over the trainable partition
//!
//! One logical optimizer built from the two parameter groups: each group
//! gets its own AdamW carrying that group's decay coefficient, so the decay
//! knob only ever acts per group. Frozen parameters are never handed to
//! either instance and therefore hold no optimizer state.

use anyhow::Result;
use aprender::nn::optim::{AdamW, Optimizer};
use vitune_model::{Backbone, VisionTransformer};

/// AdamW over the (no-decay, decay) trainable groups
pub struct GroupedAdamW {
    no_decay: AdamW,
    decay: AdamW,
}

impl GroupedAdamW {
    /// Build the optimizer from the model's trainable parameters
    pub fn new(
        model: &mut VisionTransformer,
        backbone: Backbone,
        lr: f32,
        weight_decay: f32,
    ) -> Result<Self> {
        let mut no_decay_params = Vec::new();
        let mut decay_params = Vec::new();

        for (name, param) in model.named_parameters_mut() {
            if !backbone.is_trainable(&name) {
                continue;
            }
            if name.ends_with(".bias") {
                no_decay_params.push(param);
            } else {
                decay_params.push(param);
            }
        }

        if no_decay_params.is_empty() && decay_params.is_empty() {
            anyhow::bail!("Model has no trainable parameters to optimize");
        }

        Ok(Self {
            no_decay: AdamW::new(no_decay_params, lr).weight_decay(0.0),
            decay: AdamW::new(decay_params, lr).weight_decay(weight_decay),
        })
    }

    /// Apply one update to both groups
    pub fn step(&mut self) {
        self.no_decay.step();
        self.decay.step();
    }

    /// Clear accumulated gradients in both groups
    pub fn zero_grad(&mut self) {
        self.no_decay.zero_grad();
        self.decay.zero_grad();
    }

    /// Set the shared learning rate
    pub fn set_lr(&mut self, lr: f32) {
        self.no_decay.set_lr(lr);
        self.decay.set_lr(lr);
    }

    /// Current learning rate (uniform across groups)
    pub fn lr(&self) -> f32 {
        self.decay.lr()
    }
}
