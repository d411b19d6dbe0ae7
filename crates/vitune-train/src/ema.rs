//! Exponential-moving-average shadow model
//!
//! A full copy of the model whose weights track the live weights as
//! `shadow = decay * shadow + (1 - decay) * live` after every optimizer
//! step. The shadow is only read at final-validation time.

use aprender::autograd::Tensor;
use vitune_model::VisionTransformer;

/// Shadow copy of the model with decayed weight tracking
pub struct ModelEma {
    module: VisionTransformer,
    decay: f32,
}

impl ModelEma {
    /// Clone the live model's current weights into a fresh shadow
    pub fn new(model: &VisionTransformer, decay: f32) -> Self {
        let mut module = VisionTransformer::new(model.config().clone());
        copy_weights(&mut module, model);
        Self { module, decay }
    }

    /// Fold the live weights into the shadow
    pub fn update(&mut self, model: &VisionTransformer) {
        let decay = self.decay;
        for ((_, shadow), (_, live)) in self
            .module
            .named_parameters_mut()
            .into_iter()
            .zip(model.named_parameters())
        {
            let shape = shadow.shape().to_vec();
            let blended: Vec<f32> = shadow
                .data()
                .iter()
                .zip(live.data().iter())
                .map(|(&s, &l)| decay * s + (1.0 - decay) * l)
                .collect();
            *shadow = Tensor::new(&blended, &shape);
        }
    }

    /// Decay factor
    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Shadow model for evaluation
    pub fn module(&self) -> &VisionTransformer {
        &self.module
    }

    /// Mutable shadow model (evaluation-mode toggling)
    pub fn module_mut(&mut self) -> &mut VisionTransformer {
        &mut self.module
    }
}

fn copy_weights(dst: &mut VisionTransformer, src: &VisionTransformer) {
    for ((_, dst_param), (_, src_param)) in dst
        .named_parameters_mut()
        .into_iter()
        .zip(src.named_parameters())
    {
        *dst_param = Tensor::new(src_param.data(), src_param.shape());
    }
}
