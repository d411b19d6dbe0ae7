//! Bottleneck adapter modules
//!
//! A low-rank bottleneck trained in parallel with a frozen branch: project
//! down to `adapter_dim`, GELU, project back up, scale the result. The up
//! projection starts at zero so a fresh adapter leaves the backbone's
//! function unchanged.

use anyhow::Result;
use aprender::autograd::Tensor;
use aprender::nn::{Linear, Module};

use crate::ops::{gelu, named_linear, named_linear_mut, scale_tensor};

/// Low-rank bottleneck adapter
pub struct Adapter {
    down: Linear,
    up: Linear,
    scale: f32,
}

impl Adapter {
    /// Create an adapter from `embed_dim` down to `adapter_dim` and back
    pub fn new(embed_dim: usize, adapter_dim: usize, scale: f32) -> Self {
        Self {
            down: Linear::new(embed_dim, adapter_dim),
            up: Linear::new(adapter_dim, embed_dim),
            scale,
        }
    }

    /// Forward pass over `[batch, tokens, embed_dim]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.down.forward(x);
        let x = gelu(&x);
        let x = self.up.forward(&x);
        Ok(scale_tensor(&x, self.scale))
    }

    /// Output scaling factor
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        params.extend(self.down.parameters());
        params.extend(self.up.parameters());
        params
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::new();
        params.extend(self.down.parameters_mut());
        params.extend(self.up.parameters_mut());
        params
    }

    pub fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Tensor)>) {
        named_linear(&self.down, &format!("{prefix}.down"), out);
        named_linear(&self.up, &format!("{prefix}.up"), out);
    }

    pub fn named_parameters_mut<'a>(
        &'a mut self,
        prefix: &str,
        out: &mut Vec<(String, &'a mut Tensor)>,
    ) {
        named_linear_mut(&mut self.down, &format!("{prefix}.down"), out);
        named_linear_mut(&mut self.up, &format!("{prefix}.up"), out);
    }
}
