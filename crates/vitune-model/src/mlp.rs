//! MLP block with GELU activation

use anyhow::Result;
use aprender::autograd::Tensor;
use aprender::nn::{Linear, Module};

use crate::ops::{gelu, named_linear, named_linear_mut};

/// Two-layer MLP: expansion, GELU, projection
pub struct Mlp {
    fc1: Linear,
    fc2: Linear,
}

impl Mlp {
    /// Create an MLP with `hidden = embed_dim * mlp_ratio`
    pub fn new(embed_dim: usize, mlp_ratio: usize) -> Self {
        let hidden = embed_dim * mlp_ratio;
        Self {
            fc1: Linear::new(embed_dim, hidden),
            fc2: Linear::new(hidden, embed_dim),
        }
    }

    /// Forward pass over `[batch, tokens, embed_dim]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.fc1.forward(x);
        let x = gelu(&x);
        Ok(self.fc2.forward(&x))
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        params.extend(self.fc1.parameters());
        params.extend(self.fc2.parameters());
        params
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::new();
        params.extend(self.fc1.parameters_mut());
        params.extend(self.fc2.parameters_mut());
        params
    }

    pub fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Tensor)>) {
        named_linear(&self.fc1, &format!("{prefix}.fc1"), out);
        named_linear(&self.fc2, &format!("{prefix}.fc2"), out);
    }

    pub fn named_parameters_mut<'a>(
        &'a mut self,
        prefix: &str,
        out: &mut Vec<(String, &'a mut Tensor)>,
    ) {
        named_linear_mut(&mut self.fc1, &format!("{prefix}.fc1"), out);
        named_linear_mut(&mut self.fc2, &format!("{prefix}.fc2"), out);
    }
}
