//! Layer normalization with learnable affine parameters

use anyhow::Result;
use aprender::autograd::Tensor;

use crate::init::{ones_tensor, zeros_tensor};

const EPS: f32 = 1e-6;

/// LayerNorm over the last dimension
///
/// Normalizes to zero mean / unit variance over the trailing dimension, then
/// applies a learnable elementwise weight and bias. Both parameters are
/// exposed by name so the bias lands in the no-decay optimizer group.
pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    dim: usize,
}

impl LayerNorm {
    /// Create a LayerNorm over `dim`-wide trailing vectors
    pub fn new(dim: usize) -> Self {
        Self {
            weight: ones_tensor(&[dim]),
            bias: zeros_tensor(&[dim]),
            dim,
        }
    }

    /// Normalize the trailing dimension of `x`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let shape = x.shape();
        let last = shape[shape.len() - 1];
        if last != self.dim {
            anyhow::bail!(
                "LayerNorm over dim {} applied to trailing dim {}",
                self.dim,
                last
            );
        }

        let rows: usize = shape[..shape.len() - 1].iter().product();
        let x_data = x.data();
        let w = self.weight.data();
        let b = self.bias.data();
        let mut output = vec![0.0; x_data.len()];

        for r in 0..rows {
            let offset = r * last;
            let slice = &x_data[offset..offset + last];
            let mean: f32 = slice.iter().sum::<f32>() / last as f32;
            let var: f32 = slice.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / last as f32;
            let denom = (var + EPS).sqrt();
            for i in 0..last {
                output[offset + i] = (slice[i] - mean) / denom * w[i] + b[i];
            }
        }

        Ok(Tensor::new(&output, shape))
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }

    /// (name, tensor) pairs below `prefix`
    pub fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Tensor)>) {
        out.push((format!("{prefix}.weight"), &self.weight));
        out.push((format!("{prefix}.bias"), &self.bias));
    }

    pub fn named_parameters_mut<'a>(
        &'a mut self,
        prefix: &str,
        out: &mut Vec<(String, &'a mut Tensor)>,
    ) {
        out.push((format!("{prefix}.weight"), &mut self.weight));
        out.push((format!("{prefix}.bias"), &mut self.bias));
    }
}
