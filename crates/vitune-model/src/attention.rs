//! Multi-head self-attention for the ViT encoder

use anyhow::Result;
use aprender::autograd::Tensor;
use aprender::nn::{Linear, Module};

use crate::ops::{
    matmul_batched_4d, named_linear, named_linear_mut, scale_tensor, softmax_last_dim,
    transpose_last_two,
};

/// Bidirectional multi-head self-attention
///
/// Fused qkv projection, scaled dot-product over all tokens (no mask), then
/// an output projection. Head bookkeeping is done with data-level layout
/// helpers since the token count is small and fixed.
pub struct Attention {
    qkv: Linear,
    proj: Linear,
    n_head: usize,
    head_dim: usize,
    embed_dim: usize,
}

impl Attention {
    /// Create an attention layer over `embed_dim`-wide tokens
    pub fn new(embed_dim: usize, n_head: usize) -> Self {
        Self {
            qkv: Linear::new(embed_dim, 3 * embed_dim),
            proj: Linear::new(embed_dim, embed_dim),
            n_head,
            head_dim: embed_dim / n_head,
            embed_dim,
        }
    }

    /// Forward pass over `[batch, tokens, embed_dim]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let shape = x.shape();
        if shape.len() != 3 || shape[2] != self.embed_dim {
            anyhow::bail!(
                "Expected [batch, tokens, {}] input, got shape {:?}",
                self.embed_dim,
                shape
            );
        }
        let (batch, tokens) = (shape[0], shape[1]);

        let qkv = self.qkv.forward(x);
        let (q, k, v) = self.split_qkv(&qkv, batch, tokens);

        let scale = 1.0 / (self.head_dim as f32).sqrt();
        let scores = scale_tensor(&matmul_batched_4d(&q, &transpose_last_two(&k)), scale);
        let weights = softmax_last_dim(&scores);
        let context = matmul_batched_4d(&weights, &v);

        let merged = self.merge_heads(&context, batch, tokens);
        Ok(self.proj.forward(&merged))
    }

    /// Split `[batch, tokens, 3*embed]` into per-head q/k/v `[batch, heads, tokens, head_dim]`
    fn split_qkv(&self, qkv: &Tensor, batch: usize, tokens: usize) -> (Tensor, Tensor, Tensor) {
        let d = self.embed_dim;
        let (h, hd) = (self.n_head, self.head_dim);
        let data = qkv.data();

        let mut q = vec![0.0; batch * h * tokens * hd];
        let mut k = vec![0.0; batch * h * tokens * hd];
        let mut v = vec![0.0; batch * h * tokens * hd];

        for b in 0..batch {
            for t in 0..tokens {
                let row = b * tokens * 3 * d + t * 3 * d;
                for head in 0..h {
                    for i in 0..hd {
                        let out_idx = b * h * tokens * hd + head * tokens * hd + t * hd + i;
                        let col = head * hd + i;
                        q[out_idx] = data[row + col];
                        k[out_idx] = data[row + d + col];
                        v[out_idx] = data[row + 2 * d + col];
                    }
                }
            }
        }

        let shape = [batch, h, tokens, hd];
        (
            Tensor::new(&q, &shape),
            Tensor::new(&k, &shape),
            Tensor::new(&v, &shape),
        )
    }

    /// Merge `[batch, heads, tokens, head_dim]` back to `[batch, tokens, embed]`
    fn merge_heads(&self, x: &Tensor, batch: usize, tokens: usize) -> Tensor {
        let (h, hd) = (self.n_head, self.head_dim);
        let data = x.data();
        let mut output = vec![0.0; batch * tokens * self.embed_dim];

        for b in 0..batch {
            for head in 0..h {
                for t in 0..tokens {
                    for i in 0..hd {
                        let in_idx = b * h * tokens * hd + head * tokens * hd + t * hd + i;
                        let out_idx = b * tokens * self.embed_dim + t * self.embed_dim + head * hd + i;
                        output[out_idx] = data[in_idx];
                    }
                }
            }
        }

        Tensor::new(&output, &[batch, tokens, self.embed_dim])
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        params.extend(self.qkv.parameters());
        params.extend(self.proj.parameters());
        params
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = Vec::new();
        params.extend(self.qkv.parameters_mut());
        params.extend(self.proj.parameters_mut());
        params
    }

    pub fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Tensor)>) {
        named_linear(&self.qkv, &format!("{prefix}.qkv"), out);
        named_linear(&self.proj, &format!("{prefix}.proj"), out);
    }

    pub fn named_parameters_mut<'a>(
        &'a mut self,
        prefix: &str,
        out: &mut Vec<(String, &'a mut Tensor)>,
    ) {
        named_linear_mut(&mut self.qkv, &format!("{prefix}.qkv"), out);
        named_linear_mut(&mut self.proj, &format!("{prefix}.proj"), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attention_preserves_shape() {
        let attn = Attention::new(16, 4);
        let x = Tensor::ones(&[2, 5, 16]);
        let y = attn.forward(&x).expect("forward");
        assert_eq!(y.shape(), &[2, 5, 16]);
    }

    #[test]
    fn test_attention_rejects_bad_width() {
        let attn = Attention::new(16, 4);
        let x = Tensor::ones(&[2, 5, 8]);
        assert!(attn.forward(&x).is_err());
    }

    #[test]
    fn test_attention_param_names() {
        let attn = Attention::new(8, 2);
        let mut names = Vec::new();
        attn.named_parameters("blocks.0.attn", &mut names);
        let collected: Vec<&str> = names.iter().map(|(n, _)| n.as_str()).collect();
        assert!(collected.contains(&"blocks.0.attn.qkv.weight"));
        assert!(collected.contains(&"blocks.0.attn.proj.bias"));
    }
}
