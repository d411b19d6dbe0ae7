//! Patch embedding: non-overlapping patches projected to token vectors

use anyhow::Result;
use aprender::autograd::Tensor;
use aprender::nn::{Linear, Module};

use crate::ops::{named_linear, named_linear_mut};

/// Patchify + linear projection
///
/// Cuts the image into non-overlapping `patch_size` squares, flattens each
/// patch to `in_chans * patch_size^2` values and projects to `embed_dim`.
pub struct PatchEmbed {
    proj: Linear,
    img_size: usize,
    patch_size: usize,
    in_chans: usize,
    num_patches: usize,
}

impl PatchEmbed {
    pub fn new(img_size: usize, patch_size: usize, in_chans: usize, embed_dim: usize) -> Self {
        let grid = img_size / patch_size;
        Self {
            proj: Linear::new(in_chans * patch_size * patch_size, embed_dim),
            img_size,
            patch_size,
            in_chans,
            num_patches: grid * grid,
        }
    }

    /// Number of patch tokens per image
    pub fn num_patches(&self) -> usize {
        self.num_patches
    }

    /// Forward pass over `[batch, in_chans, img_size, img_size]`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let shape = x.shape();
        if shape.len() != 4
            || shape[1] != self.in_chans
            || shape[2] != self.img_size
            || shape[3] != self.img_size
        {
            anyhow::bail!(
                "Expected [batch, {}, {}, {}] input, got shape {:?}",
                self.in_chans,
                self.img_size,
                self.img_size,
                shape
            );
        }

        let batch = shape[0];
        let (c, hw, ps) = (self.in_chans, self.img_size, self.patch_size);
        let grid = hw / ps;
        let patch_dim = c * ps * ps;
        let data = x.data();

        let mut patches = vec![0.0; batch * self.num_patches * patch_dim];
        for b in 0..batch {
            for gy in 0..grid {
                for gx in 0..grid {
                    let p = gy * grid + gx;
                    let out_row = b * self.num_patches * patch_dim + p * patch_dim;
                    for ch in 0..c {
                        for py in 0..ps {
                            for px in 0..ps {
                                let in_idx = b * c * hw * hw
                                    + ch * hw * hw
                                    + (gy * ps + py) * hw
                                    + (gx * ps + px);
                                let out_idx = out_row + ch * ps * ps + py * ps + px;
                                patches[out_idx] = data[in_idx];
                            }
                        }
                    }
                }
            }
        }

        let patches = Tensor::new(&patches, &[batch, self.num_patches, patch_dim]);
        Ok(self.proj.forward(&patches))
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        self.proj.parameters()
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.proj.parameters_mut()
    }

    pub fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Tensor)>) {
        named_linear(&self.proj, &format!("{prefix}.proj"), out);
    }

    pub fn named_parameters_mut<'a>(
        &'a mut self,
        prefix: &str,
        out: &mut Vec<(String, &'a mut Tensor)>,
    ) {
        named_linear_mut(&mut self.proj, &format!("{prefix}.proj"), out);
    }
}
