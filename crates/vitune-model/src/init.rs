//! Seeded weight initialization helpers
//!
//! `aprender::nn::init` keeps its samplers crate-private, so parameter
//! tensors are filled with the same Box-Muller transform aprender uses
//! internally, driven by a `StdRng` owned by the model constructor.

use aprender::autograd::Tensor;
use rand::rngs::StdRng;
use rand::Rng;

/// Sample a normal(0, std) tensor of the given shape
pub(crate) fn normal_tensor(shape: &[usize], std: f32, rng: &mut StdRng) -> Tensor {
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel)
        .map(|_| {
            let u1: f32 = rng.gen_range(0.0001_f32..1.0_f32);
            let u2: f32 = rng.gen_range(0.0_f32..1.0_f32);
            let z = (-2.0_f32 * u1.ln()).sqrt() * (2.0_f32 * std::f32::consts::PI * u2).cos();
            std * z
        })
        .collect();
    Tensor::new(&data, shape)
}

/// All-zeros tensor of the given shape
pub(crate) fn zeros_tensor(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}

/// All-ones tensor of the given shape
pub(crate) fn ones_tensor(shape: &[usize]) -> Tensor {
    Tensor::ones(shape)
}
