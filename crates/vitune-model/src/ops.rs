//! Data-level tensor helpers shared across the model modules

use aprender::autograd::Tensor;
use aprender::nn::{Linear, Module};

/// Push a Linear's parameters as `(name, tensor)` pairs below `prefix`
///
/// aprender's Linear reports its parameters in weight-then-bias order.
pub(crate) fn named_linear<'a>(
    linear: &'a Linear,
    prefix: &str,
    out: &mut Vec<(String, &'a Tensor)>,
) {
    for (param, suffix) in linear.parameters().into_iter().zip(["weight", "bias"]) {
        out.push((format!("{prefix}.{suffix}"), param));
    }
}

pub(crate) fn named_linear_mut<'a>(
    linear: &'a mut Linear,
    prefix: &str,
    out: &mut Vec<(String, &'a mut Tensor)>,
) {
    for (param, suffix) in linear.parameters_mut().into_iter().zip(["weight", "bias"]) {
        out.push((format!("{prefix}.{suffix}"), param));
    }
}

/// GELU activation (tanh approximation), elementwise
pub(crate) fn gelu(x: &Tensor) -> Tensor {
    let data: Vec<f32> = x
        .data()
        .iter()
        .map(|&v| {
            let inner = 0.797_884_6 * (v + 0.044_715 * v * v * v);
            0.5 * v * (1.0 + inner.tanh())
        })
        .collect();
    Tensor::new(&data, x.shape())
}

/// Multiply every element by a scalar
pub(crate) fn scale_tensor(x: &Tensor, scale: f32) -> Tensor {
    let data: Vec<f32> = x.data().iter().map(|&v| v * scale).collect();
    Tensor::new(&data, x.shape())
}

/// Softmax over the last dimension
pub(crate) fn softmax_last_dim(x: &Tensor) -> Tensor {
    let shape = x.shape();
    let last_dim = shape[shape.len() - 1];
    let rows: usize = shape[..shape.len() - 1].iter().product();

    let mut output = vec![0.0; x.data().len()];
    let x_data = x.data();

    for r in 0..rows {
        let offset = r * last_dim;
        let slice = &x_data[offset..offset + last_dim];

        let max_val = slice.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let exp_vals: Vec<f32> = slice.iter().map(|&v| (v - max_val).exp()).collect();
        let sum: f32 = exp_vals.iter().sum();

        for i in 0..last_dim {
            output[offset + i] = if sum > 0.0 { exp_vals[i] / sum } else { 0.0 };
        }
    }

    Tensor::new(&output, shape)
}

/// Transpose the last two dimensions
pub(crate) fn transpose_last_two(x: &Tensor) -> Tensor {
    let shape = x.shape();
    let ndim = shape.len();
    let last = shape[ndim - 1];
    let second_last = shape[ndim - 2];

    let mut new_shape = shape.to_vec();
    new_shape[ndim - 2] = last;
    new_shape[ndim - 1] = second_last;

    let batch: usize = shape[..ndim - 2].iter().product();
    let matrix = last * second_last;

    let mut output = vec![0.0; x.data().len()];
    let x_data = x.data();

    for b in 0..batch {
        let offset = b * matrix;
        for i in 0..second_last {
            for j in 0..last {
                output[offset + j * second_last + i] = x_data[offset + i * last + j];
            }
        }
    }

    Tensor::new(&output, &new_shape)
}

/// Batched matrix multiplication over [batch, heads, m, k] x [batch, heads, k, n]
pub(crate) fn matmul_batched_4d(a: &Tensor, b: &Tensor) -> Tensor {
    let a_shape = a.shape();
    let b_shape = b.shape();

    let (batch, heads, m, k) = (a_shape[0], a_shape[1], a_shape[2], a_shape[3]);
    let n = b_shape[3];

    let mut output = vec![0.0; batch * heads * m * n];
    let a_data = a.data();
    let b_data = b.data();

    for bi in 0..batch {
        for h in 0..heads {
            let a_off = bi * heads * m * k + h * m * k;
            let b_off = bi * heads * k * n + h * k * n;
            let out_off = bi * heads * m * n + h * m * n;
            for i in 0..m {
                for j in 0..n {
                    let mut sum = 0.0;
                    for kk in 0..k {
                        sum += a_data[a_off + i * k + kk] * b_data[b_off + kk * n + j];
                    }
                    output[out_off + i * n + j] = sum;
                }
            }
        }
    }

    Tensor::new(&output, &[batch, heads, m, n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gelu_endpoints() {
        let x = Tensor::new(&[0.0, 10.0, -10.0], &[3]);
        let y = gelu(&x);
        let d = y.data();
        assert!(d[0].abs() < 1e-6);
        assert!((d[1] - 10.0).abs() < 1e-3);
        assert!(d[2].abs() < 1e-3);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let x = Tensor::new(&[1.0, 2.0, 3.0, -1.0, 0.0, 1.0], &[2, 3]);
        let y = softmax_last_dim(&x);
        let d = y.data();
        let row0: f32 = d[..3].iter().sum();
        let row1: f32 = d[3..].iter().sum();
        assert!((row0 - 1.0).abs() < 1e-5);
        assert!((row1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transpose_last_two() {
        let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 2, 3]);
        let y = transpose_last_two(&x);
        assert_eq!(y.shape(), &[1, 3, 2]);
        assert_eq!(y.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_matmul_identity() {
        let a = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]);
        let eye = Tensor::new(&[1.0, 0.0, 0.0, 1.0], &[1, 1, 2, 2]);
        let out = matmul_batched_4d(&a, &eye);
        assert_eq!(out.data(), a.data());
    }
}
