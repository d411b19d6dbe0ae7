//! Mixup / cutmix batch augmentation
//!
//! Blends each sample with its batch-reversed partner. Mixup interpolates
//! whole images; cutmix pastes a rectangular window and corrects lambda by
//! the realized window area. Targets become probability distributions with
//! label smoothing baked in, which is what the soft-target loss consumes.

use anyhow::{Context, Result};
use aprender::autograd::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};

/// Probability of picking cutmix when both modes are active
const SWITCH_PROB: f32 = 0.5;

/// Smoothed one-hot encoding of integer labels
pub fn smoothed_one_hot(labels: &[f32], num_classes: usize, smoothing: f32) -> Vec<f32> {
    let off_value = smoothing / num_classes as f32;
    let on_value = 1.0 - smoothing + off_value;

    let mut targets = vec![off_value; labels.len() * num_classes];
    for (i, &label) in labels.iter().enumerate() {
        targets[i * num_classes + label as usize] = on_value;
    }
    targets
}

/// Batch mixer with per-run alphas and smoothing
pub struct Mixup {
    mixup_beta: Option<Beta<f32>>,
    cutmix_beta: Option<Beta<f32>>,
    label_smoothing: f32,
    num_classes: usize,
    rng: StdRng,
}

impl Mixup {
    /// Create a mixer; at least one alpha must be positive
    pub fn new(
        mixup_alpha: f32,
        cutmix_alpha: f32,
        label_smoothing: f32,
        num_classes: usize,
        seed: u64,
    ) -> Result<Self> {
        if mixup_alpha <= 0.0 && cutmix_alpha <= 0.0 {
            anyhow::bail!("Mixup requires a positive mixup or cutmix alpha");
        }
        let mixup_beta = if mixup_alpha > 0.0 {
            Some(Beta::new(mixup_alpha, mixup_alpha).context("Invalid mixup alpha")?)
        } else {
            None
        };
        let cutmix_beta = if cutmix_alpha > 0.0 {
            Some(Beta::new(cutmix_alpha, cutmix_alpha).context("Invalid cutmix alpha")?)
        } else {
            None
        };
        Ok(Self {
            mixup_beta,
            cutmix_beta,
            label_smoothing,
            num_classes,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Mix a batch: `[B, C, H, W]` images and `[B]` integer labels become
    /// mixed images and `[B, num_classes]` probability targets
    pub fn apply(&mut self, images: &Tensor, labels: &Tensor) -> (Tensor, Tensor) {
        let use_cutmix = match (&self.mixup_beta, &self.cutmix_beta) {
            (Some(_), Some(_)) => self.rng.gen_range(0.0_f32..1.0) < SWITCH_PROB,
            (None, Some(_)) => true,
            _ => false,
        };

        let (mixed, lam) = if use_cutmix {
            self.cutmix_images(images)
        } else {
            self.mixup_images(images)
        };

        let targets = self.mix_targets(labels, lam);
        (mixed, targets)
    }

    fn sample_lam(&mut self, cutmix: bool) -> f32 {
        let beta = if cutmix {
            self.cutmix_beta.as_ref()
        } else {
            self.mixup_beta.as_ref()
        };
        match beta {
            Some(beta) => beta.sample(&mut self.rng),
            None => 1.0,
        }
    }

    fn mixup_images(&mut self, images: &Tensor) -> (Tensor, f32) {
        let lam = self.sample_lam(false);
        let shape = images.shape();
        let batch = shape[0];
        let stride: usize = shape[1..].iter().product();
        let data = images.data();

        let mut mixed = vec![0.0; data.len()];
        for b in 0..batch {
            let partner = batch - 1 - b;
            for i in 0..stride {
                mixed[b * stride + i] =
                    lam * data[b * stride + i] + (1.0 - lam) * data[partner * stride + i];
            }
        }

        (Tensor::new(&mixed, shape), lam)
    }

    fn cutmix_images(&mut self, images: &Tensor) -> (Tensor, f32) {
        let lam = self.sample_lam(true);
        let shape = images.shape();
        let (batch, channels, height, width) = (shape[0], shape[1], shape[2], shape[3]);
        let data = images.data();

        let (top, left, cut_h, cut_w) = self.sample_box(height, width, lam);
        let mut mixed = data.to_vec();
        for b in 0..batch {
            let partner = batch - 1 - b;
            for c in 0..channels {
                for y in top..top + cut_h {
                    for x in left..left + cut_w {
                        let idx = b * channels * height * width + c * height * width + y * width + x;
                        let src =
                            partner * channels * height * width + c * height * width + y * width + x;
                        mixed[idx] = data[src];
                    }
                }
            }
        }

        // Correct lambda by the realized window area
        let lam = 1.0 - (cut_h * cut_w) as f32 / (height * width) as f32;
        (Tensor::new(&mixed, shape), lam)
    }

    /// Sample a centered-cut window whose area approximates `1 - lam`
    fn sample_box(&mut self, height: usize, width: usize, lam: f32) -> (usize, usize, usize, usize) {
        let cut_ratio = (1.0 - lam).max(0.0).sqrt();
        let cut_h = ((height as f32 * cut_ratio) as usize).min(height);
        let cut_w = ((width as f32 * cut_ratio) as usize).min(width);

        let cy = self.rng.gen_range(0..height);
        let cx = self.rng.gen_range(0..width);

        let top = cy.saturating_sub(cut_h / 2).min(height - cut_h.max(1));
        let left = cx.saturating_sub(cut_w / 2).min(width - cut_w.max(1));
        (top, left, cut_h, cut_w)
    }

    fn mix_targets(&self, labels: &Tensor, lam: f32) -> Tensor {
        let labels_data = labels.data();
        let batch = labels_data.len();
        let straight = smoothed_one_hot(labels_data, self.num_classes, self.label_smoothing);

        let mut mixed = vec![0.0; batch * self.num_classes];
        for b in 0..batch {
            let partner = batch - 1 - b;
            for c in 0..self.num_classes {
                mixed[b * self.num_classes + c] = lam * straight[b * self.num_classes + c]
                    + (1.0 - lam) * straight[partner * self.num_classes + c];
            }
        }

        Tensor::new(&mixed, &[batch, self.num_classes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_positive_alpha() {
        assert!(Mixup::new(0.0, 0.0, 0.0, 10, 42).is_err());
        assert!(Mixup::new(0.8, 0.0, 0.0, 10, 42).is_ok());
        assert!(Mixup::new(0.0, 1.0, 0.1, 10, 42).is_ok());
    }

    #[test]
    fn test_smoothed_one_hot_rows_sum_to_one() {
        let targets = smoothed_one_hot(&[0.0, 2.0], 4, 0.1);
        for row in targets.chunks(4) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        // on-value lands on the labeled class
        assert!(targets[0] > targets[1]);
        assert!(targets[4 + 2] > targets[4]);
    }

    #[test]
    fn test_zero_smoothing_is_hard_one_hot() {
        let targets = smoothed_one_hot(&[1.0], 3, 0.0);
        assert_eq!(targets, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_apply_emits_probability_targets() {
        let mut mixup = Mixup::new(0.8, 0.0, 0.1, 5, 42).expect("mixer");
        let images = Tensor::ones(&[4, 3, 8, 8]);
        let labels = Tensor::new(&[0.0, 1.0, 2.0, 3.0], &[4]);

        let (mixed, targets) = mixup.apply(&images, &labels);
        assert_eq!(mixed.shape(), images.shape());
        assert_eq!(targets.shape(), &[4, 5]);
        for row in targets.data().chunks(5) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_cutmix_preserves_pixel_values() {
        // Mixing constant images 0 and 1 must only ever produce 0s and 1s
        let mut mixup = Mixup::new(0.0, 1.0, 0.0, 2, 7).expect("mixer");
        let stride = 3 * 8 * 8;
        let mut data = vec![0.0_f32; stride];
        data.extend(vec![1.0_f32; stride]);
        let images = Tensor::new(&data, &[2, 3, 8, 8]);
        let labels = Tensor::new(&[0.0, 1.0], &[2]);

        let (mixed, _) = mixup.apply(&images, &labels);
        assert!(mixed.data().iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_mixup_is_convex_combination() {
        let mut mixup = Mixup::new(2.0, 0.0, 0.0, 2, 13).expect("mixer");
        let stride = 3 * 4 * 4;
        let mut data = vec![0.0_f32; stride];
        data.extend(vec![1.0_f32; stride]);
        let images = Tensor::new(&data, &[2, 3, 4, 4]);
        let labels = Tensor::new(&[0.0, 1.0], &[2]);

        let (mixed, _) = mixup.apply(&images, &labels);
        assert!(mixed.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
