//! Training losses
//!
//! The loss is chosen once per run: soft-target cross-entropy whenever
//! mixup/cutmix is active (targets are probability distributions), plain
//! cross-entropy over integer labels otherwise.

use aprender::autograd::Tensor;

/// Common loss interface: logits and targets in, scalar loss tensor out
pub trait LossFn {
    fn forward(&self, output: &Tensor, target: &Tensor) -> Tensor;
    fn name(&self) -> &'static str;
}

/// Log-softmax over each row of a `[batch, classes]` tensor
fn log_softmax_rows(logits: &[f32], batch: usize, classes: usize) -> Vec<f32> {
    let mut out = vec![0.0; logits.len()];
    for b in 0..batch {
        let row = &logits[b * classes..(b + 1) * classes];
        let max_val = row.iter().fold(f32::NEG_INFINITY, |a, &v| a.max(v));
        let log_sum: f32 = row.iter().map(|&v| (v - max_val).exp()).sum::<f32>().ln();
        for c in 0..classes {
            out[b * classes + c] = row[c] - max_val - log_sum;
        }
    }
    out
}

/// Cross-entropy against probability-valued targets `[batch, classes]`
pub struct SoftTargetCrossEntropy;

impl LossFn for SoftTargetCrossEntropy {
    fn forward(&self, output: &Tensor, target: &Tensor) -> Tensor {
        let shape = output.shape();
        let (batch, classes) = (shape[0], shape[1]);
        let log_probs = log_softmax_rows(output.data(), batch, classes);
        let target_data = target.data();

        let mut total = 0.0;
        for i in 0..batch * classes {
            total -= target_data[i] * log_probs[i];
        }

        Tensor::new(&[total / batch as f32], &[1])
    }

    fn name(&self) -> &'static str {
        "SoftTargetCrossEntropy"
    }
}

/// Cross-entropy against integer labels `[batch]`
pub struct CrossEntropyLoss;

impl LossFn for CrossEntropyLoss {
    fn forward(&self, output: &Tensor, target: &Tensor) -> Tensor {
        let shape = output.shape();
        let (batch, classes) = (shape[0], shape[1]);
        let log_probs = log_softmax_rows(output.data(), batch, classes);
        let labels = target.data();

        let mut total = 0.0;
        for b in 0..batch {
            let label = labels[b] as usize;
            total -= log_probs[b * classes + label];
        }

        Tensor::new(&[total / batch as f32], &[1])
    }

    fn name(&self) -> &'static str {
        "CrossEntropyLoss"
    }
}

/// Pick the run's loss from the mixing configuration
pub fn select_loss(mixup_active: bool) -> Box<dyn LossFn> {
    if mixup_active {
        Box::new(SoftTargetCrossEntropy)
    } else {
        Box::new(CrossEntropyLoss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_follows_mixing() {
        assert_eq!(select_loss(true).name(), "SoftTargetCrossEntropy");
        assert_eq!(select_loss(false).name(), "CrossEntropyLoss");
    }

    #[test]
    fn test_hard_loss_low_for_confident_correct() {
        let output = Tensor::new(&[10.0, 0.0, 0.0, 0.0, 10.0, 0.0], &[2, 3]);
        let target = Tensor::new(&[0.0, 1.0], &[2]);
        let loss = CrossEntropyLoss.forward(&output, &target);
        assert!(loss.item() < 0.01);
    }

    #[test]
    fn test_hard_loss_high_for_confident_wrong() {
        let output = Tensor::new(&[10.0, 0.0, 0.0], &[1, 3]);
        let target = Tensor::new(&[2.0], &[1]);
        let loss = CrossEntropyLoss.forward(&output, &target);
        assert!(loss.item() > 5.0);
    }

    #[test]
    fn test_soft_loss_matches_hard_on_one_hot() {
        let output = Tensor::new(&[1.0, 2.0, 0.5, -0.5, 0.0, 3.0], &[2, 3]);
        let hard_target = Tensor::new(&[1.0, 2.0], &[2]);
        let soft_target = Tensor::new(&[0.0, 1.0, 0.0, 0.0, 0.0, 1.0], &[2, 3]);

        let hard = CrossEntropyLoss.forward(&output, &hard_target);
        let soft = SoftTargetCrossEntropy.forward(&output, &soft_target);
        assert!((hard.item() - soft.item()).abs() < 1e-5);
    }

    #[test]
    fn test_uniform_logits_give_log_classes() {
        let output = Tensor::new(&[0.0, 0.0, 0.0, 0.0], &[1, 4]);
        let target = Tensor::new(&[3.0], &[1]);
        let loss = CrossEntropyLoss.forward(&output, &target);
        assert!((loss.item() - 4.0_f32.ln()).abs() < 1e-5);
    }
}
