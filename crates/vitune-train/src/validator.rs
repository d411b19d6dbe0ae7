//! Evaluation loop

use anyhow::{Context, Result};
use vitune_data::Loader;
use vitune_model::VisionTransformer;

use crate::meter::AverageMeter;
use crate::metrics::accuracy;

/// Run one gradient-free pass over the evaluation loader
///
/// Returns batch-size-weighted (top-1, top-5) accuracy meters; logging is
/// the caller's responsibility. The model is switched to evaluation mode
/// for the duration of the pass.
pub fn validate(
    model: &mut VisionTransformer,
    loader: &mut Loader,
) -> Result<(AverageMeter, AverageMeter)> {
    model.set_training(false);

    let mut top1 = AverageMeter::new();
    let mut top5 = AverageMeter::new();

    while let Some((input, target)) = loader.next_batch().context("Evaluation batch failed")? {
        let output = model.forward(&input).context("Evaluation forward failed")?;
        let batch = output.shape()[0];
        let (acc1, acc5) = accuracy(&output, &target);
        top1.update(acc1, batch);
        top5.update(acc5, batch);
    }

    Ok((top1, top5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitune_data::{SplitDataset, TransformProfile};
    use vitune_model::ViTConfig;

    fn tiny_model(num_classes: usize) -> VisionTransformer {
        VisionTransformer::new(ViTConfig {
            img_size: 224,
            patch_size: 56,
            embed_dim: 8,
            depth: 1,
            n_head: 2,
            mlp_ratio: 2,
            num_classes,
            adapter_dim: 2,
            seed: Some(42),
            ..ViTConfig::default()
        })
    }

    fn toy_loader(count: usize, batch_size: usize) -> Loader {
        let stride = 3 * 8 * 8;
        let mut images = Vec::new();
        for i in 0..count {
            images.extend(std::iter::repeat(i as f32 / count as f32).take(stride));
        }
        let labels: Vec<u32> = (0..count as u32).collect();
        Loader::new(
            SplitDataset::from_samples(images, labels, 3, 8, 8),
            TransformProfile::Vtab,
            batch_size,
            false,
            0,
            42,
            None,
        )
        .expect("loader")
    }

    #[test]
    fn test_validate_accuracy_within_bounds() {
        let mut model = tiny_model(4);
        let mut loader = toy_loader(4, 2);

        let (top1, top5) = validate(&mut model, &mut loader).expect("validate");
        assert!((0.0..=100.0).contains(&top1.avg()));
        assert!((0.0..=100.0).contains(&top5.avg()));
        assert_eq!(top1.count(), 4);
    }

    #[test]
    fn test_validate_consumes_whole_split() {
        let mut model = tiny_model(3);
        let mut loader = toy_loader(5, 2);

        let (top1, _) = validate(&mut model, &mut loader).expect("validate");
        assert_eq!(top1.count(), 5);
    }
}
