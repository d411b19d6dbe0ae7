//! The epoch loop shared by both benchmark binaries

use anyhow::{Context, Result};
use vitune_data::Loader;
use vitune_model::{save_checkpoint, CheckpointMetadata, VisionTransformer};

use crate::config::RunConfig;
use crate::ema::ModelEma;
use crate::logging::RunLogger;
use crate::loss::{select_loss, LossFn};
use crate::meter::AverageMeter;
use crate::mixup::Mixup;
use crate::optimizer::GroupedAdamW;
use crate::params::{partition_trainable, trainable_backbone_numel};
use crate::schedule::CosineSchedule;
use crate::validator::validate;

/// What one full fit produced
#[derive(Debug, Clone, Copy)]
pub struct FitOutcome {
    /// Best per-epoch validation accuracy seen during the run
    pub best_acc: f32,
    /// Accuracy of the post-loop final validation (EMA weights if enabled)
    pub final_acc: f32,
    /// Number of epochs actually executed (warmup + cosine cycle)
    pub epochs_run: usize,
}

/// One pass over the training loader
///
/// Moves/mixes the batch, computes the loss, backpropagates, steps the
/// optimizer and updates the EMA shadow. Returns the loss meter's mean;
/// nothing per-batch is persisted.
pub fn train_one_epoch(
    model: &mut VisionTransformer,
    loader: &mut Loader,
    optimizer: &mut GroupedAdamW,
    criterion: &dyn LossFn,
    mut mixup: Option<&mut Mixup>,
    mut ema: Option<&mut ModelEma>,
) -> Result<f32> {
    let mut losses = AverageMeter::new();
    model.set_training(true);

    while let Some((input, target)) = loader.next_batch().context("Training batch failed")? {
        let (input, target) = match mixup.as_deref_mut() {
            Some(mixer) => mixer.apply(&input, &target),
            None => (input, target),
        };

        let output = model.forward(&input).context("Training forward failed")?;
        let loss = criterion.forward(&output, &target);
        losses.update(loss.item(), input.shape()[0]);

        optimizer.zero_grad();
        loss.backward();
        optimizer.step();

        if let Some(shadow) = ema.as_deref_mut() {
            shadow.update(model);
        }
    }

    Ok(losses.avg())
}

fn tag(base: &str, suffix: Option<usize>) -> String {
    match suffix {
        Some(s) => format!("{base}_{s}"),
        None => base.to_string(),
    }
}

/// Strictly-greater comparison: ties never re-trigger a best checkpoint
fn is_new_best(val_acc: f32, best_acc: f32) -> bool {
    val_acc > best_acc
}

/// Run the whole recipe for one model: optimizer/schedule construction,
/// the epoch loop with best/final checkpoints, and the final validation.
///
/// `tag_suffix` distinguishes reruns sharing one run directory (the
/// few-shot seed index in the domain-generalization benchmark).
pub fn fit(
    cfg: &RunConfig,
    model: &mut VisionTransformer,
    loader_train: &mut Loader,
    loader_eval: &mut Loader,
    logger: &RunLogger,
    tag_suffix: Option<usize>,
) -> Result<FitOutcome> {
    let run_dir = cfg.run_dir();

    for (name, param) in model.named_parameters() {
        if cfg.model.is_trainable(&name) {
            logger.log(&format!(
                "requires_grad : {}  with shape {:?}",
                name,
                param.shape()
            ))?;
        }
    }

    let (no_decay, decay) = partition_trainable(model, cfg.model, cfg.weight_decay);
    logger.log(&format!(
        "param groups: {} x {} (wd {}), {} x {} (wd {})",
        no_decay.name,
        no_decay.param_names.len(),
        no_decay.weight_decay,
        decay.name,
        decay.param_names.len(),
        decay.weight_decay,
    ))?;
    logger.log(&format!(
        "number of params for requires grad in backbone: {}",
        trainable_backbone_numel(model, cfg.model)
    ))?;

    let mut optimizer = GroupedAdamW::new(model, cfg.model, cfg.lr, cfg.weight_decay)
        .context("Failed to build optimizer")?;
    let schedule = CosineSchedule::new(cfg.lr, cfg.epochs, cfg.warmup_epochs);
    let num_epochs = schedule.cycle_length() + cfg.warmup_epochs;

    let mut ema = if cfg.ema {
        logger.log("initialize ema model")?;
        Some(ModelEma::new(model, cfg.ema_decay.unwrap_or(0.9998)))
    } else {
        logger.log("Dont use ema model")?;
        None
    };

    let mixup_active = cfg.mixup_active();
    logger.log(&format!("mixup_active : {mixup_active}"))?;
    // With the prefetcher the loader's collate hook already mixed the batch
    let mut mixup = if mixup_active && !cfg.prefetcher {
        Some(
            Mixup::new(cfg.mixup, cfg.cutmix, cfg.smoothing, cfg.num_classes, cfg.seed)
                .context("Failed to build mixup")?,
        )
    } else {
        None
    };

    let criterion = select_loss(mixup_active);
    logger.log(&format!("Using {}", criterion.name()))?;
    logger.log("Training in FP32")?;

    let mut best_val_acc = 0.0_f32;

    for epoch in 1..=num_epochs {
        optimizer.set_lr(schedule.lr_at(epoch - 1));

        let train_loss = train_one_epoch(
            model,
            loader_train,
            &mut optimizer,
            criterion.as_ref(),
            mixup.as_mut(),
            ema.as_mut(),
        )?;
        loader_train.reset();
        logger.log(&format!("epoch: {epoch}  train_loss: {train_loss:.4}"))?;

        let (top1, _top5) = validate(model, loader_eval)?;
        loader_eval.reset();
        let val_acc = top1.avg();
        logger.log(&format!("Acc@1: {val_acc:>7.4}"))?;
        logger.log(&format!(" epoch: {epoch}     eval_acc: {val_acc:.2}"))?;

        if is_new_best(val_acc, best_val_acc) {
            best_val_acc = val_acc;
            save_checkpoint(
                model,
                &run_dir,
                &tag("best", tag_suffix),
                CheckpointMetadata {
                    epoch,
                    accuracy: Some(val_acc),
                },
            )?;
        }
        if epoch == num_epochs {
            save_checkpoint(
                model,
                &run_dir,
                &tag("final", tag_suffix),
                CheckpointMetadata {
                    epoch,
                    accuracy: Some(val_acc),
                },
            )?;
        }
        logger.log("")?;
    }

    // Final report; with EMA enabled the shadow weights are evaluated
    let (top1, _top5) = match ema.as_mut() {
        Some(shadow) => validate(shadow.module_mut(), loader_eval)?,
        None => validate(model, loader_eval)?,
    };
    loader_eval.reset();
    let final_acc = top1.avg();
    logger.log(&format!("Acc@1: {final_acc:>7.4}"))?;

    Ok(FitOutcome {
        best_acc: best_val_acc,
        final_acc,
        epochs_run: num_epochs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_with_and_without_suffix() {
        assert_eq!(tag("best", None), "best");
        assert_eq!(tag("final", Some(2)), "final_2");
    }

    #[test]
    fn test_best_requires_strict_improvement() {
        assert!(is_new_best(50.0, 0.0));
        assert!(is_new_best(50.1, 50.0));
        assert!(!is_new_best(50.0, 50.0));
        assert!(!is_new_best(49.9, 50.0));
    }

    #[test]
    fn test_zero_accuracy_never_triggers_best() {
        assert!(!is_new_best(0.0, 0.0));
    }
}
