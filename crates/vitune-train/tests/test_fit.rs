//! Integration tests for the epoch loop

use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;
use vitune_data::{write_split, Loader, TransformProfile};
use vitune_model::{Backbone, ViTConfig, VisionTransformer};
use vitune_train::{fit, Benchmark, RunConfig, RunLogger};

/// A model small enough for a test run but with the real 224 input contract
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
        adapter_scale: 1.0,
        drop_path: 0.0,
        seed: Some(42),
        ..ViTConfig::default()
    })
}

/// Write a split of `count` constant-valued 3x8x8 images with cycling labels
fn write_toy_split(root: &Path, split: &str, count: usize, num_classes: usize) {
    let stride = 3 * 8 * 8;
    let mut images = Vec::with_capacity(count * stride);
    let mut labels = Vec::with_capacity(count);
    for i in 0..count {
        images.extend(std::iter::repeat(i as f32 / count as f32).take(stride));
        labels.push((i % num_classes) as u32);
    }
    write_split(&root.join("toy").join(split), &images, &labels, 3, 8, 8)
        .expect("write toy split");
}

fn toy_config(root: &Path, output_dir: PathBuf) -> RunConfig {
    RunConfig {
        benchmark: Benchmark::Vtab,
        model: Backbone::VitBasePatch16_224In21k,
        dataset: "toy".to_string(),
        num_classes: 2,
        data_dir: root.to_path_buf(),
        load_path: None,
        output_dir,
        batch_size: 2,
        batch_size_test: 2,
        epochs: 1,
        warmup_epochs: 0,
        r: 2,
        scale: 1.0,
        weight_decay: 0.05,
        lr: 1e-3,
        drop_path: 0.0,
        mixup: 0.0,
        cutmix: 0.0,
        smoothing: 0.0,
        ema: false,
        ema_decay: None,
        amp: false,
        prefetcher: false,
        num_workers: 0,
        seed: 42,
    }
}

fn open_loaders(cfg: &RunConfig) -> Result<(Loader, Loader)> {
    let train = Loader::open(
        &cfg.data_dir,
        &cfg.dataset,
        "train_val",
        TransformProfile::Vtab,
        cfg.batch_size,
        true,
        cfg.num_workers,
        cfg.seed,
        None,
    )?;
    let eval = Loader::open(
        &cfg.data_dir,
        &cfg.dataset,
        "test",
        TransformProfile::Vtab,
        cfg.batch_size_test,
        false,
        cfg.num_workers,
        cfg.seed,
        None,
    )?;
    Ok((train, eval))
}

#[test]
fn test_single_epoch_run_end_to_end() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    write_toy_split(dir.path(), "train_val", 4, 2);
    write_toy_split(dir.path(), "test", 2, 2);

    let cfg = toy_config(dir.path(), dir.path().join("checkpoint"));
    let (mut train, mut eval) = open_loaders(&cfg)?;
    assert_eq!(train.num_samples(), 4);
    assert_eq!(eval.num_samples(), 2);

    let mut model = tiny_model(cfg.num_classes);
    let logger = RunLogger::create(&cfg.log_file())?;

    let outcome = fit(&cfg, &mut model, &mut train, &mut eval, &logger, None)?;

    // epochs=1, warmup=0: exactly one TRAINING + VALIDATING round
    assert_eq!(outcome.epochs_run, 1);
    assert!((0.0..=100.0).contains(&outcome.final_acc));
    assert!((0.0..=100.0).contains(&outcome.best_acc));

    // exactly one final checkpoint
    let run_dir = cfg.run_dir();
    assert!(run_dir.join("final.safetensors").exists());

    // the log carries an accuracy line with a value in [0, 100]
    let log = std::fs::read_to_string(cfg.log_file())?;
    let acc_line = log
        .lines()
        .find(|line| line.contains("eval_acc:"))
        .expect("accuracy line present");
    let value: f32 = acc_line
        .rsplit("eval_acc:")
        .next()
        .expect("value after marker")
        .trim()
        .parse()
        .expect("accuracy parses");
    assert!((0.0..=100.0).contains(&value));

    // best checkpoints only exist on strict improvement over 0
    if outcome.best_acc == 0.0 {
        assert!(!run_dir.join("best.safetensors").exists());
    } else {
        assert!(run_dir.join("best.safetensors").exists());
    }

    Ok(())
}

#[test]
fn test_suffixed_tags_for_seeded_reruns() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    write_toy_split(dir.path(), "train_val", 4, 2);
    write_toy_split(dir.path(), "test", 2, 2);

    let cfg = toy_config(dir.path(), dir.path().join("checkpoint"));
    let (mut train, mut eval) = open_loaders(&cfg)?;
    let mut model = tiny_model(cfg.num_classes);
    let logger = RunLogger::create(&cfg.log_file())?;

    fit(&cfg, &mut model, &mut train, &mut eval, &logger, Some(0))?;

    let run_dir = cfg.run_dir();
    assert!(run_dir.join("final_0.safetensors").exists());
    assert!(!run_dir.join("final.safetensors").exists());
    Ok(())
}

#[test]
fn test_effective_epochs_include_warmup() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    write_toy_split(dir.path(), "train_val", 4, 2);
    write_toy_split(dir.path(), "test", 2, 2);

    let mut cfg = toy_config(dir.path(), dir.path().join("checkpoint"));
    cfg.epochs = 1;
    cfg.warmup_epochs = 1;

    let (mut train, mut eval) = open_loaders(&cfg)?;
    let mut model = tiny_model(cfg.num_classes);
    let logger = RunLogger::create(&cfg.log_file())?;

    let outcome = fit(&cfg, &mut model, &mut train, &mut eval, &logger, None)?;
    assert_eq!(outcome.epochs_run, 2);
    Ok(())
}

#[test]
fn test_mixup_run_uses_soft_target_loss() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    write_toy_split(dir.path(), "train_val", 4, 2);
    write_toy_split(dir.path(), "test", 2, 2);

    let mut cfg = toy_config(dir.path(), dir.path().join("checkpoint"));
    cfg.mixup = 0.8;

    let (mut train, mut eval) = open_loaders(&cfg)?;
    let mut model = tiny_model(cfg.num_classes);
    let logger = RunLogger::create(&cfg.log_file())?;

    fit(&cfg, &mut model, &mut train, &mut eval, &logger, None)?;

    let log = std::fs::read_to_string(cfg.log_file())?;
    assert!(log.contains("mixup_active : true"));
    assert!(log.contains("Using SoftTargetCrossEntropy"));
    Ok(())
}

#[test]
fn test_plain_run_uses_hard_label_loss() -> Result<()> {
    let dir = TempDir::new().expect("tempdir");
    write_toy_split(dir.path(), "train_val", 4, 2);
    write_toy_split(dir.path(), "test", 2, 2);

    let cfg = toy_config(dir.path(), dir.path().join("checkpoint"));
    let (mut train, mut eval) = open_loaders(&cfg)?;
    let mut model = tiny_model(cfg.num_classes);
    let logger = RunLogger::create(&cfg.log_file())?;

    fit(&cfg, &mut model, &mut train, &mut eval, &logger, None)?;

    let log = std::fs::read_to_string(cfg.log_file())?;
    assert!(log.contains("mixup_active : false"));
    assert!(log.contains("Using CrossEntropyLoss"));
    assert!(log.contains("Dont use ema model"));
    Ok(())
}
