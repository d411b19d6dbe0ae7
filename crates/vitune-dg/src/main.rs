//! Domain-generalization fine-tuning
//!
//! Trains adapters + head on 16-shot subsets of the source dataset across
//! three data-split seeds and evaluates each run against a shifted target
//! distribution, ending with the mean accuracy over the three reruns.
//!
//! # Usage
//!
//! ```bash
//! vitune-dg \
//!   --data_dir ./data \
//!   --target_dataset imagenet-sketch \
//!   [--load_path pretrained.safetensors] \
//!   [--lr 1e-3] [--epochs 100] [--warmup_epochs 10] [--r 2] [--scale 1.0]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use vitune_data::{CollateFn, Loader, SourceDataset, TargetDataset, TransformProfile, DG_NUM_CLASSES};
use vitune_model::{load_pretrained, Backbone};
use vitune_train::mixup::Mixup;
use vitune_train::{fit, Benchmark, RunConfig, RunLogger};

/// Number of independent few-shot data-split seeds per run
const NUM_FSEEDS: usize = 3;

/// Domain-generalization fine-tuning
#[derive(Parser, Debug)]
#[command(name = "vitune-dg")]
#[command(about = "Adapter fine-tuning under domain shift", long_about = None)]
struct Args {
    /// Data root containing the dataset split directories
    #[arg(long = "data_dir", value_name = "PATH", required = true)]
    data_dir: PathBuf,

    /// Pretrained backbone weights (SafeTensors)
    #[arg(long = "load_path", value_name = "PATH")]
    load_path: Option<PathBuf>,

    /// Training source distribution
    #[arg(long = "source_dataset", value_enum, default_value = "imagenet")]
    source_dataset: SourceDataset,

    /// Evaluation target distribution
    #[arg(long = "target_dataset", value_enum, default_value = "imagenet")]
    target_dataset: TargetDataset,

    /// Backbone to fine-tune
    #[arg(long, value_enum, default_value = "vit_base_patch16_224_in21k")]
    model: Backbone,

    #[arg(long = "batch_size", default_value_t = 32)]
    batch_size: usize,

    #[arg(long = "batch_size_test", default_value_t = 256)]
    batch_size_test: usize,

    #[arg(long, default_value_t = 100)]
    epochs: usize,

    #[arg(long = "warmup_epochs", default_value_t = 10)]
    warmup_epochs: usize,

    /// Rank of the low-rank adapter transformations
    #[arg(long, default_value_t = 2)]
    r: usize,

    /// Adapter output scaling
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    #[arg(long = "weight_decay", default_value_t = 5e-2)]
    weight_decay: f32,

    #[arg(long, default_value_t = 1e-3)]
    lr: f32,

    /// Drop path rate
    #[arg(long = "drop_path", default_value_t = 0.0)]
    drop_path: f32,

    /// Mixup alpha, mixup enabled if > 0
    #[arg(long, default_value_t = 0.0)]
    mixup: f32,

    /// Cutmix alpha, cutmix enabled if > 0
    #[arg(long, default_value_t = 0.0)]
    cutmix: f32,

    /// Label smoothing
    #[arg(long, default_value_t = 0.0)]
    smoothing: f32,

    /// Maintain an EMA shadow model
    #[arg(long)]
    ema: bool,

    /// EMA decay factor
    #[arg(long = "ema_decay", default_value_t = 0.9998)]
    ema_decay: f32,

    /// Request mixed precision (this backend computes in f32)
    #[arg(long)]
    amp: bool,

    /// Apply mixup at collate time inside the loader
    #[arg(long)]
    prefetcher: bool,

    #[arg(long = "num_workers", default_value_t = 4)]
    num_workers: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Root directory for run outputs
    #[arg(long = "output_dir", default_value = "checkpoint")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = RunConfig {
        benchmark: Benchmark::Dg,
        model: args.model,
        dataset: args.target_dataset.name().to_string(),
        num_classes: DG_NUM_CLASSES,
        data_dir: args.data_dir,
        load_path: args.load_path,
        output_dir: args.output_dir,
        batch_size: args.batch_size,
        batch_size_test: args.batch_size_test,
        epochs: args.epochs,
        warmup_epochs: args.warmup_epochs,
        r: args.r,
        scale: args.scale,
        weight_decay: args.weight_decay,
        lr: args.lr,
        drop_path: args.drop_path,
        mixup: args.mixup,
        cutmix: args.cutmix,
        smoothing: args.smoothing,
        ema: args.ema,
        ema_decay: args.ema.then_some(args.ema_decay),
        amp: args.amp,
        prefetcher: args.prefetcher,
        num_workers: args.num_workers,
        seed: args.seed,
    };

    let logger = RunLogger::create(&cfg.log_file())?;
    logger.log(&serde_json::to_string_pretty(&cfg).context("Failed to render config")?)?;

    let source = args.source_dataset.name();
    let mut accs = Vec::new();

    for fseed in 0..NUM_FSEEDS {
        let train_split = format!("train_shot_16_seed_{fseed}");

        let mut model = cfg.model.build(&cfg.backbone_params());
        if let Some(path) = &cfg.load_path {
            load_pretrained(&mut model, path)
                .with_context(|| format!("Failed to load pretrained checkpoint {}", path.display()))?;
            logger.log(&format!("loaded pretrained checkpoint from {}", path.display()))?;
        }

        let mut loader_train = Loader::open(
            &cfg.data_dir,
            source,
            &train_split,
            TransformProfile::FgfsTrain,
            cfg.batch_size,
            true,
            cfg.num_workers,
            cfg.seed,
            collate_mixup(&cfg)?,
        )
        .with_context(|| format!("Failed to open training split {train_split}"))?;

        let mut loader_eval = Loader::open(
            &cfg.data_dir,
            &cfg.dataset,
            "test",
            TransformProfile::FgfsTest,
            cfg.batch_size_test,
            false,
            cfg.num_workers,
            cfg.seed,
            None,
        )
        .with_context(|| format!("Failed to open evaluation split of {}", cfg.dataset))?;

        let outcome = fit(
            &cfg,
            &mut model,
            &mut loader_train,
            &mut loader_eval,
            &logger,
            Some(fseed),
        )?;

        logger.log(&format!(
            "fseed : {fseed}     epoch: {}     eval_acc: {:.2}",
            outcome.epochs_run, outcome.final_acc
        ))?;
        accs.push(outcome.final_acc);
    }

    let mean = accs.iter().sum::<f32>() / accs.len() as f32;
    logger.log(&format!(
        "Overall Mean Acc with {} fseeds : {mean:.2}",
        accs.len()
    ))?;

    Ok(())
}

/// Collate-time mixup when the prefetcher flag is set
fn collate_mixup(cfg: &RunConfig) -> Result<Option<CollateFn>> {
    if cfg.prefetcher && cfg.mixup_active() {
        let mut mixer = Mixup::new(cfg.mixup, cfg.cutmix, cfg.smoothing, cfg.num_classes, cfg.seed)
            .context("Failed to build collate mixup")?;
        Ok(Some(Box::new(move |images, labels| {
            mixer.apply(&images, &labels)
        })))
    } else {
        Ok(None)
    }
}
