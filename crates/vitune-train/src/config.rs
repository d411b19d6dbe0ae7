//! Immutable run configuration
//!
//! Resolved once from the command line by each entry binary and passed by
//! reference everywhere else. The run directory is a pure function of the
//! field values: identical configs reuse the same directory, and every
//! hyperparameter that affects the result is encoded in the leaf name.

use std::path::PathBuf;

use serde::Serialize;
use vitune_model::{Backbone, BackboneParams};

/// Which benchmark recipe a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Benchmark {
    /// Domain generalization (few-shot source, shifted target)
    Dg,
    /// The 19-task visual adaptation benchmark
    Vtab,
}

impl Benchmark {
    /// Directory segment for this benchmark
    pub fn name(self) -> &'static str {
        match self {
            Benchmark::Dg => "DG",
            Benchmark::Vtab => "VTAB",
        }
    }
}

/// All hyperparameters of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub benchmark: Benchmark,
    pub model: Backbone,
    /// Dataset the run is keyed by (target dataset for DG, task for VTAB)
    pub dataset: String,
    pub num_classes: usize,

    pub data_dir: PathBuf,
    pub load_path: Option<PathBuf>,
    /// Root under which run directories are created
    pub output_dir: PathBuf,

    pub batch_size: usize,
    pub batch_size_test: usize,
    pub epochs: usize,
    pub warmup_epochs: usize,

    /// Adapter bottleneck rank
    pub r: usize,
    /// Adapter output scaling
    pub scale: f32,

    pub weight_decay: f32,
    pub lr: f32,
    pub drop_path: f32,
    pub mixup: f32,
    pub cutmix: f32,
    pub smoothing: f32,

    pub ema: bool,
    /// None whenever `ema` is off
    pub ema_decay: Option<f32>,

    pub amp: bool,
    pub prefetcher: bool,
    pub num_workers: usize,
    pub seed: u64,
}

impl RunConfig {
    /// Whether batch mixing is active this run
    pub fn mixup_active(&self) -> bool {
        self.mixup > 0.0 || self.cutmix > 0.0
    }

    /// Backbone construction knobs derived from this config
    pub fn backbone_params(&self) -> BackboneParams {
        BackboneParams {
            num_classes: self.num_classes,
            adapter_dim: self.r,
            adapter_scale: self.scale,
            drop_path: self.drop_path,
            seed: Some(self.seed),
        }
    }

    /// Leaf directory name encoding every result-affecting hyperparameter
    fn encoded_dir(&self) -> String {
        let ema_decay = match self.ema_decay {
            Some(d) => format!("{d}"),
            None => "None".to_string(),
        };
        format!(
            "bs_{}_wd_{}_lr_{}_dp_{}_r_{}_scale_{}_sed_{}_ema_{}_emadcy_{}_amp_{}_mixup_{}_cutmix_{}_smooth_{}_prefet_{}",
            self.batch_size,
            self.weight_decay,
            self.lr,
            self.drop_path,
            self.r,
            self.scale,
            self.seed,
            self.ema,
            ema_decay,
            self.amp,
            self.mixup,
            self.cutmix,
            self.smoothing,
            self.prefetcher,
        )
    }

    /// `output_dir/<model>/<benchmark>/<dataset>/<encoded-dir>`
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir
            .join(self.model.name())
            .join(self.benchmark.name())
            .join(&self.dataset)
            .join(self.encoded_dir())
    }

    /// The run's log file inside the run directory
    pub fn log_file(&self) -> PathBuf {
        let name = match self.benchmark {
            Benchmark::Dg => format!("log_target_{}.txt", self.dataset),
            Benchmark::Vtab => "log.txt".to_string(),
        };
        self.run_dir().join(name)
    }
}
