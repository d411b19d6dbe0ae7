//! Batching loader over a split dataset
//!
//! Assembles `(images, labels)` tensor batches after applying the split's
//! augmentation profile. Training mode reshuffles per pass and drops the
//! trailing partial batch; evaluation keeps order and the partial batch.
//! An optional collate hook rewrites the assembled batch (mixup at collate
//! time when the prefetcher flag is set).

use anyhow::{Context, Result};
use aprender::autograd::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::SplitDataset;
use crate::transform::{TransformProfile, INPUT_SIZE};

/// Batch rewrite hook applied after assembly
pub type CollateFn = Box<dyn FnMut(Tensor, Tensor) -> (Tensor, Tensor)>;

/// Shuffled batcher over one split
pub struct Loader {
    dataset: SplitDataset,
    profile: TransformProfile,
    batch_size: usize,
    training: bool,
    #[allow(dead_code)]
    num_workers: usize,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
    collate: Option<CollateFn>,
}

impl Loader {
    /// Create a loader over `dataset`
    ///
    /// `num_workers` is carried for parity with the run configuration;
    /// batches are produced synchronously.
    pub fn new(
        dataset: SplitDataset,
        profile: TransformProfile,
        batch_size: usize,
        training: bool,
        num_workers: usize,
        seed: u64,
        collate: Option<CollateFn>,
    ) -> Result<Self> {
        if batch_size == 0 {
            anyhow::bail!("batch_size must be positive");
        }
        let (channels, _, _) = dataset.image_shape();
        if channels != 3 {
            anyhow::bail!("Expected 3-channel images, split stores {channels}");
        }
        let mut loader = Self {
            order: (0..dataset.len()).collect(),
            dataset,
            profile,
            batch_size,
            training,
            num_workers,
            cursor: 0,
            rng: StdRng::seed_from_u64(seed),
            collate,
        };
        if loader.training {
            loader.order.shuffle(&mut loader.rng);
        }
        Ok(loader)
    }

    /// Number of samples in the underlying split
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    /// Assemble the next batch, or None when the pass is exhausted
    pub fn next_batch(&mut self) -> Result<Option<(Tensor, Tensor)>> {
        let remaining = self.order.len() - self.cursor;
        if remaining == 0 || (self.training && remaining < self.batch_size) {
            return Ok(None);
        }

        let take = remaining.min(self.batch_size);
        let (channels, height, width) = self.dataset.image_shape();
        let stride = 3 * INPUT_SIZE * INPUT_SIZE;

        let mut images = vec![0.0_f32; take * stride];
        let mut labels = vec![0.0_f32; take];

        for i in 0..take {
            let index = self.order[self.cursor + i];
            let (pixels, label) = self.dataset.get(index);
            let transformed = self
                .profile
                .apply(pixels, channels, height, width, &mut self.rng);
            images[i * stride..(i + 1) * stride].copy_from_slice(&transformed);
            labels[i] = label as f32;
        }
        self.cursor += take;

        let images = Tensor::new(&images, &[take, 3, INPUT_SIZE, INPUT_SIZE]);
        let labels = Tensor::new(&labels, &[take]);

        let batch = match self.collate.as_mut() {
            Some(collate) => collate(images, labels),
            None => (images, labels),
        };
        Ok(Some(batch))
    }

    /// Rewind the pass, reshuffling in training mode
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.training {
            self.order.shuffle(&mut self.rng);
        }
    }
}

impl Loader {
    /// Convenience constructor that opens the split from disk
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        root: &std::path::Path,
        dataset: &str,
        split: &str,
        profile: TransformProfile,
        batch_size: usize,
        training: bool,
        num_workers: usize,
        seed: u64,
        collate: Option<CollateFn>,
    ) -> Result<Self> {
        let dataset = SplitDataset::open(root, dataset, split)
            .with_context(|| format!("Failed to open split {split} of {dataset}"))?;
        Self::new(
            dataset,
            profile,
            batch_size,
            training,
            num_workers,
            seed,
            collate,
        )
    }
}
