//! Split datasets stored as binary tensor shards
//!
//! A split directory holds two little-endian files:
//! - `images.bin`: header `[count, channels, height, width]` (u32 each)
//!   followed by `count * channels * height * width` f32 pixel values (CHW)
//! - `labels.bin`: `count` (u32) followed by `count` u32 class labels

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

const IMAGES_FILE: &str = "images.bin";
const LABELS_FILE: &str = "labels.bin";

/// Errors raised while opening a split shard pair
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt shard {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Shard pair disagrees on sample count: {images} images vs {labels} labels")]
    CountMismatch { images: usize, labels: usize },
}

/// A finite, index-addressable split of labeled images
pub struct SplitDataset {
    images: Vec<f32>,
    labels: Vec<u32>,
    channels: usize,
    height: usize,
    width: usize,
}

impl SplitDataset {
    /// Open `root/<dataset>/<split>/{images.bin,labels.bin}`
    pub fn open(root: &Path, dataset: &str, split: &str) -> Result<Self, DatasetError> {
        let dir = root.join(dataset).join(split);
        let (images, channels, height, width, image_count) = read_images(&dir.join(IMAGES_FILE))?;
        let labels = read_labels(&dir.join(LABELS_FILE))?;

        if labels.len() != image_count {
            return Err(DatasetError::CountMismatch {
                images: image_count,
                labels: labels.len(),
            });
        }

        Ok(Self {
            images,
            labels,
            channels,
            height,
            width,
        })
    }

    /// Build a dataset from in-memory samples (test fixtures)
    pub fn from_samples(
        images: Vec<f32>,
        labels: Vec<u32>,
        channels: usize,
        height: usize,
        width: usize,
    ) -> Self {
        Self {
            images,
            labels,
            channels,
            height,
            width,
        }
    }

    /// Number of samples in the split
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (channels, height, width) of the stored images
    pub fn image_shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    /// Pixel buffer and label of sample `index`
    pub fn get(&self, index: usize) -> (&[f32], u32) {
        let stride = self.channels * self.height * self.width;
        let offset = index * stride;
        (&self.images[offset..offset + stride], self.labels[index])
    }
}

/// Write a split shard pair (fixture generation and tooling)
pub fn write_split(
    dir: &Path,
    images: &[f32],
    labels: &[u32],
    channels: usize,
    height: usize,
    width: usize,
) -> Result<(), DatasetError> {
    fs::create_dir_all(dir).map_err(|source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let count = labels.len() as u32;

    let mut image_bytes = Vec::with_capacity(16 + images.len() * 4);
    for value in [count, channels as u32, height as u32, width as u32] {
        image_bytes.extend_from_slice(&value.to_le_bytes());
    }
    for pixel in images {
        image_bytes.extend_from_slice(&pixel.to_le_bytes());
    }
    let images_path = dir.join(IMAGES_FILE);
    fs::write(&images_path, image_bytes).map_err(|source| DatasetError::Io {
        path: images_path,
        source,
    })?;

    let mut label_bytes = Vec::with_capacity(4 + labels.len() * 4);
    label_bytes.extend_from_slice(&count.to_le_bytes());
    for label in labels {
        label_bytes.extend_from_slice(&label.to_le_bytes());
    }
    let labels_path = dir.join(LABELS_FILE);
    fs::write(&labels_path, label_bytes).map_err(|source| DatasetError::Io {
        path: labels_path,
        source,
    })?;

    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_images(path: &Path) -> Result<(Vec<f32>, usize, usize, usize, usize), DatasetError> {
    let bytes = fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.len() < 16 {
        return Err(DatasetError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("header truncated at {} bytes", bytes.len()),
        });
    }

    let count = read_u32(&bytes, 0) as usize;
    let channels = read_u32(&bytes, 4) as usize;
    let height = read_u32(&bytes, 8) as usize;
    let width = read_u32(&bytes, 12) as usize;

    let expected = count * channels * height * width;
    let payload = &bytes[16..];
    if payload.len() != expected * 4 {
        return Err(DatasetError::Corrupt {
            path: path.to_path_buf(),
            reason: format!(
                "expected {} pixel values, found {} bytes of payload",
                expected,
                payload.len()
            ),
        });
    }

    let mut images = Vec::with_capacity(expected);
    for i in 0..expected {
        let offset = i * 4;
        images.push(f32::from_le_bytes([
            payload[offset],
            payload[offset + 1],
            payload[offset + 2],
            payload[offset + 3],
        ]));
    }

    Ok((images, channels, height, width, count))
}

fn read_labels(path: &Path) -> Result<Vec<u32>, DatasetError> {
    let bytes = fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.len() < 4 {
        return Err(DatasetError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("header truncated at {} bytes", bytes.len()),
        });
    }

    let count = read_u32(&bytes, 0) as usize;
    let payload = &bytes[4..];
    if payload.len() != count * 4 {
        return Err(DatasetError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("expected {} labels, found {} payload bytes", count, payload.len()),
        });
    }

    Ok((0..count).map(|i| read_u32(payload, i * 4)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(dir: &Path) {
        // two 3x4x4 images, labels 0 and 1
        let stride = 3 * 4 * 4;
        let mut images = vec![0.25_f32; stride];
        images.extend(vec![0.75_f32; stride]);
        write_split(&dir.join("toy").join("test"), &images, &[0, 1], 3, 4, 4)
            .expect("write fixture");
    }

    #[test]
    fn test_split_roundtrip() {
        let root = TempDir::new().expect("tempdir");
        fixture(root.path());

        let dataset = SplitDataset::open(root.path(), "toy", "test").expect("open");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.image_shape(), (3, 4, 4));

        let (pixels, label) = dataset.get(1);
        assert_eq!(label, 1);
        assert!(pixels.iter().all(|&v| v == 0.75));
    }

    #[test]
    fn test_missing_split_is_error() {
        let root = TempDir::new().expect("tempdir");
        assert!(SplitDataset::open(root.path(), "toy", "train").is_err());
    }

    #[test]
    fn test_count_mismatch_detected() {
        let root = TempDir::new().expect("tempdir");
        let dir = root.path().join("toy").join("test");
        write_split(&dir, &vec![0.0; 3 * 4 * 4], &[0], 3, 4, 4).expect("write");
        // overwrite labels with a second entry
        let mut bytes = 2_u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0_u32.to_le_bytes());
        bytes.extend_from_slice(&1_u32.to_le_bytes());
        fs::write(dir.join("labels.bin"), bytes).expect("overwrite labels");

        match SplitDataset::open(root.path(), "toy", "test") {
            Err(DatasetError::CountMismatch { images, labels }) => {
                assert_eq!((images, labels), (1, 2));
            }
            Err(other) => panic!("expected count mismatch, got {other}"),
            Ok(_) => panic!("expected count mismatch, got a dataset"),
        }
    }

    #[test]
    fn test_truncated_header_detected() {
        let root = TempDir::new().expect("tempdir");
        let dir = root.path().join("toy").join("test");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("images.bin"), [1, 2, 3]).expect("write stub");
        fs::write(dir.join("labels.bin"), 0_u32.to_le_bytes()).expect("write labels");

        assert!(matches!(
            SplitDataset::open(root.path(), "toy", "test"),
            Err(DatasetError::Corrupt { .. })
        ));
    }
}
