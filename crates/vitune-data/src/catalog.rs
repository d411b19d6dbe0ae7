//! Dataset catalog: closed enumerations and class-count tables

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Class count for the domain-generalization benchmark (ImageNet labels)
pub const DG_NUM_CLASSES: usize = 1000;

/// Training source for the domain-generalization benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum SourceDataset {
    #[value(name = "imagenet")]
    Imagenet,
}

impl SourceDataset {
    /// Directory name under the data root
    pub fn name(self) -> &'static str {
        match self {
            SourceDataset::Imagenet => "imagenet",
        }
    }
}

/// Evaluation target for the domain-generalization benchmark
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum TargetDataset {
    #[value(name = "imagenet")]
    Imagenet,
    #[value(name = "imagenet-adversarial")]
    ImagenetAdversarial,
    #[value(name = "imagenet-rendition")]
    ImagenetRendition,
    #[value(name = "imagenet-sketch")]
    ImagenetSketch,
    #[value(name = "imagenetv2")]
    Imagenetv2,
}

impl TargetDataset {
    /// Directory name under the data root
    pub fn name(self) -> &'static str {
        match self {
            TargetDataset::Imagenet => "imagenet",
            TargetDataset::ImagenetAdversarial => "imagenet-adversarial",
            TargetDataset::ImagenetRendition => "imagenet-rendition",
            TargetDataset::ImagenetSketch => "imagenet-sketch",
            TargetDataset::Imagenetv2 => "imagenetv2",
        }
    }
}

/// The 19 visual adaptation tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum VtabTask {
    #[value(name = "cifar_100")]
    Cifar100,
    #[value(name = "dtd")]
    Dtd,
    #[value(name = "patch_camelyon")]
    PatchCamelyon,
    #[value(name = "eurosat")]
    Eurosat,
    #[value(name = "kitti")]
    Kitti,
    #[value(name = "dmlab")]
    Dmlab,
    #[value(name = "caltech101")]
    Caltech101,
    #[value(name = "clevr_count")]
    ClevrCount,
    #[value(name = "clevr_dist")]
    ClevrDist,
    #[value(name = "diabetic_retinopathy")]
    DiabeticRetinopathy,
    #[value(name = "dsprites_loc")]
    DspritesLoc,
    #[value(name = "dsprites_ori")]
    DspritesOri,
    #[value(name = "pets")]
    Pets,
    #[value(name = "flowers102")]
    Flowers102,
    #[value(name = "resisc45")]
    Resisc45,
    #[value(name = "smallnorb_azi")]
    SmallnorbAzi,
    #[value(name = "smallnorb_ele")]
    SmallnorbEle,
    #[value(name = "sun397")]
    Sun397,
    #[value(name = "svhn")]
    Svhn,
}

impl VtabTask {
    /// Directory name under the data root
    pub fn name(self) -> &'static str {
        match self {
            VtabTask::Cifar100 => "cifar_100",
            VtabTask::Dtd => "dtd",
            VtabTask::PatchCamelyon => "patch_camelyon",
            VtabTask::Eurosat => "eurosat",
            VtabTask::Kitti => "kitti",
            VtabTask::Dmlab => "dmlab",
            VtabTask::Caltech101 => "caltech101",
            VtabTask::ClevrCount => "clevr_count",
            VtabTask::ClevrDist => "clevr_dist",
            VtabTask::DiabeticRetinopathy => "diabetic_retinopathy",
            VtabTask::DspritesLoc => "dsprites_loc",
            VtabTask::DspritesOri => "dsprites_ori",
            VtabTask::Pets => "pets",
            VtabTask::Flowers102 => "flowers102",
            VtabTask::Resisc45 => "resisc45",
            VtabTask::SmallnorbAzi => "smallnorb_azi",
            VtabTask::SmallnorbEle => "smallnorb_ele",
            VtabTask::Sun397 => "sun397",
            VtabTask::Svhn => "svhn",
        }
    }

    /// Fixed class count per task
    pub fn num_classes(self) -> usize {
        match self {
            VtabTask::Cifar100 => 100,
            VtabTask::Dtd => 47,
            VtabTask::PatchCamelyon => 2,
            VtabTask::Eurosat => 10,
            VtabTask::Kitti => 4,
            VtabTask::Dmlab => 6,
            VtabTask::Caltech101 => 102,
            VtabTask::ClevrCount => 8,
            VtabTask::ClevrDist => 6,
            VtabTask::DiabeticRetinopathy => 5,
            VtabTask::DspritesLoc => 16,
            VtabTask::DspritesOri => 16,
            VtabTask::Pets => 37,
            VtabTask::Flowers102 => 102,
            VtabTask::Resisc45 => 45,
            VtabTask::SmallnorbAzi => 18,
            VtabTask::SmallnorbEle => 9,
            VtabTask::Sun397 => 397,
            VtabTask::Svhn => 10,
        }
    }
}
