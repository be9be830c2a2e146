pub mod model;

#[cfg(feature = "dataset")]
pub mod augmentation;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "training")]
pub mod training;

#[cfg(feature = "training")]
pub mod inference;

#[cfg(feature = "dataset")]
pub mod visualize;

pub use model::UNet;
pub use model::UNetConfig;

#[cfg(feature = "dataset")]
pub use augmentation::{AugmentationConfig, AugmentationPipeline, RandAugmentConfig};

#[cfg(feature = "dataset")]
pub use dataset::{
    DatasetError, OxfordPetDataset, PetClass, SegmentationBatch, SegmentationBatcher,
    SegmentationSample,
};

#[cfg(feature = "training")]
pub use training::{
    DisplayCallback, EpochCallback, MeanIoUMetric, PixelAccuracyMetric, SegmentationOutput,
    TrainingConfig, TrainingError, train,
};

#[cfg(feature = "training")]
pub use inference::{load_model, predict, predict_masks};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of classes in the Oxford-IIIT Pet trimaps.
pub const NUM_CLASSES: usize = 3;
