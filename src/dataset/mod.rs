mod batcher;
mod error;
mod oxford_pet;
mod preprocess;

#[cfg(feature = "download")]
pub mod download;

pub use batcher::{SegmentationBatch, SegmentationBatcher};
pub use error::DatasetError;
pub use oxford_pet::{
    ANNOTATIONS_DIR, IMAGES_DIR, OxfordPetDataset, TEST_LIST, TRAINVAL_LIST, TRIMAPS_DIR, PetRecord, Species, load_sample, load_splits, read_split_file,
    split_records,
};
pub use preprocess::{PetClass, SegmentationSample, normalize_image, preprocess, reindex_mask};
