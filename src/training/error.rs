use std::path::PathBuf;

use burn::record::RecorderError;
use thiserror::Error;

use crate::dataset::DatasetError;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write image `{path}`: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to load or save model record: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected prediction data: {0}")]
    Prediction(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl TrainingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image_write(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::ImageWrite {
            path: path.into(),
            source,
        }
    }
}
