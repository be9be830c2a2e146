use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image `{path}`: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Directory does not exist: `{0}`")]
    MissingDirectory(PathBuf),

    #[error("Trimap value {0} is outside the expected range 1..=3")]
    InvalidLabel(u8),

    #[error("Image is {image:?} but mask is {mask:?}")]
    DimensionMismatch { image: (u32, u32), mask: (u32, u32) },

    #[error("Malformed line {line} in `{path}`: `{content}`")]
    MalformedSplitLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("Download of `{url}` failed: {reason}")]
    Download { url: String, reason: String },
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }
}
