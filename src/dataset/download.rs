//! Fetches the Oxford-IIIT Pet archives.

use std::fs;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;

use super::DatasetError;
use super::oxford_pet::{ANNOTATIONS_DIR, IMAGES_DIR, TRIMAPS_DIR};

const BASE_URL: &str = "https://thor.robots.ox.ac.uk/datasets/pets/";
const ARCHIVES: [&str; 2] = ["images.tar.gz", "annotations.tar.gz"];

/// Whether `root` already holds extracted images and trimaps.
pub fn is_extracted(root: &Path) -> bool {
    root.join(IMAGES_DIR).is_dir() && root.join(ANNOTATIONS_DIR).join(TRIMAPS_DIR).is_dir()
}

/// Downloads and unpacks both archives into `root` unless already present.
pub fn download(root: &Path) -> Result<(), DatasetError> {
    if is_extracted(root) {
        tracing::info!("Oxford-IIIT Pet already present in {}", root.display());
        return Ok(());
    }

    fs::create_dir_all(root).map_err(|e| DatasetError::io(root, e))?;

    for archive in ARCHIVES {
        let url = format!("{BASE_URL}{archive}");
        tracing::info!("Downloading {url}");

        let response = reqwest::blocking::get(&url)
            .and_then(|response| response.error_for_status())
            .map_err(|e| DatasetError::Download {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Extracting {archive} into {}", root.display());
        Archive::new(GzDecoder::new(response))
            .unpack(root)
            .map_err(|e| DatasetError::io(root, e))?;
    }

    Ok(())
}
