use std::fs;
use std::path::{Path, PathBuf};

use burn::data::dataset::Dataset;
use image::{DynamicImage, ImageReader};

use super::{DatasetError, SegmentationSample, preprocess};

pub const IMAGES_DIR: &str = "images";
pub const ANNOTATIONS_DIR: &str = "annotations";
pub const TRIMAPS_DIR: &str = "trimaps";
pub const TRAINVAL_LIST: &str = "trainval.txt";
pub const TEST_LIST: &str = "test.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Species {
    Cat,
    Dog,
}

/// One entry of an Oxford-IIIT Pet split list, e.g. `Abyssinian_100 1 1 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PetRecord {
    /// File stem shared by the image and its trimap.
    pub name: String,
    /// Breed index over all 37 breeds, 1-based.
    pub class_id: u8,
    pub species: Species,
    /// Breed index within the species, 1-based.
    pub breed_id: u8,
}

impl PetRecord {
    pub fn image_path(&self, root: &Path) -> PathBuf {
        root.join(IMAGES_DIR).join(format!("{}.jpg", self.name))
    }

    pub fn trimap_path(&self, root: &Path) -> PathBuf {
        root.join(ANNOTATIONS_DIR)
            .join(TRIMAPS_DIR)
            .join(format!("{}.png", self.name))
    }

    fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();

        let name = fields.next()?.to_string();
        let class_id = fields.next()?.parse().ok()?;
        let species = match fields.next()?.parse::<u8>().ok()? {
            1 => Species::Cat,
            2 => Species::Dog,
            _ => return None,
        };
        let breed_id = fields.next()?.parse().ok()?;

        if fields.next().is_some() {
            return None;
        }

        Some(Self {
            name,
            class_id,
            species,
            breed_id,
        })
    }
}

/// Parses a split list. Blank lines and `#` comments are skipped.
pub fn read_split_file(path: &Path) -> Result<Vec<PetRecord>, DatasetError> {
    let content = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            PetRecord::parse(line).ok_or_else(|| DatasetError::MalformedSplitLine {
                path: path.to_path_buf(),
                line: index + 1,
                content: line.to_string(),
            })
        })
        .collect()
}

/// Splits both official lists at `train_ratio`, in file order.
///
/// Training gets the head of `trainval` followed by the head of `test`;
/// validation gets both tails. Every record ends up in exactly one split.
pub fn split_records(
    trainval: Vec<PetRecord>,
    test: Vec<PetRecord>,
    train_ratio: f64,
) -> (Vec<PetRecord>, Vec<PetRecord>) {
    assert!(
        (0.0..=1.0).contains(&train_ratio),
        "Train ratio must be in [0, 1]. Got {}",
        train_ratio
    );

    let mut train = Vec::with_capacity(trainval.len() + test.len());
    let mut valid = Vec::new();

    for records in [trainval, test] {
        let cut = (records.len() as f64 * train_ratio).round() as usize;
        let mut records = records;
        let tail = records.split_off(cut);
        train.extend(records);
        valid.extend(tail);
    }

    (train, valid)
}

/// Reads the official `trainval` and `test` lists under `root` and splits them.
pub fn load_splits(
    root: &Path,
    train_ratio: f64,
) -> Result<(Vec<PetRecord>, Vec<PetRecord>), DatasetError> {
    let annotations = root.join(ANNOTATIONS_DIR);
    if !annotations.is_dir() {
        return Err(DatasetError::MissingDirectory(annotations));
    }

    let trainval = read_split_file(&annotations.join(TRAINVAL_LIST))?;
    let test = read_split_file(&annotations.join(TEST_LIST))?;

    Ok(split_records(trainval, test, train_ratio))
}

fn open_image(path: &Path) -> Result<DynamicImage, DatasetError> {
    // a few files carry the wrong extension, so sniff the format
    ImageReader::open(path)
        .map_err(|e| DatasetError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| DatasetError::io(path, e))?
        .decode()
        .map_err(|e| DatasetError::image(path, e))
}

/// Loads and preprocesses one image/trimap pair.
pub fn load_sample(root: &Path, record: &PetRecord) -> Result<SegmentationSample, DatasetError> {
    let image = open_image(&record.image_path(root))?.into_rgb8();
    let trimap = open_image(&record.trimap_path(root))?.into_luma8();

    preprocess(&image, &trimap)
}

/// Lazily decoded Oxford-IIIT Pet samples.
pub struct OxfordPetDataset {
    root: PathBuf,
    records: Vec<PetRecord>,
}

impl OxfordPetDataset {
    /// Keeps the records whose image and trimap decode, agree in size and
    /// carry valid trimap labels.
    ///
    /// Every pair is decoded once here and dropped on failure, so
    /// [`Dataset::get`] never hits a gap that would end a loader's iteration.
    pub fn new<P: AsRef<Path>>(root: P, records: Vec<PetRecord>) -> Result<Self, DatasetError> {
        let root = root.as_ref().to_path_buf();

        let images_dir = root.join(IMAGES_DIR);
        if !images_dir.is_dir() {
            return Err(DatasetError::MissingDirectory(images_dir));
        }
        let trimaps_dir = root.join(ANNOTATIONS_DIR).join(TRIMAPS_DIR);
        if !trimaps_dir.is_dir() {
            return Err(DatasetError::MissingDirectory(trimaps_dir));
        }

        let total = records.len();
        let records: Vec<PetRecord> = records
            .into_iter()
            .filter(|record| match Self::check_record(&root, record) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", record.name, err);
                    false
                }
            })
            .collect();

        if records.len() < total {
            tracing::warn!(
                "Kept {} of {} records under {}",
                records.len(),
                total,
                root.display()
            );
        }

        Ok(Self { root, records })
    }

    pub fn records(&self) -> &[PetRecord] {
        &self.records
    }

    fn check_record(root: &Path, record: &PetRecord) -> Result<(), DatasetError> {
        load_sample(root, record).map(|_| ())
    }
}

impl Dataset<SegmentationSample> for OxfordPetDataset {
    fn get(&self, index: usize) -> Option<SegmentationSample> {
        let record = self.records.get(index)?;

        match load_sample(&self.root, record) {
            Ok(sample) => Some(sample),
            Err(err) => {
                tracing::error!("Failed to load {}: {}", record.name, err);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
