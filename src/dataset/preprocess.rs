use image::{GrayImage, Rgb, Rgb32FImage, RgbImage};

use super::DatasetError;

/// Class labels after reindexing the Oxford-IIIT Pet trimaps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PetClass {
    Pet = 0,
    Background = 1,
    Boundary = 2,
}

impl PetClass {
    pub const ALL: [PetClass; 3] = [PetClass::Pet, PetClass::Background, PetClass::Boundary];

    pub fn label(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            PetClass::Pet => "pet",
            PetClass::Background => "background",
            PetClass::Boundary => "boundary",
        }
    }
}

/// An image with its per-pixel labels, always of identical width and height.
#[derive(Clone, Debug)]
pub struct SegmentationSample {
    /// RGB intensities in `[0, 1]`.
    pub image: Rgb32FImage,
    /// Class label per pixel.
    pub mask: GrayImage,
}

impl SegmentationSample {
    pub fn new(image: Rgb32FImage, mask: GrayImage) -> Result<Self, DatasetError> {
        if image.dimensions() != mask.dimensions() {
            return Err(DatasetError::DimensionMismatch {
                image: image.dimensions(),
                mask: mask.dimensions(),
            });
        }

        Ok(Self { image, mask })
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub fn normalize_image(image: &RgbImage) -> Rgb32FImage {
    let (width, height) = image.dimensions();

    Rgb32FImage::from_fn(width, height, |x, y| {
        Rgb(image.get_pixel(x, y).0.map(|v| v as f32 / 255.0))
    })
}

/// Shifts trimap labels `{1, 2, 3}` to `{0, 1, 2}`.
pub fn reindex_mask(trimap: &GrayImage) -> Result<GrayImage, DatasetError> {
    let mut mask = trimap.clone();

    for value in mask.iter_mut() {
        if !(1..=3).contains(value) {
            return Err(DatasetError::InvalidLabel(*value));
        }
        *value -= 1;
    }

    Ok(mask)
}

pub fn preprocess(image: &RgbImage, trimap: &GrayImage) -> Result<SegmentationSample, DatasetError> {
    if image.dimensions() != trimap.dimensions() {
        return Err(DatasetError::DimensionMismatch {
            image: image.dimensions(),
            mask: trimap.dimensions(),
        });
    }

    SegmentationSample::new(normalize_image(image), reindex_mask(trimap)?)
}
