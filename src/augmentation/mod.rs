//! Joint image/mask augmentation.
//!
//! Geometric transforms move image and mask together so every label stays
//! on the pixel it describes; photometric transforms touch the image only.

mod geometric;
mod photometric;

use std::sync::Arc;

use burn::prelude::*;
use rand::RngCore;

use crate::dataset::SegmentationSample;

pub use geometric::{FillMode, RandomFlip, RandomRotation, Resize};
pub use photometric::{PhotometricOp, RandAugment};

pub trait Transform: Send + Sync {
    fn apply(&self, sample: SegmentationSample, rng: &mut dyn RngCore) -> SegmentationSample;
}

#[derive(Config, Debug)]
pub struct RandAugmentConfig {
    #[config(default = 3)]
    pub augmentations_per_image: usize,
    #[config(default = 0.5)]
    pub magnitude: f32,
    #[config(default = 0.15)]
    pub magnitude_stddev: f32,
    /// Probability that each picked operation is actually applied.
    #[config(default = 0.9090909)]
    pub rate: f64,
}

#[derive(Config, Debug)]
pub struct AugmentationConfig {
    /// `[height, width]` every sample is resized to.
    #[config(default = "[160, 160]")]
    pub image_size: [usize; 2],
    #[config(default = 0.5)]
    pub flip_probability: f64,
    /// Rotation range in fractions of a full turn.
    #[config(default = "[-0.2, 0.2]")]
    pub rotation_factor: [f32; 2],
    #[config(default = true)]
    pub reflect_fill: bool,
    /// Photometric policy for training; `None` uses its defaults.
    pub rand_augment: Option<RandAugmentConfig>,
}

/// Ordered list of transforms applied to each sample.
#[derive(Clone, Default)]
pub struct AugmentationPipeline {
    transforms: Vec<Arc<dyn Transform>>,
}

impl AugmentationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    /// Resize, horizontal flip, rotation, then the photometric policy.
    pub fn training(config: &AugmentationConfig) -> Self {
        let fill_mode = if config.reflect_fill {
            FillMode::Reflect
        } else {
            FillMode::Constant
        };

        let pipeline = Self::validation(config)
            .then(RandomFlip::new(config.flip_probability))
            .then(RandomRotation::new(config.rotation_factor, fill_mode));

        let rand_augment = config
            .rand_augment
            .clone()
            .unwrap_or_else(RandAugmentConfig::new);

        pipeline.then(RandAugment::new(&rand_augment))
    }

    /// Resize only.
    pub fn validation(config: &AugmentationConfig) -> Self {
        let [height, width] = config.image_size;
        Self::new().then(Resize::new(height as u32, width as u32))
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn apply(&self, sample: SegmentationSample, rng: &mut dyn RngCore) -> SegmentationSample {
        self.transforms
            .iter()
            .fold(sample, |sample, transform| transform.apply(sample, rng))
    }
}

impl std::fmt::Debug for AugmentationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentationPipeline")
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, Rgb32FImage};
    use rand::{SeedableRng, rngs::StdRng};

    fn sample(width: u32, height: u32) -> SegmentationSample {
        SegmentationSample {
            image: Rgb32FImage::from_fn(width, height, |x, y| {
                Rgb([x as f32 / width as f32, y as f32 / height as f32, 0.25])
            }),
            mask: GrayImage::from_fn(width, height, |x, _| Luma([(x % 3) as u8])),
        }
    }

    #[test]
    fn training_pipeline_yields_configured_size_and_valid_values() {
        let config = AugmentationConfig::new().with_image_size([32, 48]);
        let pipeline = AugmentationPipeline::training(&config);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(pipeline.len(), 4);
        for _ in 0..4 {
            let out = pipeline.apply(sample(75, 50), &mut rng);
            assert_eq!(out.dimensions(), (48, 32));
            assert_eq!(out.mask.dimensions(), (48, 32));
            assert!(out.image.iter().all(|v| (0.0..=1.0).contains(v)));
            assert!(out.mask.iter().all(|&v| v <= 2));
        }
    }

    #[test]
    fn validation_pipeline_only_resizes() {
        let config = AugmentationConfig::new().with_image_size([10, 10]);
        let pipeline = AugmentationPipeline::validation(&config);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(pipeline.len(), 1);
        let first = pipeline.apply(sample(20, 20), &mut rng);
        let second = pipeline.apply(sample(20, 20), &mut rng);
        assert_eq!(first.mask, second.mask);
        assert_eq!(first.image, second.image);
    }
}
