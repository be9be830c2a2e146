use image::Rgb32FImage;
use rand::{Rng, RngCore, seq::SliceRandom};
use rand_distr::{Distribution, Normal};

use super::{RandAugmentConfig, Transform};
use crate::dataset::SegmentationSample;

const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];
const HISTOGRAM_BINS: usize = 256;

/// Colour operations that leave pixel positions untouched, so the mask
/// never needs to follow them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhotometricOp {
    Identity,
    AutoContrast,
    Equalize,
    Solarize,
    Posterize,
    ColorDegeneration,
    Contrast,
    Brightness,
}

impl PhotometricOp {
    pub const ALL: [PhotometricOp; 8] = [
        PhotometricOp::Identity,
        PhotometricOp::AutoContrast,
        PhotometricOp::Equalize,
        PhotometricOp::Solarize,
        PhotometricOp::Posterize,
        PhotometricOp::ColorDegeneration,
        PhotometricOp::Contrast,
        PhotometricOp::Brightness,
    ];

    /// Applies the operation at `magnitude` in `[0, 1]`. Operations with a
    /// direction (contrast, brightness) draw it from `rng`.
    pub fn apply(self, image: &mut Rgb32FImage, magnitude: f32, rng: &mut dyn RngCore) {
        match self {
            PhotometricOp::Identity => {}
            PhotometricOp::AutoContrast => auto_contrast(image),
            PhotometricOp::Equalize => equalize(image),
            PhotometricOp::Solarize => {
                let threshold = 1.0 - magnitude;
                for v in image.iter_mut() {
                    if *v >= threshold {
                        *v = 1.0 - *v;
                    }
                }
            }
            PhotometricOp::Posterize => {
                let bits = 8 - (magnitude * 4.0).round() as u32;
                let keep = !((1u32 << (8 - bits)) - 1) & 0xff;
                for v in image.iter_mut() {
                    let level = (*v * 255.0).round() as u32 & keep;
                    *v = level as f32 / 255.0;
                }
            }
            PhotometricOp::ColorDegeneration => {
                for pixel in image.pixels_mut() {
                    let gray = luma(pixel.0);
                    for v in pixel.0.iter_mut() {
                        *v = gray + (*v - gray) * (1.0 - magnitude);
                    }
                }
            }
            PhotometricOp::Contrast => {
                let factor = if rng.gen_bool(0.5) {
                    1.0 + magnitude
                } else {
                    1.0 - magnitude
                };
                let mean = mean_luma(image);
                for v in image.iter_mut() {
                    *v = (*v - mean) * factor + mean;
                }
            }
            PhotometricOp::Brightness => {
                let delta = rng.gen_range(-magnitude..=magnitude) * 0.5;
                for v in image.iter_mut() {
                    *v += delta;
                }
            }
        }

        for v in image.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
    }
}

fn luma(rgb: [f32; 3]) -> f32 {
    rgb.iter().zip(LUMA_WEIGHTS).map(|(v, w)| v * w).sum()
}

fn mean_luma(image: &Rgb32FImage) -> f32 {
    let count = (image.width() * image.height()).max(1) as f32;
    image.pixels().map(|p| luma(p.0)).sum::<f32>() / count
}

fn auto_contrast(image: &mut Rgb32FImage) {
    for c in 0..3 {
        let (low, high) = image
            .pixels()
            .map(|p| p[c])
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));

        if high > low {
            let scale = 1.0 / (high - low);
            for pixel in image.pixels_mut() {
                pixel[c] = (pixel[c] - low) * scale;
            }
        }
    }
}

fn equalize(image: &mut Rgb32FImage) {
    let bin = |v: f32| ((v * (HISTOGRAM_BINS - 1) as f32).round() as usize).min(HISTOGRAM_BINS - 1);
    let total = (image.width() * image.height()) as usize;

    for c in 0..3 {
        let mut histogram = [0usize; HISTOGRAM_BINS];
        for pixel in image.pixels() {
            histogram[bin(pixel[c])] += 1;
        }

        let mut cdf = [0usize; HISTOGRAM_BINS];
        let mut running = 0;
        for (i, count) in histogram.iter().enumerate() {
            running += count;
            cdf[i] = running;
        }

        let cdf_min = cdf.iter().copied().find(|&v| v > 0).unwrap_or(0);
        if total <= cdf_min {
            continue;
        }

        let denominator = (total - cdf_min) as f32;
        for pixel in image.pixels_mut() {
            let value = cdf[bin(pixel[c])].saturating_sub(cdf_min) as f32;
            pixel[c] = value / denominator;
        }
    }
}

/// Picks `augmentations_per_image` photometric operations per sample and
/// applies each with probability `rate` at a magnitude drawn around the
/// configured value. The mask is left untouched.
#[derive(Clone, Debug)]
pub struct RandAugment {
    augmentations_per_image: usize,
    rate: f64,
    magnitude: Normal<f32>,
}

impl RandAugment {
    pub fn new(config: &RandAugmentConfig) -> Self {
        assert!(
            (0.0..=1.0).contains(&config.magnitude),
            "RandAugment magnitude must be in [0, 1]. Got {}",
            config.magnitude
        );
        assert!(
            (0.0..=1.0).contains(&config.rate),
            "RandAugment rate must be in [0, 1]. Got {}",
            config.rate
        );

        let magnitude = Normal::new(config.magnitude, config.magnitude_stddev.max(0.0))
            .unwrap_or_else(|_| {
                panic!(
                    "Invalid RandAugment magnitude distribution N({}, {})",
                    config.magnitude, config.magnitude_stddev
                )
            });

        Self {
            augmentations_per_image: config.augmentations_per_image,
            rate: config.rate,
            magnitude,
        }
    }
}

impl Transform for RandAugment {
    fn apply(&self, mut sample: SegmentationSample, rng: &mut dyn RngCore) -> SegmentationSample {
        for _ in 0..self.augmentations_per_image {
            let Some(&op) = PhotometricOp::ALL.choose(rng) else {
                break;
            };
            if !rng.gen_bool(self.rate) {
                continue;
            }

            let magnitude = self.magnitude.sample(rng).clamp(0.0, 1.0);
            op.apply(&mut sample.image, magnitude, rng);
        }

        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};
    use rand::{SeedableRng, rngs::StdRng};

    fn noisy_image(rng: &mut StdRng) -> Rgb32FImage {
        Rgb32FImage::from_fn(12, 8, |_, _| Rgb([rng.r#gen(), rng.r#gen(), rng.r#gen()]))
    }

    #[test]
    fn every_op_keeps_values_in_unit_range() {
        let mut rng = StdRng::seed_from_u64(7);

        for op in PhotometricOp::ALL {
            for magnitude in [0.0, 0.3, 1.0] {
                let mut image = noisy_image(&mut rng);
                op.apply(&mut image, magnitude, &mut rng);
                assert!(
                    image.iter().all(|v| (0.0..=1.0).contains(v)),
                    "{op:?} at {magnitude} left the unit range"
                );
            }
        }
    }

    #[test]
    fn auto_contrast_stretches_to_full_range() {
        let mut image = Rgb32FImage::from_fn(4, 1, |x, _| {
            let v = 0.25 + x as f32 * 0.1;
            Rgb([v, v, v])
        });

        PhotometricOp::AutoContrast.apply(&mut image, 0.0, &mut StdRng::seed_from_u64(0));

        assert!(image.get_pixel(0, 0)[0].abs() < 1e-6);
        assert!((image.get_pixel(3, 0)[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn full_color_degeneration_yields_gray() {
        let mut image = Rgb32FImage::from_pixel(2, 2, Rgb([1.0, 0.0, 0.0]));

        PhotometricOp::ColorDegeneration.apply(&mut image, 1.0, &mut StdRng::seed_from_u64(0));

        let pixel = image.get_pixel(0, 0);
        assert!((pixel[0] - pixel[1]).abs() < 1e-6);
        assert!((pixel[1] - pixel[2]).abs() < 1e-6);
    }

    #[test]
    fn solarize_inverts_bright_pixels() {
        let mut image = Rgb32FImage::from_pixel(1, 1, Rgb([0.9, 0.2, 0.6]));

        PhotometricOp::Solarize.apply(&mut image, 0.5, &mut StdRng::seed_from_u64(0));

        let pixel = image.get_pixel(0, 0);
        assert!((pixel[0] - 0.1).abs() < 1e-6);
        assert!((pixel[1] - 0.2).abs() < 1e-6);
        assert!((pixel[2] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn rand_augment_never_touches_the_mask() {
        let mut rng = StdRng::seed_from_u64(11);
        let augment = RandAugment::new(
            &RandAugmentConfig::new()
                .with_magnitude(1.0)
                .with_rate(1.0),
        );
        let mask = GrayImage::from_fn(12, 8, |x, y| Luma([((x * y) % 3) as u8]));

        for _ in 0..10 {
            let sample = SegmentationSample {
                image: noisy_image(&mut rng),
                mask: mask.clone(),
            };
            let out = augment.apply(sample, &mut rng);
            assert_eq!(out.mask, mask);
            assert!(out.image.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn zero_rate_leaves_the_image_alone() {
        let mut rng = StdRng::seed_from_u64(5);
        let augment = RandAugment::new(&RandAugmentConfig::new().with_rate(0.0));
        let image = noisy_image(&mut rng);

        let out = augment.apply(
            SegmentationSample {
                image: image.clone(),
                mask: GrayImage::new(12, 8),
            },
            &mut rng,
        );

        assert_eq!(out.image, image);
    }
}
