use std::f32::consts::PI;

use image::{
    GrayImage, Luma, Rgb, Rgb32FImage,
    imageops::{self, FilterType},
};
use rand::{Rng, RngCore};

use super::Transform;
use crate::dataset::{PetClass, SegmentationSample};

/// Resizes to a fixed size. The mask uses nearest-neighbour sampling so no
/// label outside the original label set is introduced.
#[derive(Clone, Debug)]
pub struct Resize {
    pub height: u32,
    pub width: u32,
}

impl Resize {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

impl Transform for Resize {
    fn apply(&self, sample: SegmentationSample, _rng: &mut dyn RngCore) -> SegmentationSample {
        if sample.dimensions() == (self.width, self.height) {
            return sample;
        }

        SegmentationSample {
            image: imageops::resize(&sample.image, self.width, self.height, FilterType::Triangle),
            mask: imageops::resize(&sample.mask, self.width, self.height, FilterType::Nearest),
        }
    }
}

/// Mirrors image and mask left-to-right together.
#[derive(Clone, Debug)]
pub struct RandomFlip {
    pub probability: f64,
}

impl RandomFlip {
    pub fn new(probability: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&probability),
            "Flip probability must be in [0, 1]. Got {}",
            probability
        );
        Self { probability }
    }
}

impl Transform for RandomFlip {
    fn apply(&self, sample: SegmentationSample, rng: &mut dyn RngCore) -> SegmentationSample {
        if !rng.gen_bool(self.probability) {
            return sample;
        }

        SegmentationSample {
            image: imageops::flip_horizontal(&sample.image),
            mask: imageops::flip_horizontal(&sample.mask),
        }
    }
}

/// How points sampled outside the source image are filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillMode {
    /// `d c b a | a b c d | d c b a`
    Reflect,
    /// Zero intensity for the image, background for the mask.
    Constant,
}

/// Rotates about the image centre by an angle drawn uniformly from
/// `factor * 2π`, so `[-0.2, 0.2]` covers ±72°.
#[derive(Clone, Debug)]
pub struct RandomRotation {
    pub factor: [f32; 2],
    pub fill_mode: FillMode,
}

impl RandomRotation {
    pub fn new(factor: [f32; 2], fill_mode: FillMode) -> Self {
        assert!(
            factor[0] <= factor[1],
            "Rotation factor lower bound {} exceeds upper bound {}",
            factor[0],
            factor[1]
        );
        Self { factor, fill_mode }
    }

    /// Rotates by `angle` radians counter-clockwise.
    pub fn rotate(&self, sample: &SegmentationSample, angle: f32) -> SegmentationSample {
        let (width, height) = sample.dimensions();
        let (sin, cos) = angle.sin_cos();
        let cx = (width as f32 - 1.0) / 2.0;
        let cy = (height as f32 - 1.0) / 2.0;

        // inverse mapping from output pixel to source coordinates
        let source = |x: u32, y: u32| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            (cos * dx - sin * dy + cx, sin * dx + cos * dy + cy)
        };

        let image = Rgb32FImage::from_fn(width, height, |x, y| {
            let (sx, sy) = source(x, y);
            self.sample_bilinear(&sample.image, sx, sy)
        });

        let mask = GrayImage::from_fn(width, height, |x, y| {
            let (sx, sy) = source(x, y);
            self.sample_nearest(&sample.mask, sx, sy)
        });

        SegmentationSample { image, mask }
    }

    fn resolve(&self, index: i64, size: u32) -> Option<u32> {
        let size = size as i64;
        if (0..size).contains(&index) {
            return Some(index as u32);
        }

        match self.fill_mode {
            FillMode::Constant => None,
            FillMode::Reflect => {
                let period = 2 * size;
                let index = index.rem_euclid(period);
                let index = if index >= size { period - 1 - index } else { index };
                Some(index as u32)
            }
        }
    }

    fn sample_nearest(&self, mask: &GrayImage, x: f32, y: f32) -> Luma<u8> {
        let (width, height) = mask.dimensions();

        match (
            self.resolve(x.round() as i64, width),
            self.resolve(y.round() as i64, height),
        ) {
            (Some(x), Some(y)) => *mask.get_pixel(x, y),
            _ => Luma([PetClass::Background.label()]),
        }
    }

    fn sample_bilinear(&self, image: &Rgb32FImage, x: f32, y: f32) -> Rgb<f32> {
        let (width, height) = image.dimensions();
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let mut out = [0.0f32; 3];
        for (ox, oy, weight) in [
            (0, 0, (1.0 - fx) * (1.0 - fy)),
            (1, 0, fx * (1.0 - fy)),
            (0, 1, (1.0 - fx) * fy),
            (1, 1, fx * fy),
        ] {
            if weight == 0.0 {
                continue;
            }
            let tap = self
                .resolve(x0 as i64 + ox, width)
                .zip(self.resolve(y0 as i64 + oy, height));
            if let Some((tx, ty)) = tap {
                let pixel = image.get_pixel(tx, ty);
                for c in 0..3 {
                    out[c] += weight * pixel[c];
                }
            }
        }

        Rgb(out.map(|v| v.clamp(0.0, 1.0)))
    }
}

impl Transform for RandomRotation {
    fn apply(&self, sample: SegmentationSample, rng: &mut dyn RngCore) -> SegmentationSample {
        let [lower, upper] = self.factor;
        if lower == upper && lower == 0.0 {
            return sample;
        }

        let turns = if lower == upper {
            lower
        } else {
            rng.gen_range(lower..=upper)
        };

        self.rotate(&sample, turns * 2.0 * PI)
    }
}
