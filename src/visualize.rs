//! Side-by-side renderings of an image, its labels and a prediction.

use image::{GrayImage, Rgb, Rgb32FImage, RgbImage, imageops};

use crate::dataset::{PetClass, SegmentationSample};

const GAP: u32 = 4;
const GAP_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

pub fn class_color(class: PetClass) -> Rgb<u8> {
    match class {
        PetClass::Pet => Rgb([255, 196, 0]),
        PetClass::Background => Rgb([36, 40, 110]),
        PetClass::Boundary => Rgb([235, 235, 235]),
    }
}

pub fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        Rgb(image
            .get_pixel(x, y)
            .0
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

pub fn colorize_mask(mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let label = mask.get_pixel(x, y)[0];
        PetClass::ALL
            .into_iter()
            .find(|class| class.label() == label)
            .map(class_color)
            .unwrap_or(UNKNOWN_COLOR)
    })
}

/// Row-major labels to a mask image. Labels that do not fit a byte are
/// clamped to 255 and render as unknown.
pub fn mask_from_labels(labels: &[i64], width: u32, height: u32) -> Option<GrayImage> {
    if labels.len() != (width * height) as usize {
        return None;
    }
    let bytes = labels.iter().map(|&v| v.clamp(0, 255) as u8).collect();
    GrayImage::from_raw(width, height, bytes)
}

/// Concatenates panels left to right with a small white gap.
pub fn side_by_side(panels: &[RgbImage]) -> RgbImage {
    let height = panels.iter().map(|p| p.height()).max().unwrap_or(0);
    let width = panels.iter().map(|p| p.width()).sum::<u32>()
        + GAP * panels.len().saturating_sub(1) as u32;

    let mut canvas = RgbImage::from_pixel(width, height, GAP_COLOR);
    let mut offset = 0;
    for panel in panels {
        imageops::replace(&mut canvas, panel, offset as i64, 0);
        offset += panel.width() + GAP;
    }

    canvas
}

/// Image, ground truth and prediction, in that order.
pub fn render_prediction(sample: &SegmentationSample, prediction: &GrayImage) -> RgbImage {
    side_by_side(&[
        to_rgb8(&sample.image),
        colorize_mask(&sample.mask),
        colorize_mask(prediction),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn panels_are_laid_out_with_gaps() {
        let a = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
        let b = RgbImage::from_pixel(5, 4, Rgb([9, 9, 9]));

        let canvas = side_by_side(&[a, b]);

        assert_eq!(canvas.dimensions(), (3 + GAP + 5, 4));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*canvas.get_pixel(0, 3), GAP_COLOR);
        assert_eq!(*canvas.get_pixel(3, 0), GAP_COLOR);
        assert_eq!(*canvas.get_pixel(3 + GAP, 3), Rgb([9, 9, 9]));
    }

    #[test]
    fn masks_use_class_palette() {
        let mask = GrayImage::from_fn(4, 1, |x, _| Luma([x as u8]));

        let colored = colorize_mask(&mask);

        assert_eq!(*colored.get_pixel(0, 0), class_color(PetClass::Pet));
        assert_eq!(*colored.get_pixel(1, 0), class_color(PetClass::Background));
        assert_eq!(*colored.get_pixel(2, 0), class_color(PetClass::Boundary));
        assert_eq!(*colored.get_pixel(3, 0), UNKNOWN_COLOR);
    }

    #[test]
    fn prediction_panel_has_three_columns() {
        let sample = SegmentationSample {
            image: Rgb32FImage::from_pixel(6, 6, Rgb([0.0, 0.5, 1.0])),
            mask: GrayImage::from_pixel(6, 6, Luma([0])),
        };
        let prediction = mask_from_labels(&[1; 36], 6, 6).unwrap();

        let panel = render_prediction(&sample, &prediction);

        assert_eq!(panel.dimensions(), (6 * 3 + GAP * 2, 6));
        assert_eq!(*panel.get_pixel(0, 0), Rgb([0, 128, 255]));
        assert_eq!(*panel.get_pixel(6 + GAP, 0), class_color(PetClass::Pet));
        assert_eq!(*panel.get_pixel(2 * (6 + GAP), 0), class_color(PetClass::Background));
    }

    #[test]
    fn label_buffer_must_match_dimensions() {
        assert!(mask_from_labels(&[0; 3], 2, 2).is_none());
        assert!(mask_from_labels(&[0; 5], 2, 2).is_none());
    }
}
