use std::path::Path;

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use image::GrayImage;

use crate::{
    dataset::{SegmentationBatcher, SegmentationSample},
    model::UNet,
    training::{MODEL_FILE, TrainingConfig, TrainingError},
    visualize::mask_from_labels,
};

/// Most probable class per pixel, `[batch, 1, height, width]`.
pub fn predict<B: Backend>(model: &UNet<B>, images: Tensor<B, 4>) -> Tensor<B, 4, Int> {
    model.forward(images).argmax(1)
}

/// Predicted label masks for samples that already have the model's input size.
pub fn predict_masks<B: Backend>(
    model: &UNet<B>,
    batcher: &SegmentationBatcher<B>,
    samples: &[SegmentationSample],
) -> Result<Vec<GrayImage>, TrainingError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let batch = batcher.stack(samples);
    let [batch_size, _, height, width] = batch.images.dims();
    let labels = predict(model, batch.images)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| TrainingError::Prediction(format!("{e:?}")))?;

    let pixels = height * width;
    if labels.len() != batch_size * pixels {
        return Err(TrainingError::Prediction(format!(
            "{} labels for {batch_size} masks of {width}x{height}",
            labels.len()
        )));
    }

    labels
        .chunks(pixels)
        .map(|chunk| {
            mask_from_labels(chunk, width as u32, height as u32).ok_or_else(|| {
                TrainingError::Prediction(format!("mask does not fit {width}x{height}"))
            })
        })
        .collect()
}

/// Loads the configuration and final weights written by a training run.
pub fn load_model<B: Backend>(
    artifact_dir: &Path,
    device: &B::Device,
) -> Result<(TrainingConfig, UNet<B>), TrainingError> {
    let config = TrainingConfig::load_from(artifact_dir)?;

    let record = CompactRecorder::new().load(artifact_dir.join(MODEL_FILE), device)?;
    let model = config.model.init::<B>(device).load_record(record);

    Ok((config, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{augmentation::AugmentationPipeline, model::UNetConfig};
    use burn::backend::NdArray;
    use image::{Luma, Rgb, Rgb32FImage};

    type TestBackend = NdArray;

    #[test]
    fn predicted_masks_match_inputs() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_entry_channels(4)
            .with_encoder_channels(vec![4, 8])
            .with_decoder_channels(vec![8, 4, 4])
            .init::<TestBackend>(&device);
        let batcher = SegmentationBatcher::new(device, AugmentationPipeline::new());
        let samples: Vec<_> = (0..3)
            .map(|i| SegmentationSample {
                image: Rgb32FImage::from_pixel(16, 16, Rgb([i as f32 / 3.0, 0.5, 0.5])),
                mask: GrayImage::from_pixel(16, 16, Luma([1])),
            })
            .collect();

        let masks = predict_masks(&model, &batcher, &samples).unwrap();

        assert_eq!(masks.len(), 3);
        for mask in masks {
            assert_eq!(mask.dimensions(), (16, 16));
            assert!(mask.iter().all(|&v| v < 3));
        }
    }

    #[test]
    fn no_samples_means_no_masks() {
        let device = Default::default();
        let model = UNetConfig::new()
            .with_entry_channels(4)
            .with_encoder_channels(vec![4, 8])
            .with_decoder_channels(vec![8, 4, 4])
            .init::<TestBackend>(&device);
        let batcher = SegmentationBatcher::new(device, AugmentationPipeline::new());

        assert!(predict_masks(&model, &batcher, &[]).unwrap().is_empty());
    }
}
