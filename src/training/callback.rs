use std::path::{Path, PathBuf};

use burn::{data::dataset::Dataset, prelude::*};
use image::GrayImage;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{TrainingConfig, TrainingError};
use crate::{
    dataset::{SegmentationBatcher, SegmentationSample},
    inference::predict_masks,
    model::UNet,
    visualize::render_prediction,
};

pub const PREDICTIONS_DIR: &str = "predictions";

/// Hook invoked by [`train`](super::train) at epoch boundaries.
pub trait EpochCallback<B: Backend> {
    /// Interval in epochs between two calls; 0 never fires.
    fn every(&self) -> usize;

    fn on_epoch_end(&mut self, epoch: usize, model: &UNet<B>) -> Result<(), TrainingError>;

    fn is_due(&self, epoch: usize) -> bool {
        let every = self.every();
        every > 0 && epoch % every == 0
    }
}

/// Renders a prediction for one held-out sample every few epochs.
pub struct DisplayCallback<B: Backend> {
    samples: Vec<SegmentationSample>,
    batcher: SegmentationBatcher<B>,
    every: usize,
    output_dir: PathBuf,
    rng: StdRng,
}

impl<B: Backend> DisplayCallback<B> {
    /// `samples` must already have the model's input size.
    pub fn new(
        samples: Vec<SegmentationSample>,
        batcher: SegmentationBatcher<B>,
        every: usize,
        output_dir: PathBuf,
        seed: u64,
    ) -> Self {
        Self {
            samples,
            batcher,
            every,
            output_dir,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Takes the first `display_batch_size` items of `dataset` through the
    /// validation pipeline.
    pub fn from_dataset<D: Dataset<SegmentationSample>>(
        dataset: &D,
        config: &TrainingConfig,
        artifact_dir: &Path,
        device: B::Device,
    ) -> Self {
        let batcher = SegmentationBatcher::validation(device, &config.augmentation);
        let samples = batcher.prepare(dataset.iter().take(config.display_batch_size));

        Self::new(
            samples,
            batcher,
            config.display_every,
            artifact_dir.join(PREDICTIONS_DIR),
            config.seed,
        )
    }

    pub fn output_path(&self, epoch: usize) -> PathBuf {
        self.output_dir.join(format!("epoch-{epoch:03}.png"))
    }
}

impl<B: Backend> EpochCallback<B> for DisplayCallback<B> {
    fn every(&self) -> usize {
        self.every
    }

    fn on_epoch_end(&mut self, epoch: usize, model: &UNet<B>) -> Result<(), TrainingError> {
        if self.samples.is_empty() {
            tracing::warn!("No held-out samples to display at epoch {epoch}");
            return Ok(());
        }

        let predictions = predict_masks(model, &self.batcher, &self.samples)?;

        let index = self.rng.gen_range(0..self.samples.len());
        let sample = &self.samples[index];
        let prediction = &predictions[index];

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| TrainingError::io(&self.output_dir, e))?;
        let path = self.output_path(epoch);
        render_prediction(sample, prediction)
            .save(&path)
            .map_err(|e| TrainingError::image_write(&path, e))?;

        tracing::info!(
            "Epoch {epoch}: sample {index} pixel accuracy {:.2}%, saved to {}",
            100.0 * pixel_accuracy(&sample.mask, prediction),
            path.display()
        );

        Ok(())
    }
}

fn pixel_accuracy(target: &GrayImage, prediction: &GrayImage) -> f64 {
    let total = target.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let correct = target
        .as_raw()
        .iter()
        .zip(prediction.as_raw())
        .filter(|(a, b)| a == b)
        .count();

    correct as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{augmentation::AugmentationPipeline, model::UNetConfig};
    use burn::backend::NdArray;
    use image::{Luma, Rgb, Rgb32FImage};

    type TestBackend = NdArray;

    struct Every(usize);

    impl EpochCallback<TestBackend> for Every {
        fn every(&self) -> usize {
            self.0
        }

        fn on_epoch_end(&mut self, _: usize, _: &UNet<TestBackend>) -> Result<(), TrainingError> {
            Ok(())
        }
    }

    #[test]
    fn due_on_multiples_only() {
        assert!(Every(5).is_due(10));
        assert!(!Every(5).is_due(7));
        assert!(!Every(0).is_due(5));
    }

    #[test]
    fn accuracy_counts_matching_labels() {
        let target = GrayImage::from_fn(4, 1, |x, _| Luma([x as u8 % 2]));
        let prediction = GrayImage::from_pixel(4, 1, Luma([0]));

        assert_eq!(pixel_accuracy(&target, &prediction), 0.5);
    }

    #[test]
    fn display_writes_one_panel_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = UNetConfig::new()
            .with_entry_channels(4)
            .with_encoder_channels(vec![4, 8])
            .with_decoder_channels(vec![8, 4, 4])
            .init::<TestBackend>(&device);
        let samples = vec![
            SegmentationSample {
                image: Rgb32FImage::from_pixel(16, 16, Rgb([0.2, 0.4, 0.6])),
                mask: GrayImage::from_pixel(16, 16, Luma([1])),
            };
            2
        ];
        let batcher = SegmentationBatcher::new(device, AugmentationPipeline::new());
        let mut callback =
            DisplayCallback::new(samples, batcher, 2, dir.path().join(PREDICTIONS_DIR), 7);

        callback.on_epoch_end(4, &model).unwrap();

        let panel = image::open(callback.output_path(4)).unwrap();
        assert_eq!(panel.width(), 16 * 3 + 8);
        assert_eq!(panel.height(), 16);
    }
}
