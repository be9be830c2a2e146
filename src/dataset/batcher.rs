use burn::{data::dataloader::batcher::Batcher, prelude::*};

use super::SegmentationSample;
use crate::augmentation::{AugmentationConfig, AugmentationPipeline};

/// Turns samples into tensors, running each one through an augmentation
/// pipeline first. All samples must come out of the pipeline with the same
/// size.
#[derive(Clone, Debug)]
pub struct SegmentationBatcher<B: Backend> {
    device: B::Device,
    pipeline: AugmentationPipeline,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device, pipeline: AugmentationPipeline) -> Self {
        Self { device, pipeline }
    }

    pub fn training(device: B::Device, config: &AugmentationConfig) -> Self {
        Self::new(device, AugmentationPipeline::training(config))
    }

    pub fn validation(device: B::Device, config: &AugmentationConfig) -> Self {
        Self::new(device, AugmentationPipeline::validation(config))
    }

    /// Runs samples through the pipeline without stacking them.
    pub fn prepare<I>(&self, samples: I) -> Vec<SegmentationSample>
    where
        I: IntoIterator<Item = SegmentationSample>,
    {
        let mut rng = rand::thread_rng();

        samples
            .into_iter()
            .map(|sample| self.pipeline.apply(sample, &mut rng))
            .collect()
    }

    /// Stacks already-transformed samples.
    pub fn stack(&self, samples: &[SegmentationSample]) -> SegmentationBatch<B> {
        assert!(!samples.is_empty(), "Cannot batch an empty list of samples");

        let (width, height) = samples[0].dimensions();
        let [height, width] = [height as usize, width as usize];

        let mut images = Vec::with_capacity(samples.len());
        let mut masks = Vec::with_capacity(samples.len());

        for sample in samples {
            assert_eq!(
                sample.dimensions(),
                (width as u32, height as u32),
                "All samples in a batch must share one size"
            );

            // image buffers are HWC
            let image_tensor = Tensor::<B, 3>::from_data(
                TensorData::new(sample.image.as_raw().clone(), Shape::new([height, width, 3]))
                    .convert::<B::FloatElem>(),
                &self.device,
            )
            .permute([2, 0, 1]);

            let labels: Vec<i64> = sample.mask.as_raw().iter().map(|&v| v as i64).collect();
            let mask_tensor = Tensor::<B, 3, Int>::from_data(
                TensorData::new(labels, Shape::new([1, height, width])).convert::<B::IntElem>(),
                &self.device,
            );

            images.push(image_tensor);
            masks.push(mask_tensor);
        }

        let images: Tensor<B, 4> = Tensor::stack::<4>(images, 0);
        let masks: Tensor<B, 4, Int> = Tensor::stack::<4>(masks, 0);

        SegmentationBatch { images, masks }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentationBatch<B: Backend> {
    /// `[batch, 3, height, width]`, values in `[0, 1]`
    pub images: Tensor<B, 4, Float>,
    /// `[batch, 1, height, width]`, class labels
    pub masks: Tensor<B, 4, Int>,
}

impl<B: Backend> Batcher<SegmentationSample, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationSample>) -> SegmentationBatch<B> {
        self.stack(&self.prepare(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{GrayImage, Luma, Rgb, Rgb32FImage};

    type TestBackend = NdArray;

    fn sample(width: u32, height: u32, label: u8) -> SegmentationSample {
        SegmentationSample {
            image: Rgb32FImage::from_fn(width, height, |x, _| Rgb([x as f32 / width as f32, 0.0, 1.0])),
            mask: GrayImage::from_pixel(width, height, Luma([label])),
        }
    }

    #[test]
    fn batch_is_channels_first() {
        let config = AugmentationConfig::new().with_image_size([8, 12]);
        let batcher = SegmentationBatcher::<TestBackend>::validation(Default::default(), &config);

        let batch = batcher.batch(vec![sample(30, 20, 0), sample(24, 16, 2)]);

        assert_eq!(batch.images.dims(), [2, 3, 8, 12]);
        assert_eq!(batch.masks.dims(), [2, 1, 8, 12]);

        // blue channel is constant 1.0
        let blue = batch
            .images
            .clone()
            .narrow(1, 2, 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        assert!(blue.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        let labels = batch.masks.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert!(labels[..96].iter().all(|&v| v == 0));
        assert!(labels[96..].iter().all(|&v| v == 2));
    }

    #[test]
    fn training_batcher_keeps_labels_in_range() {
        let config = AugmentationConfig::new().with_image_size([16, 16]);
        let batcher = SegmentationBatcher::<TestBackend>::training(Default::default(), &config);

        let batch = batcher.batch((0..4).map(|i| sample(20, 18, i % 3)).collect());

        assert_eq!(batch.images.dims(), [4, 3, 16, 16]);
        let labels = batch.masks.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert!(labels.iter().all(|&v| (0..3).contains(&v)));
        let pixels = batch.images.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!(pixels.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    #[should_panic(expected = "share one size")]
    fn mixed_sizes_are_rejected() {
        let batcher = SegmentationBatcher::<TestBackend>::new(
            Default::default(),
            AugmentationPipeline::new(),
        );

        batcher.stack(&[sample(4, 4, 0), sample(5, 4, 0)]);
    }
}
