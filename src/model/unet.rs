use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::softmax,
};

#[cfg(feature = "training")]
use crate::{
    dataset::SegmentationBatch,
    training::{SegmentationOutput, loss::SegmentationCrossEntropyLossConfig},
};
#[cfg(feature = "training")]
use burn::{
    tensor::backend::AutodiffBackend,
    train::{TrainOutput, TrainStep, ValidStep},
};

use nn::PaddingConfig2d;

use super::blocks::{
    DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig, EntryBlock,
    EntryBlockConfig,
};

/// Encoder-decoder segmentation network with residual shortcuts in every block.
///
/// Input `[batch, input_channels, height, width]`, output
/// `[batch, num_classes, height, width]`. Height and width must be multiples
/// of `2^(1 + encoder depth)` for the output resolution to match the input.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    entry: EntryBlock<B>,
    encoder_blocks: Vec<EncoderBlock<B>>,
    decoder_blocks: Vec<DecoderBlock<B>>,
    head: Conv2d<B>,

    num_classes: usize,
}

#[derive(Config, Debug)]
pub struct UNetConfig {
    #[config(default = "3")]
    input_channels: usize,
    #[config(default = "3")]
    num_classes: usize,
    #[config(default = "32")]
    entry_channels: usize,
    #[config(default = "vec![64, 128, 256]")]
    encoder_channels: Vec<usize>,
    #[config(default = "vec![256, 128, 64, 32]")]
    decoder_channels: Vec<usize>,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        self.assertions();

        let entry = EntryBlockConfig::new(self.input_channels, self.entry_channels).init(device);

        let mut channels = self.entry_channels;
        let mut encoder_blocks = Vec::with_capacity(self.encoder_channels.len());
        for &filters in &self.encoder_channels {
            encoder_blocks.push(EncoderBlockConfig::new(channels, filters).init(device));
            channels = filters;
        }

        let mut decoder_blocks = Vec::with_capacity(self.decoder_channels.len());
        for &filters in &self.decoder_channels {
            decoder_blocks.push(DecoderBlockConfig::new(channels, filters).init(device));
            channels = filters;
        }

        UNet {
            entry,
            encoder_blocks,
            decoder_blocks,
            head: Conv2dConfig::new([channels, self.num_classes], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            num_classes: self.num_classes,
        }
    }

    /// Factor by which input height and width must be divisible.
    pub fn spatial_divisor(&self) -> usize {
        1 << (1 + self.encoder_channels.len())
    }

    fn assertions(&self) {
        assert!(
            self.num_classes >= 2,
            "Number of classes must be at least 2. Got {}",
            self.num_classes
        );

        // stem + each encoder block halve the resolution, each decoder block doubles it
        assert_eq!(
            self.encoder_channels.len() + 1,
            self.decoder_channels.len(),
            "Decoder depth ({}) must be encoder depth ({}) + 1 to restore the input resolution",
            self.decoder_channels.len(),
            self.encoder_channels.len()
        );
    }
}

impl<B: Backend> UNet<B> {
    /// Per-pixel class scores before the softmax.
    pub fn forward_logits(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.entry.forward(images);

        for block in &self.encoder_blocks {
            x = block.forward(x);
        }

        for block in &self.decoder_blocks {
            x = block.forward(x);
        }

        self.head.forward(x)
    }

    /// Per-pixel class probabilities, softmax over dimension 1.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        softmax(self.forward_logits(images), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[cfg(feature = "training")]
    pub fn forward_segmentation(&self, item: SegmentationBatch<B>) -> SegmentationOutput<B> {
        let targets = item.masks;
        let logits = self.forward_logits(item.images);

        let loss = SegmentationCrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets.clone());

        SegmentationOutput {
            loss,
            output: softmax(logits, 1),
            targets,
        }
    }
}

#[cfg(feature = "training")]
impl<B: AutodiffBackend> TrainStep<SegmentationBatch<B>, SegmentationOutput<B>> for UNet<B> {
    fn step(&self, batch: SegmentationBatch<B>) -> TrainOutput<SegmentationOutput<B>> {
        let item = self.forward_segmentation(batch);
        TrainOutput::new(self, item.loss.backward(), item)
    }
}

#[cfg(feature = "training")]
impl<B: Backend> ValidStep<SegmentationBatch<B>, SegmentationOutput<B>> for UNet<B> {
    fn step(&self, batch: SegmentationBatch<B>) -> SegmentationOutput<B> {
        self.forward_segmentation(batch)
    }
}
