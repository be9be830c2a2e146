use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode},
        pool::MaxPool2d,
    },
    prelude::*,
};
use nn::{PaddingConfig2d, pool::MaxPool2dConfig};

/// Depthwise 3x3 convolution followed by a pointwise 1x1 projection.
#[derive(Module, Debug)]
pub struct SeparableConv2d<B: Backend> {
    depthwise: Conv2d<B>,
    pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableConv2d<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.depthwise.forward(x);

        self.pointwise.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct SeparableConv2dConfig {
    input_channels: usize,
    num_filters: usize,
    #[config(default = "3")]
    kernel_size: usize,
}

impl SeparableConv2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SeparableConv2d<B> {
        let padding = self.kernel_size / 2;

        SeparableConv2d {
            depthwise: Conv2dConfig::new(
                [self.input_channels, self.input_channels],
                [self.kernel_size, self.kernel_size],
            )
            .with_groups(self.input_channels)
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .init(device),
            pointwise: Conv2dConfig::new([self.input_channels, self.num_filters], [1, 1])
                .init(device),
        }
    }
}

/// Strided stem: halves the spatial resolution before the encoder.
#[derive(Module, Debug)]
pub struct EntryBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: BatchNorm<B, 2>,
    activation: Relu,
}

impl<B: Backend> EntryBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        self.activation.forward(x)
    }
}

#[derive(Config, Debug)]
pub struct EntryBlockConfig {
    input_channels: usize,
    num_filters: usize,
}

impl EntryBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EntryBlock<B> {
        EntryBlock {
            conv: Conv2dConfig::new([self.input_channels, self.num_filters], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            norm: BatchNormConfig::new(self.num_filters).init(device),
            activation: Relu::new(),
        }
    }
}

/// Downsampling block. The residual is the block input projected by a
/// strided 1x1 convolution so it lands on the pooled resolution.
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    conv1: SeparableConv2d<B>,
    norm1: BatchNorm<B, 2>,
    conv2: SeparableConv2d<B>,
    norm2: BatchNorm<B, 2>,
    activation: Relu,
    max_pool: MaxPool2d,
    residual: Conv2d<B>,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = self.residual.forward(x.clone());

        let x = self.activation.forward(x);
        let x = self.conv1.forward(x);
        let x = self.norm1.forward(x);

        let x = self.activation.forward(x);
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);

        let x = self.max_pool.forward(x);

        x + residual
    }
}

#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    input_channels: usize,
    num_filters: usize,
}

impl EncoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            conv1: SeparableConv2dConfig::new(self.input_channels, self.num_filters).init(device),
            norm1: BatchNormConfig::new(self.num_filters).init(device),
            conv2: SeparableConv2dConfig::new(self.num_filters, self.num_filters).init(device),
            norm2: BatchNormConfig::new(self.num_filters).init(device),
            activation: Relu::new(),
            max_pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            residual: Conv2dConfig::new([self.input_channels, self.num_filters], [1, 1])
                .with_stride([2, 2])
                .init(device),
        }
    }
}

/// Upsampling block. The residual is the upsampled block input projected
/// to the block width with a 1x1 convolution.
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    conv_transpose1: ConvTranspose2d<B>,
    norm1: BatchNorm<B, 2>,
    conv_transpose2: ConvTranspose2d<B>,
    norm2: BatchNorm<B, 2>,
    activation: Relu,
    upsample: Interpolate2d,
    residual: Conv2d<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = self.upsample.forward(x.clone());
        let residual = self.residual.forward(residual);

        let x = self.activation.forward(x);
        let x = self.conv_transpose1.forward(x);
        let x = self.norm1.forward(x);

        let x = self.activation.forward(x);
        let x = self.conv_transpose2.forward(x);
        let x = self.norm2.forward(x);

        let x = self.upsample.forward(x);

        x + residual
    }
}

#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    input_channels: usize,
    num_filters: usize,
}

impl DecoderBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        DecoderBlock {
            conv_transpose1: ConvTranspose2dConfig::new(
                [self.input_channels, self.num_filters],
                [3, 3],
            )
            .with_padding([1, 1])
            .init(device),
            norm1: BatchNormConfig::new(self.num_filters).init(device),
            conv_transpose2: ConvTranspose2dConfig::new(
                [self.num_filters, self.num_filters],
                [3, 3],
            )
            .with_padding([1, 1])
            .init(device),
            norm2: BatchNormConfig::new(self.num_filters).init(device),
            activation: Relu::new(),
            upsample: Interpolate2dConfig::new()
                .with_scale_factor(Some([2.0, 2.0]))
                .with_mode(InterpolateMode::Nearest)
                .init(),
            residual: Conv2dConfig::new([self.input_channels, self.num_filters], [1, 1])
                .init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn entry_block_halves_resolution() {
        let device = Default::default();
        let block = EntryBlockConfig::new(3, 8).init::<TestBackend>(&device);

        let output = block.forward(Tensor::zeros([2, 3, 32, 32], &device));

        assert_eq!(output.dims(), [2, 8, 16, 16]);
    }

    #[test]
    fn encoder_block_downsamples_and_widens() {
        let device = Default::default();
        let block = EncoderBlockConfig::new(8, 16).init::<TestBackend>(&device);

        let output = block.forward(Tensor::ones([1, 8, 16, 16], &device));

        assert_eq!(output.dims(), [1, 16, 8, 8]);
    }

    #[test]
    fn encoder_block_handles_odd_resolution() {
        let device = Default::default();
        let block = EncoderBlockConfig::new(4, 4).init::<TestBackend>(&device);

        let output = block.forward(Tensor::ones([1, 4, 5, 5], &device));

        assert_eq!(output.dims(), [1, 4, 3, 3]);
    }

    #[test]
    fn decoder_block_upsamples_and_narrows() {
        let device = Default::default();
        let block = DecoderBlockConfig::new(16, 8).init::<TestBackend>(&device);

        let output = block.forward(Tensor::ones([1, 16, 4, 4], &device));

        assert_eq!(output.dims(), [1, 8, 8, 8]);
    }

    #[test]
    fn separable_conv_preserves_resolution() {
        let device = Default::default();
        let conv = SeparableConv2dConfig::new(4, 6).init::<TestBackend>(&device);

        let output = conv.forward(Tensor::ones([1, 4, 7, 9], &device));

        assert_eq!(output.dims(), [1, 6, 7, 9]);
    }
}
