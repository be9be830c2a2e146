mod blocks;
mod unet;

pub use blocks::{
    DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig, EntryBlock,
    EntryBlockConfig, SeparableConv2d, SeparableConv2dConfig,
};

pub use unet::{UNet, UNetConfig};
