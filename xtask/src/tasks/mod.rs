pub mod download;
pub mod infer;
pub mod train;

use clap::ValueEnum;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}
