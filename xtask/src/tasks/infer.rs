use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{
    backend::{NdArray, Wgpu, wgpu::WgpuDevice},
    data::dataset::Dataset,
    prelude::*,
};
use clap::Args;
use pet_unet::{
    OxfordPetDataset, SegmentationBatcher, dataset::load_splits, load_model, predict_masks,
    visualize::render_prediction,
};

use super::BackendKind;

#[derive(Args)]
pub struct InferArgs {
    #[arg(short, long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    #[arg(short, long, default_value = "data/oxford-iiit-pet")]
    pub data_dir: PathBuf,

    #[arg(short, long, default_value_t = 8)]
    pub num_samples: usize,

    /// Defaults to `<artifact_dir>/inference`.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,
}

pub fn run(args: &InferArgs) -> Result<()> {
    match args.backend {
        BackendKind::NdArray => run_on::<NdArray>(args, Default::default()),
        BackendKind::Wgpu => run_on::<Wgpu<f32, i32>>(args, WgpuDevice::default()),
    }
}

fn run_on<B: Backend>(args: &InferArgs, device: B::Device) -> Result<()> {
    let (config, model) = load_model::<B>(&args.artifact_dir, &device)
        .with_context(|| format!("Failed to load model from {}", args.artifact_dir.display()))?;

    let (_, valid_records) = load_splits(&args.data_dir, config.train_ratio)
        .with_context(|| format!("Failed to read split lists in {}", args.data_dir.display()))?;
    let dataset = OxfordPetDataset::new(&args.data_dir, valid_records)
        .context("Failed to load validation dataset")?;

    let batcher = SegmentationBatcher::<B>::validation(device, &config.augmentation);
    let samples = batcher.prepare(dataset.iter().take(args.num_samples));

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.artifact_dir.join("inference"));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let predictions =
        predict_masks(&model, &batcher, &samples).context("Failed to predict masks")?;
    for (index, (sample, prediction)) in samples.iter().zip(&predictions).enumerate() {
        let path = output_dir.join(format!("sample-{index:03}.png"));
        render_prediction(sample, prediction)
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    tracing::info!(
        "Wrote {} predictions to {}",
        predictions.len(),
        output_dir.display()
    );
    Ok(())
}
