use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::{
    backend::{Autodiff, NdArray, Wgpu, wgpu::WgpuDevice},
    optim::AdamConfig,
    tensor::backend::AutodiffBackend,
};
use clap::Args;
use pet_unet::{
    AugmentationConfig, DisplayCallback, EpochCallback, OxfordPetDataset, TrainingConfig,
    UNetConfig,
    dataset::{download::download, load_splits},
    train,
};

use super::BackendKind;

#[derive(Args)]
pub struct TrainArgs {
    #[arg(short, long, default_value = "data/oxford-iiit-pet")]
    pub data_dir: PathBuf,

    #[arg(short, long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    #[arg(short, long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(short, long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(short, long, default_value_t = 1e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 160)]
    pub image_size: usize,

    /// Render a validation prediction every this many epochs, 0 to disable.
    #[arg(long, default_value_t = 5)]
    pub display_every: usize,

    #[arg(long, value_enum, default_value_t = BackendKind::Wgpu)]
    pub backend: BackendKind,

    /// Fetch the dataset first if it is missing.
    #[arg(long, action, default_value = "false")]
    pub download: bool,
}

impl TrainArgs {
    fn config(&self) -> TrainingConfig {
        let augmentation =
            AugmentationConfig::new().with_image_size([self.image_size, self.image_size]);

        TrainingConfig::new(UNetConfig::new(), AdamConfig::new(), augmentation)
            .with_num_epochs(self.epochs)
            .with_batch_size(self.batch_size)
            .with_learning_rate(self.lr)
            .with_num_workers(self.num_workers)
            .with_seed(self.seed)
            .with_display_every(self.display_every)
    }
}

pub fn run(args: &TrainArgs) -> Result<()> {
    match args.backend {
        BackendKind::NdArray => run_on::<Autodiff<NdArray>>(args, Default::default()),
        BackendKind::Wgpu => run_on::<Autodiff<Wgpu<f32, i32>>>(args, WgpuDevice::default()),
    }
}

fn run_on<B: AutodiffBackend>(args: &TrainArgs, device: B::Device) -> Result<()> {
    if args.download {
        download(&args.data_dir).context("Failed to fetch the dataset")?;
    }

    let config = args.config();

    let (train_records, valid_records) = load_splits(&args.data_dir, config.train_ratio)
        .with_context(|| format!("Failed to read split lists in {}", args.data_dir.display()))?;

    let train_dataset = OxfordPetDataset::new(&args.data_dir, train_records)
        .context("Failed to load training dataset")?;
    let valid_dataset = OxfordPetDataset::new(&args.data_dir, valid_records)
        .context("Failed to load validation dataset")?;

    let mut callbacks: Vec<Box<dyn EpochCallback<B::InnerBackend>>> = Vec::new();
    if config.display_every > 0 {
        callbacks.push(Box::new(DisplayCallback::<B::InnerBackend>::from_dataset(
            &valid_dataset,
            &config,
            &args.artifact_dir,
            device.clone(),
        )));
    }

    train::<B, _, _>(
        &config,
        &args.artifact_dir,
        device,
        train_dataset,
        valid_dataset,
        &mut callbacks,
    )
    .context("Training failed")?;

    tracing::info!("Training completed, artifacts in {}", args.artifact_dir.display());
    Ok(())
}
