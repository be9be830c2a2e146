use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pet_unet::dataset::download::download;

#[derive(Args)]
pub struct DownloadArgs {
    #[arg(short, long, default_value = "data/oxford-iiit-pet")]
    pub data_dir: PathBuf,
}

pub fn run(args: &DownloadArgs) -> Result<()> {
    download(&args.data_dir)
        .with_context(|| format!("Failed to download into {}", args.data_dir.display()))
}
