use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod tasks;

#[derive(Parser)]
#[command(
    name = "pet-unet",
    about = "U-Net segmentation of the Oxford-IIIT Pet dataset",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and unpack the dataset archives.
    Download(tasks::download::DownloadArgs),
    /// Train the model, writing checkpoints and logs to the artifact directory.
    Train(tasks::train::TrainArgs),
    /// Render predictions of a trained model on validation images.
    Infer(tasks::infer::InferArgs),
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Download(args) => tasks::download::run(args),
        Commands::Train(args) => tasks::train::run(args),
        Commands::Infer(args) => tasks::infer::run(args),
    }
}
