use std::path::Path;

use burn::{optim::AdamConfig, prelude::*};

use super::TrainingError;
use crate::{augmentation::AugmentationConfig, model::UNetConfig};

pub const CONFIG_FILE: &str = "config.json";
pub const MODEL_FILE: &str = "model";

#[derive(Config)]
pub struct TrainingConfig {
    pub model: UNetConfig,
    pub optimizer: AdamConfig,
    pub augmentation: AugmentationConfig,
    #[config(default = 20)]
    pub num_epochs: usize,
    #[config(default = 16)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    /// Share of each official list used for training, in file order.
    #[config(default = 0.8)]
    pub train_ratio: f64,
    /// Render predictions every this many epochs; 0 disables it.
    #[config(default = 5)]
    pub display_every: usize,
    #[config(default = 8)]
    pub display_batch_size: usize,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), TrainingError> {
        let [height, width] = self.augmentation.image_size;
        let divisor = self.model.spatial_divisor();

        if height % divisor != 0 || width % divisor != 0 {
            return Err(TrainingError::Config(format!(
                "image size {height}x{width} must be a multiple of {divisor}"
            )));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::Config("batch size must be positive".into()));
        }
        if self.num_epochs == 0 {
            return Err(TrainingError::Config("number of epochs must be positive".into()));
        }
        if !(self.train_ratio > 0.0 && self.train_ratio < 1.0) {
            return Err(TrainingError::Config(format!(
                "train ratio {} must lie strictly between 0 and 1",
                self.train_ratio
            )));
        }

        Ok(())
    }

    pub fn save_to(&self, artifact_dir: &Path) -> Result<(), TrainingError> {
        let path = artifact_dir.join(CONFIG_FILE);
        self.save(&path).map_err(|e| TrainingError::io(path, e))
    }

    pub fn load_from(artifact_dir: &Path) -> Result<Self, TrainingError> {
        let path = artifact_dir.join(CONFIG_FILE);
        Self::load(&path).map_err(|e| TrainingError::Config(format!("{}: {e}", path.display())))
    }
}
