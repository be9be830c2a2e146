pub mod callback;
pub mod config;
pub mod error;
pub mod learner;
pub mod loss;
pub mod metrics;
pub mod train;

pub use callback::{DisplayCallback, EpochCallback, PREDICTIONS_DIR};
pub use config::{CONFIG_FILE, MODEL_FILE, TrainingConfig};
pub use error::TrainingError;
pub use learner::SegmentationOutput;
pub use loss::{SegmentationCrossEntropyLoss, SegmentationCrossEntropyLossConfig};
pub use metrics::{MeanIoUMetric, PixelAccuracyMetric, SegmentationMetricInput};
pub use train::{segment_ends, train};
