use std::path::Path;

use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        LearnerBuilder,
        logger::{FileMetricLogger, MetricLogger},
        metric::LossMetric,
    },
};

use super::{
    EpochCallback, MODEL_FILE, MeanIoUMetric, PixelAccuracyMetric, TrainingConfig, TrainingError,
};
use crate::{
    dataset::{SegmentationBatcher, SegmentationSample},
    model::UNet,
};

/// Epochs at which one learner run stops: every epoch some callback is due
/// on, then the last one.
pub fn segment_ends(num_epochs: usize, intervals: &[usize]) -> Vec<usize> {
    (1..=num_epochs)
        .filter(|&epoch| {
            epoch == num_epochs
                || intervals
                    .iter()
                    .any(|&every| every > 0 && epoch % every == 0)
        })
        .collect()
}

/// File logger that writes its next entries under `epoch-{start + 1}`.
fn resumed_logger(directory: &Path, start: usize) -> FileMetricLogger {
    let mut logger = FileMetricLogger::new(directory);
    if start > 0 {
        logger.end_epoch(start);
    }
    logger
}

/// Fits a fresh model on `train_dataset`, evaluating on `valid_dataset`
/// after every epoch.
///
/// Checkpoints, metric logs, `config.json` and the final `model` record end
/// up in `artifact_dir`. Callbacks see the inference copy of the model.
pub fn train<B, DT, DV>(
    config: &TrainingConfig,
    artifact_dir: &Path,
    device: B::Device,
    train_dataset: DT,
    valid_dataset: DV,
    callbacks: &mut [Box<dyn EpochCallback<B::InnerBackend>>],
) -> Result<UNet<B>, TrainingError>
where
    B: AutodiffBackend,
    DT: Dataset<SegmentationSample> + 'static,
    DV: Dataset<SegmentationSample> + 'static,
{
    config.validate()?;
    std::fs::create_dir_all(artifact_dir).map_err(|e| TrainingError::io(artifact_dir, e))?;
    config.save_to(artifact_dir)?;

    B::seed(config.seed);

    tracing::info!(
        "Training on {} samples, validating on {}",
        train_dataset.len(),
        valid_dataset.len()
    );

    let batcher_train = SegmentationBatcher::<B>::training(device.clone(), &config.augmentation);
    let batcher_valid =
        SegmentationBatcher::<B::InnerBackend>::validation(device.clone(), &config.augmentation);

    let mut builder_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed);
    let mut builder_valid = DataLoaderBuilder::new(batcher_valid).batch_size(config.batch_size);

    // 0 loads on the calling thread
    if config.num_workers > 0 {
        builder_train = builder_train.num_workers(config.num_workers);
        builder_valid = builder_valid.num_workers(config.num_workers);
    }

    let dataloader_train = builder_train.build(train_dataset);
    let dataloader_valid = builder_valid.build(valid_dataset);

    let intervals: Vec<usize> = callbacks.iter().map(|c| c.every()).collect();
    let ends = segment_ends(config.num_epochs, &intervals);

    let mut model = config.model.init::<B>(&device);
    let mut start = 0;

    for &end in &ends {
        tracing::info!("Running epochs {} to {end}", start + 1);

        let mut builder = LearnerBuilder::new(artifact_dir)
            .metric_train_numeric(LossMetric::new())
            .metric_valid_numeric(LossMetric::new())
            .metric_train_numeric(PixelAccuracyMetric::new())
            .metric_valid_numeric(PixelAccuracyMetric::new())
            .metric_train_numeric(MeanIoUMetric::new())
            .metric_valid_numeric(MeanIoUMetric::new())
            .metric_loggers(
                resumed_logger(&artifact_dir.join("train"), start),
                resumed_logger(&artifact_dir.join("valid"), start),
            )
            .with_file_checkpointer(CompactRecorder::new())
            .with_application_logger(None)
            .devices(vec![device.clone()])
            .num_epochs(end);

        if start > 0 {
            builder = builder.checkpoint(start);
        }
        if end == config.num_epochs {
            builder = builder.summary();
        }

        let learner = builder.build(model, config.optimizer.init(), config.learning_rate);
        model = learner.fit(dataloader_train.clone(), dataloader_valid.clone());

        let snapshot = model.valid();
        for callback in callbacks.iter_mut().filter(|c| c.is_due(end)) {
            callback.on_epoch_end(end, &snapshot)?;
        }

        start = end;
    }

    let path = artifact_dir.join(MODEL_FILE);
    model.clone().save_file(&path, &CompactRecorder::new())?;
    tracing::info!("Model saved to {}", path.display());

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        augmentation::AugmentationConfig,
        model::UNetConfig,
        training::{DisplayCallback, PREDICTIONS_DIR},
    };
    use burn::{
        backend::{Autodiff, NdArray, ndarray::NdArrayDevice},
        data::dataset::InMemDataset,
        optim::AdamConfig,
    };
    use image::{GrayImage, Luma, Rgb, Rgb32FImage};

    type TestBackend = Autodiff<NdArray>;

    fn samples(count: usize) -> Vec<SegmentationSample> {
        (0..count)
            .map(|i| SegmentationSample {
                image: Rgb32FImage::from_fn(16, 16, |x, y| {
                    Rgb([x as f32 / 16.0, y as f32 / 16.0, i as f32 / count as f32])
                }),
                mask: GrayImage::from_fn(16, 16, |x, _| Luma([(x / 6) as u8])),
            })
            .collect()
    }

    #[test]
    fn fit_writes_every_epoch_and_fires_callbacks() {
        let dir = tempfile::tempdir().unwrap();
        let artifact_dir = dir.path();
        let device = NdArrayDevice::default();

        let augmentation = AugmentationConfig::new().with_image_size([16, 16]);
        let model = UNetConfig::new()
            .with_entry_channels(4)
            .with_encoder_channels(vec![4, 8])
            .with_decoder_channels(vec![8, 4, 4]);
        let config = TrainingConfig::new(model, AdamConfig::new(), augmentation)
            .with_num_epochs(3)
            .with_batch_size(2)
            .with_num_workers(0)
            .with_display_every(1)
            .with_display_batch_size(2);

        let valid = InMemDataset::new(samples(2));
        let mut callbacks: Vec<Box<dyn EpochCallback<NdArray>>> =
            vec![Box::new(DisplayCallback::<NdArray>::from_dataset(
                &valid,
                &config,
                artifact_dir,
                device.clone(),
            ))];

        train::<TestBackend, _, _>(
            &config,
            artifact_dir,
            device,
            InMemDataset::new(samples(4)),
            valid,
            &mut callbacks,
        )
        .unwrap();

        for epoch in 1..=3 {
            assert!(artifact_dir.join("train").join(format!("epoch-{epoch}")).is_dir());
            assert!(artifact_dir.join("valid").join(format!("epoch-{epoch}")).is_dir());
            assert!(
                artifact_dir
                    .join(PREDICTIONS_DIR)
                    .join(format!("epoch-{epoch:03}.png"))
                    .is_file()
            );
        }
        assert!(artifact_dir.join(format!("{MODEL_FILE}.mpk")).is_file());
        assert!(TrainingConfig::load_from(artifact_dir).is_ok());
    }

    #[test]
    fn segments_stop_on_due_epochs_and_the_last() {
        assert_eq!(segment_ends(12, &[5]), vec![5, 10, 12]);
        assert_eq!(segment_ends(10, &[5]), vec![5, 10]);
        assert_eq!(segment_ends(6, &[2, 3]), vec![2, 3, 4, 6]);
    }

    #[test]
    fn no_callbacks_means_one_segment() {
        assert_eq!(segment_ends(20, &[]), vec![20]);
        assert_eq!(segment_ends(20, &[0]), vec![20]);
    }
}
