use std::marker::PhantomData;

use burn::prelude::*;
use burn::train::metric::state::{FormatOptions, NumericMetricState};
use burn::train::metric::{Metric, MetricEntry, MetricMetadata, Numeric};
use derive_new::new;

/// Per-pixel class probabilities and the matching labels.
#[derive(new)]
pub struct SegmentationMetricInput<B: Backend> {
    /// `[batch, classes, height, width]`
    outputs: Tensor<B, 4>,
    /// `[batch, 1, height, width]`
    targets: Tensor<B, 4, Int>,
}

impl<B: Backend> SegmentationMetricInput<B> {
    fn predictions(&self) -> Tensor<B, 4, Int> {
        self.outputs.clone().argmax(1)
    }
}

/// Fraction of pixels whose most probable class is the labelled one.
#[derive(Default)]
pub struct PixelAccuracyMetric<B: Backend> {
    state: NumericMetricState,
    _b: PhantomData<B>,
}

impl<B: Backend> PixelAccuracyMetric<B> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Backend> Metric for PixelAccuracyMetric<B> {
    type Input = SegmentationMetricInput<B>;
    const NAME: &'static str = "Pixel Accuracy";

    fn update(&mut self, input: &SegmentationMetricInput<B>, _metadata: &MetricMetadata) -> MetricEntry {
        let [batch_size, _, height, width] = input.outputs.dims();

        let correct = input
            .predictions()
            .equal(input.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem::<f64>();
        let accuracy = correct / (batch_size * height * width) as f64;

        self.state.update(
            100.0 * accuracy,
            batch_size,
            FormatOptions::new(Self::NAME).unit("%").precision(2),
        )
    }

    fn clear(&mut self) {
        self.state.reset()
    }
}

impl<B: Backend> Numeric for PixelAccuracyMetric<B> {
    fn value(&self) -> f64 {
        self.state.value()
    }
}

/// Intersection over union averaged over the classes present in either the
/// prediction or the labels of a batch.
#[derive(Default)]
pub struct MeanIoUMetric<B: Backend> {
    state: NumericMetricState,
    ignore_index: Option<usize>,
    _b: PhantomData<B>,
}

impl<B: Backend> MeanIoUMetric<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_index(mut self, index: usize) -> Self {
        self.ignore_index = Some(index);
        self
    }
}

impl<B: Backend> Metric for MeanIoUMetric<B> {
    type Input = SegmentationMetricInput<B>;
    const NAME: &'static str = "Mean IoU";

    fn update(&mut self, input: &SegmentationMetricInput<B>, _metadata: &MetricMetadata) -> MetricEntry {
        let [batch_size, n_classes, _, _] = input.outputs.dims();
        let targets = input.targets.clone();
        let predictions = input.predictions();

        let valid_mask = match self.ignore_index {
            Some(index) => targets.clone().not_equal_elem(index as i64).float(),
            None => targets.clone().ones_like().float(),
        };

        let mut total_iou = 0.0;
        let mut valid_classes = 0;

        for class_idx in 0..n_classes {
            if Some(class_idx) == self.ignore_index {
                continue;
            }

            let target_mask = targets.clone().equal_elem(class_idx as i64).float() * valid_mask.clone();
            let pred_mask = predictions.clone().equal_elem(class_idx as i64).float() * valid_mask.clone();

            let intersection = (target_mask.clone() * pred_mask.clone())
                .sum()
                .into_scalar()
                .elem::<f64>();
            let union = (target_mask.clone() + pred_mask.clone() - (target_mask * pred_mask))
                .sum()
                .into_scalar()
                .elem::<f64>();

            if union > 0.0 {
                total_iou += intersection / union;
                valid_classes += 1;
            }
        }

        let iou = if valid_classes > 0 {
            total_iou / valid_classes as f64
        } else {
            0.0
        };

        self.state.update(
            100.0 * iou,
            batch_size,
            FormatOptions::new(Self::NAME).unit("%").precision(2),
        )
    }

    fn clear(&mut self) {
        self.state.reset()
    }
}

impl<B: Backend> Numeric for MeanIoUMetric<B> {
    fn value(&self) -> f64 {
        self.state.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::Progress;

    type TestBackend = NdArray;

    fn metadata() -> MetricMetadata {
        MetricMetadata {
            progress: Progress {
                items_processed: 1,
                items_total: 1,
            },
            epoch: 1,
            epoch_total: 1,
            iteration: 1,
            lr: None,
        }
    }

    /// One 4x1 image, three classes, predicted labels `[0, 1, 2, 2]`.
    fn input(labels: [i64; 4]) -> SegmentationMetricInput<TestBackend> {
        let device = Default::default();
        let outputs = Tensor::<TestBackend, 2>::from_floats(
            [
                [0.8, 0.1, 0.1],
                [0.1, 0.8, 0.1],
                [0.1, 0.1, 0.8],
                [0.2, 0.1, 0.7],
            ],
            &device,
        )
        .reshape([1, 1, 4, 3])
        .swap_dims(1, 3);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints(labels, &device).reshape([1, 1, 4, 1]);

        SegmentationMetricInput::new(outputs, targets)
    }

    #[test]
    fn perfect_prediction_scores_full_marks() {
        let mut accuracy = PixelAccuracyMetric::<TestBackend>::new();
        let mut iou = MeanIoUMetric::<TestBackend>::new();
        let metadata = metadata();

        accuracy.update(&input([0, 1, 2, 2]), &metadata);
        iou.update(&input([0, 1, 2, 2]), &metadata);

        assert!((accuracy.value() - 100.0).abs() < 1e-9);
        assert!((iou.value() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn partial_prediction_scores() {
        let mut accuracy = PixelAccuracyMetric::<TestBackend>::new();
        let mut iou = MeanIoUMetric::<TestBackend>::new();
        let metadata = metadata();

        // last pixel labelled 0 but predicted 2
        accuracy.update(&input([0, 1, 2, 0]), &metadata);
        iou.update(&input([0, 1, 2, 0]), &metadata);

        assert!((accuracy.value() - 75.0).abs() < 1e-9);
        // class 0: 1/2, class 1: 1/1, class 2: 1/2
        assert!((iou.value() - 100.0 * 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn ignored_class_is_left_out_of_iou() {
        let mut iou = MeanIoUMetric::<TestBackend>::new().with_ignore_index(0);
        let metadata = metadata();

        iou.update(&input([0, 1, 2, 0]), &metadata);

        // class 1: 1/1, class 2: 1/1 once the pixels labelled 0 are masked
        assert!((iou.value() - 100.0).abs() < 1e-9);
    }
}
