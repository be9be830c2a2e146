//! Per-pixel cross entropy for dense class prediction.
//!
//! Extends burn's `CrossEntropyLoss` to `[batch, classes, height, width]`
//! predictions with `[batch, 1, height, width]` integer targets.

use burn::{
    module::{Content, DisplaySettings, ModuleDisplay},
    prelude::*,
    tensor::activation::log_softmax,
};

/// Smallest probability fed to `log` when predictions are probabilities.
const PROBABILITY_EPSILON: f32 = 1e-7;

/// Configuration to create a [Segmentation Cross-entropy loss](SegmentationCrossEntropyLoss) using the [init function](SegmentationCrossEntropyLossConfig::init).
#[derive(Config, Debug)]
pub struct SegmentationCrossEntropyLossConfig {
    /// Create cross-entropy with label smoothing.
    ///
    /// Hard labels {0, 1} will be changed to y_smoothed = y(1 - a) + a / nr_classes.
    /// Alpha = 0 would be the same as default.
    pub smoothing: Option<f32>,

    /// Create weighted cross-entropy.
    ///
    /// The loss of a specific pixel will be multiplied by the weight corresponding to its class label.
    ///
    /// # Pre-conditions
    ///   - The order of the weight vector should correspond to the label integer assignment.
    pub weights: Option<Vec<f32>>,

    /// Whether predictions are logits (`true`) or probabilities (`false`).
    #[config(default = true)]
    pub logits: bool,

    /// Pixels with this label contribute neither to the loss nor to the gradient.
    pub ignore_index: Option<usize>,
}

impl SegmentationCrossEntropyLossConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentationCrossEntropyLoss<B> {
        self.assertions();
        SegmentationCrossEntropyLoss {
            weights: self
                .weights
                .as_ref()
                .map(|e| Tensor::<B, 1>::from_floats(e.as_slice(), device)),
            smoothing: self.smoothing,
            logits: self.logits,
            ignore_index: self.ignore_index,
        }
    }

    fn assertions(&self) {
        if let Some(alpha) = self.smoothing {
            assert!(
                (0.0..=1.).contains(&alpha),
                "Alpha of Cross-entropy loss with smoothed labels should be in interval [0, 1]. Got {}",
                alpha
            );
        };
        if let Some(weights) = self.weights.as_ref() {
            assert!(
                weights.iter().all(|e| e > &0.),
                "Weights of cross-entropy have to be positive."
            );
        }
    }
}

/// Calculate the segmentation cross entropy loss from the predictions and targets.
///
/// Should be created using [SegmentationCrossEntropyLossConfig]
#[derive(Module, Debug)]
#[module(custom_display)]
pub struct SegmentationCrossEntropyLoss<B: Backend> {
    /// Weights for cross-entropy.
    pub weights: Option<Tensor<B, 1>>,
    /// Label smoothing factor.
    pub smoothing: Option<f32>,
    /// Use logits as input.
    pub logits: bool,
    /// Label excluded from the loss.
    pub ignore_index: Option<usize>,
}

impl<B: Backend> ModuleDisplay for SegmentationCrossEntropyLoss<B> {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("weights", &self.weights)
            .add("smoothing", &self.smoothing)
            .add("logits", &self.logits)
            .add("ignore_index", &self.ignore_index)
            .optional()
    }
}

impl<B: Backend> SegmentationCrossEntropyLoss<B> {
    /// Compute the criterion on the input tensor, averaged over the
    /// (weighted) non-ignored pixels.
    ///
    /// # Shapes
    ///
    /// - predictions: `[batch_size, num_classes, height, width]`
    /// - targets: `[batch_size, 1, height, width]` (integer class indices)
    pub fn forward(&self, predictions: Tensor<B, 4>, targets: Tensor<B, 4, Int>) -> Tensor<B, 1> {
        Self::assertions(&predictions, &targets);

        let [batch_size, num_classes, height, width] = predictions.dims();
        let total_elements = batch_size * height * width;

        let predictions_2d = predictions
            .reshape([batch_size, num_classes, height * width])
            .swap_dims(1, 2)
            .reshape([total_elements, num_classes]);

        let targets_1d = targets.reshape([total_elements]);

        let valid = match self.ignore_index {
            Some(ignore_idx) => targets_1d.clone().not_equal_elem(ignore_idx as i64),
            None => targets_1d.clone().ones_like().bool(),
        };

        // ignored labels may lie outside the class range; keep gathers in bounds
        let targets_1d = targets_1d.clamp(0, num_classes as i64 - 1);

        let log_probs = if self.logits {
            log_softmax(predictions_2d, 1)
        } else {
            predictions_2d.clamp_min(PROBABILITY_EPSILON).log()
        };

        let per_pixel = match self.smoothing {
            Some(alpha) => Self::forward_smoothed(log_probs, targets_1d.clone(), alpha, &self.weights),
            None => Self::forward_default(log_probs, targets_1d.clone(), &self.weights),
        };

        let pixel_weights = match &self.weights {
            Some(weights) => weights.clone().gather(0, targets_1d),
            None => per_pixel.ones_like(),
        };
        let pixel_weights = pixel_weights.mask_fill(valid.clone().bool_not(), 0.0);

        let per_pixel = per_pixel.mask_fill(valid.bool_not(), 0.0);
        let denominator = pixel_weights.sum().clamp_min(f32::EPSILON);

        per_pixel.sum().neg() / denominator
    }

    /// Log-likelihood of the target class, weighted per class.
    fn forward_default(
        log_probs: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
        weights: &Option<Tensor<B, 1>>,
    ) -> Tensor<B, 1> {
        let [total_elements, _] = log_probs.dims();

        let tensor = log_probs
            .gather(1, targets.clone().reshape([total_elements, 1]))
            .reshape([total_elements]);

        match weights {
            Some(weights) => tensor * weights.clone().gather(0, targets),
            None => tensor,
        }
    }

    /// Expected log-likelihood under the smoothed target distribution.
    fn forward_smoothed(
        log_probs: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
        alpha: f32,
        weights: &Option<Tensor<B, 1>>,
    ) -> Tensor<B, 1> {
        let [total_elements, num_classes] = log_probs.dims();

        let tensor = log_probs
            * Self::compute_smoothed_targets([total_elements, num_classes], targets, alpha);

        let tensor = match weights {
            Some(weights) => tensor * weights.clone().reshape([1, num_classes]),
            None => tensor,
        };

        tensor.sum_dim(1).reshape([total_elements])
    }

    fn compute_smoothed_targets(
        shape: [usize; 2],
        targets: Tensor<B, 1, Int>,
        alpha: f32,
    ) -> Tensor<B, 2> {
        let [batch_size, nr_classes] = shape;
        let device = &targets.device();
        let targets_matrix = Tensor::<B, 2>::zeros(shape, device).scatter(
            1,
            targets.reshape([batch_size, 1]),
            Tensor::ones([batch_size, 1], device),
        );
        targets_matrix * (1. - alpha) + alpha / nr_classes as f32
    }

    fn assertions(predictions: &Tensor<B, 4>, targets: &Tensor<B, 4, Int>) {
        let [pred_batch, _pred_classes, pred_height, pred_width] = predictions.dims();
        let [target_batch, target_channels, target_height, target_width] = targets.dims();

        assert_eq!(
            pred_batch, target_batch,
            "Batch size mismatch: predictions ({}) vs targets ({})",
            pred_batch, target_batch
        );

        assert_eq!(
            target_channels, 1,
            "Target should have exactly 1 channel, got {}",
            target_channels
        );

        assert_eq!(
            pred_height, target_height,
            "Height mismatch: predictions ({}) vs targets ({})",
            pred_height, target_height
        );

        assert_eq!(
            pred_width, target_width,
            "Width mismatch: predictions ({}) vs targets ({})",
            pred_width, target_width
        );
    }
}
