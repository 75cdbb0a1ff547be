//! Grad-CAM attribution over the classifier's target layer
//!
//! Capture and attribution are separate steps: the classifier runs one
//! forward/backward and hands back `(activations, gradients)` as a plain
//! [`LayerCapture`], and [`GradCam::attribute`] turns that capture into a
//! normalized heatmap at the classifier input resolution.
//!
//! ```text
//! weights[k] = mean_ij dy_c / dA[k, i, j]
//! cam        = ReLU(sum_k weights[k] * A[k])
//! cam        = bilinear(cam, input_h, input_w)
//! cam        = (cam - min) / (max - min + eps)
//! ```

use mri_insight_classifier::{ClassifierError, TumorClassifier};
use mri_insight_common::{AttributionMap, LayerCapture, NormalizedTensor, ProcessingError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GradCamError {
    #[error("Layer capture is empty: shape {0:?}")]
    EmptyCapture(Vec<usize>),

    #[error("Layer capture contains non-finite values")]
    NonFinite,

    #[error("Forward/backward capture failed: {0}")]
    Capture(#[from] ClassifierError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradCamConfig {
    /// Added to the min-max range so a flat map normalizes to zero
    pub epsilon: f32,
}

impl Default for GradCamConfig {
    fn default() -> Self {
        Self { epsilon: 1e-6 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradCam {
    config: GradCamConfig,
}

impl GradCam {
    #[must_use]
    pub fn new(config: GradCamConfig) -> Self {
        Self { config }
    }

    /// Capture at the target layer for `target_class` and attribute it at the
    /// tensor's own resolution
    ///
    /// # Errors
    /// Returns `Capture` if the classifier fails, or an attribution error
    pub fn explain(
        &self,
        classifier: &dyn TumorClassifier,
        tensor: &NormalizedTensor,
        target_class: usize,
    ) -> Result<AttributionMap, GradCamError> {
        let capture = classifier.forward_backward(tensor, target_class)?;
        let (height, width) = tensor.resolution();
        self.attribute(&capture, height, width)
    }

    /// Build the `[0, 1]` heatmap for a capture, upsampled to `height` x `width`
    ///
    /// # Errors
    /// Returns `EmptyCapture` / `NonFinite` for degenerate captures
    pub fn attribute(
        &self,
        capture: &LayerCapture,
        height: usize,
        width: usize,
    ) -> Result<AttributionMap, GradCamError> {
        let acts = &capture.activations;
        let grads = &capture.gradients;
        let (channels, h, w) = acts.dim();
        if channels == 0 || h == 0 || w == 0 {
            return Err(GradCamError::EmptyCapture(acts.shape().to_vec()));
        }

        let weights = grads
            .mean_axis(Axis(2))
            .and_then(|g| g.mean_axis(Axis(1)))
            .ok_or_else(|| GradCamError::EmptyCapture(grads.shape().to_vec()))?;

        let mut cam = Array2::<f32>::zeros((h, w));
        for (weight, channel) in weights.iter().zip(acts.outer_iter()) {
            cam.scaled_add(*weight, &channel);
        }
        if cam.iter().any(|v| !v.is_finite()) {
            return Err(GradCamError::NonFinite);
        }
        // Negative evidence is discarded before upsampling
        cam.mapv_inplace(|v| v.max(0.0));

        let mut map = AttributionMap::new(cam).resize_bilinear(height, width)?.into_inner();
        normalize_unit_interval(&mut map, self.config.epsilon);

        debug!(
            "Grad-CAM: {} channels at {}x{}, upsampled to {}x{}",
            channels, h, w, height, width
        );
        Ok(AttributionMap::new(map))
    }
}

/// `(x - min) / (max - min + eps)` in place
pub fn normalize_unit_interval(values: &mut Array2<f32>, epsilon: f32) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !min.is_finite() || !max.is_finite() {
        return;
    }
    let range = max - min + epsilon;
    values.mapv_inplace(|v| (v - min) / range);
}
