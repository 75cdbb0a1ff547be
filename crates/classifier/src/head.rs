//! Global-average-pool + fully connected classifier head
//!
//! For `logit[c] = sum_k W[c, k] * mean_ij A[k, i, j] + b[c]` the gradient with
//! respect to the pooled feature map is `W[c, k] / (h * w)` at every spatial
//! position. The head computes it directly, so each backward pass is a pure
//! function of its arguments with no accumulated gradient state.

use crate::ClassifierError;
use mri_insight_common::ClassProbabilities;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};
use safetensors::{Dtype, SafeTensors};
use std::path::Path;
use tracing::{debug, info};

pub const WEIGHT_KEY: &str = "fc.weight";
pub const BIAS_KEY: &str = "fc.bias";
pub const TEMPERATURE_KEY: &str = "temperature";

/// Linear head over pooled `layer4` features
#[derive(Debug, Clone)]
pub struct LinearHead {
    /// `[num_classes, in_features]`
    weight: Array2<f32>,
    /// `[num_classes]`
    bias: Array1<f32>,
    temperature: f32,
}

impl LinearHead {
    /// # Errors
    /// Returns `InvalidHead` on shape disagreement or a non-positive temperature
    pub fn new(weight: Array2<f32>, bias: Array1<f32>, temperature: f32) -> Result<Self, ClassifierError> {
        if weight.nrows() == 0 || weight.ncols() == 0 {
            return Err(ClassifierError::InvalidHead("empty weight matrix".to_string()));
        }
        if weight.nrows() != bias.len() {
            return Err(ClassifierError::InvalidHead(format!(
                "weight has {} rows but bias has {} entries",
                weight.nrows(),
                bias.len()
            )));
        }
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(ClassifierError::InvalidHead(format!(
                "temperature must be positive and finite, got {temperature}"
            )));
        }
        Ok(Self {
            weight,
            bias,
            temperature,
        })
    }

    /// Load the head from a safetensors file
    ///
    /// # Errors
    /// Returns an error if the file is missing or the tensors are malformed
    pub fn from_safetensors(path: &Path) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ArtifactNotFound(path.display().to_string()));
        }
        info!("Loading classifier head from {}", path.display());
        let buffer = std::fs::read(path).map_err(|e| ClassifierError::ArtifactRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_safetensors_bytes(&buffer)
    }

    /// # Errors
    /// Returns `InvalidHead` if required tensors are missing or not f32
    pub fn from_safetensors_bytes(buffer: &[u8]) -> Result<Self, ClassifierError> {
        let tensors = SafeTensors::deserialize(buffer)
            .map_err(|e| ClassifierError::InvalidHead(format!("failed to deserialize safetensors: {e}")))?;

        let (weight_shape, weight) = read_f32(&tensors, WEIGHT_KEY)?;
        let (_, bias) = read_f32(&tensors, BIAS_KEY)?;
        if weight_shape.len() != 2 {
            return Err(ClassifierError::InvalidHead(format!(
                "{WEIGHT_KEY} must be 2-D, got shape {weight_shape:?}"
            )));
        }
        let weight = Array2::from_shape_vec((weight_shape[0], weight_shape[1]), weight)
            .map_err(|e| ClassifierError::InvalidHead(e.to_string()))?;

        let temperature = if tensors.names().iter().any(|n| n.as_str() == TEMPERATURE_KEY) {
            let (_, t) = read_f32(&tensors, TEMPERATURE_KEY)?;
            match t.as_slice() {
                [t] => *t,
                other => {
                    return Err(ClassifierError::InvalidHead(format!(
                        "{TEMPERATURE_KEY} must be a scalar, got {} values",
                        other.len()
                    )))
                }
            }
        } else {
            info!("No calibrated temperature in head artifact, using T = 1.0");
            1.0
        };

        let head = Self::new(weight, Array1::from(bias), temperature)?;
        debug!(
            "Classifier head: {} classes, {} features, T = {:.4}",
            head.num_classes(),
            head.in_features(),
            head.temperature
        );
        Ok(head)
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.weight.nrows()
    }

    #[must_use]
    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Raw logits for a `[C, h, w]` feature map
    ///
    /// # Errors
    /// Returns `InvalidHead` if the channel count does not match the head
    pub fn logits(&self, features: ArrayView3<'_, f32>) -> Result<Array1<f32>, ClassifierError> {
        self.check_channels(features.dim().0)?;
        let (_, h, w) = features.dim();
        if h == 0 || w == 0 {
            return Err(ClassifierError::InvalidHead("empty feature map".to_string()));
        }
        let pooled = features
            .mean_axis(Axis(2))
            .and_then(|m| m.mean_axis(Axis(1)))
            .ok_or_else(|| ClassifierError::InvalidHead("empty feature map".to_string()))?;
        Ok(self.weight.dot(&pooled) + &self.bias)
    }

    /// Gradient of the raw logit `target` with respect to a `[C, h, w]` map
    ///
    /// # Errors
    /// Returns `ClassOutOfRange` for an unknown class
    pub fn logit_gradient(&self, target: usize, height: usize, width: usize) -> Result<Array3<f32>, ClassifierError> {
        if target >= self.num_classes() {
            return Err(ClassifierError::ClassOutOfRange {
                index: target,
                classes: self.num_classes(),
            });
        }
        let spatial = (height * width) as f32;
        let row = self.weight.row(target);
        Ok(Array3::from_shape_fn(
            (self.in_features(), height, width),
            |(k, _, _)| row[k] / spatial,
        ))
    }

    fn check_channels(&self, channels: usize) -> Result<(), ClassifierError> {
        if channels != self.in_features() {
            return Err(ClassifierError::InvalidHead(format!(
                "feature map has {channels} channels, head expects {}",
                self.in_features()
            )));
        }
        Ok(())
    }
}

/// Softmax over `logits / temperature`, max-subtracted
#[must_use]
pub fn softmax_with_temperature(logits: ArrayView1<'_, f32>, temperature: f32) -> ClassProbabilities {
    let scaled: Vec<f64> = logits
        .iter()
        .map(|&l| f64::from(l) / f64::from(temperature))
        .collect();
    let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scaled.iter().map(|&s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    ClassProbabilities::new(exps.iter().map(|&e| (e / total) as f32).collect())
}

fn read_f32(tensors: &SafeTensors<'_>, key: &str) -> Result<(Vec<usize>, Vec<f32>), ClassifierError> {
    let view = tensors
        .tensor(key)
        .map_err(|_| ClassifierError::InvalidHead(format!("missing tensor '{key}'")))?;
    if view.dtype() != Dtype::F32 {
        return Err(ClassifierError::InvalidHead(format!(
            "tensor '{key}' must be F32, got {:?}",
            view.dtype()
        )));
    }
    let values = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((view.shape().to_vec(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};
    use safetensors::tensor::TensorView;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn head_bytes(temperature: Option<f32>) -> Vec<u8> {
        let w = f32_bytes(&[1.0, 0.0, 0.0, 2.0, -1.0, 1.0]);
        let b = f32_bytes(&[0.0, 0.5]);
        let t = f32_bytes(&[temperature.unwrap_or(1.0)]);
        let mut tensors = vec![
            (WEIGHT_KEY, TensorView::new(Dtype::F32, vec![2, 3], &w).unwrap()),
            (BIAS_KEY, TensorView::new(Dtype::F32, vec![2], &b).unwrap()),
        ];
        if temperature.is_some() {
            tensors.push((TEMPERATURE_KEY, TensorView::new(Dtype::F32, vec![], &t).unwrap()));
        }
        safetensors::serialize(tensors, &None).unwrap()
    }

    #[test]
    fn test_load_head_with_and_without_temperature() {
        let head = LinearHead::from_safetensors_bytes(&head_bytes(Some(1.7))).unwrap();
        assert_eq!(head.num_classes(), 2);
        assert_eq!(head.in_features(), 3);
        assert!((head.temperature() - 1.7).abs() < 1e-6);

        let head = LinearHead::from_safetensors_bytes(&head_bytes(None)).unwrap();
        assert_eq!(head.temperature(), 1.0);
    }

    #[test]
    fn test_logits_pool_then_project() {
        let head = LinearHead::new(
            array![[1.0, 0.0], [0.0, 2.0]],
            array![0.0, 1.0],
            1.0,
        )
        .unwrap();
        // Channel 0 mean = 2, channel 1 mean = 0.5
        let features = Array3::from_shape_vec((2, 1, 2), vec![1.0, 3.0, 0.0, 1.0]).unwrap();
        let logits = head.logits(features.view()).unwrap();
        assert!((logits[0] - 2.0).abs() < 1e-6);
        assert!((logits[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let head = LinearHead::new(
            array![[0.3, -1.2, 0.8], [1.0, 0.1, -0.4]],
            array![0.05, -0.2],
            1.0,
        )
        .unwrap();
        let features = Array3::from_shape_fn((3, 2, 2), |(k, i, j)| (k + 2 * i + j) as f32 * 0.1);
        let grad = head.logit_gradient(1, 2, 2).unwrap();

        let eps = 1e-2;
        let base = head.logits(features.view()).unwrap()[1];
        let mut bumped = features.clone();
        bumped[[2, 1, 0]] += eps;
        let numeric = (head.logits(bumped.view()).unwrap()[1] - base) / eps;
        assert!((numeric - grad[[2, 1, 0]]).abs() < 1e-3);
    }

    #[test]
    fn test_gradient_rejects_unknown_class() {
        let head = LinearHead::new(array![[1.0]], array![0.0], 1.0).unwrap();
        assert!(matches!(
            head.logit_gradient(3, 1, 1),
            Err(ClassifierError::ClassOutOfRange { index: 3, classes: 1 })
        ));
    }

    #[test]
    fn test_invalid_heads_rejected() {
        assert!(LinearHead::new(array![[1.0, 2.0]], array![0.0, 1.0], 1.0).is_err());
        assert!(LinearHead::new(array![[1.0]], array![0.0], 0.0).is_err());
        assert!(LinearHead::new(array![[1.0]], array![0.0], f32::NAN).is_err());
        assert!(LinearHead::from_safetensors_bytes(b"garbage").is_err());
    }

    #[test]
    fn test_softmax_sums_to_one_and_temperature_flattens() {
        let logits = array![4.0, 1.0, -2.0, 0.5];
        let sharp = softmax_with_temperature(logits.view(), 1.0);
        let flat = softmax_with_temperature(logits.view(), 3.0);
        assert!((sharp.sum() - 1.0).abs() < 1e-4);
        assert!((flat.sum() - 1.0).abs() < 1e-4);
        assert!(flat.get(0).unwrap() < sharp.get(0).unwrap());

        // Large logits must not overflow
        let huge = softmax_with_temperature(array![1000.0, 999.0].view(), 1.0);
        assert!((huge.sum() - 1.0).abs() < 1e-4);
    }
}
