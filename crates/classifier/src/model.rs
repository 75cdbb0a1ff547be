//! ONNX-backed ResNet-50 tumor classifier

use crate::head::{softmax_with_temperature, LinearHead};
use crate::labels::LabelMap;
use crate::onnx_utils::create_optimized_session;
use crate::{ClassifierError, TumorClassifier};
use mri_insight_common::{ClassProbabilities, LayerCapture, NormalizedTensor};
use ndarray::Array3;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub const BACKBONE_FILE: &str = "backbone.onnx";
pub const HEAD_FILE: &str = "head.safetensors";
pub const LABEL_MAP_FILE: &str = "label_map.json";

/// Locations of the three classifier artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPaths {
    pub backbone: PathBuf,
    pub head: PathBuf,
    pub label_map: PathBuf,
}

impl ModelPaths {
    /// Standard artifact names inside one directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            backbone: dir.join(BACKBONE_FILE),
            head: dir.join(HEAD_FILE),
            label_map: dir.join(LABEL_MAP_FILE),
        }
    }
}

/// Classifier loaded once at startup and shared for the life of the process
///
/// The session sits behind a mutex (`Session::run` needs `&mut self`). The
/// lock is held across the forward pass and the head's backward pass, so a
/// single instance never has two gradient computations in flight.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    head: LinearHead,
    labels: LabelMap,
    feature_output: String,
}

impl OnnxClassifier {
    /// Load all artifacts and cross-check them
    ///
    /// # Errors
    /// Any missing or inconsistent artifact is an error; callers treat it as
    /// fatal
    pub fn load(paths: &ModelPaths, feature_output: &str) -> Result<Self, ClassifierError> {
        let start = std::time::Instant::now();
        info!("Loading tumor classifier from {}", paths.backbone.display());

        let labels = LabelMap::from_file(&paths.label_map)?;
        let head = LinearHead::from_safetensors(&paths.head)?;
        if head.num_classes() != labels.len() {
            return Err(ClassifierError::InvalidHead(format!(
                "head predicts {} classes but label map lists {}",
                head.num_classes(),
                labels.len()
            )));
        }

        let session = create_optimized_session(&paths.backbone)?;

        info!(
            "Classifier ready in {:.2}s: classes={:?}, T={:.4}",
            start.elapsed().as_secs_f64(),
            labels.classes,
            head.temperature()
        );

        Ok(Self {
            session: Mutex::new(session),
            head,
            labels,
            feature_output: feature_output.to_string(),
        })
    }

    /// Backbone forward pass on a locked session, returning `[C, h, w]`
    fn features(&self, session: &mut Session, tensor: &NormalizedTensor) -> Result<Array3<f32>, ClassifierError> {
        let input = TensorRef::from_array_view(tensor.view())?;
        let outputs = session.run(ort::inputs![input])?;

        let output = outputs
            .get(self.feature_output.as_str())
            .ok_or_else(|| ClassifierError::MissingOutput(self.feature_output.clone()))?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;

        if shape.len() != 4 || shape[0] != 1 || shape.iter().any(|&d| d <= 0) {
            return Err(ClassifierError::InvalidOutputShape(shape.to_vec()));
        }
        let dims = (shape[1] as usize, shape[2] as usize, shape[3] as usize);
        Array3::from_shape_vec(dims, data.to_vec())
            .map_err(|_| ClassifierError::InvalidOutputShape(shape.to_vec()))
    }
}

impl TumorClassifier for OnnxClassifier {
    fn classes(&self) -> &[String] {
        &self.labels.classes
    }

    fn predict(&self, tensor: &NormalizedTensor) -> Result<ClassProbabilities, ClassifierError> {
        let features = {
            let mut session = self.session.lock().map_err(|_| ClassifierError::LockPoisoned)?;
            self.features(&mut session, tensor)?
        };

        let logits = self.head.logits(features.view())?;
        debug!("Logits: {:?}", logits.as_slice());
        Ok(softmax_with_temperature(logits.view(), self.head.temperature()))
    }

    fn forward_backward(
        &self,
        tensor: &NormalizedTensor,
        target_class: usize,
    ) -> Result<LayerCapture, ClassifierError> {
        let mut session = self.session.lock().map_err(|_| ClassifierError::LockPoisoned)?;

        let activations = self.features(&mut session, tensor)?;
        let (_, h, w) = activations.dim();
        // Validates the channel count against the head before differentiating
        self.head.logits(activations.view())?;
        let gradients = self.head.logit_gradient(target_class, h, w)?;

        drop(session);
        Ok(LayerCapture::new(activations, gradients)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths_from_dir() {
        let paths = ModelPaths::from_dir("models/brain-mri");
        assert_eq!(paths.backbone, PathBuf::from("models/brain-mri/backbone.onnx"));
        assert_eq!(paths.head, PathBuf::from("models/brain-mri/head.safetensors"));
        assert_eq!(paths.label_map, PathBuf::from("models/brain-mri/label_map.json"));
    }

    #[test]
    fn test_load_fails_on_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxClassifier::load(&ModelPaths::from_dir(dir.path()), "features");
        assert!(matches!(result, Err(ClassifierError::ArtifactNotFound(_))));
    }
}
