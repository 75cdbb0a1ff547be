//! Inference configuration, loadable from YAML
//!
//! Every section defaults to the values the classifier was calibrated with,
//! so a YAML file only needs the keys it changes.

use crate::InferenceError;
use mri_insight_classifier::{ModelPaths, PreprocessConfig};
use mri_insight_gating::GatingConfig;
use mri_insight_grad_cam::GradCamConfig;
use mri_insight_overlay::OverlayConfig;
use mri_insight_plausibility::GateConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `backbone.onnx`, `head.safetensors`, `label_map.json`
    pub dir: PathBuf,
    /// Backbone output carrying the Grad-CAM layer activations
    pub feature_output: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models/brain-mri"),
            feature_output: "features".to_string(),
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn paths(&self) -> ModelPaths {
        ModelPaths::from_dir(&self.dir)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub model: ModelConfig,
    pub preprocess: PreprocessConfig,
    pub gate: GateConfig,
    pub grad_cam: GradCamConfig,
    pub gating: GatingConfig,
    pub overlay: OverlayConfig,
}

impl InferenceConfig {
    /// # Errors
    /// Returns `Config` if the file cannot be read, parsed or validated
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| InferenceError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    /// # Errors
    /// Returns `Config` if the YAML is malformed or fails validation
    pub fn from_yaml_str(yaml: &str) -> Result<Self, InferenceError> {
        let config: InferenceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| InferenceError::Config(format!("failed to parse YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check thresholds and constants
    ///
    /// # Errors
    /// Returns `Config` naming the first offending field
    pub fn validate(&self) -> Result<(), InferenceError> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(InferenceError::Config(format!("{name} must be in [0, 1], got {v}")))
            }
        };

        if self.preprocess.input_size == 0 {
            return Err(InferenceError::Config("preprocess.input_size must be positive".into()));
        }
        if self.preprocess.std.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(InferenceError::Config("preprocess.std must be positive".into()));
        }
        if !(0.0..0.5).contains(&self.gate.center_margin) {
            return Err(InferenceError::Config("gate.center_margin must be in [0, 0.5)".into()));
        }
        unit("gate.min_black_fraction", self.gate.min_black_fraction)?;
        unit("gating.confidence_threshold", self.gating.confidence_threshold)?;
        unit("gating.cam_area_threshold", self.gating.cam_area_threshold)?;
        unit("gating.cam_threshold", self.gating.cam_threshold)?;
        unit("overlay.alpha", self.overlay.alpha)?;
        unit("overlay.cam_threshold", self.overlay.cam_threshold)?;
        if self.grad_cam.epsilon <= 0.0 {
            return Err(InferenceError::Config("grad_cam.epsilon must be positive".into()));
        }
        if self.model.feature_output.is_empty() {
            return Err(InferenceError::Config("model.feature_output must not be empty".into()));
        }
        Ok(())
    }
}
