//! End-to-end brain MRI inference
//!
//! [`InferenceService::infer`] sequences the stages for one upload:
//!
//! 1. decode the bytes to an RGB image
//! 2. plausibility gate (skipped with `force_predict`)
//! 3. preprocess, classify, take the top class
//! 4. Grad-CAM for the top class
//! 5. no-tumor gating policy
//! 6. overlay rendering
//!
//! The service is `Send + Sync` and holds no per-call state, so a single
//! instance can serve concurrent requests.

pub mod config;

pub use config::{InferenceConfig, ModelConfig};

use mri_insight_classifier::{ClassifierError, OnnxClassifier, Preprocessor, TumorClassifier};
use mri_insight_common::{decode_image, Circle, ProcessingError, RawImage};
use mri_insight_gating::GatingPolicy;
use mri_insight_grad_cam::{GradCam, GradCamError};
use mri_insight_overlay::{OverlayError, OverlayRenderer};
use mri_insight_plausibility::{PlausibilityGate, PlausibilityVerdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum InferenceError {
    /// Bytes that cannot be decoded as an image
    #[error("Invalid image data. ({0})")]
    Decode(String),

    #[error("Failed to load classifier: {0}")]
    Startup(#[source] ClassifierError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Classification failed: {0}")]
    Model(#[source] ClassifierError),

    #[error("Attribution failed: {0}")]
    Attribution(#[from] GradCamError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(#[source] ProcessingError),

    #[error("Overlay rendering failed: {0}")]
    Render(#[from] OverlayError),
}

/// Top-level result of one call: a plausibility warning or a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InferenceOutcome {
    Warning { warning: String },
    Prediction(InferenceResult),
}

impl InferenceOutcome {
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match self {
            InferenceOutcome::Warning { warning } => Some(warning),
            InferenceOutcome::Prediction(_) => None,
        }
    }

    #[must_use]
    pub fn prediction(&self) -> Option<&InferenceResult> {
        match self {
            InferenceOutcome::Warning { .. } => None,
            InferenceOutcome::Prediction(result) => Some(result),
        }
    }

    #[must_use]
    pub fn into_prediction(self) -> Option<InferenceResult> {
        match self {
            InferenceOutcome::Warning { .. } => None,
            InferenceOutcome::Prediction(result) => Some(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    /// Raw top-class probability, rounded to 4 decimals
    pub confidence: f64,
}

/// Diagnostics behind the final decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceDetails {
    /// Model's top class before gating
    pub raw_label: String,
    pub cam_area_frac: f32,
    pub overridden: bool,
    /// Circle drawn on the overlay, in original image coordinates
    pub circle: Circle,
    /// Class name to probability
    pub probabilities: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub prediction: Prediction,
    pub reason: String,
    /// PNG bytes, same dimensions as the decoded upload
    #[serde(skip)]
    pub overlay_image_bytes: Vec<u8>,
    pub details: InferenceDetails,
}

/// Shared, read-only inference pipeline
pub struct InferenceService {
    classifier: Arc<dyn TumorClassifier>,
    gate: PlausibilityGate,
    preprocessor: Preprocessor,
    grad_cam: GradCam,
    policy: GatingPolicy,
    renderer: OverlayRenderer,
}

impl std::fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("classes", &self.classifier.classes())
            .field("gate", &self.gate)
            .field("preprocessor", &self.preprocessor)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl InferenceService {
    /// Wrap an already loaded classifier
    ///
    /// # Errors
    /// Returns `Config` if the configuration is invalid or the classifier
    /// exposes no classes
    pub fn new(
        classifier: Arc<dyn TumorClassifier>,
        config: &InferenceConfig,
    ) -> Result<Self, InferenceError> {
        config.validate()?;
        if classifier.classes().is_empty() {
            return Err(InferenceError::Config("classifier has no classes".into()));
        }
        Ok(Self {
            classifier,
            gate: PlausibilityGate::new(config.gate.clone()),
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            grad_cam: GradCam::new(config.grad_cam),
            policy: GatingPolicy::new(config.gating.clone()),
            renderer: OverlayRenderer::new(config.overlay.clone()),
        })
    }

    /// Load the ONNX classifier named by `config.model` and build the service
    ///
    /// # Errors
    /// Returns `Startup` if any model artifact is missing or malformed
    pub fn load(config: &InferenceConfig) -> Result<Self, InferenceError> {
        config.validate()?;
        let start = Instant::now();
        let paths = config.model.paths();
        let classifier = OnnxClassifier::load(&paths, &config.model.feature_output)
            .map_err(InferenceError::Startup)?;
        info!(
            "Loaded classifier from {} ({} classes) in {:.2?}",
            config.model.dir.display(),
            classifier.classes().len(),
            start.elapsed()
        );
        Self::new(Arc::new(classifier), config)
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    /// Run only decode and the plausibility gate
    ///
    /// # Errors
    /// Returns `Decode` for bytes that are not an image
    pub fn check(&self, image_bytes: &[u8]) -> Result<PlausibilityVerdict, InferenceError> {
        check_bytes(&self.gate, image_bytes)
    }

    /// Classify one upload and produce its explanation overlay
    ///
    /// With `force_predict` the plausibility gate is skipped; the no-tumor
    /// gating policy still applies.
    ///
    /// # Errors
    /// Returns `Decode` for undecodable bytes, or the error of the failing
    /// stage
    pub fn infer(
        &self,
        image_bytes: &[u8],
        force_predict: bool,
    ) -> Result<InferenceOutcome, InferenceError> {
        let image = decode(image_bytes)?;
        self.infer_image(&image, force_predict)
    }

    /// [`infer`](Self::infer) for an already decoded image
    ///
    /// # Errors
    /// Returns the error of the failing stage
    pub fn infer_image(
        &self,
        image: &RawImage,
        force_predict: bool,
    ) -> Result<InferenceOutcome, InferenceError> {
        let start = Instant::now();

        if force_predict {
            debug!("Plausibility gate bypassed");
        } else if let PlausibilityVerdict::Warning(warning) = self.gate.verdict(image) {
            return Ok(InferenceOutcome::Warning { warning });
        }

        let tensor = self
            .preprocessor
            .transform(image)
            .map_err(InferenceError::Preprocess)?;
        let probabilities = self
            .classifier
            .predict(&tensor)
            .map_err(InferenceError::Model)?;

        let classes = self.classifier.classes();
        if probabilities.len() != classes.len() {
            return Err(InferenceError::Model(ClassifierError::InvalidHead(format!(
                "{} probabilities for {} classes",
                probabilities.len(),
                classes.len()
            ))));
        }
        let (top_index, top_prob) = probabilities.top().ok_or_else(|| {
            InferenceError::Model(ClassifierError::InvalidHead("empty probabilities".into()))
        })?;
        let raw_label = &classes[top_index];
        debug!("Top class '{}' (p={:.4})", raw_label, top_prob);

        let map = self.grad_cam.explain(self.classifier.as_ref(), &tensor, top_index)?;
        let decision = self.policy.decide(raw_label, top_prob, &map);
        if decision.overridden && decision.label != *raw_label {
            warn!(
                "Prediction '{}' overridden to '{}' (confidence {:.4}, CAM area {:.4})",
                raw_label, decision.label, top_prob, decision.cam_area_frac
            );
        }

        let overlay = self
            .renderer
            .render(image, &map, &decision.label, decision.overridden)?;

        info!(
            "Inference: {} ({:.4}) in {:.2?}",
            decision.label,
            decision.confidence,
            start.elapsed()
        );

        let scores = classes
            .iter()
            .zip(probabilities.as_slice())
            .map(|(class, &probability)| (class.clone(), probability))
            .collect();

        Ok(InferenceOutcome::Prediction(InferenceResult {
            prediction: Prediction {
                class: decision.label,
                confidence: decision.confidence,
            },
            reason: decision.reason,
            overlay_image_bytes: overlay.png,
            details: InferenceDetails {
                raw_label: raw_label.clone(),
                cam_area_frac: decision.cam_area_frac,
                overridden: decision.overridden,
                circle: overlay.circle,
                probabilities: scores,
            },
        }))
    }
}

/// Decode and gate without a classifier
///
/// # Errors
/// Returns `Decode` for bytes that are not an image
pub fn check_bytes(
    gate: &PlausibilityGate,
    image_bytes: &[u8],
) -> Result<PlausibilityVerdict, InferenceError> {
    let image = decode(image_bytes)?;
    Ok(gate.verdict(&image))
}

fn decode(image_bytes: &[u8]) -> Result<RawImage, InferenceError> {
    decode_image(image_bytes).map_err(|e| InferenceError::Decode(e.to_string()))
}
