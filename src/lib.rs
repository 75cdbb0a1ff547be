//! MRI Insight - brain MRI tumor classification with visual explanations
//!
//! Facade over the workspace crates. Most callers only need
//! [`InferenceService`] and [`InferenceConfig`]:
//!
//! ```no_run
//! use mri_insight::{InferenceConfig, InferenceOutcome, InferenceService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = InferenceService::load(&InferenceConfig::default())?;
//! let bytes = std::fs::read("scan.png")?;
//! match service.infer(&bytes, false)? {
//!     InferenceOutcome::Warning { warning } => eprintln!("{warning}"),
//!     InferenceOutcome::Prediction(result) => {
//!         println!("{} ({})", result.prediction.class, result.prediction.confidence);
//!         std::fs::write("overlay.png", &result.overlay_image_bytes)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use mri_insight_classifier as classifier;
pub use mri_insight_common as common;
pub use mri_insight_gating as gating;
pub use mri_insight_grad_cam as grad_cam;
pub use mri_insight_orchestrator as orchestrator;
pub use mri_insight_overlay as overlay;
pub use mri_insight_plausibility as plausibility;

pub use mri_insight_classifier::{ClassifierError, TumorClassifier};
pub use mri_insight_common::{
    AttributionMap, Circle, ClassProbabilities, LayerCapture, NormalizedTensor, RawImage,
};
pub use mri_insight_orchestrator::{
    check_bytes, InferenceConfig, InferenceDetails, InferenceError, InferenceOutcome,
    InferenceResult, InferenceService, Prediction,
};
pub use mri_insight_plausibility::PlausibilityVerdict;
