//! Brain MRI tumor classifier with Grad-CAM capture via ONNX Runtime
//!
//! The pre-trained ResNet-50 is shipped as two artifacts split at `layer4`,
//! the Grad-CAM target layer:
//! - `backbone.onnx` maps the normalized `[1, 3, 384, 384]` input to the
//!   `layer4` feature map `[1, C, h, w]`
//! - `head.safetensors` holds the global-average-pool + fully connected head
//!   (`fc.weight`, `fc.bias`) and the calibrated `temperature`
//!
//! Running the head in Rust gives both calibrated probabilities and the
//! gradient of any class logit with respect to `layer4`, which ONNX Runtime
//! cannot provide on its own.
//!
//! # Example
//! ```no_run
//! use mri_insight_classifier::{ModelPaths, OnnxClassifier, Preprocessor, TumorClassifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = OnnxClassifier::load(&ModelPaths::from_dir("models/brain-mri"), "features")?;
//! let img = image::open("slice.png")?.to_rgb8();
//! let tensor = Preprocessor::default().transform(&img)?;
//!
//! let probs = classifier.predict(&tensor)?;
//! let (idx, p) = probs.top().ok_or("no classes")?;
//! println!("{} ({:.3})", classifier.classes()[idx], p);
//! # Ok(())
//! # }
//! ```

pub mod head;
pub mod labels;
pub mod model;
pub mod onnx_utils;
pub mod pil_resize;
pub mod preprocess;

use mri_insight_common::{ClassProbabilities, LayerCapture, NormalizedTensor, ProcessingError};
use thiserror::Error;

pub use head::{softmax_with_temperature, LinearHead};
pub use labels::LabelMap;
pub use model::{ModelPaths, OnnxClassifier};
pub use onnx_utils::OnnxError;
pub use pil_resize::resize_bilinear_pil;
pub use preprocess::{PreprocessConfig, Preprocessor};

/// Errors raised while loading or running the classifier
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error(transparent)]
    Onnx(#[from] OnnxError),

    #[error("Model artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Failed to read {path}: {reason}")]
    ArtifactRead { path: String, reason: String },

    #[error("Invalid label map: {0}")]
    InvalidLabelMap(String),

    #[error("Invalid classifier head: {0}")]
    InvalidHead(String),

    #[error("Model output '{0}' not found")]
    MissingOutput(String),

    #[error("Invalid model output shape: expected [1, C, h, w], got {0:?}")]
    InvalidOutputShape(Vec<i64>),

    #[error("Class index {index} out of range for {classes} classes")]
    ClassOutOfRange { index: usize, classes: usize },

    #[error("Model session lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// A fixed, pre-trained tumor classifier shared read-only across calls
///
/// Implementations must guarantee at most one in-flight
/// [`forward_backward`](TumorClassifier::forward_backward) per instance, or
/// otherwise keep concurrent captures isolated from each other.
pub trait TumorClassifier: Send + Sync {
    /// Ordered class names, index-aligned with the probabilities
    fn classes(&self) -> &[String];

    /// Temperature-scaled softmax probabilities
    ///
    /// # Errors
    /// Returns an error if inference fails
    fn predict(&self, tensor: &NormalizedTensor) -> Result<ClassProbabilities, ClassifierError>;

    /// Run forward, then backward for the raw logit of `target_class`, and
    /// return the activations and gradients captured at the target layer
    ///
    /// # Errors
    /// Returns an error if inference fails or `target_class` is out of range
    fn forward_backward(
        &self,
        tensor: &NormalizedTensor,
        target_class: usize,
    ) -> Result<LayerCapture, ClassifierError>;
}
