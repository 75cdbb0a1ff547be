//! Common types and utilities for MRI slice inference
use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod attribution;
pub mod image_io;

pub use attribution::{AttributionMap, LayerCapture};
pub use image_io::{decode_image, encode_png, RawImage};

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Classifier input: a `[1, 3, H, W]` channel-normalized tensor in CHW layout
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Array4<f32>,
}

impl NormalizedTensor {
    /// Wrap a batch-of-one CHW array
    ///
    /// # Errors
    /// Returns `ShapeMismatch` unless the array is `[1, 3, H, W]`
    pub fn new(data: Array4<f32>) -> Result<Self> {
        let shape = data.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(ProcessingError::ShapeMismatch {
                expected: vec![1, 3, shape[2], shape[3]],
                actual: shape.to_vec(),
            });
        }
        Ok(Self { data })
    }

    #[must_use]
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Spatial resolution as `(height, width)`
    #[must_use]
    pub fn resolution(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[2], shape[3])
    }

    #[must_use]
    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

/// Per-class probabilities, ordered by class index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities(Vec<f32>);

impl ClassProbabilities {
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Index and probability of the most likely class (first index wins ties)
    #[must_use]
    pub fn top(&self) -> Option<(usize, f32)> {
        self.0
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
    }
}

/// Circle in pixel coordinates (integer, as drawn)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
}
