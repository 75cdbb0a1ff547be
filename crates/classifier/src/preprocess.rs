//! Resize + ImageNet normalization into the classifier's input layout
//!
//! Must stay in lockstep with the training-time transform (torchvision
//! `Resize((384, 384))`, `ToTensor`, `Normalize`), otherwise accuracy drops
//! silently. The resize therefore reproduces Pillow's fixed-point bilinear
//! filter rather than a float one.

use crate::pil_resize::resize_bilinear_pil;
use mri_insight_common::{NormalizedTensor, ProcessingError, RawImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// ImageNet channel means (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Square input size expected by the backbone
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: 384,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// Deterministic image-to-tensor transform
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    #[must_use]
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Resize to `input_size` x `input_size` (Pillow bilinear), scale to
    /// `[0, 1]` and normalize each channel, producing `[1, 3, S, S]` CHW
    ///
    /// # Errors
    /// Returns `InvalidDimensions` for an empty image or zero input size
    pub fn transform(&self, image: &RawImage) -> Result<NormalizedTensor, ProcessingError> {
        let size = self.config.input_size;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || size == 0 {
            return Err(ProcessingError::InvalidDimensions { width, height });
        }

        let resized =
            resize_bilinear_pil(image, size, size).ok_or(ProcessingError::InvalidDimensions { width, height })?;

        let mean = self.config.mean;
        let std = self.config.std;
        let mut array = Array4::zeros((1, 3, size as usize, size as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let v = f32::from(pixel[c]) / 255.0;
                array[[0, c, y, x]] = (v - mean[c]) / std[c];
            }
        }

        NormalizedTensor::new(array)
    }
}
