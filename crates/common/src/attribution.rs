//! Attribution map and layer capture types shared by the Grad-CAM, gating and
//! overlay stages

use crate::{ProcessingError, Result};
use ndarray::{Array2, Array3, ArrayView2};

/// Activations and gradients captured at the Grad-CAM target layer
///
/// Both arrays are `[channels, height, width]`. A capture is a plain value
/// produced by one forward/backward call; nothing about it is retained by the
/// model afterwards.
#[derive(Debug, Clone)]
pub struct LayerCapture {
    pub activations: Array3<f32>,
    pub gradients: Array3<f32>,
}

impl LayerCapture {
    /// # Errors
    /// Returns `ShapeMismatch` if the two arrays disagree
    pub fn new(activations: Array3<f32>, gradients: Array3<f32>) -> Result<Self> {
        if activations.shape() != gradients.shape() {
            return Err(ProcessingError::ShapeMismatch {
                expected: activations.shape().to_vec(),
                actual: gradients.shape().to_vec(),
            });
        }
        Ok(Self {
            activations,
            gradients,
        })
    }
}

/// Spatial importance map with values in `[0, 1]`
///
/// The pipeline holds this at two resolutions (classifier input and original
/// image); each resize produces a new map and they are never mixed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionMap {
    values: Array2<f32>,
}

impl AttributionMap {
    #[must_use]
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.values.nrows()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.values.ncols()
    }

    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    #[must_use]
    pub fn into_inner(self) -> Array2<f32> {
        self.values
    }

    /// Fraction of pixels strictly above `threshold`
    #[must_use]
    pub fn area_fraction(&self, threshold: f32) -> f32 {
        let total = self.values.len();
        if total == 0 {
            return 0.0;
        }
        let above = self.values.iter().filter(|&&v| v > threshold).count();
        above as f32 / total as f32
    }

    /// Bilinear resize with half-pixel centers, clamped at the edges
    ///
    /// # Errors
    /// Returns `InvalidDimensions` if the source or target is empty
    pub fn resize_bilinear(&self, height: usize, width: usize) -> Result<Self> {
        Ok(Self::new(resize_bilinear(self.values.view(), height, width)?))
    }
}

/// Bilinear resize of a 2-D float map (`align_corners = false` semantics)
///
/// # Errors
/// Returns `InvalidDimensions` if the source or target is empty
pub fn resize_bilinear(src: ArrayView2<'_, f32>, height: usize, width: usize) -> Result<Array2<f32>> {
    let (src_h, src_w) = src.dim();
    if src_h == 0 || src_w == 0 || height == 0 || width == 0 {
        return Err(ProcessingError::InvalidDimensions {
            width: width as u32,
            height: height as u32,
        });
    }

    let scale_y = src_h as f32 / height as f32;
    let scale_x = src_w as f32 / width as f32;

    // Horizontal sample positions are the same for every row
    let columns: Vec<(usize, usize, f32)> = (0..width)
        .map(|x| source_coordinate(x, scale_x, src_w))
        .collect();

    let mut out = Array2::zeros((height, width));
    for y in 0..height {
        let (y0, y1, ly) = source_coordinate(y, scale_y, src_h);
        for (x, &(x0, x1, lx)) in columns.iter().enumerate() {
            let top = src[[y0, x0]] * (1.0 - lx) + src[[y0, x1]] * lx;
            let bottom = src[[y1, x0]] * (1.0 - lx) + src[[y1, x1]] * lx;
            out[[y, x]] = top * (1.0 - ly) + bottom * ly;
        }
    }
    Ok(out)
}

fn source_coordinate(dst: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
    let i0 = (src.floor() as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    let lambda = if i0 == len - 1 { 0.0 } else { src - i0 as f32 };
    (i0, i1, lambda)
}
