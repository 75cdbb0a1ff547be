//! Shared fixtures: synthetic scans and stub classifiers

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use mri_insight::classifier::{softmax_with_temperature, LinearHead};
use mri_insight::{ClassProbabilities, ClassifierError, LayerCapture, NormalizedTensor, TumorClassifier};
use ndarray::{s, Array1, Array2, Array3};
use std::sync::Mutex;

pub const CLASSES: [&str; 4] = ["glioma", "meningioma", "no_tumor", "pituitary"];

pub fn class_names() -> Vec<String> {
    CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Gray tissue disk on a black field, optionally with a bright lesion
pub fn synthetic_scan(width: u32, height: u32, lesion: Option<(f32, f32, f32)>) -> RgbImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let brain = width.min(height) as f32 * 0.38;
    RgbImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        if let Some((lx, ly, lr)) = lesion {
            if ((fx - lx).powi(2) + (fy - ly).powi(2)).sqrt() < lr {
                return Rgb([245, 245, 245]);
            }
        }
        if ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt() < brain {
            Rgb([120, 120, 120])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    mri_insight::common::encode_png(image).unwrap()
}

/// Linear head over 32x32 average-pooled input channels
///
/// Stands in for the backbone with real head math: softmax, exact logit
/// gradients, and a mutex held across forward/backward.
pub struct PooledHeadClassifier {
    classes: Vec<String>,
    head: LinearHead,
    lock: Mutex<()>,
}

impl PooledHeadClassifier {
    /// `glioma` scores the mean input intensity, shifted by `bias`
    pub fn new(gain: f32, bias: f32) -> Self {
        let mut weight = Array2::<f32>::zeros((4, 3));
        weight.row_mut(0).fill(gain);
        let mut b = Array1::<f32>::zeros(4);
        b[0] = bias;
        Self {
            classes: class_names(),
            head: LinearHead::new(weight, b, 1.0).unwrap(),
            lock: Mutex::new(()),
        }
    }

    fn features(tensor: &NormalizedTensor) -> Array3<f32> {
        let input = tensor.view();
        let (_, channels, h, w) = input.dim();
        let (gh, gw) = (h / 32, w / 32);
        Array3::from_shape_fn((channels, gh, gw), |(k, i, j)| {
            input
                .slice(s![0, k, i * 32..(i + 1) * 32, j * 32..(j + 1) * 32])
                .mean()
                .unwrap_or(0.0)
        })
    }
}

impl TumorClassifier for PooledHeadClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, tensor: &NormalizedTensor) -> Result<ClassProbabilities, ClassifierError> {
        let features = Self::features(tensor);
        let logits = self.head.logits(features.view())?;
        Ok(softmax_with_temperature(logits.view(), self.head.temperature()))
    }

    fn forward_backward(
        &self,
        tensor: &NormalizedTensor,
        target_class: usize,
    ) -> Result<LayerCapture, ClassifierError> {
        let _guard = self.lock.lock().map_err(|_| ClassifierError::LockPoisoned)?;
        let features = Self::features(tensor);
        let (_, h, w) = features.dim();
        let gradients = self.head.logit_gradient(target_class, h, w)?;
        Ok(LayerCapture::new(features, gradients)?)
    }
}

/// Fixed probabilities and an input-independent capture: one hot cell at
/// `peak` on a `grid` x `grid` map
pub struct FixedPeakClassifier {
    classes: Vec<String>,
    probs: Vec<f32>,
    grid: usize,
    peak: (usize, usize),
    radius: usize,
}

impl FixedPeakClassifier {
    pub fn new(probs: Vec<f32>, grid: usize, peak: (usize, usize), radius: usize) -> Self {
        Self {
            classes: class_names(),
            probs,
            grid,
            peak,
            radius,
        }
    }
}

impl TumorClassifier for FixedPeakClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, _: &NormalizedTensor) -> Result<ClassProbabilities, ClassifierError> {
        Ok(ClassProbabilities::new(self.probs.clone()))
    }

    fn forward_backward(
        &self,
        _: &NormalizedTensor,
        _target_class: usize,
    ) -> Result<LayerCapture, ClassifierError> {
        let (py, px) = self.peak;
        let r = self.radius as isize;
        let activations = Array3::from_shape_fn((1, self.grid, self.grid), |(_, i, j)| {
            let (di, dj) = (i as isize - py as isize, j as isize - px as isize);
            if di.abs() <= r && dj.abs() <= r {
                1.0
            } else {
                0.0
            }
        });
        let gradients = Array3::from_elem((1, self.grid, self.grid), 1.0);
        Ok(LayerCapture::new(activations, gradients)?)
    }
}
