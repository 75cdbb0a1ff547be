//! "No tumor" gating policy
//!
//! Classifiers are poorly calibrated on borderline and no-finding slices, so a
//! positive prediction is only kept when the model is confident AND its
//! Grad-CAM evidence covers a non-trivial area. Otherwise the final label is
//! forced to [`NO_TUMOR`].

use mri_insight_common::AttributionMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label reported whenever the gate overrides the classifier
pub const NO_TUMOR: &str = "no_tumor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatingConfig {
    /// Minimum top-class probability for a positive finding
    pub confidence_threshold: f32,
    /// Minimum fraction of the map above `cam_threshold`
    pub cam_area_threshold: f32,
    /// Heatmap level that counts as evidence
    pub cam_threshold: f32,
}

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.55,
            cam_area_threshold: 0.005,
            cam_threshold: 0.35,
        }
    }
}

/// Final, possibly overridden, decision for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    pub label: String,
    /// Raw top-class probability, rounded to 4 decimals
    pub confidence: f64,
    pub reason: String,
    /// True whenever the final label is `no_tumor`
    pub overridden: bool,
    /// Fraction of the input-resolution map above the CAM threshold
    pub cam_area_frac: f32,
}

/// True for labels such as `no_tumor`, `notumor` or `No Tumor`
#[must_use]
pub fn is_no_tumor_label(label: &str) -> bool {
    label.to_lowercase().contains("no")
}

/// Round half away from zero to 4 decimals
#[must_use]
pub fn round4(value: f32) -> f64 {
    (f64::from(value) * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Default)]
pub struct GatingPolicy {
    config: GatingConfig,
}

impl GatingPolicy {
    #[must_use]
    pub fn new(config: GatingConfig) -> Self {
        Self { config }
    }

    /// Decide the final label from the raw prediction and the
    /// input-resolution attribution map
    #[must_use]
    pub fn decide(&self, pred_label: &str, confidence: f32, map: &AttributionMap) -> FinalDecision {
        let cam_area_frac = map.area_fraction(self.config.cam_threshold);

        let pred_is_no_tumor = is_no_tumor_label(pred_label);
        let low_confidence = confidence < self.config.confidence_threshold;
        let tiny_area = cam_area_frac < self.config.cam_area_threshold;
        let overridden = pred_is_no_tumor || low_confidence || tiny_area;

        let label = if overridden { NO_TUMOR } else { pred_label };

        let mut reason = format!("Model focus consistent with '{label}' features.");
        if overridden && !pred_is_no_tumor {
            // Both may hold; confidence is reported first
            let detail = if low_confidence {
                "low confidence"
            } else {
                "tiny CAM area"
            };
            reason.push_str(&format!(" (Flagged as no_tumor due to {detail})"));
        }

        debug!(
            "Gating: pred={}, confidence={:.4}, cam_area_frac={:.4}, final={}",
            pred_label, confidence, cam_area_frac, label
        );

        FinalDecision {
            label: label.to_string(),
            confidence: round4(confidence),
            reason,
            overridden,
            cam_area_frac,
        }
    }
}
