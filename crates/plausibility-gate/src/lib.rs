//! MRI plausibility gate - cheap statistical checks run before the classifier
//!
//! Brain MRI slices are near-grayscale, sit on a mostly black background and
//! carry tissue in the middle of the frame. Inputs that violate one of these
//! expectations are flagged with a warning instead of being classified.
//!
//! **Checks (in order, first failure wins):**
//! - Empty image
//! - Minimum side length
//! - Mean HSV saturation
//! - Mean grayscale brightness
//! - Fraction of near-black pixels
//! - Mean brightness of the central 60% x 60% region
//!
//! These are heuristics, not guarantees. Callers can bypass the gate entirely.

pub mod stats;

use mri_insight_common::RawImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use stats::ImageStats;

pub const MSG_INVALID: &str = "Invalid image data.";
pub const MSG_TOO_SMALL: &str = "Warning: Image is very small (<128px).";
pub const MSG_SATURATED: &str =
    "Warning: Image has high color saturation, may not be a standard MRI.";
pub const MSG_TOO_DARK: &str = "Warning: Image is extremely dark.";
pub const MSG_NO_BACKGROUND: &str =
    "Warning: Image may lack the typical black background of an MRI.";
pub const MSG_DARK_CENTER: &str = "Warning: The center of the image is unusually dark.";

/// Thresholds for the plausibility checks (0-255 intensity scale)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum allowed value of min(width, height)
    pub min_side: u32,
    /// Maximum mean HSV saturation
    pub max_saturation: f32,
    /// Minimum mean grayscale brightness
    pub min_brightness: f32,
    /// Grayscale value below which a pixel counts as background
    pub black_level: u8,
    /// Minimum fraction of background pixels
    pub min_black_fraction: f32,
    /// Margin cut from each side when measuring the center (0.2 keeps the middle 60%)
    pub center_margin: f64,
    /// Minimum mean brightness of the center region
    pub min_center_brightness: f32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_side: 128,
            max_saturation: 20.0,
            min_brightness: 5.0,
            black_level: 20,
            min_black_fraction: 0.25,
            center_margin: 0.2,
            min_center_brightness: 40.0,
        }
    }
}

/// Outcome of the gate for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlausibilityVerdict {
    Pass,
    Warning(String),
}

impl PlausibilityVerdict {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, PlausibilityVerdict::Pass)
    }

    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match self {
            PlausibilityVerdict::Pass => None,
            PlausibilityVerdict::Warning(msg) => Some(msg),
        }
    }
}

type Predicate = fn(&ImageStats, &GateConfig) -> bool;

/// Ordered statistic checks; a predicate returning true rejects the image
const STAT_CHECKS: [(Predicate, &str); 4] = [
    (|s, c| s.mean_saturation > c.max_saturation, MSG_SATURATED),
    (|s, c| s.mean_brightness < c.min_brightness, MSG_TOO_DARK),
    (|s, c| s.black_fraction < c.min_black_fraction, MSG_NO_BACKGROUND),
    (|s, c| s.center_brightness < c.min_center_brightness, MSG_DARK_CENTER),
];

/// Heuristic MRI plausibility gate
#[derive(Debug, Clone, Default)]
pub struct PlausibilityGate {
    config: GateConfig,
}

impl PlausibilityGate {
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Return the first matching warning, or `None` if every check passes
    #[must_use]
    pub fn check(&self, image: &RawImage) -> Option<&'static str> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Some(MSG_INVALID);
        }
        if width.min(height) < self.config.min_side {
            return Some(MSG_TOO_SMALL);
        }

        let stats = ImageStats::compute(image, &self.config);
        debug!(
            "Gate stats: saturation={:.2}, brightness={:.2}, black_fraction={:.3}, center={:.2}",
            stats.mean_saturation, stats.mean_brightness, stats.black_fraction, stats.center_brightness
        );

        STAT_CHECKS
            .iter()
            .find(|(rejects, _)| rejects(&stats, &self.config))
            .map(|&(_, msg)| msg)
    }

    /// Same as [`check`](Self::check), wrapped as a verdict
    #[must_use]
    pub fn verdict(&self, image: &RawImage) -> PlausibilityVerdict {
        match self.check(image) {
            None => PlausibilityVerdict::Pass,
            Some(msg) => {
                warn!("Plausibility gate rejected image: {}", msg);
                PlausibilityVerdict::Warning(msg.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Gray tissue disk on a black field, roughly what an axial slice looks like
    fn mri_like(size: u32) -> RawImage {
        let c = size as f32 / 2.0;
        let r = size as f32 * 0.35;
        RawImage::from_fn(size, size, |x, y| {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
            if d < r {
                Rgb([120, 120, 120])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_mri_like_image_passes() {
        let gate = PlausibilityGate::default();
        assert_eq!(gate.check(&mri_like(256)), None);
        assert!(gate.verdict(&mri_like(256)).is_pass());
    }

    #[test]
    fn test_small_image_rejected_before_anything_else() {
        let gate = PlausibilityGate::default();
        // Saturated and tiny: size wins because it is checked first
        let img = RawImage::from_pixel(127, 300, Rgb([255, 0, 0]));
        assert_eq!(gate.check(&img), Some(MSG_TOO_SMALL));
    }

    #[test]
    fn test_empty_image_is_invalid() {
        let gate = PlausibilityGate::default();
        assert_eq!(gate.check(&RawImage::new(0, 0)), Some(MSG_INVALID));
    }

    #[test]
    fn test_saturated_image_rejected() {
        let gate = PlausibilityGate::default();
        let img = RawImage::from_pixel(200, 200, Rgb([200, 40, 40]));
        assert_eq!(gate.check(&img), Some(MSG_SATURATED));
    }

    #[test]
    fn test_black_image_is_too_dark() {
        let gate = PlausibilityGate::default();
        let img = RawImage::from_pixel(200, 200, Rgb([2, 2, 2]));
        assert_eq!(gate.check(&img), Some(MSG_TOO_DARK));
    }

    #[test]
    fn test_uniform_gray_lacks_background() {
        let gate = PlausibilityGate::default();
        let img = RawImage::from_pixel(256, 256, Rgb([128, 128, 128]));
        let verdict = gate.verdict(&img);
        assert!(verdict
            .warning()
            .unwrap()
            .contains("typical black background"));
    }

    #[test]
    fn test_dark_center_rejected() {
        let gate = PlausibilityGate::default();
        // Bright ring around a black middle
        let img = RawImage::from_fn(200, 200, |x, y| {
            let inside = (50..150).contains(&x) && (50..150).contains(&y);
            if inside || x < 10 {
                Rgb([0, 0, 0])
            } else {
                Rgb([90, 90, 90])
            }
        });
        assert_eq!(gate.check(&img), Some(MSG_DARK_CENTER));
    }

    #[test]
    fn test_config_from_partial_yaml() {
        let config: GateConfig = serde_yaml::from_str("min_side: 64\n").unwrap();
        assert_eq!(config.min_side, 64);
        assert_eq!(config.black_level, 20);

        let gate = PlausibilityGate::new(config);
        let img = mri_like(100);
        assert_eq!(gate.check(&img), None);
    }
}
