//! Pixel statistics behind the plausibility checks
//!
//! Grayscale and saturation follow the OpenCV conversions (BT.601 luma in
//! fixed point, HSV saturation scaled to 0-255) so thresholds tuned against
//! OpenCV-decoded slices carry over unchanged.

use crate::GateConfig;
use mri_insight_common::RawImage;

/// Whole-image statistics on the 0-255 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub mean_saturation: f32,
    pub mean_brightness: f32,
    pub black_fraction: f32,
    pub center_brightness: f32,
}

impl ImageStats {
    /// Compute every statistic in a single pass over the image
    #[must_use]
    pub fn compute(image: &RawImage, config: &GateConfig) -> Self {
        let (width, height) = image.dimensions();
        let (x0, x1) = center_span(width, config.center_margin);
        let (y0, y1) = center_span(height, config.center_margin);

        let mut saturation_sum = 0u64;
        let mut gray_sum = 0u64;
        let mut black_count = 0u64;
        let mut center_sum = 0u64;
        let mut center_count = 0u64;

        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let gray = luma_bt601(r, g, b);

            saturation_sum += u64::from(hsv_saturation(r, g, b));
            gray_sum += u64::from(gray);
            if gray < config.black_level {
                black_count += 1;
            }
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                center_sum += u64::from(gray);
                center_count += 1;
            }
        }

        let total = u64::from(width) * u64::from(height);
        let mean = |sum: u64, n: u64| if n == 0 { 0.0 } else { (sum as f64 / n as f64) as f32 };

        Self {
            mean_saturation: mean(saturation_sum, total),
            mean_brightness: mean(gray_sum, total),
            black_fraction: mean(black_count, total),
            center_brightness: mean(center_sum, center_count),
        }
    }
}

/// `[floor(margin * len), floor((1 - margin) * len))`
fn center_span(len: u32, margin: f64) -> (u32, u32) {
    let lo = (margin * f64::from(len)) as u32;
    let hi = ((1.0 - margin) * f64::from(len)) as u32;
    (lo, hi)
}

/// BT.601 luma, same fixed-point rounding as OpenCV's RGB2GRAY
#[inline]
#[must_use]
pub fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    let y = (u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192) >> 14;
    y.min(255) as u8
}

/// HSV saturation on the 0-255 scale
#[inline]
#[must_use]
pub fn hsv_saturation(r: u8, g: u8, b: u8) -> u8 {
    let max = r.max(g).max(b);
    if max == 0 {
        return 0;
    }
    let min = r.min(g).min(b);
    let s = 255.0 * f32::from(max - min) / f32::from(max);
    s.round() as u8
}
