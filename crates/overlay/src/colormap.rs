//! Jet color ramp and additive heatmap blending

use image::Rgb;
use mri_insight_common::RawImage;
use ndarray::ArrayView2;

// Piecewise-linear jet anchors (position, value) per channel
const JET_RED: [(f32, f32); 5] = [(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const JET_GREEN: [(f32, f32); 6] = [
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const JET_BLUE: [(f32, f32); 5] = [(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

fn interpolate(anchors: &[(f32, f32)], t: f32) -> f32 {
    for pair in anchors.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if t <= x1 {
            let span = x1 - x0;
            return if span <= 0.0 { y1 } else { y0 + (y1 - y0) * (t - x0) / span };
        }
    }
    anchors.last().map_or(0.0, |&(_, y)| y)
}

/// Jet color for an 8-bit heat level
#[must_use]
pub fn jet(level: u8) -> Rgb<u8> {
    let t = f32::from(level) / 255.0;
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([
        to_u8(interpolate(&JET_RED, t)),
        to_u8(interpolate(&JET_GREEN, t)),
        to_u8(interpolate(&JET_BLUE, t)),
    ])
}

/// Quantize a `[0, 1]` map to 8 bits (truncating, as a `uint8` cast does)
#[inline]
#[must_use]
pub fn heat_level(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

/// `out = saturate(image + alpha * jet(map))` per channel
///
/// `map` must already match the image resolution.
#[must_use]
pub fn blend_heatmap(image: &RawImage, map: ArrayView2<'_, f32>, alpha: f32) -> RawImage {
    let lut: Vec<Rgb<u8>> = (0..=255u8).map(jet).collect();
    RawImage::from_fn(image.width(), image.height(), |x, y| {
        let base = image.get_pixel(x, y);
        let heat = lut[usize::from(heat_level(map[[y as usize, x as usize]]))];
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = f32::from(base[c]) + alpha * f32::from(heat[c]);
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_jet_endpoints() {
        // Dark blue at the bottom, dark red at the top, green in the middle
        assert_eq!(jet(0), Rgb([0, 0, 128]));
        assert_eq!(jet(255), Rgb([128, 0, 0]));
        let mid = jet(128);
        assert_eq!(mid[1], 255);
    }

    #[test]
    fn test_heat_level_truncates() {
        assert_eq!(heat_level(0.0), 0);
        assert_eq!(heat_level(1.0), 255);
        assert_eq!(heat_level(0.999), 254);
        assert_eq!(heat_level(-3.0), 0);
    }

    #[test]
    fn test_blend_is_additive_and_saturating() {
        let image = RawImage::from_pixel(2, 1, Rgb([250, 100, 0]));
        let mut map = Array2::zeros((1, 2));
        map[[0, 1]] = 1.0;
        let out = blend_heatmap(&image, map.view(), 0.35);
        // Zero heat is dark blue: only the blue channel gains 0.35 * 128
        assert_eq!(out.get_pixel(0, 0), &Rgb([250, 100, 45]));
        // Full heat is dark red: red saturates
        assert_eq!(out.get_pixel(1, 0), &Rgb([255, 100, 0]));
    }
}
