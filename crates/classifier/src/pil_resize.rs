// Fixed-point arithmetic on pixel indices and image dimensions
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

//! Pillow-compatible bilinear resize with 22-bit fixed-point accumulation
//!
//! The training transform resizes a PIL image, so the classifier input has to
//! be produced by the same arithmetic. Float bilinear implementations (the
//! `image` crate's `Triangle` filter included) differ by one grey level on a
//! large share of samples.
//!
//! Per output position (libImaging/Resample.c):
//! 1. `center = (o + 0.5) * scale`, `filterscale = max(scale, 1)`
//! 2. weights `max(0, 1 - |(i + 0.5 - center) / filterscale|)` in f64,
//!    normalized to sum to 1
//! 3. `kk = round(w * 2^22)`, `ss = 2^21 + sum(pixel * kk)`, `clip8(ss >> 22)`
//!
//! Horizontal pass first into a u8 buffer, then vertical. A pass whose size is
//! unchanged is skipped.

use image::RgbImage;

const PRECISION_BITS: u32 = 22;
const CHANNELS: usize = 3;

#[inline]
fn bilinear_filter(x: f64) -> f64 {
    let abs_x = x.abs();
    if abs_x < 1.0 {
        1.0 - abs_x
    } else {
        0.0
    }
}

#[inline]
fn clip8(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

/// Contributing input range and fixed-point weights for one output position
struct Taps {
    start: usize,
    weights: Vec<i64>,
}

fn precompute_taps(input_size: usize, output_size: usize) -> Vec<Taps> {
    let scale = input_size as f64 / output_size as f64;
    let filterscale = scale.max(1.0);
    let support = filterscale;

    (0..output_size)
        .map(|out_pos| {
            let center = (out_pos as f64 + 0.5) * scale;
            let min_idx = ((center - support + 0.5).floor() as i64).max(0) as usize;
            let max_idx = ((center + support + 0.5).floor() as i64).min(input_size as i64) as usize;

            let mut weights: Vec<f64> = (min_idx..max_idx)
                .map(|idx| bilinear_filter((idx as f64 + 0.5 - center) / filterscale))
                .collect();
            let wsum: f64 = weights.iter().sum();
            if wsum > 0.0 {
                for w in &mut weights {
                    *w /= wsum;
                }
            }

            Taps {
                start: min_idx,
                weights: weights
                    .iter()
                    .map(|&w| w.mul_add(f64::from(1_u32 << PRECISION_BITS), 0.5) as i64)
                    .collect(),
            }
        })
        .collect()
}

#[inline]
fn accumulate(taps: &Taps, sample: impl Fn(usize) -> u8) -> u8 {
    let mut ss = 1_i64 << (PRECISION_BITS - 1);
    for (i, &kk) in taps.weights.iter().enumerate() {
        ss += i64::from(sample(taps.start + i)) * kk;
    }
    clip8(ss >> PRECISION_BITS)
}

fn resize_horizontal(src: &[u8], width: usize, height: usize, out_width: usize) -> Vec<u8> {
    let taps = precompute_taps(width, out_width);
    let mut out = vec![0_u8; out_width * height * CHANNELS];
    for y in 0..height {
        let row = &src[y * width * CHANNELS..(y + 1) * width * CHANNELS];
        for (x, tap) in taps.iter().enumerate() {
            for c in 0..CHANNELS {
                out[(y * out_width + x) * CHANNELS + c] = accumulate(tap, |i| row[i * CHANNELS + c]);
            }
        }
    }
    out
}

fn resize_vertical(src: &[u8], width: usize, height: usize, out_height: usize) -> Vec<u8> {
    let taps = precompute_taps(height, out_height);
    let stride = width * CHANNELS;
    let mut out = vec![0_u8; stride * out_height];
    for (y, tap) in taps.iter().enumerate() {
        for offset in 0..stride {
            out[y * stride + offset] = accumulate(tap, |i| src[i * stride + offset]);
        }
    }
    out
}

/// Resize an RGB image the way `PIL.Image.resize(.., BILINEAR)` does
///
/// Returns `None` if either target dimension is zero.
#[must_use]
pub fn resize_bilinear_pil(image: &RgbImage, out_width: u32, out_height: u32) -> Option<RgbImage> {
    if out_width == 0 || out_height == 0 || image.width() == 0 || image.height() == 0 {
        return None;
    }
    let (width, height) = (image.width() as usize, image.height() as usize);
    let (target_w, target_h) = (out_width as usize, out_height as usize);

    let mut buffer = image.as_raw().clone();
    if target_w != width {
        buffer = resize_horizontal(&buffer, width, height, target_w);
    }
    if target_h != height {
        buffer = resize_vertical(&buffer, target_w, height, target_h);
    }
    RgbImage::from_raw(out_width, out_height, buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn grey_image(width: u32, height: u32, value: impl Fn(u32, u32) -> u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = value(x, y);
            Rgb([v, v, v])
        })
    }

    #[test]
    fn test_upsampling_matches_pillow() {
        let input = grey_image(2, 1, |x, _| if x == 0 { 100 } else { 200 });
        let output = resize_bilinear_pil(&input, 5, 1).unwrap();
        let row: Vec<u8> = (0..5).map(|x| output.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![100, 110, 150, 190, 200]);
    }

    #[test]
    fn test_downsampling_matches_pillow() {
        let input = grey_image(10, 10, |x, y| (y * 10 + x) as u8);
        let output = resize_bilinear_pil(&input, 4, 4).unwrap();
        let expected = [[11, 13, 16, 18], [33, 35, 38, 40], [59, 61, 64, 66], [81, 83, 86, 88]];
        for (y, row) in expected.iter().enumerate() {
            for (x, &value) in row.iter().enumerate() {
                let pixel = output.get_pixel(x as u32, y as u32);
                assert_eq!(pixel.0, [value; 3], "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_same_size_is_identity() {
        let input = RgbImage::from_fn(37, 23, |x, y| Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8]));
        let output = resize_bilinear_pil(&input, 37, 23).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_single_axis_resize_keeps_other_axis() {
        let input = grey_image(2, 3, |x, y| (x * 100 + y * 10) as u8);
        let output = resize_bilinear_pil(&input, 5, 3).unwrap();
        assert_eq!(output.dimensions(), (5, 3));
        for y in 0..3 {
            assert_eq!(output.get_pixel(0, y)[0], (y * 10) as u8);
            assert_eq!(output.get_pixel(4, y)[0], (100 + y * 10) as u8);
        }
    }

    #[test]
    fn test_channels_are_resampled_independently() {
        let input = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([100, 0, 255]) } else { Rgb([200, 255, 0]) });
        let output = resize_bilinear_pil(&input, 5, 1).unwrap();
        assert_eq!(output.get_pixel(1, 0).0, [110, 25, 230]);
    }

    #[test]
    fn test_zero_target_rejected() {
        let input = grey_image(4, 4, |_, _| 9);
        assert!(resize_bilinear_pil(&input, 0, 4).is_none());
    }
}
