//! Overlay rendering: Grad-CAM heatmap blended onto the original slice, plus
//! a circle around the dominant evidence region
//!
//! Two resolutions meet here. The input-resolution map (classifier space)
//! drives the circle geometry; a separately resized original-resolution map
//! drives the colors. The circle is then scaled into original coordinates.

pub mod circle;
pub mod colormap;

use image::Rgb;
use mri_insight_common::{encode_png, AttributionMap, Circle, ProcessingError, RawImage};
use mri_insight_gating::NO_TUMOR;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use circle::{heatmap_to_circle, scale_circle};
pub use colormap::{blend_heatmap, jet};

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Attribution map is empty")]
    EmptyMap,

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Weight of the heat colors added onto the image
    pub alpha: f32,
    /// Heatmap level that counts as evidence for the circle
    pub cam_threshold: f32,
    /// Contours below this area (px^2, input resolution) only win as fallback
    pub min_contour_area: f64,
    /// Circle stroke width in pixels
    pub stroke: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: 0.35,
            cam_threshold: 0.35,
            min_contour_area: 50.0,
            stroke: 3,
        }
    }
}

/// Rendered overlay and the circle drawn on it (original coordinates)
#[derive(Debug, Clone)]
pub struct RenderedOverlay {
    pub image: RawImage,
    pub circle: Circle,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl OverlayRenderer {
    #[must_use]
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    /// Blend, annotate and PNG-encode the overlay
    ///
    /// The circle is green when the final decision is `no_tumor`, red
    /// otherwise, and is only drawn for a positive radius.
    ///
    /// # Errors
    /// Returns `EmptyMap` for an empty map, or an encode/resize error
    pub fn render(
        &self,
        original: &RawImage,
        map: &AttributionMap,
        final_label: &str,
        overridden: bool,
    ) -> Result<RenderedOverlay, OverlayError> {
        if map.height() == 0 || map.width() == 0 {
            return Err(OverlayError::EmptyMap);
        }
        let (w0, h0) = original.dimensions();

        let full = map.resize_bilinear(h0 as usize, w0 as usize)?;
        let mut image = blend_heatmap(original, full.view(), self.config.alpha);

        let local = heatmap_to_circle(map, self.config.cam_threshold, self.config.min_contour_area);
        let circle = scale_circle(local, (map.width() as u32, map.height() as u32), (w0, h0));

        let color = if overridden || final_label == NO_TUMOR {
            GREEN
        } else {
            RED
        };
        if circle.radius > 0 {
            draw_ring(&mut image, circle, self.config.stroke, color);
        }
        debug!(
            "Overlay {}x{}: circle at ({}, {}) r={}",
            w0, h0, circle.x, circle.y, circle.radius
        );

        let png = encode_png(&image)?;
        Ok(RenderedOverlay { image, circle, png })
    }
}

/// Solid stroke of `stroke` px centered on the circle radius: every pixel
/// with `|d - r| <= stroke / 2` is painted, clipped to the image
fn draw_ring(image: &mut RawImage, circle: Circle, stroke: u32, color: Rgb<u8>) {
    let half = f64::from(stroke.max(1)) / 2.0;
    let radius = f64::from(circle.radius);
    let reach = circle.radius + half.ceil() as i32;
    let (width, height) = (image.width() as i32, image.height() as i32);

    let y_range = (circle.y - reach).max(0)..=(circle.y + reach).min(height - 1);
    for y in y_range {
        for x in (circle.x - reach).max(0)..=(circle.x + reach).min(width - 1) {
            let d = f64::from(x - circle.x).hypot(f64::from(y - circle.y));
            if (d - radius).abs() <= half {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mri_insight_common::decode_image;
    use ndarray::Array2;

    fn blob_map() -> AttributionMap {
        AttributionMap::new(Array2::from_shape_fn((384, 384), |(y, x)| {
            let d = ((x as f32 - 192.0).powi(2) + (y as f32 - 192.0).powi(2)).sqrt();
            (1.0 - d / 60.0).max(0.0)
        }))
    }

    #[test]
    fn test_overlay_keeps_original_dimensions() {
        let original = RawImage::from_pixel(512, 300, Rgb([10, 10, 10]));
        let out = OverlayRenderer::default()
            .render(&original, &blob_map(), "glioma", false)
            .unwrap();
        assert_eq!(out.image.dimensions(), (512, 300));
        let decoded = decode_image(&out.png).unwrap();
        assert_eq!(decoded.dimensions(), (512, 300));
    }

    #[test]
    fn test_ring_color_follows_decision() {
        let original = RawImage::from_pixel(384, 384, Rgb([0, 0, 0]));
        let renderer = OverlayRenderer::default();

        let positive = renderer.render(&original, &blob_map(), "glioma", false).unwrap();
        let c = positive.circle;
        assert!(c.radius > 0);
        assert_eq!(positive.image.get_pixel((c.x + c.radius) as u32, c.y as u32), &RED);

        let negative = renderer.render(&original, &blob_map(), NO_TUMOR, true).unwrap();
        let c = negative.circle;
        assert_eq!(negative.image.get_pixel((c.x + c.radius) as u32, c.y as u32), &GREEN);
    }

    #[test]
    fn test_ring_stroke_is_solid() {
        let mut image = RawImage::new(384, 384);
        let circle = Circle { x: 192, y: 192, radius: 80 };
        draw_ring(&mut image, circle, 3, RED);

        let mut near = 0;
        for (x, y, pixel) in image.enumerate_pixels() {
            let d = (f64::from(x) - 192.0).hypot(f64::from(y) - 192.0);
            if (d - 80.0).abs() <= 1.0 {
                near += 1;
                assert_eq!(pixel, &RED, "gap at ({x}, {y})");
            }
            if (d - 80.0).abs() > 1.5 {
                assert_eq!(pixel, &Rgb([0, 0, 0]), "stray stroke at ({x}, {y})");
            }
        }
        assert!(near > 900);
    }

    #[test]
    fn test_ring_is_clipped_at_the_border() {
        let mut image = RawImage::new(50, 40);
        draw_ring(&mut image, Circle { x: 45, y: 2, radius: 20 }, 3, GREEN);
        assert_eq!(image.get_pixel(25, 2), &GREEN);
        assert_eq!(image.get_pixel(45, 22), &GREEN);
        assert_eq!(image.get_pixel(45, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_circle_scales_with_original_size() {
        let renderer = OverlayRenderer::default();
        let small = RawImage::new(384, 384);
        let large = RawImage::new(768, 768);
        let a = renderer.render(&small, &blob_map(), "glioma", false).unwrap().circle;
        let b = renderer.render(&large, &blob_map(), "glioma", false).unwrap().circle;
        assert_eq!((b.x, b.y, b.radius), (2 * a.x, 2 * a.y, 2 * a.radius));
    }

    #[test]
    fn test_flat_map_draws_no_circle() {
        let original = RawImage::from_pixel(200, 200, Rgb([50, 50, 50]));
        let map = AttributionMap::new(Array2::zeros((384, 384)));
        let out = OverlayRenderer::default()
            .render(&original, &map, NO_TUMOR, true)
            .unwrap();
        assert_eq!(out.circle.radius, 0);
        // Zero heat only tints blue
        assert_eq!(out.image.get_pixel(100, 100), &Rgb([50, 50, 95]));
    }
}
