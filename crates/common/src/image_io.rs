//! Raster decode/encode helpers
//!
//! Images enter the pipeline as arbitrary encoded bytes and leave as PNG. Every
//! decoded image is normalized to 3-channel RGB so downstream code never has to
//! branch on grayscale or alpha inputs.

use crate::{ProcessingError, Result};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;

/// Decoded 3-channel RGB raster, owned for the duration of one inference call
pub type RawImage = RgbImage;

/// Decode any raster format supported by the `image` crate into RGB
///
/// Grayscale inputs are replicated across channels and alpha is dropped.
///
/// # Errors
/// Returns `DecodeError` for empty or undecodable bytes
pub fn decode_image(bytes: &[u8]) -> Result<RawImage> {
    if bytes.is_empty() {
        return Err(ProcessingError::DecodeError("empty image buffer".to_string()));
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| ProcessingError::DecodeError(e.to_string()))?;

    Ok(img.to_rgb8())
}

/// Encode an RGB raster as PNG bytes
///
/// # Errors
/// Returns `EncodeError` if the PNG encoder fails
pub fn encode_png(image: &RawImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ProcessingError::EncodeError(e.to_string()))?;
    Ok(buf.into_inner())
}
