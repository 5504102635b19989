//! Image decoding and grayscale conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and hands back a
//! decoded image. Grayscale conversion happens later, after resizing and
//! blurring the color image.

use image::{DynamicImage, GrayImage};

use crate::types::{PipelineError, RgbaImage};

/// Decode raw image bytes.
///
/// Supports whatever formats the `image` crate was built with (PNG, JPEG,
/// BMP and WebP in this workspace).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert a color image to single-channel luminance.
///
/// Uses the `image` crate's Rec. 709 weights
/// (`0.2126 R + 0.7152 G + 0.0722 B`); alpha is ignored.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &RgbaImage) -> GrayImage {
    image::imageops::grayscale(image)
}
