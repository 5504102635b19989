//! Scaling to the working width.
//!
//! Thresholds, blur kernels and the minimum useful contour size all
//! behave consistently only when every photograph is processed at the
//! same scale. The image is therefore resized to a fixed width, keeping
//! its aspect ratio, whether that means shrinking or enlarging it.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Resampling filter used when resizing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResizeFilter {
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Height that keeps the aspect ratio of a `w × h` image scaled to `width`.
///
/// Rounded to the nearest pixel and never below 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled_height(w: u32, h: u32, width: u32) -> u32 {
    let exact = f64::from(h) * f64::from(width) / f64::from(w.max(1));
    (exact.round() as u32).max(1)
}

/// Resize `image` to exactly `width` pixels wide, preserving aspect ratio.
///
/// Images already at the target width are returned unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has zero width or
/// height, and [`PipelineError::InvalidConfig`] if `width` is zero.
pub fn resize_to_width(
    image: &DynamicImage,
    width: u32,
    filter: ResizeFilter,
) -> Result<DynamicImage, PipelineError> {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image has zero area ({w}x{h})"
        )));
    }
    if width == 0 {
        return Err(PipelineError::InvalidConfig(
            "resize width must be at least 1".to_string(),
        ));
    }
    if w == width {
        return Ok(image.clone());
    }

    let height = scaled_height(w, h, width);
    Ok(image.resize_exact(width, height, filter.to_image_filter()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            image::Rgba([128, 128, 128, 255]),
        ))
    }

    #[test]
    fn default_filter_is_triangle() {
        assert_eq!(ResizeFilter::default(), ResizeFilter::Triangle);
    }

    #[test]
    fn shrinks_landscape() {
        let result = resize_to_width(&test_image(1000, 750), 500, ResizeFilter::Triangle).unwrap();
        assert_eq!((result.width(), result.height()), (500, 375));
    }

    #[test]
    fn shrinks_portrait() {
        let result = resize_to_width(&test_image(600, 1200), 500, ResizeFilter::Triangle).unwrap();
        assert_eq!((result.width(), result.height()), (500, 1000));
    }

    #[test]
    fn enlarges_small_image() {
        let result = resize_to_width(&test_image(100, 80), 500, ResizeFilter::Nearest).unwrap();
        assert_eq!((result.width(), result.height()), (500, 400));
    }

    #[test]
    fn exact_width_is_unchanged() {
        let img = test_image(500, 321);
        let result = resize_to_width(&img, 500, ResizeFilter::Lanczos3).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn height_rounds_and_never_vanishes() {
        assert_eq!(scaled_height(3, 2, 500), 333);
        assert_eq!(scaled_height(1000, 1, 500), 1);
        assert_eq!(scaled_height(5000, 1, 500), 1);
    }

    #[test]
    fn zero_area_image_is_rejected() {
        let result = resize_to_width(&test_image(0, 10), 500, ResizeFilter::Triangle);
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn zero_width_target_is_rejected() {
        let result = resize_to_width(&test_image(10, 10), 0, ResizeFilter::Triangle);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn uniform_color_survives_resize() {
        let result = resize_to_width(&test_image(40, 30), 500, ResizeFilter::CatmullRom).unwrap();
        let rgba = result.to_rgba8();
        for p in rgba.pixels() {
            assert!((i16::from(p.0[0]) - 128).abs() <= 1);
        }
    }
}
