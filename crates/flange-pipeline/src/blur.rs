//! Noise reduction before edge detection.
//!
//! Photographs of machined parts carry sensor noise and surface texture
//! that would otherwise become spurious Canny edges. The blur runs on the
//! color image so the staged output can show what the detector saw.

use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, RgbaImage};

/// Which smoothing filter to apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurKind {
    /// Median over a square `kernel_size × kernel_size` window.
    ///
    /// Preserves edges while removing speckle. `kernel_size` must be odd;
    /// 1 leaves the image unchanged.
    Median {
        /// Side length of the window in pixels.
        kernel_size: u32,
    },
    /// Gaussian with standard deviation `sigma` pixels.
    Gaussian {
        /// Standard deviation in pixels. Must be positive.
        sigma: f32,
    },
}

impl BlurKind {
    /// Default median window.
    pub const DEFAULT_MEDIAN_KERNEL: u32 = 5;

    /// Check the filter parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an even or zero median
    /// kernel or a non-positive Gaussian sigma.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match *self {
            Self::Median { kernel_size } if kernel_size % 2 == 0 => {
                Err(PipelineError::InvalidConfig(format!(
                    "median kernel size must be odd, got {kernel_size}"
                )))
            }
            Self::Gaussian { sigma } if !(sigma > 0.0 && sigma.is_finite()) => {
                Err(PipelineError::InvalidConfig(format!(
                    "gaussian sigma must be positive, got {sigma}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for BlurKind {
    fn default() -> Self {
        Self::Median {
            kernel_size: Self::DEFAULT_MEDIAN_KERNEL,
        }
    }
}

impl fmt::Display for BlurKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Median { kernel_size } => write!(f, "median {kernel_size}x{kernel_size}"),
            Self::Gaussian { sigma } => write!(f, "gaussian sigma={sigma}"),
        }
    }
}

/// Smooth an RGBA image with the selected filter.
///
/// Parameters are not validated here; invalid values degrade gracefully
/// (an even median kernel acts like the next odd size up, a
/// non-positive sigma returns the image unchanged).
#[must_use = "returns the blurred image"]
pub fn blur(image: &RgbaImage, kind: BlurKind) -> RgbaImage {
    match kind {
        BlurKind::Median { kernel_size } => median_blur_rgba(image, kernel_size),
        BlurKind::Gaussian { sigma } => gaussian_blur_rgba(image, sigma),
    }
}

/// Median filter applied to each channel.
///
/// A `kernel_size` window covers `kernel_size / 2` pixels on each side of
/// the center.
#[must_use = "returns the blurred image"]
pub fn median_blur_rgba(image: &RgbaImage, kernel_size: u32) -> RgbaImage {
    let radius = kernel_size / 2;
    if radius == 0 {
        return image.clone();
    }
    imageproc::filter::median_filter(image, radius, radius)
}

/// Gaussian blur applied to each channel independently.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc` panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 || !sigma.is_finite() {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
            blurred[3].get_pixel(x, y).0[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    /// Left half red, right half blue, boundary at x = 5.
    fn color_edge_image() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    // --- BlurKind tests ---

    #[test]
    fn default_is_median_five() {
        assert_eq!(BlurKind::default(), BlurKind::Median { kernel_size: 5 });
        assert!(BlurKind::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_even_kernel() {
        for kernel_size in [0, 2, 4] {
            assert!(matches!(
                BlurKind::Median { kernel_size }.validate(),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
        assert!(BlurKind::Median { kernel_size: 1 }.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_sigma() {
        for sigma in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(
                BlurKind::Gaussian { sigma }.validate().is_err(),
                "sigma {sigma} should be rejected",
            );
        }
        assert!(BlurKind::Gaussian { sigma: 1.5 }.validate().is_ok());
    }

    #[test]
    fn display_names_filter() {
        assert_eq!(BlurKind::default().to_string(), "median 5x5");
        assert_eq!(
            BlurKind::Gaussian { sigma: 2.0 }.to_string(),
            "gaussian sigma=2"
        );
    }

    // --- Median tests ---

    #[test]
    fn median_removes_isolated_speck() {
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let blurred = blur(&img, BlurKind::Median { kernel_size: 3 });
        assert_eq!(*blurred.get_pixel(4, 4), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn median_keeps_straight_edge() {
        let img = color_edge_image();
        let blurred = blur(&img, BlurKind::default());
        assert_eq!(img, blurred);
    }

    #[test]
    fn median_kernel_one_is_identity() {
        let img = color_edge_image();
        assert_eq!(median_blur_rgba(&img, 1), img);
    }

    #[test]
    fn median_preserves_dimensions() {
        let img = RgbaImage::new(17, 31);
        assert_eq!(blur(&img, BlurKind::default()).dimensions(), (17, 31));
    }

    // --- Gaussian tests ---

    #[test]
    fn gaussian_non_positive_sigma_is_identity() {
        let img = color_edge_image();
        assert_eq!(gaussian_blur_rgba(&img, 0.0), img);
        assert_eq!(gaussian_blur_rgba(&img, -1.0), img);
    }

    #[test]
    fn gaussian_smooths_sharp_color_edge() {
        let blurred = blur(&color_edge_image(), BlurKind::Gaussian { sigma: 2.0 });
        let left = blurred.get_pixel(4, 5).0[0];
        let right = blurred.get_pixel(5, 5).0[0];
        assert!(left < 255, "expected red to decrease near boundary, got {left}");
        assert!(right > 0, "expected red to increase near boundary, got {right}");
    }

    #[test]
    fn gaussian_uniform_unchanged() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([100, 150, 200, 250]));
        let blurred = gaussian_blur_rgba(&img, 1.4);
        for pixel in blurred.pixels() {
            for (c, exp) in [100_i16, 150, 200, 250].into_iter().enumerate() {
                let diff = i16::from(pixel.0[c]) - exp;
                assert!(diff.abs() <= 1, "channel {c}: expected ~{exp}, got {}", pixel.0[c]);
            }
        }
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&BlurKind::default()).ok();
        assert_eq!(json.as_deref(), Some(r#"{"median":{"kernel_size":5}}"#));
    }
}
