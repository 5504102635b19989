//! Canny edge detection.
//!
//! Wraps [`imageproc::edges::canny`] to turn a grayscale image into a
//! binary edge map: 255 for edge pixels, 0 for background.

use image::GrayImage;

use crate::threshold::ThresholdPair;

/// Minimum threshold handed to the Canny detector.
///
/// The estimator returns a low threshold of zero for very dark images.
/// A zero low threshold lets every pixel with any gradient join an edge
/// through hysteresis, which floods the edge map.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges using the Canny algorithm.
///
/// Pixels with gradient magnitude above `thresholds.high` are definite
/// edges; those between `thresholds.low` and `thresholds.high` are edges
/// only if connected to a definite edge.
///
/// Both thresholds are raised to at least [`MIN_THRESHOLD`] and the low
/// threshold is capped at the high one. `imageproc` smooths the input
/// with a Gaussian (σ = 1.4) before computing gradients.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, thresholds: ThresholdPair) -> GrayImage {
    let high = f32::from(thresholds.high).max(MIN_THRESHOLD);
    let low = f32::from(thresholds.low).max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Number of non-zero pixels in an edge map.
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}
