//! Adaptive Canny thresholds from median image intensity.
//!
//! The median of a blurred grayscale image is classified into one of four
//! brightness regimes, each with its own formula for the low/high
//! hysteresis thresholds. Light and dark images use a doubled sensitivity
//! so the thresholds spread further around the statistic.
//!
//! This runs between grayscale conversion and Canny edge detection.

use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Floor of the high threshold in the light, dark and mid-dark regimes.
pub const HIGH_THRESHOLD_FLOOR: f64 = 85.0;

/// Floor of the high threshold in the mid-bright regime.
///
/// Unlike the other regimes this floors at the top of the intensity range,
/// so the high threshold is always 255 for mid-bright images. It is kept
/// separate from [`HIGH_THRESHOLD_FLOOR`] so the two can diverge.
pub const MID_BRIGHT_HIGH_FLOOR: f64 = 255.0;

/// Medians above this are light.
const LIGHT_ABOVE: f64 = 191.0;
/// Medians above this (and not light) are mid-bright.
const MID_BRIGHT_ABOVE: f64 = 127.0;
/// Medians below this are dark.
const DARK_BELOW: f64 = 63.0;

/// Low/high hysteresis thresholds for the edge detector.
///
/// Both values lie in `0..=255`. `low <= high` is expected but not
/// enforced; the edge detector clamps if needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    /// Weak-edge threshold.
    pub low: u8,
    /// Strong-edge threshold.
    pub high: u8,
}

/// Brightness class of an image, selected by its median intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrightnessRegime {
    /// `v > 191`.
    Light,
    /// `127 < v <= 191`.
    MidBright,
    /// `63 <= v <= 127`.
    MidDark,
    /// `v < 63`.
    Dark,
}

impl BrightnessRegime {
    /// Classify a median intensity.
    #[must_use]
    pub fn classify(median: f64) -> Self {
        if median > LIGHT_ABOVE {
            Self::Light
        } else if median > MID_BRIGHT_ABOVE {
            Self::MidBright
        } else if median < DARK_BELOW {
            Self::Dark
        } else {
            Self::MidDark
        }
    }
}

impl fmt::Display for BrightnessRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::MidBright => f.write_str("mid-bright"),
            Self::MidDark => f.write_str("mid-dark"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

/// Median pixel intensity of `image`.
///
/// Even pixel counts average the two middle values, so the result may
/// end in `.5`. Computed from a 256-bin histogram in a single pass.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has no pixels.
pub fn median_intensity(image: &GrayImage) -> Result<f64, PipelineError> {
    let mut histogram = [0_u64; 256];
    for pixel in image.pixels() {
        histogram[usize::from(pixel.0[0])] += 1;
    }

    let count: u64 = histogram.iter().sum();
    if count == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "cannot take the median of a {}x{} image",
            image.width(),
            image.height(),
        )));
    }

    // Zero-based ranks of the two middle samples (equal for odd counts).
    let lower_rank = (count - 1) / 2;
    let upper_rank = count / 2;
    let lower = value_at_rank(&histogram, lower_rank);
    let upper = value_at_rank(&histogram, upper_rank);
    Ok((f64::from(lower) + f64::from(upper)) / 2.0)
}

/// Intensity of the sample with the given zero-based rank.
fn value_at_rank(histogram: &[u64; 256], rank: u64) -> u8 {
    let mut seen = 0;
    for (value, &n) in (0..=u8::MAX).zip(histogram.iter()) {
        seen += n;
        if seen > rank {
            return value;
        }
    }
    u8::MAX
}

/// Thresholds for a given median and sensitivity.
///
/// The regime table:
///
/// | regime     | basis     | multiplier | high floor                |
/// |------------|-----------|------------|---------------------------|
/// | light      | `255 - v` | `2s`       | [`HIGH_THRESHOLD_FLOOR`]  |
/// | mid-bright | `255 - v` | `s`        | [`MID_BRIGHT_HIGH_FLOOR`] |
/// | mid-dark   | `v`       | `s`        | [`HIGH_THRESHOLD_FLOOR`]  |
/// | dark       | `v`       | `2s`       | [`HIGH_THRESHOLD_FLOOR`]  |
///
/// with `low = max(0, (1 - m) * basis)` and `high = max(floor, (1 + m) * basis)`.
/// Both are clamped to `0..=255` and truncated.
#[must_use]
pub fn thresholds_for_median(median: f64, sensitivity: f64) -> ThresholdPair {
    let (basis, multiplier, high_floor) = match BrightnessRegime::classify(median) {
        BrightnessRegime::Light => (255.0 - median, 2.0 * sensitivity, HIGH_THRESHOLD_FLOOR),
        BrightnessRegime::MidBright => (255.0 - median, sensitivity, MID_BRIGHT_HIGH_FLOOR),
        BrightnessRegime::MidDark => (median, sensitivity, HIGH_THRESHOLD_FLOOR),
        BrightnessRegime::Dark => (median, 2.0 * sensitivity, HIGH_THRESHOLD_FLOOR),
    };

    let low = ((1.0 - multiplier) * basis).max(0.0);
    let high = ((1.0 + multiplier) * basis).max(high_floor);

    ThresholdPair {
        low: truncate_intensity(low),
        high: truncate_intensity(high),
    }
}

/// Clamp into the 8-bit intensity range and truncate toward zero.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn truncate_intensity(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0) as u8
}

/// Estimate Canny thresholds for a blurred grayscale image.
///
/// `sensitivity` controls how far the thresholds spread around the
/// median; [`PipelineConfig::DEFAULT_SENSITIVITY`](crate::PipelineConfig::DEFAULT_SENSITIVITY)
/// is the validated default.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has no pixels.
pub fn estimate(image: &GrayImage, sensitivity: f64) -> Result<ThresholdPair, PipelineError> {
    Ok(estimate_detailed(image, sensitivity)?.thresholds)
}

/// The median, its regime and the resulting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEstimate {
    /// Median pixel intensity.
    pub median: f64,
    /// Regime the median falls into.
    pub regime: BrightnessRegime,
    /// Thresholds derived from the median.
    pub thresholds: ThresholdPair,
}

/// Like [`estimate`], but also reports the median and regime.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the image has no pixels.
pub fn estimate_detailed(
    image: &GrayImage,
    sensitivity: f64,
) -> Result<ThresholdEstimate, PipelineError> {
    let median = median_intensity(image)?;
    let regime = BrightnessRegime::classify(median);
    let thresholds = thresholds_for_median(median, sensitivity);
    tracing::debug!(
        median,
        %regime,
        low = thresholds.low,
        high = thresholds.high,
        "estimated edge thresholds"
    );
    Ok(ThresholdEstimate {
        median,
        regime,
        thresholds,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const S: f64 = 0.33;

    fn uniform(value: u8) -> GrayImage {
        GrayImage::from_pixel(16, 9, image::Luma([value]))
    }

    // --- Median ---

    #[test]
    fn median_of_uniform_image_is_its_value() {
        for k in [0, 1, 62, 63, 127, 128, 191, 192, 254, 255] {
            let m = median_intensity(&uniform(k)).unwrap();
            assert!((m - f64::from(k)).abs() < f64::EPSILON, "k={k}, median={m}");
        }
    }

    #[test]
    fn median_of_even_count_averages_middle_values() {
        let img = GrayImage::from_raw(2, 2, vec![10, 20, 30, 40]).unwrap();
        let m = median_intensity(&img).unwrap();
        assert!((m - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn median_of_odd_count_is_middle_value() {
        let img = GrayImage::from_raw(5, 1, vec![200, 3, 90, 255, 7]).unwrap();
        let m = median_intensity(&img).unwrap();
        assert!((m - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn median_of_empty_image_is_invalid() {
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            median_intensity(&img),
            Err(PipelineError::InvalidImage(_))
        ));
        assert!(matches!(
            estimate(&img, S),
            Err(PipelineError::InvalidImage(_))
        ));
    }

    // --- Regimes ---

    #[test]
    fn regime_boundaries() {
        assert_eq!(BrightnessRegime::classify(191.5), BrightnessRegime::Light);
        assert_eq!(BrightnessRegime::classify(191.0), BrightnessRegime::MidBright);
        assert_eq!(BrightnessRegime::classify(127.5), BrightnessRegime::MidBright);
        assert_eq!(BrightnessRegime::classify(127.0), BrightnessRegime::MidDark);
        assert_eq!(BrightnessRegime::classify(63.0), BrightnessRegime::MidDark);
        assert_eq!(BrightnessRegime::classify(62.5), BrightnessRegime::Dark);
        assert_eq!(BrightnessRegime::classify(0.0), BrightnessRegime::Dark);
    }

    // --- Threshold formulas ---

    #[test]
    fn light_image_median_200() {
        // low = 0.34 * 55 = 18.7, high = 1.66 * 55 = 91.3
        let pair = thresholds_for_median(200.0, S);
        assert_eq!(pair, ThresholdPair { low: 18, high: 91 });
    }

    #[test]
    fn light_regime_high_is_at_least_floor() {
        for v in 192..=255 {
            let pair = thresholds_for_median(f64::from(v), S);
            assert!(pair.high >= 85, "v={v}: {pair:?}");
        }
        // Pure white: basis is zero, so only the floor remains.
        assert_eq!(
            thresholds_for_median(255.0, S),
            ThresholdPair { low: 0, high: 85 }
        );
    }

    #[test]
    fn mid_bright_high_is_pinned_to_255() {
        // The mid-bright floor sits at the top of the range, so the high
        // threshold cannot vary with the median in this regime.
        for v in 128..=191 {
            let pair = thresholds_for_median(f64::from(v), S);
            assert_eq!(pair.high, 255, "v={v}");
        }
        // low = 0.67 * (255 - 150) = 70.35
        assert_eq!(thresholds_for_median(150.0, S).low, 70);
    }

    #[test]
    fn mid_dark_formula() {
        // low = 0.67 * 100 = 67, high = max(85, 133) = 133
        assert_eq!(
            thresholds_for_median(100.0, S),
            ThresholdPair { low: 67, high: 133 }
        );
        // high floors at 85: 1.33 * 63 = 83.79
        assert_eq!(thresholds_for_median(63.0, S).high, 85);
    }

    #[test]
    fn dark_formula() {
        // low = 0.34 * 50 = 17, high = max(85, 83) = 85
        assert_eq!(
            thresholds_for_median(50.0, S),
            ThresholdPair { low: 17, high: 85 }
        );
        // All-black image degenerates to (0, 85).
        assert_eq!(
            thresholds_for_median(0.0, S),
            ThresholdPair { low: 0, high: 85 }
        );
    }

    #[test]
    fn dark_regime_is_monotonic_in_median() {
        let mut previous = thresholds_for_median(0.0, S);
        for v in 1..63 {
            let pair = thresholds_for_median(f64::from(v), S);
            assert!(pair.low >= previous.low, "low decreased at v={v}");
            assert!(pair.high >= previous.high, "high decreased at v={v}");
            previous = pair;
        }
    }

    #[test]
    fn uniform_images_are_deterministic() {
        for k in [0, 40, 100, 150, 220, 255] {
            let a = estimate(&uniform(k), S).unwrap();
            let b = estimate(&uniform(k), S).unwrap();
            assert_eq!(a, b);
            assert_eq!(a, thresholds_for_median(f64::from(k), S));
        }
    }

    #[test]
    fn detailed_estimate_reports_regime() {
        let detail = estimate_detailed(&uniform(200), S).unwrap();
        assert!((detail.median - 200.0).abs() < f64::EPSILON);
        assert_eq!(detail.regime, BrightnessRegime::Light);
        assert_eq!(detail.thresholds, ThresholdPair { low: 18, high: 91 });
        assert!(estimate_detailed(&GrayImage::new(0, 0), S).is_err());
    }

    #[test]
    fn large_sensitivity_stays_in_range() {
        // (1 - 2s) goes negative and (1 + 2s) overshoots 255; both clamp.
        let pair = thresholds_for_median(60.0, 3.0);
        assert_eq!(pair, ThresholdPair { low: 0, high: 255 });
        let pair = thresholds_for_median(192.0, 3.0);
        assert_eq!(pair.low, 0);
        assert!(pair.high >= 85);
    }

    #[test]
    fn truncate_intensity_clamps() {
        assert_eq!(truncate_intensity(-3.0), 0);
        assert_eq!(truncate_intensity(18.99), 18);
        assert_eq!(truncate_intensity(300.0), 255);
        assert_eq!(truncate_intensity(f64::NAN), 0);
    }
}
