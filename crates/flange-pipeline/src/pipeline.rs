//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use flange_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .resize()?
//!     .blur()
//!     .convert_to_gray()
//!     .estimate_thresholds()?
//!     .detect_edges()
//!     .trace_contours()
//!     .extract()
//!     .suppress()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. Skipping a stage or running them out of order does not
//! compile.
//!
//! Every stage retains the raster intermediates computed so far. Callers
//! that only need the candidates should prefer [`crate::process`].

use image::DynamicImage;

use crate::contour::ContourTracer;
use crate::extract::{EllipseCandidateExtractor, ExtractionStats};
use crate::threshold::ThresholdEstimate;
use crate::types::{
    Contour, Dimensions, EllipseCandidate, GrayImage, PipelineConfig, PipelineError, RgbaImage,
    StagedResult,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the configuration, decode the source image and advance to
    /// the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an invalid
    /// configuration, [`PipelineError::EmptyInput`] for empty bytes,
    /// [`PipelineError::ImageDecode`] for undecodable data and
    /// [`PipelineError::InvalidImage`] for an image without pixels.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let image = crate::grayscale::decode(&self.source)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::InvalidImage(format!(
                "image has zero area ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let original = image.to_rgba8();
        Ok(Decoded {
            config: self.config,
            image,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source image.
#[must_use = "pipeline stages are consumed by advancing; call .resize() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    image: DynamicImage,
    original: RgbaImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded image as RGBA.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Size of the encoded source in bytes.
    #[must_use]
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Resize to the configured working width and advance.
    ///
    /// # Errors
    ///
    /// Propagates [`resize_to_width`](crate::resize::resize_to_width)
    /// errors.
    pub fn resize(self) -> Result<Resized, PipelineError> {
        let resized = crate::resize::resize_to_width(
            &self.image,
            self.config.resize_width,
            self.config.resize_filter,
        )?
        .to_rgba8();
        let dimensions = Dimensions {
            width: resized.width(),
            height: resized.height(),
        };
        Ok(Resized {
            config: self.config,
            original: self.original,
            resized,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 2: Resized ──────────────────────────

/// Pipeline state at the working width.
#[must_use = "pipeline stages are consumed by advancing; call .blur() to continue"]
pub struct Resized {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    dimensions: Dimensions,
}

impl Resized {
    /// The resized RGBA image.
    #[must_use]
    pub const fn resized(&self) -> &RgbaImage {
        &self.resized
    }

    /// Working image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Apply the configured noise filter to the color image and advance.
    pub fn blur(self) -> Blurred {
        let blurred = crate::blur::blur(&self.resized, self.config.blur);
        Blurred {
            config: self.config,
            original: self.original,
            resized: self.resized,
            blurred,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 3: Blurred ──────────────────────────

/// Pipeline state after noise reduction.
#[must_use = "pipeline stages are consumed by advancing; call .convert_to_gray() to continue"]
pub struct Blurred {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    dimensions: Dimensions,
}

impl Blurred {
    /// The blurred RGBA image.
    #[must_use]
    pub const fn blurred(&self) -> &RgbaImage {
        &self.blurred
    }

    /// Convert the blurred image to luminance and advance.
    pub fn convert_to_gray(self) -> Grayscale {
        let gray = crate::grayscale::to_gray(&self.blurred);
        Grayscale {
            config: self.config,
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            gray,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 4: Grayscale ────────────────────────

/// Pipeline state after grayscale conversion.
#[must_use = "pipeline stages are consumed by advancing; call .estimate_thresholds() to continue"]
pub struct Grayscale {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    gray: GrayImage,
    dimensions: Dimensions,
}

impl Grayscale {
    /// The grayscale image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Estimate Canny thresholds from the median intensity and advance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidImage`] if the image has no pixels.
    pub fn estimate_thresholds(self) -> Result<Thresholded, PipelineError> {
        let estimate = crate::threshold::estimate_detailed(&self.gray, self.config.sensitivity)?;
        Ok(Thresholded {
            config: self.config,
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            gray: self.gray,
            estimate,
            dimensions: self.dimensions,
        })
    }
}

// ───────────────────────── Stage 5: Thresholded ──────────────────────

/// Pipeline state once thresholds are known.
#[must_use = "pipeline stages are consumed by advancing; call .detect_edges() to continue"]
pub struct Thresholded {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    gray: GrayImage,
    estimate: ThresholdEstimate,
    dimensions: Dimensions,
}

impl Thresholded {
    /// Median, regime and thresholds.
    #[must_use]
    pub const fn estimate(&self) -> &ThresholdEstimate {
        &self.estimate
    }

    /// Run Canny with the estimated thresholds and advance.
    pub fn detect_edges(self) -> EdgesDetected {
        let edges = crate::edge::canny(&self.gray, self.estimate.thresholds);
        EdgesDetected {
            config: self.config,
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            gray: self.gray,
            estimate: self.estimate,
            edges,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 6: EdgesDetected ────────────────────

/// Pipeline state after edge detection.
#[must_use = "pipeline stages are consumed by advancing; call .trace_contours() to continue"]
pub struct EdgesDetected {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    gray: GrayImage,
    estimate: ThresholdEstimate,
    edges: GrayImage,
    dimensions: Dimensions,
}

impl EdgesDetected {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Trace the contour hierarchy and advance.
    ///
    /// An edge map without edges yields an empty hierarchy; that is not
    /// an error.
    pub fn trace_contours(self) -> ContoursTraced {
        let contours = self.config.contour_tracer.trace(&self.edges);
        ContoursTraced {
            config: self.config,
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            gray: self.gray,
            estimate: self.estimate,
            edges: self.edges,
            contours,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 7: ContoursTraced ───────────────────

/// Pipeline state after contour tracing.
#[must_use = "pipeline stages are consumed by advancing; call .extract() to continue"]
pub struct ContoursTraced {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    gray: GrayImage,
    estimate: ThresholdEstimate,
    edges: GrayImage,
    contours: Vec<Contour>,
    dimensions: Dimensions,
}

impl ContoursTraced {
    /// The traced contours.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Fit and score ellipses and advance.
    pub fn extract(self) -> Extracted {
        let extractor = EllipseCandidateExtractor::new(self.config.extractor.clone())
            .with_tracer(self.config.contour_tracer);
        let extraction = extractor.extract_from_contours(&self.contours);
        Extracted {
            config: self.config,
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            gray: self.gray,
            estimate: self.estimate,
            edges: self.edges,
            contours: self.contours,
            candidates: extraction.candidates,
            stats: extraction.stats,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 8: Extracted ────────────────────────

/// Pipeline state with ranked candidates.
#[must_use = "pipeline stages are consumed by advancing; call .suppress() to continue"]
pub struct Extracted {
    config: PipelineConfig,
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    gray: GrayImage,
    estimate: ThresholdEstimate,
    edges: GrayImage,
    contours: Vec<Contour>,
    candidates: Vec<EllipseCandidate>,
    stats: ExtractionStats,
    dimensions: Dimensions,
}

impl Extracted {
    /// Ranked candidates, largest first.
    #[must_use]
    pub fn candidates(&self) -> &[EllipseCandidate] {
        &self.candidates
    }

    /// Per-contour outcome counts.
    #[must_use]
    pub const fn stats(&self) -> ExtractionStats {
        self.stats
    }

    /// Drop nested candidates when `config.suppress_nested` is set and
    /// advance. Otherwise the candidates pass through unchanged.
    pub fn suppress(self) -> Suppressed {
        let applied = self.config.suppress_nested;
        let before = self.candidates.len();
        let candidates = if applied {
            crate::filter::suppress_nested(&self.candidates)
        } else {
            self.candidates
        };
        if applied {
            tracing::debug!(
                before,
                after = candidates.len(),
                "suppressed nested candidates"
            );
        }
        Suppressed {
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            gray: self.gray,
            estimate: self.estimate,
            edges: self.edges,
            contours: self.contours,
            candidates,
            stats: self.stats,
            applied,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 9: Suppressed ───────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to obtain the staged result"]
pub struct Suppressed {
    original: RgbaImage,
    resized: RgbaImage,
    blurred: RgbaImage,
    gray: GrayImage,
    estimate: ThresholdEstimate,
    edges: GrayImage,
    contours: Vec<Contour>,
    candidates: Vec<EllipseCandidate>,
    stats: ExtractionStats,
    applied: bool,
    dimensions: Dimensions,
}

impl Suppressed {
    /// Final candidates.
    #[must_use]
    pub fn candidates(&self) -> &[EllipseCandidate] {
        &self.candidates
    }

    /// Whether nested-candidate suppression ran.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            original: self.original,
            resized: self.resized,
            blurred: self.blurred,
            grayscale: self.gray,
            thresholds: self.estimate.thresholds,
            edges: self.edges,
            contours: self.contours,
            candidates: self.candidates,
            extraction: self.stats,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental detection pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed; the configuration is validated when
    /// [`decode`](Pending::decode) runs.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::blur::BlurKind;

    /// PNG with a dark ring on a light background.
    fn ring_png(width: u32, height: u32, radius: i32) -> Vec<u8> {
        let mut img = image::RgbaImage::from_pixel(width, height, image::Rgba([230, 230, 230, 255]));
        #[allow(clippy::cast_possible_wrap)]
        let center = (width as i32 / 2, height as i32 / 2);
        for r in radius..radius + 6 {
            imageproc::drawing::draw_hollow_circle_mut(
                &mut img,
                center,
                r,
                image::Rgba([20, 20, 20, 255]),
            );
        }
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            resize_width: 200,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn pending_exposes_source_bytes() {
        let png = ring_png(40, 40, 10);
        let expected_len = png.len();
        let pending = Pipeline::new(png, small_config());
        assert_eq!(pending.source().len(), expected_len);
    }

    #[test]
    fn decode_empty_input_returns_error() {
        let result = Pipeline::new(vec![], small_config()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn decode_corrupt_input_returns_error() {
        let result = Pipeline::new(vec![0xFF, 0x00], small_config()).decode();
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn decode_rejects_invalid_config() {
        let config = PipelineConfig {
            blur: BlurKind::Median { kernel_size: 4 },
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(ring_png(40, 40, 10), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn decoded_exposes_original() {
        let png = ring_png(40, 30, 8);
        let len = png.len();
        let decoded = Pipeline::new(png, small_config()).decode().unwrap();
        assert_eq!(decoded.original().dimensions(), (40, 30));
        assert_eq!(decoded.source_len(), len);
    }

    #[test]
    fn resize_scales_to_working_width() {
        let resized = Pipeline::new(ring_png(40, 30, 8), small_config())
            .decode()
            .unwrap()
            .resize()
            .unwrap();
        assert_eq!(resized.resized().dimensions(), (200, 150));
        assert_eq!(
            resized.dimensions(),
            Dimensions {
                width: 200,
                height: 150
            }
        );
    }

    #[test]
    fn intermediate_stages_keep_dimensions() {
        let gray = Pipeline::new(ring_png(200, 100, 20), small_config())
            .decode()
            .unwrap()
            .resize()
            .unwrap()
            .blur()
            .convert_to_gray();
        assert_eq!(gray.gray().dimensions(), (200, 100));

        let edges = gray.estimate_thresholds().unwrap().detect_edges();
        assert_eq!(edges.edges().dimensions(), (200, 100));
    }

    #[test]
    fn light_background_selects_light_regime() {
        let thresholded = Pipeline::new(ring_png(200, 200, 40), small_config())
            .decode()
            .unwrap()
            .resize()
            .unwrap()
            .blur()
            .convert_to_gray()
            .estimate_thresholds()
            .unwrap();
        let estimate = thresholded.estimate();
        assert_eq!(
            estimate.regime,
            crate::threshold::BrightnessRegime::Light
        );
        assert!(estimate.thresholds.high >= 85);
    }

    #[test]
    fn ring_yields_a_candidate() {
        let extracted = Pipeline::new(ring_png(200, 200, 50), small_config())
            .decode()
            .unwrap()
            .resize()
            .unwrap()
            .blur()
            .convert_to_gray()
            .estimate_thresholds()
            .unwrap()
            .detect_edges()
            .trace_contours()
            .extract();
        assert!(!extracted.candidates().is_empty());
        assert_eq!(extracted.stats().accepted, extracted.candidates().len());
    }

    #[test]
    fn suppression_runs_only_when_enabled() {
        let run = |suppress_nested| {
            Pipeline::new(
                ring_png(200, 200, 50),
                PipelineConfig {
                    suppress_nested,
                    ..small_config()
                },
            )
            .decode()
            .unwrap()
            .resize()
            .unwrap()
            .blur()
            .convert_to_gray()
            .estimate_thresholds()
            .unwrap()
            .detect_edges()
            .trace_contours()
            .extract()
            .suppress()
        };
        let kept = run(false);
        let suppressed = run(true);
        assert!(!kept.applied());
        assert!(suppressed.applied());
        assert_eq!(suppressed.candidates().len(), 1);
        assert!(kept.candidates().len() >= suppressed.candidates().len());
    }

    #[test]
    fn full_pipeline_matches_process_staged() {
        let png = ring_png(200, 200, 50);
        let chained = Pipeline::new(png.clone(), small_config())
            .decode()
            .unwrap()
            .resize()
            .unwrap()
            .blur()
            .convert_to_gray()
            .estimate_thresholds()
            .unwrap()
            .detect_edges()
            .trace_contours()
            .extract()
            .suppress()
            .into_result();
        let staged = crate::process_staged(&png, &small_config()).unwrap();
        assert_eq!(chained.candidates, staged.candidates);
        assert_eq!(chained.thresholds, staged.thresholds);
        assert_eq!(chained.edges, staged.edges);
        assert_eq!(chained.contours, staged.contours);
        assert_eq!(chained.extraction, staged.extraction);
    }
}
