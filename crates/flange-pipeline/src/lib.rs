//! flange-pipeline: locate circular bores in photographs of flanges and
//! similar machined parts (sans-IO).
//!
//! Bytes in, ranked ellipse candidates out:
//! decode -> resize -> blur -> grayscale -> adaptive thresholds ->
//! Canny -> contour tracing -> polygon test -> ellipse fit -> fit score
//! -> ranking -> optional nested-candidate suppression.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory byte
//! slices and images and returns structured data; reading files and
//! rendering overlays live in `flange-detect`.

pub mod blur;
pub mod contour;
pub mod diagnostics;
pub mod edge;
pub mod ellipse;
pub mod extract;
pub mod filter;
pub mod fit;
pub mod grayscale;
pub mod pipeline;
pub mod resize;
pub mod simplify;
pub mod threshold;
pub mod types;

pub use blur::BlurKind;
pub use contour::{ContourTracer, ContourTracerKind};
pub use diagnostics::{PipelineDiagnostics, process_with_diagnostics};
pub use ellipse::Ellipse;
pub use extract::{
    ContourVerdict, EllipseCandidateExtractor, Extraction, ExtractionStats, Rejection,
};
pub use fit::{FitError, fit_ellipse};
pub use pipeline::Pipeline;
pub use resize::ResizeFilter;
pub use threshold::{BrightnessRegime, ThresholdEstimate, ThresholdPair};
pub use types::{
    BorderKind, Contour, DetectionResult, Dimensions, EllipseCandidate, ExtractorConfig,
    GrayImage, PipelineConfig, PipelineError, Point, RgbaImage, StagedResult,
};

/// Run the full detection pipeline, returning only the candidates.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration and
/// produces a [`DetectionResult`]: the ranked candidates, the thresholds
/// used and the working image dimensions the candidate coordinates refer
/// to. An image without any elliptical edge yields an empty candidate
/// list, not an error.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation,
/// [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the image format is unrecognized and
/// [`PipelineError::InvalidImage`] if the image has no pixels.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<DetectionResult, PipelineError> {
    Ok(process_staged(image_bytes, config)?.into_detection())
}

/// Run the full pipeline, preserving every intermediate stage output.
///
/// # Pipeline steps
///
/// 1. Decode the image
/// 2. Resize to the working width
/// 3. Noise reduction (median or Gaussian) on the color image
/// 4. Grayscale conversion
/// 5. Threshold estimation from the median intensity
/// 6. Canny edge detection
/// 7. Contour tracing (pluggable strategy)
/// 8. Candidate extraction and ranking
/// 9. Optional nested-candidate suppression
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .resize()?
        .blur()
        .convert_to_gray()
        .estimate_thresholds()?
        .detect_edges()
        .trace_contours()
        .extract()
        .suppress()
        .into_result())
}
