//! Shared types for the flange detection pipeline.

use serde::{Deserialize, Serialize};

use crate::blur::BlurKind;
use crate::contour::ContourTracerKind;
use crate::ellipse::Ellipse;
use crate::extract::ExtractionStats;
use crate::resize::ResizeFilter;
use crate::threshold::ThresholdPair;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// original decoded image without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Cumulative Euclidean length along `points`.
///
/// With `closed == false` the path is treated as open: the segment from
/// the last point back to the first is not counted.
#[must_use]
pub fn arc_length(points: &[Point], closed: bool) -> f64 {
    let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    match (closed, points.first(), points.last()) {
        (true, Some(&first), Some(&last)) if points.len() > 2 => open + last.distance(first),
        _ => open,
    }
}

/// Whether a traced border surrounds a foreground region or a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderKind {
    /// Outer border of a connected foreground component.
    Outer,
    /// Border of a hole inside a foreground component.
    Hole,
}

/// A traced boundary of connected edge pixels.
///
/// Points are pixel coordinates in tracing order. The contour may be
/// open or closed; nothing downstream assumes the first and last points
/// coincide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    points: Vec<Point>,
    /// Index of the enclosing contour in the same trace, if any.
    pub parent: Option<usize>,
    /// Outer border or hole border.
    pub kind: BorderKind,
}

impl Contour {
    /// Create a contour from traced points.
    #[must_use]
    pub const fn new(points: Vec<Point>, parent: Option<usize>, kind: BorderKind) -> Self {
        Self {
            points,
            parent,
            kind,
        }
    }

    /// Create a top-level outer contour. Mostly useful for synthetic input.
    #[must_use]
    pub const fn from_points(points: Vec<Point>) -> Self {
        Self::new(points, None, BorderKind::Outer)
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Length of the contour treated as an open path.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        arc_length(&self.points, false)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A fitted ellipse that passed the fit-score band.
///
/// `area` is the product of the full axis lengths. It is a ranking key
/// only and is not the area of the ellipse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseCandidate {
    /// The least-squares ellipse fitted to the source contour.
    pub ellipse: Ellipse,
    /// Contour arc length as a percentage of the ellipse perimeter.
    pub fit_score: f64,
    /// `major_axis * minor_axis`.
    pub area: f64,
    /// Index of the source contour in the traced hierarchy.
    pub contour_index: usize,
}

impl EllipseCandidate {
    /// Build a candidate, deriving `area` from the ellipse axes.
    #[must_use]
    pub fn new(ellipse: Ellipse, fit_score: f64, contour_index: usize) -> Self {
        Self {
            ellipse,
            fit_score,
            area: ellipse.major_axis * ellipse.minor_axis,
            contour_index,
        }
    }
}

/// Tunables for [`EllipseCandidateExtractor`](crate::extract::EllipseCandidateExtractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Exclusive lower bound of the accepted fit score (percent).
    pub fit_score_min: f64,

    /// Exclusive upper bound of the accepted fit score (percent).
    pub fit_score_max: f64,

    /// Polygon approximation tolerance as a fraction of contour arc length.
    pub approx_epsilon_factor: f64,

    /// A contour is only a candidate when its approximation has strictly
    /// more vertices than this.
    pub min_polygon_vertices: usize,

    /// Contours with fewer points are skipped before ellipse fitting.
    /// A conic has five degrees of freedom, so this is at least 5.
    pub min_fit_points: usize,

    /// Approximate contours as closed polygons instead of open paths.
    /// Many bore edges are broken arcs, so this is off by default.
    pub approx_closed: bool,
}

impl ExtractorConfig {
    /// Default lower fit-score bound.
    pub const DEFAULT_FIT_SCORE_MIN: f64 = 50.0;
    /// Default upper fit-score bound.
    pub const DEFAULT_FIT_SCORE_MAX: f64 = 150.0;
    /// Default polygon approximation tolerance factor.
    pub const DEFAULT_APPROX_EPSILON_FACTOR: f64 = 0.02;
    /// Default vertex count a polygon must exceed.
    pub const DEFAULT_MIN_POLYGON_VERTICES: usize = 8;
    /// Smallest point count an ellipse can be fitted to.
    pub const MIN_ELLIPSE_FIT_POINTS: usize = 5;

    /// Check the configuration for values the extractor cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.fit_score_min.is_finite() || !self.fit_score_max.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "fit score bounds must be finite".to_string(),
            ));
        }
        if self.fit_score_min < 0.0 || self.fit_score_min >= self.fit_score_max {
            return Err(PipelineError::InvalidConfig(format!(
                "fit score band must satisfy 0 <= min < max, got ({}, {})",
                self.fit_score_min, self.fit_score_max,
            )));
        }
        if !(self.approx_epsilon_factor >= 0.0 && self.approx_epsilon_factor.is_finite()) {
            return Err(PipelineError::InvalidConfig(format!(
                "approx_epsilon_factor must be finite and non-negative, got {}",
                self.approx_epsilon_factor,
            )));
        }
        if self.min_fit_points < Self::MIN_ELLIPSE_FIT_POINTS {
            return Err(PipelineError::InvalidConfig(format!(
                "min_fit_points must be at least {}, got {}",
                Self::MIN_ELLIPSE_FIT_POINTS,
                self.min_fit_points,
            )));
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fit_score_min: Self::DEFAULT_FIT_SCORE_MIN,
            fit_score_max: Self::DEFAULT_FIT_SCORE_MAX,
            approx_epsilon_factor: Self::DEFAULT_APPROX_EPSILON_FACTOR,
            min_polygon_vertices: Self::DEFAULT_MIN_POLYGON_VERTICES,
            min_fit_points: Self::MIN_ELLIPSE_FIT_POINTS,
            approx_closed: false,
        }
    }
}

/// Configuration for the full detection pipeline.
///
/// All parameters have defaults tuned for photographs of flanges taken
/// at roughly arm's length. Call [`validate`](Self::validate) before
/// running on user-supplied values; the `process*` entry points do this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width in pixels the image is resized to before processing.
    /// Aspect ratio is preserved; images are scaled up as well as down.
    pub resize_width: u32,

    /// Resampling filter for the resize step.
    pub resize_filter: ResizeFilter,

    /// Noise reduction applied before grayscale conversion.
    pub blur: BlurKind,

    /// How aggressively the Canny thresholds widen around the median
    /// intensity. Must be positive.
    pub sensitivity: f64,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,

    /// Candidate extraction tunables.
    pub extractor: ExtractorConfig,

    /// Drop candidates centered near the largest candidate.
    pub suppress_nested: bool,
}

impl PipelineConfig {
    /// Default working width in pixels.
    pub const DEFAULT_RESIZE_WIDTH: u32 = 500;
    /// Default threshold sensitivity.
    pub const DEFAULT_SENSITIVITY: f64 = 0.33;
    /// Default resampling filter.
    pub const DEFAULT_RESIZE_FILTER: ResizeFilter = ResizeFilter::Triangle;

    /// Check the configuration for values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.resize_width == 0 {
            return Err(PipelineError::InvalidConfig(
                "resize_width must be at least 1".to_string(),
            ));
        }
        if !(self.sensitivity > 0.0 && self.sensitivity.is_finite()) {
            return Err(PipelineError::InvalidConfig(format!(
                "sensitivity must be finite and positive, got {}",
                self.sensitivity,
            )));
        }
        self.blur.validate()?;
        self.extractor.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resize_width: Self::DEFAULT_RESIZE_WIDTH,
            resize_filter: Self::DEFAULT_RESIZE_FILTER,
            blur: BlurKind::default(),
            sensitivity: Self::DEFAULT_SENSITIVITY,
            contour_tracer: ContourTracerKind::default(),
            extractor: ExtractorConfig::default(),
            suppress_nested: false,
        }
    }
}

/// Result of running the full detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Accepted candidates, largest first.
    pub candidates: Vec<EllipseCandidate>,

    /// Canny thresholds estimated for the image.
    pub thresholds: ThresholdPair,

    /// Dimensions of the working image the candidates refer to.
    pub dimensions: Dimensions,
}

/// Result of running the pipeline with all intermediate stage outputs preserved.
///
/// Candidate coordinates refer to the resized working image, not the
/// decoded original.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded image before any processing.
    pub original: RgbaImage,
    /// Image resized to the working width.
    pub resized: RgbaImage,
    /// Resized image after noise reduction.
    pub blurred: RgbaImage,
    /// Grayscale conversion of the blurred image.
    pub grayscale: GrayImage,
    /// Thresholds estimated from `grayscale`.
    pub thresholds: ThresholdPair,
    /// Binary Canny edge map.
    pub edges: GrayImage,
    /// Full contour hierarchy traced from `edges`.
    pub contours: Vec<Contour>,
    /// Accepted candidates, largest first (after suppression when enabled).
    pub candidates: Vec<EllipseCandidate>,
    /// Per-contour outcome counts from extraction.
    pub extraction: ExtractionStats,
    /// Working image dimensions.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the raster intermediates, keeping only the detection output.
    #[must_use]
    pub fn into_detection(self) -> DetectionResult {
        DetectionResult {
            candidates: self.candidates,
            thresholds: self.thresholds,
            dimensions: self.dimensions,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The image has no pixels to work with.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
