//! Ellipse candidate extraction from a binary edge map.
//!
//! Every traced contour goes through the same sequence of tests:
//!
//! 1. Approximate it by a polygon (Ramer-Douglas-Peucker with a tolerance
//!    proportional to its arc length) and require more than
//!    [`min_polygon_vertices`](ExtractorConfig::min_polygon_vertices)
//!    vertices. Straight-sided shapes fail here.
//! 2. Require enough points for a conic fit.
//! 3. Fit an ellipse to the original contour points.
//! 4. Compare the contour's arc length with the fitted ellipse's
//!    perimeter. A contour that follows its ellipse scores close to 100;
//!    short arcs score low and tangled or doubled-back contours score
//!    high. Only scores strictly inside the configured band pass.
//!
//! Survivors are ranked by ellipse area, largest first.

use std::fmt;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::contour::{ContourTracer, ContourTracerKind};
use crate::ellipse::Ellipse;
use crate::fit::{FitError, fit_ellipse};
use crate::simplify::approximate_polygon;
use crate::types::{Contour, EllipseCandidate, ExtractorConfig};

/// Why a contour did not become a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Too few points to fit an ellipse.
    DegenerateContour {
        /// Points in the contour.
        points: usize,
    },
    /// The polygon approximation has too few vertices to be a smooth curve.
    TooFewVertices {
        /// Vertices in the approximation.
        vertices: usize,
    },
    /// The ellipse fit failed.
    FitFailed(FitError),
    /// The fit score fell outside the accepted band.
    ScoreOutOfBand {
        /// Arc length over ellipse perimeter, in percent.
        score: f64,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateContour { points } => {
                write!(f, "degenerate contour ({points} points)")
            }
            Self::TooFewVertices { vertices } => {
                write!(f, "polygon approximation has only {vertices} vertices")
            }
            Self::FitFailed(err) => write!(f, "ellipse fit failed: {err}"),
            Self::ScoreOutOfBand { score } => write!(f, "fit score {score:.1} out of band"),
        }
    }
}

/// Outcome of evaluating a single contour.
#[derive(Debug, Clone, PartialEq)]
pub enum ContourVerdict {
    /// The contour produced a candidate.
    Accepted(EllipseCandidate),
    /// The contour was skipped.
    Rejected(Rejection),
}

/// Counts of what happened to each contour during one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Contours examined.
    pub contours: usize,
    /// Contours that became candidates.
    pub accepted: usize,
    /// Rejected for having too few polygon vertices.
    pub too_few_vertices: usize,
    /// Rejected for having too few points to fit.
    pub degenerate: usize,
    /// Rejected because the ellipse fit failed.
    pub fit_failed: usize,
    /// Rejected because the fit score was out of band.
    pub score_out_of_band: usize,
}

impl ExtractionStats {
    fn record(&mut self, verdict: &ContourVerdict) {
        self.contours += 1;
        match verdict {
            ContourVerdict::Accepted(_) => self.accepted += 1,
            ContourVerdict::Rejected(Rejection::TooFewVertices { .. }) => {
                self.too_few_vertices += 1;
            }
            ContourVerdict::Rejected(Rejection::DegenerateContour { .. }) => self.degenerate += 1,
            ContourVerdict::Rejected(Rejection::FitFailed(_)) => self.fit_failed += 1,
            ContourVerdict::Rejected(Rejection::ScoreOutOfBand { .. }) => {
                self.score_out_of_band += 1;
            }
        }
    }
}

/// Ranked candidates plus per-rejection counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Accepted candidates, largest area first.
    pub candidates: Vec<EllipseCandidate>,
    /// What happened to each contour.
    pub stats: ExtractionStats,
}

/// Finds elliptical contours in an edge map.
#[derive(Debug, Clone, Default)]
pub struct EllipseCandidateExtractor {
    config: ExtractorConfig,
    tracer: ContourTracerKind,
}

impl EllipseCandidateExtractor {
    /// Create an extractor with the given tunables and the default tracer.
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            tracer: ContourTracerKind::default(),
        }
    }

    /// Use a different contour tracer.
    #[must_use]
    pub const fn with_tracer(mut self, tracer: ContourTracerKind) -> Self {
        self.tracer = tracer;
        self
    }

    /// The extractor's tunables.
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Trace `edges` and return the ranked candidates.
    ///
    /// An edge map without edge pixels yields an empty list.
    #[must_use = "returns the ranked candidates"]
    pub fn extract(&self, edges: &GrayImage) -> Vec<EllipseCandidate> {
        self.extract_traced(edges).1.candidates
    }

    /// Trace `edges` and return the contours alongside the extraction.
    #[must_use = "returns the traced contours and the extraction"]
    pub fn extract_traced(&self, edges: &GrayImage) -> (Vec<Contour>, Extraction) {
        let contours = self.tracer.trace(edges);
        let extraction = self.extract_from_contours(&contours);
        (contours, extraction)
    }

    /// Evaluate already traced contours.
    ///
    /// `contour_index` of each candidate is the contour's position in
    /// `contours`.
    #[must_use = "returns the extraction"]
    pub fn extract_from_contours(&self, contours: &[Contour]) -> Extraction {
        let mut stats = ExtractionStats::default();
        let mut candidates = Vec::new();

        for (index, contour) in contours.iter().enumerate() {
            let verdict = self.evaluate(contour, index);
            stats.record(&verdict);
            match verdict {
                ContourVerdict::Accepted(candidate) => candidates.push(candidate),
                ContourVerdict::Rejected(reason) => {
                    tracing::debug!(
                        contour = index,
                        points = contour.len(),
                        %reason,
                        "contour rejected"
                    );
                }
            }
        }

        rank_candidates(&mut candidates);
        tracing::info!(
            contours = stats.contours,
            accepted = stats.accepted,
            too_few_vertices = stats.too_few_vertices,
            degenerate = stats.degenerate,
            fit_failed = stats.fit_failed,
            score_out_of_band = stats.score_out_of_band,
            "ellipse candidate extraction finished"
        );

        Extraction { candidates, stats }
    }

    /// Run the acceptance tests on one contour.
    #[must_use = "returns the verdict"]
    pub fn evaluate(&self, contour: &Contour, contour_index: usize) -> ContourVerdict {
        let points = contour.points();
        let length = contour.arc_length();

        let epsilon = self.config.approx_epsilon_factor * length;
        let vertices = approximate_polygon(points, epsilon, self.config.approx_closed).len();
        if vertices <= self.config.min_polygon_vertices {
            return ContourVerdict::Rejected(Rejection::TooFewVertices { vertices });
        }

        if points.len() < self.config.min_fit_points {
            return ContourVerdict::Rejected(Rejection::DegenerateContour {
                points: points.len(),
            });
        }

        let ellipse = match fit_ellipse(points) {
            Ok(ellipse) => ellipse,
            Err(err) => return ContourVerdict::Rejected(Rejection::FitFailed(err)),
        };

        let score = fit_score(length, &ellipse);
        if score > self.config.fit_score_min && score < self.config.fit_score_max {
            ContourVerdict::Accepted(EllipseCandidate::new(ellipse, score, contour_index))
        } else {
            ContourVerdict::Rejected(Rejection::ScoreOutOfBand { score })
        }
    }
}

/// Contour length over ellipse perimeter, in percent.
///
/// Returns 0 for an ellipse without perimeter.
#[must_use]
pub fn fit_score(contour_length: f64, ellipse: &Ellipse) -> f64 {
    let perimeter = ellipse.perimeter();
    if perimeter > 0.0 {
        contour_length / perimeter * 100.0
    } else {
        0.0
    }
}

/// Sort candidates by area, largest first. Equal areas keep their order.
pub fn rank_candidates(candidates: &mut [EllipseCandidate]) {
    candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
}
