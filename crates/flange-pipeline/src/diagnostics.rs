//! Per-stage timing and counts for a detection run.
//!
//! Used when tuning sensitivity, the fit-score band and the polygon
//! tolerance on real photographs. [`process_with_diagnostics`] drives the
//! same stages as [`process_staged`](crate::process_staged) and records
//! how long each took and what it produced.
//!
//! Instants come from `web-time` so the module also works on WASM.
//! `std::time::Duration` has no serde impls, so durations are written as
//! fractional seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::edge::MIN_THRESHOLD;
use crate::extract::ExtractionStats;
use crate::pipeline::Pipeline;
use crate::threshold::BrightnessRegime;
use crate::types::{BorderKind, Contour, PipelineConfig, PipelineError, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Each field captures metrics for one logical stage of the pipeline.
/// Suppression is `None` when `config.suppress_nested` is off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding.
    pub decode: StageDiagnostics,
    /// Resize to the working width.
    pub resize: StageDiagnostics,
    /// Noise reduction.
    pub blur: StageDiagnostics,
    /// Grayscale conversion.
    pub grayscale: StageDiagnostics,
    /// Median-based threshold estimation.
    pub threshold: StageDiagnostics,
    /// Canny edge detection.
    pub edge_detection: StageDiagnostics,
    /// Contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Polygon test, ellipse fit and scoring.
    pub extraction: StageDiagnostics,
    /// Nested-candidate suppression (only when enabled).
    pub suppression: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Resize metrics.
    Resize {
        /// Working width in pixels.
        width: u32,
        /// Working height in pixels.
        height: u32,
        /// Resampling filter name.
        filter: String,
    },
    /// Noise reduction metrics.
    Blur {
        /// Filter description, e.g. `median 5x5`.
        filter: String,
    },
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Threshold estimation metrics.
    Threshold {
        /// Median intensity.
        median: f64,
        /// Brightness regime of the median.
        regime: BrightnessRegime,
        /// Estimated low threshold.
        low: u8,
        /// Estimated high threshold.
        high: u8,
    },
    /// Canny edge detection metrics.
    EdgeDetection {
        /// Low threshold handed to Canny (after clamping).
        low_threshold: f32,
        /// High threshold handed to Canny (after clamping).
        high_threshold: f32,
        /// Number of edge pixels in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Number of contours found.
        contour_count: usize,
        /// Outer borders among them.
        outer_count: usize,
        /// Hole borders among them.
        hole_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Minimum points in any single contour.
        min_contour_points: usize,
        /// Maximum points in any single contour.
        max_contour_points: usize,
        /// Mean points per contour.
        mean_contour_points: f64,
    },
    /// Candidate extraction metrics.
    Extraction {
        /// Per-contour outcome counts.
        stats: ExtractionStats,
    },
    /// Nested-candidate suppression metrics.
    Suppression {
        /// Candidates before suppression.
        before: usize,
        /// Candidates after suppression.
        after: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Working pixel count.
    pub pixel_count: u64,
    /// Number of contours traced.
    pub contour_count: usize,
    /// Number of candidates in the final result.
    pub candidate_count: usize,
}

/// Run the full pipeline, timing every stage.
///
/// Produces the same [`StagedResult`] as
/// [`process_staged`](crate::process_staged).
///
/// # Errors
///
/// Same as [`process`](crate::process).
pub fn process_with_diagnostics(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = Instant::now();

    let start = Instant::now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let (width, height) = decoded.original().dimensions();
    let decode = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Decode {
            input_bytes: decoded.source_len(),
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        },
    };

    let start = Instant::now();
    let resized = decoded.resize()?;
    let dimensions = resized.dimensions();
    let resize = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Resize {
            width: dimensions.width,
            height: dimensions.height,
            filter: config.resize_filter.to_string(),
        },
    };

    let start = Instant::now();
    let blurred = resized.blur();
    let blur = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Blur {
            filter: config.blur.to_string(),
        },
    };

    let start = Instant::now();
    let gray = blurred.convert_to_gray();
    let grayscale = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Grayscale {
            width: gray.gray().width(),
            height: gray.gray().height(),
        },
    };

    let start = Instant::now();
    let thresholded = gray.estimate_thresholds()?;
    let estimate = *thresholded.estimate();
    let threshold = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Threshold {
            median: estimate.median,
            regime: estimate.regime,
            low: estimate.thresholds.low,
            high: estimate.thresholds.high,
        },
    };

    let start = Instant::now();
    let edges = thresholded.detect_edges();
    let high_threshold = f32::from(estimate.thresholds.high).max(MIN_THRESHOLD);
    let pixel_count = u64::from(dimensions.width) * u64::from(dimensions.height);
    let edge_detection = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::EdgeDetection {
            low_threshold: f32::from(estimate.thresholds.low)
                .max(MIN_THRESHOLD)
                .min(high_threshold),
            high_threshold,
            edge_pixel_count: crate::edge::count_edge_pixels(edges.edges()),
            total_pixel_count: pixel_count,
        },
    };

    let start = Instant::now();
    let traced = edges.trace_contours();
    let stats = contour_stats(traced.contours());
    let contour_count = traced.contours().len();
    let contour_tracing = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::ContourTracing {
            contour_count,
            outer_count: stats.outer,
            hole_count: stats.hole,
            total_point_count: stats.total,
            min_contour_points: stats.min,
            max_contour_points: stats.max,
            mean_contour_points: stats.mean,
        },
    };

    let start = Instant::now();
    let extracted = traced.extract();
    let before = extracted.candidates().len();
    let extraction = StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Extraction {
            stats: extracted.stats(),
        },
    };

    let start = Instant::now();
    let suppressed = extracted.suppress();
    let suppression = suppressed.applied().then(|| StageDiagnostics {
        duration: start.elapsed(),
        metrics: StageMetrics::Suppression {
            before,
            after: suppressed.candidates().len(),
        },
    });

    let result = suppressed.into_result();
    let diagnostics = PipelineDiagnostics {
        decode,
        resize,
        blur,
        grayscale,
        threshold,
        edge_detection,
        contour_tracing,
        extraction,
        suppression,
        total_duration: total_start.elapsed(),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count,
            contour_count,
            candidate_count: result.candidates.len(),
        },
    };
    Ok((result, diagnostics))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Working image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![
            ("Decode", &self.decode),
            ("Resize", &self.resize),
            ("Blur", &self.blur),
            ("Grayscale", &self.grayscale),
            ("Threshold", &self.threshold),
            ("Edge Detection", &self.edge_detection),
            ("Contour Tracing", &self.contour_tracing),
            ("Extraction", &self.extraction),
        ];
        if let Some(ref s) = self.suppression {
            stages.push(("Suppression", s));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contours: {}  |  Candidates: {}",
            self.summary.contour_count, self.summary.candidate_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Resize {
            width,
            height,
            filter,
        } => format!("{width}x{height} ({filter})"),
        StageMetrics::Blur { filter } => filter.clone(),
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Threshold {
            median,
            regime,
            low,
            high,
        } => format!("median={median:.1} ({regime}) low={low} high={high}"),
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "low={low_threshold:.1} high={high_threshold:.1} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
        StageMetrics::ContourTracing {
            contour_count,
            outer_count,
            hole_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
            mean_contour_points,
        } => format!(
            "{contour_count} contours ({outer_count} outer, {hole_count} hole), {total_point_count} pts (min={min_contour_points} max={max_contour_points} mean={mean_contour_points:.1})",
        ),
        StageMetrics::Extraction { stats } => format!(
            "{} accepted, rejected: {} vertices, {} degenerate, {} fit, {} score",
            stats.accepted,
            stats.too_few_vertices,
            stats.degenerate,
            stats.fit_failed,
            stats.score_out_of_band,
        ),
        StageMetrics::Suppression { before, after } => {
            format!("{before} -> {after} candidates")
        }
    }
}

/// Statistics for a set of contours.
struct ContourStats {
    total: usize,
    min: usize,
    max: usize,
    mean: f64,
    outer: usize,
    hole: usize,
}

fn contour_stats(contours: &[Contour]) -> ContourStats {
    let total: usize = contours.iter().map(Contour::len).sum();
    let min = contours.iter().map(Contour::len).min().unwrap_or(0);
    let max = contours.iter().map(Contour::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if contours.is_empty() {
        0.0
    } else {
        total as f64 / contours.len() as f64
    };
    let outer = contours
        .iter()
        .filter(|c| c.kind == BorderKind::Outer)
        .count();
    ContourStats {
        total,
        min,
        max,
        mean,
        outer,
        hole: contours.len() - outer,
    }
}
