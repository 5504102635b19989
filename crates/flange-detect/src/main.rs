//! flange-detect: locate flange bores in a photograph.
//!
//! Runs the detection pipeline on an image file and prints the ranked
//! ellipse candidates. Optionally writes an `original | edges | contoured`
//! composite with the fitted ellipses drawn in red, and prints per-stage
//! diagnostics for parameter tuning.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin flange-detect -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=flange_pipeline=debug` to see why individual contours
//! were rejected.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod overlay;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use flange_pipeline::{
    BlurKind, DetectionResult, Dimensions, EllipseCandidate, ExtractorConfig, PipelineConfig,
    PipelineDiagnostics, ResizeFilter, StagedResult, ThresholdPair,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Locate circular bores in a photograph of a flange.
///
/// Prints the ranked ellipse candidates (largest first) in working-image
/// pixel coordinates.
#[derive(Parser)]
#[command(name = "flange-detect", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Threshold sensitivity around the median intensity.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SENSITIVITY)]
    sensitivity: f64,

    /// Exclusive lower bound of the accepted fit score (percent).
    #[arg(long, default_value_t = ExtractorConfig::DEFAULT_FIT_SCORE_MIN)]
    fit_min: f64,

    /// Exclusive upper bound of the accepted fit score (percent).
    #[arg(long, default_value_t = ExtractorConfig::DEFAULT_FIT_SCORE_MAX)]
    fit_max: f64,

    /// Polygon approximation tolerance as a fraction of contour length.
    #[arg(long, default_value_t = ExtractorConfig::DEFAULT_APPROX_EPSILON_FACTOR)]
    approx_factor: f64,

    /// A polygon must have more vertices than this to be fitted.
    #[arg(long, default_value_t = ExtractorConfig::DEFAULT_MIN_POLYGON_VERTICES)]
    min_vertices: usize,

    /// Approximate contours as closed polygons.
    #[arg(long)]
    approx_closed: bool,

    /// Working width in pixels; aspect ratio is preserved.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RESIZE_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    resize_width: u32,

    /// Resize filter (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resize_filter: Filter,

    /// Median blur kernel size (odd).
    #[arg(long, default_value_t = BlurKind::DEFAULT_MEDIAN_KERNEL)]
    blur_kernel: u32,

    /// Use a Gaussian blur with this sigma instead of the median blur.
    #[arg(long, value_name = "SIGMA")]
    gaussian_sigma: Option<f32>,

    /// Keep only the largest of a group of concentric candidates.
    #[arg(long)]
    suppress_nested: bool,

    /// Full pipeline config as a JSON file.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    #[arg(long, value_name = "FILE", conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Print the result as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Write the `original | edges | contoured` composite to this path.
    #[arg(long, value_name = "PATH")]
    overlay: Option<PathBuf>,

    /// Print per-stage timing and count diagnostics.
    #[arg(long)]
    diagnostics: bool,
}

/// Resize filter selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`ResizeFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: ResizeFilter) -> Filter {
    match f {
        ResizeFilter::Nearest => Filter::Nearest,
        ResizeFilter::Triangle => Filter::Triangle,
        ResizeFilter::CatmullRom => Filter::CatmullRom,
        ResizeFilter::Gaussian => Filter::Gaussian,
        ResizeFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`PipelineConfig::DEFAULT_RESIZE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_RESIZE_FILTER);

impl From<Filter> for ResizeFilter {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config` and `--config-json` replace the individual parameter flags
/// entirely. The result is validated either way.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading config {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing config {}: {e}", path.display()))?
    } else if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            resize_width: cli.resize_width,
            resize_filter: cli.resize_filter.into(),
            blur: cli.gaussian_sigma.map_or(
                BlurKind::Median {
                    kernel_size: cli.blur_kernel,
                },
                |sigma| BlurKind::Gaussian { sigma },
            ),
            sensitivity: cli.sensitivity,
            extractor: ExtractorConfig {
                fit_score_min: cli.fit_min,
                fit_score_max: cli.fit_max,
                approx_epsilon_factor: cli.approx_factor,
                min_polygon_vertices: cli.min_vertices,
                approx_closed: cli.approx_closed,
                ..ExtractorConfig::default()
            },
            suppress_nested: cli.suppress_nested,
            ..PipelineConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// JSON output shape: the detection result plus optional diagnostics.
#[derive(Serialize)]
struct Report<'a> {
    candidates: &'a [EllipseCandidate],
    thresholds: ThresholdPair,
    dimensions: Dimensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<&'a PipelineDiagnostics>,
}

impl<'a> Report<'a> {
    fn new(result: &'a DetectionResult, diagnostics: Option<&'a PipelineDiagnostics>) -> Self {
        Self {
            candidates: result.candidates.as_slice(),
            thresholds: result.thresholds,
            dimensions: result.dimensions,
            diagnostics,
        }
    }
}

/// Format candidates as a fixed-width table.
fn candidate_table(result: &DetectionResult) -> String {
    let mut lines = Vec::with_capacity(result.candidates.len() + 3);
    lines.push(format!(
        "Working image: {}x{}  thresholds: low={} high={}",
        result.dimensions.width,
        result.dimensions.height,
        result.thresholds.low,
        result.thresholds.high,
    ));
    lines.push(format!(
        "{:>4} {:>9} {:>9} {:>9} {:>9} {:>8} {:>7} {:>11}",
        "#", "center_x", "center_y", "major", "minor", "angle", "score", "area"
    ));
    lines.push("-".repeat(72));
    for (rank, c) in result.candidates.iter().enumerate() {
        let e = &c.ellipse;
        lines.push(format!(
            "{:>4} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>7.1}° {:>7.1} {:>11.1}",
            rank + 1,
            e.center.x,
            e.center.y,
            e.major_axis,
            e.minor_axis,
            e.angle_degrees(),
            c.fit_score,
            c.area,
        ));
    }
    if result.candidates.is_empty() {
        lines.push("(no candidates)".to_string());
    }
    lines.join("\n")
}

/// Render and save the composite overlay.
///
/// Saved as RGB so lossy formats without alpha (JPEG) work too.
fn write_overlay(path: &Path, staged: &StagedResult) -> Result<(), String> {
    let composite = overlay::composite(&staged.resized, &staged.edges, &staged.candidates);
    image::DynamicImage::ImageRgba8(composite)
        .to_rgb8()
        .save(path)
        .map_err(|e| format!("Error writing overlay to {}: {e}", path.display()))
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );

    let (staged, diagnostics) =
        match flange_pipeline::process_with_diagnostics(&image_bytes, &config) {
            Ok(out) => out,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

    if let Some(ref overlay_path) = cli.overlay {
        if let Err(msg) = write_overlay(overlay_path, &staged) {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
        eprintln!("Overlay written to {}", overlay_path.display());
    }

    let result = staged.into_detection();

    if cli.json {
        let report = Report::new(&result, cli.diagnostics.then_some(&diagnostics));
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing result: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", candidate_table(&result));
        if cli.diagnostics {
            println!();
            println!("{}", diagnostics.report());
        }
    }

    ExitCode::SUCCESS
}
