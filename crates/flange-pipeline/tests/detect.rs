//! Integration test: run synthetic flange photographs through the full
//! pipeline and check the ranked candidates.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use flange_pipeline::{DetectionResult, PipelineConfig, Point};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

const BACKGROUND: Rgba<u8> = Rgba([230, 230, 230, 255]);
const INK: Rgba<u8> = Rgba([20, 20, 20, 255]);

fn encode_png(img: &RgbaImage) -> Vec<u8> {
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

/// Draw a dark ring, 6 px thick, with inner radius `radius`.
fn draw_ring(img: &mut RgbaImage, center: (i32, i32), radius: i32) {
    for r in radius..radius + 6 {
        draw_hollow_circle_mut(img, center, r, INK);
    }
}

/// Process at native width so candidate coordinates match the drawing.
fn detect(img: &RgbaImage) -> DetectionResult {
    let config = PipelineConfig {
        resize_width: img.width(),
        ..PipelineConfig::default()
    };
    flange_pipeline::process(&encode_png(img), &config).expect("pipeline should succeed")
}

fn near(p: Point, x: f64, y: f64, tolerance: f64) -> bool {
    (p.x - x).abs() <= tolerance && (p.y - y).abs() <= tolerance
}

#[test]
fn single_ring_is_located() {
    let mut img = RgbaImage::from_pixel(200, 200, BACKGROUND);
    draw_ring(&mut img, (100, 100), 50);

    let result = detect(&img);
    eprintln!("{} candidates, thresholds {:?}", result.candidates.len(), result.thresholds);
    assert!(!result.candidates.is_empty(), "expected the ring to be found");

    let best = result.candidates[0];
    assert!(
        near(best.ellipse.center, 100.0, 100.0, 3.0),
        "center {:?} too far from (100, 100)",
        best.ellipse.center,
    );
    // Inner edge diameter is about 100 px, outer about 112 px.
    assert!(
        (90.0..=125.0).contains(&best.ellipse.major_axis),
        "major axis {} out of range",
        best.ellipse.major_axis,
    );
    assert!(best.ellipse.minor_axis / best.ellipse.major_axis > 0.9);
    assert!(best.fit_score > 50.0 && best.fit_score < 150.0);
}

#[test]
fn filled_square_yields_no_candidate() {
    let mut img = RgbaImage::from_pixel(200, 200, BACKGROUND);
    draw_filled_rect_mut(&mut img, Rect::at(60, 60).of_size(80, 80), INK);

    let result = detect(&img);
    assert!(
        result.candidates.is_empty(),
        "square produced candidates: {:?}",
        result.candidates,
    );
}

#[test]
fn uniform_image_yields_no_candidate() {
    let img = RgbaImage::from_pixel(120, 80, BACKGROUND);
    let result = detect(&img);
    assert!(result.candidates.is_empty());
    assert_eq!(result.dimensions.width, 120);
    assert_eq!(result.dimensions.height, 80);
}

#[test]
fn larger_bore_ranks_first() {
    let mut img = RgbaImage::from_pixel(320, 200, BACKGROUND);
    draw_ring(&mut img, (70, 100), 25);
    draw_ring(&mut img, (210, 100), 60);

    let result = detect(&img);
    assert!(!result.candidates.is_empty());
    assert!(
        result
            .candidates
            .windows(2)
            .all(|pair| pair[0].area >= pair[1].area),
        "candidates not ordered by area",
    );
    assert!(
        near(result.candidates[0].ellipse.center, 210.0, 100.0, 3.0),
        "largest candidate at {:?}, expected the large ring",
        result.candidates[0].ellipse.center,
    );
}

#[test]
fn nested_suppression_keeps_one_per_bore() {
    let mut img = RgbaImage::from_pixel(200, 200, BACKGROUND);
    draw_ring(&mut img, (100, 100), 50);

    let config = PipelineConfig {
        resize_width: 200,
        suppress_nested: true,
        ..PipelineConfig::default()
    };
    let result = flange_pipeline::process(&encode_png(&img), &config).unwrap();
    assert_eq!(result.candidates.len(), 1);
    assert!(near(result.candidates[0].ellipse.center, 100.0, 100.0, 3.0));
}

#[test]
fn detection_result_serializes_to_json() {
    let mut img = RgbaImage::from_pixel(200, 200, BACKGROUND);
    draw_ring(&mut img, (100, 100), 50);

    let result = detect(&img);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(
        json["candidates"].as_array().map(Vec::len),
        Some(result.candidates.len())
    );
    assert_eq!(json["dimensions"]["width"], 200);
    assert_eq!(
        json["thresholds"]["high"],
        u64::from(result.thresholds.high)
    );
    let first = &json["candidates"][0];
    assert!(first["ellipse"]["center"]["x"].is_f64());
    assert!(first["fit_score"].is_f64());
    assert!(first["contour_index"].is_u64());
}
