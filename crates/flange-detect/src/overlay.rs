//! Overlay rendering: fitted ellipses drawn over the edge map, and the
//! side-by-side `original | edges | contoured` composite.

use flange_pipeline::{EllipseCandidate, GrayImage};
use image::{Rgba, RgbaImage};
use tiny_skia::{Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Stroke width of drawn ellipses, in working-image pixels.
pub const STROKE_WIDTH: f32 = 2.0;

/// Stroke color of drawn ellipses.
pub const STROKE_COLOR: [u8; 3] = [255, 0, 0];

/// Expand a single-channel edge map to opaque RGBA.
#[must_use]
pub fn edges_to_rgba(edges: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(edges.width(), edges.height(), |x, y| {
        let v = edges.get_pixel(x, y).0[0];
        Rgba([v, v, v, 255])
    })
}

/// Render candidate outlines as anti-aliased strokes on a transparent
/// background of the given size.
///
/// Ellipses that are invalid or too small to form a path are skipped.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn render_ellipses(candidates: &[EllipseCandidate], width: u32, height: u32) -> RgbaImage {
    let Some(mut pixmap) = Pixmap::new(width, height) else {
        return RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    };

    let stroke = Stroke {
        width: STROKE_WIDTH,
        ..Stroke::default()
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(STROKE_COLOR[0], STROKE_COLOR[1], STROKE_COLOR[2], 255);
    paint.anti_alias = true;

    for candidate in candidates {
        let ellipse = &candidate.ellipse;
        if !ellipse.is_valid() {
            continue;
        }
        let a = ellipse.semi_major() as f32;
        let b = ellipse.semi_minor() as f32;
        let Some(path) = Rect::from_xywh(-a, -b, 2.0 * a, 2.0 * b).and_then(PathBuilder::from_oval)
        else {
            continue;
        };
        // Rotation and translation keep the stroke width unscaled.
        let transform = Transform::from_rotate(ellipse.angle_degrees() as f32)
            .post_translate(ellipse.center.x as f32, ellipse.center.y as f32);
        pixmap.stroke_path(&path, &paint, &stroke, transform, None);
    }

    // Premultiplied RGBA to straight RGBA.
    let data = pixmap.data();
    let mut img = RgbaImage::new(width, height);
    for (i, pixel) in img.pixels_mut().enumerate() {
        let off = i * 4;
        let a = data[off + 3];
        if a == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            let r = u16::from(data[off]) * 255 / u16::from(a);
            let g = u16::from(data[off + 1]) * 255 / u16::from(a);
            let b = u16::from(data[off + 2]) * 255 / u16::from(a);
            *pixel = Rgba([r as u8, g as u8, b as u8, a]);
        }
    }
    img
}

/// Draw the candidates over `base`.
#[must_use]
pub fn draw_candidates(base: &RgbaImage, candidates: &[EllipseCandidate]) -> RgbaImage {
    let layer = render_ellipses(candidates, base.width(), base.height());
    let mut out = base.clone();
    image::imageops::overlay(&mut out, &layer, 0, 0);
    out
}

/// Place images left to right, top-aligned, on an opaque black canvas.
#[must_use]
pub fn hconcat(images: &[&RgbaImage]) -> RgbaImage {
    let width = images.iter().map(|img| img.width()).sum();
    let height = images.iter().map(|img| img.height()).max().unwrap_or(0);
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let mut x = 0_i64;
    for img in images {
        image::imageops::replace(&mut canvas, *img, x, 0);
        x += i64::from(img.width());
    }
    canvas
}

/// Build the `original | edges | contoured` composite.
///
/// `original` is the working-width image the candidates refer to; the
/// contoured panel is the edge map with the candidates drawn on top.
#[must_use]
pub fn composite(
    original: &RgbaImage,
    edges: &GrayImage,
    candidates: &[EllipseCandidate],
) -> RgbaImage {
    let edges = edges_to_rgba(edges);
    let contoured = draw_candidates(&edges, candidates);
    hconcat(&[original, &edges, &contoured])
}
