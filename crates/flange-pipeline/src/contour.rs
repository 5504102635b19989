//! Contour tracing: extract connected boundaries from a binary edge map.
//!
//! The [`ContourTracer`] trait keeps the tracing algorithm pluggable and
//! [`ContourTracerKind`] selects one at runtime from configuration.
//!
//! Tracers return every boundary they find, including very short ones,
//! together with the nesting hierarchy. Deciding which contours are worth
//! fitting is the extractor's job.

use image::GrayImage;
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::types::{BorderKind, Contour, Point};

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// A one-pixel-wide closed edge ring yields two borders: the outer
    /// border of the ring and the border of the hole it encloses.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary edge map (non-zero pixels are edges).
/// Output: all traced boundaries in discovery order. A contour's
/// `parent` indexes into the same returned vector.
pub trait ContourTracer {
    /// Trace contours in the given binary edge map.
    fn trace(&self, edges: &GrayImage) -> Vec<Contour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, edges: &GrayImage) -> Vec<Contour> {
        match *self {
            Self::BorderFollowing => trace_border_following(edges),
        }
    }
}

fn trace_border_following(edges: &GrayImage) -> Vec<Contour> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(edges);

    contours
        .into_iter()
        .map(|c| {
            let kind = match c.border_type {
                BorderType::Outer => BorderKind::Outer,
                BorderType::Hole => BorderKind::Hole,
            };
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Contour::new(points, c.parent, kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn square_ring(size: u32, lo: u32, hi: u32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for i in lo..=hi {
            img.put_pixel(i, lo, Luma([255]));
            img.put_pixel(i, hi, Luma([255]));
            img.put_pixel(lo, i, Luma([255]));
            img.put_pixel(hi, i, Luma([255]));
        }
        img
    }

    #[test]
    fn default_is_border_following() {
        assert_eq!(
            ContourTracerKind::default(),
            ContourTracerKind::BorderFollowing
        );
    }

    #[test]
    fn empty_image_produces_no_contours() {
        let img = GrayImage::new(10, 10);
        assert!(ContourTracerKind::BorderFollowing.trace(&img).is_empty());
    }

    #[test]
    fn single_pixel_is_kept() {
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(5, 5, Luma([255]));
        let result = ContourTracerKind::BorderFollowing.trace(&img);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 1);
        assert_eq!(result[0].points()[0], Point::new(5.0, 5.0));
        assert_eq!(result[0].kind, BorderKind::Outer);
    }

    #[test]
    fn ring_produces_outer_and_hole() {
        let img = square_ring(20, 4, 15);
        let result = ContourTracerKind::BorderFollowing.trace(&img);
        assert_eq!(result.len(), 2, "got {result:?}");

        let outer = result
            .iter()
            .position(|c| c.kind == BorderKind::Outer)
            .unwrap_or(usize::MAX);
        let hole = result
            .iter()
            .find(|c| c.kind == BorderKind::Hole)
            .map(|c| c.parent);
        assert!(outer < result.len());
        assert_eq!(hole, Some(Some(outer)));
    }

    #[test]
    fn points_stay_inside_image() {
        let img = square_ring(12, 0, 11);
        for contour in ContourTracerKind::BorderFollowing.trace(&img) {
            for p in contour.points() {
                assert!(p.x >= 0.0 && p.x < 12.0);
                assert!(p.y >= 0.0 && p.y < 12.0);
            }
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ContourTracerKind::BorderFollowing).ok();
        assert_eq!(json.as_deref(), Some("\"border_following\""));
    }
}
