//! Polygon approximation using the Ramer-Douglas-Peucker algorithm.
//!
//! The extractor uses the vertex count of the approximation as a cheap
//! curvature test: a smooth closed curve needs many vertices to stay
//! within a small tolerance, a polygon with a handful of straight sides
//! does not.

use crate::types::Point;

/// Approximate `points` by a polygon whose vertices are a subset of them.
///
/// Every dropped point lies within `epsilon` pixels of the approximating
/// segment. An `epsilon` of 0.0 keeps every point that is not exactly on
/// a straight run.
///
/// With `closed == false` the path is open and both endpoints are always
/// kept. With `closed == true` the last point connects back to the first;
/// the path is split at the point farthest from the start and each half
/// is simplified on its own, and the returned vertices do not repeat the
/// start.
///
/// Paths with fewer than 3 points are returned unchanged.
#[must_use = "returns the approximating polygon"]
pub fn approximate_polygon(points: &[Point], epsilon: f64, closed: bool) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;

    if closed {
        let start = points[0];
        let far = points
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, a), (_, b)| {
                a.distance_squared(start)
                    .total_cmp(&b.distance_squared(start))
            })
            .map_or(points.len() - 1, |(i, _)| i);
        kept[far] = true;
        rdp_recurse(points, 0, far, epsilon, &mut kept);

        // Second half runs far..=last and then wraps back to the start.
        let mut tail: Vec<Point> = points[far..].to_vec();
        tail.push(start);
        let mut tail_kept = vec![false; tail.len()];
        let tail_end = tail.len() - 1;
        rdp_recurse(&tail, 0, tail_end, epsilon, &mut tail_kept);
        for (offset, &k) in tail_kept.iter().enumerate().take(tail_end).skip(1) {
            if k {
                kept[far + offset] = true;
            }
        }
    } else {
        let last = points.len() - 1;
        kept[last] = true;
        rdp_recurse(points, 0, last, epsilon, &mut kept);
    }

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` farthest from the segment
/// joining them. If that distance exceeds `epsilon`, the point is kept and
/// both halves are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, epsilon: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > epsilon {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, epsilon, kept);
        rdp_recurse(points, max_idx, end, epsilon, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
///
/// When `a` and `b` coincide this is the distance from `p` to `a`, which
/// matters for closed paths whose ends meet.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
