//! Direct least-squares ellipse fitting (Fitzgibbon, Pilu & Fisher, 1999).
//!
//! Fits the conic `A x² + B xy + C y² + D x + E y + F = 0` minimizing the
//! algebraic distance under the constraint `4AC − B² = 1`, which forces
//! the result to be an ellipse. The scatter matrix is split into
//! quadratic and linear blocks (Halíř & Flusser) so only a 3×3
//! generalized eigenproblem remains.
//!
//! Points are shifted to their centroid and scaled to unit mean radius
//! before fitting; the resulting ellipse is mapped back afterwards.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};

use crate::ellipse::Ellipse;
use crate::types::{ExtractorConfig, Point};

/// Why an ellipse could not be fitted to a point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FitError {
    /// Fewer points than the five a conic needs.
    #[error("too few points for an ellipse fit: need {needed}, got {got}")]
    TooFewPoints {
        /// Minimum point count.
        needed: usize,
        /// Points supplied.
        got: usize,
    },

    /// The scatter matrix could not be inverted (e.g. collinear points).
    #[error("singular scatter matrix")]
    Singular,

    /// The best conic is not a real, bounded ellipse.
    #[error("fitted conic is not an ellipse")]
    NotAnEllipse,
}

/// Fit the least-squares ellipse to `points`.
///
/// # Errors
///
/// Returns [`FitError::TooFewPoints`] for fewer than
/// [`ExtractorConfig::MIN_ELLIPSE_FIT_POINTS`] points,
/// [`FitError::Singular`] for degenerate layouts such as collinear
/// points, and [`FitError::NotAnEllipse`] when no eigenvector yields a
/// bounded ellipse.
pub fn fit_ellipse(points: &[Point]) -> Result<Ellipse, FitError> {
    let needed = ExtractorConfig::MIN_ELLIPSE_FIT_POINTS;
    if points.len() < needed {
        return Err(FitError::TooFewPoints {
            needed,
            got: points.len(),
        });
    }

    let (centroid, scale) = normalization(points);

    // Scatter matrix S = DᵀD over design rows [x², xy, y², x, y, 1].
    let mut scatter = Matrix6::<f64>::zeros();
    for p in points {
        let x = (p.x - centroid.x) * scale;
        let y = (p.y - centroid.y) * scale;
        let row = Vector6::new(x * x, x * y, y * y, x, y, 1.0);
        scatter += row * row.transpose();
    }

    let s1 = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s2 = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s3 = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // Collinear input leaves the linear block singular up to roundoff.
    if s3.determinant().abs() <= 1e-12 * s3.norm().powi(3) {
        return Err(FitError::Singular);
    }
    let s3_inv = s3.try_inverse().ok_or(FitError::Singular)?;
    let reduce = -(s3_inv * s2.transpose());
    let reduced = s1 + s2 * reduce;

    // C1⁻¹ for the constraint matrix [[0, 0, 2], [0, -1, 0], [2, 0, 0]].
    let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);
    let system = c1_inv * reduced;

    let quadratic = constrained_eigenvector(&system).ok_or(FitError::NotAnEllipse)?;
    let linear = reduce * quadratic;

    let conic = [
        quadratic[0],
        quadratic[1],
        quadratic[2],
        linear[0],
        linear[1],
        linear[2],
    ];
    let normalized = conic_to_ellipse(conic).ok_or(FitError::NotAnEllipse)?;

    let ellipse = Ellipse::new(
        Point::new(
            normalized.center.x / scale + centroid.x,
            normalized.center.y / scale + centroid.y,
        ),
        normalized.major_axis / scale,
        normalized.minor_axis / scale,
        normalized.angle,
    );
    if ellipse.is_valid() {
        Ok(ellipse)
    } else {
        Err(FitError::NotAnEllipse)
    }
}

/// Centroid and the scale that brings the mean distance from it to √2.
#[allow(clippy::cast_precision_loss)]
fn normalization(points: &[Point]) -> (Point, f64) {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let centroid = Point::new(cx, cy);

    let mean_dist = points.iter().map(|p| p.distance(centroid)).sum::<f64>() / n;
    let scale = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (centroid, scale)
}

/// Eigenvector of `system` that satisfies the ellipse constraint
/// `4 a₀ a₂ − a₁² > 0`.
///
/// `system` is C1⁻¹M, which is not symmetric, so the eigenvalues come
/// from its characteristic cubic and each eigenvector from the null space
/// of `system − λI`. When several qualify, the one with the smallest
/// `|λ|` (smallest algebraic residual) wins.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let trace = system.trace();
    let minors = system[(0, 0)] * system[(1, 1)] - system[(0, 1)] * system[(1, 0)]
        + system[(0, 0)] * system[(2, 2)]
        - system[(0, 2)] * system[(2, 0)]
        + system[(1, 1)] * system[(2, 2)]
        - system[(1, 2)] * system[(2, 1)];
    let det = system.determinant();

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for lambda in cubic_roots(-trace, minors, -det) {
        let shifted = system - Matrix3::identity() * lambda;
        let Some(v) = null_vector(&shifted) else {
            continue;
        };
        let constraint = (4.0 * v[0]).mul_add(v[2], -(v[1] * v[1]));
        if constraint <= 0.0 {
            continue;
        }
        if best.as_ref().is_none_or(|(l, _)| lambda.abs() < *l) {
            best = Some((lambda.abs(), v));
        }
    }
    best.map(|(_, v)| v)
}

/// Unit null vector of a rank-2 3×3 matrix.
///
/// Every row is orthogonal to the null vector, so the cross product of
/// any two independent rows spans it. The largest of the three cross
/// products is the best conditioned.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let r0: Vector3<f64> = m.row(0).transpose();
    let r1: Vector3<f64> = m.row(1).transpose();
    let r2: Vector3<f64> = m.row(2).transpose();
    let candidates = [r1.cross(&r2), r0.cross(&r2), r0.cross(&r1)];

    let best = candidates
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let norm = best.norm();
    if norm < 1e-15 || !norm.is_finite() {
        return None;
    }
    Some(best / norm)
}

/// Real roots of the monic cubic `x³ + b x² + c x + d`.
fn cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    // Depressed form t³ + p t + q with x = t − b/3.
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;
    let discriminant = -4.0 * p * p * p - 27.0 * q * q;

    if discriminant >= 0.0 {
        let r = (-p / 3.0).max(0.0).sqrt();
        if r < 1e-300 {
            return vec![shift];
        }
        let theta = (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0).acos();
        let tau = 2.0 * std::f64::consts::PI;
        (0..3)
            .map(|k| 2.0 * r * (f64::from(k).mul_add(tau, theta) / 3.0).cos() + shift)
            .collect()
    } else {
        let root = (q * q / 4.0 + p * p * p / 27.0).sqrt();
        let u = (-q / 2.0 + root).cbrt();
        let v = (-q / 2.0 - root).cbrt();
        vec![u + v + shift]
    }
}

/// Geometric parameters of the conic `[A, B, C, D, E, F]`, if it is a
/// real ellipse.
fn conic_to_ellipse([a, b, c, d, e, f]: [f64; 6]) -> Option<Ellipse> {
    let denom = 4.0 * a * c - b * b;
    if denom <= 0.0 {
        return None;
    }

    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    // Conic value at the center; the ellipse is x'ᵀQx' = −f0 there.
    let f0 = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;

    let sum = a + c;
    let diff = (a - c).hypot(b);
    let lambda_major_dir = (sum + diff) / 2.0;
    let lambda_other = (sum - diff) / 2.0;

    let along = -f0 / lambda_major_dir;
    let across = -f0 / lambda_other;
    if !(along > 0.0 && across > 0.0) {
        return None;
    }

    // Direction of the eigenvector belonging to the larger eigenvalue.
    let angle = 0.5 * b.atan2(a - c);
    Some(Ellipse::new(
        Point::new(cx, cy),
        2.0 * along.sqrt(),
        2.0 * across.sqrt(),
        angle,
    ))
}
