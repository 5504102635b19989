//! Ellipse geometry: parameters, perimeter, and boundary sampling.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Geometric ellipse parameters.
///
/// Axes are full lengths (diameters), matching the bounding-box style
/// most vision tooling reports. Use [`semi_major`](Self::semi_major) and
/// [`semi_minor`](Self::semi_minor) for radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Center in image coordinates.
    pub center: Point,
    /// Full length of the major axis in pixels.
    pub major_axis: f64,
    /// Full length of the minor axis in pixels.
    pub minor_axis: f64,
    /// Rotation of the major axis from +x, in radians, in `(-π/2, π/2]`.
    pub angle: f64,
}

impl Ellipse {
    /// Create an ellipse from full axis lengths.
    ///
    /// The axes are swapped (and the angle turned by 90°) if needed so
    /// that `major_axis >= minor_axis`. The angle is normalized to
    /// `(-π/2, π/2]`.
    #[must_use]
    pub fn new(center: Point, axis_a: f64, axis_b: f64, angle: f64) -> Self {
        let (major_axis, minor_axis, angle) = if axis_a >= axis_b {
            (axis_a, axis_b, angle)
        } else {
            (axis_b, axis_a, angle + FRAC_PI_2)
        };
        Self {
            center,
            major_axis,
            minor_axis,
            angle: normalize_angle(angle),
        }
    }

    /// Half the major axis.
    #[must_use]
    pub fn semi_major(&self) -> f64 {
        self.major_axis / 2.0
    }

    /// Half the minor axis.
    #[must_use]
    pub fn semi_minor(&self) -> f64 {
        self.minor_axis / 2.0
    }

    /// Rotation in degrees.
    #[must_use]
    pub fn angle_degrees(&self) -> f64 {
        self.angle.to_degrees()
    }

    /// Positive, finite axes and a finite center and angle.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.major_axis > 0.0
            && self.minor_axis > 0.0
            && self.major_axis.is_finite()
            && self.minor_axis.is_finite()
            && self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.angle.is_finite()
    }

    /// Perimeter by Ramanujan's second approximation.
    ///
    /// `π (a + b) (1 + 3h / (10 + √(4 − 3h)))` with `h = ((a − b) / (a + b))²`
    /// over the semi-axes. Exact for circles; the relative error stays
    /// below 1e-4 until the axis ratio exceeds about 1:20.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let a = self.semi_major();
        let b = self.semi_minor();
        let sum = a + b;
        if sum <= 0.0 {
            return 0.0;
        }
        let h = ((a - b) / sum).powi(2);
        PI * sum * (1.0 + 3.0 * h / (10.0 + 3.0_f64.mul_add(-h, 4.0).sqrt()))
    }

    /// Sample `n` evenly spaced (in the parametric angle) boundary points.
    #[must_use]
    pub fn sample_points(&self, n: usize) -> Vec<Point> {
        let (sin_r, cos_r) = self.angle.sin_cos();
        let a = self.semi_major();
        let b = self.semi_minor();
        #[allow(clippy::cast_precision_loss)]
        let step = 2.0 * PI / n as f64;
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let (sin_t, cos_t) = (step * i as f64).sin_cos();
                let px = a * cos_t;
                let py = b * sin_t;
                Point::new(
                    self.center.x + cos_r.mul_add(px, -(sin_r * py)),
                    self.center.y + sin_r.mul_add(px, cos_r * py),
                )
            })
            .collect()
    }
}

/// Normalize an angle to `(-π/2, π/2]`.
fn normalize_angle(mut angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    angle %= PI;
    if angle > FRAC_PI_2 {
        angle -= PI;
    } else if angle <= -FRAC_PI_2 {
        angle += PI;
    }
    angle
}
