//! Post-processing of ranked candidates.
//!
//! A flange bore usually produces several concentric candidates: the
//! outer and hole borders of the same edge ring, chamfer edges, bolt
//! circles seen through the bore. When only the dominant bore matters,
//! [`suppress_nested`] keeps the largest candidate and drops the ones
//! centered near it.

use crate::types::EllipseCandidate;

/// Keep the first (largest) candidate and drop later ones centered near it.
///
/// A later candidate is dropped when its center lies strictly inside the
/// axis-aligned square of half-width `max(major_axis, minor_axis)` around
/// the first candidate's center. Candidates outside that square are kept
/// in their original order.
///
/// Expects `candidates` ranked largest first, as the extractor returns
/// them.
#[must_use = "returns the filtered candidates"]
pub fn suppress_nested(candidates: &[EllipseCandidate]) -> Vec<EllipseCandidate> {
    let Some((largest, rest)) = candidates.split_first() else {
        return Vec::new();
    };

    let center = largest.ellipse.center;
    let half_width = largest.ellipse.major_axis.max(largest.ellipse.minor_axis);

    std::iter::once(*largest)
        .chain(rest.iter().copied().filter(|c| {
            let dx = (c.ellipse.center.x - center.x).abs();
            let dy = (c.ellipse.center.y - center.y).abs();
            !(dx < half_width && dy < half_width)
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipse::Ellipse;
    use crate::types::Point;

    fn candidate(x: f64, y: f64, major: f64, minor: f64, index: usize) -> EllipseCandidate {
        EllipseCandidate::new(Ellipse::new(Point::new(x, y), major, minor, 0.0), 100.0, index)
    }

    fn indices(candidates: &[EllipseCandidate]) -> Vec<usize> {
        candidates.iter().map(|c| c.contour_index).collect()
    }

    #[test]
    fn empty_input() {
        assert!(suppress_nested(&[]).is_empty());
    }

    #[test]
    fn single_candidate_is_kept() {
        let only = [candidate(10.0, 10.0, 5.0, 4.0, 0)];
        assert_eq!(suppress_nested(&only), only.to_vec());
    }

    #[test]
    fn concentric_candidates_are_dropped() {
        let ranked = [
            candidate(100.0, 100.0, 80.0, 60.0, 0),
            candidate(101.0, 99.0, 70.0, 50.0, 1),
            candidate(100.0, 100.0, 20.0, 20.0, 2),
        ];
        assert_eq!(indices(&suppress_nested(&ranked)), vec![0]);
    }

    #[test]
    fn distant_candidates_survive_in_order() {
        let ranked = [
            candidate(100.0, 100.0, 40.0, 30.0, 0),
            candidate(300.0, 100.0, 30.0, 30.0, 1),
            candidate(110.0, 110.0, 10.0, 10.0, 2),
            candidate(100.0, 300.0, 20.0, 10.0, 3),
        ];
        assert_eq!(indices(&suppress_nested(&ranked)), vec![0, 1, 3]);
    }

    #[test]
    fn square_boundary_is_exclusive() {
        // Half-width is the major axis: 40.
        let ranked = [
            candidate(100.0, 100.0, 40.0, 30.0, 0),
            candidate(140.0, 100.0, 10.0, 10.0, 1),
            candidate(139.0, 139.0, 10.0, 10.0, 2),
            candidate(60.0, 100.0, 10.0, 10.0, 3),
        ];
        assert_eq!(indices(&suppress_nested(&ranked)), vec![0, 1, 3]);
    }
}
