//! Polygon simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Reduces point count in traced contour rings by removing points that
//! are within a given tolerance of the chord between their neighbors.
//! The enclosed shape is preserved to within `epsilon`.
//!
//! Applied between contour tracing and segmentation assembly, with the
//! tolerance typically scaled from a fraction of the ring perimeter.

use crate::types::{Point, Polygon};

/// Simplify a polygon ring with the Ramer-Douglas-Peucker algorithm.
///
/// Points within `epsilon` of the chord between the surviving
/// endpoints are removed. Rings of 3 or fewer points, and any call
/// with `epsilon <= 0`, are returned unchanged. Simplification is
/// idempotent: re-simplifying with the same `epsilon` is a no-op.
#[must_use = "returns the simplified polygon"]
pub fn simplify(polygon: &Polygon, epsilon: f64) -> Polygon {
    let points = polygon.points();
    if points.len() <= 3 || epsilon <= 0.0 {
        return polygon.clone();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, epsilon, &mut kept);

    Polygon::new(
        points
            .iter()
            .zip(&kept)
            .filter(|&(_, keep)| *keep)
            .map(|(&p, _)| p)
            .collect(),
    )
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// chord between them. If that distance exceeds `epsilon`, the point is
/// kept and both halves are processed recursively; otherwise the whole
/// span collapses to its endpoints.
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

/// Perpendicular distance from point `p` to the line through `a` and `b`.
///
/// Uses `|cross(b - a, p - a)| / |b - a|`. When `a` and `b` coincide,
/// falls back to the distance from `p` to `a`.
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
