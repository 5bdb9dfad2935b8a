//! Polygon approximation using the Ramer-Douglas-Peucker algorithm.
//!
//! Contours are closed rings, so the open RDP recursion is applied to
//! the two chains between a pair of mutually distant ring vertices.
//! Splitting there guarantees both chains have well-separated
//! endpoints, which keeps the result independent of where the contour
//! tracer happened to start the ring.

use crate::types::Point;

/// Length of a ring including the closing segment from the last point
/// back to the first.
#[must_use]
pub fn closed_perimeter(ring: &[Point]) -> f64 {
    if ring.len() < 2 {
        return 0.0;
    }
    ring.iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(&a, &b)| a.distance(b))
        .sum()
}

/// Approximate a closed ring with fewer vertices.
///
/// Vertices within `epsilon` pixels of the chord between their retained
/// neighbours are dropped. The returned ring is not explicitly closed
/// (its first point is not repeated at the end) and follows the input
/// winding.
///
/// Rings with fewer than 3 points are returned unchanged. A ring whose
/// points all coincide collapses to a single point.
#[must_use = "returns the approximated ring"]
pub fn approximate_polygon(ring: &[Point], epsilon: f64) -> Vec<Point> {
    let n = ring.len();
    if n < 3 {
        return ring.to_vec();
    }

    // Two passes of "farthest from" settle on a pair of vertices that
    // are (nearly) a diameter of the ring.
    let b0 = farthest_from(ring, ring[0]);
    let a = farthest_from(ring, ring[b0]);
    let b = farthest_from(ring, ring[a]);
    if a == b {
        return vec![ring[a]];
    }

    let forward = cyclic_chain(ring, a, b);
    let backward = cyclic_chain(ring, b, a);

    let mut out = simplify_open(&forward, epsilon);
    let back = simplify_open(&backward, epsilon);
    // `back` starts at b (already the tail of `out`) and ends at a
    // (already the head).
    if back.len() > 2 {
        out.extend_from_slice(&back[1..back.len() - 1]);
    }
    out
}

/// Index of the first ring vertex farthest from `from`.
fn farthest_from(ring: &[Point], from: Point) -> usize {
    let mut best = 0;
    let mut best_dist = f64::NEG_INFINITY;
    for (i, &p) in ring.iter().enumerate() {
        let d = p.distance_squared(from);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Points from index `start` to `end` inclusive, walking forward and
/// wrapping past the end of the ring.
fn cyclic_chain(ring: &[Point], start: usize, end: usize) -> Vec<Point> {
    let n = ring.len();
    let len = (end + n - start) % n + 1;
    ring.iter().cycle().skip(start).take(len).copied().collect()
}

/// Open-polyline RDP: endpoints are always kept.
fn simplify_open(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
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

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
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
