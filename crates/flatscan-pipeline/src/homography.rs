//! Planar homography from four point correspondences.
//!
//! The 3x3 projective transform has eight degrees of freedom once
//! `h33` is fixed to 1, so four correspondences give an 8x8 linear
//! system that is solved directly by LU decomposition.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::types::{PipelineError, Point};

/// Relative tolerance for the collinearity test.
///
/// Three corners count as collinear when their doubled triangle area is
/// below this fraction of the squared longest pairwise distance.
pub const COLLINEARITY_TOLERANCE: f64 = 1e-6;

/// Minimum distance (in pixels) between any two corners.
pub const MIN_CORNER_SEPARATION: f64 = 1e-6;

/// Homogeneous coordinates with `|w|` at or below this project to
/// infinity and are treated as unmappable.
const W_EPSILON: f64 = 1e-12;

const CORNER_TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];

/// A projective transform together with its inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Homography {
    /// Solve for the transform mapping each `src[i]` onto `dst[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if any coordinate is
    /// not finite.
    ///
    /// Returns [`PipelineError::DegenerateGeometry`] if either point set
    /// has coincident or collinear corners, the linear system is
    /// singular, or the resulting matrix is not invertible.
    pub fn from_correspondences(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self, PipelineError> {
        if !src.iter().chain(dst).all(|p| p.is_finite()) {
            return Err(PipelineError::InvalidArgument(
                "corner coordinates must be finite".to_string(),
            ));
        }
        check_non_degenerate(src, "source")?;
        check_non_degenerate(dst, "destination")?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.iter().zip(dst).enumerate() {
            let rx = 2 * i;
            let ry = rx + 1;

            a[(rx, 0)] = s.x;
            a[(rx, 1)] = s.y;
            a[(rx, 2)] = 1.0;
            a[(rx, 6)] = -s.x * d.x;
            a[(rx, 7)] = -s.y * d.x;
            b[rx] = d.x;

            a[(ry, 3)] = s.x;
            a[(ry, 4)] = s.y;
            a[(ry, 5)] = 1.0;
            a[(ry, 6)] = -s.x * d.y;
            a[(ry, 7)] = -s.y * d.y;
            b[ry] = d.y;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            PipelineError::DegenerateGeometry("perspective system is singular".to_string())
        })?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::DegenerateGeometry(
                "perspective solution is not finite".to_string(),
            ));
        }

        let forward = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        Self::from_matrix(forward)
    }

    /// Wrap an existing forward matrix.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateGeometry`] if the matrix has
    /// non-finite entries or is not invertible.
    pub fn from_matrix(forward: Matrix3<f64>) -> Result<Self, PipelineError> {
        let inverse = forward
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or_else(|| {
                PipelineError::DegenerateGeometry("transform is not invertible".to_string())
            })?;
        Ok(Self { forward, inverse })
    }

    #[must_use]
    pub fn identity() -> Self {
        Self {
            forward: Matrix3::identity(),
            inverse: Matrix3::identity(),
        }
    }

    /// The source-to-destination matrix, normalized so `h33 == 1` when
    /// solved from correspondences.
    #[must_use]
    pub const fn matrix(&self) -> &Matrix3<f64> {
        &self.forward
    }

    #[must_use]
    pub const fn inverse_matrix(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Map a source point into destination space.
    ///
    /// Returns `None` when the point projects to infinity.
    #[must_use]
    pub fn map(&self, p: Point) -> Option<Point> {
        project(&self.forward, p)
    }

    /// Map a destination point back into source space.
    #[must_use]
    pub fn map_inverse(&self, p: Point) -> Option<Point> {
        project(&self.inverse, p)
    }
}

fn project(m: &Matrix3<f64>, p: Point) -> Option<Point> {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() <= W_EPSILON {
        return None;
    }
    let out = Point::new(v[0] / w, v[1] / w);
    out.is_finite().then_some(out)
}

/// Reject corner sets that cannot span a quadrilateral.
fn check_non_degenerate(points: &[Point; 4], which: &str) -> Result<(), PipelineError> {
    let mut scale: f64 = 0.0;
    for (i, &p) in points.iter().enumerate() {
        for &q in &points[i + 1..] {
            let d2 = p.distance_squared(q);
            if d2.sqrt() < MIN_CORNER_SEPARATION {
                return Err(PipelineError::DegenerateGeometry(format!(
                    "{which} corners coincide at ({}, {})",
                    p.x, p.y
                )));
            }
            scale = scale.max(d2);
        }
    }

    for [i, j, k] in CORNER_TRIPLES {
        let (a, b, c) = (points[i], points[j], points[k]);
        let cross = (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)));
        if cross.abs() <= COLLINEARITY_TOLERANCE * scale {
            return Err(PipelineError::DegenerateGeometry(format!(
                "{which} corners {i}, {j} and {k} are collinear"
            )));
        }
    }
    Ok(())
}
