//! Canonical corner ordering and the default inset quadrilateral.
//!
//! Every four-point corner set is re-ordered into
//! `[top-left, top-right, bottom-right, bottom-left]` before it is used
//! downstream, regardless of the order the caller (or the contour
//! tracer) produced it in.

use crate::types::{PipelineError, Point, Quad};

/// Order four points canonically.
///
/// Top-left minimizes `x + y`, bottom-right maximizes it; top-right
/// minimizes `y - x`, bottom-left maximizes it. Both sorts are stable,
/// so exact ties keep their input order.
#[must_use = "returns the ordered quadrilateral"]
pub fn order_corners(points: [Point; 4]) -> Quad {
    let mut by_sum = points;
    by_sum.sort_by(|a, b| (a.x + a.y).total_cmp(&(b.x + b.y)));

    let mut by_diff = points;
    by_diff.sort_by(|a, b| (a.y - a.x).total_cmp(&(b.y - b.x)));

    Quad::from_ordered([by_sum[0], by_diff[0], by_sum[3], by_diff[3]])
}

/// Order a caller-supplied slice of corner points canonically.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] unless exactly four points
/// are supplied.
pub fn order_points(points: &[Point]) -> Result<Quad, PipelineError> {
    let corners: [Point; 4] = points.try_into().map_err(|_| {
        PipelineError::InvalidArgument(format!(
            "expected exactly 4 corner points, got {}",
            points.len()
        ))
    })?;
    Ok(order_corners(corners))
}

/// Default corners inset from the full frame by 8% of the shorter side.
///
/// Used whenever automatic detection is unavailable or finds nothing.
#[must_use = "returns the fallback quadrilateral"]
pub fn default_corners(width: u32, height: u32) -> Quad {
    default_corners_with_inset(
        width,
        height,
        crate::PipelineConfig::DEFAULT_INSET_RATIO,
    )
}

/// Default corners inset by `inset_ratio` of the shorter side, rounded
/// to a whole pixel.
#[must_use = "returns the fallback quadrilateral"]
pub fn default_corners_with_inset(width: u32, height: u32, inset_ratio: f64) -> Quad {
    let w = f64::from(width);
    let h = f64::from(height);
    let m = (w.min(h) * inset_ratio).round();
    Quad::from_ordered([
        Point::new(m, m),
        Point::new(w - m, m),
        Point::new(w - m, h - m),
        Point::new(m, h - m),
    ])
}
