//! Shared types for the flatscan document-geometry pipeline.

use geo::{Area, Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::session::PageId;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage`, the raster layout every pipeline entry point
/// consumes and produces.
pub use image::RgbaImage;

/// A 2D point in image pixel coordinates (not normalized).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both coordinates are finite (neither NaN nor infinite).
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Point> for Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Unsigned area enclosed by a ring of points (shoelace formula).
///
/// The ring is treated as implicitly closed. Fewer than three points
/// enclose no area.
#[must_use]
pub fn polygon_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let exterior: LineString<f64> = ring.iter().copied().map(Coord::from).collect();
    Polygon::new(exterior, vec![]).unsigned_area()
}

/// A sequence of connected points, as traced from an edge map.
///
/// Contours are closed rings; the last point implicitly connects back
/// to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Four document corners in canonical order:
/// top-left, top-right, bottom-right, bottom-left.
///
/// The ordering is always derived, never trusted from input: every
/// constructor (including deserialization) routes through
/// [`order_corners`](crate::order::order_corners).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Point; 4]")]
pub struct Quad([Point; 4]);

impl Quad {
    /// Order an arbitrary slice of corner points canonically.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] unless exactly four
    /// points are supplied.
    pub fn from_points(points: &[Point]) -> Result<Self, PipelineError> {
        crate::order::order_points(points)
    }

    /// Wrap four points that are already in canonical order.
    pub(crate) const fn from_ordered(points: [Point; 4]) -> Self {
        Self(points)
    }

    /// All four corners in canonical order.
    #[must_use]
    pub const fn points(&self) -> &[Point; 4] {
        &self.0
    }

    #[must_use]
    pub const fn top_left(&self) -> Point {
        self.0[0]
    }

    #[must_use]
    pub const fn top_right(&self) -> Point {
        self.0[1]
    }

    #[must_use]
    pub const fn bottom_right(&self) -> Point {
        self.0[2]
    }

    #[must_use]
    pub const fn bottom_left(&self) -> Point {
        self.0[3]
    }

    /// Enclosed area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        polygon_area(&self.0)
    }

    /// Whether every corner has finite coordinates.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|p| p.is_finite())
    }
}

impl From<[Point; 4]> for Quad {
    fn from(points: [Point; 4]) -> Self {
        crate::order::order_corners(points)
    }
}

impl From<Quad> for [Point; 4] {
    fn from(quad: Quad) -> Self {
        quad.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Whether either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Tunable parameters for detection, rectification fallback and filters.
///
/// Defaults reproduce the reference behaviour: a 5x5-equivalent blur,
/// Canny thresholds of 75/200, a 2%-of-perimeter polygon tolerance, an
/// 8% default inset, a 21x21 scan window with offset 15, and the
/// `(v - 100) * 1.35 + 120` magic curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,

    /// Canny low (hysteresis) threshold.
    pub canny_low: f32,

    /// Canny high (seed) threshold.
    pub canny_high: f32,

    /// Polygon approximation tolerance as a fraction of each contour's
    /// closed perimeter.
    pub approx_epsilon_ratio: f64,

    /// Fallback corner inset as a fraction of the shorter image side.
    pub default_inset_ratio: f64,

    /// Side length of the square adaptive-threshold window. Must be odd.
    pub scan_block_size: u32,

    /// Constant subtracted from the local mean by the scan filter.
    pub scan_offset: f64,

    /// Input value the magic curve pivots around.
    pub magic_pivot: f64,

    /// Contrast gain of the magic curve.
    pub magic_gain: f64,

    /// Output value the pivot maps to.
    pub magic_bias: f64,
}

impl PipelineConfig {
    /// Conventional sigma for a 5x5 Gaussian kernel when none is
    /// given: `0.3 * ((5 - 1) * 0.5 - 1) + 0.8`.
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.1;
    pub const DEFAULT_CANNY_LOW: f32 = 75.0;
    pub const DEFAULT_CANNY_HIGH: f32 = 200.0;
    pub const DEFAULT_APPROX_EPSILON_RATIO: f64 = 0.02;
    pub const DEFAULT_INSET_RATIO: f64 = 0.08;
    pub const DEFAULT_SCAN_BLOCK_SIZE: u32 = 21;
    pub const DEFAULT_SCAN_OFFSET: f64 = 15.0;
    pub const DEFAULT_MAGIC_PIVOT: f64 = 100.0;
    pub const DEFAULT_MAGIC_GAIN: f64 = 1.35;
    pub const DEFAULT_MAGIC_BIAS: f64 = 120.0;

    /// Check parameter invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.blur_sigma.is_finite() || self.blur_sigma < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_sigma must be finite and non-negative, got {}",
                self.blur_sigma
            )));
        }
        if !(self.canny_low.is_finite() && self.canny_high.is_finite()) {
            return Err(PipelineError::InvalidConfig(
                "canny thresholds must be finite".to_string(),
            ));
        }
        if self.canny_low > self.canny_high {
            return Err(PipelineError::InvalidConfig(format!(
                "canny_low ({}) exceeds canny_high ({})",
                self.canny_low, self.canny_high
            )));
        }
        if !(self.approx_epsilon_ratio.is_finite() && self.approx_epsilon_ratio >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "approx_epsilon_ratio must be finite and non-negative, got {}",
                self.approx_epsilon_ratio
            )));
        }
        if !(0.0..0.5).contains(&self.default_inset_ratio) {
            return Err(PipelineError::InvalidConfig(format!(
                "default_inset_ratio must be in [0, 0.5), got {}",
                self.default_inset_ratio
            )));
        }
        if self.scan_block_size < 3 || self.scan_block_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "scan_block_size must be odd and at least 3, got {}",
                self.scan_block_size
            )));
        }
        let magic = [self.magic_pivot, self.magic_gain, self.magic_bias, self.scan_offset];
        if magic.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidConfig(
                "filter parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            canny_low: Self::DEFAULT_CANNY_LOW,
            canny_high: Self::DEFAULT_CANNY_HIGH,
            approx_epsilon_ratio: Self::DEFAULT_APPROX_EPSILON_RATIO,
            default_inset_ratio: Self::DEFAULT_INSET_RATIO,
            scan_block_size: Self::DEFAULT_SCAN_BLOCK_SIZE,
            scan_offset: Self::DEFAULT_SCAN_OFFSET,
            magic_pivot: Self::DEFAULT_MAGIC_PIVOT,
            magic_gain: Self::DEFAULT_MAGIC_GAIN,
            magic_bias: Self::DEFAULT_MAGIC_BIAS,
        }
    }
}

/// Errors that can occur in the pipeline.
///
/// "No document found" is not an error: detection returns `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The caller supplied malformed input (wrong point count, zero-sized
    /// image, non-finite coordinates, missing crop state).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The corner points are collinear or coincident, so no valid
    /// projective transform exists.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// No page with the given id exists in the document.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_finiteness() {
        assert!(Point::new(1.0, 2.0).is_finite());
        assert!(!Point::new(f64::NAN, 2.0).is_finite());
        assert!(!Point::new(1.0, f64::INFINITY).is_finite());
    }

    // --- Area tests ---

    #[test]
    fn polygon_area_rectangle() {
        let ring = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        assert!((polygon_area(&ring) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_area_is_orientation_independent() {
        let ring = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 0.0),
        ];
        assert!((polygon_area(&ring) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_area_degenerate_inputs() {
        assert!(polygon_area(&[]).abs() < f64::EPSILON);
        assert!(polygon_area(&[Point::new(1.0, 1.0), Point::new(2.0, 2.0)]).abs() < f64::EPSILON);
    }

    // --- Quad tests ---

    #[test]
    fn quad_accessors_follow_canonical_order() {
        let quad = Quad::from_points(&[
            Point::new(90.0, 80.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 80.0),
            Point::new(90.0, 10.0),
        ])
        .unwrap();
        assert_eq!(quad.top_left(), Point::new(10.0, 10.0));
        assert_eq!(quad.top_right(), Point::new(90.0, 10.0));
        assert_eq!(quad.bottom_right(), Point::new(90.0, 80.0));
        assert_eq!(quad.bottom_left(), Point::new(10.0, 80.0));
        assert!((quad.area() - 80.0 * 70.0).abs() < 1e-9);
    }

    #[test]
    fn quad_deserialization_reorders() {
        let json = r#"[{"x":5.0,"y":5.0},{"x":0.0,"y":0.0},{"x":0.0,"y":5.0},{"x":5.0,"y":0.0}]"#;
        let quad: Quad = serde_json::from_str(json).unwrap();
        assert_eq!(quad.top_left(), Point::new(0.0, 0.0));
        assert_eq!(quad.bottom_right(), Point::new(5.0, 5.0));
    }

    #[test]
    fn quad_serializes_as_point_array() {
        let quad = Quad::from([
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
        ]);
        let json = serde_json::to_string(&quad).unwrap();
        let back: Quad = serde_json::from_str(&json).unwrap();
        assert_eq!(quad, back);
        assert!(json.starts_with('['));
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_of_raster() {
        let img = RgbaImage::new(7, 3);
        let dims = Dimensions::of(&img);
        assert_eq!(
            dims,
            Dimensions {
                width: 7,
                height: 3
            }
        );
        assert_eq!(dims.pixel_count(), 21);
        assert!(!dims.is_empty());
        assert!(Dimensions::of(&RgbaImage::new(0, 3)).is_empty());
    }

    // --- PipelineConfig tests ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert!((config.blur_sigma - 1.1).abs() < f32::EPSILON);
        assert!((config.canny_low - 75.0).abs() < f32::EPSILON);
        assert!((config.canny_high - 200.0).abs() < f32::EPSILON);
        assert!((config.approx_epsilon_ratio - 0.02).abs() < f64::EPSILON);
        assert!((config.default_inset_ratio - 0.08).abs() < f64::EPSILON);
        assert_eq!(config.scan_block_size, 21);
        assert!((config.scan_offset - 15.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn pipeline_config_rejects_even_block_size() {
        let config = PipelineConfig {
            scan_block_size: 20,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pipeline_config_rejects_inverted_canny() {
        let config = PipelineConfig {
            canny_low: 250.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pipeline_config_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"canny_low": 40.0}"#).unwrap();
        assert!((config.canny_low - 40.0).abs() < f32::EPSILON);
        assert_eq!(config.scan_block_size, PipelineConfig::DEFAULT_SCAN_BLOCK_SIZE);
    }

    // --- PipelineError tests ---

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::DegenerateGeometry("collinear".to_string()).to_string(),
            "degenerate geometry: collinear",
        );
        assert_eq!(
            PipelineError::InvalidArgument("expected 4 points".to_string()).to_string(),
            "invalid argument: expected 4 points",
        );
    }
}
