//! flatscan-pipeline: document page detection, rectification and
//! filtering (sans-IO).
//!
//! Turns a photo of a paper page into a flat, axis-aligned page image:
//! grayscale -> blur -> edge detection -> contour tracing ->
//! quadrilateral approximation -> perspective warp -> page filter.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! rasters and byte slices. Encoding pages to JPEG or PDF lives in
//! `flatscan-export`.
//!
//! The free functions here use the default [`ImageprocBackend`] and
//! [`PipelineConfig`]. Hosts that need other parameters, a different
//! backend, or the multi-page [`Document`] model go through a
//! [`Scanner`].

pub mod backend;
pub mod blur;
pub mod contour;
pub mod detect;
pub mod diagnostics;
pub mod edge;
pub mod filter;
pub mod grayscale;
pub mod homography;
pub mod order;
pub mod rectify;
pub mod scanner;
pub mod session;
pub mod simplify;
pub mod types;

pub use backend::{EdgeSettings, ImageprocBackend, VisionBackend};
pub use diagnostics::{Clock, DetectDiagnostics, StageDiagnostics, StageMetrics};
pub use filter::FilterKind;
pub use grayscale::decode;
pub use homography::Homography;
pub use order::{default_corners, order_points};
pub use scanner::{CornerEstimate, CornerSource, Scanner};
pub use session::{Document, Page, PageId, PendingCrop};
pub use types::{
    Dimensions, GrayImage, PipelineConfig, PipelineError, Point, Polyline, Quad, RgbaImage,
};

/// Detect the page quadrilateral in `image` with default settings.
///
/// Returns `Ok(None)` when no contour approximates to four corners;
/// fall back to [`default_corners`] in that case.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
pub fn detect(image: &RgbaImage) -> Result<Option<Quad>, PipelineError> {
    detect::detect_with(&ImageprocBackend::default(), image, &PipelineConfig::default())
}

/// Rectify the region bounded by four corner points (in any order)
/// into an axis-aligned page.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] unless exactly four finite
/// points are supplied or if the image is zero-sized, and
/// [`PipelineError::DegenerateGeometry`] when the corners cannot define
/// a perspective transform.
pub fn rectify(image: &RgbaImage, corners: &[Point]) -> Result<RgbaImage, PipelineError> {
    rectify::rectify_points_with(&ImageprocBackend::default(), image, corners)
}

/// Apply a page filter with default parameters.
#[must_use = "returns the filtered image"]
pub fn apply_filter(image: &RgbaImage, kind: FilterKind) -> RgbaImage {
    filter::apply_filter(image, kind)
}
