//! Automatic document corner detection.
//!
//! Grayscale, blur, Canny, contour tracing, then a closed
//! Douglas-Peucker approximation of every contour. The largest contour
//! that approximates to exactly four vertices is taken as the page.
//! There is deliberately no minimum-area or aspect-ratio filter, so on
//! a cluttered background a small spurious quadrilateral can win.

use image::RgbaImage;
use tracing::{debug, instrument};

use crate::backend::VisionBackend;
use crate::simplify::{approximate_polygon, closed_perimeter};
use crate::types::{Dimensions, PipelineConfig, PipelineError, Point, Polyline, Quad, polygon_area};

/// Outcome of searching a set of contours for the best quadrilateral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadSearch {
    /// Contours examined.
    pub contours: usize,
    /// Contours that approximated to exactly four vertices.
    pub candidates: usize,
    /// Largest candidate, canonically ordered.
    pub best: Option<Quad>,
    /// Enclosed area of `best` in square pixels (0 when none).
    pub best_area: f64,
}

/// Pick the largest four-vertex approximation among `contours`.
///
/// Each contour is approximated with a tolerance of
/// `epsilon_ratio * closed_perimeter`. Only a strictly larger area
/// replaces the current best, so zero-area quadrilaterals never win and
/// the earliest contour wins exact ties.
#[must_use]
pub fn find_best_quad(contours: &[Polyline], epsilon_ratio: f64) -> QuadSearch {
    let mut search = QuadSearch {
        contours: contours.len(),
        candidates: 0,
        best: None,
        best_area: 0.0,
    };

    for contour in contours {
        let ring = contour.points();
        let epsilon = epsilon_ratio * closed_perimeter(ring);
        let approx = approximate_polygon(ring, epsilon);
        let Ok(corners) = <[Point; 4]>::try_from(approx.as_slice()) else {
            continue;
        };
        search.candidates += 1;

        let area = polygon_area(&corners);
        if area > search.best_area {
            search.best_area = area;
            search.best = Some(Quad::from(corners));
        }
    }
    search
}

/// Detect the page quadrilateral in `image` using `backend`.
///
/// Returns `Ok(None)` when no contour approximates to four vertices;
/// callers fall back to [`default_corners`](crate::order::default_corners).
/// Every intermediate buffer is dropped before returning.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn detect_with<B: VisionBackend + ?Sized>(
    backend: &B,
    image: &RgbaImage,
    config: &PipelineConfig,
) -> Result<Option<Quad>, PipelineError> {
    check_dimensions(image)?;

    let contours = {
        let gray = backend.grayscale(image);
        let blurred = backend.blur(&gray);
        let edges = backend.edges(&blurred);
        backend.contours(&edges)
    };
    let search = find_best_quad(&contours, config.approx_epsilon_ratio);

    debug!(
        contours = search.contours,
        candidates = search.candidates,
        best_area = search.best_area,
        found = search.best.is_some(),
        "quadrilateral search finished"
    );
    Ok(search.best)
}

pub(crate) fn check_dimensions(image: &RgbaImage) -> Result<(), PipelineError> {
    if Dimensions::of(image).is_empty() {
        return Err(PipelineError::InvalidArgument(format!(
            "cannot detect corners in a {}x{} image",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}
