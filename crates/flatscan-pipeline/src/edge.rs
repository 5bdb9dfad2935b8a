//! Canny edge detection.
//!
//! Wraps [`imageproc::edges::canny`] to turn the blurred luma image into
//! a binary edge map: white pixels (255) are edges and black pixels (0)
//! are background.

use image::GrayImage;

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero lets every pixel with any gradient seed the
/// hysteresis flood, producing an edge map so dense that contour
/// tracing finds no clean document outline.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge.
///
/// Pixels with gradient magnitude above `high_threshold` are definite
/// edges; those between `low_threshold` and `high_threshold` are edges
/// only if connected to a definite edge. The document defaults are
/// 75/200 on the 8-bit luma image.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`. Images
/// smaller than 3x3 have no interior pixels and yield an empty map.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    if image.width() < 3 || image.height() < 3 {
        return GrayImage::new(image.width(), image.height());
    }
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Number of edge pixels (value 255) in a binary edge map.
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == 255)))
        .sum()
}
