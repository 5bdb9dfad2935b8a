//! Contour tracing: extract closed rings from a binary edge map.
//!
//! Uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]. Every border is returned,
//! outer and hole alike, with no hierarchy filtering: a document's
//! outline may surface as either kind depending on how Canny closed it.

use image::GrayImage;

use crate::types::{Point, Polyline};

/// Contours with fewer points than this enclose no area and are skipped.
pub const MIN_CONTOUR_POINTS: usize = 3;

/// Trace every closed border in the given binary edge map.
///
/// Input: white pixels (non-zero) are edges, black is background.
/// Output: one [`Polyline`] per border, in tracing order, with integer
/// grid coordinates promoted to floating point.
#[must_use = "returns the traced contours"]
pub fn trace_contours(edges: &GrayImage) -> Vec<Polyline> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(edges);

    contours
        .into_iter()
        .filter(|c| c.points.len() >= MIN_CONTOUR_POINTS)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Polyline::new(points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_produces_no_contours() {
        let img = GrayImage::new(10, 10); // all black
        assert!(trace_contours(&img).is_empty());
    }

    #[test]
    fn single_pixel_contour_is_filtered_out() {
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(5, 5, image::Luma([255]));
        for polyline in &trace_contours(&img) {
            assert!(polyline.len() >= MIN_CONTOUR_POINTS);
        }
    }

    #[test]
    fn rectangle_outline_produces_contours() {
        // One-pixel-wide hollow rectangle, the shape Canny leaves behind.
        let mut img = GrayImage::new(30, 30);
        for x in 5..=24 {
            img.put_pixel(x, 5, image::Luma([255]));
            img.put_pixel(x, 20, image::Luma([255]));
        }
        for y in 5..=20 {
            img.put_pixel(5, y, image::Luma([255]));
            img.put_pixel(24, y, image::Luma([255]));
        }
        let result = trace_contours(&img);
        assert!(
            !result.is_empty(),
            "expected at least one contour from a rectangle outline"
        );
        for polyline in &result {
            assert!(
                polyline.len() >= 4,
                "rectangle contour should have at least 4 points"
            );
            for p in polyline.points() {
                assert!((5.0..=24.0).contains(&p.x) && (5.0..=20.0).contains(&p.y));
            }
        }
    }

    #[test]
    fn hole_borders_are_kept() {
        // A thick frame has both an outer and an inner border.
        let mut img = GrayImage::new(40, 40);
        for y in 5..35 {
            for x in 5..35 {
                let on_frame = !(10..30).contains(&x) || !(10..30).contains(&y);
                if on_frame {
                    img.put_pixel(x, y, image::Luma([255]));
                }
            }
        }
        let result = trace_contours(&img);
        assert!(
            result.len() >= 2,
            "expected outer and hole borders, got {}",
            result.len()
        );
    }
}
