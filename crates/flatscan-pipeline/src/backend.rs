//! Image-processing primitives behind a swappable interface.
//!
//! The detector and rectifier only ever talk to a [`VisionBackend`], so
//! they can be driven by a scripted backend in tests or by a different
//! raster library in a host application. [`ImageprocBackend`] is the
//! default, built on `imageproc` filters and its projective warp.

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::homography::Homography;
use crate::types::{Dimensions, PipelineConfig, PipelineError, Point, Polyline};

/// The raster operations the geometry pipeline needs.
///
/// Every method takes its input by reference and returns a new owned
/// buffer; implementations must not retain references to their inputs.
pub trait VisionBackend {
    /// Single-channel luma of an RGBA raster.
    fn grayscale(&self, image: &RgbaImage) -> GrayImage;

    /// Noise-suppressing smoothing pass.
    fn blur(&self, gray: &GrayImage) -> GrayImage;

    /// Binary edge map: 255 on edges, 0 elsewhere.
    fn edges(&self, blurred: &GrayImage) -> GrayImage;

    /// Every closed border in a binary edge map.
    fn contours(&self, edges: &GrayImage) -> Vec<Polyline>;

    /// Projective transform taking `src[i]` to `dst[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateGeometry`] when no invertible
    /// transform exists.
    fn homography(&self, src: &[Point; 4], dst: &[Point; 4]) -> Result<Homography, PipelineError> {
        Homography::from_correspondences(src, dst)
    }

    /// Resample `image` into a `size` raster by inverse-mapping every
    /// destination pixel through `homography`.
    fn warp(&self, image: &RgbaImage, homography: &Homography, size: Dimensions) -> RgbaImage;

    /// The blur and edge parameters this backend actually runs with, for
    /// diagnostics. `None` when it has no such knobs.
    fn edge_settings(&self) -> Option<EdgeSettings> {
        None
    }
}

/// Blur and Canny parameters held by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeSettings {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl EdgeSettings {
    #[must_use]
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            canny_low: config.canny_low,
            canny_high: config.canny_high,
        }
    }
}

/// Default backend: `imageproc` filters and bilinear resampling with an
/// opaque black border.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageprocBackend {
    settings: EdgeSettings,
}

impl ImageprocBackend {
    /// Take blur and Canny parameters from `config`.
    #[must_use]
    pub const fn new(config: &PipelineConfig) -> Self {
        Self::with_settings(EdgeSettings::from_config(config))
    }

    #[must_use]
    pub const fn with_settings(settings: EdgeSettings) -> Self {
        Self { settings }
    }
}

impl Default for ImageprocBackend {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl VisionBackend for ImageprocBackend {
    fn grayscale(&self, image: &RgbaImage) -> GrayImage {
        crate::grayscale::to_luma(image)
    }

    fn blur(&self, gray: &GrayImage) -> GrayImage {
        crate::blur::gaussian_blur(gray, self.settings.blur_sigma)
    }

    fn edges(&self, blurred: &GrayImage) -> GrayImage {
        crate::edge::canny(blurred, self.settings.canny_low, self.settings.canny_high)
    }

    fn contours(&self, edges: &GrayImage) -> Vec<Polyline> {
        crate::contour::trace_contours(edges)
    }

    fn warp(&self, image: &RgbaImage, homography: &Homography, size: Dimensions) -> RgbaImage {
        crate::rectify::warp_perspective(image, homography, size)
    }

    fn edge_settings(&self) -> Option<EdgeSettings> {
        Some(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_uses_default_config() {
        let backend = ImageprocBackend::default();
        assert_eq!(backend, ImageprocBackend::new(&PipelineConfig::default()));
    }

    #[test]
    fn uniform_image_has_no_contours() {
        let backend = ImageprocBackend::default();
        let img = RgbaImage::from_pixel(40, 30, image::Rgba([200, 200, 200, 255]));
        let gray = backend.grayscale(&img);
        let blurred = backend.blur(&gray);
        let edges = backend.edges(&blurred);
        assert_eq!(edges.dimensions(), (40, 30));
        assert!(backend.contours(&edges).is_empty());
    }

    #[test]
    fn reports_the_settings_it_runs_with() {
        let settings = EdgeSettings {
            blur_sigma: 2.5,
            canny_low: 10.0,
            canny_high: 90.0,
        };
        let backend = ImageprocBackend::with_settings(settings);
        assert_eq!(backend.edge_settings(), Some(settings));
    }

    #[test]
    fn identity_warp_reproduces_source() {
        let backend = ImageprocBackend::default();
        let img = RgbaImage::from_fn(8, 6, |x, y| {
            image::Rgba([
                u8::try_from(x * 30).unwrap_or(0),
                u8::try_from(y * 40).unwrap_or(0),
                9,
                255,
            ])
        });
        let out = backend.warp(
            &img,
            &Homography::identity(),
            Dimensions {
                width: 8,
                height: 6,
            },
        );
        // Bilinear taps need a right and lower neighbour, so only the
        // interior is reproduced.
        for y in 0..5 {
            for x in 0..7 {
                assert_eq!(out.get_pixel(x, y), img.get_pixel(x, y), "({x}, {y})");
            }
        }
        assert_eq!(*out.get_pixel(7, 0), crate::rectify::BORDER);
    }
}
