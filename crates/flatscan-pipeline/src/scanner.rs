//! The host-held handle that bundles a backend with its configuration.
//!
//! Holding a [`Scanner`] means the image-processing backend is ready:
//! constructing one is synchronous and validates the configuration up
//! front. Hosts without a backend can still offer manual cropping via
//! [`default_corners`](crate::order::default_corners).

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::backend::{ImageprocBackend, VisionBackend};
use crate::diagnostics::{Clock, DetectDiagnostics};
use crate::filter::{FilterKind, apply_filter_with};
use crate::order::default_corners_with_inset;
use crate::types::{PipelineConfig, PipelineError, Point, Quad};

/// Where a set of working corners came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerSource {
    /// Found by automatic detection.
    Detected,
    /// Detection found nothing; the inset default was used.
    Fallback,
    /// Supplied by the caller without running detection.
    Manual,
}

impl fmt::Display for CornerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Detected => "detected",
            Self::Fallback => "fallback",
            Self::Manual => "manual",
        })
    }
}

/// Corners to present to the user for adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerEstimate {
    pub quad: Quad,
    pub source: CornerSource,
}

impl CornerEstimate {
    #[must_use]
    pub const fn is_detected(&self) -> bool {
        matches!(self.source, CornerSource::Detected)
    }
}

/// Detection, rectification and filtering over one backend.
#[derive(Debug, Clone)]
pub struct Scanner<B = ImageprocBackend> {
    backend: B,
    config: PipelineConfig,
}

impl Scanner<ImageprocBackend> {
    /// A scanner over the default `imageproc` backend.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let backend = ImageprocBackend::new(&config);
        Self::with_backend(backend, config)
    }
}

impl Default for Scanner<ImageprocBackend> {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            backend: ImageprocBackend::new(&config),
            config,
        }
    }
}

impl<B: VisionBackend> Scanner<B> {
    /// A scanner over a caller-supplied backend.
    ///
    /// Blur and edge parameters are whatever `backend` was built with;
    /// `config` drives the rest of detection.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// validation.
    pub fn with_backend(backend: B, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Find the page quadrilateral, or `None` when nothing qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
    pub fn detect(&self, image: &RgbaImage) -> Result<Option<Quad>, PipelineError> {
        crate::detect::detect_with(&self.backend, image, &self.config)
    }

    /// Detected corners, or the inset default when detection finds
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect_or_default(&self, image: &RgbaImage) -> Result<CornerEstimate, PipelineError> {
        let estimate = match self.detect(image)? {
            Some(quad) => CornerEstimate {
                quad,
                source: CornerSource::Detected,
            },
            None => CornerEstimate {
                quad: self.default_corners(image.width(), image.height()),
                source: CornerSource::Fallback,
            },
        };
        info!(source = ?estimate.source, "corner estimate ready");
        Ok(estimate)
    }

    /// Inset fallback corners using the configured inset ratio.
    #[must_use]
    pub fn default_corners(&self, width: u32, height: u32) -> Quad {
        default_corners_with_inset(width, height, self.config.default_inset_ratio)
    }

    /// Flatten the region bounded by `quad`.
    ///
    /// # Errors
    ///
    /// See [`rectify_with`](crate::rectify::rectify_with).
    pub fn rectify(&self, image: &RgbaImage, quad: &Quad) -> Result<RgbaImage, PipelineError> {
        crate::rectify::rectify_with(&self.backend, image, quad)
    }

    /// Flatten the region bounded by four points in any order.
    ///
    /// # Errors
    ///
    /// See [`rectify_points_with`](crate::rectify::rectify_points_with).
    pub fn rectify_points(
        &self,
        image: &RgbaImage,
        points: &[Point],
    ) -> Result<RgbaImage, PipelineError> {
        crate::rectify::rectify_points_with(&self.backend, image, points)
    }

    #[must_use = "returns the filtered image"]
    pub fn apply_filter(&self, image: &RgbaImage, kind: FilterKind) -> RgbaImage {
        apply_filter_with(image, kind, &self.config)
    }

    /// Detect with per-stage timing and counts.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
    pub fn detect_with_diagnostics<C: Clock>(
        &self,
        image: &RgbaImage,
        clock: &C,
    ) -> Result<(Option<Quad>, DetectDiagnostics), PipelineError> {
        crate::diagnostics::detect_with_diagnostics(&self.backend, image, &self.config, clock)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn scanner() -> Scanner {
        Scanner::default()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig {
            scan_block_size: 4,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Scanner::new(config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn blank_image_falls_back_to_inset_corners() {
        let scanner = scanner();
        let img = RgbaImage::from_pixel(1000, 500, Rgba([250, 250, 250, 255]));
        let estimate = scanner.detect_or_default(&img).unwrap();
        assert_eq!(estimate.source, CornerSource::Fallback);
        assert!(!estimate.is_detected());
        assert_eq!(estimate.quad.top_left(), Point::new(40.0, 40.0));
        assert_eq!(estimate.quad.bottom_right(), Point::new(960.0, 460.0));
    }

    #[test]
    fn configured_inset_is_used() {
        let config = PipelineConfig {
            default_inset_ratio: 0.1,
            ..PipelineConfig::default()
        };
        let scanner = Scanner::new(config).unwrap();
        let quad = scanner.default_corners(200, 100);
        assert_eq!(quad.top_left(), Point::new(10.0, 10.0));
    }

    #[test]
    fn zero_sized_image_is_invalid() {
        let scanner = scanner();
        assert!(matches!(
            scanner.detect_or_default(&RgbaImage::new(0, 0)),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn estimate_serializes_source_lowercase() {
        let estimate = CornerEstimate {
            quad: scanner().default_corners(100, 100),
            source: CornerSource::Detected,
        };
        let json = serde_json::to_string(&estimate).unwrap();
        assert!(json.contains("\"detected\""), "{json}");
    }

    #[test]
    fn display_matches_serialized_source() {
        for source in [CornerSource::Detected, CornerSource::Fallback, CornerSource::Manual] {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{source}\""));
        }
    }
}
