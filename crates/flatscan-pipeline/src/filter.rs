//! Page filters applied to a rectified page.
//!
//! Every filter is a pure raster-to-raster function. Callers always
//! start from the unfiltered rectified image, so lossy filters never
//! compound.

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::grayscale::{expand_luma, to_luma};
use crate::types::{PipelineConfig, PipelineError};

/// The look applied to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Identity.
    #[default]
    Original,
    /// Luma replicated into the colour channels.
    Grayscale,
    /// Locally thresholded pure black and white.
    Scan,
    /// Contrast-boosting linear colour curve.
    Magic,
}

impl FilterKind {
    /// Every filter, in menu order.
    pub const ALL: [Self; 4] = [Self::Original, Self::Grayscale, Self::Scan, Self::Magic];

    /// Stable lower-case identifier.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Grayscale => "grayscale",
            Self::Scan => "scan",
            Self::Magic => "magic",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FilterKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| PipelineError::InvalidArgument(format!("unknown filter {s:?}")))
    }
}

/// Apply `kind` with default parameters.
#[must_use = "returns the filtered image"]
pub fn apply_filter(image: &RgbaImage, kind: FilterKind) -> RgbaImage {
    apply_filter_with(image, kind, &PipelineConfig::default())
}

/// Apply `kind` with the scan and magic parameters from `config`.
#[must_use = "returns the filtered image"]
#[instrument(skip(image, config), fields(width = image.width(), height = image.height()))]
pub fn apply_filter_with(image: &RgbaImage, kind: FilterKind, config: &PipelineConfig) -> RgbaImage {
    let out = match kind {
        FilterKind::Original => image.clone(),
        FilterKind::Grayscale => grayscale(image),
        FilterKind::Scan => scan(image, config.scan_block_size, config.scan_offset),
        FilterKind::Magic => magic(
            image,
            config.magic_pivot,
            config.magic_gain,
            config.magic_bias,
        ),
    };
    debug!(%kind, "filter applied");
    out
}

/// Luma replicated into RGB; alpha preserved.
#[must_use = "returns the filtered image"]
pub fn grayscale(image: &RgbaImage) -> RgbaImage {
    expand_luma(&to_luma(image), image)
}

/// Adaptive mean threshold on luma.
///
/// A pixel becomes white when it is brighter than the mean of the
/// `block_size` x `block_size` window centred on it (clipped at the
/// image border) minus `offset`, and black otherwise. Alpha is
/// preserved.
#[must_use = "returns the filtered image"]
pub fn scan(image: &RgbaImage, block_size: u32, offset: f64) -> RgbaImage {
    let gray = to_luma(image);
    let binary = adaptive_threshold(&gray, block_size / 2, offset);
    expand_luma(&binary, image)
}

/// Per-channel `(v - pivot) * gain + bias`, rounded and clamped to
/// `[0, 255]`. Alpha is untouched.
#[must_use = "returns the filtered image"]
pub fn magic(image: &RgbaImage, pivot: f64, gain: f64, bias: f64) -> RgbaImage {
    let curve: [u8; 256] = std::array::from_fn(|v| {
        let v = f64::from(u8::try_from(v).unwrap_or(u8::MAX));
        to_channel((v - pivot).mul_add(gain, bias))
    });

    let mut out = image.clone();
    for Rgba([r, g, b, _]) in out.pixels_mut() {
        *r = curve[usize::from(*r)];
        *g = curve[usize::from(*g)];
        *b = curve[usize::from(*b)];
    }
    out
}

/// Round and clamp to a `u8` channel value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Binarize `gray` against its local mean over a `(2r+1)²` window.
#[must_use = "returns the binary image"]
pub fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: f64) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = compute_integral_image(gray);
    GrayImage::from_fn(width, height, |x, y| {
        let mean = region_mean(&integral, width, height, x, y, radius);
        let v = f64::from(gray.get_pixel(x, y).0[0]);
        Luma([if v > mean - offset { 255 } else { 0 }])
    })
}

/// Summed-area table with a zero guard row and column:
/// `table[y * (width + 1) + x]` is the sum of all pixels above and to
/// the left of `(x, y)`.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = w as usize + 1;
    let mut table = vec![0_u64; stride * (h as usize + 1)];

    for y in 0..h {
        let mut row_sum = 0_u64;
        let row = y as usize;
        for x in 0..w {
            row_sum += u64::from(gray.get_pixel(x, y).0[0]);
            let col = x as usize + 1;
            table[(row + 1) * stride + col] = row_sum + table[row * stride + col];
        }
    }
    table
}

/// Mean over the window of `radius` around `(cx, cy)`, clipped to the
/// image.
// Pixel sums and counts stay far below 2^52.
#[allow(clippy::cast_precision_loss)]
fn region_mean(integral: &[u64], width: u32, height: u32, cx: u32, cy: u32, radius: u32) -> f64 {
    let stride = width as usize + 1;
    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = (cx.saturating_add(radius) as usize + 1).min(width as usize);
    let y2 = (cy.saturating_add(radius) as usize + 1).min(height as usize);

    let sum = integral[y2 * stride + x2] + integral[y1 * stride + x1]
        - integral[y1 * stride + x2]
        - integral[y2 * stride + x1];
    let count = (x2 - x1) * (y2 - y1);
    sum as f64 / count as f64
}
