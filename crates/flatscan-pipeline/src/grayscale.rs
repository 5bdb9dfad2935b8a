//! Image decoding and luma conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGBA
//! raster every pipeline entry point works on, and converts between RGBA
//! and single-channel luma.

use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::types::PipelineError;

/// Decode raw image bytes into an RGBA raster.
///
/// Whatever channel layout the source uses is normalized to RGBA8 so
/// downstream stages never special-case channel count.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// ITU-R BT.601 luma of one RGB triple, rounded to nearest.
///
/// `0.299*R + 0.587*G + 0.114*B` in fixed point; alpha is ignored.
#[must_use]
pub fn luma_of(pixel: Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    // Max is 255_000 + 500, so the quotient always fits in a u8.
    u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)
}

/// Convert an RGBA raster to single-channel luma.
#[must_use = "returns the grayscale image"]
pub fn to_luma(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luma_of(*image.get_pixel(x, y))])
    })
}

/// Expand a single-channel image back to RGBA, copying alpha from
/// `alpha_source` pixel-for-pixel.
///
/// `alpha_source` must have the same dimensions as `gray`; pixels
/// outside it are treated as opaque.
#[must_use = "returns the expanded RGBA image"]
pub fn expand_luma(gray: &GrayImage, alpha_source: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        let a = alpha_source
            .get_pixel_checked(x, y)
            .map_or(u8::MAX, |p| p.0[3]);
        Rgba([v, v, v, a])
    })
}
