//! Single-page raster encoding.

use flatscan_pipeline::RgbaImage;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use tracing::{debug, instrument};

use crate::ExportError;

/// JPEG quality used for exported pages.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Encode a page as baseline JPEG.
///
/// JPEG has no alpha channel, so alpha is dropped and the colour
/// channels are kept as they are. `quality` is clamped to `1..=100`.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the encoder rejects the image
/// (for example a zero-sized page).
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Rgb([r, g, b])
    });

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    debug!(bytes = bytes.len(), "page encoded as JPEG");
    Ok(bytes)
}

/// Encode a page as lossless RGBA PNG.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if PNG encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new(&mut bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Download name for the page at zero-based `index`.
#[must_use]
pub fn page_file_name(index: usize) -> String {
    format!("flatscan-page-{}.jpg", index + 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn page() -> RgbaImage {
        RgbaImage::from_fn(40, 30, |x, y| {
            Rgba([
                u8::try_from(x * 6).unwrap(),
                u8::try_from(y * 8).unwrap(),
                90,
                255,
            ])
        })
    }

    #[test]
    fn jpeg_has_magic_bytes_and_dimensions() {
        let bytes = encode_jpeg(&page(), DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn jpeg_keeps_colour_of_flat_page() {
        let flat = RgbaImage::from_pixel(16, 16, Rgba([200, 120, 40, 255]));
        let bytes = encode_jpeg(&flat, 100).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let [r, g, b] = decoded.get_pixel(8, 8).0;
        assert!(r.abs_diff(200) <= 3 && g.abs_diff(120) <= 3 && b.abs_diff(40) <= 3);
    }

    #[test]
    fn lower_quality_is_smaller() {
        let img = page();
        let high = encode_jpeg(&img, 95).unwrap();
        let low = encode_jpeg(&img, 10).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn empty_page_fails_to_encode() {
        assert!(matches!(
            encode_jpeg(&RgbaImage::new(0, 0), DEFAULT_JPEG_QUALITY),
            Err(ExportError::Encode(_))
        ));
    }

    #[test]
    fn png_is_lossless() {
        let img = page();
        let bytes = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn file_names_are_one_based() {
        assert_eq!(page_file_name(0), "flatscan-page-1.jpg");
        assert_eq!(page_file_name(11), "flatscan-page-12.jpg");
    }
}
