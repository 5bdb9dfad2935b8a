//! Gaussian blur for noise reduction before edge detection.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`] to smooth the luma
//! image, suppressing high-frequency noise that would otherwise
//! fragment document edges into many short contours.

use image::GrayImage;

/// Apply Gaussian blur to a grayscale image.
///
/// The default sigma (1.1) matches a 5x5 Gaussian kernel. Non-positive
/// sigma values return the image unchanged, since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}
