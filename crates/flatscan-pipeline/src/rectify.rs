//! Perspective rectification: flatten a quadrilateral region into an
//! axis-aligned rectangle.
//!
//! Output size comes from the longer of each pair of opposite edges,
//! which undoes perspective foreshortening. The pixels themselves are
//! resampled by `imageproc`'s projective warp; samples that fall outside
//! the source pick up [`BORDER`].

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, instrument, warn};

use crate::backend::VisionBackend;
use crate::homography::Homography;
use crate::types::{Dimensions, PipelineError, Point, Quad};

/// Fill colour for destination pixels that map outside the source.
pub const BORDER: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Largest output side accepted, in pixels.
pub const MAX_OUTPUT_SIDE: u32 = 1 << 15;

/// Largest output area accepted, in pixels (256 MiB of RGBA).
pub const MAX_OUTPUT_PIXELS: u64 = 1 << 26;

/// Unrounded target width and height for `quad`.
///
/// Width is the longer of the top and bottom edges; height is the
/// longer of the left and right edges.
#[must_use]
pub fn target_size(quad: &Quad) -> (f64, f64) {
    let width = quad
        .top_right()
        .distance(quad.top_left())
        .max(quad.bottom_right().distance(quad.bottom_left()));
    let height = quad
        .bottom_left()
        .distance(quad.top_left())
        .max(quad.bottom_right().distance(quad.top_right()));
    (width, height)
}

/// Destination rectangle `[(0,0), (w-1,0), (w-1,h-1), (0,h-1)]` for the
/// unrounded target size.
#[must_use]
pub fn destination_corners(width: f64, height: f64) -> [Point; 4] {
    [
        Point::new(0.0, 0.0),
        Point::new(width - 1.0, 0.0),
        Point::new(width - 1.0, height - 1.0),
        Point::new(0.0, height - 1.0),
    ]
}

/// Round a target size to whole output pixels.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateGeometry`] if either side rounds
/// to zero, or [`PipelineError::InvalidArgument`] if either side exceeds
/// [`MAX_OUTPUT_SIDE`] or the area exceeds [`MAX_OUTPUT_PIXELS`].
pub fn output_dimensions(width: f64, height: f64) -> Result<Dimensions, PipelineError> {
    let side = |v: f64, name: &str| -> Result<u32, PipelineError> {
        let rounded = v.round();
        if rounded < 1.0 {
            return Err(PipelineError::DegenerateGeometry(format!(
                "output {name} rounds to zero ({v})"
            )));
        }
        if rounded > f64::from(MAX_OUTPUT_SIDE) {
            return Err(PipelineError::InvalidArgument(format!(
                "output {name} {rounded} exceeds {MAX_OUTPUT_SIDE} pixels"
            )));
        }
        // In range [1, MAX_OUTPUT_SIDE] after the checks above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pixels = rounded as u32;
        Ok(pixels)
    };
    let dims = Dimensions {
        width: side(width, "width")?,
        height: side(height, "height")?,
    };
    if dims.pixel_count() > MAX_OUTPUT_PIXELS {
        return Err(PipelineError::InvalidArgument(format!(
            "output {}x{} exceeds {MAX_OUTPUT_PIXELS} pixels",
            dims.width, dims.height
        )));
    }
    Ok(dims)
}

/// Rectify the region of `image` bounded by `quad`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] for a zero-sized image,
/// non-finite corners, or an oversized output, and
/// [`PipelineError::DegenerateGeometry`] when the corners cannot span a
/// rectangle (coincident or collinear points, zero-size output).
#[instrument(skip_all, fields(src_width = image.width(), src_height = image.height()))]
pub fn rectify_with<B: VisionBackend + ?Sized>(
    backend: &B,
    image: &RgbaImage,
    quad: &Quad,
) -> Result<RgbaImage, PipelineError> {
    if Dimensions::of(image).is_empty() {
        return Err(PipelineError::InvalidArgument(format!(
            "cannot rectify a {}x{} image",
            image.width(),
            image.height()
        )));
    }
    if !quad.is_finite() {
        return Err(PipelineError::InvalidArgument(
            "corner coordinates must be finite".to_string(),
        ));
    }

    let (width, height) = target_size(quad);
    let size = output_dimensions(width, height)?;
    let dst = destination_corners(width, height);
    let homography = backend.homography(quad.points(), &dst)?;

    debug!(
        out_width = size.width,
        out_height = size.height,
        "rectifying quadrilateral"
    );
    Ok(backend.warp(image, &homography, size))
}

/// Rectify using caller-supplied corner points in any order.
///
/// # Errors
///
/// As [`rectify_with`], plus [`PipelineError::InvalidArgument`] unless
/// exactly four points are given.
pub fn rectify_points_with<B: VisionBackend + ?Sized>(
    backend: &B,
    image: &RgbaImage,
    points: &[Point],
) -> Result<RgbaImage, PipelineError> {
    let quad = Quad::from_points(points)?;
    rectify_with(backend, image, &quad)
}

/// Warp `image` into a `size` raster through `homography` with
/// `imageproc`'s bilinear projective warp.
///
/// Destination pixels whose 2×2 source neighbourhood is not entirely
/// inside the image receive [`BORDER`]. When the quad runs along the
/// image's last row or column, that row or column of the output is
/// border too.
#[must_use = "returns the warped image"]
pub fn warp_perspective(image: &RgbaImage, homography: &Homography, size: Dimensions) -> RgbaImage {
    let mut output = RgbaImage::from_pixel(size.width, size.height, BORDER);
    let Some(projection) = projection(homography) else {
        warn!("homography is not invertible in single precision, output left blank");
        return output;
    };
    warp_into(image, &projection, Interpolation::Bilinear, BORDER, &mut output);
    output
}

/// Row-major single-precision copy of the forward (source to
/// destination) matrix. `warp_into` inverts it itself.
fn projection(homography: &Homography) -> Option<Projection> {
    let m = homography.matrix();
    // Narrowing to f32 loses precision only; overflow is caught below.
    #[allow(clippy::cast_possible_truncation)]
    let entries = [
        m[(0, 0)] as f32,
        m[(0, 1)] as f32,
        m[(0, 2)] as f32,
        m[(1, 0)] as f32,
        m[(1, 1)] as f32,
        m[(1, 2)] as f32,
        m[(2, 0)] as f32,
        m[(2, 1)] as f32,
        m[(2, 2)] as f32,
    ];
    if entries.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Projection::from_matrix(entries)
}
