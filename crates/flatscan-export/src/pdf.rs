//! Multi-page PDF assembly using `printpdf` 0.8.
//!
//! printpdf 0.8 builds documents from `PdfPage` values holding `Vec<Op>`
//! operation lists. Each raster is registered once as an image XObject
//! and drawn with a single `UseXobject` op placed by [`fit_to_page`].

use flatscan_pipeline::{Dimensions, RgbaImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use crate::ExportError;
use crate::layout::{PageSize, fit_to_page};

/// Pixels per inch at which one raster pixel is one PDF point before
/// scaling.
const POINT_DPI: f32 = 72.0;

/// Page layout and metadata for [`to_pdf`].
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub page_size: PageSize,
    /// Blank border kept on every side, in millimetres.
    pub margin_mm: f64,
    /// Title stored in the document info dictionary.
    pub title: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin_mm: 0.0,
            title: "flatscan".to_string(),
        }
    }
}

/// Build one PDF with a sheet per raster, in order.
///
/// Alpha is dropped; each raster is embedded as RGB8 and scaled
/// uniformly to fit its sheet, centred.
///
/// # Errors
///
/// Returns [`ExportError::NoPages`] for an empty slice,
/// [`ExportError::EmptyPage`] for a zero-sized raster, and
/// [`ExportError::Pdf`] if the margin leaves no printable area.
#[instrument(skip_all, fields(pages = pages.len()))]
pub fn to_pdf(pages: &[&RgbaImage], options: &PdfOptions) -> Result<Vec<u8>, ExportError> {
    if pages.is_empty() {
        return Err(ExportError::NoPages);
    }

    let sheet_w = to_mm(options.page_size.width_mm);
    let sheet_h = to_mm(options.page_size.height_mm);
    let mut doc = PdfDocument::new(&options.title);
    let mut sheets = Vec::with_capacity(pages.len());

    for (index, image) in pages.iter().enumerate() {
        let dims = Dimensions::of(image);
        let placement = match fit_to_page(dims, options.page_size, options.margin_mm) {
            Some(p) => p,
            None if dims.is_empty() => return Err(ExportError::EmptyPage(index)),
            None => {
                return Err(ExportError::Pdf(format!(
                    "margin of {} mm leaves no room on the page",
                    options.margin_mm
                )));
            }
        };

        let xobject = doc.add_image(&raw_rgb(image));
        let scale = to_mm(placement.mm_per_px).into_pt().0;
        let ops = vec![Op::UseXobject {
            id: xobject,
            transform: XObjectTransform {
                translate_x: Some(to_mm(placement.x_mm).into_pt()),
                translate_y: Some(to_mm(placement.y_mm).into_pt()),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(POINT_DPI),
                rotate: None,
            },
        }];
        debug!(
            index,
            width_mm = placement.width_mm,
            height_mm = placement.height_mm,
            "page placed"
        );
        sheets.push(PdfPage::new(sheet_w, sheet_h, ops));
    }

    doc.with_pages(sheets);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "printpdf reported warnings");
    }
    info!(bytes = bytes.len(), "PDF assembled");
    Ok(bytes)
}

fn raw_rgb(image: &RgbaImage) -> RawImage {
    let mut pixels = Vec::with_capacity(image.as_raw().len() / 4 * 3);
    for p in image.pixels() {
        pixels.extend_from_slice(&p.0[..3]);
    }
    RawImage {
        pixels: RawImageData::U8(pixels),
        width: image.width() as usize,
        height: image.height() as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    }
}

// printpdf works in f32; sheet geometry is far inside f32 range.
#[allow(clippy::cast_possible_truncation)]
fn to_mm(v: f64) -> Mm {
    Mm(v as f32)
}
