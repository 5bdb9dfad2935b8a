//! flatscan-export: Pure page serializers (sans-IO)
//!
//! Turns rectified page rasters into bytes a host can save or share:
//! a single page as JPEG or PNG, or every page as one PDF with each
//! raster fitted onto a paper-sized page.

pub mod layout;
pub mod pdf;
pub mod raster;

pub use layout::{PageSize, Placement, fit_to_page};
pub use pdf::{PdfOptions, to_pdf};
pub use raster::{DEFAULT_JPEG_QUALITY, encode_jpeg, encode_png, page_file_name};

/// Errors produced while serializing pages.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A PDF was requested for an empty page list.
    #[error("no pages to export")]
    NoPages,

    /// The page at this index has zero width or height.
    #[error("page {0} is empty")]
    EmptyPage(usize),

    /// Raster encoding failed.
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// PDF assembly failed.
    #[error("PDF assembly failed: {0}")]
    Pdf(String),
}
