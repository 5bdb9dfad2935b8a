//! Fitting a page raster onto a sheet of paper.

use flatscan_pipeline::Dimensions;

/// Paper size in millimetres, portrait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageSize {
    /// ISO 216 A4.
    pub const A4: Self = Self {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    /// US Letter.
    pub const LETTER: Self = Self {
        width_mm: 215.9,
        height_mm: 279.4,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Where a raster lands on the sheet, in millimetres from the
/// bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    /// Millimetres per source pixel.
    pub mm_per_px: f64,
}

/// Scale `image` uniformly to the largest size that fits inside `page`
/// less `margin_mm` on every side, and centre it.
///
/// Returns `None` for a zero-sized image or a margin that leaves no
/// printable area.
#[must_use]
pub fn fit_to_page(image: Dimensions, page: PageSize, margin_mm: f64) -> Option<Placement> {
    if image.is_empty() {
        return None;
    }
    let margin = margin_mm.max(0.0);
    let avail_w = 2.0_f64.mul_add(-margin, page.width_mm);
    let avail_h = 2.0_f64.mul_add(-margin, page.height_mm);
    if avail_w <= 0.0 || avail_h <= 0.0 {
        return None;
    }

    let w = f64::from(image.width);
    let h = f64::from(image.height);
    let mm_per_px = (avail_w / w).min(avail_h / h);
    let width_mm = w * mm_per_px;
    let height_mm = h * mm_per_px;

    Some(Placement {
        x_mm: margin + (avail_w - width_mm) / 2.0,
        y_mm: margin + (avail_h - height_mm) / 2.0,
        width_mm,
        height_mm,
        mm_per_px,
    })
}
