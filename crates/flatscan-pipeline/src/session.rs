//! The in-memory page collection for one scanning session.
//!
//! A [`Document`] owns an ordered list of [`Page`]s (insertion order is
//! export order), at most one active page, and at most one pending crop
//! awaiting confirmation. Every mutating operation either succeeds
//! completely or leaves the document exactly as it was.

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::backend::VisionBackend;
use crate::filter::{FilterKind, apply_filter_with};
use crate::scanner::{CornerEstimate, CornerSource, Scanner};
use crate::types::{Dimensions, PipelineConfig, PipelineError, Point, Quad};

/// Unique identifier of a page within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(Uuid);

impl PageId {
    /// A fresh random (v4) identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One rectified page.
///
/// `base` is the unfiltered rectified raster and never changes;
/// `preview` is always `filter` applied to `base`.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    base: RgbaImage,
    filter: FilterKind,
    preview: RgbaImage,
}

impl Page {
    fn new(base: RgbaImage) -> Self {
        Self {
            id: PageId::generate(),
            preview: base.clone(),
            base,
            filter: FilterKind::Original,
        }
    }

    #[must_use]
    pub const fn id(&self) -> PageId {
        self.id
    }

    #[must_use]
    pub const fn base(&self) -> &RgbaImage {
        &self.base
    }

    #[must_use]
    pub const fn filter(&self) -> FilterKind {
        self.filter
    }

    /// The filtered raster shown to the user and exported.
    #[must_use]
    pub const fn preview(&self) -> &RgbaImage {
        &self.preview
    }
}

/// A raw photo waiting for its corners to be confirmed.
#[derive(Debug, Clone)]
pub struct PendingCrop {
    raw: RgbaImage,
    quad: Quad,
    source: CornerSource,
}

impl PendingCrop {
    #[must_use]
    pub const fn raw(&self) -> &RgbaImage {
        &self.raw
    }

    /// The working corners, canonically ordered.
    #[must_use]
    pub const fn quad(&self) -> &Quad {
        &self.quad
    }

    /// Where the initial corners came from. Stays [`CornerSource::Detected`]
    /// even after manual adjustment.
    #[must_use]
    pub const fn source(&self) -> CornerSource {
        self.source
    }
}

/// Pages, selection and the pending crop for one session.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
    active: Option<PageId>,
    pending: Option<PendingCrop>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start cropping a new photo: detect corners, falling back to the
    /// inset default, and hold the photo as the pending crop. Replaces
    /// any earlier pending crop.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a zero-sized image;
    /// the document is left unchanged.
    #[instrument(skip_all, fields(width = raw.width(), height = raw.height()))]
    pub fn begin_crop<B: VisionBackend>(
        &mut self,
        scanner: &Scanner<B>,
        raw: RgbaImage,
    ) -> Result<CornerEstimate, PipelineError> {
        let estimate = scanner.detect_or_default(&raw)?;
        self.pending = Some(PendingCrop {
            raw,
            quad: estimate.quad,
            source: estimate.source,
        });
        Ok(estimate)
    }

    /// Start cropping with caller-chosen corners, skipping detection.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a zero-sized image.
    pub fn begin_crop_with_quad(&mut self, raw: RgbaImage, quad: Quad) -> Result<(), PipelineError> {
        if Dimensions::of(&raw).is_empty() {
            return Err(PipelineError::InvalidArgument(format!(
                "cannot crop a {}x{} image",
                raw.width(),
                raw.height()
            )));
        }
        self.pending = Some(PendingCrop {
            raw,
            quad,
            source: CornerSource::Manual,
        });
        Ok(())
    }

    /// Replace the working corners of the pending crop. The points may
    /// be in any order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if there is no pending
    /// crop or `points` is not exactly four points.
    pub fn adjust_crop(&mut self, points: &[Point]) -> Result<Quad, PipelineError> {
        let quad = Quad::from_points(points)?;
        self.set_crop_quad(quad)?;
        Ok(quad)
    }

    /// Replace the working corners of the pending crop.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if there is no pending
    /// crop.
    pub fn set_crop_quad(&mut self, quad: Quad) -> Result<(), PipelineError> {
        let pending = self.pending.as_mut().ok_or_else(no_pending_crop)?;
        pending.quad = quad;
        Ok(())
    }

    /// Abandon the pending crop, returning it if there was one.
    pub fn cancel_crop(&mut self) -> Option<PendingCrop> {
        self.pending.take()
    }

    /// Rectify the pending crop into a new active page.
    ///
    /// On failure nothing changes: the pending crop stays in place so
    /// the user can adjust the corners and retry.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if there is no pending
    /// crop, or any error from rectification.
    #[instrument(skip_all)]
    pub fn confirm_crop<B: VisionBackend>(
        &mut self,
        scanner: &Scanner<B>,
    ) -> Result<PageId, PipelineError> {
        let pending = self.pending.as_ref().ok_or_else(no_pending_crop)?;
        let base = scanner.rectify(&pending.raw, &pending.quad)?;

        self.pending = None;
        let id = self.push_page(base);
        info!(%id, pages = self.pages.len(), "page added");
        Ok(id)
    }

    /// Append an already-rectified page and make it active.
    pub fn add_page(&mut self, base: RgbaImage) -> PageId {
        self.push_page(base)
    }

    fn push_page(&mut self, base: RgbaImage) -> PageId {
        let page = Page::new(base);
        let id = page.id;
        self.pages.push(page);
        self.active = Some(id);
        id
    }

    /// Make an existing page active.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PageNotFound`] for an unknown id.
    pub fn select(&mut self, id: PageId) -> Result<(), PipelineError> {
        self.page_index(id).ok_or(PipelineError::PageNotFound(id))?;
        self.active = Some(id);
        Ok(())
    }

    /// Remove a page. If it was active, the first remaining page (if
    /// any) becomes active.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PageNotFound`] for an unknown id.
    pub fn delete(&mut self, id: PageId) -> Result<Page, PipelineError> {
        let index = self.page_index(id).ok_or(PipelineError::PageNotFound(id))?;
        let page = self.pages.remove(index);
        if self.active == Some(id) {
            self.active = self.pages.first().map(Page::id);
        }
        debug!(%id, remaining = self.pages.len(), "page deleted");
        Ok(page)
    }

    /// Set a page's filter, recomputing its preview from the unfiltered
    /// base.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PageNotFound`] for an unknown id.
    pub fn apply_filter(
        &mut self,
        id: PageId,
        filter: FilterKind,
        config: &PipelineConfig,
    ) -> Result<(), PipelineError> {
        let page = self
            .pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PipelineError::PageNotFound(id))?;
        page.preview = apply_filter_with(&page.base, filter, config);
        page.filter = filter;
        Ok(())
    }

    /// Pages in export order.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Filtered rasters in export order.
    pub fn previews(&self) -> impl Iterator<Item = &RgbaImage> {
        self.pages.iter().map(Page::preview)
    }

    #[must_use]
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn page_index(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    #[must_use]
    pub const fn active_id(&self) -> Option<PageId> {
        self.active
    }

    #[must_use]
    pub fn active(&self) -> Option<&Page> {
        self.active.and_then(|id| self.page(id))
    }

    #[must_use]
    pub const fn pending(&self) -> Option<&PendingCrop> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn no_pending_crop() -> PipelineError {
    PipelineError::InvalidArgument("no crop in progress".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    fn scanner() -> Scanner {
        Scanner::default()
    }

    fn photo() -> RgbaImage {
        RgbaImage::from_fn(120, 100, |x, y| {
            Rgba([
                u8::try_from(x * 2).unwrap(),
                u8::try_from(y * 2).unwrap(),
                90,
                255,
            ])
        })
    }

    fn doc_with_pages(n: usize) -> (Document, Vec<PageId>) {
        let mut doc = Document::new();
        let ids = (0..n)
            .map(|_| doc.add_page(RgbaImage::from_pixel(4, 4, Rgba([50, 60, 70, 255]))))
            .collect();
        (doc, ids)
    }

    #[test]
    fn page_ids_are_unique() {
        assert_ne!(PageId::generate(), PageId::generate());
    }

    #[test]
    fn crop_lifecycle_creates_an_active_page() {
        let scanner = scanner();
        let mut doc = Document::new();
        let estimate = doc.begin_crop(&scanner, photo()).unwrap();
        assert_eq!(doc.pending().unwrap().quad(), &estimate.quad);

        let id = doc.confirm_crop(&scanner).unwrap();
        assert!(doc.pending().is_none());
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.active_id(), Some(id));

        let page = doc.active().unwrap();
        assert_eq!(page.filter(), FilterKind::Original);
        assert_eq!(page.preview(), page.base());
    }

    #[test]
    fn adjust_crop_reorders_points() {
        let mut doc = Document::new();
        doc.begin_crop_with_quad(photo(), scanner().default_corners(120, 100))
            .unwrap();
        let quad = doc
            .adjust_crop(&[
                Point::new(100.0, 90.0),
                Point::new(10.0, 5.0),
                Point::new(5.0, 95.0),
                Point::new(110.0, 8.0),
            ])
            .unwrap();
        assert_eq!(quad.top_left(), Point::new(10.0, 5.0));
        assert_eq!(doc.pending().unwrap().quad(), &quad);
    }

    #[test]
    fn adjust_without_pending_crop_is_invalid() {
        let mut doc = Document::new();
        let result = doc.adjust_crop(&[Point::new(0.0, 0.0); 4]);
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn failed_confirm_changes_nothing() {
        let scanner = scanner();
        let mut doc = Document::new();
        doc.begin_crop_with_quad(photo(), scanner.default_corners(120, 100))
            .unwrap();
        doc.adjust_crop(&[
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 0.0),
        ])
        .unwrap();

        let result = doc.confirm_crop(&scanner);
        assert!(matches!(result, Err(PipelineError::DegenerateGeometry(_))));
        assert!(doc.is_empty());
        assert!(doc.active_id().is_none());
        assert!(doc.pending().is_some());
    }

    #[test]
    fn confirm_without_pending_crop_is_invalid() {
        let mut doc = Document::new();
        assert!(matches!(
            doc.confirm_crop(&scanner()),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn cancel_clears_pending_crop() {
        let mut doc = Document::new();
        doc.begin_crop_with_quad(photo(), scanner().default_corners(120, 100))
            .unwrap();
        assert_eq!(doc.pending().unwrap().source(), CornerSource::Manual);
        assert!(doc.cancel_crop().is_some());
        assert!(doc.pending().is_none());
        assert!(doc.cancel_crop().is_none());
    }

    #[test]
    fn zero_sized_crop_is_rejected() {
        let mut doc = Document::new();
        let quad = scanner().default_corners(10, 10);
        assert!(matches!(
            doc.begin_crop_with_quad(RgbaImage::new(0, 0), quad),
            Err(PipelineError::InvalidArgument(_))
        ));
        assert!(doc.pending().is_none());
    }

    #[test]
    fn select_switches_active_page() {
        let (mut doc, ids) = doc_with_pages(3);
        assert_eq!(doc.active_id(), Some(ids[2]));
        doc.select(ids[0]).unwrap();
        assert_eq!(doc.active_id(), Some(ids[0]));
    }

    #[test]
    fn select_unknown_page_fails() {
        let (mut doc, ids) = doc_with_pages(1);
        let stranger = PageId::generate();
        assert!(matches!(
            doc.select(stranger),
            Err(PipelineError::PageNotFound(id)) if id == stranger
        ));
        assert_eq!(doc.active_id(), Some(ids[0]));
    }

    #[test]
    fn deleting_active_page_activates_first_remaining() {
        let (mut doc, ids) = doc_with_pages(3);
        doc.select(ids[1]).unwrap();
        doc.delete(ids[1]).unwrap();
        assert_eq!(doc.active_id(), Some(ids[0]));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn deleting_inactive_page_keeps_selection() {
        let (mut doc, ids) = doc_with_pages(3);
        doc.delete(ids[0]).unwrap();
        assert_eq!(doc.active_id(), Some(ids[2]));
        let order: Vec<_> = doc.pages().iter().map(Page::id).collect();
        assert_eq!(order, vec![ids[1], ids[2]]);
    }

    #[test]
    fn deleting_last_page_clears_selection() {
        let (mut doc, ids) = doc_with_pages(1);
        doc.delete(ids[0]).unwrap();
        assert!(doc.active_id().is_none());
        assert!(doc.is_empty());
        assert!(matches!(
            doc.delete(ids[0]),
            Err(PipelineError::PageNotFound(_))
        ));
    }

    #[test]
    fn filters_are_recomputed_from_base() {
        let (mut doc, ids) = doc_with_pages(1);
        let config = PipelineConfig::default();
        let base = doc.pages()[0].base().clone();

        doc.apply_filter(ids[0], FilterKind::Magic, &config).unwrap();
        doc.apply_filter(ids[0], FilterKind::Magic, &config).unwrap();
        let page = doc.page(ids[0]).unwrap();
        assert_eq!(page.filter(), FilterKind::Magic);
        assert_eq!(page.preview(), &crate::filter::apply_filter(&base, FilterKind::Magic));
        assert_eq!(page.base(), &base);

        doc.apply_filter(ids[0], FilterKind::Original, &config).unwrap();
        assert_eq!(doc.page(ids[0]).unwrap().preview(), &base);
    }

    #[test]
    fn filter_on_unknown_page_fails() {
        let (mut doc, _) = doc_with_pages(1);
        let result = doc.apply_filter(
            PageId::generate(),
            FilterKind::Scan,
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::PageNotFound(_))));
    }

    #[test]
    fn previews_follow_page_order() {
        let (doc, _) = doc_with_pages(3);
        assert_eq!(doc.previews().count(), 3);
    }
}
