//! Source document decoding and page rendering.

use std::sync::Arc;

use image::RgbaImage;
use slidecast_common::error::SlidecastResult;
use slidecast_lecture_model::{decode_base64_payload, LectureDraft};

use crate::cache::SnapshotCache;

/// Shared, immutable decoded image.
pub type Bitmap = Arc<RgbaImage>;

/// Target width of page snapshots. Height follows the page aspect ratio.
pub const SNAPSHOT_WIDTH: u32 = 520;

/// Backend that can count and rasterize pages of an encoded document.
///
/// Calls are blocking; the loader runs them on the blocking thread pool.
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, document: &[u8]) -> SlidecastResult<u32>;

    /// Render the 0-based page `page_index` at `target_width` pixels wide.
    fn render_page(
        &self,
        document: &[u8],
        page_index: u32,
        target_width: u32,
    ) -> SlidecastResult<RgbaImage>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// The decoded source document of one export.
///
/// Scoped to a single export call: the snapshot cache lives and dies with
/// it.
pub struct SourceDocument {
    bytes: Arc<Vec<u8>>,
    page_count: u32,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    cache: SnapshotCache,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("bytes", &self.bytes.len())
            .field("page_count", &self.page_count)
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|r| r.name().to_string()),
            )
            .finish()
    }
}

impl SourceDocument {
    /// A document with no pages. Every snapshot request yields `None`.
    pub fn empty() -> Self {
        Self {
            bytes: Arc::new(Vec::new()),
            page_count: 0,
            rasterizer: None,
            cache: SnapshotCache::new(),
        }
    }

    /// Decode the document embedded in `draft`.
    pub async fn from_draft(
        draft: &LectureDraft,
        rasterizer: Option<Arc<dyn PageRasterizer>>,
    ) -> Self {
        Self::load(draft.pdf_document_base64.as_deref(), rasterizer).await
    }

    /// Decode a base64 (or `data:` URL) encoded document.
    ///
    /// Never fails: a missing document, bad base64, a missing rasterizer or
    /// an unreadable document all produce an empty document.
    pub async fn load(
        encoded: Option<&str>,
        rasterizer: Option<Arc<dyn PageRasterizer>>,
    ) -> Self {
        let Some(encoded) = encoded.filter(|s| !s.trim().is_empty()) else {
            return Self::empty();
        };

        let bytes = match decode_base64_payload(encoded) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Source document could not be decoded; snapshots disabled"
                );
                return Self::empty();
            }
        };

        let Some(rasterizer) = rasterizer else {
            tracing::warn!("No page rasterizer available; snapshots disabled");
            return Self::empty();
        };

        Self::from_bytes(bytes, rasterizer).await
    }

    /// Open already-decoded document bytes.
    pub async fn from_bytes(bytes: Vec<u8>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        let bytes = Arc::new(bytes);
        let counted = {
            let bytes = Arc::clone(&bytes);
            let rasterizer = Arc::clone(&rasterizer);
            tokio::task::spawn_blocking(move || rasterizer.page_count(&bytes)).await
        };

        let page_count = match counted {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    backend = rasterizer.name(),
                    "Source document unreadable; snapshots disabled"
                );
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "Page count task failed; snapshots disabled");
                0
            }
        };

        tracing::info!(
            pages = page_count,
            bytes = bytes.len(),
            backend = rasterizer.name(),
            "Source document loaded"
        );

        Self {
            bytes,
            page_count,
            rasterizer: Some(rasterizer),
            cache: SnapshotCache::new(),
        }
    }

    /// Number of pages. Zero when no document is usable.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Whether any page can be rendered.
    pub fn is_available(&self) -> bool {
        self.page_count > 0 && self.rasterizer.is_some()
    }

    /// Clamp a requested 1-based page number into `[1, page_count]`.
    pub fn clamp_page(&self, page: i64) -> Option<u32> {
        if self.page_count == 0 {
            return None;
        }
        Some(page.clamp(1, self.page_count as i64) as u32)
    }

    /// Rendered snapshot of page `page` (1-based, clamped).
    pub async fn render_page(&self, page: i64) -> Option<Bitmap> {
        let page = self.clamp_page(page)?;
        let rasterizer = self.rasterizer.as_ref()?;

        self.cache
            .get_or_render(page, || {
                let bytes = Arc::clone(&self.bytes);
                let rasterizer = Arc::clone(rasterizer);
                async move { rasterize(bytes, rasterizer, page).await }
            })
            .await
    }
}

async fn rasterize(
    bytes: Arc<Vec<u8>>,
    rasterizer: Arc<dyn PageRasterizer>,
    page: u32,
) -> Option<Bitmap> {
    let rendered = tokio::task::spawn_blocking(move || {
        rasterizer.render_page(&bytes, page - 1, SNAPSHOT_WIDTH)
    })
    .await;

    match rendered {
        Ok(Ok(image)) if image.width() > 0 && image.height() > 0 => {
            tracing::debug!(
                page,
                width = image.width(),
                height = image.height(),
                "Rendered page snapshot"
            );
            Some(Arc::new(image))
        }
        Ok(Ok(_)) => {
            tracing::warn!(page, "Page rendered to an empty bitmap; treating as absent");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(page, error = %e, "Failed to render page snapshot");
            None
        }
        Err(e) => {
            tracing::warn!(page, error = %e, "Page render task failed");
            None
        }
    }
}
