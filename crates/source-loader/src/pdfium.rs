//! PDF page rasterization via pdfium.

use std::path::PathBuf;
use std::sync::Mutex;

use image::RgbaImage;
use pdfium_render::prelude::*;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::document::PageRasterizer;

/// Rasterizer backed by the pdfium dynamic library.
///
/// The library is bound per call. pdfium is not reentrant, so calls are
/// serialized.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    guard: Mutex<()>,
}

impl PdfiumRasterizer {
    /// Use the system pdfium library (or one next to the executable).
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer a pdfium library located in `dir`.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
            guard: Mutex::new(()),
        }
    }

    /// Whether the pdfium library can be bound on this host.
    pub fn is_available(&self) -> bool {
        self.bind().is_ok()
    }

    fn bind(&self) -> SlidecastResult<Pdfium> {
        let dir = self
            .library_dir
            .as_ref()
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_else(|| "./".to_string());
        let local = Pdfium::pdfium_platform_library_name_at_path(dir.as_str());
        let bindings = Pdfium::bind_to_library(local)
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| {
                SlidecastError::unsupported(format!("pdfium library not available: {e}"))
            })?;
        Ok(Pdfium::new(bindings))
    }

    fn with_document<T>(
        &self,
        bytes: &[u8],
        f: impl FnOnce(&PdfDocument<'_>) -> SlidecastResult<T>,
    ) -> SlidecastResult<T> {
        let _serial = self.guard.lock().unwrap_or_else(|p| p.into_inner());
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| SlidecastError::source(format!("failed to open PDF: {e}")))?;
        f(&document)
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, document: &[u8]) -> SlidecastResult<u32> {
        self.with_document(document, |doc| Ok(doc.pages().len() as u32))
    }

    fn render_page(
        &self,
        document: &[u8],
        page_index: u32,
        target_width: u32,
    ) -> SlidecastResult<RgbaImage> {
        self.with_document(document, |doc| {
            let index = page_index
                .try_into()
                .map_err(|_| {
                    SlidecastError::source(format!("page index {page_index} out of range"))
                })?;
            let number = page_index + 1;
            let page = doc
                .pages()
                .get(index)
                .map_err(|e| SlidecastError::source(format!("page {number} unavailable: {e}")))?;

            let config = PdfRenderConfig::new().set_target_width(target_width as i32);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| SlidecastError::render(format!("page {number} render failed: {e}")))?;

            let width = bitmap.width().max(0) as u32;
            let height = bitmap.height().max(0) as u32;
            RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
                SlidecastError::render(format!(
                    "page {} produced a malformed {width}x{height} bitmap",
                    page_index + 1
                ))
            })
        })
    }

    fn name(&self) -> &str {
        "pdfium"
    }
}
