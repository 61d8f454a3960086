//! Slidecast Source Loader
//!
//! Decodes the source document embedded in a lecture draft and serves
//! rasterized page snapshots on demand.
//!
//! ```text
//! pdfDocumentBase64 ──► decode ──► page count
//!                                     │
//! render_page(n) ──► clamp(n) ──► SnapshotCache ──► PageRasterizer
//!                                  (one in-flight render per page)
//! ```
//!
//! Nothing here aborts an export: an undecodable document behaves like a
//! document with no pages, and a page that fails to render is `None`.

pub mod cache;
pub mod document;
#[cfg(feature = "pdf")]
pub mod pdfium;

pub use cache::SnapshotCache;
pub use document::*;
