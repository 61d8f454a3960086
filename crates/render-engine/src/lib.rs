//! Slidecast Render Engine
//!
//! Paints lecture slides onto a drawing surface and drives them through a
//! live capture session, producing one encoded recording per draft.
//!
//! # Pipeline Architecture
//!
//! ```text
//! draft.json ──┐
//!              ├── page assignment (source snapshots)
//! pdf pages ───┘         │
//!                        ├── fetch image + narration (per slide)
//! media URLs ────────────┘         │
//!                                  ├── paint_slide (theme, card, media)
//!                                  │        │  repainted at fps
//!                                  ▼        ▼
//!                            CaptureSession (video + narration)
//!                                           │
//!                                           ▼
//!                                  recording.webm
//! ```

pub mod compositor;
pub mod export;
pub mod fetch;
pub mod pages;
pub mod raster;
pub mod surface;
pub mod text;
pub mod theme;

#[cfg(test)]
mod testing;

pub use export::*;
