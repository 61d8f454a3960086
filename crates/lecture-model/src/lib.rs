//! Slidecast Lecture Model
//!
//! Defines the data contracts the compositor consumes:
//! - **Draft:** A generated lecture (title, summary, ordered slides, and an
//!   optional embedded source document)
//! - **Slide:** One narrated visual unit with optional media references
//! - **Options:** Output dimensions, frame rate, and fallback slide timing
//!
//! Drafts are produced elsewhere and are read-only for the duration of an
//! export.

pub mod draft;
pub mod options;

pub use draft::*;
pub use options::*;
