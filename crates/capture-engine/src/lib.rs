//! Slidecast Capture Engine
//!
//! Owns everything between the painted surface and the finished media
//! blob: the narration audio graph, the live capture session, and the
//! recorder that encodes and muxes the stream.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 CaptureSession                 │
//! │  ┌──────────────┐        ┌──────────────────┐ │
//! │  │ VideoFrame   │        │ AudioGraph       │ │
//! │  │ (push/resend)│        │ narration | ∅    │ │
//! │  └──────┬───────┘        └────────┬─────────┘ │
//! │         │   shared RecordingClock │           │
//! │         ▼                         ▼           │
//! │  ┌─────────────────────────────────────────┐  │
//! │  │ MediaRecorder (vp9|vp8 + opus → webm)   │  │
//! │  └─────────────────────┬───────────────────┘  │
//! └────────────────────────┼──────────────────────┘
//!                          ▼
//!                     MediaBlob
//! ```

pub mod audio;
pub mod blob;
pub mod codec;
pub mod frame;
pub mod recorder;
pub mod session;

pub use audio::{AudioChunk, AudioGraph, NarrationClip, PlaybackHandle, PlaybackOutcome};
pub use blob::MediaBlob;
pub use codec::{select_pairing, CodecPairing, PREFERRED_PAIRINGS};
pub use frame::VideoFrame;
pub use recorder::{GstMediaRecorder, MediaRecorder};
pub use session::*;
