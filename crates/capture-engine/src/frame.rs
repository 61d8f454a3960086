//! Raw video frames handed from the surface to the recorder.

use std::sync::Arc;
use std::time::Duration;

use slidecast_common::error::{SlidecastError, SlidecastResult};

/// One RGBA video frame stamped against the session clock.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,

    /// Presentation time relative to the start of recording.
    pub timestamp: Duration,

    /// Tightly packed RGBA8 pixels, row-major.
    pixels: Arc<Vec<u8>>,
}

impl VideoFrame {
    /// Wrap RGBA pixels. The buffer must be exactly `width * height * 4`
    /// bytes.
    pub fn new(
        width: u32,
        height: u32,
        timestamp: Duration,
        pixels: Vec<u8>,
    ) -> SlidecastResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(SlidecastError::capture(format!(
                "Frame buffer of {} bytes does not match {width}x{height} RGBA",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            timestamp,
            pixels: Arc::new(pixels),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The same picture at a later presentation time. Pixels are shared.
    pub fn restamped(&self, timestamp: Duration) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}
