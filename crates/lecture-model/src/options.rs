//! Export options accepted by the timeline driver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Extra time a narrated slide stays on screen after its audio ends.
pub const NARRATION_TAIL_MS: u64 = 300;

/// How long the final frame is held before the recorder is stopped.
pub const END_HOLD_MS: u64 = 500;

/// Output parameters for one export.
///
/// Every field is optional in serialized form and falls back to the
/// documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// On-screen time for slides without narration, and the minimum for
    /// narrated slides.
    pub default_slide_duration_ms: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            default_slide_duration_ms: 4000,
        }
    }
}

impl ExportOptions {
    /// Fallback slide duration.
    pub fn default_slide_duration(&self) -> Duration {
        Duration::from_millis(self.default_slide_duration_ms)
    }

    /// Tail appended to narration playback time.
    pub fn narration_tail(&self) -> Duration {
        Duration::from_millis(NARRATION_TAIL_MS)
    }

    /// Final-frame hold before finalizing.
    pub fn end_hold(&self) -> Duration {
        Duration::from_millis(END_HOLD_MS)
    }

    /// On-screen duration of a slide.
    ///
    /// Without narration this is exactly the default duration; with it, the
    /// larger of playback time plus tail and the default.
    pub fn slide_duration(&self, narration: Option<Duration>) -> Duration {
        match narration {
            Some(played) => (played + self.narration_tail()).max(self.default_slide_duration()),
            None => self.default_slide_duration(),
        }
    }

    /// Reject dimensions the renderer cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "output dimensions must be non-zero (got {}x{})",
                self.width, self.height
            ));
        }
        if self.fps == 0 {
            return Err("frame rate must be at least 1".to_string());
        }
        Ok(())
    }
}
