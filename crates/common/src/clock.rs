//! Clock and frame pacing utilities for the export timeline.
//!
//! Every export is anchored to a monotonic epoch taken when the capture
//! session starts. Video frames and audio samples are both stamped against
//! that epoch, which keeps narration and slides in sync.
//!
//! The clock reads `tokio::time::Instant`, so tests can pause and advance
//! time deterministically.

use std::time::Duration;

use tokio::time::Instant;

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Time elapsed since recording start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Fixed-rate frame pacing for one output stream.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    /// Create a pacer for the given frame rate. A zero rate is treated as 1.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / fps.max(1) as u64),
        }
    }

    /// Time between two frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of frames needed to cover `duration`. Never less than one.
    pub fn frames_for(&self, duration: Duration) -> u64 {
        let interval_ns = self.interval.as_nanos().max(1);
        let frames = duration.as_nanos().div_ceil(interval_ns);
        (frames as u64).max(1)
    }

    /// Index of the frame slot that `elapsed` falls in.
    pub fn slot_at(&self, elapsed: Duration) -> u64 {
        (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as u64
    }

    /// Progress fraction for frame `index` out of `total` frames.
    ///
    /// The first frame reports 0.0 and the last reports 1.0; a single
    /// frame reports 1.0.
    pub fn progress_at(index: u64, total: u64) -> f64 {
        if total <= 1 {
            return 1.0;
        }
        (index as f64 / (total - 1) as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_elapsed_follows_tokio_time() {
        let clock = RecordingClock::start();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        assert!(!clock.epoch_wall().is_empty());
    }

    #[test]
    fn test_pacer_interval() {
        assert_eq!(FramePacer::new(10).interval(), Duration::from_millis(100));
        assert_eq!(FramePacer::new(0).interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_slot_at() {
        let pacer = FramePacer::new(30);
        assert_eq!(pacer.slot_at(Duration::ZERO), 0);
        assert_eq!(pacer.slot_at(pacer.interval() * 3), 3);
        assert_eq!(pacer.slot_at(Duration::from_millis(99)), 2);
        assert_eq!(pacer.slot_at(Duration::from_secs(4)), 120);
    }

    #[test]
    fn test_frames_for_rounds_up() {
        let pacer = FramePacer::new(10);
        assert_eq!(pacer.frames_for(Duration::from_millis(500)), 5);
        assert_eq!(pacer.frames_for(Duration::from_millis(501)), 6);
        assert_eq!(pacer.frames_for(Duration::ZERO), 1);
    }

    #[test]
    fn test_progress_endpoints() {
        assert_eq!(FramePacer::progress_at(0, 5), 0.0);
        assert_eq!(FramePacer::progress_at(4, 5), 1.0);
        assert!((FramePacer::progress_at(2, 5) - 0.5).abs() < 1e-9);
        assert_eq!(FramePacer::progress_at(0, 1), 1.0);
    }
}
