//! Capture session management.
//!
//! A session owns the live output for one export: the recorder, the
//! narration audio graph, and the clock both are stamped against. It is
//! started before the first paint and consumed by [`CaptureSession::finish`]
//! or [`CaptureSession::abort`]. Dropping an unfinished session tears the
//! recorder and graph down as well, so every exit path releases them.
//!
//! Painted frames are staged rather than pushed immediately: the recorder
//! only sees a frame once a later one arrives (or the session finishes), and
//! a frame painted at the same instant as the staged one replaces it. Frame
//! timestamps reaching the recorder are therefore strictly increasing.

use std::time::Duration;

use slidecast_common::clock::RecordingClock;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::audio::{AudioGraph, NarrationClip, PlaybackHandle};
use crate::blob::MediaBlob;
use crate::frame::VideoFrame;
use crate::recorder::{MediaRecorder, RecorderStats};

/// Output geometry of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames pushed to the recorder, including re-submitted ones.
    pub frames: u64,

    /// Frames that repeated the previous picture.
    pub resubmitted_frames: u64,

    /// Staged frames replaced by a later paint at the same timestamp.
    pub superseded_frames: u64,

    /// Audio chunks pushed.
    pub audio_chunks: u64,

    /// Recorder-side counters.
    pub recorder: RecorderStats,
}

/// Live audio+video capture for one export.
pub struct CaptureSession {
    config: SessionConfig,
    clock: RecordingClock,
    recorder: Option<Box<dyn MediaRecorder>>,
    graph: AudioGraph,
    staged: Option<VideoFrame>,
    stats: SessionStats,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("config", &self.config)
            .field("elapsed", &self.clock.elapsed())
            .field("graph", &self.graph)
            .field("stats", &self.stats)
            .finish()
    }
}

impl CaptureSession {
    /// Start `recorder` and anchor the session clock.
    pub fn start(
        mut recorder: Box<dyn MediaRecorder>,
        config: SessionConfig,
    ) -> SlidecastResult<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(SlidecastError::capture(format!(
                "Invalid output size {}x{}",
                config.width, config.height
            )));
        }

        recorder.start()?;
        let clock = RecordingClock::start();
        tracing::info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            mime_type = recorder.mime_type(),
            epoch = clock.epoch_wall(),
            "Capture session started"
        );

        Ok(Self {
            config,
            clock,
            recorder: Some(recorder),
            graph: AudioGraph::new(),
            staged: None,
            stats: SessionStats::default(),
        })
    }

    /// Time since recording started.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Play `clip` through the audio graph starting now.
    pub fn attach_narration(&mut self, clip: NarrationClip) -> SlidecastResult<PlaybackHandle> {
        self.sync_audio()?;
        self.graph.attach(clip)
    }

    /// Disconnect the narration source, if any.
    pub fn detach_narration(&mut self) -> bool {
        self.graph.detach()
    }

    /// Stage a freshly painted RGBA frame stamped with the current time.
    pub fn push_frame(&mut self, pixels: Vec<u8>) -> SlidecastResult<()> {
        let frame = VideoFrame::new(
            self.config.width,
            self.config.height,
            self.clock.elapsed(),
            pixels,
        )?;
        self.stage(frame)
    }

    /// Stage the previous picture again at the current time.
    pub fn resubmit_last_frame(&mut self) -> SlidecastResult<()> {
        let Some(last) = &self.staged else {
            return Err(SlidecastError::capture("No frame has been pushed yet"));
        };
        let frame = last.restamped(self.clock.elapsed());
        self.stats.resubmitted_frames += 1;
        self.stage(frame)
    }

    /// Render and push graph audio up to the current time.
    pub fn sync_audio(&mut self) -> SlidecastResult<()> {
        let now = self.clock.elapsed();
        let Some(chunk) = self.graph.render_until(now) else {
            return Ok(());
        };
        self.recorder_mut()?.push_audio(&chunk)?;
        self.stats.audio_chunks += 1;
        Ok(())
    }

    fn stage(&mut self, frame: VideoFrame) -> SlidecastResult<()> {
        match self.staged.take() {
            Some(previous) if previous.timestamp < frame.timestamp => self.submit(&previous)?,
            Some(_) => self.stats.superseded_frames += 1,
            None => {}
        }
        self.staged = Some(frame);
        Ok(())
    }

    fn submit(&mut self, frame: &VideoFrame) -> SlidecastResult<()> {
        self.sync_audio()?;
        self.recorder_mut()?.push_video(frame)?;
        self.stats.frames += 1;
        Ok(())
    }

    fn flush_staged(&mut self) -> SlidecastResult<()> {
        match self.staged.take() {
            Some(frame) => self.submit(&frame),
            None => Ok(()),
        }
    }

    fn recorder_mut(&mut self) -> SlidecastResult<&mut Box<dyn MediaRecorder>> {
        self.recorder
            .as_mut()
            .ok_or_else(|| SlidecastError::capture("Capture session already closed"))
    }

    /// Stop recording and assemble the blob.
    ///
    /// Any failure while finalizing discards the partial output.
    pub async fn finish(mut self) -> SlidecastResult<MediaBlob> {
        let synced = self.flush_staged().and_then(|_| self.sync_audio());
        self.graph.close();
        let mut recorder = self
            .recorder
            .take()
            .ok_or_else(|| SlidecastError::capture("Capture session already closed"))?;
        if let Err(e) = synced {
            recorder.abort();
            return Err(e);
        }

        let mime_type = recorder.mime_type().to_string();
        let (recorder, chunks) = tokio::task::spawn_blocking(move || {
            let chunks = recorder.stop();
            (recorder, chunks)
        })
        .await
        .map_err(|e| SlidecastError::recorder(format!("Recorder finalization task failed: {e}")))?;
        let chunks = chunks?;

        self.stats.recorder = recorder.stats();
        let blob = MediaBlob::assemble(mime_type, chunks);
        tracing::info!(
            bytes = blob.len(),
            frames = self.stats.frames,
            audio_chunks = self.stats.audio_chunks,
            duration_ms = self.clock.elapsed().as_millis() as u64,
            "Capture session finished"
        );
        Ok(blob)
    }

    /// Tear down without producing output.
    pub fn abort(mut self) {
        self.teardown("aborted");
    }

    fn teardown(&mut self, reason: &str) {
        self.graph.close();
        if let Some(mut recorder) = self.recorder.take() {
            recorder.abort();
            tracing::warn!(reason, frames = self.stats.frames, "Capture session discarded");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown("dropped before finish");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioChunk, GRAPH_SAMPLE_RATE};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Log {
        started: bool,
        stopped: bool,
        aborted: bool,
        video: Vec<Duration>,
        audio: Vec<(Duration, u64, bool)>,
    }

    struct FakeRecorder {
        log: Arc<Mutex<Log>>,
        chunks: Vec<Vec<u8>>,
        fail_stop: bool,
    }

    impl MediaRecorder for FakeRecorder {
        fn mime_type(&self) -> &str {
            "video/webm;codecs=vp8,opus"
        }
        fn start(&mut self) -> SlidecastResult<()> {
            self.log.lock().unwrap().started = true;
            Ok(())
        }
        fn push_video(&mut self, frame: &VideoFrame) -> SlidecastResult<()> {
            self.log.lock().unwrap().video.push(frame.timestamp);
            Ok(())
        }
        fn push_audio(&mut self, chunk: &AudioChunk) -> SlidecastResult<()> {
            self.log
                .lock()
                .unwrap()
                .audio
                .push((chunk.timestamp, chunk.frames(), chunk.is_silent()));
            Ok(())
        }
        fn stop(&mut self) -> SlidecastResult<Vec<Vec<u8>>> {
            self.log.lock().unwrap().stopped = true;
            if self.fail_stop {
                return Err(SlidecastError::recorder("muxer exploded"));
            }
            Ok(std::mem::take(&mut self.chunks))
        }
        fn abort(&mut self) {
            self.log.lock().unwrap().aborted = true;
        }
        fn stats(&self) -> RecorderStats {
            RecorderStats::default()
        }
    }

    const CONFIG: SessionConfig = SessionConfig {
        width: 2,
        height: 2,
        fps: 10,
    };

    fn session(fail_stop: bool) -> (CaptureSession, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let recorder = FakeRecorder {
            log: log.clone(),
            chunks: vec![vec![1, 2], vec![], vec![3]],
            fail_stop,
        };
        (CaptureSession::start(Box::new(recorder), CONFIG).unwrap(), log)
    }

    fn pixels() -> Vec<u8> {
        vec![255; 16]
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_and_audio_share_the_clock() {
        let (mut session, log) = session(false);
        assert!(log.lock().unwrap().started);

        session.push_frame(pixels()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.push_frame(pixels()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.resubmit_last_frame().unwrap();

        let blob = session.finish().await.unwrap();
        assert_eq!(blob.bytes, vec![1, 2, 3]);

        let log = log.lock().unwrap();
        assert_eq!(
            log.video,
            vec![Duration::ZERO, Duration::from_millis(100), Duration::from_millis(200)]
        );
        // Silence fills the gaps between frames.
        assert_eq!(log.audio.len(), 2);
        assert_eq!(log.audio[0], (Duration::ZERO, 4800, true));
        assert_eq!(log.audio[1].0, Duration::from_millis(100));
        assert!(log.stopped);
        assert!(!log.aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_narration_plays_between_frames() {
        let (mut session, log) = session(false);
        session.push_frame(pixels()).unwrap();

        let clip = NarrationClip::from_interleaved(vec![0.25; 9600], GRAPH_SAMPLE_RATE, 2).unwrap();
        let handle = session.attach_narration(clip).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        session.push_frame(pixels()).unwrap();

        assert!(handle.wait().await.is_ended());
        assert!(session.detach_narration());
        assert!(!log.lock().unwrap().audio[0].2);
        session.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_instant_paint_supersedes_staged_frame() {
        let (mut session, log) = session(false);
        session.push_frame(vec![1; 16]).unwrap();
        session.push_frame(vec![2; 16]).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.push_frame(vec![3; 16]).unwrap();
        assert_eq!(session.stats().superseded_frames, 1);

        session.finish().await.unwrap();
        assert_eq!(
            log.lock().unwrap().video,
            vec![Duration::ZERO, Duration::from_millis(50)]
        );
    }

    #[tokio::test]
    async fn test_resubmit_before_first_frame_fails() {
        let (mut session, _log) = session(false);
        assert!(session.resubmit_last_frame().is_err());
    }

    #[tokio::test]
    async fn test_wrong_frame_size_rejected() {
        let (mut session, _log) = session(false);
        assert!(session.push_frame(vec![0; 3]).is_err());
    }

    #[tokio::test]
    async fn test_finalization_failure_is_fatal() {
        let (mut session, log) = session(true);
        session.push_frame(pixels()).unwrap();
        let err = session.finish().await.unwrap_err();
        assert!(matches!(err, SlidecastError::Recorder { .. }));
        assert!(log.lock().unwrap().stopped);
    }

    #[tokio::test]
    async fn test_drop_tears_down() {
        let (mut session, log) = session(false);
        let clip =
            NarrationClip::from_interleaved(vec![0.1; 96_000], GRAPH_SAMPLE_RATE, 2).unwrap();
        let handle = session.attach_narration(clip).unwrap();
        drop(session);

        assert!(log.lock().unwrap().aborted);
        assert!(!handle.wait().await.is_ended());
    }

    #[test]
    fn test_zero_size_rejected() {
        let log = Arc::new(Mutex::new(Log::default()));
        let recorder = FakeRecorder {
            log,
            chunks: vec![],
            fail_stop: false,
        };
        let config = SessionConfig {
            width: 0,
            ..CONFIG
        };
        assert!(CaptureSession::start(Box::new(recorder), config).is_err());
    }
}
