//! Narration audio graph.
//!
//! The graph has one output and at most one attached narration source.
//! The capture session pulls mixed samples from it up to each video frame
//! timestamp, so audio and video advance on the same clock. With no source
//! attached the graph renders silence, which keeps the audio track
//! continuous across silent slides.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use slidecast_common::error::{SlidecastError, SlidecastResult};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::oneshot;

/// Output sample rate of the graph.
pub const GRAPH_SAMPLE_RATE: u32 = 48_000;

/// Output channel count of the graph (interleaved stereo).
pub const GRAPH_CHANNELS: u16 = 2;

/// Decoded narration, normalized to the graph format.
#[derive(Debug, Clone)]
pub struct NarrationClip {
    /// Interleaved stereo f32 at [`GRAPH_SAMPLE_RATE`].
    samples: Arc<Vec<f32>>,
}

impl NarrationClip {
    /// Build a clip from interleaved samples in any rate/channel layout.
    pub fn from_interleaved(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> SlidecastResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(SlidecastError::audio(format!(
                "Invalid audio format: {sample_rate} Hz, {channels} channels"
            )));
        }
        let stereo = to_stereo(&samples, channels);
        let samples = if sample_rate == GRAPH_SAMPLE_RATE {
            stereo
        } else {
            resample_linear(&stereo, sample_rate, GRAPH_SAMPLE_RATE)
        };
        Ok(Self {
            samples: Arc::new(samples),
        })
    }

    /// Decode an encoded audio file (mp3, wav, ogg, flac, m4a...).
    ///
    /// `extension_hint` speeds up probing when the source URL carries one.
    /// Decoding is CPU bound; callers on the runtime should use
    /// `spawn_blocking`.
    pub fn decode(bytes: Vec<u8>, extension_hint: Option<&str>) -> SlidecastResult<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SlidecastError::audio(format!("Unrecognized audio format: {e}")))?;
        let mut format = detected.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SlidecastError::audio("No decodable audio track"))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SlidecastError::audio(format!("Unsupported audio codec: {e}")))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(SlidecastError::audio(format!("Audio demux failed: {e}")));
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!(error = %e, "Skipping undecodable audio packet");
                }
                Err(e) => {
                    return Err(SlidecastError::audio(format!("Audio decode failed: {e}")));
                }
            }
        }

        let (Some(rate), Some(channels)) = (sample_rate, channels) else {
            return Err(SlidecastError::audio("Audio stream has no format information"));
        };

        Self::from_interleaved(samples, rate, channels)
    }

    /// Length in sample frames at the graph rate.
    pub fn frames(&self) -> u64 {
        (self.samples.len() / GRAPH_CHANNELS as usize) as u64
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frames(), GRAPH_SAMPLE_RATE)
    }

    fn frame(&self, index: u64) -> Option<&[f32]> {
        let start = index as usize * GRAPH_CHANNELS as usize;
        self.samples.get(start..start + GRAPH_CHANNELS as usize)
    }
}

/// How a narration playback ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// The clip played to its natural end.
    Ended { played: Duration },

    /// Playback stopped early (source detached, graph closed).
    Failed { reason: String },
}

impl PlaybackOutcome {
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }
}

/// Completion handle for one attached narration clip.
#[derive(Debug)]
pub struct PlaybackHandle {
    duration: Duration,
    outcome: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackHandle {
    /// Decoded length of the clip being played.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Wait for playback to end or fail.
    pub async fn wait(self) -> PlaybackOutcome {
        self.outcome.await.unwrap_or_else(|_| PlaybackOutcome::Failed {
            reason: "playback abandoned".to_string(),
        })
    }
}

/// A block of rendered graph output.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Presentation time of the first sample.
    pub timestamp: Duration,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved f32 samples.
    pub samples: Vec<f32>,
}

impl AudioChunk {
    /// Number of sample frames.
    pub fn frames(&self) -> u64 {
        (self.samples.len() / self.channels.max(1) as usize) as u64
    }

    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frames(), self.sample_rate)
    }

    /// Whether every sample is zero.
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0.0)
    }
}

struct ActiveSource {
    clip: NarrationClip,
    started_at: u64,
    done: Option<oneshot::Sender<PlaybackOutcome>>,
}

impl ActiveSource {
    fn finish(&mut self, outcome: PlaybackOutcome) {
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }
    }
}

/// Single-source audio graph feeding the recorder.
pub struct AudioGraph {
    sample_rate: u32,
    rendered: u64,
    active: Option<ActiveSource>,
    closed: bool,
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("sample_rate", &self.sample_rate)
            .field("rendered", &self.rendered)
            .field("has_source", &self.active.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph {
    pub fn new() -> Self {
        Self {
            sample_rate: GRAPH_SAMPLE_RATE,
            rendered: 0,
            active: None,
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output position (how much audio has been rendered).
    pub fn position(&self) -> Duration {
        frames_to_duration(self.rendered, self.sample_rate)
    }

    pub fn has_source(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Attach `clip` and start playing it at the current output position.
    ///
    /// Any previously attached source is disconnected first.
    pub fn attach(&mut self, clip: NarrationClip) -> SlidecastResult<PlaybackHandle> {
        if self.closed {
            return Err(SlidecastError::audio("Audio graph is closed"));
        }
        self.detach();

        let (tx, rx) = oneshot::channel();
        let duration = clip.duration();
        tracing::debug!(
            duration_ms = duration.as_millis() as u64,
            at_ms = self.position().as_millis() as u64,
            "Narration attached"
        );

        self.active = Some(ActiveSource {
            clip,
            started_at: self.rendered,
            done: Some(tx),
        });
        self.check_completion();

        Ok(PlaybackHandle {
            duration,
            outcome: rx,
        })
    }

    /// Disconnect the current source. Returns whether one was attached.
    ///
    /// A source detached before its natural end reports
    /// [`PlaybackOutcome::Failed`].
    pub fn detach(&mut self) -> bool {
        match self.active.take() {
            Some(mut source) => {
                source.finish(PlaybackOutcome::Failed {
                    reason: "source detached before completion".to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Render output from the current position up to `until`.
    ///
    /// Returns `None` when `until` is not ahead of the current position.
    pub fn render_until(&mut self, until: Duration) -> Option<AudioChunk> {
        if self.closed {
            return None;
        }
        let target = duration_to_frames(until, self.sample_rate);
        if target <= self.rendered {
            return None;
        }

        let channels = GRAPH_CHANNELS as usize;
        let count = (target - self.rendered) as usize;
        let mut samples = vec![0.0f32; count * channels];

        if let Some(source) = &self.active {
            for i in 0..count {
                let frame_index = self.rendered + i as u64;
                let Some(offset) = frame_index.checked_sub(source.started_at) else {
                    continue;
                };
                match source.clip.frame(offset) {
                    Some(frame) => samples[i * channels..(i + 1) * channels].copy_from_slice(frame),
                    None => break,
                }
            }
        }

        let chunk = AudioChunk {
            timestamp: self.position(),
            sample_rate: self.sample_rate,
            channels: GRAPH_CHANNELS,
            samples,
        };
        self.rendered = target;
        self.check_completion();
        Some(chunk)
    }

    /// Release the graph. Any playing source reports failure.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut source) = self.active.take() {
            source.finish(PlaybackOutcome::Failed {
                reason: "audio graph closed".to_string(),
            });
        }
        self.closed = true;
        tracing::debug!(position_ms = self.position().as_millis() as u64, "Audio graph closed");
    }

    fn check_completion(&mut self) {
        if let Some(source) = &mut self.active {
            if self.rendered.saturating_sub(source.started_at) >= source.clip.frames() {
                let played = source.clip.duration();
                source.finish(PlaybackOutcome::Ended { played });
            }
        }
    }
}

fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    Duration::from_nanos((frames as u128 * 1_000_000_000 / sample_rate.max(1) as u128) as u64)
}

fn duration_to_frames(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_nanos() * sample_rate as u128 / 1_000_000_000) as u64
}

/// Map any channel layout onto interleaved stereo.
///
/// Mono is duplicated; layouts with more than two channels keep the first
/// two.
fn to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|s| [*s, *s]).collect(),
        n => samples
            .chunks_exact(n as usize)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Linear-interpolation resampler over interleaved stereo.
fn resample_linear(stereo: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let in_frames = stereo.len() / 2;
    if in_frames == 0 {
        return Vec::new();
    }
    let out_frames = (in_frames as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;

    let mut out = Vec::with_capacity(out_frames * 2);
    for i in 0..out_frames {
        let pos = i as f64 * step;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;
        let next = (idx + 1).min(in_frames - 1);
        for ch in 0..2 {
            let a = stereo[idx * 2 + ch];
            let b = stereo[next * 2 + ch];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tone(ms: u64) -> NarrationClip {
        let frames = GRAPH_SAMPLE_RATE as u64 * ms / 1000;
        NarrationClip::from_interleaved(vec![0.5; frames as usize * 2], GRAPH_SAMPLE_RATE, 2)
            .unwrap()
    }

    /// 16-bit PCM mono WAV.
    fn wav_bytes(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_mono_is_duplicated() {
        assert_eq!(to_stereo(&[0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(to_stereo(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3), vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_resample_preserves_duration() {
        let clip = NarrationClip::from_interleaved(vec![0.0; 24_000], 24_000, 1).unwrap();
        assert_eq!(clip.frames(), 48_000);
        assert_eq!(clip.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(NarrationClip::from_interleaved(vec![], 0, 2).is_err());
        assert!(NarrationClip::from_interleaved(vec![], 48_000, 0).is_err());
    }

    #[test]
    fn test_decode_wav() {
        let samples: Vec<i16> = (0..4000).map(|i| ((i % 40) * 500) as i16).collect();
        let clip = NarrationClip::decode(wav_bytes(8000, &samples), Some("wav")).unwrap();
        assert_eq!(clip.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = NarrationClip::decode(b"this is not audio at all".to_vec(), None).unwrap_err();
        assert!(matches!(err, SlidecastError::Audio { .. }));
    }

    #[test]
    fn test_silence_without_source() {
        let mut graph = AudioGraph::new();
        let chunk = graph.render_until(Duration::from_millis(100)).unwrap();
        assert_eq!(chunk.frames(), 4800);
        assert!(chunk.is_silent());
        assert!(graph.render_until(Duration::from_millis(100)).is_none());
        assert_eq!(graph.position(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_playback_completes_when_rendered_past_end() {
        let mut graph = AudioGraph::new();
        graph.render_until(Duration::from_millis(50));

        let handle = graph.attach(tone(200)).unwrap();
        assert_eq!(handle.duration(), Duration::from_millis(200));

        let first = graph.render_until(Duration::from_millis(150)).unwrap();
        assert_eq!(first.timestamp, Duration::from_millis(50));
        assert!(!first.is_silent());

        let tail = graph.render_until(Duration::from_millis(400)).unwrap();
        // 100 ms of tone then silence.
        assert_eq!(tail.samples[0], 0.5);
        assert_eq!(*tail.samples.last().unwrap(), 0.0);

        assert_eq!(
            handle.wait().await,
            PlaybackOutcome::Ended {
                played: Duration::from_millis(200)
            }
        );
    }

    #[tokio::test]
    async fn test_detach_reports_failure() {
        let mut graph = AudioGraph::new();
        let handle = graph.attach(tone(1000)).unwrap();
        graph.render_until(Duration::from_millis(10));
        assert!(graph.detach());
        assert!(!graph.detach());
        assert!(!handle.wait().await.is_ended());

        let after = graph.render_until(Duration::from_millis(20)).unwrap();
        assert!(after.is_silent());
    }

    #[tokio::test]
    async fn test_attach_replaces_previous_source() {
        let mut graph = AudioGraph::new();
        let first = graph.attach(tone(1000)).unwrap();
        let second = graph.attach(tone(10)).unwrap();
        assert!(!first.wait().await.is_ended());

        graph.render_until(Duration::from_millis(10));
        assert!(second.wait().await.is_ended());
    }

    #[tokio::test]
    async fn test_close_fails_playback_and_rejects_attach() {
        let mut graph = AudioGraph::new();
        let handle = graph.attach(tone(500)).unwrap();
        graph.close();
        assert!(graph.is_closed());
        assert!(!handle.wait().await.is_ended());
        assert!(graph.attach(tone(10)).is_err());
        assert!(graph.render_until(Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_empty_clip_ends_immediately() {
        let mut graph = AudioGraph::new();
        let clip = NarrationClip::from_interleaved(vec![], GRAPH_SAMPLE_RATE, 2).unwrap();
        let handle = graph.attach(clip).unwrap();
        assert!(handle.wait().await.is_ended());
    }

    proptest! {
        #[test]
        fn prop_rendered_chunks_tile_the_timeline(
            steps in prop::collection::vec(0u64..200, 1..40),
        ) {
            let mut graph = AudioGraph::new();
            let mut now = Duration::ZERO;
            let mut rendered = 0u64;
            for step in steps {
                now += Duration::from_millis(step);
                if let Some(chunk) = graph.render_until(now) {
                    prop_assert_eq!(
                        chunk.timestamp,
                        frames_to_duration(rendered, GRAPH_SAMPLE_RATE)
                    );
                    rendered += chunk.frames();
                }
            }
            prop_assert_eq!(rendered, duration_to_frames(now, GRAPH_SAMPLE_RATE));
        }
    }
}
