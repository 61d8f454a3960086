//! Live stream recorder.
//!
//! [`MediaRecorder`] is the seam between the capture session and whatever
//! encodes the stream. The production implementation is a GStreamer
//! pipeline fed through `appsrc` and drained through `appsink`.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::audio::{AudioChunk, GRAPH_CHANNELS, GRAPH_SAMPLE_RATE};
use crate::codec::{select_pairing, CodecPairing};
use crate::frame::VideoFrame;

/// Trait for a live audio+video recorder.
///
/// Frames and audio chunks arrive in presentation order. `stop` flushes
/// the encoder and returns every encoded chunk in emission order.
pub trait MediaRecorder: Send {
    /// Media type of the produced recording.
    fn mime_type(&self) -> &str;

    /// Start recording. Must be called before any push.
    fn start(&mut self) -> SlidecastResult<()>;

    /// Submit one video frame.
    fn push_video(&mut self, frame: &VideoFrame) -> SlidecastResult<()>;

    /// Submit rendered audio.
    fn push_audio(&mut self, chunk: &AudioChunk) -> SlidecastResult<()>;

    /// Finish the stream and return the encoded chunks.
    fn stop(&mut self) -> SlidecastResult<Vec<Vec<u8>>>;

    /// Tear down without finalizing. Output is discarded.
    fn abort(&mut self);

    /// Get recorder statistics.
    fn stats(&self) -> RecorderStats;
}

/// Runtime statistics from a recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Video frames submitted.
    pub video_frames: u64,

    /// Audio chunks submitted.
    pub audio_chunks: u64,

    /// Encoded chunks emitted by the muxer.
    pub chunks_emitted: u64,

    /// Encoded bytes emitted by the muxer.
    pub bytes_emitted: u64,
}

/// Recorder backed by a GStreamer encode/mux pipeline.
pub struct GstMediaRecorder {
    pairing: &'static CodecPairing,
    pipeline: gst::Pipeline,
    video_src: gst::Element,
    audio_src: gst::Element,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    stats: RecorderStats,
    frame_duration: gst::ClockTime,
}

impl std::fmt::Debug for GstMediaRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GstMediaRecorder")
            .field("mime_type", &self.pairing.mime_type)
            .field("stats", &self.stats)
            .finish()
    }
}

impl GstMediaRecorder {
    /// Pick the best pairing this host can encode.
    pub fn negotiate() -> SlidecastResult<&'static CodecPairing> {
        init_gstreamer().map_err(|e| SlidecastError::unsupported(e.to_string()))?;
        let pairing = select_pairing(|name| gst::ElementFactory::find(name).is_some())?;
        tracing::info!(mime_type = pairing.mime_type, "Recording format selected");
        Ok(pairing)
    }

    /// Negotiate a pairing and build a recorder for it.
    pub fn with_best_pairing(width: u32, height: u32, fps: u32) -> SlidecastResult<Self> {
        let pairing = Self::negotiate()?;
        Self::new(pairing, width, height, fps)
    }

    /// Build the pipeline for `pairing`. The pipeline stays idle until
    /// [`MediaRecorder::start`].
    pub fn new(
        pairing: &'static CodecPairing,
        width: u32,
        height: u32,
        fps: u32,
    ) -> SlidecastResult<Self> {
        init_gstreamer()?;

        let launch = launch_description(pairing, width, height, fps);
        tracing::debug!(%launch, "Building recorder pipeline");

        let element = gst::parse::launch(&launch).map_err(|e| {
            SlidecastError::recorder(format!("Failed to build recorder pipeline: {e}"))
        })?;
        let pipeline = element
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| SlidecastError::recorder("Launch string did not produce a pipeline"))?;

        let video_src = named(&pipeline, "video")?;
        let audio_src = named(&pipeline, "audio")?;
        let sink = named(&pipeline, "sink")?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&chunks);
        sink.connect("new-sample", false, move |values| {
            let flow = match values.first().and_then(|v| v.get::<gst::Element>().ok()) {
                Some(sink) => collect_sample(&sink, &collected),
                None => gst::FlowReturn::Error,
            };
            Some(flow.to_value())
        });

        Ok(Self {
            pairing,
            pipeline,
            video_src,
            audio_src,
            chunks,
            stats: RecorderStats::default(),
            frame_duration: gst::ClockTime::from_nseconds(1_000_000_000 / fps.max(1) as u64),
        })
    }

    fn push_buffer(
        &self,
        src: &gst::Element,
        buffer: gst::Buffer,
        what: &str,
    ) -> SlidecastResult<()> {
        let flow = src.emit_by_name::<gst::FlowReturn>("push-buffer", &[&buffer]);
        if flow != gst::FlowReturn::Ok {
            return Err(SlidecastError::recorder(format!(
                "Recorder rejected {what} buffer: {flow:?}"
            )));
        }
        Ok(())
    }

    fn check_bus(&self) -> SlidecastResult<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(e) = msg.view() {
                return Err(SlidecastError::recorder(format!(
                    "Recorder pipeline error: {}",
                    e.error()
                )));
            }
        }
        Ok(())
    }

    /// Wait for EOS to propagate through the muxer.
    fn drain(&self) -> SlidecastResult<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        let deadline = Duration::from_secs(10);
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return Err(SlidecastError::recorder("Recorder did not finalize within 10s"));
            }
            let remaining = gst::ClockTime::from_nseconds((deadline - elapsed).as_nanos() as u64);
            match bus.timed_pop(remaining) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => {
                        tracing::debug!("EOS received; recorder drained");
                        return Ok(());
                    }
                    gst::MessageView::Error(e) => {
                        return Err(SlidecastError::recorder(format!(
                            "Recorder failed while finalizing: {}",
                            e.error()
                        )));
                    }
                    _ => {}
                },
                None => {
                    return Err(SlidecastError::recorder("Recorder did not finalize within 10s"));
                }
            }
        }
    }

    fn set_null(&self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to reset recorder pipeline");
        }
    }
}

impl MediaRecorder for GstMediaRecorder {
    fn mime_type(&self) -> &str {
        self.pairing.mime_type
    }

    fn start(&mut self) -> SlidecastResult<()> {
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            SlidecastError::recorder(format!("Failed to start recorder: {e:?}"))
        })?;
        tracing::info!(mime_type = self.pairing.mime_type, "Recorder started");
        Ok(())
    }

    fn push_video(&mut self, frame: &VideoFrame) -> SlidecastResult<()> {
        self.check_bus()?;
        let mut buffer = gst::Buffer::from_slice(frame.pixels().to_vec());
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| SlidecastError::recorder("Video buffer is not writable"))?;
            buffer.set_pts(gst::ClockTime::from_nseconds(frame.timestamp.as_nanos() as u64));
            buffer.set_duration(self.frame_duration);
        }
        self.push_buffer(&self.video_src, buffer, "video")?;
        self.stats.video_frames += 1;
        Ok(())
    }

    fn push_audio(&mut self, chunk: &AudioChunk) -> SlidecastResult<()> {
        if chunk.samples.is_empty() {
            return Ok(());
        }
        let bytes: Vec<u8> = chunk.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buffer = gst::Buffer::from_slice(bytes);
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| SlidecastError::recorder("Audio buffer is not writable"))?;
            buffer.set_pts(gst::ClockTime::from_nseconds(chunk.timestamp.as_nanos() as u64));
            buffer.set_duration(gst::ClockTime::from_nseconds(
                chunk.duration().as_nanos() as u64,
            ));
        }
        self.push_buffer(&self.audio_src, buffer, "audio")?;
        self.stats.audio_chunks += 1;
        Ok(())
    }

    fn stop(&mut self) -> SlidecastResult<Vec<Vec<u8>>> {
        for src in [&self.video_src, &self.audio_src] {
            let flow = src.emit_by_name::<gst::FlowReturn>("end-of-stream", &[]);
            if flow != gst::FlowReturn::Ok {
                tracing::warn!(?flow, "Failed to signal end of stream; output may be truncated");
            }
        }

        let drained = self.drain();
        self.set_null();
        drained?;

        let chunks = std::mem::take(
            &mut *self
                .chunks
                .lock()
                .map_err(|_| SlidecastError::recorder("Chunk buffer poisoned"))?,
        );
        self.stats.chunks_emitted = chunks.len() as u64;
        self.stats.bytes_emitted = chunks.iter().map(|c| c.len() as u64).sum();
        tracing::info!(
            chunks = self.stats.chunks_emitted,
            bytes = self.stats.bytes_emitted,
            video_frames = self.stats.video_frames,
            "Recorder stopped"
        );
        Ok(chunks)
    }

    fn abort(&mut self) {
        self.set_null();
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.clear();
        }
    }

    fn stats(&self) -> RecorderStats {
        self.stats.clone()
    }
}

fn collect_sample(sink: &gst::Element, chunks: &Mutex<Vec<Vec<u8>>>) -> gst::FlowReturn {
    let Some(sample) = sink.emit_by_name::<Option<gst::Sample>>("pull-sample", &[]) else {
        return gst::FlowReturn::Eos;
    };
    let Some(buffer) = sample.buffer() else {
        return gst::FlowReturn::Ok;
    };
    let Ok(map) = buffer.map_readable() else {
        return gst::FlowReturn::Error;
    };
    match chunks.lock() {
        Ok(mut chunks) => {
            chunks.push(map.as_slice().to_vec());
            gst::FlowReturn::Ok
        }
        Err(_) => gst::FlowReturn::Error,
    }
}

fn named(pipeline: &gst::Pipeline, name: &str) -> SlidecastResult<gst::Element> {
    pipeline
        .by_name(name)
        .ok_or_else(|| {
            SlidecastError::recorder(format!("Recorder pipeline has no '{name}' element"))
        })
}

/// GStreamer launch string for one recording.
pub fn launch_description(pairing: &CodecPairing, width: u32, height: u32, fps: u32) -> String {
    let fps = fps.max(1);
    // One keyframe every 2 seconds.
    let keyint = fps.saturating_mul(2).max(2);
    format!(
        "appsrc name=video format=time is-live=true do-timestamp=false \
         caps=video/x-raw,format=RGBA,width={width},height={height},framerate={fps}/1 \
         ! queue max-size-buffers=64 ! videoconvert ! video/x-raw,format=I420 \
         ! {venc} deadline=1 cpu-used=8 keyframe-max-dist={keyint} ! queue ! mux. \
         appsrc name=audio format=time is-live=true do-timestamp=false \
         caps=audio/x-raw,format=F32LE,rate={rate},channels={channels},layout=interleaved \
         ! queue ! audioconvert ! audioresample ! {aenc} ! queue ! mux. \
         {mux} name=mux streamable=true ! appsink name=sink emit-signals=true sync=false",
        venc = pairing.video_encoder,
        aenc = pairing.audio_encoder,
        mux = pairing.muxer,
        rate = GRAPH_SAMPLE_RATE,
        channels = GRAPH_CHANNELS,
    )
}

fn init_gstreamer() -> SlidecastResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(SlidecastError::recorder(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}
