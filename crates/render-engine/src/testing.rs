//! In-memory doubles for exercising the export pipeline in tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use slidecast_capture_engine::audio::GRAPH_SAMPLE_RATE;
use slidecast_capture_engine::recorder::RecorderStats;
use slidecast_capture_engine::{AudioChunk, MediaRecorder, VideoFrame};
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_source_loader::PageRasterizer;

use crate::export::ExportBackend;
use crate::fetch::MediaFetcher;
use crate::raster::RasterSurface;
use crate::surface::{Color, DrawingSurface, Paint, Rect, Shadow};
use crate::text::{TextMeasure, TextStyle};

/// Fetcher serving canned bytes by exact locator.
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    entries: HashMap<String, Vec<u8>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MapFetcher {
    pub fn with(mut self, locator: &str, bytes: Vec<u8>) -> Self {
        self.entries.insert(locator.to_string(), bytes);
        self
    }

    /// Locators requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MapFetcher {
    async fn fetch(&self, locator: &str) -> SlidecastResult<Vec<u8>> {
        self.requests.lock().unwrap().push(locator.to_string());
        self.entries
            .get(locator)
            .cloned()
            .ok_or_else(|| SlidecastError::fetch(format!("404 for {locator}")))
    }
}

/// PNG-encoded gradient of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255])
    });
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// 16-bit mono PCM WAV holding a 440 Hz tone.
pub fn wav_bytes(duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    let frames = sample_rate as u64 * duration_ms / 1000;
    let samples: Vec<i16> = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 12_000.0) as i16
        })
        .collect();

    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
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

/// One audio chunk as seen by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEntry {
    pub timestamp: Duration,
    pub frames: u64,
    pub silent: bool,
}

impl AudioEntry {
    pub fn end(&self) -> Duration {
        self.timestamp
            + Duration::from_nanos(self.frames * 1_000_000_000 / GRAPH_SAMPLE_RATE as u64)
    }
}

/// Everything a [`FakeRecorder`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecorderLog {
    pub started: bool,
    pub stopped: bool,
    pub aborted: bool,
    pub video: Vec<Duration>,
    pub audio: Vec<AudioEntry>,
}

/// Recorder that logs calls and emits fixed chunks.
pub struct FakeRecorder {
    log: Arc<Mutex<RecorderLog>>,
    fail_stop: bool,
    fail_push_after: Option<usize>,
}

impl MediaRecorder for FakeRecorder {
    fn mime_type(&self) -> &str {
        "video/webm;codecs=vp9,opus"
    }

    fn start(&mut self) -> SlidecastResult<()> {
        self.log.lock().unwrap().started = true;
        Ok(())
    }

    fn push_video(&mut self, frame: &VideoFrame) -> SlidecastResult<()> {
        let mut log = self.log.lock().unwrap();
        if self.fail_push_after.is_some_and(|limit| log.video.len() >= limit) {
            return Err(SlidecastError::recorder("encoder rejected frame"));
        }
        log.video.push(frame.timestamp);
        Ok(())
    }

    fn push_audio(&mut self, chunk: &AudioChunk) -> SlidecastResult<()> {
        self.log.lock().unwrap().audio.push(AudioEntry {
            timestamp: chunk.timestamp,
            frames: chunk.frames(),
            silent: chunk.is_silent(),
        });
        Ok(())
    }

    fn stop(&mut self) -> SlidecastResult<Vec<Vec<u8>>> {
        self.log.lock().unwrap().stopped = true;
        if self.fail_stop {
            return Err(SlidecastError::recorder("muxer failed to finalize"));
        }
        Ok(vec![FakeBackend::OUTPUT[..2].to_vec(), Vec::new(), FakeBackend::OUTPUT[2..].to_vec()])
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().aborted = true;
    }

    fn stats(&self) -> RecorderStats {
        let log = self.log.lock().unwrap();
        RecorderStats {
            video_frames: log.video.len() as u64,
            audio_chunks: log.audio.len() as u64,
            ..RecorderStats::default()
        }
    }
}

/// Document of `pages` blank pages that records which pages were drawn.
#[derive(Debug, Clone)]
pub struct PagedDocument {
    pages: u32,
    rendered: Arc<Mutex<Vec<u32>>>,
}

impl PagedDocument {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            rendered: Arc::default(),
        }
    }

    /// 1-based pages rasterized so far.
    pub fn rendered(&self) -> Vec<u32> {
        self.rendered.lock().unwrap().clone()
    }
}

impl PageRasterizer for PagedDocument {
    fn page_count(&self, _document: &[u8]) -> SlidecastResult<u32> {
        Ok(self.pages)
    }

    fn render_page(
        &self,
        _document: &[u8],
        page_index: u32,
        target_width: u32,
    ) -> SlidecastResult<RgbaImage> {
        self.rendered.lock().unwrap().push(page_index + 1);
        let height = target_width * 4 / 3;
        Ok(RgbaImage::from_pixel(target_width, height, Rgba([250, 250, 250, 255])))
    }

    fn name(&self) -> &str {
        "paged-fake"
    }
}

/// Backend wiring the doubles above together.
pub struct FakeBackend {
    fetcher: Arc<MapFetcher>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
    log: Arc<Mutex<RecorderLog>>,
    codecs: bool,
    fail_stop: bool,
    fail_push_after: Option<usize>,
    paint_latency: Option<Duration>,
}

impl FakeBackend {
    /// Bytes of every successful recording.
    pub const OUTPUT: &'static [u8] = b"WEBM";

    pub fn new(fetcher: MapFetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            rasterizer: None,
            log: Arc::default(),
            codecs: true,
            fail_stop: false,
            fail_push_after: None,
            paint_latency: None,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: PagedDocument) -> Self {
        self.rasterizer = Some(Arc::new(rasterizer));
        self
    }

    pub fn without_codecs(mut self) -> Self {
        self.codecs = false;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Reject video once `frames` frames have been accepted.
    pub fn failing_push_after(mut self, frames: usize) -> Self {
        self.fail_push_after = Some(frames);
        self
    }

    /// Block for `latency` on every pixel read back from the surface.
    pub fn with_paint_latency(mut self, latency: Duration) -> Self {
        self.paint_latency = Some(latency);
        self
    }

    pub fn log(&self) -> RecorderLog {
        self.log.lock().unwrap().clone()
    }
}

impl ExportBackend for FakeBackend {
    fn create_surface(
        &self,
        width: u32,
        height: u32,
    ) -> SlidecastResult<Box<dyn DrawingSurface + Send>> {
        let inner = RasterSurface::without_text(width, height);
        Ok(match self.paint_latency {
            Some(latency) => Box::new(SlowSurface { inner, latency }),
            None => Box::new(inner),
        })
    }

    fn create_recorder(
        &self,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> SlidecastResult<Box<dyn MediaRecorder>> {
        if !self.codecs {
            return Err(SlidecastError::unsupported("No supported codec pairing"));
        }
        Ok(Box::new(FakeRecorder {
            log: self.log.clone(),
            fail_stop: self.fail_stop,
            fail_push_after: self.fail_push_after,
        }))
    }

    fn fetcher(&self) -> Arc<dyn MediaFetcher> {
        self.fetcher.clone()
    }

    fn rasterizer(&self) -> Option<Arc<dyn PageRasterizer>> {
        self.rasterizer.clone()
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Raster surface whose pixel readback stalls, like a large canvas would.
struct SlowSurface {
    inner: RasterSurface,
    latency: Duration,
}

impl TextMeasure for SlowSurface {
    fn measure_text(&self, text: &str, style: &TextStyle) -> f32 {
        self.inner.measure_text(text, style)
    }
}

impl DrawingSurface for SlowSurface {
    fn width(&self) -> u32 {
        self.inner.width()
    }
    fn height(&self) -> u32 {
        self.inner.height()
    }
    fn clear(&mut self, color: Color) {
        self.inner.clear(color)
    }
    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        self.inner.fill_rect(rect, paint)
    }
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, paint: &Paint) {
        self.inner.fill_rounded_rect(rect, radius, paint)
    }
    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, line_width: f32, paint: &Paint) {
        self.inner.stroke_rounded_rect(rect, radius, line_width, paint)
    }
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint) {
        self.inner.fill_circle(cx, cy, radius, paint)
    }
    #[allow(clippy::too_many_arguments)]
    fn stroke_arc(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        start: f32,
        end: f32,
        line_width: f32,
        paint: &Paint,
    ) {
        self.inner.stroke_arc(cx, cy, radius, start, end, line_width, paint)
    }
    fn draw_image(&mut self, image: &RgbaImage, src: Rect, dest: Rect) {
        self.inner.draw_image(image, src, dest)
    }
    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle, color: Color) {
        self.inner.fill_text(text, x, y, style, color)
    }
    fn save(&mut self) {
        self.inner.save()
    }
    fn restore(&mut self) {
        self.inner.restore()
    }
    fn clip_rounded_rect(&mut self, rect: Rect, radius: f32) {
        self.inner.clip_rounded_rect(rect, radius)
    }
    fn set_global_alpha(&mut self, alpha: f32) {
        self.inner.set_global_alpha(alpha)
    }
    fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.inner.set_shadow(shadow)
    }
    fn read_pixels(&self) -> Vec<u8> {
        std::thread::sleep(self.latency);
        self.inner.read_pixels()
    }
    fn write_pixels(&mut self, pixels: &[u8]) {
        self.inner.write_pixels(pixels)
    }
}
