//! Timeline driver and export entry point.
//!
//! One call to [`export_lecture`] owns one capture session end to end:
//! slides are fetched, painted and paced strictly in order while the
//! session records, then the last frame is held briefly and the recording
//! is finalized.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use slidecast_capture_engine::{
    CaptureSession, GstMediaRecorder, MediaBlob, MediaRecorder, PlaybackHandle, PlaybackOutcome,
    SessionConfig,
};
use slidecast_common::clock::FramePacer;
use slidecast_common::config::AppConfig;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_lecture_model::{ExportOptions, LectureDraft, Slide};
use slidecast_source_loader::{PageRasterizer, SourceDocument};
use tokio::time::Instant;

use crate::compositor::{paint_progress_bar, paint_static, progress_fraction, PageSnapshot};
use crate::fetch::{load_image, load_narration, HttpMediaFetcher, MediaFetcher};
use crate::raster::{FontSet, RasterSurface};
use crate::surface::{DrawingSurface, Rect};

/// Extra time granted to a narration handle past its clip length.
const PLAYBACK_GRACE: Duration = Duration::from_secs(1);

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone, Serialize)]
pub struct ExportProgress {
    /// Overall progress [0.0, 1.0].
    pub progress: f64,

    /// Slide being painted (0-based).
    pub slide_index: usize,

    pub total_slides: usize,

    /// Progress within the current slide [0.0, 1.0].
    pub slide_progress: f64,

    /// Frames painted so far, including each slide's initial paint.
    pub frames_rendered: u64,

    /// Recording time at this report.
    pub elapsed: Duration,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Platform services an export runs on.
pub trait ExportBackend: Send + Sync {
    /// Drawing surface of the output size.
    fn create_surface(
        &self,
        width: u32,
        height: u32,
    ) -> SlidecastResult<Box<dyn DrawingSurface + Send>>;

    /// Recorder for the output stream, using the best codec pairing the
    /// host supports.
    fn create_recorder(
        &self,
        width: u32,
        height: u32,
        fps: u32,
    ) -> SlidecastResult<Box<dyn MediaRecorder>>;

    fn fetcher(&self) -> Arc<dyn MediaFetcher>;

    /// Page rasterizer for embedded source documents, if any.
    fn rasterizer(&self) -> Option<Arc<dyn PageRasterizer>>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Software surface, GStreamer recorder, reqwest fetcher, pdfium pages.
pub struct NativeBackend {
    fonts: Arc<FontSet>,
    fetcher: Arc<dyn MediaFetcher>,
    rasterizer: Option<Arc<dyn PageRasterizer>>,
}

impl NativeBackend {
    /// Load fonts and build the fetcher. Relative media paths resolve
    /// against `media_dir`.
    pub fn from_config(config: &AppConfig, media_dir: Option<&Path>) -> SlidecastResult<Self> {
        let fonts = Arc::new(FontSet::load(&config.fonts)?);
        let mut fetcher = HttpMediaFetcher::new()?;
        if let Some(dir) = media_dir {
            fetcher = fetcher.with_base_dir(dir);
        }
        Ok(Self {
            fonts,
            fetcher: Arc::new(fetcher),
            rasterizer: default_rasterizer(),
        })
    }
}

#[cfg(feature = "pdf")]
fn default_rasterizer() -> Option<Arc<dyn PageRasterizer>> {
    Some(Arc::new(slidecast_source_loader::pdfium::PdfiumRasterizer::new()))
}

#[cfg(not(feature = "pdf"))]
fn default_rasterizer() -> Option<Arc<dyn PageRasterizer>> {
    None
}

impl ExportBackend for NativeBackend {
    fn create_surface(
        &self,
        width: u32,
        height: u32,
    ) -> SlidecastResult<Box<dyn DrawingSurface + Send>> {
        Ok(Box::new(RasterSurface::new(width, height, self.fonts.clone())))
    }

    fn create_recorder(
        &self,
        width: u32,
        height: u32,
        fps: u32,
    ) -> SlidecastResult<Box<dyn MediaRecorder>> {
        Ok(Box::new(GstMediaRecorder::with_best_pairing(width, height, fps)?))
    }

    fn fetcher(&self) -> Arc<dyn MediaFetcher> {
        self.fetcher.clone()
    }

    fn rasterizer(&self) -> Option<Arc<dyn PageRasterizer>> {
        self.rasterizer.clone()
    }

    fn name(&self) -> &str {
        "native"
    }
}

/// Export `draft` to one encoded recording.
///
/// This is the main entry point for rendering. Missing or broken slide
/// media degrade to absent; only setup and finalization failures are
/// returned.
pub async fn export_lecture(
    draft: &LectureDraft,
    options: &ExportOptions,
    backend: &dyn ExportBackend,
    progress: Option<ProgressCallback>,
) -> SlidecastResult<MediaBlob> {
    let reporter = Reporter {
        callback: progress,
        total_slides: draft.slides.len(),
    };

    tracing::info!(
        draft = %draft.id,
        slides = draft.slides.len(),
        width = options.width,
        height = options.height,
        fps = options.fps,
        backend = backend.name(),
        "Starting export"
    );

    let result = run_export(draft, options, backend, &reporter).await;
    match &result {
        Ok(blob) => {
            tracing::info!(bytes = blob.len(), mime_type = %blob.mime_type, "Export complete");
        }
        Err(e) => {
            tracing::error!(error = %e, "Export failed");
            reporter.stage(ExportStage::Failed, 0, 0, Duration::ZERO);
        }
    }
    result
}

async fn run_export(
    draft: &LectureDraft,
    options: &ExportOptions,
    backend: &dyn ExportBackend,
    reporter: &Reporter,
) -> SlidecastResult<MediaBlob> {
    options.validate().map_err(SlidecastError::config)?;
    if draft.slides.is_empty() {
        return Err(SlidecastError::render("Draft has no slides"));
    }
    reporter.stage(ExportStage::Preparing, 0, 0, Duration::ZERO);

    let surface = backend.create_surface(options.width, options.height)?;
    let recorder = backend.create_recorder(options.width, options.height, options.fps)?;
    let document = SourceDocument::from_draft(draft, backend.rasterizer()).await;
    let pages = crate::pages::assign_pages(&draft.slides, document.page_count());

    let session = CaptureSession::start(
        recorder,
        SessionConfig {
            width: options.width,
            height: options.height,
            fps: options.fps,
        },
    )?;

    let mut timeline = Timeline {
        draft,
        options,
        pacer: FramePacer::new(options.fps),
        fetcher: backend.fetcher(),
        document,
        surface,
        session,
        reporter,
        frames: 0,
    };

    for (index, page) in pages.into_iter().enumerate() {
        timeline.play_slide(index, page).await?;
    }
    timeline.hold_last_frame().await?;

    let Timeline { session, frames, .. } = timeline;
    let last = draft.slides.len() - 1;
    reporter.stage(ExportStage::Finalizing, last, frames, session.elapsed());
    let elapsed = session.elapsed();
    let stats = session.stats();
    tracing::debug!(
        painted = frames,
        pushed = stats.frames,
        resubmitted = stats.resubmitted_frames,
        superseded = stats.superseded_frames,
        audio_chunks = stats.audio_chunks,
        "Timeline finished"
    );
    let blob = session.finish().await?;
    reporter.stage(ExportStage::Complete, last, frames, elapsed);
    Ok(blob)
}

struct Reporter {
    callback: Option<ProgressCallback>,
    total_slides: usize,
}

impl Reporter {
    fn emit(
        &self,
        stage: ExportStage,
        slide_index: usize,
        slide_progress: f64,
        frames: u64,
        elapsed: Duration,
    ) {
        let Some(callback) = &self.callback else {
            return;
        };
        let progress = match stage {
            ExportStage::Preparing => 0.0,
            ExportStage::Finalizing | ExportStage::Complete => 1.0,
            _ => progress_fraction(slide_index, self.total_slides, slide_progress),
        };
        callback(ExportProgress {
            progress,
            slide_index,
            total_slides: self.total_slides,
            slide_progress,
            frames_rendered: frames,
            elapsed,
            stage,
        });
    }

    fn stage(&self, stage: ExportStage, slide_index: usize, frames: u64, elapsed: Duration) {
        let slide_progress = if stage == ExportStage::Preparing { 0.0 } else { 1.0 };
        self.emit(stage, slide_index, slide_progress, frames, elapsed);
    }
}

/// Mutable state of one export run.
struct Timeline<'a> {
    draft: &'a LectureDraft,
    options: &'a ExportOptions,
    pacer: FramePacer,
    fetcher: Arc<dyn MediaFetcher>,
    document: SourceDocument,
    surface: Box<dyn DrawingSurface + Send>,
    session: CaptureSession,
    reporter: &'a Reporter,
    frames: u64,
}

impl Timeline<'_> {
    async fn play_slide(&mut self, index: usize, page: Option<u32>) -> SlidecastResult<()> {
        let draft = self.draft;
        let slide = &draft.slides[index];
        let fetcher = self.fetcher.as_ref();
        let document = &self.document;

        let (background, snapshot, narration) = tokio::join!(
            async {
                match slide.image_ref() {
                    Some(locator) => load_image(fetcher, locator).await,
                    None => None,
                }
            },
            async {
                match page {
                    Some(page) => document.render_page(page as i64).await,
                    None => None,
                }
            },
            async {
                match slide.audio_ref() {
                    Some(locator) => load_narration(fetcher, locator).await,
                    None => None,
                }
            },
        );
        let background = background.as_deref();
        let snapshot = snapshot.as_deref().map(|image| PageSnapshot { image, page });

        let layout = paint_static(self.surface.as_mut(), slide, background, snapshot, index);
        let base = self.surface.read_pixels();
        self.paint_frame(slide, &base, layout.card, index, 0.0)?;

        let handle = match narration {
            Some(clip) => match self.session.attach_narration(clip) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(slide = index + 1, error = %e, "Narration could not start");
                    None
                }
            },
            None => None,
        };

        let duration = self
            .options
            .slide_duration(handle.as_ref().map(PlaybackHandle::duration));
        let frames = self.pacer.frames_for(duration);
        tracing::info!(
            slide = index + 1,
            total = draft.slides.len(),
            duration_ms = duration.as_millis() as u64,
            frames,
            narration = handle.is_some(),
            page = ?page,
            visual = ?layout.visual,
            "Slide started"
        );

        // The slide ends on the clock, not on a frame count: when a paint
        // overruns its slot, the slots it overran are skipped. The last
        // slot (progress 1) is always painted.
        let start = Instant::now();
        let interval = self.pacer.interval();
        let mut i = 0;
        let mut dropped = 0;
        while i < frames {
            let progress = FramePacer::progress_at(i, frames);
            let painted = Instant::now();
            self.paint_frame(slide, &base, layout.card, index, progress)?;
            let cost = painted.elapsed();
            self.reporter.emit(
                ExportStage::Rendering,
                index,
                progress,
                self.frames,
                self.session.elapsed(),
            );
            tokio::time::sleep_until(start + interval * (i as u32 + 1)).await;

            // Aim the next paint at the slot it will finish in.
            let due = self.pacer.slot_at(start.elapsed() + cost).min(frames - 1);
            let next = due.max(i + 1);
            dropped += next - i - 1;
            i = next;
        }
        if dropped > 0 {
            tracing::warn!(
                slide = index + 1,
                dropped,
                frames,
                "Painting fell behind the clock; frames dropped"
            );
        }

        if let Some(handle) = handle {
            self.session.sync_audio()?;
            let limit = handle.duration() + PLAYBACK_GRACE;
            match tokio::time::timeout(limit, handle.wait()).await {
                Ok(PlaybackOutcome::Ended { played }) => {
                    tracing::debug!(
                        slide = index + 1,
                        played_ms = played.as_millis() as u64,
                        "Narration ended"
                    );
                }
                Ok(PlaybackOutcome::Failed { reason }) => {
                    tracing::warn!(
                        slide = index + 1,
                        reason = %reason,
                        "Narration failed; treating as ended"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        slide = index + 1,
                        "Narration did not report completion; moving on"
                    );
                }
            }
            self.session.detach_narration();
        }
        Ok(())
    }

    /// Restore the slide's static layer, draw the progress bar over it
    /// and hand the picture to the session.
    fn paint_frame(
        &mut self,
        slide: &Slide,
        base: &[u8],
        card: Rect,
        index: usize,
        progress: f64,
    ) -> SlidecastResult<()> {
        let surface = self.surface.as_mut();
        surface.write_pixels(base);
        paint_progress_bar(surface, slide, card, index, self.draft.slides.len(), progress);
        self.session.push_frame(surface.read_pixels())?;
        self.frames += 1;
        Ok(())
    }

    /// Keep the last picture on screen so the recording's tail is not cut.
    async fn hold_last_frame(&mut self) -> SlidecastResult<()> {
        let frames = self.pacer.frames_for(self.options.end_hold());
        let interval = self.pacer.interval();
        let start = Instant::now();
        let mut i = 0;
        while i < frames {
            self.session.resubmit_last_frame()?;
            tokio::time::sleep_until(start + interval * (i as u32 + 1)).await;
            i = self.pacer.slot_at(start.elapsed()).max(i + 1);
        }
        Ok(())
    }
}
