//! Best-effort loading of slide media.
//!
//! Locators may be `http(s)://` URLs, `data:` URLs, `file://` URLs or plain
//! filesystem paths. Every failure past the fetcher boundary degrades to
//! `None` with a warning; a missing picture or narration never stops an
//! export.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use slidecast_capture_engine::NarrationClip;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_lecture_model::decode_base64_payload;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves the raw bytes behind a media locator.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, locator: &str) -> SlidecastResult<Vec<u8>>;
}

/// Fetcher backed by `reqwest` for network URLs and the filesystem for
/// everything else.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
}

impl HttpMediaFetcher {
    pub fn new() -> SlidecastResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("slidecast/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| SlidecastError::fetch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_dir: None,
        })
    }

    /// Resolve relative paths against `dir` (usually the draft's folder).
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn fetch_http(&self, url: &str) -> SlidecastResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SlidecastError::fetch(format!("GET {url}: {e}")))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| SlidecastError::fetch(format!("Reading body of {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, locator: &str) -> SlidecastResult<Vec<u8>> {
        let locator = locator.trim();
        if locator.starts_with("data:") {
            return decode_data_url(locator);
        }
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return self.fetch_http(locator).await;
        }

        let path = self.resolve_path(locator.strip_prefix("file://").unwrap_or(locator));
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SlidecastError::FileNotFound { path },
            _ => SlidecastError::fetch(format!("Reading {}: {e}", path.display())),
        })
    }
}

/// Payload of a `data:` URL: base64 when marked `;base64`, raw otherwise.
pub fn decode_data_url(url: &str) -> SlidecastResult<Vec<u8>> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| SlidecastError::fetch("Not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| SlidecastError::fetch("Data URL has no payload"))?;

    if meta.ends_with(";base64") {
        decode_base64_payload(payload).map_err(|e| SlidecastError::fetch(e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Container hint for the decoder, from a data URL's media type or the
/// locator's file extension.
pub fn extension_hint(locator: &str) -> Option<String> {
    if let Some(rest) = locator.trim().strip_prefix("data:") {
        let mime = rest.split([';', ',']).next()?.to_ascii_lowercase();
        let ext = match mime.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" | "audio/opus" => "ogg",
            "audio/flac" | "audio/x-flac" => "flac",
            "audio/mp4" | "audio/aac" | "audio/x-m4a" => "m4a",
            "audio/webm" => "webm",
            _ => return None,
        };
        return Some(ext.to_string());
    }

    let path = locator.split(['?', '#']).next()?;
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Short form of a locator for logs; data URLs are reduced to their type.
pub fn display_locator(locator: &str) -> String {
    const MAX: usize = 96;
    let locator = locator.trim();
    if let Some(rest) = locator.strip_prefix("data:") {
        let meta = rest.split(',').next().unwrap_or_default();
        return format!("data:{meta},…");
    }
    if locator.chars().count() > MAX {
        let head: String = locator.chars().take(MAX).collect();
        return format!("{head}…");
    }
    locator.to_string()
}

/// Fetch and decode an image; `None` on any failure or an empty image.
pub async fn load_image(fetcher: &dyn MediaFetcher, locator: &str) -> Option<Arc<RgbaImage>> {
    let shown = display_locator(locator);
    let bytes = match fetcher.fetch(locator).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(locator = %shown, error = %e, "Image fetch failed");
            return None;
        }
    };

    let decoded = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map(|image| image.to_rgba8())
    })
    .await;

    match decoded {
        Ok(Ok(image)) if image.width() > 0 && image.height() > 0 => {
            tracing::debug!(
                locator = %shown,
                width = image.width(),
                height = image.height(),
                "Image loaded"
            );
            Some(Arc::new(image))
        }
        Ok(Ok(_)) => {
            tracing::warn!(locator = %shown, "Image has no pixels");
            None
        }
        Ok(Err(e)) => {
            tracing::warn!(locator = %shown, error = %e, "Image decode failed");
            None
        }
        Err(e) => {
            tracing::warn!(locator = %shown, error = %e, "Image decode task failed");
            None
        }
    }
}

/// Fetch and fully decode narration audio; `None` on any failure.
pub async fn load_narration(fetcher: &dyn MediaFetcher, locator: &str) -> Option<NarrationClip> {
    let shown = display_locator(locator);
    let bytes = match fetcher.fetch(locator).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(locator = %shown, error = %e, "Narration fetch failed");
            return None;
        }
    };

    let hint = extension_hint(locator);
    let decoded =
        tokio::task::spawn_blocking(move || NarrationClip::decode(bytes, hint.as_deref())).await;

    match decoded {
        Ok(Ok(clip)) => {
            tracing::debug!(
                locator = %shown,
                duration_ms = clip.duration().as_millis() as u64,
                "Narration decoded"
            );
            Some(clip)
        }
        Ok(Err(e)) => {
            tracing::warn!(locator = %shown, error = %e, "Narration decode failed");
            None
        }
        Err(e) => {
            tracing::warn!(locator = %shown, error = %e, "Narration decode task failed");
            None
        }
    }
}
