//! Lecture draft and slide types.
//!
//! A draft is the package produced by the lecture generator: a title, a
//! summary, the ordered slides, and optionally the source document (base64)
//! the lecture was derived from.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Heading shown when a slide does not carry its own.
pub const DEFAULT_HEADING: &str = "Key Idea";

/// A generated lecture ready to be exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureDraft {
    /// Draft identifier.
    #[serde(default)]
    pub id: String,

    /// Lecture title.
    #[serde(default)]
    pub title: String,

    /// Short lecture summary.
    #[serde(default)]
    pub summary: String,

    /// Slides in presentation order.
    #[serde(default)]
    pub slides: Vec<Slide>,

    /// Embedded source document (typically a PDF), base64 encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_document_base64: Option<String>,

    /// Quiz attached by the generator. Carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<serde_json::Value>,
}

/// One narrated visual unit of a lecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    /// Primary narration text. Also the layout fallback for the summary.
    #[serde(default)]
    pub narration_text: String,

    /// Short slide title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,

    /// Alternate narration preferred for the on-screen summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_text: Option<String>,

    /// Background/illustration image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Narration audio reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Key into the theme table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_theme_id: Option<String>,

    /// Code block shown near the bottom of the card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,

    /// Language label for the code block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_language: Option<String>,

    /// Quoted passage from the source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_excerpt_text: Option<String>,

    /// 1-based page of the source document this slide refers to.
    ///
    /// Accepts integers, integral floats and numeric strings; anything else
    /// reads as no explicit page.
    #[serde(
        default,
        alias = "pdfPage",
        deserialize_with = "lenient_page",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_page_number: Option<i64>,
}

impl Slide {
    /// Create a slide with only narration text.
    pub fn with_narration(text: impl Into<String>) -> Self {
        Self {
            narration_text: text.into(),
            ..Self::default()
        }
    }

    /// Heading to render, falling back to a generic label.
    pub fn display_heading(&self) -> &str {
        non_blank(self.heading.as_deref()).unwrap_or(DEFAULT_HEADING)
    }

    /// Text used for the bullet summary: the voiceover when present,
    /// otherwise the narration.
    pub fn summary_text(&self) -> &str {
        non_blank(self.voiceover_text.as_deref()).unwrap_or(&self.narration_text)
    }

    /// Image reference, if non-blank.
    pub fn image_ref(&self) -> Option<&str> {
        non_blank(self.image_url.as_deref())
    }

    /// Audio reference, if non-blank.
    pub fn audio_ref(&self) -> Option<&str> {
        non_blank(self.audio_url.as_deref())
    }

    /// Code snippet, if it has visible content.
    pub fn code(&self) -> Option<&str> {
        non_blank(self.code_snippet.as_deref())
    }

    /// Source excerpt, if non-blank.
    pub fn excerpt(&self) -> Option<&str> {
        non_blank(self.source_excerpt_text.as_deref())
    }

    /// Explicitly requested source page, if it is a usable page number.
    pub fn requested_page(&self) -> Option<u32> {
        self.source_page_number
            .filter(|page| *page >= 1)
            .map(|page| page.min(u32::MAX as i64) as u32)
    }
}

fn display_origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<inline>".to_string())
}

fn lenient_page<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(page_from_value(&value))
}

fn page_from_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64)
        .then_some(value as i64)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

impl LectureDraft {
    /// Parse a draft from JSON text.
    pub fn from_json(json: &str) -> Result<Self, DraftError> {
        serde_json::from_str(json).map_err(|e| DraftError::Parse {
            path: None,
            source: e,
        })
    }

    /// Load a draft from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DraftError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DraftError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| DraftError::Parse {
            path: Some(path.to_path_buf()),
            source: e,
        })
    }

    /// Whether the draft embeds a source document.
    pub fn has_source_document(&self) -> bool {
        non_blank(self.pdf_document_base64.as_deref()).is_some()
    }

    /// Decode the embedded source document.
    ///
    /// Accepts plain base64 or a `data:` URL, and ignores embedded
    /// whitespace.
    pub fn source_document_bytes(&self) -> Result<Option<Vec<u8>>, DraftError> {
        let Some(encoded) = non_blank(self.pdf_document_base64.as_deref()) else {
            return Ok(None);
        };
        decode_base64_payload(encoded).map(Some)
    }

    /// Structural checks on the draft.
    ///
    /// Export never fails because of slide content; these findings are
    /// advisory and surfaced by tooling.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = vec![];

        if self.slides.is_empty() {
            issues.push("Draft has no slides".to_string());
        }

        if self.has_source_document() {
            if let Err(e) = self.source_document_bytes() {
                issues.push(format!("Source document is not valid base64: {e}"));
            }
        }

        for (idx, slide) in self.slides.iter().enumerate() {
            let n = idx + 1;
            if slide.narration_text.trim().is_empty() && slide.voiceover_text.is_none() {
                issues.push(format!("Slide {n} has no narration text"));
            }
            if let Some(page) = slide.source_page_number {
                if page < 1 {
                    issues.push(format!("Slide {n} references invalid page {page}"));
                } else if !self.has_source_document() {
                    issues.push(format!(
                        "Slide {n} references page {page} but the draft has no source document"
                    ));
                }
            }
            if slide.excerpt().is_some() && !self.has_source_document() {
                issues.push(format!(
                    "Slide {n} has a source excerpt but the draft has no source document"
                ));
            }
        }

        issues
    }
}

/// Decode a base64 payload, optionally wrapped in a `data:` URL.
pub fn decode_base64_payload(encoded: &str) -> Result<Vec<u8>, DraftError> {
    let payload = match encoded.trim().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| DraftError::Invalid {
                message: "data URL has no payload".to_string(),
            })?,
        None => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DraftError::Invalid {
            message: format!("invalid base64: {e}"),
        })
}

/// Errors that can occur when reading drafts.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", display_origin(.path))]
    Parse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },

    #[error("Invalid draft: {message}")]
    Invalid { message: String },
}
