//! Finished recordings.

use std::path::Path;

use slidecast_common::error::SlidecastResult;

/// An encoded recording held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MediaBlob {
    /// Concatenate recorder chunks in emission order. Zero-length chunks
    /// are skipped.
    pub fn assemble(mime_type: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        let total = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks.into_iter().filter(|c| !c.is_empty()) {
            bytes.extend_from_slice(&chunk);
        }
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the container.
    pub fn extension(&self) -> &'static str {
        if self.mime_type.starts_with("video/webm") {
            "webm"
        } else {
            "bin"
        }
    }

    /// Write the blob to `path`.
    pub fn write_to(&self, path: &Path) -> SlidecastResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        tracing::info!(path = %path.display(), bytes = self.bytes.len(), "Recording written");
        Ok(())
    }
}
