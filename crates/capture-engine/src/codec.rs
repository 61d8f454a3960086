//! Container/codec negotiation.

use serde::Serialize;
use slidecast_common::error::{SlidecastError, SlidecastResult};

/// A container + video codec + audio codec combination and the GStreamer
/// elements that produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecPairing {
    /// Media type of the produced blob.
    pub mime_type: &'static str,
    pub video_encoder: &'static str,
    pub audio_encoder: &'static str,
    pub muxer: &'static str,
}

impl CodecPairing {
    /// Every element the recorder pipeline needs for this pairing.
    pub fn required_elements(&self) -> [&'static str; 8] {
        [
            "appsrc",
            "appsink",
            "videoconvert",
            "audioconvert",
            "audioresample",
            self.video_encoder,
            self.audio_encoder,
            self.muxer,
        ]
    }
}

/// Supported pairings, most preferred first.
pub const PREFERRED_PAIRINGS: [CodecPairing; 2] = [
    CodecPairing {
        mime_type: "video/webm;codecs=vp9,opus",
        video_encoder: "vp9enc",
        audio_encoder: "opusenc",
        muxer: "webmmux",
    },
    CodecPairing {
        mime_type: "video/webm;codecs=vp8,opus",
        video_encoder: "vp8enc",
        audio_encoder: "opusenc",
        muxer: "webmmux",
    },
];

/// Pick the first pairing whose elements are all available.
pub fn select_pairing(
    is_available: impl Fn(&str) -> bool,
) -> SlidecastResult<&'static CodecPairing> {
    PREFERRED_PAIRINGS
        .iter()
        .find(|pairing| {
            pairing
                .required_elements()
                .iter()
                .all(|element| is_available(element))
        })
        .ok_or_else(|| {
            let wanted: Vec<_> = PREFERRED_PAIRINGS.iter().map(|p| p.mime_type).collect();
            SlidecastError::unsupported(format!(
                "No supported recording format (tried {})",
                wanted.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_vp9() {
        let pairing = select_pairing(|_| true).unwrap();
        assert_eq!(pairing.mime_type, "video/webm;codecs=vp9,opus");
    }

    #[test]
    fn test_falls_back_to_vp8() {
        let pairing = select_pairing(|name| name != "vp9enc").unwrap();
        assert_eq!(pairing.mime_type, "video/webm;codecs=vp8,opus");
    }

    #[test]
    fn test_nothing_available_is_unsupported() {
        let err = select_pairing(|name| name != "opusenc").unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("vp8"));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let available = |name: &str| name != "vp9enc";
        let first = select_pairing(available).unwrap();
        for _ in 0..10 {
            assert_eq!(select_pairing(available).unwrap(), first);
        }
    }
}
