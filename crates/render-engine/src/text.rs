//! Text layout: greedy word wrap, sentence splitting, width truncation.
//!
//! Everything here is pure over a [`TextMeasure`], so layout can be tested
//! without fonts.

/// Font family slot used by the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Regular,
    Bold,
    Monospace,
}

/// Font face and pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub size: f32,
}

impl TextStyle {
    pub const fn regular(size: f32) -> Self {
        Self {
            face: FontFace::Regular,
            size,
        }
    }

    pub const fn bold(size: f32) -> Self {
        Self {
            face: FontFace::Bold,
            size,
        }
    }

    pub const fn monospace(size: f32) -> Self {
        Self {
            face: FontFace::Monospace,
            size,
        }
    }
}

/// Measures the advance width of a run of text.
pub trait TextMeasure {
    fn measure_text(&self, text: &str, style: &TextStyle) -> f32;
}

/// Greedy line breaking.
///
/// Words are appended to the current line while the measured width stays
/// within `max_width`; on overflow the line is committed and a new one
/// starts. A word wider than `max_width` ends up alone on its own line.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    style: &TextStyle,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return lines;
    };

    let mut line = first.to_string();
    for word in words {
        let candidate = format!("{line} {word}");
        if measure.measure_text(&candidate, style) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    lines.push(line);
    lines
}

/// Split body text into bullet segments.
///
/// Breaks after `.`, `!` or `?` when followed by whitespace (or the end),
/// and at line breaks. Segments are trimmed; empty ones are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\n' | '\r' => flush_segment(&mut current, &mut segments),
            '.' | '!' | '?' => {
                current.push(ch);
                if chars.peek().map_or(true, |next| next.is_whitespace()) {
                    flush_segment(&mut current, &mut segments);
                }
            }
            _ => current.push(ch),
        }
    }
    flush_segment(&mut current, &mut segments);
    segments
}

fn flush_segment(current: &mut String, segments: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
    current.clear();
}

/// Marker appended to truncated lines.
pub const ELLIPSIS: &str = "…";

/// Cut `text` so it fits `max_width`, measuring one character at a time.
///
/// Text that already fits is returned unchanged; otherwise the longest
/// prefix that fits together with [`ELLIPSIS`] is kept.
pub fn truncate_to_width<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    style: &TextStyle,
    max_width: f32,
) -> String {
    if measure.measure_text(text, style) <= max_width {
        return text.to_string();
    }

    let mut kept = String::new();
    for ch in text.chars() {
        let candidate = format!("{kept}{ch}{ELLIPSIS}");
        if measure.measure_text(&candidate, style) > max_width {
            break;
        }
        kept.push(ch);
    }

    if kept.is_empty() && measure.measure_text(ELLIPSIS, style) > max_width {
        return String::new();
    }
    kept.push_str(ELLIPSIS);
    kept
}

/// How many whole lines of `line_height` fit in `available`.
pub fn lines_that_fit(available: f32, line_height: f32) -> usize {
    if available <= 0.0 || line_height <= 0.0 {
        return 0;
    }
    (available / line_height).floor() as usize
}

/// Every character advances `size * ratio` pixels.
#[cfg(test)]
pub(crate) struct FixedAdvance(pub f32);

#[cfg(test)]
impl TextMeasure for FixedAdvance {
    fn measure_text(&self, text: &str, style: &TextStyle) -> f32 {
        text.chars().count() as f32 * style.size * self.0
    }
}
