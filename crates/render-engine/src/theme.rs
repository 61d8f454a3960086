//! Slide palettes.
//!
//! Themes are plain static records looked up by key; anything unknown gets
//! [`BASE_THEME`].

use crate::surface::{Color, GradientStop};

/// Named palette applied to one slide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub id: &'static str,

    /// Diagonal full-surface background, top-left to bottom-right.
    pub background: [Color; 3],

    /// Horizontal legibility overlay, left to right.
    pub overlay: [Color; 2],

    pub card_fill: Color,

    /// Vertical card border gradient, top to bottom.
    pub card_stroke: [Color; 2],

    pub heading: Color,
    pub body: Color,
    pub bullet: Color,
    pub chip_fill: Color,
    pub chip_text: Color,
    pub progress_track: Color,
    pub progress_fill: [Color; 2],
    pub media_border: [Color; 2],
    pub shadow: Color,

    /// Decorative arcs and speckle on slides without visuals.
    pub accent: Color,

    pub placeholder_fill: Color,
    pub placeholder_text: Color,
    pub code_fill: Color,
    pub code_text: Color,
}

impl Theme {
    pub fn background_stops(&self) -> Vec<GradientStop> {
        vec![
            GradientStop::new(0.0, self.background[0]),
            GradientStop::new(0.55, self.background[1]),
            GradientStop::new(1.0, self.background[2]),
        ]
    }

    pub fn overlay_stops(&self) -> Vec<GradientStop> {
        two_stops(self.overlay)
    }

    pub fn card_stroke_stops(&self) -> Vec<GradientStop> {
        two_stops(self.card_stroke)
    }

    pub fn progress_stops(&self) -> Vec<GradientStop> {
        two_stops(self.progress_fill)
    }

    pub fn media_border_stops(&self) -> Vec<GradientStop> {
        two_stops(self.media_border)
    }
}

fn two_stops(colors: [Color; 2]) -> Vec<GradientStop> {
    vec![
        GradientStop::new(0.0, colors[0]),
        GradientStop::new(1.0, colors[1]),
    ]
}

pub static BASE_THEME: Theme = Theme {
    id: "base",
    background: [Color::hex(0x1e1b4b), Color::hex(0x312e81), Color::hex(0x0f172a)],
    overlay: [Color::rgba(15, 23, 42, 150), Color::rgba(15, 23, 42, 40)],
    card_fill: Color::rgba(255, 255, 255, 238),
    card_stroke: [Color::rgba(165, 180, 252, 200), Color::rgba(99, 102, 241, 120)],
    heading: Color::hex(0x1e1b4b),
    body: Color::hex(0x334155),
    bullet: Color::hex(0x6366f1),
    chip_fill: Color::hex(0xe0e7ff),
    chip_text: Color::hex(0x3730a3),
    progress_track: Color::rgba(255, 255, 255, 60),
    progress_fill: [Color::hex(0x818cf8), Color::hex(0xc084fc)],
    media_border: [Color::hex(0xa5b4fc), Color::hex(0x6366f1)],
    shadow: Color::rgba(15, 23, 42, 110),
    accent: Color::hex(0xc7d2fe),
    placeholder_fill: Color::hex(0xeef2ff),
    placeholder_text: Color::hex(0x6366f1),
    code_fill: Color::hex(0x0f172a),
    code_text: Color::hex(0xe2e8f0),
};

static OCEAN_THEME: Theme = Theme {
    id: "ocean",
    background: [Color::hex(0x0c4a6e), Color::hex(0x0369a1), Color::hex(0x082f49)],
    overlay: [Color::rgba(8, 47, 73, 160), Color::rgba(8, 47, 73, 40)],
    card_fill: Color::rgba(240, 249, 255, 240),
    card_stroke: [Color::rgba(125, 211, 252, 210), Color::rgba(14, 165, 233, 130)],
    heading: Color::hex(0x0c4a6e),
    body: Color::hex(0x1e3a5f),
    bullet: Color::hex(0x0ea5e9),
    chip_fill: Color::hex(0xe0f2fe),
    chip_text: Color::hex(0x075985),
    progress_track: Color::rgba(255, 255, 255, 60),
    progress_fill: [Color::hex(0x38bdf8), Color::hex(0x2dd4bf)],
    media_border: [Color::hex(0x7dd3fc), Color::hex(0x0284c7)],
    shadow: Color::rgba(8, 47, 73, 120),
    accent: Color::hex(0xbae6fd),
    placeholder_fill: Color::hex(0xe0f2fe),
    placeholder_text: Color::hex(0x0369a1),
    code_fill: Color::hex(0x082f49),
    code_text: Color::hex(0xe0f2fe),
};

static FOREST_THEME: Theme = Theme {
    id: "forest",
    background: [Color::hex(0x14532d), Color::hex(0x166534), Color::hex(0x052e16)],
    overlay: [Color::rgba(5, 46, 22, 160), Color::rgba(5, 46, 22, 40)],
    card_fill: Color::rgba(240, 253, 244, 240),
    card_stroke: [Color::rgba(134, 239, 172, 210), Color::rgba(34, 197, 94, 130)],
    heading: Color::hex(0x14532d),
    body: Color::hex(0x1f3d2b),
    bullet: Color::hex(0x22c55e),
    chip_fill: Color::hex(0xdcfce7),
    chip_text: Color::hex(0x166534),
    progress_track: Color::rgba(255, 255, 255, 60),
    progress_fill: [Color::hex(0x4ade80), Color::hex(0xa3e635)],
    media_border: [Color::hex(0x86efac), Color::hex(0x16a34a)],
    shadow: Color::rgba(5, 46, 22, 120),
    accent: Color::hex(0xbbf7d0),
    placeholder_fill: Color::hex(0xdcfce7),
    placeholder_text: Color::hex(0x15803d),
    code_fill: Color::hex(0x052e16),
    code_text: Color::hex(0xdcfce7),
};

static SUNSET_THEME: Theme = Theme {
    id: "sunset",
    background: [Color::hex(0x7c2d12), Color::hex(0xc2410c), Color::hex(0x4c0519)],
    overlay: [Color::rgba(76, 5, 25, 150), Color::rgba(76, 5, 25, 40)],
    card_fill: Color::rgba(255, 247, 237, 240),
    card_stroke: [Color::rgba(253, 186, 116, 210), Color::rgba(249, 115, 22, 130)],
    heading: Color::hex(0x7c2d12),
    body: Color::hex(0x44281a),
    bullet: Color::hex(0xf97316),
    chip_fill: Color::hex(0xffedd5),
    chip_text: Color::hex(0x9a3412),
    progress_track: Color::rgba(255, 255, 255, 60),
    progress_fill: [Color::hex(0xfb923c), Color::hex(0xf43f5e)],
    media_border: [Color::hex(0xfdba74), Color::hex(0xea580c)],
    shadow: Color::rgba(76, 5, 25, 120),
    accent: Color::hex(0xfed7aa),
    placeholder_fill: Color::hex(0xffedd5),
    placeholder_text: Color::hex(0xc2410c),
    code_fill: Color::hex(0x27150d),
    code_text: Color::hex(0xffedd5),
};

static MIDNIGHT_THEME: Theme = Theme {
    id: "midnight",
    background: [Color::hex(0x020617), Color::hex(0x1e293b), Color::hex(0x000000)],
    overlay: [Color::rgba(2, 6, 23, 170), Color::rgba(2, 6, 23, 50)],
    card_fill: Color::rgba(15, 23, 42, 235),
    card_stroke: [Color::rgba(148, 163, 184, 180), Color::rgba(71, 85, 105, 120)],
    heading: Color::hex(0xf8fafc),
    body: Color::hex(0xcbd5e1),
    bullet: Color::hex(0x38bdf8),
    chip_fill: Color::hex(0x1e293b),
    chip_text: Color::hex(0x7dd3fc),
    progress_track: Color::rgba(255, 255, 255, 40),
    progress_fill: [Color::hex(0x38bdf8), Color::hex(0xa78bfa)],
    media_border: [Color::hex(0x64748b), Color::hex(0x38bdf8)],
    shadow: Color::rgba(0, 0, 0, 160),
    accent: Color::hex(0x334155),
    placeholder_fill: Color::hex(0x1e293b),
    placeholder_text: Color::hex(0x94a3b8),
    code_fill: Color::hex(0x000000),
    code_text: Color::hex(0xe2e8f0),
};

static PAPER_THEME: Theme = Theme {
    id: "paper",
    background: [Color::hex(0xe7e5e4), Color::hex(0xf5f5f4), Color::hex(0xd6d3d1)],
    overlay: [Color::rgba(68, 64, 60, 60), Color::rgba(68, 64, 60, 10)],
    card_fill: Color::rgba(255, 255, 255, 250),
    card_stroke: [Color::rgba(168, 162, 158, 200), Color::rgba(120, 113, 108, 120)],
    heading: Color::hex(0x1c1917),
    body: Color::hex(0x44403c),
    bullet: Color::hex(0x78716c),
    chip_fill: Color::hex(0xf5f5f4),
    chip_text: Color::hex(0x44403c),
    progress_track: Color::rgba(68, 64, 60, 50),
    progress_fill: [Color::hex(0x57534e), Color::hex(0xa8a29e)],
    media_border: [Color::hex(0xd6d3d1), Color::hex(0x78716c)],
    shadow: Color::rgba(28, 25, 23, 70),
    accent: Color::hex(0xa8a29e),
    placeholder_fill: Color::hex(0xf5f5f4),
    placeholder_text: Color::hex(0x78716c),
    code_fill: Color::hex(0x1c1917),
    code_text: Color::hex(0xf5f5f4),
};

static THEMES: [&Theme; 6] = [
    &BASE_THEME,
    &OCEAN_THEME,
    &FOREST_THEME,
    &SUNSET_THEME,
    &MIDNIGHT_THEME,
    &PAPER_THEME,
];

/// Resolve a theme key, case-insensitively. Unknown or absent keys fall
/// back to [`BASE_THEME`].
pub fn theme_for(id: Option<&str>) -> &'static Theme {
    id.map(str::trim)
        .and_then(|key| THEMES.iter().find(|theme| theme.id.eq_ignore_ascii_case(key)))
        .copied()
        .unwrap_or(&BASE_THEME)
}

/// Every known theme key.
pub fn theme_ids() -> impl Iterator<Item = &'static str> {
    THEMES.iter().map(|theme| theme.id)
}

/// Whether `id` names a theme in the table.
pub fn is_known_theme(id: &str) -> bool {
    theme_for(Some(id)).id.eq_ignore_ascii_case(id.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_theme_resolves() {
        assert_eq!(theme_for(Some("ocean")).id, "ocean");
        assert_eq!(theme_for(Some("  Forest ")).id, "forest");
    }

    #[test]
    fn test_unknown_theme_is_base_exactly() {
        assert_eq!(*theme_for(Some("vaporwave")), BASE_THEME);
        assert_eq!(*theme_for(Some("")), BASE_THEME);
        assert_eq!(*theme_for(None), BASE_THEME);
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<_> = theme_ids().collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert!(ids.contains(&"base"));
    }

    #[test]
    fn test_is_known_theme() {
        assert!(is_known_theme("sunset"));
        assert!(is_known_theme("base"));
        assert!(!is_known_theme("nope"));
    }
}
