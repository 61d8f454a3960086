//! Frame composer.
//!
//! Paints one slide, in a fixed order, onto a [`DrawingSurface`]:
//!
//! 1. Clear, resolve the theme
//! 2. Diagonal background gradient, optional cover-cropped image
//! 3. Radial vignette and horizontal overlay
//! 4. Decorative accents (slides without any visual)
//! 5. Shadowed content card
//! 6. Heading, bullet summary, snapshot/image/placeholder, excerpt, code
//! 7. Progress bar under the card
//!
//! The composer always overwrites the whole surface and only reads the
//! slide, so repeated calls with the same inputs give the same picture.
//!
//! Steps 1 to 6 do not depend on playback progress. [`paint_static`] paints
//! them once per slide and [`paint_progress_bar`] draws step 7 over a copy of
//! that layer for every frame; [`paint_slide`] does both.

use image::RgbaImage;
use slidecast_lecture_model::Slide;

use crate::surface::{cover_source_rect, Color, DrawingSurface, GradientStop, Paint, Rect, Shadow};
use crate::text::{lines_that_fit, split_sentences, truncate_to_width, wrap_text, TextStyle};
use crate::theme::{theme_for, Theme};

const BACKGROUND_IMAGE_ALPHA: f32 = 0.35;
const VIGNETTE_EDGE_ALPHA: f32 = 0.55;

const CARD_RADIUS: f32 = 28.0;
const CARD_PADDING: f32 = 44.0;
const CARD_STROKE_WIDTH: f32 = 2.0;
const CARD_SHADOW_BLUR: f32 = 36.0;
const CARD_SHADOW_OFFSET: f32 = 18.0;
/// Card size as a fraction of the surface, with and without a snapshot.
const CARD_SIZE_WITH_SNAPSHOT: (f32, f32) = (0.9, 0.8);
const CARD_SIZE: (f32, f32) = (0.72, 0.76);

const HEADING_STYLE: TextStyle = TextStyle::bold(44.0);
const HEADING_LINE_HEIGHT: f32 = 52.0;
const HEADING_MAX_LINES: usize = 3;
const SECTION_GAP: f32 = 24.0;

const BODY_STYLE: TextStyle = TextStyle::regular(24.0);
const BODY_LINE_HEIGHT: f32 = 32.0;
const BULLET_RADIUS: f32 = 5.0;
const BULLET_INDENT: f32 = 24.0;
const BULLET_GAP: f32 = 10.0;

const COLUMN_GUTTER: f32 = 32.0;
const MEDIA_RADIUS: f32 = 18.0;
const MEDIA_STROKE_WIDTH: f32 = 3.0;
const IMAGE_STACK_RATIO: f32 = 0.45;

const PLACEHOLDER_RATIO: f32 = 0.4;
const PLACEHOLDER_LABEL: &str = "Visual will appear after export";
const PLACEHOLDER_STYLE: TextStyle = TextStyle::regular(20.0);
const PLACEHOLDER_RING_RADIUS: f32 = 18.0;

const CHIP_STYLE: TextStyle = TextStyle::bold(14.0);
const CHIP_HEIGHT: f32 = 26.0;
const CHIP_PADDING: f32 = 12.0;
const CHIP_INSET: f32 = 12.0;

const EXCERPT_RADIUS: f32 = 14.0;
const EXCERPT_PADDING: f32 = 16.0;
const EXCERPT_STROKE_WIDTH: f32 = 1.5;
const EXCERPT_STYLE: TextStyle = TextStyle::regular(18.0);
const EXCERPT_LINE_HEIGHT: f32 = 24.0;
const EXCERPT_LABEL_STYLE: TextStyle = TextStyle::bold(14.0);
const EXCERPT_LABEL_HEIGHT: f32 = 22.0;

const CODE_RADIUS: f32 = 14.0;
const CODE_PADDING: f32 = 16.0;
const CODE_STYLE: TextStyle = TextStyle::monospace(17.0);
const CODE_LINE_HEIGHT: f32 = 22.0;
const CODE_CHIP_GAP: f32 = 10.0;
const CODE_MAX_HEIGHT_RATIO: f32 = 0.38;
const CODE_TAB: &str = "    ";

const PROGRESS_HEIGHT: f32 = 8.0;
const PROGRESS_GAP: f32 = 22.0;

const ACCENT_ALPHA: f32 = 0.08;
const ACCENT_ARCS: usize = 4;
const ACCENT_SPECKLES: usize = 90;

/// A rasterized source-document page and the page it shows.
#[derive(Debug, Clone, Copy)]
pub struct PageSnapshot<'a> {
    pub image: &'a RgbaImage,
    pub page: Option<u32>,
}

/// Which visual occupies the media slot of the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualSlot {
    Snapshot,
    Image,
    #[default]
    Placeholder,
}

/// What one paint call laid out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideLayout {
    pub visual: VisualSlot,
    pub card: Rect,
    pub heading_lines: usize,
    pub bullet_lines: usize,

    /// Excerpt lines drawn, and how many the excerpt wrapped to.
    pub excerpt_lines: usize,
    pub excerpt_lines_total: usize,

    pub code_lines: usize,
    pub accent: bool,
    pub progress_fraction: f64,
}

/// Paint `slide` as frame `progress` (0..=1) of slide `slide_index`.
///
/// Images with a zero dimension are treated as absent.
pub fn paint_slide<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    slide: &Slide,
    background: Option<&RgbaImage>,
    snapshot: Option<PageSnapshot<'_>>,
    slide_index: usize,
    total_slides: usize,
    progress: f64,
) -> SlideLayout {
    let mut layout = paint_static(surface, slide, background, snapshot, slide_index);
    layout.progress_fraction =
        paint_progress_bar(surface, slide, layout.card, slide_index, total_slides, progress);
    layout
}

/// Paint everything except the progress bar.
pub fn paint_static<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    slide: &Slide,
    background: Option<&RgbaImage>,
    snapshot: Option<PageSnapshot<'_>>,
    slide_index: usize,
) -> SlideLayout {
    let background = background.filter(|image| is_drawable(image));
    let snapshot = snapshot.filter(|snapshot| is_drawable(snapshot.image));
    let full = Rect::new(0.0, 0.0, surface.width() as f32, surface.height() as f32);

    surface.save();
    surface.set_global_alpha(1.0);
    surface.set_shadow(None);
    surface.clear(Color::BLACK);

    let theme = theme_for(slide.visual_theme_id.as_deref());
    paint_backdrop(surface, theme, background, full);

    let accent = background.is_none() && snapshot.is_none();
    if accent {
        paint_accents(surface, theme, full, slide_index);
    }

    let card = card_rect(full, snapshot.is_some());
    paint_card(surface, theme, card);

    let mut layout = SlideLayout {
        card,
        accent,
        ..SlideLayout::default()
    };
    paint_card_content(surface, theme, slide, card, background, snapshot, &mut layout);

    surface.restore();
    layout
}

/// Draw the progress bar under `card` and return its fill fraction.
pub fn paint_progress_bar<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    slide: &Slide,
    card: Rect,
    slide_index: usize,
    total_slides: usize,
    progress: f64,
) -> f64 {
    let theme = theme_for(slide.visual_theme_id.as_deref());
    surface.save();
    surface.set_global_alpha(1.0);
    surface.set_shadow(None);
    let fraction = paint_progress(surface, theme, card, slide_index, total_slides, progress);
    surface.restore();
    fraction
}

/// Fill fraction of the progress bar.
pub fn progress_fraction(slide_index: usize, total_slides: usize, progress: f64) -> f64 {
    let progress = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((slide_index as f64 + progress) / total_slides.max(1) as f64).clamp(0.0, 1.0)
}

fn is_drawable(image: &RgbaImage) -> bool {
    image.width() > 0 && image.height() > 0
}

fn card_rect(full: Rect, with_snapshot: bool) -> Rect {
    let (wr, hr) = if with_snapshot {
        CARD_SIZE_WITH_SNAPSHOT
    } else {
        CARD_SIZE
    };
    let (w, h) = (full.w * wr, full.h * hr);
    let y = ((full.h - h - PROGRESS_GAP - PROGRESS_HEIGHT) / 2.0).max(0.0);
    Rect::new((full.w - w) / 2.0, y, w, h)
}

fn vertical(rect: Rect, stops: Vec<GradientStop>) -> Paint {
    Paint::Linear {
        from: (rect.x, rect.y),
        to: (rect.x, rect.bottom()),
        stops,
    }
}

fn paint_backdrop<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    background: Option<&RgbaImage>,
    full: Rect,
) {
    surface.fill_rect(
        full,
        &Paint::Linear {
            from: (0.0, 0.0),
            to: (full.w, full.h),
            stops: theme.background_stops(),
        },
    );

    if let Some(image) = background {
        if let Some(src) = cover_source_rect(image.width(), image.height(), full) {
            surface.save();
            surface.set_global_alpha(BACKGROUND_IMAGE_ALPHA);
            surface.draw_image(image, src, full);
            surface.restore();
        }
    }

    let center = full.center();
    surface.fill_rect(
        full,
        &Paint::Radial {
            center,
            inner_radius: full.w.min(full.h) * 0.3,
            outer_radius: full.w.hypot(full.h) / 2.0,
            stops: vec![
                GradientStop::new(0.0, Color::TRANSPARENT),
                GradientStop::new(1.0, Color::BLACK.with_alpha(VIGNETTE_EDGE_ALPHA)),
            ],
        },
    );
    surface.fill_rect(
        full,
        &Paint::Linear {
            from: (0.0, 0.0),
            to: (full.w, 0.0),
            stops: theme.overlay_stops(),
        },
    );
}

/// Tiny xorshift so the speckle is stable per slide.
struct Speckle(u64);

impl Speckle {
    fn new(seed: usize) -> Self {
        Self((seed as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    fn next_unit(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }
}

fn paint_accents<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    full: Rect,
    seed: usize,
) {
    use std::f32::consts::{FRAC_PI_2, PI};

    let arc_paint = Paint::Solid(theme.accent.with_alpha(ACCENT_ALPHA * 2.0));
    let base = full.w.min(full.h);
    for i in 0..ACCENT_ARCS {
        let radius = base * (0.18 + 0.09 * i as f32);
        surface.stroke_arc(full.right(), 0.0, radius, FRAC_PI_2, PI, 2.0, &arc_paint);
        surface.stroke_arc(0.0, full.bottom(), radius, -FRAC_PI_2, 0.0, 2.0, &arc_paint);
    }

    let dot_paint = Paint::Solid(theme.accent.with_alpha(ACCENT_ALPHA));
    let mut rng = Speckle::new(seed);
    for _ in 0..ACCENT_SPECKLES {
        let x = rng.next_unit() * full.w;
        let y = rng.next_unit() * full.h;
        let radius = 1.0 + rng.next_unit() * 2.5;
        surface.fill_circle(x, y, radius, &dot_paint);
    }
}

fn paint_card<S: DrawingSurface + ?Sized>(surface: &mut S, theme: &Theme, card: Rect) {
    surface.save();
    surface.set_shadow(Some(Shadow {
        color: theme.shadow,
        blur: CARD_SHADOW_BLUR,
        offset_x: 0.0,
        offset_y: CARD_SHADOW_OFFSET,
    }));
    surface.fill_rounded_rect(card, CARD_RADIUS, &theme.card_fill.into());
    surface.restore();
    surface.stroke_rounded_rect(
        card,
        CARD_RADIUS,
        CARD_STROKE_WIDTH,
        &vertical(card, theme.card_stroke_stops()),
    );
}

fn paint_card_content<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    slide: &Slide,
    card: Rect,
    background: Option<&RgbaImage>,
    snapshot: Option<PageSnapshot<'_>>,
    layout: &mut SlideLayout,
) {
    let content = card.inset(CARD_PADDING);
    let language = slide
        .snippet_language
        .as_deref()
        .map(str::trim)
        .filter(|language| !language.is_empty());
    let code_panel = slide
        .code()
        .map(|code| code_panel_rect(content, code, language.is_some()));
    let body_bottom = code_panel.map_or(content.bottom(), |panel| panel.y - SECTION_GAP);

    match snapshot {
        Some(snapshot) => {
            let column_w = ((content.w - COLUMN_GUTTER) / 2.0).max(0.0);
            let column_h = (body_bottom - content.y).max(0.0);
            let text_column = Rect::new(content.x, content.y, column_w, column_h);
            let media_x = content.x + column_w + COLUMN_GUTTER;
            let media = Rect::new(media_x, content.y, column_w, column_h);

            paint_media(surface, theme, snapshot.image, media);
            if let Some(page) = snapshot.page {
                paint_chip(
                    surface,
                    theme,
                    &format!("Page {page}"),
                    media.x + CHIP_INSET,
                    media.y + CHIP_INSET,
                    media.w - 2.0 * CHIP_INSET,
                );
            }
            layout.visual = VisualSlot::Snapshot;

            layout.heading_lines =
                paint_heading(surface, theme, slide.display_heading(), text_column);
            let y = text_column.y + layout.heading_lines as f32 * HEADING_LINE_HEIGHT + SECTION_GAP;
            let (y, bullets) = paint_bullets(
                surface,
                theme,
                slide.summary_text(),
                Rect::new(text_column.x, y, text_column.w, body_bottom - y),
            );
            layout.bullet_lines = bullets;

            if let Some(excerpt) = slide.excerpt() {
                let top = y + SECTION_GAP;
                let area = Rect::new(text_column.x, top, text_column.w, body_bottom - top);
                let (shown, total) = paint_excerpt(surface, theme, excerpt, snapshot.page, area);
                layout.excerpt_lines = shown;
                layout.excerpt_lines_total = total;
            }
        }
        None => {
            layout.heading_lines = paint_heading(surface, theme, slide.display_heading(), content);
            let top = content.y + layout.heading_lines as f32 * HEADING_LINE_HEIGHT + SECTION_GAP;
            let region_h = (body_bottom - top).max(0.0);

            let visual = match background {
                Some(image) => {
                    let media = Rect::new(content.x, top, content.w, region_h * IMAGE_STACK_RATIO);
                    paint_media(surface, theme, image, media);
                    layout.visual = VisualSlot::Image;
                    media
                }
                None => {
                    let panel = Rect::new(content.x, top, content.w, region_h * PLACEHOLDER_RATIO);
                    paint_placeholder(surface, theme, panel);
                    layout.visual = VisualSlot::Placeholder;
                    panel
                }
            };

            let y = visual.bottom() + SECTION_GAP;
            let (_, bullets) = paint_bullets(
                surface,
                theme,
                slide.summary_text(),
                Rect::new(content.x, y, content.w, body_bottom - y),
            );
            layout.bullet_lines = bullets;
        }
    }

    if let (Some(code), Some(panel)) = (slide.code(), code_panel) {
        layout.code_lines = paint_code_panel(surface, theme, code, language, panel);
    }
}

/// Paint the wrapped heading at the top of `area`; returns its line count.
fn paint_heading<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    heading: &str,
    area: Rect,
) -> usize {
    let mut lines = wrap_text(&*surface, heading, &HEADING_STYLE, area.w);
    if lines.len() > HEADING_MAX_LINES {
        let rest = lines.split_off(HEADING_MAX_LINES - 1).join(" ");
        lines.push(truncate_to_width(&*surface, &rest, &HEADING_STYLE, area.w));
    }

    let baseline_pad = (HEADING_LINE_HEIGHT - HEADING_STYLE.size) / 2.0;
    for (i, line) in lines.iter().enumerate() {
        let y = area.y + i as f32 * HEADING_LINE_HEIGHT + baseline_pad;
        surface.fill_text(line, area.x, y, &HEADING_STYLE, theme.heading);
    }
    lines.len()
}

/// Paint one bullet per sentence inside `area`, stopping at the first line
/// that would not fit. Returns the next free y and the line count.
fn paint_bullets<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    text: &str,
    area: Rect,
) -> (f32, usize) {
    let text_x = area.x + BULLET_INDENT;
    let text_w = (area.w - BULLET_INDENT).max(0.0);
    let bullet = Paint::Solid(theme.bullet);
    let baseline_pad = (BODY_LINE_HEIGHT - BODY_STYLE.size) / 2.0;
    let mut y = area.y;
    let mut count = 0;

    surface.save();
    surface.clip_rounded_rect(area, 0.0);
    'segments: for segment in split_sentences(text) {
        let lines = wrap_text(&*surface, &segment, &BODY_STYLE, text_w);
        for (i, line) in lines.iter().enumerate() {
            if y + BODY_LINE_HEIGHT > area.bottom() {
                break 'segments;
            }
            if i == 0 {
                let cy = y + BODY_LINE_HEIGHT / 2.0;
                surface.fill_circle(area.x + BULLET_RADIUS, cy, BULLET_RADIUS, &bullet);
            }
            surface.fill_text(line, text_x, y + baseline_pad, &BODY_STYLE, theme.body);
            y += BODY_LINE_HEIGHT;
            count += 1;
        }
        y += BULLET_GAP;
    }
    surface.restore();
    (y, count)
}

fn paint_media<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    image: &RgbaImage,
    rect: Rect,
) {
    let Some(src) = cover_source_rect(image.width(), image.height(), rect) else {
        return;
    };
    surface.save();
    surface.clip_rounded_rect(rect, MEDIA_RADIUS);
    surface.draw_image(image, src, rect);
    surface.restore();
    surface.stroke_rounded_rect(
        rect,
        MEDIA_RADIUS,
        MEDIA_STROKE_WIDTH,
        &vertical(rect, theme.media_border_stops()),
    );
}

fn paint_placeholder<S: DrawingSurface + ?Sized>(surface: &mut S, theme: &Theme, panel: Rect) {
    if panel.is_empty() {
        return;
    }
    surface.fill_rounded_rect(panel, MEDIA_RADIUS, &theme.placeholder_fill.into());
    surface.stroke_rounded_rect(
        panel,
        MEDIA_RADIUS,
        MEDIA_STROKE_WIDTH,
        &vertical(panel, theme.media_border_stops()),
    );

    let (cx, cy) = panel.center();
    let max_w = panel.w - 2.0 * CHIP_PADDING;
    let label = truncate_to_width(&*surface, PLACEHOLDER_LABEL, &PLACEHOLDER_STYLE, max_w);
    let label_x = cx - surface.measure_text(&label, &PLACEHOLDER_STYLE) / 2.0;

    // Ring icon above the label when the panel is tall enough for both.
    let block_h = 2.0 * PLACEHOLDER_RING_RADIUS + CHIP_PADDING + PLACEHOLDER_STYLE.size;
    if panel.h >= block_h + 2.0 * CHIP_PADDING {
        let top = cy - block_h / 2.0;
        surface.stroke_arc(
            cx,
            top + PLACEHOLDER_RING_RADIUS,
            PLACEHOLDER_RING_RADIUS,
            0.0,
            std::f32::consts::TAU,
            2.0,
            &theme.placeholder_text.with_alpha(0.6).into(),
        );
        let label_y = top + 2.0 * PLACEHOLDER_RING_RADIUS + CHIP_PADDING;
        surface.fill_text(&label, label_x, label_y, &PLACEHOLDER_STYLE, theme.placeholder_text);
    } else {
        let label_y = cy - PLACEHOLDER_STYLE.size / 2.0;
        surface.fill_text(&label, label_x, label_y, &PLACEHOLDER_STYLE, theme.placeholder_text);
    }
}

/// Pill with a single line of text; returns its rect.
fn paint_chip<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    label: &str,
    x: f32,
    y: f32,
    max_w: f32,
) -> Rect {
    let text = truncate_to_width(&*surface, label, &CHIP_STYLE, max_w - 2.0 * CHIP_PADDING);
    let w = surface.measure_text(&text, &CHIP_STYLE) + 2.0 * CHIP_PADDING;
    let chip = Rect::new(x, y, w, CHIP_HEIGHT);
    surface.fill_rounded_rect(chip, CHIP_HEIGHT / 2.0, &theme.chip_fill.into());
    surface.fill_text(
        &text,
        x + CHIP_PADDING,
        y + (CHIP_HEIGHT - CHIP_STYLE.size) / 2.0,
        &CHIP_STYLE,
        theme.chip_text,
    );
    chip
}

/// Bordered excerpt panel at the top of `area`, cut to whole lines.
/// Returns (lines drawn, lines wrapped).
fn paint_excerpt<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    excerpt: &str,
    page: Option<u32>,
    area: Rect,
) -> (usize, usize) {
    let inner_w = area.w - 2.0 * EXCERPT_PADDING;
    if inner_w <= 0.0 {
        return (0, 0);
    }
    let lines = wrap_text(&*surface, excerpt, &EXCERPT_STYLE, inner_w);
    let text_room = area.h - 2.0 * EXCERPT_PADDING - EXCERPT_LABEL_HEIGHT;
    let shown = lines_that_fit(text_room, EXCERPT_LINE_HEIGHT).min(lines.len());
    if shown == 0 {
        return (0, lines.len());
    }

    let panel_h = 2.0 * EXCERPT_PADDING + EXCERPT_LABEL_HEIGHT + shown as f32 * EXCERPT_LINE_HEIGHT;
    let panel = Rect::new(area.x, area.y, area.w, panel_h);
    surface.fill_rounded_rect(panel, EXCERPT_RADIUS, &theme.placeholder_fill.into());
    surface.stroke_rounded_rect(
        panel,
        EXCERPT_RADIUS,
        EXCERPT_STROKE_WIDTH,
        &vertical(panel, theme.media_border_stops()),
    );

    let label = match page {
        Some(page) => format!("Source · page {page}"),
        None => "Source excerpt".to_string(),
    };
    let label = truncate_to_width(&*surface, &label, &EXCERPT_LABEL_STYLE, inner_w);
    let x = panel.x + EXCERPT_PADDING;
    surface.fill_text(&label, x, panel.y + EXCERPT_PADDING, &EXCERPT_LABEL_STYLE, theme.chip_text);

    let top = panel.y + EXCERPT_PADDING + EXCERPT_LABEL_HEIGHT;
    let baseline_pad = (EXCERPT_LINE_HEIGHT - EXCERPT_STYLE.size) / 2.0;
    for (i, line) in lines.iter().take(shown).enumerate() {
        let y = top + i as f32 * EXCERPT_LINE_HEIGHT + baseline_pad;
        surface.fill_text(line, x, y, &EXCERPT_STYLE, theme.body);
    }
    (shown, lines.len())
}

fn code_lines(code: &str) -> Vec<String> {
    let mut lines: Vec<String> = code
        .lines()
        .map(|line| line.trim_end().replace('\t', CODE_TAB))
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Code panel pinned to the bottom of `content`, tall enough for every
/// line up to a fixed share of the card.
fn code_panel_rect(content: Rect, code: &str, with_chip: bool) -> Rect {
    let chip = if with_chip { CHIP_HEIGHT + CODE_CHIP_GAP } else { 0.0 };
    let line_count = code_lines(code).len().max(1);
    let needed = 2.0 * CODE_PADDING + chip + line_count as f32 * CODE_LINE_HEIGHT;
    let h = needed.min(content.h * CODE_MAX_HEIGHT_RATIO).max(0.0);
    Rect::new(content.x, content.bottom() - h, content.w, h)
}

fn paint_code_panel<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    code: &str,
    language: Option<&str>,
    panel: Rect,
) -> usize {
    if panel.is_empty() {
        return 0;
    }
    surface.fill_rounded_rect(panel, CODE_RADIUS, &theme.code_fill.into());
    let inner = panel.inset(CODE_PADDING);

    let mut y = inner.y;
    if let Some(language) = language {
        let chip = paint_chip(surface, theme, language, inner.x, y, inner.w);
        y = chip.bottom() + CODE_CHIP_GAP;
    }

    let fit = lines_that_fit(inner.bottom() - y, CODE_LINE_HEIGHT);
    let baseline_pad = (CODE_LINE_HEIGHT - CODE_STYLE.size) / 2.0;
    let mut shown = 0;
    for line in code_lines(code).iter().take(fit) {
        let line = truncate_to_width(&*surface, line, &CODE_STYLE, inner.w);
        surface.fill_text(&line, inner.x, y + baseline_pad, &CODE_STYLE, theme.code_text);
        y += CODE_LINE_HEIGHT;
        shown += 1;
    }
    shown
}

fn paint_progress<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    theme: &Theme,
    card: Rect,
    slide_index: usize,
    total_slides: usize,
    progress: f64,
) -> f64 {
    let fraction = progress_fraction(slide_index, total_slides, progress);
    let track = Rect::new(card.x, card.bottom() + PROGRESS_GAP, card.w, PROGRESS_HEIGHT);
    let radius = PROGRESS_HEIGHT / 2.0;
    surface.fill_rounded_rect(track, radius, &theme.progress_track.into());

    let filled = track.w * fraction as f32;
    if filled > 0.0 {
        surface.fill_rounded_rect(
            Rect::new(track.x, track.y, filled, track.h),
            radius,
            &Paint::Linear {
                from: (track.x, track.y),
                to: (track.right(), track.y),
                stops: theme.progress_stops(),
            },
        );
    }
    fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterSurface;
    use crate::text::{TextMeasure, ELLIPSIS};
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Clear,
        Fill(Rect),
        FillRounded(Rect),
        Stroke(Rect),
        Circle,
        Arc,
        Image(Rect),
        Text { text: String, x: f32, y: f32, style: TextStyle },
    }

    struct RecordingSurface {
        width: u32,
        height: u32,
        ops: Vec<Op>,
        depth: usize,
    }

    impl RecordingSurface {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                ops: Vec::new(),
                depth: 0,
            }
        }

        fn texts(&self) -> Vec<(&str, f32, f32, TextStyle)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Text { text, x, y, style } => Some((text.as_str(), *x, *y, *style)),
                    _ => None,
                })
                .collect()
        }
    }

    impl TextMeasure for RecordingSurface {
        fn measure_text(&self, text: &str, style: &TextStyle) -> f32 {
            text.chars().count() as f32 * style.size * 0.5
        }
    }

    impl DrawingSurface for RecordingSurface {
        fn width(&self) -> u32 {
            self.width
        }
        fn height(&self) -> u32 {
            self.height
        }
        fn clear(&mut self, _color: Color) {
            self.ops.push(Op::Clear);
        }
        fn fill_rect(&mut self, rect: Rect, _paint: &Paint) {
            self.ops.push(Op::Fill(rect));
        }
        fn fill_rounded_rect(&mut self, rect: Rect, _radius: f32, _paint: &Paint) {
            self.ops.push(Op::FillRounded(rect));
        }
        fn stroke_rounded_rect(&mut self, rect: Rect, _radius: f32, _width: f32, _paint: &Paint) {
            self.ops.push(Op::Stroke(rect));
        }
        fn fill_circle(&mut self, _cx: f32, _cy: f32, _radius: f32, _paint: &Paint) {
            self.ops.push(Op::Circle);
        }
        fn stroke_arc(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32, _: &Paint) {
            self.ops.push(Op::Arc);
        }
        fn draw_image(&mut self, _image: &RgbaImage, _src: Rect, dest: Rect) {
            self.ops.push(Op::Image(dest));
        }
        fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle, _color: Color) {
            self.ops.push(Op::Text {
                text: text.to_string(),
                x,
                y,
                style: *style,
            });
        }
        fn save(&mut self) {
            self.depth += 1;
        }
        fn restore(&mut self) {
            self.depth -= 1;
        }
        fn clip_rounded_rect(&mut self, _rect: Rect, _radius: f32) {}
        fn set_global_alpha(&mut self, _alpha: f32) {}
        fn set_shadow(&mut self, _shadow: Option<Shadow>) {}
        fn read_pixels(&self) -> Vec<u8> {
            vec![0; (self.width * self.height * 4) as usize]
        }
        fn write_pixels(&mut self, _pixels: &[u8]) {}
    }

    fn solid_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([200, 40, 40, 255]))
    }

    fn paint(surface: &mut RecordingSurface, slide: &Slide) -> SlideLayout {
        paint_slide(surface, slide, None, None, 0, 1, 0.0)
    }

    #[test]
    fn test_empty_slide_draws_placeholder() {
        let mut surface = RecordingSurface::new(1280, 720);
        let layout = paint(&mut surface, &Slide::default());

        assert_eq!(surface.ops[0], Op::Clear);
        assert_eq!(layout.visual, VisualSlot::Placeholder);
        assert!(layout.accent);
        assert_eq!(layout.bullet_lines, 0);
        assert!(surface.texts().iter().any(|(t, ..)| *t == PLACEHOLDER_LABEL));
        assert!(surface.texts().iter().any(|(t, ..)| *t == "Key Idea"));
        assert_eq!(surface.depth, 0);
    }

    #[test]
    fn test_empty_slide_is_not_blank() {
        let mut surface = RasterSurface::without_text(160, 90);
        paint_slide(&mut surface, &Slide::default(), None, None, 0, 1, 0.0);

        let pixels = surface.read_pixels();
        let first = &pixels[..4];
        assert!(pixels.chunks(4).any(|p| p != first));
    }

    #[test]
    fn test_bullets_follow_heading() {
        let mut surface = RecordingSurface::new(1280, 720);
        let slide = Slide {
            heading: Some("Light reactions".into()),
            ..Slide::with_narration("Chlorophyll absorbs light. Water is split!\nOxygen leaves.")
        };
        let layout = paint(&mut surface, &slide);
        assert_eq!(layout.heading_lines, 1);
        assert_eq!(layout.bullet_lines, 3);

        let heading_y = surface.texts().iter().find(|(t, ..)| *t == "Light reactions").unwrap().2;
        let bullet_y = surface
            .texts()
            .iter()
            .find(|(t, ..)| *t == "Chlorophyll absorbs light.")
            .unwrap()
            .2;
        assert!(bullet_y > heading_y + HEADING_LINE_HEIGHT);
        assert_eq!(surface.ops.iter().filter(|op| **op == Op::Circle).count() - ACCENT_SPECKLES, 3);
    }

    #[test]
    fn test_voiceover_preferred_for_bullets() {
        let mut surface = RecordingSurface::new(1280, 720);
        let slide = Slide {
            voiceover_text: Some("Spoken version.".into()),
            ..Slide::with_narration("Written version.")
        };
        paint(&mut surface, &slide);
        let texts = surface.texts();
        assert!(texts.iter().any(|(t, ..)| *t == "Spoken version."));
        assert!(!texts.iter().any(|(t, ..)| *t == "Written version."));
    }

    #[test]
    fn test_snapshot_layout_splits_columns() {
        let mut surface = RecordingSurface::new(1280, 720);
        let page = solid_image(520, 673);
        let slide = Slide::with_narration("Left column text.");
        let layout = paint_slide(
            &mut surface,
            &slide,
            None,
            Some(PageSnapshot {
                image: &page,
                page: Some(2),
            }),
            0,
            1,
            0.0,
        );

        assert_eq!(layout.visual, VisualSlot::Snapshot);
        assert!(!layout.accent);
        let dest = surface
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Image(dest) => Some(*dest),
                _ => None,
            })
            .unwrap();
        assert!(dest.x > 640.0);
        assert!(surface.texts().iter().any(|(t, ..)| *t == "Page 2"));

        let bullet_x = surface
            .texts()
            .iter()
            .find(|(t, ..)| *t == "Left column text.")
            .unwrap()
            .1;
        assert!(bullet_x < dest.x);
    }

    #[test]
    fn test_snapshot_card_is_larger() {
        let page = solid_image(10, 10);
        let mut with = RecordingSurface::new(1280, 720);
        let mut without = RecordingSurface::new(1280, 720);
        let slide = Slide::default();
        let a = paint_slide(
            &mut with,
            &slide,
            None,
            Some(PageSnapshot {
                image: &page,
                page: None,
            }),
            0,
            1,
            0.0,
        );
        let b = paint(&mut without, &slide);
        assert!(a.card.w > b.card.w);
        assert!(a.card.h > b.card.h);
    }

    #[test]
    fn test_image_stacks_above_bullets() {
        let mut surface = RecordingSurface::new(1280, 720);
        let image = solid_image(800, 600);
        let slide = Slide::with_narration("Below the picture.");
        let layout = paint_slide(&mut surface, &slide, Some(&image), None, 0, 1, 0.0);

        assert_eq!(layout.visual, VisualSlot::Image);
        let images: Vec<Rect> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Image(dest) => Some(*dest),
                _ => None,
            })
            .collect();
        // Full-surface backdrop, then the stacked media.
        assert_eq!(images.len(), 2);
        assert_eq!(images[0], Rect::new(0.0, 0.0, 1280.0, 720.0));
        let bullet_y = surface
            .texts()
            .iter()
            .find(|(t, ..)| *t == "Below the picture.")
            .unwrap()
            .2;
        assert!(bullet_y > images[1].bottom());
    }

    #[test]
    fn test_degenerate_images_are_absent() {
        let mut surface = RecordingSurface::new(1280, 720);
        let empty = RgbaImage::new(0, 0);
        let layout = paint_slide(
            &mut surface,
            &Slide::default(),
            Some(&empty),
            Some(PageSnapshot {
                image: &empty,
                page: Some(1),
            }),
            0,
            1,
            0.0,
        );
        assert_eq!(layout.visual, VisualSlot::Placeholder);
        assert!(!surface.ops.iter().any(|op| matches!(op, Op::Image(_))));
    }

    #[test]
    fn test_long_excerpt_cut_to_whole_lines() {
        let mut surface = RecordingSurface::new(1280, 720);
        let page = solid_image(520, 673);
        let slide = Slide {
            source_excerpt_text: Some("photosynthesis converts light energy ".repeat(60)),
            ..Slide::with_narration("Short summary.")
        };
        let layout = paint_slide(
            &mut surface,
            &slide,
            None,
            Some(PageSnapshot {
                image: &page,
                page: Some(4),
            }),
            0,
            1,
            0.0,
        );

        assert!(layout.excerpt_lines > 0);
        assert!(layout.excerpt_lines < layout.excerpt_lines_total);

        let content_bottom = layout.card.bottom() - CARD_PADDING;
        let excerpt: Vec<_> = surface
            .texts()
            .into_iter()
            .filter(|(.., style)| *style == EXCERPT_STYLE)
            .collect();
        assert_eq!(excerpt.len(), layout.excerpt_lines);
        let baseline_pad = (EXCERPT_LINE_HEIGHT - EXCERPT_STYLE.size) / 2.0;
        for (_, _, y, _) in excerpt {
            assert!(y - baseline_pad + EXCERPT_LINE_HEIGHT <= content_bottom + 0.01);
        }
        assert!(surface.texts().iter().any(|(t, ..)| *t == "Source · page 4"));
    }

    #[test]
    fn test_excerpt_skipped_without_room() {
        let mut surface = RecordingSurface::new(1280, 720);
        let page = solid_image(10, 10);
        let slide = Slide {
            source_excerpt_text: Some("Never shown.".into()),
            ..Slide::with_narration(&"A long sentence that wraps many times. ".repeat(40))
        };
        let layout = paint_slide(
            &mut surface,
            &slide,
            None,
            Some(PageSnapshot {
                image: &page,
                page: None,
            }),
            0,
            1,
            0.0,
        );
        assert_eq!(layout.excerpt_lines, 0);
        assert!(!surface.texts().iter().any(|(t, ..)| t.contains("Never")));
    }

    #[test]
    fn test_code_panel_truncates_lines() {
        let mut surface = RecordingSurface::new(1280, 720);
        let long = format!("print('{}')", "x".repeat(400));
        let slide = Slide {
            code_snippet: Some(format!("def f():\n\t{long}\n\n")),
            snippet_language: Some("python".into()),
            ..Slide::default()
        };
        let layout = paint(&mut surface, &slide);
        assert_eq!(layout.code_lines, 2);

        let texts = surface.texts();
        assert!(texts.iter().any(|(t, ..)| *t == "python"));
        let code: Vec<_> = texts.iter().filter(|(.., style)| *style == CODE_STYLE).collect();
        assert_eq!(code.len(), 2);
        assert_eq!(code[0].0, "def f():");
        assert!(code[1].0.starts_with("    print('"));
        assert!(code[1].0.ends_with(ELLIPSIS));

        let inner_w = layout.card.w - 2.0 * CARD_PADDING - 2.0 * CODE_PADDING;
        for (text, ..) in code {
            assert!(surface.measure_text(text, &CODE_STYLE) <= inner_w);
        }
    }

    #[test]
    fn test_code_panel_limited_by_height() {
        let mut surface = RecordingSurface::new(1280, 720);
        let slide = Slide {
            code_snippet: Some((0..100).map(|i| format!("line {i}\n")).collect()),
            ..Slide::default()
        };
        let layout = paint(&mut surface, &slide);
        let content_h = layout.card.h - 2.0 * CARD_PADDING;
        let max_h = content_h * CODE_MAX_HEIGHT_RATIO - 2.0 * CODE_PADDING;
        assert_eq!(layout.code_lines, lines_that_fit(max_h, CODE_LINE_HEIGHT));
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(progress_fraction(1, 4, 0.5), 0.375);
        assert_eq!(progress_fraction(3, 4, 7.0), 1.0);
        assert_eq!(progress_fraction(0, 4, -1.0), 0.0);
        assert_eq!(progress_fraction(2, 4, f64::NAN), 0.5);
        assert_eq!(progress_fraction(0, 0, 1.0), 1.0);
    }

    #[test]
    fn test_progress_bar_below_card() {
        let mut surface = RecordingSurface::new(1280, 720);
        let layout = paint_slide(&mut surface, &Slide::default(), None, None, 1, 2, 0.5);
        assert_eq!(layout.progress_fraction, 0.75);

        let track = Rect::new(
            layout.card.x,
            layout.card.bottom() + PROGRESS_GAP,
            layout.card.w,
            PROGRESS_HEIGHT,
        );
        let fill = Rect::new(track.x, track.y, track.w * 0.75, track.h);
        let tail = &surface.ops[surface.ops.len() - 2..];
        assert_eq!(tail, [Op::FillRounded(track), Op::FillRounded(fill)]);
        assert!(track.bottom() <= 720.0);
    }

    #[test]
    fn test_accent_pattern_is_deterministic() {
        let mut a = RecordingSurface::new(320, 180);
        let mut b = RecordingSurface::new(320, 180);
        paint(&mut a, &Slide::default());
        paint(&mut b, &Slide::default());
        assert_eq!(a.ops, b.ops);
        assert!(a.ops.iter().filter(|op| **op == Op::Arc).count() >= ACCENT_ARCS * 2);
    }

    proptest! {
        #[test]
        fn prop_any_slide_paints(
            narration in "\\PC{0,200}",
            heading in proptest::option::of("\\PC{0,60}"),
            code in proptest::option::of("[ -~\\t\\n]{0,120}"),
            width in 1u32..1600,
            height in 1u32..1000,
            progress in -2.0f64..3.0,
        ) {
            let mut surface = RecordingSurface::new(width, height);
            let slide = Slide {
                heading,
                code_snippet: code,
                ..Slide::with_narration(narration)
            };
            let layout = paint_slide(&mut surface, &slide, None, None, 0, 3, progress);
            prop_assert_eq!(surface.depth, 0);
            prop_assert!((0.0..=1.0).contains(&layout.progress_fraction));
        }
    }
}
