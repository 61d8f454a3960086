//! 2D drawing surface abstraction.
//!
//! The composer only talks to [`DrawingSurface`]. [`crate::raster::RasterSurface`]
//! is the software implementation used for export.

use image::RgbaImage;

use crate::text::{TextMeasure, TextStyle};

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// `0xRRGGBB`, opaque.
    pub const fn hex(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Same color with alpha scaled by `factor` (0..=1).
    pub fn with_alpha(self, factor: f32) -> Self {
        Self {
            a: (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8,
            ..self
        }
    }

    /// Component-wise interpolation.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// Axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    /// Shrink by `d` on every side.
    pub fn inset(&self, d: f32) -> Rect {
        Rect::new(self.x + d, self.y + d, (self.w - 2.0 * d).max(0.0), (self.h - 2.0 * d).max(0.0))
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// A color stop at `offset` in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color,
}

impl GradientStop {
    pub const fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// Color at `t` along sorted `stops`.
pub fn sample_stops(stops: &[GradientStop], t: f32) -> Color {
    let Some(first) = stops.first() else {
        return Color::TRANSPARENT;
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = (b.offset - a.offset).max(f32::EPSILON);
            return a.color.lerp(b.color, (t - a.offset) / span);
        }
    }
    stops[stops.len() - 1].color
}

/// Fill style.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear {
        from: (f32, f32),
        to: (f32, f32),
        stops: Vec<GradientStop>,
    },
    Radial {
        center: (f32, f32),
        inner_radius: f32,
        outer_radius: f32,
        stops: Vec<GradientStop>,
    },
}

impl Paint {
    /// Evaluate the paint at a surface position.
    pub fn color_at(&self, x: f32, y: f32) -> Color {
        match self {
            Paint::Solid(color) => *color,
            Paint::Linear { from, to, stops } => {
                let (dx, dy) = (to.0 - from.0, to.1 - from.1);
                let len_sq = dx * dx + dy * dy;
                let t = if len_sq <= f32::EPSILON {
                    0.0
                } else {
                    ((x - from.0) * dx + (y - from.1) * dy) / len_sq
                };
                sample_stops(stops, t.clamp(0.0, 1.0))
            }
            Paint::Radial {
                center,
                inner_radius,
                outer_radius,
                stops,
            } => {
                let dist = ((x - center.0).powi(2) + (y - center.1).powi(2)).sqrt();
                let span = (outer_radius - inner_radius).max(f32::EPSILON);
                sample_stops(stops, ((dist - inner_radius) / span).clamp(0.0, 1.0))
            }
        }
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

/// Soft drop shadow applied to subsequent shape fills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Immediate-mode 2D drawing target.
///
/// State (clip, global alpha, shadow) is saved and restored with
/// [`save`](DrawingSurface::save) / [`restore`](DrawingSurface::restore).
/// Text is positioned by the top of its line box.
pub trait DrawingSurface: TextMeasure {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Reset every pixel to `color`, ignoring clip and alpha.
    fn clear(&mut self, color: Color);

    fn fill_rect(&mut self, rect: Rect, paint: &Paint);
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, paint: &Paint);
    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, line_width: f32, paint: &Paint);
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint);

    /// Stroke the arc from `start` to `end` radians, clockwise from +x.
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
    );

    /// Draw the `src` region of `image` scaled into `dest`.
    fn draw_image(&mut self, image: &RgbaImage, src: Rect, dest: Rect);

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle, color: Color);

    fn save(&mut self);
    fn restore(&mut self);

    /// Intersect the clip with a rounded rectangle.
    fn clip_rounded_rect(&mut self, rect: Rect, radius: f32);

    fn set_global_alpha(&mut self, alpha: f32);
    fn set_shadow(&mut self, shadow: Option<Shadow>);

    /// Copy of the current picture as tightly packed RGBA rows.
    fn read_pixels(&self) -> Vec<u8>;

    /// Replace the picture with tightly packed RGBA rows, as returned by
    /// [`read_pixels`](DrawingSurface::read_pixels). Buffers of the wrong
    /// length are ignored.
    fn write_pixels(&mut self, pixels: &[u8]);
}

/// Source rect of `image_w`×`image_h` that covers `dest` ("object-fit:
/// cover"): scaled so the image fills `dest`, overflow cropped evenly.
///
/// Returns `None` when either side is degenerate.
pub fn cover_source_rect(image_w: u32, image_h: u32, dest: Rect) -> Option<Rect> {
    if image_w == 0 || image_h == 0 || dest.is_empty() {
        return None;
    }
    let (iw, ih) = (image_w as f32, image_h as f32);
    let scale = (dest.w / iw).max(dest.h / ih);
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    let src_w = (dest.w / scale).min(iw);
    let src_h = (dest.h / scale).min(ih);
    Some(Rect::new((iw - src_w) / 2.0, (ih - src_h) / 2.0, src_w, src_h))
}
