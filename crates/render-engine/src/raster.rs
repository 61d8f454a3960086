//! Software rasterizer behind [`DrawingSurface`].
//!
//! Every shape is reduced to a coverage mask: its outline is filled as a
//! polygon with `imageproc` on a supersampled grid and area-averaged back
//! down, which gives the edges their anti-aliasing. Masks are then
//! composited source-over onto the canvas through the current clip and
//! global alpha. Shadows are the shape's mask, offset and Gaussian-blurred.
//! Glyphs come from `rusttype`.

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::path::Path;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;
use imageproc::rect::Rect as PixelRect;
use rusttype::{point, Font, Scale};
use slidecast_common::config::FontConfig;
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::surface::{Color, DrawingSurface, Paint, Rect, Shadow};
use crate::text::{FontFace, TextMeasure, TextStyle};

/// Average advance of a glyph relative to its size, used when no fonts are
/// loaded.
const FALLBACK_ADVANCE: f32 = 0.55;

/// Mask resolution relative to the canvas, per axis.
const SUPERSAMPLE: u32 = 4;

/// The three faces the composer draws with.
pub struct FontSet {
    regular: Font<'static>,
    bold: Font<'static>,
    monospace: Font<'static>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("glyphs", &self.regular.glyph_count())
            .finish_non_exhaustive()
    }
}

impl FontSet {
    pub fn from_bytes(
        regular: Vec<u8>,
        bold: Vec<u8>,
        monospace: Vec<u8>,
    ) -> SlidecastResult<Self> {
        Ok(Self {
            regular: parse_font(regular, "regular")?,
            bold: parse_font(bold, "bold")?,
            monospace: parse_font(monospace, "monospace")?,
        })
    }

    /// Load fonts named by the config or found in well-known system
    /// locations. Bold and monospace fall back to the regular face.
    pub fn load(config: &FontConfig) -> SlidecastResult<Self> {
        let regular_path = config.resolve_regular().ok_or_else(|| {
            SlidecastError::unsupported(
                "No usable font found; set fonts.regular in the config file",
            )
        })?;
        let regular = read_font(&regular_path)?;
        let bold = match config.resolve_bold() {
            Some(path) => read_font(&path)?,
            None => regular.clone(),
        };
        let monospace = match config.resolve_monospace() {
            Some(path) => read_font(&path)?,
            None => regular.clone(),
        };

        tracing::debug!(regular = %regular_path.display(), "Fonts loaded");
        Self::from_bytes(regular, bold, monospace)
    }

    pub fn font(&self, face: FontFace) -> &Font<'static> {
        match face {
            FontFace::Regular => &self.regular,
            FontFace::Bold => &self.bold,
            FontFace::Monospace => &self.monospace,
        }
    }

    fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        let font = self.font(style.face);
        font.layout(text, Scale::uniform(style.size), point(0.0, 0.0))
            .last()
            .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }
}

fn read_font(path: &Path) -> SlidecastResult<Vec<u8>> {
    std::fs::read(path).map_err(|_| SlidecastError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_font(bytes: Vec<u8>, face: &str) -> SlidecastResult<Font<'static>> {
    Font::try_from_vec(bytes)
        .ok_or_else(|| SlidecastError::unsupported(format!("Unreadable {face} font")))
}

/// Coverage (0..=255) of a region of the canvas whose top-left pixel is
/// (`x`, `y`). Pixels outside the region are uncovered.
#[derive(Debug, Clone)]
struct Mask {
    x: i32,
    y: i32,
    coverage: GrayImage,
}

impl Mask {
    fn solid(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            coverage: GrayImage::from_pixel(width, height, Luma([255])),
        }
    }

    fn right(&self) -> i32 {
        self.x + self.coverage.width() as i32
    }

    fn bottom(&self) -> i32 {
        self.y + self.coverage.height() as i32
    }

    fn get(&self, px: i32, py: i32) -> u8 {
        let (mx, my) = (px - self.x, py - self.y);
        if mx < 0 || my < 0 {
            return 0;
        }
        self.coverage
            .get_pixel_checked(mx as u32, my as u32)
            .map_or(0, |p| p[0])
    }

    /// Pixelwise minimum over the overlap of both regions.
    fn intersect(&self, other: &Mask) -> Mask {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        let (w, h) = ((x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32);
        let coverage = GrayImage::from_fn(w, h, |mx, my| {
            let (px, py) = (x0 + mx as i32, y0 + my as i32);
            Luma([self.get(px, py).min(other.get(px, py))])
        });
        Mask { x: x0, y: y0, coverage }
    }

    /// Spread the mask with a Gaussian of `sigma` pixels, growing the region
    /// so nothing is cut off.
    fn blurred(&self, sigma: f32) -> Mask {
        if sigma <= 0.0 {
            return self.clone();
        }
        let pad = (sigma * 3.0).ceil() as u32;
        let (w, h) = self.coverage.dimensions();
        let mut padded = GrayImage::new(w + 2 * pad, h + 2 * pad);
        imageops::replace(&mut padded, &self.coverage, pad as i64, pad as i64);
        Mask {
            x: self.x - pad as i32,
            y: self.y - pad as i32,
            coverage: gaussian_blur_f32(&padded, sigma),
        }
    }
}

/// Closed outlines making up one shape. `holes` are cut out of `fill`.
#[derive(Debug, Clone, Default)]
struct Shape {
    bounds: Rect,
    fill: Vec<Vec<(f32, f32)>>,
    holes: Vec<Vec<(f32, f32)>>,
}

impl Shape {
    fn rect(rect: Rect) -> Self {
        Self {
            bounds: rect,
            fill: vec![rounded_rect_outline(rect, 0.0)],
            ..Self::default()
        }
    }

    fn rounded_rect(rect: Rect, radius: f32) -> Self {
        Self {
            bounds: rect,
            fill: vec![rounded_rect_outline(rect, radius)],
            ..Self::default()
        }
    }

    fn circle(cx: f32, cy: f32, radius: f32) -> Self {
        Self {
            bounds: Rect::new(cx - radius, cy - radius, radius * 2.0, radius * 2.0),
            fill: vec![circle_outline(cx, cy, radius)],
            ..Self::default()
        }
    }

    fn translated(mut self, dx: f32, dy: f32) -> Self {
        self.bounds.x += dx;
        self.bounds.y += dy;
        for outline in self.fill.iter_mut().chain(self.holes.iter_mut()) {
            for p in outline.iter_mut() {
                p.0 += dx;
                p.1 += dy;
            }
        }
        self
    }
}

/// Points along an arc, both ends included.
fn arc_points(cx: f32, cy: f32, radius: f32, start: f32, sweep: f32, out: &mut Vec<(f32, f32)>) {
    let quarters = sweep.abs() / FRAC_PI_2;
    let steps = ((radius.max(0.0).sqrt() * 2.0 * quarters).ceil() as usize).clamp(2, 96);
    for i in 0..=steps {
        let angle = start + sweep * i as f32 / steps as f32;
        out.push((cx + radius * angle.cos(), cy + radius * angle.sin()));
    }
}

fn rounded_rect_outline(rect: Rect, radius: f32) -> Vec<(f32, f32)> {
    let r = radius.min(rect.w / 2.0).min(rect.h / 2.0).max(0.0);
    if r <= 0.0 {
        return vec![
            (rect.x, rect.y),
            (rect.right(), rect.y),
            (rect.right(), rect.bottom()),
            (rect.x, rect.bottom()),
        ];
    }
    let mut points = Vec::new();
    arc_points(rect.right() - r, rect.y + r, r, -FRAC_PI_2, FRAC_PI_2, &mut points);
    arc_points(rect.right() - r, rect.bottom() - r, r, 0.0, FRAC_PI_2, &mut points);
    arc_points(rect.x + r, rect.bottom() - r, r, FRAC_PI_2, FRAC_PI_2, &mut points);
    arc_points(rect.x + r, rect.y + r, r, PI, FRAC_PI_2, &mut points);
    points
}

fn circle_outline(cx: f32, cy: f32, radius: f32) -> Vec<(f32, f32)> {
    let mut points = Vec::new();
    arc_points(cx, cy, radius, 0.0, TAU, &mut points);
    points.pop();
    points
}

/// Fill one outline into a supersampled mask whose origin is canvas pixel
/// (`x`, `y`).
fn fill_outline(fine: &mut GrayImage, outline: &[(f32, f32)], x: i32, y: i32, value: Luma<u8>) {
    let s = SUPERSAMPLE as f32;
    let mut points: Vec<Point<i32>> = Vec::with_capacity(outline.len());
    for &(px, py) in outline {
        let p = Point::new(
            ((px - x as f32) * s).round() as i32,
            ((py - y as f32) * s).round() as i32,
        );
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() >= 3 {
        draw_polygon_mut(fine, &points, value);
    }
}

fn is_aligned(v: f32) -> bool {
    (v - v.round()).abs() < 1e-3
}

#[derive(Debug, Clone)]
struct DrawState {
    alpha: f32,
    shadow: Option<Shadow>,
    clip: Option<Mask>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            shadow: None,
            clip: None,
        }
    }
}

/// CPU drawing surface over an RGBA canvas.
#[derive(Debug)]
pub struct RasterSurface {
    canvas: RgbaImage,
    fonts: Option<Arc<FontSet>>,
    state: DrawState,
    saved: Vec<DrawState>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32, fonts: Arc<FontSet>) -> Self {
        Self::with_fonts(width, height, Some(fonts))
    }

    /// A surface that draws shapes and images but no glyphs. Text is
    /// measured with a fixed per-character advance.
    pub fn without_text(width: u32, height: u32) -> Self {
        Self::with_fonts(width, height, None)
    }

    fn with_fonts(width: u32, height: u32, fonts: Option<Arc<FontSet>>) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            fonts,
            state: DrawState::default(),
            saved: Vec::new(),
        }
    }

    /// Integer region covering `bounds` plus a one-pixel fringe, limited to
    /// the canvas grown by `margin` on every side.
    fn region(&self, bounds: Rect, margin: f32) -> Option<(i32, i32, u32, u32)> {
        let m = margin.max(0.0).ceil() as i32;
        let (cw, ch) = (self.canvas.width() as i32, self.canvas.height() as i32);
        let x0 = (bounds.x.floor() as i32 - 1).max(-m);
        let y0 = (bounds.y.floor() as i32 - 1).max(-m);
        let x1 = (bounds.right().ceil() as i32 + 1).min(cw + m);
        let y1 = (bounds.bottom().ceil() as i32 + 1).min(ch + m);
        (x1 > x0 && y1 > y0).then(|| (x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    fn rasterize(&self, shape: &Shape, margin: f32) -> Option<Mask> {
        let (x, y, w, h) = self.region(shape.bounds, margin)?;
        let mut fine = GrayImage::new(w * SUPERSAMPLE, h * SUPERSAMPLE);
        for outline in &shape.fill {
            fill_outline(&mut fine, outline, x, y, Luma([255]));
        }
        for outline in &shape.holes {
            fill_outline(&mut fine, outline, x, y, Luma([0]));
        }
        Some(Mask {
            x,
            y,
            coverage: imageops::thumbnail(&fine, w, h),
        })
    }

    /// Mask of a rectangle; exact when its edges sit on the pixel grid.
    fn rect_mask(&self, rect: Rect) -> Option<Mask> {
        if ![rect.x, rect.y, rect.right(), rect.bottom()].into_iter().all(is_aligned) {
            return self.rasterize(&Shape::rect(rect), 0.0);
        }
        let x0 = (rect.x.round() as i32).max(0);
        let y0 = (rect.y.round() as i32).max(0);
        let x1 = (rect.right().round() as i32).min(self.canvas.width() as i32);
        let y1 = (rect.bottom().round() as i32).min(self.canvas.height() as i32);
        (x1 > x0 && y1 > y0).then(|| Mask::solid(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// Blend `color_at` onto the canvas wherever `mask` covers it.
    fn composite(&mut self, mask: &Mask, color_at: impl Fn(u32, u32) -> Color) {
        let alpha = self.state.alpha;
        if alpha <= 0.0 {
            return;
        }
        let clip = self.state.clip.as_ref();
        let canvas = &mut self.canvas;

        let x0 = mask.x.max(0);
        let y0 = mask.y.max(0);
        let x1 = mask.right().min(canvas.width() as i32);
        let y1 = mask.bottom().min(canvas.height() as i32);
        for py in y0..y1 {
            for px in x0..x1 {
                let covered = mask.get(px, py);
                if covered == 0 {
                    continue;
                }
                let mut coverage = covered as f32 / 255.0 * alpha;
                if let Some(clip) = clip {
                    coverage *= clip.get(px, py) as f32 / 255.0;
                }
                let color = color_at(px as u32, py as u32);
                let a = (color.a as f32 * coverage).round() as u8;
                if a > 0 {
                    canvas
                        .get_pixel_mut(px as u32, py as u32)
                        .blend(&Rgba([color.r, color.g, color.b, a]));
                }
            }
        }
    }

    fn fill_paint(&mut self, mask: &Mask, paint: &Paint) {
        match paint {
            Paint::Solid(color) => {
                let color = *color;
                self.composite(mask, |_, _| color);
            }
            paint => self.composite(mask, |x, y| paint.color_at(x as f32 + 0.5, y as f32 + 0.5)),
        }
    }

    /// Fill `shape`, casting the current shadow first if one is set.
    fn fill_shape(&mut self, shape: Shape, paint: &Paint) {
        if let Some(shadow) = self.state.shadow {
            let sigma = shadow.blur.max(0.0) / 2.0;
            let cast = shape.clone().translated(shadow.offset_x, shadow.offset_y);
            if let Some(mask) = self.rasterize(&cast, sigma * 3.0) {
                let color = shadow.color;
                self.composite(&mask.blurred(sigma), |_, _| color);
            }
        }
        if let Some(mask) = self.rasterize(&shape, 0.0) {
            self.fill_paint(&mask, paint);
        }
    }

    /// Opaque solid fill of a grid-aligned rectangle, straight onto the
    /// canvas. Returns false when the fill needs the general path.
    fn fill_rect_direct(&mut self, rect: Rect, paint: &Paint) -> bool {
        let Paint::Solid(color) = paint else {
            return false;
        };
        if color.a != 255
            || self.state.alpha < 1.0
            || self.state.shadow.is_some()
            || self.state.clip.is_some()
            || ![rect.x, rect.y, rect.right(), rect.bottom()].into_iter().all(is_aligned)
        {
            return false;
        }
        let Some(mask) = self.rect_mask(rect) else {
            return true;
        };
        let (w, h) = mask.coverage.dimensions();
        let area = PixelRect::at(mask.x, mask.y).of_size(w, h);
        draw_filled_rect_mut(&mut self.canvas, area, Rgba([color.r, color.g, color.b, 255]));
        true
    }
}

impl TextMeasure for RasterSurface {
    fn measure_text(&self, text: &str, style: &TextStyle) -> f32 {
        match &self.fonts {
            Some(fonts) => fonts.measure(text, style),
            None => text.chars().count() as f32 * style.size * FALLBACK_ADVANCE,
        }
    }
}

impl DrawingSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn clear(&mut self, color: Color) {
        let (w, h) = self.canvas.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let pixel = Rgba([color.r, color.g, color.b, color.a]);
        draw_filled_rect_mut(&mut self.canvas, PixelRect::at(0, 0).of_size(w, h), pixel);
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        if rect.is_empty() || self.fill_rect_direct(rect, paint) {
            return;
        }
        if self.state.shadow.is_some() {
            self.fill_shape(Shape::rect(rect), paint);
        } else if let Some(mask) = self.rect_mask(rect) {
            self.fill_paint(&mask, paint);
        }
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, paint: &Paint) {
        if rect.is_empty() {
            return;
        }
        self.fill_shape(Shape::rounded_rect(rect, radius), paint);
    }

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, line_width: f32, paint: &Paint) {
        if rect.is_empty() || line_width <= 0.0 {
            return;
        }
        let half = line_width / 2.0;
        let outer = Rect::new(
            rect.x - half,
            rect.y - half,
            rect.w + line_width,
            rect.h + line_width,
        );
        let inner = rect.inset(half);
        let mut shape = Shape::rounded_rect(outer, radius + half);
        if !inner.is_empty() {
            shape.holes.push(rounded_rect_outline(inner, (radius - half).max(0.0)));
        }
        if let Some(mask) = self.rasterize(&shape, 0.0) {
            self.fill_paint(&mask, paint);
        }
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, paint: &Paint) {
        if radius <= 0.0 {
            return;
        }
        self.fill_shape(Shape::circle(cx, cy, radius), paint);
    }

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
        if radius <= 0.0 || line_width <= 0.0 {
            return;
        }
        let half = line_width / 2.0;
        let (outer, inner) = (radius + half, (radius - half).max(0.0));
        let sweep = (end - start).clamp(0.0, TAU);
        if sweep <= 0.0 {
            return;
        }

        let mut shape = Shape {
            bounds: Rect::new(cx - outer, cy - outer, outer * 2.0, outer * 2.0),
            ..Shape::default()
        };
        if sweep >= TAU {
            shape.fill.push(circle_outline(cx, cy, outer));
            if inner > 0.0 {
                shape.holes.push(circle_outline(cx, cy, inner));
            }
        } else {
            let mut band = Vec::new();
            arc_points(cx, cy, outer, start, sweep, &mut band);
            arc_points(cx, cy, inner, start + sweep, -sweep, &mut band);
            shape.fill.push(band);
        }
        if let Some(mask) = self.rasterize(&shape, 0.0) {
            self.fill_paint(&mask, paint);
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, src: Rect, dest: Rect) {
        if image.width() == 0 || image.height() == 0 || src.is_empty() || dest.is_empty() {
            return;
        }
        let sx = (src.x.floor().max(0.0) as u32).min(image.width() - 1);
        let sy = (src.y.floor().max(0.0) as u32).min(image.height() - 1);
        let sw = (src.right().ceil() as u32).clamp(sx + 1, image.width()) - sx;
        let sh = (src.bottom().ceil() as u32).clamp(sy + 1, image.height()) - sy;
        let (dw, dh) = (dest.w.round().max(1.0) as u32, dest.h.round().max(1.0) as u32);

        let crop = imageops::crop_imm(image, sx, sy, sw, sh).to_image();
        let scaled = imageops::resize(&crop, dw, dh, FilterType::Triangle);
        let (dx, dy) = (dest.x.round() as i32, dest.y.round() as i32);
        let mask = Mask::solid(dx, dy, dw, dh);
        self.composite(&mask, |x, y| {
            let Rgba([r, g, b, a]) = *scaled.get_pixel(
                (x as i32 - dx).clamp(0, dw as i32 - 1) as u32,
                (y as i32 - dy).clamp(0, dh as i32 - 1) as u32,
            );
            Color::rgba(r, g, b, a)
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, style: &TextStyle, color: Color) {
        let Some(fonts) = self.fonts.clone() else {
            return;
        };
        let font = fonts.font(style.face);
        let scale = Scale::uniform(style.size);
        let ascent = font.v_metrics(scale).ascent;
        let glyphs: Vec<_> = font.layout(text, scale, point(x, y + ascent)).collect();

        let Some((x0, y0, x1, y1)) = glyphs
            .iter()
            .filter_map(|glyph| glyph.pixel_bounding_box())
            .map(|bb| (bb.min.x, bb.min.y, bb.max.x, bb.max.y))
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
        else {
            return;
        };

        let mut coverage = GrayImage::new((x1 - x0).max(0) as u32, (y1 - y0).max(0) as u32);
        for glyph in &glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            let (ox, oy) = ((bb.min.x - x0) as u32, (bb.min.y - y0) as u32);
            glyph.draw(|gx, gy, v| {
                if let Some(p) = coverage.get_pixel_mut_checked(ox + gx, oy + gy) {
                    p[0] = p[0].max((v * 255.0).round() as u8);
                }
            });
        }
        self.composite(&Mask { x: x0, y: y0, coverage }, |_, _| color);
    }

    fn save(&mut self) {
        self.saved.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }

    fn clip_rounded_rect(&mut self, rect: Rect, radius: f32) {
        let mask = if radius > 0.0 {
            self.rasterize(&Shape::rounded_rect(rect, radius), 0.0)
        } else {
            self.rect_mask(rect)
        };
        let mask = mask.unwrap_or_else(|| Mask::solid(0, 0, 0, 0));
        self.state.clip = Some(match &self.state.clip {
            Some(clip) => clip.intersect(&mask),
            None => mask,
        });
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.state.shadow = shadow;
    }

    fn read_pixels(&self) -> Vec<u8> {
        self.canvas.as_raw().clone()
    }

    fn write_pixels(&mut self, pixels: &[u8]) {
        if pixels.len() == self.canvas.as_raw().len() {
            self.canvas.copy_from_slice(pixels);
        }
    }
}
