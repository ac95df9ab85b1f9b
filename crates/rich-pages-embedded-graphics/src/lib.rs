//! embedded-graphics measurer and page rasterizer for `rich-pages-render`.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

use core::convert::Infallible;
use std::sync::Arc;

use embedded_graphics::{
    mono_font::{
        ascii::{
            FONT_10X20, FONT_6X10, FONT_6X13_BOLD, FONT_7X14, FONT_7X14_BOLD, FONT_9X18,
            FONT_9X18_BOLD,
        },
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use rich_pages::{Color, FontSpec, TextStyle};
use rich_pages_render::{
    DecorationCommand, LayoutEngine, PageRasterizer, TextMeasurer, TextRunCommand,
};

/// Backend-local font identifier used for metrics and rasterization dispatch.
pub type FontId = u8;

/// Why a font request could not be honored exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFallbackReason {
    /// Requested family is not a built-in mono face.
    UnknownFamily,
    UnknownFontId,
}

/// Resolved font selection for a font request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontSelection {
    pub font_id: FontId,
    /// Integer pixel magnification applied to the face.
    pub scale: u32,
    pub fallback_reason: Option<FontFallbackReason>,
}

/// Unscaled cell metrics for a specific font id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontMetrics {
    pub char_width: i32,
    pub char_height: i32,
    /// Distance from cell top to baseline.
    pub ascent: i32,
}

/// Font abstraction used by the rasterizer's text paths.
pub trait FontBackend {
    fn resolve_font(&self, font: &FontSpec) -> FontSelection;

    fn metrics(&self, font_id: FontId) -> FontMetrics;

    /// Number of cells a code point occupies.
    fn glyph_cells(&self, ch: char) -> i32 {
        if ch.is_ascii() {
            1
        } else {
            2
        }
    }

    /// Draw `text` with its baseline starting at `origin`; returns the
    /// advance in pixels.
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        selection: FontSelection,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>;
}

/// Built-in ASCII mono faces, magnified by whole pixels for large sizes.
///
/// Code points outside ASCII are drawn as two-cell outlined boxes.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    const SIZE_SMALL: FontId = 0;
    const SIZE_MEDIUM: FontId = 1;
    const SIZE_LARGE: FontId = 2;
    const SIZE_XL: FontId = 3;

    const VARIANT_REGULAR: FontId = 0;
    const VARIANT_BOLD: FontId = 1;

    fn encode_font_id(size_bucket: FontId, variant: FontId) -> FontId {
        (size_bucket << 1) | (variant & 0x01)
    }

    fn decode_font_id(font_id: FontId) -> (FontId, FontId) {
        ((font_id >> 1) & 0x03, font_id & 0x01)
    }

    fn size_bucket_for(size_px: f32) -> FontId {
        if size_px >= 24.0 {
            Self::SIZE_XL
        } else if size_px >= 18.0 {
            Self::SIZE_LARGE
        } else if size_px >= 14.0 {
            Self::SIZE_MEDIUM
        } else {
            Self::SIZE_SMALL
        }
    }

    fn font_for(font_id: FontId) -> (&'static MonoFont<'static>, Option<FontFallbackReason>) {
        let (size_bucket, variant) = Self::decode_font_id(font_id);
        match (size_bucket, variant) {
            (Self::SIZE_SMALL, Self::VARIANT_REGULAR) => (&FONT_6X10, None),
            (Self::SIZE_SMALL, Self::VARIANT_BOLD) => (&FONT_6X13_BOLD, None),
            (Self::SIZE_MEDIUM, Self::VARIANT_REGULAR) => (&FONT_7X14, None),
            (Self::SIZE_MEDIUM, Self::VARIANT_BOLD) => (&FONT_7X14_BOLD, None),
            (Self::SIZE_LARGE, Self::VARIANT_REGULAR) => (&FONT_9X18, None),
            (Self::SIZE_LARGE, Self::VARIANT_BOLD) => (&FONT_9X18_BOLD, None),
            (Self::SIZE_XL, Self::VARIANT_REGULAR) => (&FONT_10X20, None),
            (Self::SIZE_XL, Self::VARIANT_BOLD) => (&FONT_9X18_BOLD, None),
            _ => (&FONT_9X18, Some(FontFallbackReason::UnknownFontId)),
        }
    }

    fn family_supported(family: &str) -> bool {
        matches!(
            family.trim().to_ascii_lowercase().as_str(),
            "monospace" | "mono" | "fixed"
        )
    }
}

impl FontBackend for MonoFontBackend {
    fn resolve_font(&self, font: &FontSpec) -> FontSelection {
        let variant = if font.bold {
            Self::VARIANT_BOLD
        } else {
            Self::VARIANT_REGULAR
        };
        let font_id = Self::encode_font_id(Self::size_bucket_for(font.size_px), variant);
        let (face, face_fallback) = Self::font_for(font_id);
        let cell_height = face.character_size.height.max(1) as f32;
        let scale = (font.size_px / cell_height).round().max(1.0) as u32;
        let fallback_reason = face_fallback.or_else(|| {
            (!Self::family_supported(&font.family)).then_some(FontFallbackReason::UnknownFamily)
        });
        FontSelection {
            font_id,
            scale,
            fallback_reason,
        }
    }

    fn metrics(&self, font_id: FontId) -> FontMetrics {
        let (face, _) = Self::font_for(font_id);
        FontMetrics {
            char_width: (face.character_size.width + face.character_spacing) as i32,
            char_height: face.character_size.height as i32,
            ascent: face.baseline as i32,
        }
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        selection: FontSelection,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let (face, _) = Self::font_for(selection.font_id);
        let metrics = self.metrics(selection.font_id);
        let style = MonoTextStyle::new(face, color);
        let tofu = PrimitiveStyle::with_stroke(color, 1);
        let mut target = ScaledTarget::new(display, origin, selection.scale);
        let mut cursor = 0i32;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            let cells = self.glyph_cells(ch);
            if ch.is_ascii() {
                let glyph: &str = ch.encode_utf8(&mut buf);
                Text::with_baseline(glyph, Point::new(cursor, 0), style, Baseline::Alphabetic)
                    .draw(&mut target)?;
            } else {
                let box_w = (cells * metrics.char_width - 2).max(1) as u32;
                let box_h = (metrics.ascent - 1).max(1) as u32;
                let top_left = Point::new(cursor + 1, 1 - metrics.ascent);
                Rectangle::new(top_left, Size::new(box_w, box_h))
                    .into_styled(tofu)
                    .draw(&mut target)?;
            }
            cursor += cells * metrics.char_width;
        }
        Ok(cursor * selection.scale as i32)
    }
}

/// Draw target adapter that magnifies every pixel into a `scale`×`scale`
/// block placed relative to `origin`.
struct ScaledTarget<'a, D> {
    inner: &'a mut D,
    origin: Point,
    scale: u32,
}

impl<'a, D> ScaledTarget<'a, D> {
    fn new(inner: &'a mut D, origin: Point, scale: u32) -> Self {
        Self {
            inner,
            origin,
            scale: scale.max(1),
        }
    }
}

impl<D: DrawTarget> Dimensions for ScaledTarget<'_, D> {
    fn bounding_box(&self) -> Rectangle {
        let inner = self.inner.bounding_box();
        let s = self.scale as i32;
        let top_left = Point::new(
            (inner.top_left.x - self.origin.x).div_euclid(s),
            (inner.top_left.y - self.origin.y).div_euclid(s),
        );
        Rectangle::new(
            top_left,
            Size::new(
                inner.size.width / self.scale + 2,
                inner.size.height / self.scale + 2,
            ),
        )
    }
}

impl<D: DrawTarget> DrawTarget for ScaledTarget<'_, D> {
    type Color = D::Color;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let s = self.scale as i32;
        for Pixel(point, color) in pixels {
            let block = Rectangle::new(self.origin + point * s, Size::new_equal(self.scale));
            self.inner.fill_solid(&block, color)?;
        }
        Ok(())
    }
}

/// `TextMeasurer` adapter backed by this crate's `FontBackend` metrics.
#[derive(Clone, Debug)]
pub struct EgTextMeasurer<B = MonoFontBackend> {
    backend: B,
}

impl EgTextMeasurer<MonoFontBackend> {
    /// Create a default measurer using the mono backend.
    pub fn new() -> Self {
        Self {
            backend: MonoFontBackend,
        }
    }

    /// Create a shared measurer trait object for layout engine wiring.
    pub fn shared() -> Arc<dyn TextMeasurer> {
        Arc::new(Self::new())
    }
}

impl Default for EgTextMeasurer<MonoFontBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> EgTextMeasurer<B>
where
    B: FontBackend,
{
    /// Create a measurer using an explicit backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }
}

/// Attach backend-consistent text measurement to a layout engine.
///
/// Wrapping decisions then use the same advances the rasterizer draws with.
pub fn with_embedded_text_measurer(engine: LayoutEngine) -> LayoutEngine {
    engine.with_text_measurer(EgTextMeasurer::shared())
}

impl<B> TextMeasurer for EgTextMeasurer<B>
where
    B: FontBackend + Send + Sync,
{
    fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32 {
        let selection = self.backend.resolve_font(font);
        let metrics = self.backend.metrics(selection.font_id);
        let cells: i32 = text.chars().map(|ch| self.backend.glyph_cells(ch)).sum();
        (cells * metrics.char_width * selection.scale as i32) as f32
    }
}

/// Owned RGB page surface with a transparent background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageBitmap {
    width: u32,
    height: u32,
    pixels: Vec<Option<Rgb888>>,
}

impl PageBitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Painted color at `(x, y)`, `None` when transparent or out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels[pixel_offset(self.width, x, y)]
    }

    pub fn painted_pixels(&self) -> usize {
        self.pixels.iter().filter(|px| px.is_some()).count()
    }

    /// Number of pixels painted exactly `color`.
    pub fn count_color(&self, color: Rgb888) -> usize {
        self.pixels.iter().filter(|px| **px == Some(color)).count()
    }

    /// Smallest rectangle covering every painted pixel.
    pub fn painted_bounds(&self) -> Option<Rectangle> {
        let mut min = Point::new(i32::MAX, i32::MAX);
        let mut max = Point::new(i32::MIN, i32::MIN);
        for (idx, px) in self.pixels.iter().enumerate() {
            if px.is_none() {
                continue;
            }
            let x = (idx as u32 % self.width) as i32;
            let y = (idx as u32 / self.width) as i32;
            min = Point::new(min.x.min(x), min.y.min(y));
            max = Point::new(max.x.max(x), max.y.max(y));
        }
        (min.x <= max.x).then(|| Rectangle::with_corners(min, max))
    }

    /// Row-major RGBA8 bytes; unpainted pixels are fully transparent.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for px in &self.pixels {
            match px {
                Some(color) => out.extend_from_slice(&[color.r(), color.g(), color.b(), 0xFF]),
                None => out.extend_from_slice(&[0, 0, 0, 0]),
            }
        }
        out
    }
}

fn pixel_offset(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

impl OriginDimensions for PageBitmap {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PageBitmap {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x >= self.width || y >= self.height {
                continue;
            }
            self.pixels[pixel_offset(self.width, x, y)] = Some(color);
        }
        Ok(())
    }
}

/// Counters gathered while rasterizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EgRasterDiagnostics {
    pub pages: usize,
    pub text_runs: usize,
    pub decorations: usize,
    /// Runs drawn with a face other than the requested family.
    pub font_fallbacks: usize,
    /// Code points drawn as outlined boxes.
    pub boxed_glyphs: usize,
}

/// Page rasterizer painting runs onto any `Rgb888` draw target.
#[derive(Clone, Debug, Default)]
pub struct EgRasterizer<B = MonoFontBackend> {
    backend: B,
    diagnostics: EgRasterDiagnostics,
}

impl EgRasterizer<MonoFontBackend> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B> EgRasterizer<B>
where
    B: FontBackend,
{
    /// Create a rasterizer using an explicit font backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            diagnostics: EgRasterDiagnostics::default(),
        }
    }

    pub fn diagnostics(&self) -> EgRasterDiagnostics {
        self.diagnostics
    }

    /// Draw one run: stroke outline first when enabled, then the fill.
    pub fn draw_run_to<D>(
        &mut self,
        display: &mut D,
        run: &TextRunCommand,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let style = &run.style;
        let selection = self.backend.resolve_font(&style.font);
        if let Some(reason) = selection.fallback_reason {
            self.diagnostics.font_fallbacks += 1;
            log::debug!(
                "font fallback for '{}' at {}px: {:?}",
                style.font.family,
                style.font.size_px,
                reason
            );
        }
        self.diagnostics.boxed_glyphs += run.text.chars().filter(|ch| !ch.is_ascii()).count();

        let origin = Point::new(run.x.round() as i32, run.baseline_y.round() as i32);
        if style.stroke_width > 0.0 {
            let radius = ((style.stroke_width / 2.0).ceil() as i32).max(1);
            let stroke = to_rgb888(style.stroke);
            for dy in [-radius, 0, radius] {
                for dx in [-radius, 0, radius] {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    self.backend.draw_text_run(
                        display,
                        selection,
                        &run.text,
                        origin + Point::new(dx, dy),
                        stroke,
                    )?;
                }
            }
        }
        self.backend
            .draw_text_run(display, selection, &run.text, origin, to_rgb888(style.fill))?;
        self.diagnostics.text_runs += 1;
        Ok(())
    }

    /// Draw a strikethrough or underline line.
    pub fn draw_decoration_to<D>(
        &mut self,
        display: &mut D,
        line: &DecorationCommand,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        if line.length <= 0.0 {
            return Ok(());
        }
        let start_x = line.x.round() as i32;
        let end_x = ((line.x + line.length).round() as i32 - 1).max(start_x);
        let y = line.y.round() as i32;
        let width = line.thickness.round().max(1.0) as u32;
        Line::new(Point::new(start_x, y), Point::new(end_x, y))
            .into_styled(PrimitiveStyle::with_stroke(to_rgb888(line.color), width))
            .draw(display)?;
        self.diagnostics.decorations += 1;
        Ok(())
    }
}

impl<B> PageRasterizer for EgRasterizer<B>
where
    B: FontBackend,
{
    type Surface = PageBitmap;

    fn begin_page(&mut self, width: u32, height: u32, _style: &TextStyle) -> PageBitmap {
        self.diagnostics.pages += 1;
        PageBitmap::new(width, height)
    }

    fn draw_run(&mut self, surface: &mut PageBitmap, run: &TextRunCommand) {
        match self.draw_run_to(surface, run) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    fn draw_decoration(&mut self, surface: &mut PageBitmap, line: &DecorationCommand) {
        match self.draw_decoration_to(surface, line) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

/// Convert a markup color into the rasterizer's pixel color.
pub fn to_rgb888(color: Color) -> Rgb888 {
    Rgb888::new(color.r, color.g, color.b)
}
