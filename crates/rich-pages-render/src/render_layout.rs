use std::sync::{Arc, Mutex};

use rich_pages::{Document, DocumentConfig, FontSpec, MarkupError, StyleState, TokenKind};

use crate::assembly::PageAssembler;
use crate::assets::{AssetResolver, ResourceHandle};
use crate::raster::{glyph_baseline_y, CommandRecorder, PageRasterizer};
use crate::render_ir::{
    CommandList, DecorationCommand, OverlayElement, OverlayKind, PlacedPage, TextRunCommand,
};

/// Text measurement hook for shaping-accurate line breaking.
pub trait TextMeasurer: Send + Sync {
    /// Measure rendered text width for the provided font.
    fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32;

    /// Advance of a single code point.
    ///
    /// Default delegates to `measure_text_px`.
    fn measure_char_px(&self, ch: char, font: &FontSpec) -> f32 {
        let mut buf = [0u8; 4];
        self.measure_text_px(ch.encode_utf8(&mut buf), font)
    }
}

/// Deterministic measurer: narrow advance for ASCII, wide advance otherwise.
///
/// Used when no measurer is installed, and by headless callers that need
/// reproducible layouts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedAdvanceMeasurer {
    /// Advance of ASCII code points, in em.
    pub narrow_em: f32,
    /// Advance of every other code point, in em.
    pub wide_em: f32,
}

impl Default for FixedAdvanceMeasurer {
    fn default() -> Self {
        Self {
            narrow_em: 0.5,
            wide_em: 1.0,
        }
    }
}

impl FixedAdvanceMeasurer {
    fn char_em(&self, ch: char) -> f32 {
        if ch.is_ascii() {
            self.narrow_em
        } else {
            self.wide_em
        }
    }
}

impl TextMeasurer for FixedAdvanceMeasurer {
    fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32 {
        text.chars().map(|ch| self.char_em(ch)).sum::<f32>() * font.size_px
    }

    fn measure_char_px(&self, ch: char, font: &FontSpec) -> f32 {
        self.char_em(ch) * font.size_px
    }
}

/// Structured events observed during layout and relayout.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutDiagnostic {
    /// An `\i` or `\p` path had no preloaded resource.
    ResourceNotFound { kind: OverlayKind, path: String },
    /// The scanner dropped a malformed or unknown escape.
    MalformedMarkup(MarkupError),
    /// A page was sealed.
    PageSealed {
        index: usize,
        runs: usize,
        overlays: usize,
    },
    /// Wall time of a full relayout.
    ReflowTimeMs(u32),
}

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(LayoutDiagnostic) + Send + 'static>>>;
type DiagnosticSink = Option<DiagnosticCallback>;

/// Row/page layout engine.
///
/// Scans a [`Document`], character-wraps its text into rows of the viewport
/// width, flows rows into pages of whole rows, and drives a
/// [`PageRasterizer`] as runs are committed.
#[derive(Clone, Default)]
pub struct LayoutEngine {
    text_measurer: Option<Arc<dyn TextMeasurer>>,
    asset_resolver: Option<Arc<dyn AssetResolver>>,
    diagnostic_sink: DiagnosticSink,
}

impl core::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("has_text_measurer", &self.text_measurer.is_some())
            .field("has_asset_resolver", &self.asset_resolver.is_some())
            .field("has_diagnostic_sink", &self.diagnostic_sink.is_some())
            .finish()
    }
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a text measurer.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    /// Install an asset resolver. Without one every `\i`/`\p` is a miss.
    pub fn with_asset_resolver(mut self, resolver: Arc<dyn AssetResolver>) -> Self {
        self.asset_resolver = Some(resolver);
        self
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(LayoutDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    pub(crate) fn emit_diagnostic(&self, diagnostic: LayoutDiagnostic) {
        let Some(sink) = &self.diagnostic_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(diagnostic);
        }
    }

    fn measure_char(&self, ch: char, font: &FontSpec) -> f32 {
        self.text_measurer
            .as_ref()
            .map(|m| m.measure_char_px(ch, font))
            .unwrap_or_else(|| FixedAdvanceMeasurer::default().measure_char_px(ch, font))
    }

    fn resolve(&self, kind: OverlayKind, path: &str) -> Option<ResourceHandle> {
        let resolver = self.asset_resolver.as_ref()?;
        match kind {
            OverlayKind::Image => resolver.resolve_image(path).map(ResourceHandle::Image),
            OverlayKind::Object => resolver.resolve_object(path).map(ResourceHandle::Object),
        }
    }

    /// Lay out `document` and collect every sealed page.
    pub fn layout<R: PageRasterizer>(
        &self,
        document: &Document,
        rasterizer: &mut R,
    ) -> Vec<PlacedPage<R::Surface>> {
        let mut pages = Vec::new();
        self.layout_with(document, rasterizer, |page| pages.push(page));
        pages
    }

    /// Lay out `document` into recorded command pages.
    pub fn layout_commands(&self, document: &Document) -> Vec<PlacedPage<CommandList>> {
        self.layout(document, &mut CommandRecorder::new())
    }

    /// Lay out `document`, handing each page to `on_page` as soon as it is
    /// sealed.
    ///
    /// An invalid document produces no pages.
    pub fn layout_with<R, F>(&self, document: &Document, rasterizer: &mut R, mut on_page: F)
    where
        R: PageRasterizer,
        F: FnMut(PlacedPage<R::Surface>),
    {
        if let Err(err) = document.validate() {
            log::warn!("skipping layout of invalid document: {}", err);
            return;
        }
        let mut state = LayoutState::new(self, document, rasterizer, &mut on_page);
        let mut scanner = document.scan();
        let mut reported = 0usize;
        while let Some(token) = scanner.next() {
            reported = self.report_markup_errors(scanner.errors(), reported);
            state.push_token(&token.kind);
        }
        self.report_markup_errors(scanner.errors(), reported);
        state.finish();
    }

    fn report_markup_errors(&self, errors: &[MarkupError], reported: usize) -> usize {
        for err in errors.iter().skip(reported) {
            self.emit_diagnostic(LayoutDiagnostic::MalformedMarkup(err.clone()));
        }
        errors.len()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Cursor {
    /// Width used on the current row.
    row_width: f32,
    /// Start x of the pending run.
    column_x: f32,
    /// 0-based row within the current page.
    row: usize,
}

struct PageInProgress<S> {
    index: usize,
    surface: S,
    overlays: Vec<OverlayElement>,
    runs: usize,
}

struct LayoutState<'a, R: PageRasterizer> {
    engine: &'a LayoutEngine,
    config: &'a DocumentConfig,
    rasterizer: &'a mut R,
    on_page: &'a mut dyn FnMut(PlacedPage<R::Surface>),
    assembler: PageAssembler,
    style: StyleState,
    viewport_width: f32,
    row_height: f32,
    rows_per_page: usize,
    cursor: Cursor,
    run: String,
    page: PageInProgress<R::Surface>,
}

impl<'a, R: PageRasterizer> LayoutState<'a, R> {
    fn new(
        engine: &'a LayoutEngine,
        document: &'a Document,
        rasterizer: &'a mut R,
        on_page: &'a mut dyn FnMut(PlacedPage<R::Surface>),
    ) -> Self {
        let config = document.config();
        let viewport = document.viewport();
        let row_height = config.row_height();
        let page_height = viewport.page_height(row_height);
        let rows_per_page = ((page_height / row_height).round() as usize).max(1);
        let style = StyleState::new(config);
        let surface = rasterizer.begin_page(
            viewport.width.ceil() as u32,
            page_height.ceil() as u32,
            &style.snapshot(),
        );
        Self {
            engine,
            config,
            rasterizer,
            on_page,
            assembler: PageAssembler::new(viewport, page_height),
            style,
            viewport_width: viewport.width,
            row_height,
            rows_per_page,
            cursor: Cursor::default(),
            run: String::new(),
            page: PageInProgress {
                index: 0,
                surface,
                overlays: Vec::new(),
                runs: 0,
            },
        }
    }

    fn row_bottom(&self) -> f32 {
        (self.cursor.row + 1) as f32 * self.row_height
    }

    fn push_token(&mut self, kind: &TokenKind<'_>) {
        if kind.is_style_directive() {
            self.flush_run();
            self.style.apply_token(kind, self.config);
            return;
        }
        match kind {
            TokenKind::Literal(text) => self.push_literal(text),
            TokenKind::Newline => {
                self.flush_run();
                self.break_row();
            }
            TokenKind::Tab => self.push_tab(),
            TokenKind::InsertImage(path) => self.push_overlay(OverlayKind::Image, path),
            TokenKind::InsertObject(path) => self.push_overlay(OverlayKind::Object, path),
            _ => {}
        }
    }

    fn fits(&self, width: f32) -> bool {
        self.cursor.row_width <= 0.0 || self.cursor.row_width + width <= self.viewport_width
    }

    fn push_literal(&mut self, text: &str) {
        let font = self.style.font_spec();
        for ch in text.chars() {
            let advance = self.engine.measure_char(ch, &font);
            if !self.fits(advance) {
                self.flush_run();
                self.break_row();
            }
            self.run.push(ch);
            self.cursor.row_width += advance;
        }
    }

    fn push_tab(&mut self) {
        self.flush_run();
        let cell = self.style.font_size();
        if !self.fits(cell) {
            self.break_row();
        }
        self.advance(cell);
    }

    fn push_overlay(&mut self, kind: OverlayKind, path: &str) {
        self.flush_run();
        let Some(resource) = self.engine.resolve(kind, path) else {
            log::error!("failed to resolve {} '{}'", kind, path);
            self.engine
                .emit_diagnostic(LayoutDiagnostic::ResourceNotFound {
                    kind,
                    path: path.to_string(),
                });
            self.page.overlays.push(OverlayElement {
                kind,
                path: path.to_string(),
                resource: None,
                x: self.cursor.row_width,
                row_bottom: self.row_bottom(),
                width: 0.0,
                height: 0.0,
                scale: 1.0,
            });
            return;
        };

        let (native_w, native_h) = resource.native_size();
        let mut scale = if native_h > 0.0 {
            self.row_height / native_h
        } else {
            1.0
        };
        if native_w > 0.0 && native_w * scale > self.viewport_width {
            scale = self.viewport_width / native_w;
        }
        let width = native_w * scale;
        let height = native_h * scale;
        if !self.fits(width) {
            self.break_row();
        }
        self.page.overlays.push(OverlayElement {
            kind,
            path: path.to_string(),
            resource: Some(resource),
            x: self.cursor.row_width,
            row_bottom: self.row_bottom(),
            width,
            height,
            scale,
        });
        self.advance(width);
    }

    /// Advance past a non-text cell.
    fn advance(&mut self, width: f32) {
        self.cursor.row_width += width;
        self.cursor.column_x = self.cursor.row_width;
    }

    /// Draw the pending run with the current style.
    fn flush_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let style = self.style.snapshot();
        let run = TextRunCommand {
            x: self.cursor.column_x,
            baseline_y: glyph_baseline_y(
                self.row_bottom(),
                style.font.size_px,
                self.config.row_spacing,
            ),
            width: self.cursor.row_width - self.cursor.column_x,
            text: core::mem::take(&mut self.run),
            style,
        };
        self.rasterizer.draw_run(&mut self.page.surface, &run);
        if let Some(line) = DecorationCommand::for_run(&run) {
            self.rasterizer
                .draw_decoration(&mut self.page.surface, &line);
        }
        self.page.runs += 1;
        self.cursor.column_x = self.cursor.row_width;
    }

    /// Start a new row, sealing the page when the row would not fit.
    fn break_row(&mut self) {
        if self.cursor.row + 1 >= self.rows_per_page {
            self.seal_page();
            self.cursor.row = 0;
        } else {
            self.cursor.row += 1;
        }
        self.cursor.row_width = 0.0;
        self.cursor.column_x = 0.0;
    }

    fn seal_page(&mut self) {
        let next = PageInProgress {
            index: self.page.index + 1,
            surface: self.rasterizer.begin_page(
                self.viewport_width.ceil() as u32,
                self.assembler.page_height().ceil() as u32,
                &self.style.snapshot(),
            ),
            overlays: Vec::new(),
            runs: 0,
        };
        let sealed = core::mem::replace(&mut self.page, next);
        emit_page(self.engine, &self.assembler, &mut *self.on_page, sealed);
    }

    /// Flush pending text and seal the last page unless it is empty.
    fn finish(mut self) {
        self.flush_run();
        if self.page.runs == 0 && self.page.overlays.is_empty() {
            return;
        }
        let LayoutState {
            engine,
            assembler,
            on_page,
            page,
            ..
        } = self;
        emit_page(engine, &assembler, on_page, page);
    }
}

fn emit_page<S>(
    engine: &LayoutEngine,
    assembler: &PageAssembler,
    on_page: &mut dyn FnMut(PlacedPage<S>),
    page: PageInProgress<S>,
) {
    log::debug!(
        "sealed page {} with {} runs and {} overlays",
        page.index,
        page.runs,
        page.overlays.len()
    );
    engine.emit_diagnostic(LayoutDiagnostic::PageSealed {
        index: page.index,
        runs: page.runs,
        overlays: page.overlays.len(),
    });
    on_page(assembler.seal_page(page.index, page.surface, page.overlays));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetCache;
    use rich_pages::{Decoration, Viewport};

    fn doc(markup: &str, width: f32, height: f32) -> Document {
        Document::new(
            markup,
            DocumentConfig::default(),
            Viewport::new(width, height),
        )
    }

    fn collecting_engine() -> (LayoutEngine, Arc<Mutex<Vec<LayoutDiagnostic>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut engine = LayoutEngine::new();
        engine.set_diagnostic_sink(move |diag| sink.lock().expect("sink").push(diag));
        (engine, seen)
    }

    fn rows_of(page: &PlacedPage<CommandList>) -> Vec<(f32, String)> {
        page.surface
            .text_runs()
            .map(|run| (run.baseline_y, run.text.clone()))
            .collect()
    }

    #[test]
    fn wide_glyphs_wrap_at_viewport_width() {
        let pages = LayoutEngine::new().layout_commands(&doc("江苏省", 100.0, 240.0));
        assert_eq!(pages.len(), 1);
        let rows = rows_of(&pages[0]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, "江苏");
        assert_eq!(rows[1].1, "省");
        assert_eq!(rows[1].0 - rows[0].0, 60.0);
        let first = pages[0].surface.text_runs().next().expect("first run");
        assert_eq!(first.width, 100.0);
    }

    #[test]
    fn oversized_glyph_sits_alone_on_its_row() {
        let pages = LayoutEngine::new().layout_commands(&doc("江苏", 30.0, 240.0));
        let rows = rows_of(&pages[0]);
        assert_eq!(rows.len(), 2);
        assert!(pages[0].surface.text_runs().all(|run| run.x == 0.0));
    }

    #[test]
    fn rows_flow_into_new_pages() {
        let pages = LayoutEngine::new().layout_commands(&doc("a\nb\nc", 100.0, 150.0));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].height, 120.0);
        assert_eq!(pages[0].surface.plain_text(), "ab");
        assert_eq!(pages[1].surface.plain_text(), "c");
        assert_eq!(pages[1].y - pages[0].y, 120.0);
        assert_eq!(pages[1].index, 1);
    }

    #[test]
    fn viewport_shorter_than_a_row_still_holds_one_row_per_page() {
        let pages = LayoutEngine::new().layout_commands(&doc("a\nb", 100.0, 30.0));
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|page| page.height == 60.0));
        assert_eq!(pages[0].surface.plain_text(), "a");
        assert_eq!(pages[1].surface.plain_text(), "b");
        assert_eq!(pages[1].y - pages[0].y, 60.0);
    }

    #[test]
    fn trailing_empty_page_is_discarded() {
        let pages = LayoutEngine::new().layout_commands(&doc("a\n\n", 100.0, 120.0));
        assert_eq!(pages.len(), 1);
        assert!(LayoutEngine::new()
            .layout_commands(&doc("", 100.0, 120.0))
            .is_empty());
    }

    #[test]
    fn intermediate_blank_pages_are_kept() {
        let pages = LayoutEngine::new().layout_commands(&doc("\n\n\n\nz", 100.0, 120.0));
        assert_eq!(pages.len(), 3);
        assert!(pages[0].surface.commands.is_empty());
        assert_eq!(pages[2].surface.plain_text(), "z");
    }

    #[test]
    fn tab_reserves_one_font_size_cell() {
        let pages = LayoutEngine::new().layout_commands(&doc("\ta", 200.0, 120.0));
        let run = pages[0].surface.text_runs().next().expect("run");
        assert_eq!(run.x, 50.0);
        assert_eq!(run.text, "a");
    }

    #[test]
    fn overflowing_tab_wraps_before_reserving_its_cell() {
        let pages = LayoutEngine::new().layout_commands(&doc("江\t\t苏", 120.0, 240.0));
        let runs: Vec<_> = pages[0].surface.text_runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].text.as_str(), runs[0].x), ("江", 0.0));
        assert_eq!(runs[0].baseline_y, 47.5);
        assert_eq!((runs[1].text.as_str(), runs[1].x), ("苏", 50.0));
        assert_eq!(runs[1].baseline_y, 107.5);
    }

    #[test]
    fn oversized_tab_takes_a_row_of_its_own() {
        let pages = LayoutEngine::new().layout_commands(&doc("a\tb", 30.0, 240.0));
        let runs: Vec<_> = pages[0].surface.text_runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].text.as_str(), runs[0].baseline_y), ("a", 47.5));
        assert_eq!((runs[1].text.as_str(), runs[1].x), ("b", 0.0));
        assert_eq!(runs[1].baseline_y - runs[0].baseline_y, 120.0);
    }

    #[test]
    fn style_change_splits_runs_on_one_row() {
        let pages = LayoutEngine::new().layout_commands(&doc("ab\\ucd", 400.0, 120.0));
        let runs: Vec<_> = pages[0].surface.text_runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].x, 50.0);
        assert_eq!(runs[1].style.decoration, Decoration::Underline);
        let line = pages[0].surface.decorations().next().expect("underline");
        assert_eq!((line.x, line.length), (50.0, 50.0));
    }

    #[test]
    fn unresolved_image_reports_once_and_leaves_placeholder() {
        let (engine, seen) = collecting_engine();
        let pages = engine.layout_commands(&doc("ab\\iGame/Coin\\icd", 400.0, 120.0));
        let misses: Vec<_> = seen
            .lock()
            .expect("diagnostics")
            .iter()
            .filter(|d| matches!(d, LayoutDiagnostic::ResourceNotFound { .. }))
            .cloned()
            .collect();
        assert_eq!(
            misses,
            vec![LayoutDiagnostic::ResourceNotFound {
                kind: OverlayKind::Image,
                path: "Game/Coin".to_string(),
            }]
        );
        let overlay = &pages[0].overlays[0];
        assert!(overlay.element.is_placeholder());
        assert_eq!((overlay.element.width, overlay.element.height), (0.0, 0.0));
        assert_eq!(pages[0].surface.plain_text(), "abcd");
        let second = pages[0].surface.text_runs().nth(1).expect("second run");
        assert_eq!(second.x, 50.0);
    }

    #[test]
    fn resolved_image_scales_to_row_height_and_caps_width() {
        let mut cache = AssetCache::new();
        cache
            .insert_atlas_frame("Game/Coin", 30.0, 30.0)
            .expect("coin");
        cache
            .insert_atlas_frame("Game/Banner", 120.0, 30.0)
            .expect("banner");
        let engine = LayoutEngine::new().with_asset_resolver(Arc::new(cache));
        let pages = engine.layout_commands(&doc("\\iGame/Coin\\i\\iGame/Banner\\i", 200.0, 240.0));
        let overlays = &pages[0].overlays;
        assert_eq!(overlays.len(), 2);
        let coin = &overlays[0].element;
        assert_eq!((coin.width, coin.height, coin.scale), (60.0, 60.0, 2.0));
        let banner = &overlays[1].element;
        assert!((banner.width - 200.0).abs() < 1e-3);
        assert_eq!(banner.x, 0.0);
        assert_eq!(banner.row_bottom, 120.0);
    }

    #[test]
    fn malformed_markup_is_reported_not_fatal() {
        let (engine, seen) = collecting_engine();
        let pages = engine.layout_commands(&doc("x\\fKaiTi", 400.0, 120.0));
        assert_eq!(pages.len(), 1);
        assert!(seen
            .lock()
            .expect("diagnostics")
            .iter()
            .any(|d| matches!(d, LayoutDiagnostic::MalformedMarkup(_))));
    }

    #[test]
    fn invalid_document_yields_no_pages() {
        let bad = Document::new(
            "abc",
            DocumentConfig::default().with_font_size(1.0),
            Viewport::new(100.0, 100.0),
        );
        assert!(LayoutEngine::new().layout_commands(&bad).is_empty());
    }

    #[test]
    fn custom_measurer_drives_wrapping() {
        struct Mono;
        impl TextMeasurer for Mono {
            fn measure_text_px(&self, text: &str, font: &FontSpec) -> f32 {
                text.chars().count() as f32 * font.size_px * 0.6
            }
        }
        let engine = LayoutEngine::new().with_text_measurer(Arc::new(Mono));
        let pages = engine.layout_commands(&doc("abcd", 100.0, 240.0));
        assert_eq!(pages[0].surface.text_runs().count(), 2);
    }
}
