use rich_pages::{Color, ConfigError, Document, DocumentConfig, Viewport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::raster::PageRasterizer;
use crate::render_ir::PlacedPage;
use crate::render_layout::{LayoutDiagnostic, LayoutEngine};

/// Serializable host configuration: base document style plus viewport.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichTextViewConfig {
    pub document: DocumentConfig,
    pub viewport: Viewport,
}

impl RichTextViewConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, RichTextViewError> {
        let cfg: Self = serde_json::from_str(json).map_err(RichTextViewError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json_string(&self) -> Result<String, RichTextViewError> {
        serde_json::to_string_pretty(self).map_err(RichTextViewError::Parse)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.document.validate()?;
        self.viewport.validate()
    }
}

/// Errors from building a [`RichTextView`] out of external configuration.
#[derive(Debug)]
pub enum RichTextViewError {
    /// JSON could not be parsed or written.
    Parse(serde_json::Error),
    /// Values parsed but failed validation.
    Config(ConfigError),
}

impl fmt::Display for RichTextViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid view config json: {}", err),
            Self::Config(err) => write!(f, "invalid view config: {}", err),
        }
    }
}

impl std::error::Error for RichTextViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

impl From<ConfigError> for RichTextViewError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Relayout host: owns a document and its pages.
///
/// Every property change validates the new value, drops the previous pages
/// and lays the document out again.
pub struct RichTextView<R: PageRasterizer> {
    engine: LayoutEngine,
    rasterizer: R,
    document: Document,
    pages: Vec<PlacedPage<R::Surface>>,
}

impl<R: PageRasterizer> fmt::Debug for RichTextView<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RichTextView")
            .field("engine", &self.engine)
            .field("document", &self.document)
            .field("page_count", &self.pages.len())
            .finish_non_exhaustive()
    }
}

impl<R: PageRasterizer> RichTextView<R> {
    /// Validate `document` and run the first layout.
    pub fn new(
        engine: LayoutEngine,
        rasterizer: R,
        document: Document,
    ) -> Result<Self, ConfigError> {
        document.validate()?;
        let mut view = Self {
            engine,
            rasterizer,
            document,
            pages: Vec::new(),
        };
        view.relayout();
        Ok(view)
    }

    /// Build a view from markup plus a parsed configuration.
    pub fn from_config(
        engine: LayoutEngine,
        rasterizer: R,
        markup: impl Into<String>,
        config: RichTextViewConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(
            engine,
            rasterizer,
            Document::new(markup, config.document, config.viewport),
        )
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn pages(&self) -> &[PlacedPage<R::Surface>] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Consume the view and keep its pages.
    pub fn into_pages(self) -> Vec<PlacedPage<R::Surface>> {
        self.pages
    }

    /// Register or replace the layout diagnostics sink. Takes effect on the
    /// next relayout.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(LayoutDiagnostic) + Send + 'static,
    {
        self.engine.set_diagnostic_sink(sink);
    }

    /// Drop all pages and lay the document out again.
    pub fn relayout(&mut self) {
        self.pages.clear();
        let started = Instant::now();
        let pages = &mut self.pages;
        self.engine
            .layout_with(&self.document, &mut self.rasterizer, |page| pages.push(page));
        let elapsed = started.elapsed().as_millis().min(u32::MAX as u128) as u32;
        log::debug!(
            "relayout produced {} pages in {} ms",
            self.pages.len(),
            elapsed
        );
        self.engine
            .emit_diagnostic(LayoutDiagnostic::ReflowTimeMs(elapsed));
    }

    fn update(&mut self, edit: impl FnOnce(&mut Document)) -> Result<(), ConfigError> {
        let mut candidate = self.document.clone();
        edit(&mut candidate);
        candidate.validate()?;
        self.document = candidate;
        self.relayout();
        Ok(())
    }

    pub fn set_text(&mut self, markup: impl Into<String>) {
        self.document.set_markup(markup);
        self.relayout();
    }

    pub fn set_color(&mut self, color: Color) {
        self.document.config_mut().color = color;
        self.relayout();
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.document.config_mut().stroke_color = color;
        self.relayout();
    }

    pub fn set_stroke_width(&mut self, width: f32) -> Result<(), ConfigError> {
        self.update(|doc| doc.config_mut().stroke_width = width)
    }

    pub fn set_font_name(&mut self, family: &str) -> Result<(), ConfigError> {
        self.update(|doc| doc.config_mut().font_family = family.into())
    }

    pub fn set_font_size(&mut self, size_px: f32) -> Result<(), ConfigError> {
        self.update(|doc| doc.config_mut().font_size = size_px)
    }

    pub fn set_row_spacing(&mut self, spacing: f32) -> Result<(), ConfigError> {
        self.update(|doc| doc.config_mut().row_spacing = spacing)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), ConfigError> {
        self.update(|doc| doc.set_viewport(viewport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::CommandRecorder;
    use std::sync::{Arc, Mutex};

    fn view(markup: &str) -> RichTextView<CommandRecorder> {
        let doc = Document::new(
            markup,
            DocumentConfig::default(),
            Viewport::new(100.0, 120.0),
        );
        RichTextView::new(LayoutEngine::new(), CommandRecorder::new(), doc).expect("valid view")
    }

    #[test]
    fn setters_relayout_immediately() {
        let mut view = view("江苏");
        assert_eq!(view.page_count(), 1);
        view.set_text("江苏省四川省");
        assert_eq!(view.page_count(), 2);
        view.set_font_size(20.0).expect("font size");
        assert_eq!(view.page_count(), 1);
        view.set_color(Color::rgb(255, 0, 0));
        let run = view.pages()[0]
            .surface
            .text_runs()
            .next()
            .expect("run");
        assert_eq!(run.style.fill, Color::rgb(255, 0, 0));
        assert_eq!(run.style.font.size_px, 20.0);
    }

    #[test]
    fn rejected_setter_keeps_previous_layout() {
        let mut view = view("江苏");
        assert_eq!(
            view.set_font_size(2.0),
            Err(ConfigError::FontSizeTooSmall {
                size_px: 2.0,
                min_px: rich_pages::MIN_FONT_SIZE_PX,
            })
        );
        assert!(view.set_row_spacing(-3.0).is_err());
        assert!(view.set_viewport(Viewport::new(0.0, 10.0)).is_err());
        assert!(view.set_font_name("  ").is_err());
        assert_eq!(view.document().config().font_size, 50.0);
        assert_eq!(view.page_count(), 1);
    }

    #[test]
    fn into_pages_keeps_the_latest_layout() {
        let mut view = view("江苏");
        view.set_text("江苏省四川省");
        let pages = view.into_pages();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].surface.plain_text(), "江苏省四");
        assert_eq!(pages[1].surface.plain_text(), "川省");
    }

    #[test]
    fn relayout_reports_reflow_time() {
        let mut view = view("abc");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        view.set_diagnostic_sink(move |diag| sink.lock().expect("sink").push(diag));
        view.set_stroke_width(2.0).expect("stroke");
        let seen = seen.lock().expect("diagnostics");
        assert!(matches!(seen.last(), Some(LayoutDiagnostic::ReflowTimeMs(_))));
    }

    #[test]
    fn config_loads_from_partial_json() {
        let cfg = RichTextViewConfig::from_json_str(
            r#"{"document":{"font_size":24.0,"row_spacing":4.0},"viewport":{"width":300.0,"height":200.0}}"#,
        )
        .expect("config");
        assert_eq!(cfg.document.font_size, 24.0);
        assert_eq!(&*cfg.document.font_family, "Arial");
        assert_eq!(cfg.viewport.anchor_x, 0.5);

        let view = RichTextView::from_config(
            LayoutEngine::new(),
            CommandRecorder::new(),
            "hi",
            cfg.clone(),
        )
        .expect("view");
        assert_eq!(view.pages()[0].height, 196.0);

        let json = cfg.to_json_string().expect("write config");
        assert_eq!(RichTextViewConfig::from_json_str(&json).expect("reparse"), cfg);
    }

    #[test]
    fn config_rejects_invalid_values() {
        let err = RichTextViewConfig::from_json_str(r#"{"document":{"font_size":1.0}}"#)
            .expect_err("tiny font");
        assert!(matches!(err, RichTextViewError::Config(_)));
        let err = RichTextViewConfig::from_json_str("{").expect_err("bad json");
        assert!(matches!(err, RichTextViewError::Parse(_)));
    }
}
