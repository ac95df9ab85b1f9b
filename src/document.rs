//! Document model: markup text plus the base configuration of one layout pass.

use std::sync::Arc;

use crate::error::ConfigError;
use crate::markup::{scan, Scanner};
use crate::style::Color;

/// Smallest accepted base font size in pixels.
pub const MIN_FONT_SIZE_PX: f32 = 4.0;

/// Base formatting values restored by the `\0` directive.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DocumentConfig {
    /// Base font family.
    pub font_family: Arc<str>,
    /// Font size in pixels; also the tab cell width.
    pub font_size: f32,
    /// Base fill color.
    pub color: Color,
    /// Outline width; zero disables stroking.
    pub stroke_width: f32,
    /// Outline and decoration color.
    pub stroke_color: Color,
    /// Extra vertical space per row.
    pub row_spacing: f32,
}

impl DocumentConfig {
    /// Height of one row: font size plus row spacing.
    pub fn row_height(&self) -> f32 {
        self.font_size + self.row_spacing
    }

    pub fn with_font_family(mut self, family: impl Into<Arc<str>>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn with_font_size(mut self, size_px: f32) -> Self {
        self.font_size = size_px;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_stroke(mut self, width: f32, color: Color) -> Self {
        self.stroke_width = width;
        self.stroke_color = color;
        self
    }

    pub fn with_row_spacing(mut self, spacing: f32) -> Self {
        self.row_spacing = spacing;
        self
    }

    /// Check values that would make layout meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.font_family.trim().is_empty() {
            return Err(ConfigError::EmptyFontFamily);
        }
        if !self.font_size.is_finite() || self.font_size < MIN_FONT_SIZE_PX {
            return Err(ConfigError::FontSizeTooSmall {
                size_px: self.font_size,
                min_px: MIN_FONT_SIZE_PX,
            });
        }
        if !self.row_spacing.is_finite() || self.row_spacing < 0.0 {
            return Err(ConfigError::InvalidRowSpacing(self.row_spacing));
        }
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(ConfigError::InvalidStrokeWidth(self.stroke_width));
        }
        Ok(())
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            font_family: Arc::from("Arial"),
            font_size: 50.0,
            color: Color::WHITE,
            stroke_width: 0.0,
            stroke_color: Color::BLACK,
            row_spacing: 10.0,
        }
    }
}

/// Size and anchor of the hosting viewport.
///
/// Anchors use a y-down convention: `(0, 0)` is the top-left corner and
/// `(0.5, 0.5)` the center.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
}

impl Viewport {
    /// Viewport of the given size anchored at its center.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_anchor(mut self, anchor_x: f32, anchor_y: f32) -> Self {
        self.anchor_x = anchor_x;
        self.anchor_y = anchor_y;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_dim = |v: f32| v.is_finite() && v > 0.0;
        if !valid_dim(self.width) || !valid_dim(self.height) {
            return Err(ConfigError::InvalidViewport {
                width: self.width,
                height: self.height,
            });
        }
        let valid_anchor = |v: f32| (0.0..=1.0).contains(&v);
        if !valid_anchor(self.anchor_x) || !valid_anchor(self.anchor_y) {
            return Err(ConfigError::InvalidAnchor {
                x: self.anchor_x,
                y: self.anchor_y,
            });
        }
        Ok(())
    }

    /// Height available to pages: the viewport height rounded down to whole
    /// rows, never less than one row.
    pub fn page_height(&self, row_height: f32) -> f32 {
        if row_height <= 0.0 {
            return self.height;
        }
        let rows = (self.height / row_height).floor().max(1.0);
        rows * row_height
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 480.0,
            height: 800.0,
            anchor_x: 0.5,
            anchor_y: 0.5,
        }
    }
}

/// Markup text plus the configuration it is laid out with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    markup: String,
    config: DocumentConfig,
    viewport: Viewport,
}

impl Document {
    pub fn new(markup: impl Into<String>, config: DocumentConfig, viewport: Viewport) -> Self {
        Self {
            markup: markup.into(),
            config,
            viewport,
        }
    }

    /// Document with default configuration and viewport.
    pub fn from_markup(markup: impl Into<String>) -> Self {
        Self::new(markup, DocumentConfig::default(), Viewport::default())
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_markup(&mut self, markup: impl Into<String>) {
        self.markup = markup.into();
    }

    pub fn config_mut(&mut self) -> &mut DocumentConfig {
        &mut self.config
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Validate both the base configuration and the viewport.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        self.viewport.validate()
    }

    /// Start a fresh scan of the markup.
    pub fn scan(&self) -> Scanner<'_> {
        scan(&self.markup)
    }
}
