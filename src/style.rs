//! Mutable formatting context driven by markup directives.

use core::fmt;
use std::sync::Arc;

use crate::document::DocumentConfig;
use crate::markup::TokenKind;

/// Opaque 24-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Build a color from channel values.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a short (`f00`) or long (`ff0000`) hex color, with or without `#`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#').unwrap_or(value);
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let r = hex_nibble(bytes[0])?;
                let g = hex_nibble(bytes[1])?;
                let b = hex_nibble(bytes[2])?;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = hex_nibble(bytes[0])? << 4 | hex_nibble(bytes[1])?;
                let g = hex_nibble(bytes[2])? << 4 | hex_nibble(bytes[3])?;
                let b = hex_nibble(bytes[4])? << 4 | hex_nibble(bytes[5])?;
                Some(Self::rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Lowercase six-digit hex form without the leading `#`.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Text decoration. Underline and strikethrough are mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Decoration {
    #[default]
    None,
    Strike,
    Underline,
}

/// Font selection handed to measurement and rasterization.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontSpec {
    /// Family name as written in markup or configuration.
    pub family: Arc<str>,
    /// Size in pixels.
    pub size_px: f32,
    /// Bold weight.
    pub bold: bool,
}

impl FontSpec {
    /// Canvas-style font shorthand, e.g. `bold 50px KaiTi`.
    pub fn to_css_shorthand(&self) -> String {
        if self.bold {
            format!("bold {}px {}", self.size_px, self.family)
        } else {
            format!("{}px {}", self.size_px, self.family)
        }
    }
}

/// Immutable snapshot of the style in effect for one draw call.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextStyle {
    pub font: FontSpec,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
    pub decoration: Decoration,
}

/// The live formatting context of a layout pass.
///
/// Directives mutate it in place; only [`StyleState::apply_restore`] clears
/// previously applied styles.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleState {
    font_family: Arc<str>,
    font_size: f32,
    bold: bool,
    fill: Color,
    stroke: Color,
    stroke_width: f32,
    decoration: Decoration,
}

impl StyleState {
    /// Fresh state carrying the document's base values.
    pub fn new(base: &DocumentConfig) -> Self {
        Self {
            font_family: Arc::clone(&base.font_family),
            font_size: base.font_size,
            bold: false,
            fill: base.color,
            stroke: base.stroke_color,
            stroke_width: base.stroke_width,
            decoration: Decoration::None,
        }
    }

    pub fn apply_bold(&mut self) {
        self.bold = true;
    }

    /// Switch to strikethrough, replacing any underline.
    pub fn apply_strike(&mut self) {
        self.decoration = Decoration::Strike;
    }

    /// Switch to underline, replacing any strikethrough.
    pub fn apply_underline(&mut self) {
        self.decoration = Decoration::Underline;
    }

    pub fn apply_font(&mut self, family: &str) {
        self.font_family = Arc::from(family);
    }

    pub fn apply_color(&mut self, color: Color) {
        self.fill = color;
    }

    /// Reset font, weight, fill and decoration to the base configuration.
    pub fn apply_restore(&mut self, base: &DocumentConfig) {
        *self = Self::new(base);
    }

    /// Apply a style directive token.
    ///
    /// Returns `false` for tokens that do not touch the style.
    pub fn apply_token(&mut self, kind: &TokenKind<'_>, base: &DocumentConfig) -> bool {
        match kind {
            TokenKind::SetBold => self.apply_bold(),
            TokenKind::SetStrike => self.apply_strike(),
            TokenKind::SetUnderline => self.apply_underline(),
            TokenKind::SetFont(family) => self.apply_font(family),
            TokenKind::SetColor(color) => self.apply_color(*color),
            TokenKind::Restore => self.apply_restore(base),
            _ => return false,
        }
        true
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn bold(&self) -> bool {
        self.bold
    }

    pub fn fill(&self) -> Color {
        self.fill
    }

    pub fn stroke(&self) -> Color {
        self.stroke
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    pub fn decoration(&self) -> Decoration {
        self.decoration
    }

    /// Font selection for measurement.
    pub fn font_spec(&self) -> FontSpec {
        FontSpec {
            family: Arc::clone(&self.font_family),
            size_px: self.font_size,
            bold: self.bold,
        }
    }

    /// Canvas-style font shorthand for the current font.
    pub fn font_string(&self) -> String {
        self.font_spec().to_css_shorthand()
    }

    /// Snapshot for a draw call.
    pub fn snapshot(&self) -> TextStyle {
        TextStyle {
            font: self.font_spec(),
            fill: self.fill,
            stroke: self.stroke,
            stroke_width: self.stroke_width,
            decoration: self.decoration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DocumentConfig {
        DocumentConfig::default()
    }

    #[test]
    fn parses_short_and_long_hex_colors() {
        assert_eq!(Color::from_hex("f00"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::from_hex("#00ff80"), Some(Color::rgb(0, 255, 128)));
        assert_eq!(Color::from_hex("ABC"), Some(Color::rgb(0xAA, 0xBB, 0xCC)));
        assert_eq!(Color::from_hex("ff00"), None);
        assert_eq!(Color::from_hex("gg0"), None);
        assert_eq!(Color::rgb(255, 0, 0).to_string(), "#ff0000");
    }

    #[test]
    fn restore_resets_every_directive_style() {
        let cfg = base();
        let mut style = StyleState::new(&cfg);
        style.apply_bold();
        style.apply_font("KaiTi");
        style.apply_color(Color::rgb(255, 0, 0));
        style.apply_underline();
        assert!(style.bold());
        assert_eq!(style.font_family(), "KaiTi");

        style.apply_restore(&cfg);
        assert_eq!(style, StyleState::new(&cfg));
        assert_eq!(style.font_family(), "Arial");
        assert!(!style.bold());
        assert_eq!(style.fill(), Color::WHITE);
        assert_eq!(style.decoration(), Decoration::None);
    }

    #[test]
    fn decorations_are_mutually_exclusive_last_wins() {
        let mut style = StyleState::new(&base());
        style.apply_underline();
        style.apply_strike();
        assert_eq!(style.decoration(), Decoration::Strike);
        style.apply_underline();
        assert_eq!(style.decoration(), Decoration::Underline);
    }

    #[test]
    fn styles_persist_until_restore() {
        let cfg = base();
        let mut style = StyleState::new(&cfg);
        style.apply_bold();
        style.apply_color(Color::rgb(1, 2, 3));
        style.apply_font("SimSun");
        assert!(style.bold());
        assert_eq!(style.fill(), Color::rgb(1, 2, 3));
        assert!(!style.apply_token(&TokenKind::Newline, &cfg));
        assert!(style.bold());
    }

    #[test]
    fn font_string_matches_canvas_shorthand() {
        let mut style = StyleState::new(&base());
        assert_eq!(style.font_string(), "50px Arial");
        style.apply_bold();
        assert_eq!(style.font_string(), "bold 50px Arial");
    }
}
