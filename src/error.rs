//! Error types for markup scanning and document configuration.

use core::fmt;

use crate::markup::{DirectiveKind, Span};

/// Recoverable problem found while scanning markup.
///
/// None of these abort a layout pass: the offending escape is dropped and
/// scanning continues after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupError {
    /// Paired directive whose closing escape was not found inside the lookahead
    /// window, or whose payload was empty.
    MalformedDirective {
        /// Directive that failed.
        kind: DirectiveKind,
        /// Byte span of the dropped `\` + letter.
        span: Span,
    },
    /// `\c` payload that is not exactly 3 or 6 hex digits.
    InvalidColorPayload {
        /// Raw payload between the markers.
        payload: String,
        /// Byte span covering the whole directive.
        span: Span,
    },
    /// `\` followed by a character that names no directive.
    UnknownEscape {
        /// Character following the backslash.
        found: char,
        /// Byte span of the dropped escape.
        span: Span,
    },
}

impl MarkupError {
    /// Source span of the problem.
    pub fn span(&self) -> Span {
        match self {
            Self::MalformedDirective { span, .. }
            | Self::InvalidColorPayload { span, .. }
            | Self::UnknownEscape { span, .. } => *span,
        }
    }

    /// Whether this error is one of the malformed-directive family.
    ///
    /// Color payload errors are reported separately but recovered exactly like
    /// an unterminated directive.
    pub fn is_malformed_directive(&self) -> bool {
        matches!(
            self,
            Self::MalformedDirective { .. } | Self::InvalidColorPayload { .. }
        )
    }
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let span = self.span();
        match self {
            Self::MalformedDirective { kind, .. } => write!(
                f,
                "malformed \\{} directive at {}..{}",
                kind.escape_char(),
                span.start,
                span.end
            ),
            Self::InvalidColorPayload { payload, .. } => write!(
                f,
                "invalid color payload '{}' at {}..{} (expected 3 or 6 hex digits)",
                payload, span.start, span.end
            ),
            Self::UnknownEscape { found, .. } => write!(
                f,
                "unknown escape '\\{}' at {}..{}",
                found, span.start, span.end
            ),
        }
    }
}

impl std::error::Error for MarkupError {}

/// Invalid document or viewport configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Font size below the supported minimum.
    FontSizeTooSmall { size_px: f32, min_px: f32 },
    /// Negative or non-finite row spacing.
    InvalidRowSpacing(f32),
    /// Negative or non-finite stroke width.
    InvalidStrokeWidth(f32),
    /// Empty base font family.
    EmptyFontFamily,
    /// Viewport dimension that is zero, negative, or non-finite.
    InvalidViewport { width: f32, height: f32 },
    /// Anchor component outside `[0.0, 1.0]`.
    InvalidAnchor { x: f32, y: f32 },
    /// Hex color string that could not be parsed.
    InvalidColor(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FontSizeTooSmall { size_px, min_px } => {
                write!(f, "font size {} is below minimum {}", size_px, min_px)
            }
            Self::InvalidRowSpacing(value) => write!(f, "invalid row spacing {}", value),
            Self::InvalidStrokeWidth(value) => write!(f, "invalid stroke width {}", value),
            Self::EmptyFontFamily => write!(f, "base font family must not be empty"),
            Self::InvalidViewport { width, height } => {
                write!(f, "invalid viewport size {}x{}", width, height)
            }
            Self::InvalidAnchor { x, y } => {
                write!(f, "anchor ({}, {}) must lie within [0, 1]", x, y)
            }
            Self::InvalidColor(value) => write!(f, "invalid hex color '{}'", value),
        }
    }
}

impl std::error::Error for ConfigError {}
