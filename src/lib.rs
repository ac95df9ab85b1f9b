//! Inline escape-sequence markup for paged rich text.
//!
//! This crate owns the input side of the pipeline: the [`markup`] scanner
//! that turns a string such as `"江\b苏\0省"` into tokens, the [`StyleState`]
//! those tokens mutate, and the [`Document`] configuration a layout pass
//! reads. Row/page layout and rasterization live in `rich-pages-render`.

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

pub mod document;
pub mod error;
pub mod markup;
pub mod style;

pub use document::{Document, DocumentConfig, Viewport, MIN_FONT_SIZE_PX};
pub use error::{ConfigError, MarkupError};
pub use markup::{
    scan, DirectiveKind, Scanner, Span, Token, TokenKind, COLOR_MAX_LENGTH, FONT_MAX_LENGTH,
    IMAGE_MAX_LENGTH, OBJECT_MAX_LENGTH,
};
pub use style::{Color, Decoration, FontSpec, StyleState, TextStyle};
