//! Row/page layout, render IR, and page assembly for `rich-pages`.

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

mod assembly;
mod assets;
mod raster;
mod render_engine;
mod render_ir;
mod render_layout;

pub use assembly::PageAssembler;
pub use assets::{
    split_atlas_path, AssetCache, AssetError, AssetResolver, ImageHandle, ObjectHandle,
    ResourceHandle, ATLAS_ROOT,
};
pub use raster::{decoration_thickness, glyph_baseline_y, CommandRecorder, PageRasterizer};
pub use render_engine::{RichTextView, RichTextViewConfig, RichTextViewError};
pub use render_ir::{
    pages_from_json, pages_to_json, CommandList, DecorationCommand, DrawCommand, OverlayElement,
    OverlayKind, PlacedOverlay, PlacedPage, TextRunCommand,
};
pub use render_layout::{FixedAdvanceMeasurer, LayoutDiagnostic, LayoutEngine, TextMeasurer};
pub use rich_pages::{Decoration, Document, DocumentConfig, FontSpec, TextStyle, Viewport};
