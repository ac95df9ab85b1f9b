//! Page rasterization seam.
//!
//! Layout drives a [`PageRasterizer`] incrementally: one surface per page,
//! one [`TextRunCommand`] per flushed run, plus a [`DecorationCommand`] when
//! the run's style carries strikethrough or underline.

use rich_pages::{Decoration, TextStyle};

use crate::render_ir::{CommandList, DecorationCommand, DrawCommand, TextRunCommand};

/// Share of the font size the baseline sits above the row bottom.
const DESCENT_RATIO: f32 = 0.15;

/// Backend that paints text runs onto per-page surfaces.
pub trait PageRasterizer {
    /// Drawing surface of one page.
    type Surface;

    /// Create a blank surface for a new page.
    fn begin_page(&mut self, width: u32, height: u32, style: &TextStyle) -> Self::Surface;

    /// Draw one run. Stroke, when present, goes beneath the fill.
    fn draw_run(&mut self, surface: &mut Self::Surface, run: &TextRunCommand);

    /// Draw a strikethrough or underline line.
    fn draw_decoration(&mut self, surface: &mut Self::Surface, line: &DecorationCommand);
}

/// Baseline y for glyphs on a row ending at `row_bottom`.
pub fn glyph_baseline_y(row_bottom: f32, font_size: f32, row_spacing: f32) -> f32 {
    row_bottom - font_size * DESCENT_RATIO - row_spacing * 0.5
}

/// Decoration line thickness: an eighth of the font size, or the stroke
/// width when that is larger.
pub fn decoration_thickness(style: &TextStyle) -> f32 {
    (style.font.size_px / 8.0).floor().max(style.stroke_width)
}

impl DecorationCommand {
    /// Decoration line for `run`, if its style carries one.
    pub fn for_run(run: &TextRunCommand) -> Option<Self> {
        let style = &run.style;
        let thickness = decoration_thickness(style);
        let y = match style.decoration {
            Decoration::None => return None,
            Decoration::Strike => run.baseline_y - style.font.size_px / 2.0 + thickness,
            Decoration::Underline => run.baseline_y + thickness,
        };
        Some(Self {
            kind: style.decoration,
            x: run.x,
            y,
            length: run.width,
            thickness,
            color: style.stroke,
        })
    }
}

/// Rasterizer that records commands instead of painting pixels.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandRecorder;

impl CommandRecorder {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for CommandRecorder {
    type Surface = CommandList;

    fn begin_page(&mut self, width: u32, height: u32, style: &TextStyle) -> CommandList {
        CommandList {
            width,
            height,
            initial_style: Some(style.clone()),
            commands: Vec::new(),
        }
    }

    fn draw_run(&mut self, surface: &mut CommandList, run: &TextRunCommand) {
        surface.commands.push(DrawCommand::Text(run.clone()));
    }

    fn draw_decoration(&mut self, surface: &mut CommandList, line: &DecorationCommand) {
        surface.commands.push(DrawCommand::Decoration(line.clone()));
    }
}
