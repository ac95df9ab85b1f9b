use rich_pages::{Color, Decoration, TextStyle};
use serde::{Deserialize, Serialize};

use crate::assets::ResourceHandle;

/// Draw a committed text run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextRunCommand {
    /// Left x, page-relative.
    pub x: f32,
    /// Glyph baseline y, page-relative.
    pub baseline_y: f32,
    /// Accumulated measured width of the run.
    pub width: f32,
    /// Content.
    pub text: String,
    /// Style snapshot taken when the run was flushed.
    pub style: TextStyle,
}

/// Horizontal strikethrough or underline line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecorationCommand {
    /// Strike or underline; never `Decoration::None`.
    pub kind: Decoration,
    /// Start x.
    pub x: f32,
    /// Line center y.
    pub y: f32,
    /// Length in px.
    pub length: f32,
    /// Line thickness in px.
    pub thickness: f32,
    /// Line color.
    pub color: Color,
}

/// Backend-agnostic rasterization command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    /// Draw text.
    Text(TextRunCommand),
    /// Draw a decoration line.
    Decoration(DecorationCommand),
}

/// Inline element category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    /// Atlas frame inserted with `\i`.
    Image,
    /// Instantiable object inserted with `\p`.
    Object,
}

impl OverlayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Object => "object",
        }
    }
}

impl core::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline element slot recorded by layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayElement {
    pub kind: OverlayKind,
    /// Path as written in markup.
    pub path: String,
    /// Resolved resource; `None` marks a zero-size placeholder for a miss.
    pub resource: Option<ResourceHandle>,
    /// Left x of the slot, page-relative.
    pub x: f32,
    /// Bottom y of the row holding the slot, page-relative.
    pub row_bottom: f32,
    /// Displayed width.
    pub width: f32,
    /// Displayed height.
    pub height: f32,
    /// Scale applied to the native size.
    pub scale: f32,
}

impl OverlayElement {
    /// Whether the resource was missing at layout time.
    pub fn is_placeholder(&self) -> bool {
        self.resource.is_none()
    }

    /// Anchor of the element's own node, y-down.
    pub fn anchor(&self) -> (f32, f32) {
        self.resource
            .as_ref()
            .map(ResourceHandle::anchor)
            .unwrap_or((0.0, 1.0))
    }
}

/// Overlay element positioned by the assembler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedOverlay {
    pub element: OverlayElement,
    /// Anchor-point x, page-relative.
    pub x: f32,
    /// Anchor-point y, page-relative.
    pub y: f32,
}

/// Sealed page: one rasterized surface plus its overlays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedPage<S> {
    /// 0-based page index.
    pub index: usize,
    /// Top-left x in the host's local space.
    pub x: f32,
    /// Top-left y in the host's local space (y-down).
    pub y: f32,
    /// Page width (viewport width).
    pub width: f32,
    /// Page height (whole rows).
    pub height: f32,
    /// Rasterized page content.
    pub surface: S,
    /// Overlay elements in insertion order.
    pub overlays: Vec<PlacedOverlay>,
}

impl<S> PlacedPage<S> {
    /// Overlay anchor position in the host's local space.
    pub fn overlay_host_position(&self, overlay: &PlacedOverlay) -> (f32, f32) {
        (self.x + overlay.x, self.y + overlay.y)
    }
}

/// Recorded page surface produced by [`crate::CommandRecorder`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandList {
    pub width: u32,
    pub height: u32,
    /// Style in effect when the page was started.
    pub initial_style: Option<TextStyle>,
    pub commands: Vec<DrawCommand>,
}

impl CommandList {
    /// Iterate text run commands.
    pub fn text_runs(&self) -> impl Iterator<Item = &TextRunCommand> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Text(run) => Some(run),
            DrawCommand::Decoration(_) => None,
        })
    }

    /// Iterate decoration commands.
    pub fn decorations(&self) -> impl Iterator<Item = &DecorationCommand> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Decoration(line) => Some(line),
            DrawCommand::Text(_) => None,
        })
    }

    /// Concatenated text of every run, in draw order.
    pub fn plain_text(&self) -> String {
        self.text_runs().map(|run| run.text.as_str()).collect()
    }
}

/// Serialize recorded pages for an external renderer.
pub fn pages_to_json(pages: &[PlacedPage<CommandList>]) -> Result<String, serde_json::Error> {
    serde_json::to_string(pages)
}

/// Parse pages previously written by [`pages_to_json`].
pub fn pages_from_json(json: &str) -> Result<Vec<PlacedPage<CommandList>>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rich_pages::{DocumentConfig, StyleState};

    fn run(text: &str, x: f32) -> DrawCommand {
        DrawCommand::Text(TextRunCommand {
            x,
            baseline_y: 40.0,
            width: 50.0,
            text: text.to_string(),
            style: StyleState::new(&DocumentConfig::default()).snapshot(),
        })
    }

    #[test]
    fn command_list_filters_by_kind() {
        let list = CommandList {
            width: 100,
            height: 60,
            initial_style: None,
            commands: vec![
                run("ab", 0.0),
                DrawCommand::Decoration(DecorationCommand {
                    kind: Decoration::Underline,
                    x: 0.0,
                    y: 46.0,
                    length: 50.0,
                    thickness: 6.0,
                    color: Color::BLACK,
                }),
                run("c", 50.0),
            ],
        };
        assert_eq!(list.text_runs().count(), 2);
        assert_eq!(list.decorations().count(), 1);
        assert_eq!(list.plain_text(), "abc");
    }

    #[test]
    fn placeholder_overlay_uses_bottom_left_anchor() {
        let element = OverlayElement {
            kind: OverlayKind::Image,
            path: "Game/Missing".to_string(),
            resource: None,
            x: 10.0,
            row_bottom: 60.0,
            width: 0.0,
            height: 0.0,
            scale: 1.0,
        };
        assert!(element.is_placeholder());
        assert_eq!(element.anchor(), (0.0, 1.0));
        assert_eq!(element.kind.to_string(), "image");
    }

    #[test]
    fn recorded_pages_survive_json_export() {
        let page = PlacedPage {
            index: 0,
            x: -50.0,
            y: -30.0,
            width: 100.0,
            height: 60.0,
            surface: CommandList {
                width: 100,
                height: 60,
                initial_style: None,
                commands: vec![run("江", 0.0)],
            },
            overlays: Vec::new(),
        };
        let json = pages_to_json(core::slice::from_ref(&page)).expect("serialize pages");
        let parsed = pages_from_json(&json).expect("parse pages");
        assert_eq!(parsed, vec![page]);
    }
}
