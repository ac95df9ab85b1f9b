use rich_pages::Viewport;

use crate::render_ir::{OverlayElement, PlacedOverlay, PlacedPage};

/// Positions sealed pages and their overlays in the host's local space.
///
/// Pages stack downward: page `n` starts `n * page_height` below page 0,
/// whose top-left corner is the viewport's top-left corner relative to its
/// anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageAssembler {
    viewport: Viewport,
    page_height: f32,
}

impl PageAssembler {
    pub fn new(viewport: Viewport, page_height: f32) -> Self {
        Self {
            viewport,
            page_height,
        }
    }

    pub fn page_height(&self) -> f32 {
        self.page_height
    }

    /// Top-left corner of page `index`.
    pub fn page_origin(&self, index: usize) -> (f32, f32) {
        let x = -self.viewport.width * self.viewport.anchor_x;
        let y = -self.viewport.height * self.viewport.anchor_y + index as f32 * self.page_height;
        (x, y)
    }

    /// Seal a page, converting recorded overlay slots into anchor positions.
    pub fn seal_page<S>(
        &self,
        index: usize,
        surface: S,
        overlays: Vec<OverlayElement>,
    ) -> PlacedPage<S> {
        let (x, y) = self.page_origin(index);
        let overlays = overlays.into_iter().map(place_overlay).collect();
        PlacedPage {
            index,
            x,
            y,
            width: self.viewport.width,
            height: self.page_height,
            surface,
            overlays,
        }
    }
}

fn place_overlay(element: OverlayElement) -> PlacedOverlay {
    let (anchor_x, anchor_y) = element.anchor();
    let x = element.x + element.width * anchor_x;
    let y = element.row_bottom - element.height + element.height * anchor_y;
    PlacedOverlay { element, x, y }
}
