use kurbo::{Point, Rect};

use crate::render::RenderSurface;
use crate::types::LayerId;

/// Requests the surface sends back to the engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SurfaceCommand {
    Delete(LayerId),
}

impl RenderSurface {
    /// Topmost layer under a point given in on-screen (zoomed) surface pixels.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<LayerId> {
        let scene = self.scene.as_ref()?;
        let point = self.zoom.affine(self.size).inverse() * Point::new(x, y);
        scene.layers.iter().rev().find(|l| l.contains(point)).map(|l| l.id)
    }

    /// Click selection. Empty space clears it.
    pub fn select_at(&mut self, x: f64, y: f64) -> Option<LayerId> {
        self.selection = self.hit_test(x, y);
        self.selection
    }

    pub fn select(&mut self, id: LayerId) -> bool {
        let present = self.scene.as_ref().map_or(false, |s| s.layers.iter().any(|l| l.id == id));
        if present {
            self.selection = Some(id);
        }
        present
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<LayerId> {
        self.selection
    }

    /// Screen-space box of the selected layer, for drawing handles.
    pub fn selection_bounds(&self) -> Option<Rect> {
        let id = self.selection?;
        let layer = self.scene.as_ref()?.layers.iter().find(|l| l.id == id)?;
        Some(self.zoom.affine(self.size).transform_rect_bbox(layer.world_bounds()))
    }

    pub fn key_command(&self, key: &str) -> Option<SurfaceCommand> {
        match key {
            "Delete" | "Backspace" => self.selection.map(SurfaceCommand::Delete),
            _ => None,
        }
    }
}
