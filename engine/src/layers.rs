//! Per-view ordered layer collection. Data only; drawing lives in `render`.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::config::SurfaceSize;
use crate::error::{EngineError, Result};
use crate::objects::{text_extent, DesignLayer, LayerTransform, GLYPH_HEIGHT};
use crate::types::{AssetHandle, LayerId, LayerKind, ReorderDirection, ViewId};

/// Id source shared by every store of one engine, so ids never collide across views.
#[derive(Clone, Debug, Default)]
pub struct LayerIds(Rc<Cell<u32>>);

impl LayerIds {
    pub fn next(&self) -> LayerId {
        let id = self.0.get() + 1;
        self.0.set(id);
        LayerId(id)
    }

    /// Keep future ids above one that came from outside (restored snapshots).
    pub fn observe(&self, id: LayerId) {
        if id.0 > self.0.get() {
            self.0.set(id.0);
        }
    }
}

#[derive(Debug)]
pub struct LayerStore {
    view: ViewId,
    surface: SurfaceSize,
    ids: LayerIds,
    // invariant: ascending z_index
    layers: Vec<DesignLayer>,
}

impl LayerStore {
    pub fn new(view: ViewId, surface: SurfaceSize, ids: LayerIds) -> Self {
        LayerStore { view, surface, ids, layers: Vec::new() }
    }

    pub fn view(&self) -> &ViewId {
        &self.view
    }

    pub fn layers(&self) -> &[DesignLayer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, id: LayerId) -> Option<&DesignLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: LayerId) -> Result<usize> {
        self.layers.iter().position(|l| l.id == id).ok_or(EngineError::LayerNotFound(id))
    }

    fn next_z(&self) -> i32 {
        self.layers.last().map(|l| l.z_index + 1).unwrap_or(0)
    }

    /// Centered, uniformly scaled so neither axis covers more than `fill` of the surface.
    pub fn add_image_layer(&mut self, source: AssetHandle, natural: (u32, u32), fill: f64) -> LayerId {
        let width = natural.0.max(1) as f64;
        let height = natural.1.max(1) as f64;
        let scale = (fill * self.surface.width as f64 / width).min(fill * self.surface.height as f64 / height);
        let (cx, cy) = self.surface.center();
        let id = self.ids.next();
        let z_index = self.next_z();
        self.layers.push(DesignLayer {
            id,
            kind: LayerKind::Image,
            source: Some(source),
            text: None,
            color: None,
            width,
            height,
            transform: LayerTransform::centered(cx, cy, scale),
            z_index,
        });
        id
    }

    pub fn add_text_layer(&mut self, text: &str, size: f64, color: &str) -> LayerId {
        let (width, height) = text_extent(text);
        let (cx, cy) = self.surface.center();
        let id = self.ids.next();
        let z_index = self.next_z();
        self.layers.push(DesignLayer {
            id,
            kind: LayerKind::Text,
            source: None,
            text: Some(text.to_string()),
            color: Some(color.to_string()),
            width,
            height,
            transform: LayerTransform::centered(cx, cy, size / GLYPH_HEIGHT),
            z_index,
        });
        id
    }

    /// Remaining layers keep their z_index; gaps are allowed.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<DesignLayer> {
        let pos = self.position(id)?;
        Ok(self.layers.remove(pos))
    }

    /// Swap z rank with the immediate neighbour. Returns `false` at the boundary.
    pub fn reorder(&mut self, id: LayerId, direction: ReorderDirection) -> Result<bool> {
        let pos = self.position(id)?;
        let other = match direction {
            ReorderDirection::Forward if pos + 1 < self.layers.len() => pos + 1,
            ReorderDirection::Backward if pos > 0 => pos - 1,
            _ => return Ok(false),
        };
        let z = self.layers[pos].z_index;
        self.layers[pos].z_index = self.layers[other].z_index;
        self.layers[other].z_index = z;
        self.layers.swap(pos, other);
        Ok(true)
    }

    /// Returns the new flag.
    pub fn flip_horizontal(&mut self, id: LayerId) -> Result<bool> {
        let pos = self.position(id)?;
        let t = &mut self.layers[pos].transform;
        t.flip_x = !t.flip_x;
        Ok(t.flip_x)
    }

    pub fn set_transform(&mut self, id: LayerId, transform: LayerTransform) -> Result<LayerTransform> {
        let pos = self.position(id)?;
        let layer = &mut self.layers[pos];
        layer.transform = transform.clamped(&layer.transform);
        Ok(layer.transform)
    }

    pub fn set_text(&mut self, id: LayerId, text: &str) -> Result<()> {
        let pos = self.position(id)?;
        let layer = &mut self.layers[pos];
        if layer.kind != LayerKind::Text {
            return Err(EngineError::Config(format!("layer {} is not a text layer", id)));
        }
        let (width, height) = text_extent(text);
        layer.text = Some(text.to_string());
        layer.width = width;
        layer.height = height;
        Ok(())
    }

    /// Drop every layer whose id is in `ids`, returning the ones actually removed.
    pub fn remove_all(&mut self, ids: &BTreeSet<LayerId>) -> Vec<LayerId> {
        let mut removed = Vec::new();
        self.layers.retain(|l| {
            if ids.contains(&l.id) {
                removed.push(l.id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear(&mut self) -> Vec<DesignLayer> {
        std::mem::take(&mut self.layers)
    }

    pub fn snapshot(&self) -> Vec<DesignLayer> {
        self.layers.clone()
    }

    pub fn restore(&mut self, snapshot: Vec<DesignLayer>) {
        let mut layers = snapshot;
        layers.sort_by_key(|l| l.z_index);
        for layer in &layers {
            self.ids.observe(layer.id);
        }
        self.layers = layers;
    }
}
