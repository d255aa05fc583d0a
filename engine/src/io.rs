use std::collections::BTreeSet;
use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageOutputFormat, RgbaImage};

use crate::engine::MockupEngine;
use crate::error::{EngineError, Result};
use crate::types::LayerId;
use crate::views::ViewSnapshot;

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(bytes)
}

pub fn encode_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Accepts `data:<mime>;base64,<payload>`. Plain (non-base64) data URLs are rejected.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| EngineError::Decode("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| EngineError::Decode("data URL has no payload".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(EngineError::Decode("data URL is not base64 encoded".to_string()));
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| EngineError::Decode(format!("bad base64 payload: {}", e)))
}

pub fn snapshots_to_json(snapshots: &[ViewSnapshot]) -> Result<String> {
    serde_json::to_string(snapshots).map_err(|e| EngineError::Encode(e.to_string()))
}

pub fn snapshots_from_json(json: &str) -> Result<Vec<ViewSnapshot>> {
    Ok(serde_json::from_str(json)?)
}

impl MockupEngine {
    /// Flatten the active view (background plus layers, zoom ignored) to PNG.
    pub fn export_current_view(&self) -> Result<Vec<u8>> {
        self.ensure_idle()?;
        let image = self.surface.rasterize(&self.library);
        let bytes = encode_png(&image)?;
        log::info!("exported {} as {} byte PNG", self.current_view().map(|v| v.as_str()).unwrap_or("?"), bytes.len());
        Ok(bytes)
    }

    pub fn export_current_view_data_url(&self) -> Result<String> {
        Ok(encode_data_url(&self.export_current_view()?, "image/png"))
    }

    /// Layers of every view, in product view order.
    pub fn export_all_view_snapshots(&self) -> Result<Vec<ViewSnapshot>> {
        if self.views.is_empty() {
            return Err(EngineError::NotMounted);
        }
        Ok(self.views.iter().map(|v| v.snapshot()).collect())
    }

    pub fn export_snapshots_json(&self) -> Result<String> {
        snapshots_to_json(&self.export_all_view_snapshots()?)
    }

    /// Replace the layers of each named view. Views not mentioned keep theirs.
    /// A restored id already held by a kept view, or repeated within the
    /// snapshots, is renumbered. Upload back-references are rebuilt only for
    /// sources registered in this engine.
    pub fn restore_view_snapshots(&mut self, mut snapshots: Vec<ViewSnapshot>) -> Result<()> {
        self.ensure_idle()?;
        let targets = snapshots.iter().map(|s| self.view_index(&s.view)).collect::<Result<BTreeSet<_>>>()?;
        let kept: BTreeSet<LayerId> = self
            .views
            .iter()
            .enumerate()
            .filter(|(idx, _)| !targets.contains(idx))
            .flat_map(|(_, v)| v.store.layers().iter().map(|l| l.id))
            .collect();

        for layer in snapshots.iter().flat_map(|s| s.layers.iter()) {
            self.ids.observe(layer.id);
        }
        let mut seen = BTreeSet::new();
        for layer in snapshots.iter_mut().flat_map(|s| s.layers.iter_mut()) {
            if kept.contains(&layer.id) || seen.contains(&layer.id) {
                let fresh = self.ids.next();
                log::debug!("restored layer {} renumbered to {}", layer.id, fresh);
                layer.id = fresh;
            }
            seen.insert(layer.id);
        }

        for snapshot in snapshots {
            let idx = self.view_index(&snapshot.view)?;
            let replaced: Vec<_> = self.views[idx].store.clear().into_iter().map(|l| l.id).collect();
            self.uploads.unlink(&replaced);
            for layer in &snapshot.layers {
                if let Some(source) = &layer.source {
                    if self.uploads.contains(source) {
                        self.uploads.link(source, layer.id)?;
                    } else if !self.library.contains(source) {
                        log::warn!("restored layer {} refers to unknown asset {}", layer.id, source);
                    }
                }
            }
            log::info!("restored {} layers on {}", snapshot.layers.len(), snapshot.view);
            self.views[idx].store.restore(snapshot.layers);
        }
        self.reflect_current();
        Ok(())
    }

    pub fn restore_snapshots_json(&mut self, json: &str) -> Result<()> {
        self.restore_view_snapshots(snapshots_from_json(json)?)
    }
}
