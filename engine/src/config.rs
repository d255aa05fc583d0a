use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::types::{Bucket, ProductKind, ViewId};

/// Size of the drawing surface in surface pixels.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }
}

/// Engine-wide settings. Every field has a default, so a page only sends what it overrides.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EngineConfig {
    pub surface: SurfaceSize,
    pub background: String,
    pub zoom_levels: Vec<f64>,
    /// Largest share of the surface an added image may cover on either axis.
    pub image_fill: f64,
    pub default_text: String,
    pub text_size: f64,
    pub text_color: String,
    /// Placeholders: `{product}`, `{bucket}`, `{view}`.
    pub template_pattern: String,
    pub fallback_bucket: Bucket,
    pub accepted_mime_types: Vec<String>,
    pub max_upload_bytes: usize,
    pub thumbnail_edge: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            surface: SurfaceSize { width: 600, height: 700 },
            background: "#ffffff".to_string(),
            zoom_levels: vec![1.0, 1.25, 1.5, 2.0],
            image_fill: 0.6,
            default_text: "Your text".to_string(),
            text_size: 48.0,
            text_color: "#000000".to_string(),
            template_pattern: "{product}/{bucket} - {view}".to_string(),
            fallback_bucket: Bucket::White,
            accepted_mime_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            max_upload_bytes: 20 * 1024 * 1024,
            thumbnail_edge: 96,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: EngineConfig = serde_json::from_str(json)?;
        config.normalize();
        Ok(config)
    }

    /// Clamp values a page could send out of range instead of rejecting them.
    pub(crate) fn normalize(&mut self) {
        self.surface.width = self.surface.width.max(1);
        self.surface.height = self.surface.height.max(1);
        self.zoom_levels.retain(|z| z.is_finite() && *z > 0.0);
        self.zoom_levels.sort_by(|a, b| a.total_cmp(b));
        self.zoom_levels.dedup();
        if self.zoom_levels.is_empty() {
            self.zoom_levels.push(1.0);
        }
        if !self.image_fill.is_finite() || self.image_fill <= 0.0 || self.image_fill > 1.0 {
            self.image_fill = 0.6;
        }
        if !self.text_size.is_finite() || self.text_size <= 0.0 {
            self.text_size = 48.0;
        }
        self.accepted_mime_types = self.accepted_mime_types.iter().map(|m| m.trim().to_lowercase()).collect();
        self.thumbnail_edge = self.thumbnail_edge.max(1);
    }

    /// Storage key of the template for one product side in one color family.
    pub fn template_key(&self, product: &ProductKind, bucket: Bucket, view: &ViewId) -> String {
        self.template_pattern
            .replace("{product}", &product.name)
            .replace("{bucket}", bucket.name())
            .replace("{view}", &view.display_name())
    }
}
