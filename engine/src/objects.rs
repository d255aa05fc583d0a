use serde::{Serialize, Deserialize};
use kurbo::{Affine, Point, Rect};
use crate::types::{AssetHandle, LayerId, LayerKind};

pub const MIN_SCALE: f64 = 0.05;
pub const MAX_SCALE: f64 = 20.0;

/// Cell size of the bitmap font text layers are drawn with.
pub const GLYPH_WIDTH: f64 = 12.0;
pub const GLYPH_HEIGHT: f64 = 24.0;

/// Unscaled box of a (possibly multi-line) text layer. Never zero-sized.
pub fn text_extent(text: &str) -> (f64, f64) {
    let lines: Vec<&str> = text.split('\n').collect();
    let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
    (cols as f64 * GLYPH_WIDTH, lines.len() as f64 * GLYPH_HEIGHT)
}

/// Placement of a layer: `x`/`y` is the layer center in surface pixels, `angle` in degrees.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct LayerTransform {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
    pub flip_x: bool,
}

impl LayerTransform {
    pub fn centered(x: f64, y: f64, scale: f64) -> Self {
        LayerTransform { x, y, scale_x: scale, scale_y: scale, angle: 0.0, flip_x: false }
    }

    /// Replace out-of-range values instead of rejecting the edit.
    /// Non-finite numbers keep the value from `previous`.
    pub fn clamped(self, previous: &LayerTransform) -> LayerTransform {
        let pick = |v: f64, old: f64| if v.is_finite() { v } else { old };
        LayerTransform {
            x: pick(self.x, previous.x),
            y: pick(self.y, previous.y),
            scale_x: pick(self.scale_x, previous.scale_x).clamp(MIN_SCALE, MAX_SCALE),
            scale_y: pick(self.scale_y, previous.scale_y).clamp(MIN_SCALE, MAX_SCALE),
            angle: pick(self.angle, previous.angle).rem_euclid(360.0),
            flip_x: self.flip_x,
        }
    }
}

/// A single user-placed design element on one view.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct DesignLayer {
    pub id: LayerId,
    pub kind: LayerKind,
    /// Image source; for uploads this is also the back-reference used for cascade removal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AssetHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Unscaled content size in pixels.
    pub width: f64,
    pub height: f64,
    pub transform: LayerTransform,
    pub z_index: i32,
}

impl DesignLayer {
    /// Maps content pixels `(0,0)..(width,height)` onto the surface.
    pub fn affine(&self) -> Affine {
        let t = &self.transform;
        let flip = if t.flip_x { -1.0 } else { 1.0 };
        Affine::translate((t.x, t.y))
            * Affine::rotate(t.angle.to_radians())
            * Affine::scale_non_uniform(t.scale_x * flip, t.scale_y)
            * Affine::translate((-self.width / 2.0, -self.height / 2.0))
    }

    pub fn content_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Axis-aligned bounds on the surface.
    pub fn world_bounds(&self) -> Rect {
        self.affine().transform_rect_bbox(self.content_rect())
    }

    pub fn contains(&self, point: Point) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        let local = self.affine().inverse() * point;
        local.x >= 0.0 && local.x <= self.width && local.y >= 0.0 && local.y <= self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(transform: LayerTransform) -> DesignLayer {
        DesignLayer {
            id: LayerId(1),
            kind: LayerKind::Image,
            source: None,
            text: None,
            color: None,
            width: 100.0,
            height: 50.0,
            transform,
            z_index: 0,
        }
    }

    #[test]
    fn bounds_follow_scale_and_rotation() {
        let l = layer(LayerTransform::centered(200.0, 100.0, 2.0));
        let b = l.world_bounds();
        assert!((b.x0 - 100.0).abs() < 1e-9 && (b.x1 - 300.0).abs() < 1e-9);
        assert!((b.y0 - 50.0).abs() < 1e-9 && (b.y1 - 150.0).abs() < 1e-9);

        let mut t = LayerTransform::centered(0.0, 0.0, 1.0);
        t.angle = 90.0;
        let b = layer(t).world_bounds();
        assert!((b.width() - 50.0).abs() < 1e-9 && (b.height() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn flip_keeps_position() {
        let mut t = LayerTransform::centered(200.0, 100.0, 1.0);
        let before = layer(t).world_bounds();
        t.flip_x = true;
        let after = layer(t).world_bounds();
        assert!((before.x0 - after.x0).abs() < 1e-9 && (before.y1 - after.y1).abs() < 1e-9);
    }

    #[test]
    fn hit_test_respects_rotation() {
        let mut t = LayerTransform::centered(100.0, 100.0, 1.0);
        assert!(layer(t).contains(Point::new(145.0, 100.0)));
        t.angle = 90.0;
        assert!(!layer(t).contains(Point::new(145.0, 100.0)));
        assert!(layer(t).contains(Point::new(100.0, 145.0)));
    }

    #[test]
    fn text_extent_counts_longest_line() {
        assert_eq!(text_extent("hello"), (60.0, 24.0));
        assert_eq!(text_extent("a\nlonger"), (72.0, 48.0));
        assert_eq!(text_extent(""), (12.0, 24.0));
    }

    #[test]
    fn clamping_replaces_bad_values() {
        let previous = LayerTransform::centered(10.0, 20.0, 1.0);
        let wild = LayerTransform { x: f64::NAN, y: 5.0, scale_x: 1000.0, scale_y: 0.0, angle: -90.0, flip_x: true };
        let clamped = wild.clamped(&previous);
        assert_eq!(clamped.x, 10.0);
        assert_eq!(clamped.y, 5.0);
        assert_eq!(clamped.scale_x, MAX_SCALE);
        assert_eq!(clamped.scale_y, MIN_SCALE);
        assert_eq!(clamped.angle, 270.0);
        assert!(clamped.flip_x);
    }
}
