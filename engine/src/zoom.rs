use kurbo::Affine;
use serde::Serialize;

use crate::config::SurfaceSize;

/// Discrete zoom applied to the whole surface. Layer geometry is never touched.
#[derive(Serialize, Clone, Debug)]
pub struct ZoomController {
    levels: Vec<f64>,
    index: usize,
}

impl ZoomController {
    /// `levels` must be ascending and non-empty (`EngineConfig::normalize` guarantees both).
    pub fn new(levels: &[f64]) -> Self {
        let levels = if levels.is_empty() { vec![1.0] } else { levels.to_vec() };
        ZoomController { levels, index: 0 }
    }

    pub fn level(&self) -> f64 {
        self.levels[self.index]
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn zoom_in(&mut self) -> f64 {
        if self.index + 1 < self.levels.len() {
            self.index += 1;
        }
        self.level()
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.index = self.index.saturating_sub(1);
        self.level()
    }

    /// Snap an arbitrary request to the nearest configured level.
    pub fn set(&mut self, requested: f64) -> f64 {
        if requested.is_finite() {
            self.index = self
                .levels
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| (*a - requested).abs().total_cmp(&(*b - requested).abs()))
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
        self.level()
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Scale about the surface center.
    pub fn affine(&self, surface: SurfaceSize) -> Affine {
        let (cx, cy) = surface.center();
        Affine::translate((cx, cy)) * Affine::scale(self.level()) * Affine::translate((-cx, -cy))
    }
}
