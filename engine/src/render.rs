//! Render surface: reflects the active view and flattens it to pixels.
//!
//! The surface never owns layer data. The engine pushes a [`Scene`] copy in
//! after every change and reads commands back (see `selection`).

use image::{Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect};
use spleen_font::{PSF2Font, FONT_12X24};

use crate::color::parse_hex;
use crate::config::{EngineConfig, SurfaceSize};
use crate::objects::{DesignLayer, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::resolver::AssetLibrary;
use crate::types::{LayerId, LayerKind, ViewId};
use crate::views::{BackgroundState, ViewState};
use crate::zoom::ZoomController;

const CHECKER_SIZE: u32 = 16;
const CHECKER_LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CHECKER_DARK: Rgba<u8> = Rgba([229, 229, 229, 255]);

/// What the surface currently shows.
#[derive(Clone, Debug)]
pub struct Scene {
    pub view: ViewId,
    pub background: BackgroundState,
    pub layers: Vec<DesignLayer>,
}

impl Scene {
    pub fn of(state: &ViewState) -> Self {
        Scene { view: state.view().clone(), background: state.background().clone(), layers: state.store().snapshot() }
    }
}

#[derive(Debug)]
pub struct RenderSurface {
    pub(crate) size: SurfaceSize,
    pub(crate) fill: Rgba<u8>,
    pub(crate) zoom: ZoomController,
    pub(crate) scene: Option<Scene>,
    pub(crate) selection: Option<LayerId>,
}

impl RenderSurface {
    pub fn new(config: &EngineConfig) -> Self {
        let [r, g, b] = parse_hex(&config.background).unwrap_or([255, 255, 255]);
        RenderSurface {
            size: config.surface,
            fill: Rgba([r, g, b, 255]),
            zoom: ZoomController::new(&config.zoom_levels),
            scene: None,
            selection: None,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut ZoomController {
        &mut self.zoom
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Drop the live layer set; used while a view switch is in flight.
    pub fn clear(&mut self) {
        self.scene = None;
        self.selection = None;
    }

    pub fn reflect(&mut self, scene: Scene) {
        if let Some(id) = self.selection {
            if !scene.layers.iter().any(|l| l.id == id) {
                self.selection = None;
            }
        }
        self.scene = Some(scene);
    }

    /// True when the active view's template could not be loaded at all.
    pub fn template_unavailable(&self) -> bool {
        matches!(self.scene.as_ref().map(|s| &s.background), Some(BackgroundState::Unavailable { .. }))
    }

    /// Background plus every layer in z order at full surface resolution. Zoom is ignored.
    pub fn rasterize(&self, library: &AssetLibrary) -> RgbaImage {
        self.compose(library, Affine::IDENTITY)
    }

    /// Same as [`rasterize`](Self::rasterize) with the zoom transform applied about the center.
    pub fn rasterize_preview(&self, library: &AssetLibrary) -> RgbaImage {
        self.compose(library, self.zoom.affine(self.size))
    }

    fn compose(&self, library: &AssetLibrary, view: Affine) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(self.size.width, self.size.height, self.fill);
        let scene = match &self.scene {
            Some(scene) => scene,
            None => return canvas,
        };

        match &scene.background {
            BackgroundState::Ready { handle, .. } => match library.get(handle) {
                Some(image) => {
                    let fit = fit_contain(image.dimensions(), self.size);
                    draw_image(&mut canvas, image, view * fit);
                }
                None => log::warn!("background {} missing from library", handle),
            },
            BackgroundState::Unavailable { .. } => render_checkerboard(&mut canvas),
            BackgroundState::Unloaded | BackgroundState::Loading { .. } => {}
        }

        for layer in &scene.layers {
            match layer.kind {
                LayerKind::Image => {
                    let source = layer.source.as_ref().and_then(|h| library.get(h));
                    match source {
                        Some(image) => draw_layer(&mut canvas, layer, image, view),
                        None => log::warn!("layer {} has no decoded source, skipped", layer.id),
                    }
                }
                LayerKind::Text => {
                    let text = layer.text.as_deref().unwrap_or_default();
                    let color = layer.color.as_deref().and_then(parse_hex).unwrap_or([0, 0, 0]);
                    let bitmap = text_bitmap(text, color);
                    draw_layer(&mut canvas, layer, &bitmap, view);
                }
            }
        }
        canvas
    }
}

/// Scale an image to fit inside the surface, centered, keeping its aspect ratio.
fn fit_contain(image: (u32, u32), surface: SurfaceSize) -> Affine {
    let (iw, ih) = (image.0.max(1) as f64, image.1.max(1) as f64);
    let (sw, sh) = (surface.width as f64, surface.height as f64);
    let scale = (sw / iw).min(sh / ih);
    Affine::translate(((sw - iw * scale) / 2.0, (sh - ih * scale) / 2.0)) * Affine::scale(scale)
}

fn draw_layer(canvas: &mut RgbaImage, layer: &DesignLayer, source: &RgbaImage, view: Affine) {
    let (sw, sh) = (source.width().max(1) as f64, source.height().max(1) as f64);
    let to_content = Affine::scale_non_uniform(layer.width / sw, layer.height / sh);
    draw_image(canvas, source, view * layer.affine() * to_content);
}

/// Nearest-neighbour resample of `source` through `affine` (source pixels -> canvas pixels).
fn draw_image(canvas: &mut RgbaImage, source: &RgbaImage, affine: Affine) {
    let (sw, sh) = (source.width() as f64, source.height() as f64);
    if sw == 0.0 || sh == 0.0 || affine.determinant().abs() < 1e-12 {
        return;
    }
    let bounds = affine.transform_rect_bbox(Rect::new(0.0, 0.0, sw, sh));
    let x0 = bounds.x0.floor().max(0.0) as u32;
    let y0 = bounds.y0.floor().max(0.0) as u32;
    let x1 = (bounds.x1.ceil().max(0.0) as u32).min(canvas.width());
    let y1 = (bounds.y1.ceil().max(0.0) as u32).min(canvas.height());
    let inverse = affine.inverse();

    for py in y0..y1 {
        for px in x0..x1 {
            let p = inverse * Point::new(px as f64 + 0.5, py as f64 + 0.5);
            if p.x < 0.0 || p.y < 0.0 || p.x >= sw || p.y >= sh {
                continue;
            }
            let src = *source.get_pixel(p.x as u32, p.y as u32);
            blend_over(canvas.get_pixel_mut(px, py), src);
        }
    }
}

/// Source-over alpha compositing.
fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let v = (s * sa + d * da * (1.0 - sa)) / out_a;
        dst[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn render_checkerboard(canvas: &mut RgbaImage) {
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        *pixel = if ((x / CHECKER_SIZE) + (y / CHECKER_SIZE)) % 2 == 0 { CHECKER_LIGHT } else { CHECKER_DARK };
    }
}

/// Draw text with the Spleen 12x24 bitmap font onto a transparent bitmap.
pub fn text_bitmap(text: &str, color: [u8; 3]) -> RgbaImage {
    let (w, h) = crate::objects::text_extent(text);
    let mut bitmap = RgbaImage::new(w as u32, h as u32);
    let ink = Rgba([color[0], color[1], color[2], 255]);
    let mut font = PSF2Font::new(FONT_12X24).ok();
    let (cw, ch) = (GLYPH_WIDTH as u32, GLYPH_HEIGHT as u32);

    for (line_no, line) in text.split('\n').enumerate() {
        for (col, c) in line.chars().enumerate() {
            if c.is_whitespace() {
                continue;
            }
            let ox = col as u32 * cw;
            let oy = line_no as u32 * ch;
            let mut utf8 = [0u8; 4];
            let glyph = font.as_mut().and_then(|f| f.glyph_for_utf8(c.encode_utf8(&mut utf8).as_bytes()));
            match glyph {
                Some(glyph) => {
                    for (row_y, row) in glyph.enumerate() {
                        for (col_x, on) in row.enumerate() {
                            let (x, y) = (ox + col_x as u32, oy + row_y as u32);
                            if on && x < bitmap.width() && y < bitmap.height() {
                                bitmap.put_pixel(x, y, ink);
                            }
                        }
                    }
                }
                None => {
                    // unknown glyph: outlined box
                    for x in ox + 1..ox + cw - 1 {
                        bitmap.put_pixel(x, oy + 2, ink);
                        bitmap.put_pixel(x, oy + ch - 3, ink);
                    }
                    for y in oy + 2..oy + ch - 2 {
                        bitmap.put_pixel(ox + 1, y, ink);
                        bitmap.put_pixel(ox + cw - 2, y, ink);
                    }
                }
            }
        }
    }
    bitmap
}
