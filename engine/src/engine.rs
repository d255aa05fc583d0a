//! The view manager: owns one layer store per view, the upload registry and
//! the render surface, and sequences view switches against background loads.
//!
//! Loads are split in two so the engine never holds a borrow across an await:
//! an operation hands back a [`BackgroundRequest`], the caller runs it through
//! an [`AssetResolver`], and [`MockupEngine::complete_background`] applies the
//! result unless a newer request has superseded it. The `async` helpers do
//! both steps for callers that own the engine outright.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::layers::LayerIds;
use crate::objects::LayerTransform;
use crate::render::{RenderSurface, Scene};
use crate::resolver::{AssetLibrary, AssetProbe, AssetResolver, LoadedBackground, UserAssetSource};
use crate::selection::SurfaceCommand;
use crate::types::{AssetHandle, LayerId, ProductKind, ReorderDirection, VariantDescriptor, ViewId};
use crate::uploads::{CascadeRemoval, FileCandidate, ThumbnailInfo, UploadRegistry};
use crate::views::{BackgroundOutcome, BackgroundRequest, BackgroundState, ViewState};

pub struct MockupEngine {
    pub(crate) config: EngineConfig,
    pub(crate) product: Option<ProductKind>,
    pub(crate) variant: VariantDescriptor,
    pub(crate) views: Vec<ViewState>,
    pub(crate) current: Option<usize>,
    pub(crate) generation: u64,
    pub(crate) switch_pending: bool,
    pub(crate) ids: LayerIds,
    pub(crate) library: AssetLibrary,
    pub(crate) uploads: UploadRegistry,
    pub(crate) surface: RenderSurface,
}

/// Turn a missing layer into a logged no-op.
fn tolerate_missing<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(EngineError::LayerNotFound(id)) => {
            log::debug!("layer {} no longer exists, ignoring", id);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl MockupEngine {
    pub fn new(mut config: EngineConfig) -> Self {
        config.normalize();
        let surface = RenderSurface::new(&config);
        MockupEngine {
            config,
            product: None,
            variant: VariantDescriptor::default(),
            views: Vec::new(),
            current: None,
            generation: 0,
            switch_pending: false,
            ids: LayerIds::default(),
            library: AssetLibrary::new(),
            uploads: UploadRegistry::new(),
            surface,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn product(&self) -> Option<&ProductKind> {
        self.product.as_ref()
    }

    pub fn variant(&self) -> &VariantDescriptor {
        &self.variant
    }

    pub fn current_view(&self) -> Option<&ViewId> {
        self.current.map(|idx| self.views[idx].view())
    }

    pub fn view(&self, view: &ViewId) -> Option<&ViewState> {
        self.views.iter().find(|v| v.view() == view)
    }

    pub fn views(&self) -> &[ViewState] {
        &self.views
    }

    /// True between starting a view switch (or mount) and applying its background.
    pub fn is_switching(&self) -> bool {
        self.switch_pending
    }

    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    pub fn uploads(&self) -> &UploadRegistry {
        &self.uploads
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub(crate) fn view_index(&self, view: &ViewId) -> Result<usize> {
        self.views.iter().position(|v| v.view() == view).ok_or_else(|| EngineError::UnknownView(view.clone()))
    }

    pub(crate) fn ensure_idle(&self) -> Result<()> {
        if self.current.is_none() {
            return Err(EngineError::NotMounted);
        }
        if self.switch_pending {
            return Err(EngineError::SwitchInProgress);
        }
        Ok(())
    }

    /// Index of the active view, provided user edits are currently accepted.
    fn active_index(&self) -> Result<usize> {
        self.ensure_idle()?;
        self.current.ok_or(EngineError::NotMounted)
    }

    pub(crate) fn reflect_current(&mut self) {
        if let Some(idx) = self.current {
            self.surface.reflect(Scene::of(&self.views[idx]));
        }
    }

    fn request_background(&mut self, idx: usize) -> Result<BackgroundRequest> {
        let product = self.product.as_ref().ok_or(EngineError::NotMounted)?;
        self.generation += 1;
        let request = BackgroundRequest::plan(&self.config, product, self.views[idx].view(), &self.variant, self.generation);
        self.views[idx].background = BackgroundState::Loading { bucket: request.bucket, key: request.key.clone() };
        Ok(request)
    }

    // ---- view lifecycle ----

    /// Enter the product's first view with an empty store per view.
    /// Anything from a previously mounted product is discarded.
    pub fn mount(&mut self, product: ProductKind, variant: VariantDescriptor) -> Result<BackgroundRequest> {
        if product.views.is_empty() {
            return Err(EngineError::Config(format!("product '{}' declares no views", product.name)));
        }
        let old: Vec<LayerId> = self.views.iter().flat_map(|v| v.store.layers().iter().map(|l| l.id)).collect();
        self.uploads.unlink(&old);

        self.views = product.views.iter().map(|v| ViewState::new(v.clone(), self.config.surface, self.ids.clone())).collect();
        log::info!("mounted '{}' with views [{}]", product.name, product.views.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", "));
        self.product = Some(product);
        self.variant = variant;
        self.current = Some(0);
        self.surface.clear();
        self.surface.zoom_mut().reset();
        self.switch_pending = true;
        self.request_background(0)
    }

    /// Leave the current view for `target`. Layer edits are refused until the
    /// returned request has been completed.
    pub fn begin_switch(&mut self, target: &ViewId) -> Result<BackgroundRequest> {
        let from = self.active_index()?;
        let to = self.view_index(target)?;
        log::debug!(
            "switching {} -> {} ({} layers left behind)",
            self.views[from].view(),
            target,
            self.views[from].store.len()
        );
        // the outgoing store already holds its layers; only the surface is emptied
        self.surface.clear();
        if matches!(self.views[from].background, BackgroundState::Loading { .. }) {
            self.views[from].background = BackgroundState::Unloaded;
        }
        self.current = Some(to);
        self.switch_pending = true;
        self.request_background(to)
    }

    /// Record the new variant and reload only the active view's background.
    /// Other views pick it up on their next switch.
    pub fn variant_changed(&mut self, variant: VariantDescriptor) -> Result<Option<BackgroundRequest>> {
        self.variant = variant;
        let idx = match self.current {
            Some(idx) => idx,
            None => return Ok(None),
        };
        for (i, view) in self.views.iter_mut().enumerate() {
            if i != idx {
                view.background = BackgroundState::Unloaded;
            }
        }
        log::debug!("variant changed to '{}', reloading {}", self.variant.name, self.views[idx].view());
        self.request_background(idx).map(Some)
    }

    /// Clear the active view's layers and reload its background.
    pub fn reset_view(&mut self) -> Result<BackgroundRequest> {
        let idx = self.active_index()?;
        let removed: Vec<LayerId> = self.views[idx].store.clear().into_iter().map(|l| l.id).collect();
        self.uploads.unlink(&removed);
        log::info!("reset {} ({} layers cleared)", self.views[idx].view(), removed.len());
        let request = self.request_background(idx)?;
        self.reflect_current();
        Ok(request)
    }

    /// Apply a finished background load. Answers to superseded requests are dropped.
    pub fn complete_background(&mut self, request: BackgroundRequest, result: Result<LoadedBackground>) -> BackgroundOutcome {
        let idx = match self.current {
            Some(idx) if *self.views[idx].view() == request.view && request.generation == self.generation => idx,
            _ => {
                log::debug!("discarding stale background for {} (generation {})", request.view, request.generation);
                return BackgroundOutcome::Stale;
            }
        };

        let outcome = match result {
            Ok(loaded) => {
                let handle = loaded.handle();
                self.library.insert(handle.clone(), loaded.image);
                self.views[idx].background = BackgroundState::Ready { handle, bucket: loaded.bucket, fallback: loaded.fallback };
                BackgroundOutcome::Applied { view: request.view, bucket: loaded.bucket, fallback: loaded.fallback }
            }
            Err(err) => {
                let tried = match err {
                    EngineError::AssetNotFound { tried, .. } => tried,
                    other => {
                        log::warn!("background load for {} failed: {}", request.view, other);
                        request.candidates().iter().map(|(key, _, _)| key.to_string()).collect()
                    }
                };
                log::warn!("template unavailable for {} (tried {})", request.view, tried.join(", "));
                self.views[idx].background = BackgroundState::Unavailable { tried: tried.clone() };
                BackgroundOutcome::Unavailable { view: request.view, tried }
            }
        };

        self.switch_pending = false;
        self.reflect_current();
        outcome
    }

    pub async fn load<P: AssetProbe>(&mut self, request: BackgroundRequest, resolver: &AssetResolver<P>) -> BackgroundOutcome {
        let result = resolver.load_background(&request).await;
        self.complete_background(request, result)
    }

    pub async fn mount_with<P: AssetProbe>(
        &mut self,
        product: ProductKind,
        variant: VariantDescriptor,
        resolver: &AssetResolver<P>,
    ) -> Result<BackgroundOutcome> {
        let request = self.mount(product, variant)?;
        Ok(self.load(request, resolver).await)
    }

    pub async fn switch_view<P: AssetProbe>(&mut self, target: &ViewId, resolver: &AssetResolver<P>) -> Result<BackgroundOutcome> {
        let request = self.begin_switch(target)?;
        Ok(self.load(request, resolver).await)
    }

    pub async fn change_variant<P: AssetProbe>(
        &mut self,
        variant: VariantDescriptor,
        resolver: &AssetResolver<P>,
    ) -> Result<Option<BackgroundOutcome>> {
        match self.variant_changed(variant)? {
            Some(request) => Ok(Some(self.load(request, resolver).await)),
            None => Ok(None),
        }
    }

    pub async fn reset_view_with<P: AssetProbe>(&mut self, resolver: &AssetResolver<P>) -> Result<BackgroundOutcome> {
        let request = self.reset_view()?;
        Ok(self.load(request, resolver).await)
    }

    // ---- layers ----

    /// Place any decoded asset (upload or user asset) on the active view.
    pub fn add_image_layer(&mut self, handle: &AssetHandle) -> Result<LayerId> {
        let idx = self.active_index()?;
        let natural = self.library.dimensions(handle).ok_or_else(|| EngineError::UnknownAsset(handle.clone()))?;
        let id = self.views[idx].store.add_image_layer(handle.clone(), natural, self.config.image_fill);
        if self.uploads.contains(handle) {
            self.uploads.link(handle, id)?;
        }
        self.reflect_current();
        self.surface.select(id);
        Ok(id)
    }

    pub fn add_layer_from_upload(&mut self, handle: &AssetHandle) -> Result<LayerId> {
        if !self.uploads.contains(handle) {
            return Err(EngineError::UnknownUpload(handle.clone()));
        }
        self.add_image_layer(handle)
    }

    /// `None` or an empty string uses the configured default text.
    pub fn add_text_layer(&mut self, text: Option<&str>) -> Result<LayerId> {
        let idx = self.active_index()?;
        let text = text.filter(|t| !t.is_empty()).map(str::to_string).unwrap_or_else(|| self.config.default_text.clone());
        let id = self.views[idx].store.add_text_layer(&text, self.config.text_size, &self.config.text_color);
        self.reflect_current();
        self.surface.select(id);
        Ok(id)
    }

    /// Decode a user asset (bytes or data URL) without registering it as an upload.
    pub fn resolve_user_asset(&mut self, source: &UserAssetSource) -> Result<AssetHandle> {
        self.library.resolve_user_asset(source)
    }

    pub fn update_transform(&mut self, id: LayerId, transform: LayerTransform) -> Result<Option<LayerTransform>> {
        let idx = self.active_index()?;
        let applied = tolerate_missing(self.views[idx].store.set_transform(id, transform))?;
        self.reflect_current();
        Ok(applied)
    }

    pub fn update_text(&mut self, id: LayerId, text: &str) -> Result<bool> {
        let idx = self.active_index()?;
        let applied = tolerate_missing(self.views[idx].store.set_text(id, text))?.is_some();
        self.reflect_current();
        Ok(applied)
    }

    // ---- selection ----

    pub fn select_at(&mut self, x: f64, y: f64) -> Option<LayerId> {
        self.surface.select_at(x, y)
    }

    pub fn select(&mut self, id: LayerId) -> bool {
        self.surface.select(id)
    }

    pub fn clear_selection(&mut self) {
        self.surface.clear_selection();
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.surface.selection()
    }

    /// Delete the selected layer. A layer placed from an upload takes the
    /// upload and every other layer placed from it along. Returns the removed ids.
    pub fn delete_selected(&mut self) -> Result<Vec<LayerId>> {
        let idx = self.active_index()?;
        let id = match self.surface.selection() {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };
        if let Some(handle) = self.uploads.owner_of(id).cloned() {
            return self.remove_upload(&handle);
        }
        let removed = match tolerate_missing(self.views[idx].store.remove_layer(id))? {
            Some(layer) => vec![layer.id],
            None => Vec::new(),
        };
        self.surface.clear_selection();
        self.reflect_current();
        Ok(removed)
    }

    pub fn handle_key(&mut self, key: &str) -> Result<Vec<LayerId>> {
        match self.surface.key_command(key) {
            Some(SurfaceCommand::Delete(_)) => self.delete_selected(),
            None => Ok(Vec::new()),
        }
    }

    /// `false` when nothing is selected or the layer is already at the boundary.
    pub fn reorder_selected(&mut self, direction: ReorderDirection) -> Result<bool> {
        let idx = self.active_index()?;
        let id = match self.surface.selection() {
            Some(id) => id,
            None => return Ok(false),
        };
        let moved = tolerate_missing(self.views[idx].store.reorder(id, direction))?.unwrap_or(false);
        self.reflect_current();
        Ok(moved)
    }

    /// New flip flag of the selected layer, `None` when nothing is selected.
    pub fn flip_selected(&mut self) -> Result<Option<bool>> {
        let idx = self.active_index()?;
        let id = match self.surface.selection() {
            Some(id) => id,
            None => return Ok(None),
        };
        let flipped = tolerate_missing(self.views[idx].store.flip_horizontal(id))?;
        self.reflect_current();
        Ok(flipped)
    }

    // ---- uploads ----

    pub fn register_upload(&mut self, file: &FileCandidate) -> Result<AssetHandle> {
        self.uploads.register(&self.config, &mut self.library, file)
    }

    /// One result per file; a rejected file does not affect the others.
    pub fn register_uploads(&mut self, files: &[FileCandidate]) -> Vec<Result<AssetHandle>> {
        files.iter().map(|file| self.register_upload(file)).collect()
    }

    pub fn thumbnails(&self) -> Result<Vec<ThumbnailInfo>> {
        self.uploads.thumbnails()
    }

    /// Drop an upload and every layer placed from it, on every view.
    pub fn remove_upload(&mut self, handle: &AssetHandle) -> Result<Vec<LayerId>> {
        self.ensure_idle()?;
        let cascade = self.uploads.remove(handle)?;
        let removed = self.apply_cascade(&cascade);
        self.library.remove(handle);
        self.reflect_current();
        Ok(removed)
    }

    fn apply_cascade(&mut self, cascade: &CascadeRemoval) -> Vec<LayerId> {
        let mut removed = Vec::new();
        for view in &mut self.views {
            let gone = view.store.remove_all(&cascade.layers);
            if !gone.is_empty() {
                log::debug!("cascade from {} removed {} layers on {}", cascade.handle, gone.len(), view.view());
            }
            removed.extend(gone);
        }
        removed
    }

    // ---- zoom ----

    pub fn zoom_in(&mut self) -> f64 {
        self.surface.zoom_mut().zoom_in()
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.surface.zoom_mut().zoom_out()
    }

    pub fn set_zoom(&mut self, level: f64) -> f64 {
        self.surface.zoom_mut().set(level)
    }

    pub fn zoom_level(&self) -> f64 {
        self.surface.zoom().level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bucket;
    use image::{Rgba, RgbaImage};
    use std::rc::Rc;

    fn loaded(request: &BackgroundRequest) -> Result<LoadedBackground> {
        Ok(LoadedBackground {
            key: request.key.clone(),
            bucket: request.bucket,
            fallback: false,
            image: Rc::new(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))),
        })
    }

    fn mounted() -> MockupEngine {
        let mut engine = MockupEngine::new(EngineConfig::default());
        let request = engine.mount(ProductKind::apparel("tee"), VariantDescriptor::named("Navy")).unwrap();
        let result = loaded(&request);
        engine.complete_background(request, result);
        engine
    }

    #[test]
    fn edits_need_a_mounted_product() {
        let mut engine = MockupEngine::new(EngineConfig::default());
        assert!(matches!(engine.add_text_layer(None), Err(EngineError::NotMounted)));
        assert_eq!(engine.variant_changed(VariantDescriptor::named("Red")).unwrap(), None);
    }

    #[test]
    fn edits_refused_mid_switch() {
        let mut engine = mounted();
        let request = engine.begin_switch(&ViewId::new("back")).unwrap();
        assert!(engine.is_switching());
        assert!(matches!(engine.add_text_layer(None), Err(EngineError::SwitchInProgress)));
        assert!(matches!(engine.begin_switch(&ViewId::new("front")), Err(EngineError::SwitchInProgress)));
        let result = loaded(&request);
        assert!(matches!(engine.complete_background(request, result), BackgroundOutcome::Applied { .. }));
        assert!(engine.add_text_layer(None).is_ok());
    }

    #[test]
    fn superseded_request_is_stale() {
        let mut engine = mounted();
        let first = engine.variant_changed(VariantDescriptor::named("Crimson")).unwrap().unwrap();
        let second = engine.variant_changed(VariantDescriptor::named("Forest")).unwrap().unwrap();
        let late = loaded(&first);
        assert_eq!(engine.complete_background(first, late), BackgroundOutcome::Stale);
        let fresh = loaded(&second);
        assert_eq!(
            engine.complete_background(second, fresh),
            BackgroundOutcome::Applied { view: ViewId::new("front"), bucket: Bucket::Green, fallback: false }
        );
    }

    #[test]
    fn new_layers_are_selected() {
        let mut engine = mounted();
        let id = engine.add_text_layer(Some("hi")).unwrap();
        assert_eq!(engine.selected(), Some(id));
        assert_eq!(engine.handle_key("Escape").unwrap(), Vec::new());
        assert_eq!(engine.handle_key("Delete").unwrap(), vec![id]);
        assert_eq!(engine.selected(), None);
        assert_eq!(engine.flip_selected().unwrap(), None);
    }

    #[test]
    fn unknown_view_and_asset() {
        let mut engine = mounted();
        assert!(matches!(engine.begin_switch(&ViewId::new("left_sleeve")), Err(EngineError::UnknownView(_))));
        assert!(!engine.is_switching());
        assert!(matches!(engine.add_image_layer(&AssetHandle::new("nope")), Err(EngineError::UnknownAsset(_))));
        assert!(matches!(engine.add_layer_from_upload(&AssetHandle::new("nope")), Err(EngineError::UnknownUpload(_))));
    }

    #[test]
    fn missing_layer_edits_are_noops() {
        let mut engine = mounted();
        assert_eq!(engine.update_transform(LayerId(77), LayerTransform::centered(1.0, 1.0, 1.0)).unwrap(), None);
        assert!(!engine.update_text(LayerId(77), "x").unwrap());
    }
}
