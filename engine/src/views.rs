//! Per-view state and the background request bookkeeping used when views or
//! variants change.

use serde::{Serialize, Deserialize};

use crate::color;
use crate::config::{EngineConfig, SurfaceSize};
use crate::layers::{LayerIds, LayerStore};
use crate::objects::DesignLayer;
use crate::types::{AssetHandle, Bucket, ProductKind, VariantDescriptor, ViewId};

/// What the surface should show behind the layers of a view.
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackgroundState {
    Unloaded,
    Loading { bucket: Bucket, key: String },
    Ready { handle: AssetHandle, bucket: Bucket, fallback: bool },
    /// Both the primary and the fallback template failed; shown as "template unavailable".
    Unavailable { tried: Vec<String> },
}

impl BackgroundState {
    pub fn handle(&self) -> Option<&AssetHandle> {
        match self {
            BackgroundState::Ready { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

/// A background load, addressed by view and classified bucket.
/// `generation` orders requests so late answers to superseded ones can be dropped.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct BackgroundRequest {
    pub view: ViewId,
    pub bucket: Bucket,
    pub key: String,
    pub fallback: Option<(Bucket, String)>,
    pub generation: u64,
}

impl BackgroundRequest {
    pub fn plan(
        config: &EngineConfig,
        product: &ProductKind,
        view: &ViewId,
        variant: &VariantDescriptor,
        generation: u64,
    ) -> Self {
        let bucket = color::classify(variant);
        let key = config.template_key(product, bucket, view);
        let fallback = (bucket != config.fallback_bucket).then(|| {
            (config.fallback_bucket, config.template_key(product, config.fallback_bucket, view))
        });
        BackgroundRequest { view: view.clone(), bucket, key, fallback, generation }
    }

    /// Keys to probe in order: `(key, bucket, is_fallback)`.
    pub fn candidates(&self) -> Vec<(&str, Bucket, bool)> {
        let mut keys = vec![(self.key.as_str(), self.bucket, false)];
        if let Some((bucket, key)) = &self.fallback {
            keys.push((key.as_str(), *bucket, true));
        }
        keys
    }
}

/// Result of handing a finished load back to the engine.
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackgroundOutcome {
    Applied { view: ViewId, bucket: Bucket, fallback: bool },
    Unavailable { view: ViewId, tried: Vec<String> },
    /// A newer request superseded this one; nothing changed.
    Stale,
}

/// Serializable layers of one view, handed to the order collaborator.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ViewSnapshot {
    pub view: ViewId,
    pub layers: Vec<DesignLayer>,
    #[serde(default)]
    pub background: Option<AssetHandle>,
}

#[derive(Debug)]
pub struct ViewState {
    pub(crate) store: LayerStore,
    pub(crate) background: BackgroundState,
}

impl ViewState {
    pub fn new(view: ViewId, surface: SurfaceSize, ids: LayerIds) -> Self {
        ViewState { store: LayerStore::new(view, surface, ids), background: BackgroundState::Unloaded }
    }

    pub fn view(&self) -> &ViewId {
        self.store.view()
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn background(&self) -> &BackgroundState {
        &self.background
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            view: self.view().clone(),
            layers: self.store.snapshot(),
            background: self.background.handle().cloned(),
        }
    }
}
