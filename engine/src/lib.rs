//! Multi-view product mockup canvas.
//!
//! [`MockupEngine`] keeps an independent layer set per product view, loads the
//! background template matching the selected color variant, and flattens the
//! active view to an image. [`MockupTool`] exposes it to the browser.

pub mod types;
pub mod error;
pub mod config;
pub mod color;
pub mod objects;
pub mod layers;
pub mod zoom;
pub mod resolver;
pub mod views;
pub mod uploads;
pub mod render;
pub mod selection;
pub mod engine;
pub mod commands;
pub mod io;
pub mod wasm;

pub use config::{EngineConfig, SurfaceSize};
pub use engine::MockupEngine;
pub use error::{EngineError, Result};
pub use objects::{DesignLayer, LayerTransform};
pub use resolver::{AssetLibrary, AssetProbe, AssetResolver, MemoryAssetStore, UserAssetSource};
pub use types::*;
pub use uploads::FileCandidate;
pub use views::{BackgroundOutcome, BackgroundRequest, BackgroundState, ViewSnapshot};
pub use wasm::MockupTool;
