//! Error types shared by every part of the mockup engine.

use thiserror::Error;

use crate::types::{AssetHandle, LayerId, ViewId};

/// Main error type for mockup engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// No background template could be loaded, even after the fallback retry
    #[error("Template unavailable for view '{view}' (tried: {})", tried.join(", "))]
    AssetNotFound { view: ViewId, tried: Vec<String> },

    /// A single storage key could not be fetched
    #[error("Asset '{0}' not found")]
    MissingKey(String),

    /// A file failed type/size/decode validation
    #[error("Upload '{file}' rejected: {reason}")]
    UploadRejected { file: String, reason: String },

    /// The referenced layer no longer exists
    #[error("Layer {0} not found")]
    LayerNotFound(LayerId),

    #[error("Unknown view '{0}'")]
    UnknownView(ViewId),

    #[error("Unknown upload '{0}'")]
    UnknownUpload(AssetHandle),

    #[error("Unknown asset '{0}'")]
    UnknownAsset(AssetHandle),

    /// Operation requires a mounted product
    #[error("No product mounted")]
    NotMounted,

    /// A view switch is still waiting on its background
    #[error("View switch in progress")]
    SwitchInProgress,

    /// Image decoding error
    #[error("Decode error: {0}")]
    Decode(String),

    /// Image or JSON encoding error
    #[error("Encode error: {0}")]
    Encode(String),

    /// Invalid configuration or command payload
    #[error("Config error: {0}")]
    Config(String),
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Decode(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
