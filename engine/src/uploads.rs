//! User-imported images: validation, thumbnails, and the link from each upload
//! to the layers placed from it.

use std::collections::BTreeSet;
use std::rc::Rc;

use image::RgbaImage;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::io::{encode_data_url, encode_png};
use crate::resolver::{content_digest, decode_bytes, AssetLibrary};
use crate::types::{AssetHandle, LayerId};

/// A file as handed over by the page's file picker.
#[derive(Clone, Debug)]
pub struct FileCandidate {
    pub name: String,
    /// Declared MIME type; guessed from `name` when absent.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileCandidate {
    pub fn new(name: &str, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        FileCandidate { name: name.to_string(), mime: mime.map(str::to_string), bytes }
    }
}

fn rejected(file: &FileCandidate, reason: String) -> EngineError {
    EngineError::UploadRejected { file: file.name.clone(), reason }
}

/// Type and size checks done before any decoding. Returns the effective MIME type.
pub fn validate_file(config: &EngineConfig, file: &FileCandidate) -> Result<String> {
    let mime = file
        .mime
        .as_deref()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .or_else(|| mime_guess::from_path(&file.name).first_raw().map(str::to_string))
        .ok_or_else(|| rejected(file, "unknown file type".to_string()))?;
    if !config.accepted_mime_types.iter().any(|m| *m == mime) {
        return Err(rejected(file, format!("unsupported type {}", mime)));
    }
    if file.bytes.is_empty() {
        return Err(rejected(file, "file is empty".to_string()));
    }
    if file.bytes.len() > config.max_upload_bytes {
        return Err(rejected(
            file,
            format!("file is {} bytes, limit is {} bytes", file.bytes.len(), config.max_upload_bytes),
        ));
    }
    Ok(mime)
}

#[derive(Debug)]
pub struct UploadEntry {
    pub handle: AssetHandle,
    pub file_name: String,
    pub thumbnail: RgbaImage,
    /// Layers (on any view) placed from this upload.
    pub thumbnail_of: BTreeSet<LayerId>,
}

/// What the UI needs to draw the thumbnail strip.
#[derive(Serialize, Clone, Debug)]
pub struct ThumbnailInfo {
    pub handle: AssetHandle,
    pub file_name: String,
    pub data_url: String,
    pub layers: Vec<LayerId>,
}

/// Sent to the layer stores when an upload goes away.
#[derive(Clone, PartialEq, Debug)]
pub struct CascadeRemoval {
    pub handle: AssetHandle,
    pub layers: BTreeSet<LayerId>,
}

fn thumbnail_size(width: u32, height: u32, edge: u32) -> (u32, u32) {
    if width <= edge && height <= edge {
        return (width.max(1), height.max(1));
    }
    let ratio = edge as f64 / width.max(height) as f64;
    (((width as f64 * ratio).round() as u32).max(1), ((height as f64 * ratio).round() as u32).max(1))
}

#[derive(Debug, Default)]
pub struct UploadRegistry {
    entries: Vec<UploadEntry>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, decode, and keep the full image in `library` plus a thumbnail here.
    /// Registering the same bytes again returns the existing handle.
    pub fn register(&mut self, config: &EngineConfig, library: &mut AssetLibrary, file: &FileCandidate) -> Result<AssetHandle> {
        validate_file(config, file)?;
        let handle = AssetHandle::upload(&content_digest(&file.bytes));
        if self.contains(&handle) {
            log::debug!("'{}' is already registered as {}", file.name, handle);
            return Ok(handle);
        }
        let image = decode_bytes(&file.bytes).map_err(|e| rejected(file, format!("not a readable image ({})", e)))?;
        let (tw, th) = thumbnail_size(image.width(), image.height(), config.thumbnail_edge);
        let thumbnail = image::imageops::thumbnail(&image, tw, th);
        library.insert(handle.clone(), Rc::new(image));
        self.entries.push(UploadEntry {
            handle: handle.clone(),
            file_name: file.name.clone(),
            thumbnail,
            thumbnail_of: BTreeSet::new(),
        });
        log::info!("registered upload {} from '{}'", handle, file.name);
        Ok(handle)
    }

    pub fn entries(&self) -> &[UploadEntry] {
        &self.entries
    }

    pub fn entry(&self, handle: &AssetHandle) -> Option<&UploadEntry> {
        self.entries.iter().find(|e| e.handle == *handle)
    }

    pub fn contains(&self, handle: &AssetHandle) -> bool {
        self.entry(handle).is_some()
    }

    pub fn link(&mut self, handle: &AssetHandle, layer: LayerId) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.handle == *handle)
            .ok_or_else(|| EngineError::UnknownUpload(handle.clone()))?;
        entry.thumbnail_of.insert(layer);
        Ok(())
    }

    /// Forget layers that were deleted without removing their upload.
    pub fn unlink(&mut self, layers: &[LayerId]) {
        for entry in &mut self.entries {
            for id in layers {
                entry.thumbnail_of.remove(id);
            }
        }
    }

    pub fn owner_of(&self, layer: LayerId) -> Option<&AssetHandle> {
        self.entries.iter().find(|e| e.thumbnail_of.contains(&layer)).map(|e| &e.handle)
    }

    pub fn remove(&mut self, handle: &AssetHandle) -> Result<CascadeRemoval> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.handle == *handle)
            .ok_or_else(|| EngineError::UnknownUpload(handle.clone()))?;
        let entry = self.entries.remove(pos);
        log::info!("removed upload {} ({} linked layers)", entry.handle, entry.thumbnail_of.len());
        Ok(CascadeRemoval { handle: entry.handle, layers: entry.thumbnail_of })
    }

    pub fn thumbnails(&self) -> Result<Vec<ThumbnailInfo>> {
        self.entries
            .iter()
            .map(|e| {
                Ok(ThumbnailInfo {
                    handle: e.handle.clone(),
                    file_name: e.file_name.clone(),
                    data_url: encode_data_url(&encode_png(&e.thumbnail)?, "image/png"),
                    layers: e.thumbnail_of.iter().copied().collect(),
                })
            })
            .collect()
    }
}
