//! Background template loading and user asset decoding.
//!
//! Classification (`color`) and request planning (`views`) are pure; this
//! module holds the fallible part: probing storage keys, decoding what comes
//! back, and caching decoded images for the session.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use image::RgbaImage;
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::io::decode_data_url;
use crate::types::{AssetHandle, Bucket, ProductKind, VariantDescriptor, ViewId};
use crate::views::BackgroundRequest;

/// Key-to-bytes lookup against asset storage. Single-threaded, so futures need not be `Send`.
#[async_trait(?Send)]
pub trait AssetProbe {
    /// A key that does not exist must yield `EngineError::MissingKey`.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// In-process storage, for preloaded templates and offline use.
#[derive(Default, Debug)]
pub struct MemoryAssetStore {
    entries: HashMap<String, Vec<u8>>,
    probed: RefCell<Vec<String>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, bytes: Vec<u8>) {
        self.entries.insert(key.to_string(), bytes);
    }

    pub fn with(mut self, key: &str, bytes: Vec<u8>) -> Self {
        self.insert(key, bytes);
        self
    }

    /// Every key fetched so far, in order.
    pub fn probed_keys(&self) -> Vec<String> {
        self.probed.borrow().clone()
    }
}

#[async_trait(?Send)]
impl AssetProbe for MemoryAssetStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        self.probed.borrow_mut().push(key.to_string());
        self.entries.get(key).cloned().ok_or_else(|| EngineError::MissingKey(key.to_string()))
    }
}

/// A background that decoded successfully.
#[derive(Clone, Debug)]
pub struct LoadedBackground {
    pub key: String,
    pub bucket: Bucket,
    /// True when the primary bucket failed and the fallback bucket was used.
    pub fallback: bool,
    pub image: Rc<RgbaImage>,
}

impl LoadedBackground {
    pub fn handle(&self) -> AssetHandle {
        AssetHandle::template(&self.key)
    }
}

pub struct AssetResolver<P> {
    probe: P,
    cache: RefCell<HashMap<String, Rc<RgbaImage>>>,
}

impl<P: AssetProbe> AssetResolver<P> {
    pub fn new(probe: P) -> Self {
        AssetResolver { probe, cache: RefCell::new(HashMap::new()) }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Fetch and decode one key. Successful loads are cached; misses are not,
    /// so a template uploaded later is picked up on the next request.
    async fn probe_load(&self, key: &str) -> Result<Rc<RgbaImage>> {
        if let Some(image) = self.cache.borrow().get(key) {
            return Ok(Rc::clone(image));
        }
        let bytes = self.probe.fetch(key).await?;
        let image = Rc::new(decode_bytes(&bytes)?);
        self.cache.borrow_mut().insert(key.to_string(), Rc::clone(&image));
        Ok(image)
    }

    /// Try the request's primary key, then its fallback key once.
    pub async fn load_background(&self, request: &BackgroundRequest) -> Result<LoadedBackground> {
        let mut tried = Vec::new();
        for (key, bucket, fallback) in request.candidates() {
            match self.probe_load(key).await {
                Ok(image) => {
                    if fallback {
                        log::warn!("template '{}' missing, using fallback '{}'", request.key, key);
                    }
                    return Ok(LoadedBackground { key: key.to_string(), bucket, fallback, image });
                }
                Err(e) => {
                    log::warn!("background probe '{}' failed: {}", key, e);
                    tried.push(key.to_string());
                }
            }
        }
        Err(EngineError::AssetNotFound { view: request.view.clone(), tried })
    }

    /// One-shot resolution outside the engine's request bookkeeping.
    pub async fn resolve_background(
        &self,
        config: &EngineConfig,
        product: &ProductKind,
        view: &ViewId,
        variant: &VariantDescriptor,
    ) -> Result<AssetHandle> {
        let request = BackgroundRequest::plan(config, product, view, variant, 0);
        self.load_background(&request).await.map(|loaded| loaded.handle())
    }
}

/// Raw file bytes or a `data:` URL.
#[derive(Clone, Debug)]
pub enum UserAssetSource {
    Bytes(Vec<u8>),
    DataUrl(String),
}

pub fn decode_bytes(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Leading 16 hex digits of the SHA-256 of `bytes`.
pub(crate) fn content_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        let _ = std::fmt::Write::write_fmt(&mut hex, format_args!("{:02x}", byte));
    }
    hex
}

impl UserAssetSource {
    /// Encoded image bytes, with a data URL's payload decoded.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match self {
            UserAssetSource::Bytes(bytes) => Ok(bytes.clone()),
            UserAssetSource::DataUrl(url) => decode_data_url(url),
        }
    }
}

/// Decoded images by handle, shared with the rasterizer. Lives for the page session.
#[derive(Default, Debug)]
pub struct AssetLibrary {
    images: HashMap<AssetHandle, Rc<RgbaImage>>,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: AssetHandle, image: Rc<RgbaImage>) {
        self.images.insert(handle, image);
    }

    pub fn get(&self, handle: &AssetHandle) -> Option<&Rc<RgbaImage>> {
        self.images.get(handle)
    }

    pub fn contains(&self, handle: &AssetHandle) -> bool {
        self.images.contains_key(handle)
    }

    pub fn dimensions(&self, handle: &AssetHandle) -> Option<(u32, u32)> {
        self.images.get(handle).map(|img| img.dimensions())
    }

    pub fn remove(&mut self, handle: &AssetHandle) -> Option<Rc<RgbaImage>> {
        self.images.remove(handle)
    }

    /// Decode a user-supplied image and keep it under its content handle.
    /// The same bytes always resolve to the same handle.
    pub fn resolve_user_asset(&mut self, source: &UserAssetSource) -> Result<AssetHandle> {
        let bytes = source.bytes()?;
        let handle = AssetHandle::user(&content_digest(&bytes));
        if !self.contains(&handle) {
            let image = decode_bytes(&bytes)?;
            self.insert(handle.clone(), Rc::new(image));
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{encode_data_url, encode_png};
    use image::Rgba;

    fn png(color: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(4, 2, Rgba(color))).unwrap()
    }

    #[test]
    fn user_asset_from_bytes_and_data_url() {
        let mut library = AssetLibrary::new();
        let a = library.resolve_user_asset(&UserAssetSource::Bytes(png([1, 2, 3, 255]))).unwrap();
        let url = encode_data_url(&png([9, 9, 9, 255]), "image/png");
        let b = library.resolve_user_asset(&UserAssetSource::DataUrl(url)).unwrap();
        assert_ne!(a, b);
        assert_eq!(library.dimensions(&a), Some((4, 2)));
        let again = library.resolve_user_asset(&UserAssetSource::Bytes(png([1, 2, 3, 255]))).unwrap();
        assert_eq!(again, a);
        assert_eq!(library.get(&b).unwrap().get_pixel(0, 0), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut library = AssetLibrary::new();
        let err = library.resolve_user_asset(&UserAssetSource::Bytes(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[tokio::test]
    async fn successful_loads_are_cached() {
        let store = MemoryAssetStore::new().with("tee/Red - Front", png([255, 0, 0, 255]));
        let resolver = AssetResolver::new(store);
        let config = EngineConfig::default();
        let product = ProductKind::apparel("tee");
        let variant = VariantDescriptor::named("Cherry");
        for _ in 0..2 {
            let handle = resolver.resolve_background(&config, &product, &ViewId::new("front"), &variant).await.unwrap();
            assert_eq!(handle.as_str(), "template:tee/Red - Front");
        }
        assert_eq!(resolver.probe().probed_keys(), vec!["tee/Red - Front".to_string()]);
    }
}
