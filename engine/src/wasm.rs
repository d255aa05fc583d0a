//! Browser binding. The page owns one `MockupTool` per mockup page and
//! supplies a `(key) => Promise<Uint8Array | null>` callback for template storage.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use js_sys::{Function, Promise, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::Clamped;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{CanvasRenderingContext2d, ImageData};

use crate::config::EngineConfig;
use crate::engine::MockupEngine;
use crate::error::{EngineError, Result};
use crate::resolver::{AssetProbe, AssetResolver, UserAssetSource};
use crate::types::{ProductKind, VariantDescriptor, ViewId};
use crate::uploads::FileCandidate;
use crate::views::BackgroundRequest;

fn to_js(e: EngineError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

pub struct JsAssetProbe {
    fetch: Function,
}

#[async_trait(?Send)]
impl AssetProbe for JsAssetProbe {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let missing = || EngineError::MissingKey(key.to_string());
        let pending = self.fetch.call1(&JsValue::NULL, &JsValue::from_str(key)).map_err(|_| missing())?;
        let value = JsFuture::from(Promise::resolve(&pending)).await.map_err(|_| missing())?;
        if value.is_null() || value.is_undefined() {
            return Err(missing());
        }
        Ok(Uint8Array::new(&value).to_vec())
    }
}

#[wasm_bindgen]
pub struct MockupTool {
    engine: Rc<RefCell<MockupEngine>>,
    resolver: Rc<AssetResolver<JsAssetProbe>>,
}

impl MockupTool {
    /// Resolves to the background outcome once the template has loaded (or failed).
    fn spawn_load(&self, request: BackgroundRequest) -> Promise {
        let engine = Rc::clone(&self.engine);
        let resolver = Rc::clone(&self.resolver);
        future_to_promise(async move {
            let result = resolver.load_background(&request).await;
            let outcome = engine.borrow_mut().complete_background(request, result);
            Ok(serde_wasm_bindgen::to_value(&outcome)?)
        })
    }
}

#[wasm_bindgen]
impl MockupTool {
    /// `config_json` may be empty for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, fetch_asset: Function) -> std::result::Result<MockupTool, JsValue> {
        console_error_panic_hook::set_once();
        let config = if config_json.trim().is_empty() {
            EngineConfig::default()
        } else {
            EngineConfig::from_json(config_json).map_err(to_js)?
        };
        Ok(MockupTool {
            engine: Rc::new(RefCell::new(MockupEngine::new(config))),
            resolver: Rc::new(AssetResolver::new(JsAssetProbe { fetch: fetch_asset })),
        })
    }

    pub fn mount(&self, product_json: &str, variant_json: &str) -> std::result::Result<Promise, JsValue> {
        let product: ProductKind = serde_json::from_str(product_json).map_err(|e| to_js(e.into()))?;
        let variant: VariantDescriptor = serde_json::from_str(variant_json).map_err(|e| to_js(e.into()))?;
        let request = self.engine.borrow_mut().mount(product, variant).map_err(to_js)?;
        Ok(self.spawn_load(request))
    }

    pub fn switch_view(&self, view: &str) -> std::result::Result<Promise, JsValue> {
        let request = self.engine.borrow_mut().begin_switch(&ViewId::new(view)).map_err(to_js)?;
        Ok(self.spawn_load(request))
    }

    pub fn variant_changed(&self, variant_json: &str) -> std::result::Result<Promise, JsValue> {
        let variant: VariantDescriptor = serde_json::from_str(variant_json).map_err(|e| to_js(e.into()))?;
        let request = self.engine.borrow_mut().variant_changed(variant).map_err(to_js)?;
        Ok(match request {
            Some(request) => self.spawn_load(request),
            None => Promise::resolve(&JsValue::NULL),
        })
    }

    pub fn reset_view(&self) -> std::result::Result<Promise, JsValue> {
        let request = self.engine.borrow_mut().reset_view().map_err(to_js)?;
        Ok(self.spawn_load(request))
    }

    pub fn execute_command(&self, cmd_json: &str) -> String {
        self.engine.borrow_mut().execute_command(cmd_json)
    }

    /// Returns the new upload handle; rejections carry the file name and reason.
    pub fn register_upload(&self, name: &str, mime: Option<String>, bytes: Vec<u8>) -> std::result::Result<String, JsValue> {
        let file = FileCandidate { name: name.to_string(), mime, bytes };
        let handle = self.engine.borrow_mut().register_upload(&file).map_err(to_js)?;
        Ok(handle.as_str().to_string())
    }

    pub fn add_user_asset(&self, data_url: &str) -> std::result::Result<String, JsValue> {
        let source = UserAssetSource::DataUrl(data_url.to_string());
        let handle = self.engine.borrow_mut().resolve_user_asset(&source).map_err(to_js)?;
        Ok(handle.as_str().to_string())
    }

    pub fn thumbnails(&self) -> std::result::Result<JsValue, JsValue> {
        let thumbnails = self.engine.borrow().thumbnails().map_err(to_js)?;
        Ok(serde_wasm_bindgen::to_value(&thumbnails)?)
    }

    pub fn selection_bounds(&self) -> std::result::Result<JsValue, JsValue> {
        let engine = self.engine.borrow();
        Ok(serde_wasm_bindgen::to_value(&engine.surface().selection_bounds())?)
    }

    pub fn export_png(&self) -> std::result::Result<Vec<u8>, JsValue> {
        self.engine.borrow().export_current_view().map_err(to_js)
    }

    pub fn export_data_url(&self) -> std::result::Result<String, JsValue> {
        self.engine.borrow().export_current_view_data_url().map_err(to_js)
    }

    pub fn export_snapshots(&self) -> std::result::Result<String, JsValue> {
        self.engine.borrow().export_snapshots_json().map_err(to_js)
    }

    pub fn restore_snapshots(&self, json: &str) -> std::result::Result<(), JsValue> {
        self.engine.borrow_mut().restore_snapshots_json(json).map_err(to_js)
    }

    /// Blit the zoomed preview of the active view onto a 2D context.
    pub fn draw(&self, ctx: &CanvasRenderingContext2d) -> std::result::Result<(), JsValue> {
        let engine = self.engine.borrow();
        let image = engine.surface().rasterize_preview(engine.library());
        let (width, height) = image.dimensions();
        let data = ImageData::new_with_u8_clamped_array_and_sh(Clamped(image.as_raw().as_slice()), width, height)?;
        ctx.put_image_data(&data, 0.0, 0.0)
    }
}
