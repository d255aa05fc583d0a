#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use mockup_engine::io::encode_png;
use mockup_engine::{AssetResolver, MemoryAssetStore};

pub const RED: Rgba<u8> = Rgba([200, 30, 30, 255]);
pub const BLUE: Rgba<u8> = Rgba([20, 40, 220, 255]);
pub const WHITE: Rgba<u8> = Rgba([250, 250, 250, 255]);

pub fn png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(width, height, color)).unwrap()
}

pub fn resolver(keys: &[&str]) -> AssetResolver<MemoryAssetStore> {
    let mut store = MemoryAssetStore::new();
    for key in keys {
        store.insert(key, png(12, 14, WHITE));
    }
    AssetResolver::new(store)
}
