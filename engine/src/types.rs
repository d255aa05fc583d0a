use serde::{Serialize, Deserialize};
use std::fmt;

/// Identifier of a placed design layer. Unique across every view of a mounted product.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One physical side of a product, e.g. `front` or `back`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[serde(transparent)]
pub struct ViewId(String);

impl ViewId {
    pub fn new(id: impl Into<String>) -> Self {
        ViewId(id.into().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Title-cased name used in template keys (`front` -> `Front`).
    pub fn display_name(&self) -> String {
        self.0
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&str> for ViewId {
    fn from(id: &str) -> Self {
        ViewId::new(id)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a background template or a user-supplied image.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        AssetHandle(raw.into())
    }

    pub(crate) fn template(key: &str) -> Self {
        AssetHandle(format!("template:{}", key))
    }

    /// Uploads and user assets are addressed by a digest of their bytes, so a
    /// handle in a saved snapshot names the same image in any session.
    pub(crate) fn upload(digest: &str) -> Self {
        AssetHandle(format!("upload:{}", digest))
    }

    pub(crate) fn user(digest: &str) -> Self {
        AssetHandle(format!("asset:{}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_upload(&self) -> bool {
        self.0.starts_with("upload:")
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Image,
    Text,
}

/// Color family used to pick a background template.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Bucket {
    White,
    Black,
    Gray,
    Red,
    Blue,
    Beige,
    Green,
    Yellow,
    Pink,
    Purple,
}

impl Bucket {
    pub fn name(self) -> &'static str {
        match self {
            Bucket::White => "White",
            Bucket::Black => "Black",
            Bucket::Gray => "Gray",
            Bucket::Red => "Red",
            Bucket::Blue => "Blue",
            Bucket::Beige => "Beige",
            Bucket::Green => "Green",
            Bucket::Yellow => "Yellow",
            Bucket::Pink => "Pink",
            Bucket::Purple => "Purple",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The selected color/material option, as supplied by the product service.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Default)]
pub struct VariantDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "colorSample")]
    pub color_sample: Option<String>,
}

impl VariantDescriptor {
    pub fn named(name: &str) -> Self {
        VariantDescriptor { name: name.to_string(), color_sample: None }
    }

    pub fn sampled(name: &str, sample: &str) -> Self {
        VariantDescriptor { name: name.to_string(), color_sample: Some(sample.to_string()) }
    }
}

/// A product type and the ordered list of views it can be designed on.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct ProductKind {
    pub name: String,
    pub views: Vec<ViewId>,
}

impl ProductKind {
    pub fn new(name: &str, views: &[&str]) -> Self {
        ProductKind { name: name.to_string(), views: views.iter().map(|v| ViewId::new(*v)).collect() }
    }

    /// Flat goods (mugs, posters, stickers) have a single printable side.
    pub fn flat(name: &str) -> Self {
        Self::new(name, &["front"])
    }

    pub fn apparel(name: &str) -> Self {
        Self::new(name, &["front", "back"])
    }

    pub fn first_view(&self) -> Option<&ViewId> {
        self.views.first()
    }

    pub fn has_view(&self, view: &ViewId) -> bool {
        self.views.contains(view)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ReorderDirection {
    Forward,
    Backward,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_display_name_is_title_cased() {
        assert_eq!(ViewId::new(" Front ").as_str(), "front");
        assert_eq!(ViewId::new("front").display_name(), "Front");
        assert_eq!(ViewId::new("left_sleeve").display_name(), "Left Sleeve");
    }

    #[test]
    fn product_constructors() {
        assert_eq!(ProductKind::flat("mug").views.len(), 1);
        let shirt = ProductKind::apparel("tshirt");
        assert_eq!(shirt.first_view(), Some(&ViewId::new("front")));
        assert!(shirt.has_view(&ViewId::new("back")));
    }

    #[test]
    fn variant_accepts_camel_case_sample() {
        let v: VariantDescriptor = serde_json::from_str(r##"{"name":"","colorSample":"#fff"}"##).unwrap();
        assert_eq!(v.color_sample.as_deref(), Some("#fff"));
    }
}
