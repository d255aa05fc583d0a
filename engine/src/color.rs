//! Variant-to-bucket classification.
//!
//! Pure and deterministic: the same descriptor always yields the same bucket,
//! and nothing here touches storage. Rules run in order:
//!
//! 1. keywords in the normalized variant name,
//! 2. exact known color-sample tokens,
//! 3. HSL thresholds on the color sample,
//! 4. `White`.

use crate::types::{Bucket, VariantDescriptor};

/// Checked top to bottom; the first bucket with a keyword starting any word of the name wins.
const NAME_KEYWORDS: &[(Bucket, &[&str])] = &[
    (Bucket::Red, &["red", "maroon", "crimson", "wine", "burgundy", "oxblood", "cherry", "scarlet", "cardinal", "brick"]),
    (Bucket::Pink, &["pink", "rose", "blush", "fuchsia", "magenta", "coral"]),
    (Bucket::Blue, &["blue", "navy", "royal", "sky", "cobalt", "azure", "indigo", "denim", "teal", "sapphire"]),
    (Bucket::Green, &["green", "olive", "forest", "mint", "sage", "lime", "emerald", "kelly"]),
    (Bucket::Yellow, &["yellow", "gold", "mustard", "lemon", "daisy"]),
    (Bucket::Purple, &["purple", "violet", "lavender", "plum", "lilac", "orchid"]),
    (Bucket::Beige, &["beige", "cream", "ivory", "sand", "khaki", "natural", "oatmeal", "camel", "bone"]),
    (Bucket::Black, &["black", "jet", "onyx", "ebony"]),
    (Bucket::Gray, &["gray", "grey", "heather", "silver", "charcoal", "slate", "graphite", "smoke"]),
    (Bucket::White, &["white", "snow", "pearl"]),
];

/// Canonical `#RRGGBB` tokens the HSL thresholds get wrong (both read as `White`).
const KNOWN_SAMPLES: &[(&str, Bucket)] = &[
    ("#F5F5DC", Bucket::Beige),
    ("#FFFDD0", Bucket::Beige),
];

pub fn classify(variant: &VariantDescriptor) -> Bucket {
    classify_name(&variant.name)
        .or_else(|| variant.color_sample.as_deref().and_then(classify_sample))
        .unwrap_or(Bucket::White)
}

/// Lowercase, trim, and replace punctuation with single spaces.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn classify_name(name: &str) -> Option<Bucket> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return None;
    }
    NAME_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            normalized.split(' ').any(|word| keywords.iter().any(|kw| word.starts_with(kw)))
        })
        .map(|(bucket, _)| *bucket)
}

pub fn classify_sample(token: &str) -> Option<Bucket> {
    let rgb = parse_hex(token)?;
    let canonical = format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2]);
    if let Some((_, bucket)) = KNOWN_SAMPLES.iter().find(|(t, _)| *t == canonical) {
        return Some(*bucket);
    }
    classify_hsl(rgb_to_hsl(rgb))
}

/// Parse `#rgb`, `rgb`, `#rrggbb` or `rrggbb`, expanding the shorthand form.
pub fn parse_hex(token: &str) -> Option<[u8; 3]> {
    let hex = token.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let value = u32::from_str_radix(&expanded, 16).ok()?;
    Some([((value >> 16) & 0xff) as u8, ((value >> 8) & 0xff) as u8, (value & 0xff) as u8])
}

/// Hue in degrees `[0, 360)`, saturation and lightness in percent.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

pub fn rgb_to_hsl(rgb: [u8; 3]) -> Hsl {
    let r = rgb[0] as f64 / 255.0;
    let g = rgb[1] as f64 / 255.0;
    let b = rgb[2] as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return Hsl { h: 0.0, s: 0.0, l: l * 100.0 };
    }
    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let h = if max == r {
        60.0 * (((g - b) / d).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    Hsl { h: h.rem_euclid(360.0), s: s * 100.0, l: l * 100.0 }
}

/// First matching threshold rule wins.
pub fn classify_hsl(hsl: Hsl) -> Option<Bucket> {
    let Hsl { h, s, l } = hsl;
    if l >= 90.0 {
        Some(Bucket::White)
    } else if l <= 12.0 {
        Some(Bucket::Black)
    } else if s <= 10.0 {
        Some(Bucket::Gray)
    } else if h >= 340.0 || h <= 20.0 {
        Some(Bucket::Red)
    } else if (200.0..=260.0).contains(&h) {
        Some(Bucket::Blue)
    } else if (30.0..=60.0).contains(&h) && l >= 60.0 && s <= 60.0 {
        Some(Bucket::Beige)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_keywords() {
        assert_eq!(classify(&VariantDescriptor::named("Oxblood Maroon")), Bucket::Red);
        assert_eq!(classify(&VariantDescriptor::named("  Heather NAVY!! ")), Bucket::Blue);
        assert_eq!(classify(&VariantDescriptor::named("Royal")), Bucket::Blue);
        assert_eq!(classify(&VariantDescriptor::named("Off-White")), Bucket::White);
    }

    #[test]
    fn keywords_match_word_starts_only() {
        assert_eq!(classify(&VariantDescriptor::named("Heathered Navy")), Bucket::Blue);
        assert_eq!(classify(&VariantDescriptor::named("Weathered Blue")), Bucket::Blue);
        assert_eq!(classify(&VariantDescriptor::named("Multicolored")), Bucket::White);
        assert_eq!(classify(&VariantDescriptor::named("Reddish Brown")), Bucket::Red);
        assert_eq!(classify(&VariantDescriptor::named("Navy/Red Stripe")), Bucket::Red);
    }

    #[test]
    fn token_table_only_overrides_light_beiges() {
        assert_eq!(classify_sample("#FFFDD0"), Some(Bucket::Beige));
        // charcoal has a blue hue and follows the threshold rules
        assert_eq!(classify_sample("#36454F"), Some(Bucket::Blue));
        assert_eq!(classify_sample("#000080"), Some(Bucket::Blue));
        assert_eq!(classify_sample("#D2B48C"), Some(Bucket::Beige));
    }

    #[test]
    fn red_name_beats_conflicting_sample() {
        for name in ["Wine", "crimson tide", "Sky Red", "maroon/gold"] {
            let variant = VariantDescriptor::sampled(name, "#1D4ED8");
            assert_eq!(classify(&variant), Bucket::Red, "{}", name);
        }
    }

    #[test]
    fn sample_rules() {
        assert_eq!(classify(&VariantDescriptor::sampled("", "#1D4ED8")), Bucket::Blue);
        assert_eq!(classify(&VariantDescriptor::sampled("", "#F5F5DC")), Bucket::Beige);
        assert_eq!(classify(&VariantDescriptor::sampled("", "#FFFFFF")), Bucket::White);
        assert_eq!(classify(&VariantDescriptor::sampled("", "#111")), Bucket::Black);
        assert_eq!(classify(&VariantDescriptor::sampled("", "#808080")), Bucket::Gray);
        assert_eq!(classify(&VariantDescriptor::sampled("", "#d12020")), Bucket::Red);
    }

    #[test]
    fn unmatched_defaults_to_white() {
        assert_eq!(classify(&VariantDescriptor::named("")), Bucket::White);
        assert_eq!(classify(&VariantDescriptor::named("Tie Dye")), Bucket::White);
        // green hue has no threshold rule
        assert_eq!(classify(&VariantDescriptor::sampled("", "#22aa22")), Bucket::White);
        assert_eq!(classify(&VariantDescriptor::sampled("", "not-a-color")), Bucket::White);
    }

    #[test]
    fn classification_is_idempotent() {
        for token in ["#abc", "ABCDEF", "#123456", "#fedcba", "#0f0", "#7f7f7f"] {
            let variant = VariantDescriptor::sampled("", token);
            let first = classify(&variant);
            for _ in 0..3 {
                assert_eq!(classify(&variant), first);
            }
        }
    }

    #[test]
    fn shorthand_expands() {
        assert_eq!(parse_hex("#abc"), Some([0xaa, 0xbb, 0xcc]));
        assert_eq!(parse_hex("abc"), parse_hex("#AABBCC"));
        assert_eq!(parse_hex("#abcd"), None);
        assert_eq!(parse_hex("#ggg"), None);
    }

    #[test]
    fn hsl_of_primaries() {
        let red = rgb_to_hsl([255, 0, 0]);
        assert_eq!((red.h, red.s, red.l), (0.0, 100.0, 50.0));
        let blue = rgb_to_hsl([0, 0, 255]);
        assert!((blue.h - 240.0).abs() < 1e-9);
    }
}
