//! Detection-response parsing.
//!
//! The first gateway call classifies the photograph so the main analysis can
//! use a specialized prompt. Like every model response, the answer may be a
//! clean JSON object or a sentence; parsing is lenient and anything
//! unrecognizable degrades to [`ItemCategory::Unrelated`], the neutral route.

use serde::Deserialize;

use super::parser::extract_json_object;
use super::types::ItemCategory;

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireDetection {
    category: Option<String>,
}

/// Parse the detection response into a category.
pub fn parse_detection_response(text: &str) -> ItemCategory {
    if let Some(json) = extract_json_object(text) {
        if let Ok(wire) = serde_json::from_str::<WireDetection>(json) {
            if let Some(label) = wire.category {
                if let Some(category) = category_from_label(&label) {
                    return category;
                }
            }
        }
    }
    scan_for_category(text).unwrap_or(ItemCategory::Unrelated)
}

fn category_from_label(label: &str) -> Option<ItemCategory> {
    match label.trim().to_lowercase().as_str() {
        "fruit" | "mango fruit" | "mango" => Some(ItemCategory::Fruit),
        "leaf" | "leaves" | "mango leaf" | "foliage" => Some(ItemCategory::Leaf),
        "unrelated" | "other" | "neither" | "none" => Some(ItemCategory::Unrelated),
        _ => None,
    }
}

/// Earliest keyword occurrence wins — "a mango fruit, not a leaf" mentions
/// both, and the leading mention is the model's actual answer.
fn scan_for_category(text: &str) -> Option<ItemCategory> {
    let lower = text.to_lowercase();
    const MARKERS: &[(&str, ItemCategory)] = &[
        ("unrelated", ItemCategory::Unrelated),
        ("not a mango", ItemCategory::Unrelated),
        ("no mango", ItemCategory::Unrelated),
        ("neither", ItemCategory::Unrelated),
        ("fruit", ItemCategory::Fruit),
        ("leaf", ItemCategory::Leaf),
        ("leaves", ItemCategory::Leaf),
        ("foliage", ItemCategory::Leaf),
    ];

    MARKERS
        .iter()
        .filter_map(|(marker, category)| lower.find(marker).map(|pos| (pos, *category)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, category)| category)
}
