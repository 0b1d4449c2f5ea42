use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Catalog product snapshot. Feature vectors live in the catalog's embedding
/// matrix, row-aligned with the item's catalog index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    pub url: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Swipe feedback for a single item
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FeedbackEvent {
    #[validate(length(min = 1, message = "user is required"))]
    #[serde(default)]
    pub user: String,
    #[validate(length(min = 1, message = "pid is required"))]
    #[serde(default)]
    pub pid: String,
    /// > 0 like, < 0 dislike
    #[serde(default)]
    pub like: i32,
    /// Observability only, never scored
    #[serde(default)]
    pub dwell_ms: u64,
    #[serde(default)]
    pub soft_like: bool,
    #[serde(default)]
    pub super_like: bool,
    #[serde(default)]
    pub saved: bool,
}

impl FeedbackEvent {
    pub fn is_positive(&self) -> bool {
        self.like > 0 || self.super_like
    }
}

/// Complementary item paired with the item that triggered it.
/// Both sides are held by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutfitSuggestion {
    pub is_outfit_suggestion: bool,
    pub original_item: Item,
    pub suggested_item: Item,
}

impl OutfitSuggestion {
    pub fn new(original_item: Item, suggested_item: Item) -> Self {
        Self {
            is_outfit_suggestion: true,
            original_item,
            suggested_item,
        }
    }
}

/// One slot in a recommendation pull
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedEntry {
    Outfit(OutfitSuggestion),
    Item(Item),
}

impl FeedEntry {
    /// Item that gets marked as seen once this entry is served
    pub fn served_item(&self) -> &Item {
        match self {
            FeedEntry::Outfit(suggestion) => &suggestion.suggested_item,
            FeedEntry::Item(item) => item,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalibrationResult {
    #[serde(rename = "found_items")]
    pub matched_count: usize,
}

/// Score components for one item against one user
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringBreakdown {
    pub attribute_score: f32,
    pub embedding_similarity: f32,
    pub final_combined_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetails {
    pub pid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub color: Option<String>,
    pub brand: Option<String>,
}

impl From<&Item> for ProductDetails {
    fn from(item: &Item) -> Self {
        Self {
            pid: item.id.clone(),
            name: item.name.clone(),
            item_type: item.item_type.clone(),
            color: item.color.clone(),
            brand: item.brand.clone(),
        }
    }
}

/// Read-only view of attribute preferences
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreferenceSnapshot {
    #[serde(rename = "type")]
    pub item_type: BTreeMap<String, f32>,
    pub color: BTreeMap<String, f32>,
    pub brand: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDebugView {
    pub product_details: ProductDetails,
    pub attr_prefs: PreferenceSnapshot,
    pub scoring_breakdown: ScoringBreakdown,
}
