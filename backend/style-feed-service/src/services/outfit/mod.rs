use crate::services::catalog::Catalog;
use std::collections::HashSet;

/// Normalized type -> complementary types
const PAIRINGS: &[(&str, &[&str])] = &[
    ("top", &["pants", "skirt", "shorts"]),
    ("jacket", &["pants", "jeans", "dress"]),
    ("sweater", &["pants", "skirt", "jeans"]),
    ("pants", &["top", "shoes", "sweater"]),
    ("jeans", &["top", "shoes", "jacket"]),
    ("dress", &["shoes", "bag", "accessory"]),
    ("shoes", &["dress", "pants", "jeans"]),
];

const SAME_BRAND_BONUS: f32 = 0.5;
const SIMILARITY_WEIGHT: f32 = 1.5;

/// Outfit Matcher - picks the best complementary item for a liked item
#[derive(Debug, Clone, Default)]
pub struct OutfitMatcher;

impl OutfitMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn complements(item_type: &str) -> &'static [&'static str] {
        PAIRINGS
            .iter()
            .find(|(kind, _)| *kind == item_type)
            .map(|(_, complements)| *complements)
            .unwrap_or(&[])
    }

    /// Best unseen complementary item for the item at `original`.
    ///
    /// Score = 0.5 x [same brand] + 1.5 x cosine. The first candidate in
    /// catalog order wins ties.
    pub fn find_complement(
        &self,
        catalog: &Catalog,
        original: usize,
        seen: &HashSet<String>,
    ) -> Option<usize> {
        let attrs = catalog.attributes(original);
        let complements = Self::complements(&attrs.item_type);
        if complements.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        for candidate in 0..catalog.len() {
            if candidate == original || seen.contains(&catalog.item(candidate).id) {
                continue;
            }
            let candidate_attrs = catalog.attributes(candidate);
            if !complements.contains(&candidate_attrs.item_type.as_str()) {
                continue;
            }

            let same_brand = !attrs.brand.is_empty() && attrs.brand == candidate_attrs.brand;
            let score = if same_brand { SAME_BRAND_BONUS } else { 0.0 }
                + SIMILARITY_WEIGHT * catalog.brute_force_score(original, candidate);

            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }

        best.map(|(idx, _)| idx)
    }
}
