/// Ranking Module
///
/// Model-based ordering of unseen catalog items for one user.
///
/// # Workflow
/// 1. Base vector: calibration vector, else blend of session and ideal vectors
/// 2. Retrieve the `retrieve_k` nearest unseen items from the similarity index
/// 3. Fused score: 0.4 x cosine(item, base) + 0.6 x attribute affinity
/// 4. Diversity reranking (MMR) happens afterwards in the diversity layer
use crate::models::ScoringBreakdown;
use crate::services::catalog::Catalog;
use crate::services::profile::{AttributePreferences, UserProfile};
use crate::services::similarity::SimilarityIndex;
use crate::utils::{cosine_similarity, unit_vector};
use ndarray::Array1;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const DEFAULT_RETRIEVE_K: usize = 300;

const EMBEDDING_WEIGHT: f32 = 0.4;
const ATTRIBUTE_WEIGHT: f32 = 0.6;
/// Session / ideal blend when both exist
const SESSION_SHARE: f32 = 0.5;

/// Ranking Layer - fused embedding + attribute scoring
pub struct RankingLayer {
    retrieve_k: usize,
}

impl Default for RankingLayer {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIEVE_K)
    }
}

impl RankingLayer {
    pub fn new(retrieve_k: usize) -> Self {
        Self {
            retrieve_k: retrieve_k.max(1),
        }
    }

    /// Mean vector of items matching the user's top type AND top color,
    /// falling back to items matching either. `None` without attribute signal.
    pub fn ideal_vector(catalog: &Catalog, prefs: &AttributePreferences) -> Option<Array1<f32>> {
        let top_type = prefs.top_type();
        let top_color = prefs.top_color();
        if top_type.is_none() && top_color.is_none() {
            return None;
        }

        let matching = |require_both: bool| -> Vec<usize> {
            (0..catalog.len())
                .filter(|&idx| {
                    let attrs = catalog.attributes(idx);
                    let type_hit = top_type.is_some_and(|t| attrs.item_type == t);
                    let color_hit = top_color.is_some_and(|c| attrs.color == c);
                    if require_both {
                        type_hit && color_hit
                    } else {
                        type_hit || color_hit
                    }
                })
                .collect()
        };

        let mut indices = matching(true);
        if indices.is_empty() {
            indices = matching(false);
        }
        catalog.mean_of(indices)
    }

    /// Query vector for retrieval; `None` means cold start
    pub fn base_vector(catalog: &Catalog, profile: &UserProfile) -> Option<Array1<f32>> {
        if let Some(calibration) = &profile.calibration_vector {
            return Some(calibration.clone());
        }

        let ideal = Self::ideal_vector(catalog, &profile.preferences);
        match (profile.session_vector.as_ref(), ideal) {
            (Some(session), Some(ideal)) => {
                Some(session * SESSION_SHARE + ideal * (1.0 - SESSION_SHARE))
            }
            (Some(session), None) => Some(session.clone()),
            (None, ideal) => ideal,
        }
    }

    /// Score components of one item against a profile and its base vector
    pub fn score_item(
        catalog: &Catalog,
        prefs: &AttributePreferences,
        base: Option<&Array1<f32>>,
        idx: usize,
    ) -> ScoringBreakdown {
        let attribute_score = prefs.affinity(catalog.attributes(idx));
        let embedding_similarity = base
            .filter(|b| b.len() == catalog.dim())
            .map(|b| cosine_similarity(catalog.vector(idx), b.view()))
            .unwrap_or(0.0);

        ScoringBreakdown {
            attribute_score,
            embedding_similarity,
            final_combined_score: fused_score(embedding_similarity, attribute_score),
        }
    }

    /// Candidates nearest to `base`, excluding `exclude`, sorted by fused
    /// score descending (retrieval order breaks ties).
    ///
    /// Returns `None` when `base` has no direction, so the caller can fall
    /// back to cold-start sampling.
    pub fn rank(
        &self,
        catalog: &Catalog,
        index: &dyn SimilarityIndex,
        prefs: &AttributePreferences,
        base: &Array1<f32>,
        exclude: &HashSet<usize>,
    ) -> Option<Vec<usize>> {
        let query = unit_vector(base.view())?;
        let k = self.retrieve_k.min(catalog.len());

        let mut scored: Vec<(usize, f32)> = index
            .top_k(query.view(), k, exclude)
            .into_iter()
            .map(|hit| {
                let affinity = prefs.affinity(catalog.attributes(hit.index));
                (hit.index, fused_score(hit.score, affinity))
            })
            .collect();

        // Note: NaN scores are treated as equal; the sort is stable
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Some(scored.into_iter().map(|(idx, _)| idx).collect())
    }
}

fn fused_score(embedding_similarity: f32, attribute_score: f32) -> f32 {
    EMBEDDING_WEIGHT * embedding_similarity + ATTRIBUTE_WEIGHT * attribute_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;
    use crate::services::similarity::ExactScanIndex;
    use ndarray::array;
    use std::sync::Arc;

    fn item(id: &str, item_type: &str, color: &str) -> Item {
        Item {
            id: id.to_string(),
            name: id.to_string(),
            brand: None,
            color: Some(color.to_string()),
            item_type: Some(item_type.to_string()),
            price: None,
            url: format!("https://shop.example/{}", id),
            image_url: None,
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(
                vec![
                    item("d-black", "dress", "black"),
                    item("d-red", "dress", "red"),
                    item("t-black", "top", "black"),
                    item("t-white", "top", "white"),
                ],
                array![[1.0f32, 0.0, 0.0], [0.8, 0.6, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_ideal_vector_prefers_intersection() {
        let catalog = catalog();
        let mut prefs = AttributePreferences::default();
        prefs.item_type.insert("dress".into(), 2.0);
        prefs.color.insert("black".into(), 1.0);

        let ideal = RankingLayer::ideal_vector(&catalog, &prefs).unwrap();
        assert_eq!(ideal, catalog.vector(0).to_owned());
    }

    #[test]
    fn test_ideal_vector_falls_back_to_union() {
        let catalog = catalog();
        let mut prefs = AttributePreferences::default();
        prefs.item_type.insert("top".into(), 1.0);
        prefs.color.insert("red".into(), 1.0);

        // No red top: mean of both tops and the red dress
        let ideal = RankingLayer::ideal_vector(&catalog, &prefs).unwrap();
        let expected = catalog.mean_of(vec![1, 2, 3]).unwrap();
        assert_eq!(ideal, expected);

        assert!(RankingLayer::ideal_vector(&catalog, &AttributePreferences::default()).is_none());
    }

    #[test]
    fn test_base_vector_precedence() {
        let catalog = catalog();
        let mut profile = UserProfile::default();
        assert!(RankingLayer::base_vector(&catalog, &profile).is_none());

        profile.session_vector = Some(array![0.0f32, 2.0, 0.0]);
        assert_eq!(
            RankingLayer::base_vector(&catalog, &profile),
            Some(array![0.0f32, 2.0, 0.0])
        );

        profile.preferences.item_type.insert("dress".into(), 1.0);
        profile.preferences.color.insert("black".into(), 1.0);
        assert_eq!(
            RankingLayer::base_vector(&catalog, &profile),
            Some(array![0.5f32, 1.0, 0.0])
        );

        profile.calibration_vector = Some(array![0.0f32, 0.0, 1.0]);
        assert_eq!(
            RankingLayer::base_vector(&catalog, &profile),
            Some(array![0.0f32, 0.0, 1.0])
        );
    }

    #[test]
    fn test_rank_fuses_attribute_affinity() {
        let catalog = catalog();
        let index = ExactScanIndex::new(Arc::clone(&catalog));
        let layer = RankingLayer::default();
        let base = array![1.0f32, 0.0, 0.0];

        // Pure embedding order
        let prefs = AttributePreferences::default();
        let ranked = layer.rank(&catalog, &index, &prefs, &base, &HashSet::new()).unwrap();
        assert_eq!(ranked, vec![0, 1, 2, 3]);

        // A strong white preference lifts the white top to the front
        let mut prefs = AttributePreferences::default();
        prefs.color.insert("white".into(), 2.0);
        let exclude: HashSet<usize> = [1].into_iter().collect();
        let ranked = layer.rank(&catalog, &index, &prefs, &base, &exclude).unwrap();
        assert_eq!(ranked, vec![3, 0, 2]);
    }

    #[test]
    fn test_rank_respects_retrieve_k_and_zero_base() {
        let catalog = catalog();
        let index = ExactScanIndex::new(Arc::clone(&catalog));
        let prefs = AttributePreferences::default();

        let ranked = RankingLayer::new(2)
            .rank(&catalog, &index, &prefs, &array![1.0f32, 0.0, 0.0], &HashSet::new())
            .unwrap();
        assert_eq!(ranked, vec![0, 1]);

        let zero = array![0.0f32, 0.0, 0.0];
        assert!(RankingLayer::default()
            .rank(&catalog, &index, &prefs, &zero, &HashSet::new())
            .is_none());
    }

    #[test]
    fn test_score_item_breakdown() {
        let catalog = catalog();
        let mut prefs = AttributePreferences::default();
        prefs.item_type.insert("dress".into(), 1.0);
        let base = array![2.0f32, 0.0, 0.0];

        let breakdown = RankingLayer::score_item(&catalog, &prefs, Some(&base), 1);
        assert!((breakdown.attribute_score - 1.2).abs() < 1e-5);
        assert!((breakdown.embedding_similarity - 0.8).abs() < 1e-5);
        assert!((breakdown.final_combined_score - (0.4 * 0.8 + 0.6 * 1.2)).abs() < 1e-5);

        let cold = RankingLayer::score_item(&catalog, &prefs, None, 1);
        assert_eq!(cold.embedding_similarity, 0.0);
    }
}
