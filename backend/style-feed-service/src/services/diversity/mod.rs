use crate::services::catalog::Catalog;

pub const DEFAULT_LAMBDA: f32 = 0.7;

/// Diversity Layer - MMR (Maximal Marginal Relevance) rerank
///
/// Relevance is the similarity to the first (highest fused score) candidate,
/// not to the query; the penalty is the max similarity to anything already
/// selected.
pub struct DiversityLayer {
    lambda: f32, // relevance vs diversity trade-off (0~1)
}

impl Default for DiversityLayer {
    fn default() -> Self {
        Self::new(DEFAULT_LAMBDA)
    }
}

impl DiversityLayer {
    pub fn new(lambda: f32) -> Self {
        Self {
            lambda: lambda.clamp(0.0, 1.0),
        }
    }

    pub fn lambda(&self) -> f32 {
        self.lambda
    }

    /// Rerank catalog indices for diversity.
    /// lambda = 1.0: relevance only
    /// lambda = 0.0: diversity only
    ///
    /// Returns `min(k, candidates.len())` distinct indices, always starting
    /// with `candidates[0]`. Ties go to the earlier candidate.
    pub fn rerank(&self, catalog: &Catalog, candidates: &[usize], k: usize) -> Vec<usize> {
        let Some(&anchor) = candidates.first() else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut selected = vec![anchor];
        let mut remaining: Vec<usize> = candidates[1..].to_vec();

        // max similarity of each remaining candidate to the selected set
        let mut redundancy: Vec<f32> = remaining
            .iter()
            .map(|&c| catalog.brute_force_score(c, anchor))
            .collect();

        // MMR greedy selection
        while selected.len() < k && !remaining.is_empty() {
            let mut best_pos = 0;
            let mut best_mmr_score = f32::NEG_INFINITY;

            for (pos, &candidate) in remaining.iter().enumerate() {
                let relevance = catalog.brute_force_score(candidate, anchor);
                let mmr_score = self.lambda * relevance - (1.0 - self.lambda) * redundancy[pos];
                if mmr_score > best_mmr_score {
                    best_mmr_score = mmr_score;
                    best_pos = pos;
                }
            }

            let chosen = remaining.remove(best_pos);
            redundancy.remove(best_pos);
            for (pos, &candidate) in remaining.iter().enumerate() {
                redundancy[pos] = redundancy[pos].max(catalog.brute_force_score(candidate, chosen));
            }
            selected.push(chosen);
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;
    use ndarray::{array, Array2};
    use std::collections::HashSet;

    fn catalog(vectors: Array2<f32>) -> Catalog {
        let items = (0..vectors.nrows())
            .map(|i| Item {
                id: format!("p{}", i),
                name: format!("Product {}", i),
                brand: None,
                color: None,
                item_type: None,
                price: None,
                url: format!("u{}", i),
                image_url: None,
            })
            .collect();
        Catalog::new(items, vectors).unwrap()
    }

    #[test]
    fn test_k_one_returns_top_candidate() {
        let catalog = catalog(array![[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let layer = DiversityLayer::default();
        assert_eq!(layer.rerank(&catalog, &[2, 0, 1], 1), vec![2]);
    }

    #[test]
    fn test_full_k_is_permutation() {
        let catalog = catalog(array![
            [1.0f32, 0.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.5, 0.5, 0.5]
        ]);
        let layer = DiversityLayer::default();
        let candidates = vec![0, 1, 2, 3, 4];
        let reranked = layer.rerank(&catalog, &candidates, candidates.len());

        assert_eq!(reranked.len(), candidates.len());
        assert_eq!(reranked[0], 0);
        let unique: HashSet<usize> = reranked.iter().copied().collect();
        assert_eq!(unique, candidates.iter().copied().collect());
    }

    #[test]
    fn test_near_duplicate_pushed_back() {
        // 1 is almost identical to the anchor; 4 is relevant but distinct
        let catalog = catalog(array![
            [1.0f32, 0.0, 0.0],
            [1.0, 0.01, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.7, 0.7, 0.0]
        ]);
        let layer = DiversityLayer::new(0.3);
        let reranked = layer.rerank(&catalog, &[0, 1, 2, 3, 4], 3);
        assert_eq!(reranked[0], 0);
        assert!(!reranked.contains(&1));
    }

    #[test]
    fn test_lambda_one_keeps_relevance_order() {
        let catalog = catalog(array![[1.0f32, 0.0], [0.9, 0.1], [0.5, 0.5], [0.0, 1.0]]);
        let layer = DiversityLayer::new(1.0);
        assert_eq!(layer.rerank(&catalog, &[0, 3, 2, 1], 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let catalog = catalog(array![[1.0f32, 0.0], [0.0, 1.0], [0.0, 1.0], [0.0, 1.0]]);
        let layer = DiversityLayer::default();
        assert_eq!(layer.rerank(&catalog, &[0, 3, 1, 2], 2), vec![0, 3]);
    }

    #[test]
    fn test_empty_inputs() {
        let catalog = catalog(array![[1.0f32, 0.0]]);
        let layer = DiversityLayer::default();
        assert!(layer.rerank(&catalog, &[], 5).is_empty());
        assert!(layer.rerank(&catalog, &[0], 0).is_empty());
    }
}
