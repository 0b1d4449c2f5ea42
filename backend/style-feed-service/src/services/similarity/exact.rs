use super::{rank_order, ScoredIndex, SimilarityIndex};
use crate::services::catalog::Catalog;
use crate::utils::unit_vector;
use ndarray::ArrayView1;
use std::collections::HashSet;
use std::sync::Arc;

/// Brute-force scan: one matrix-vector product over the whole catalog
pub struct ExactScanIndex {
    catalog: Arc<Catalog>,
}

impl ExactScanIndex {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

impl SimilarityIndex for ExactScanIndex {
    fn top_k(
        &self,
        query: ArrayView1<f32>,
        k: usize,
        exclude: &HashSet<usize>,
    ) -> Vec<ScoredIndex> {
        if k == 0 || self.catalog.is_empty() || query.len() != self.catalog.dim() {
            return Vec::new();
        }
        let Some(query) = unit_vector(query) else {
            return Vec::new();
        };

        let scores = self.catalog.embeddings().dot(&query);
        let mut hits: Vec<ScoredIndex> = scores
            .iter()
            .enumerate()
            .filter(|(index, _)| !exclude.contains(index))
            .map(|(index, &score)| ScoredIndex { index, score })
            .collect();

        hits.sort_by(rank_order);
        hits.truncate(k);
        hits
    }

    fn name(&self) -> &'static str {
        "exact"
    }

    fn is_exact(&self) -> bool {
        true
    }
}
