//! Similarity Index
//!
//! "Top-K most similar catalog items to a query vector" behind one trait,
//! with an exact brute-force scan and an approximate inverted-file index.
//! Both rank by descending cosine similarity and break ties by catalog
//! order; they can only disagree when the approximate index skips a
//! partition that holds a better match.

mod exact;
mod ivf;

pub use exact::ExactScanIndex;
pub use ivf::IvfIndex;

use crate::config::{EngineConfig, IndexKind};
use crate::services::catalog::Catalog;
use ndarray::ArrayView1;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Catalog index with its cosine similarity to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: f32,
}

pub trait SimilarityIndex: Send + Sync {
    /// Up to `k` catalog indices most similar to `query`, skipping `exclude`.
    ///
    /// Sorted by descending score, ties by ascending catalog index.
    fn top_k(&self, query: ArrayView1<f32>, k: usize, exclude: &HashSet<usize>)
        -> Vec<ScoredIndex>;

    fn name(&self) -> &'static str;

    /// Whether results are guaranteed identical to a full scan
    fn is_exact(&self) -> bool;
}

/// Build the configured index; falls back to the exact scan when the
/// catalog is too small to partition.
pub fn build_index(catalog: Arc<Catalog>, config: &EngineConfig) -> Arc<dyn SimilarityIndex> {
    match config.index {
        IndexKind::Exact => Arc::new(ExactScanIndex::new(catalog)),
        IndexKind::Ivf => match IvfIndex::build(
            Arc::clone(&catalog),
            config.ivf_lists,
            config.ivf_probes,
            config.rng_seed.unwrap_or(IVF_DEFAULT_SEED),
        ) {
            Some(index) => Arc::new(index),
            None => {
                info!(
                    products = catalog.len(),
                    lists = config.ivf_lists,
                    "Catalog too small for IVF partitioning, using exact scan"
                );
                Arc::new(ExactScanIndex::new(catalog))
            }
        },
    }
}

const IVF_DEFAULT_SEED: u64 = 42;

/// Score order shared by both implementations
pub(crate) fn rank_order(a: &ScoredIndex, b: &ScoredIndex) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.index.cmp(&b.index))
}
