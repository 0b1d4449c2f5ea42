// ============================================
// IVF (inverted file) approximate index
// ============================================
//
// Build:
//   spherical k-means over the unit rows -> `lists` centroids, every item
//   assigned to its most similar centroid
// Query:
//   rank centroids by dot(query, centroid), scan the items of the best
//   `probes` lists exactly, then keep scanning lists in centroid order while
//   fewer than `k` unexcluded items have been collected
//
// With probes >= lists every item is scanned and results equal the exact
// scan. Otherwise a high-scoring item in an unscanned list can be missed,
// which is the only source of divergence. The index never returns fewer hits
// than the exact scan would.

use super::{rank_order, ScoredIndex, SimilarityIndex};
use crate::services::catalog::Catalog;
use crate::utils::unit_vector;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const KMEANS_ITERATIONS: usize = 10;
/// Below this many items per list partitioning is not worth it
const MIN_ITEMS_PER_LIST: usize = 4;

pub struct IvfIndex {
    catalog: Arc<Catalog>,
    centroids: Array2<f32>,
    lists: Vec<Vec<usize>>,
    probes: usize,
}

impl IvfIndex {
    /// Returns `None` when the catalog has fewer than 4 items per list
    pub fn build(catalog: Arc<Catalog>, lists: usize, probes: usize, seed: u64) -> Option<Self> {
        let n = catalog.len();
        if lists == 0 || n < lists * MIN_ITEMS_PER_LIST {
            return None;
        }

        let embeddings = catalog.embeddings();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut seeds: Vec<usize> = sample(&mut rng, n, lists).into_vec();
        seeds.sort_unstable();
        let mut centroids = embeddings.select(Axis(0), &seeds);
        let mut assignment = vec![0usize; n];

        for iteration in 0..KMEANS_ITERATIONS {
            let changed = assign(embeddings, &centroids, &mut assignment);

            let mut sums = Array2::<f32>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; lists];
            for (row, &list) in embeddings.axis_iter(Axis(0)).zip(&assignment) {
                let mut sum = sums.row_mut(list);
                sum += &row;
                counts[list] += 1;
            }
            for (list, count) in counts.iter().enumerate() {
                // Empty lists keep their previous centroid
                if *count == 0 {
                    continue;
                }
                if let Some(unit) = unit_vector(sums.row(list)) {
                    centroids.row_mut(list).assign(&unit);
                }
            }

            debug!(iteration, changed, "IVF k-means iteration");
            if changed == 0 && iteration > 0 {
                break;
            }
        }
        assign(embeddings, &centroids, &mut assignment);

        let mut inverted = vec![Vec::new(); lists];
        for (idx, &list) in assignment.iter().enumerate() {
            inverted[list].push(idx);
        }

        Some(Self {
            catalog,
            centroids,
            lists: inverted,
            probes: probes.clamp(1, lists),
        })
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }
}

/// Assign every row to its most similar centroid; returns how many moved
fn assign(embeddings: &Array2<f32>, centroids: &Array2<f32>, assignment: &mut [usize]) -> usize {
    let similarities = embeddings.dot(&centroids.t());
    let mut changed = 0;
    for (idx, row) in similarities.axis_iter(Axis(0)).enumerate() {
        let best = argmax(row);
        if assignment[idx] != best {
            assignment[idx] = best;
            changed += 1;
        }
    }
    changed
}

fn argmax(values: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (idx, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = idx;
        }
    }
    best
}

impl SimilarityIndex for IvfIndex {
    fn top_k(
        &self,
        query: ArrayView1<f32>,
        k: usize,
        exclude: &HashSet<usize>,
    ) -> Vec<ScoredIndex> {
        if k == 0 || query.len() != self.catalog.dim() {
            return Vec::new();
        }
        let Some(query) = unit_vector(query) else {
            return Vec::new();
        };

        let centroid_scores: Array1<f32> = self.centroids.dot(&query);
        let mut ranked_lists: Vec<ScoredIndex> = centroid_scores
            .iter()
            .enumerate()
            .map(|(index, &score)| ScoredIndex { index, score })
            .collect();
        ranked_lists.sort_by(rank_order);

        let mut hits: Vec<ScoredIndex> = Vec::new();
        for (scanned, list) in ranked_lists.iter().enumerate() {
            if scanned >= self.probes && hits.len() >= k {
                break;
            }
            hits.extend(
                self.lists[list.index]
                    .iter()
                    .copied()
                    .filter(|index| !exclude.contains(index))
                    .map(|index| ScoredIndex {
                        index,
                        score: self.catalog.vector(index).dot(&query),
                    }),
            );
        }

        hits.sort_by(rank_order);
        hits.truncate(k);
        hits
    }

    fn name(&self) -> &'static str {
        "ivf"
    }

    fn is_exact(&self) -> bool {
        self.probes >= self.lists.len()
    }
}
