//! Immutable product catalog.
//!
//! Holds the item records, their normalized attributes and an `N x D`
//! embedding matrix whose rows are L2-normalized, so a row dot product is the
//! cosine similarity between two items. Built once at startup and shared
//! read-only by every request.

mod loader;
mod vectorizer;

pub use loader::{load_catalog, parse_catalog};
pub use vectorizer::TfIdfVectorizer;

use crate::models::Item;
use crate::utils::{mean_vector, normalize_attr};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No catalog file found, tried: {0:?}")]
    NotFound(Vec<String>),

    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog contains no usable products")]
    Empty,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual} for item {item_id}")]
    DimensionMismatch {
        item_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Either every product or none must carry a precomputed embedding")]
    MixedEmbeddings,

    #[error("Item count {items} does not match embedding rows {rows}")]
    ShapeMismatch { items: usize, rows: usize },
}

/// Normalized (trimmed, lowercase) matching attributes of an item.
/// Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemAttributes {
    pub item_type: String,
    pub color: String,
    pub brand: String,
}

impl ItemAttributes {
    pub fn of(item: &Item) -> Self {
        let norm = |v: &Option<String>| v.as_deref().map(normalize_attr).unwrap_or_default();
        Self {
            item_type: norm(&item.item_type),
            color: norm(&item.color),
            brand: norm(&item.brand),
        }
    }
}

#[derive(Debug)]
pub struct Catalog {
    items: Vec<Item>,
    attributes: Vec<ItemAttributes>,
    embeddings: Array2<f32>,
    id_to_idx: HashMap<String, usize>,
    url_to_idx: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from items and their row-aligned raw vectors.
    ///
    /// Rows are L2-normalized here. Items whose id was already taken are
    /// dropped together with their vector (first record wins).
    pub fn new(items: Vec<Item>, vectors: Array2<f32>) -> Result<Self, CatalogError> {
        if items.len() != vectors.nrows() {
            return Err(CatalogError::ShapeMismatch {
                items: items.len(),
                rows: vectors.nrows(),
            });
        }

        let dim = vectors.ncols();
        let mut kept_items = Vec::with_capacity(items.len());
        let mut kept_rows = Vec::with_capacity(items.len());
        let mut id_to_idx = HashMap::with_capacity(items.len());
        let mut url_to_idx = HashMap::with_capacity(items.len());

        for (item, row) in items.into_iter().zip(vectors.axis_iter(Axis(0))) {
            if id_to_idx.contains_key(&item.id) {
                warn!(item_id = %item.id, "Duplicate product id, keeping first record");
                continue;
            }
            let idx = kept_items.len();
            id_to_idx.insert(item.id.clone(), idx);
            if !item.url.is_empty() {
                url_to_idx.insert(item.url.clone(), idx);
            }
            kept_rows.push(row);
            kept_items.push(item);
        }

        let mut embeddings = if kept_rows.is_empty() {
            Array2::zeros((0, dim))
        } else {
            ndarray::stack(Axis(0), &kept_rows).map_err(|_| CatalogError::ShapeMismatch {
                items: kept_items.len(),
                rows: kept_rows.len(),
            })?
        };

        for mut row in embeddings.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|x| x / norm);
            }
        }

        let attributes = kept_items.iter().map(ItemAttributes::of).collect();

        Ok(Self {
            items: kept_items,
            attributes,
            embeddings,
            id_to_idx,
            url_to_idx,
        })
    }

    /// Build a catalog whose vectors come from the built-in TF-IDF vectorizer
    pub fn with_tfidf(items: Vec<Item>, max_features: usize) -> Result<Self, CatalogError> {
        let texts: Vec<String> = items.iter().map(descriptor_text).collect();
        let vectorizer = TfIdfVectorizer::fit(&texts, max_features);
        let vectors = vectorizer.transform_all(&texts);
        Self::new(items, vectors)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedding dimensionality
    pub fn dim(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, idx: usize) -> &Item {
        &self.items[idx]
    }

    pub fn attributes(&self, idx: usize) -> &ItemAttributes {
        &self.attributes[idx]
    }

    pub fn embeddings(&self) -> &Array2<f32> {
        &self.embeddings
    }

    pub fn vector(&self, idx: usize) -> ArrayView1<'_, f32> {
        self.embeddings.row(idx)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.id_to_idx.get(id).copied()
    }

    pub fn index_of_url(&self, url: &str) -> Option<usize> {
        self.url_to_idx.get(url).copied()
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&Item> {
        self.index_of(id).map(|idx| &self.items[idx])
    }

    pub fn lookup_by_url(&self, url: &str) -> Option<&Item> {
        self.index_of_url(url).map(|idx| &self.items[idx])
    }

    /// Cosine similarity of two catalog items (dot product of unit rows)
    pub fn brute_force_score(&self, i: usize, j: usize) -> f32 {
        self.embeddings.row(i).dot(&self.embeddings.row(j))
    }

    /// Mean embedding of the given catalog indices
    pub fn mean_of<I>(&self, indices: I) -> Option<Array1<f32>>
    where
        I: IntoIterator<Item = usize>,
    {
        mean_vector(indices.into_iter().map(|idx| self.vector(idx)), self.dim())
    }

    /// Indices whose normalized type equals `item_type` (already normalized)
    pub fn indices_of_type<'a>(&'a self, item_type: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.attributes
            .iter()
            .enumerate()
            .filter(move |(_, attrs)| !attrs.item_type.is_empty() && attrs.item_type == item_type)
            .map(|(idx, _)| idx)
    }
}

/// Text fed to the vectorizer: name, brand, color and type
pub(crate) fn descriptor_text(item: &Item) -> String {
    [
        Some(item.name.as_str()),
        item.brand.as_deref(),
        item.color.as_deref(),
        item.item_type.as_deref(),
    ]
    .iter()
    .map(|part| part.unwrap_or(""))
    .collect::<Vec<_>>()
    .join(" ")
}
