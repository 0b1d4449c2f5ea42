//! Catalog file loading.
//!
//! Supported format: a JSON array of product objects
//! `[{ "name", "brand", "color", "type" | "category", "price", "url", "image_url" }, ...]`.
//! Records may carry a precomputed vector under `embedding`, `vector` or
//! `feature_vector`; otherwise the TF-IDF vectorizer is used.

use super::{Catalog, CatalogError};
use crate::config::CatalogConfig;
use crate::models::Item;
use ndarray::Array2;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const ID_KEYS: &[&str] = &["id", "pid", "_id", "__pid"];
const EMBEDDING_KEYS: &[&str] = &["embedding", "vector", "feature_vector"];

/// Load the catalog from the first existing configured path.
///
/// Missing, unparsable or empty catalogs are errors: the service must not
/// start serving without products.
pub fn load_catalog(config: &CatalogConfig) -> Result<Catalog, CatalogError> {
    let path = config
        .paths
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .ok_or_else(|| CatalogError::NotFound(config.paths.clone()))?;

    let raw = fs::read_to_string(path)?;
    let catalog = parse_catalog(&raw, config.max_features)?;

    info!(
        path = %path.display(),
        products = catalog.len(),
        dim = catalog.dim(),
        "Catalog loaded"
    );

    Ok(catalog)
}

/// Parse a JSON product array into a catalog
pub fn parse_catalog(raw: &str, max_features: usize) -> Result<Catalog, CatalogError> {
    let records: Vec<Value> = serde_json::from_str(raw)?;

    let mut items = Vec::with_capacity(records.len());
    let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for record in &records {
        let Some(fields) = record.as_object() else {
            skipped += 1;
            continue;
        };
        match item_from_record(record, fields) {
            Some(item) => {
                vectors.push(embedding_field(fields));
                items.push(item);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "Dropped products without name or url");
    }
    if items.is_empty() {
        return Err(CatalogError::Empty);
    }

    let with_vectors = vectors.iter().filter(|v| v.is_some()).count();
    let catalog = if with_vectors == 0 {
        Catalog::with_tfidf(items, max_features)?
    } else if with_vectors == items.len() {
        let matrix = stack_vectors(&items, vectors.into_iter().flatten().collect())?;
        Catalog::new(items, matrix)?
    } else {
        return Err(CatalogError::MixedEmbeddings);
    };

    if catalog.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(catalog)
}

fn item_from_record(record: &Value, fields: &Map<String, Value>) -> Option<Item> {
    let name = string_field(fields, &["name"])?;
    let url = string_field(fields, &["url"])?;

    Some(Item {
        id: string_field(fields, ID_KEYS).unwrap_or_else(|| content_id(record)),
        name,
        brand: string_field(fields, &["brand"]),
        color: string_field(fields, &["color"]),
        item_type: string_field(fields, &["type", "category"]),
        price: price_field(fields),
        url,
        image_url: string_field(fields, &["image_url"]),
    })
}

/// Deterministic id for records without an explicit identifier: SHA-256 of
/// the key-sorted JSON encoding, truncated to 16 bytes.
fn content_id(record: &Value) -> String {
    // serde_json's default Map is ordered by key
    let canonical = record.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(&digest[..16])
}

/// First non-empty value among `keys`; numbers are stringified
fn string_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn price_field(fields: &Map<String, Value>) -> Option<f64> {
    match fields.get("price")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(['$', ','], "").trim().parse().ok(),
        _ => None,
    }
}

fn embedding_field(fields: &Map<String, Value>) -> Option<Vec<f32>> {
    EMBEDDING_KEYS.iter().find_map(|key| {
        let values = fields.get(*key)?.as_array()?;
        let vector: Vec<f32> = values
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        (!vector.is_empty() && vector.len() == values.len()).then_some(vector)
    })
}

fn stack_vectors(items: &[Item], vectors: Vec<Vec<f32>>) -> Result<Array2<f32>, CatalogError> {
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    let mut flat = Vec::with_capacity(vectors.len() * dim);
    for (item, vector) in items.iter().zip(&vectors) {
        if vector.len() != dim {
            return Err(CatalogError::DimensionMismatch {
                item_id: item.id.clone(),
                expected: dim,
                actual: vector.len(),
            });
        }
        flat.extend_from_slice(vector);
    }
    Array2::from_shape_vec((vectors.len(), dim), flat).map_err(|_| CatalogError::ShapeMismatch {
        items: items.len(),
        rows: vectors.len(),
    })
}
