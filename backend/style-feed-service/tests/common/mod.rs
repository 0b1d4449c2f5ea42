#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use style_feed_service::config::{CatalogConfig, EngineConfig, IndexKind};
use style_feed_service::{build_index, load_catalog, ProfileStore, RecommenderEngine};
use tempfile::NamedTempFile;

pub const BRANDS: [&str; 3] = ["acme", "luma", "nord"];

/// 30 black jackets, 10 red dresses, 10 blue pants, 10 white tops and one hat
pub fn wardrobe_json() -> Value {
    let mut products = Vec::new();
    let groups = [
        ("j", 30, "Black Leather Jacket", "jacket", "black"),
        ("d", 10, "Red Midi Dress", "dress", "red"),
        ("p", 10, "Blue Wide Pants", "pants", "blue"),
        ("t", 10, "White Cotton Top", "top", "white"),
    ];
    for (prefix, count, name, item_type, color) in groups {
        for i in 0..count {
            products.push(json!({
                "id": format!("{}{}", prefix, i),
                "name": name,
                "brand": BRANDS[i % BRANDS.len()],
                "color": color,
                "type": item_type,
                "price": "$49.00",
                "url": format!("https://shop.example/{}{}", prefix, i),
            }));
        }
    }
    products.push(json!({
        "id": "hat0",
        "name": "Green Bucket Hat",
        "brand": "acme",
        "color": "green",
        "type": "hat",
        "url": "https://shop.example/hat0",
    }));
    Value::Array(products)
}

pub fn catalog_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(wardrobe_json().to_string().as_bytes())
        .expect("write catalog");
    file
}

pub fn engine_config(index: IndexKind) -> EngineConfig {
    EngineConfig {
        index,
        ivf_lists: 4,
        ivf_probes: 4,
        rng_seed: Some(7),
        ..Default::default()
    }
}

pub fn build_engine(index: IndexKind) -> Arc<RecommenderEngine> {
    build_engine_with(engine_config(index))
}

pub fn build_engine_with(config: EngineConfig) -> Arc<RecommenderEngine> {
    let file = catalog_file();
    let catalog_config = CatalogConfig {
        paths: vec![file.path().to_string_lossy().to_string()],
        ..Default::default()
    };
    let catalog = Arc::new(load_catalog(&catalog_config).expect("catalog loads"));
    let similarity = build_index(Arc::clone(&catalog), &config);
    Arc::new(RecommenderEngine::new(
        catalog,
        similarity,
        Arc::new(ProfileStore::new()),
        &config,
    ))
}
