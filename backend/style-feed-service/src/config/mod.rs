use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub catalog: CatalogConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Candidate catalog files, first existing one wins
    #[serde(default = "default_catalog_paths")]
    pub paths: Vec<String>,
    /// Vocabulary cap for the built-in TF-IDF vectorizer
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Exact,
    Ivf,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EngineConfig {
    /// Candidate pool size pulled from the similarity index per request
    #[validate(range(min = 1))]
    #[serde(default = "default_retrieve_k")]
    pub retrieve_k: usize,
    /// 1.0 = relevance only, 0.0 = diversity only
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,
    /// Max guarantees inserted per super-like
    #[serde(default = "default_super_like_batch")]
    pub super_like_batch: usize,
    #[serde(default)]
    pub index: IndexKind,
    #[validate(range(min = 1))]
    #[serde(default = "default_ivf_lists")]
    pub ivf_lists: usize,
    #[validate(range(min = 1))]
    #[serde(default = "default_ivf_probes")]
    pub ivf_probes: usize,
    /// Fixed seed for shuffles and cold-start sampling; entropy when unset
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            paths: default_catalog_paths(),
            max_features: default_max_features(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieve_k: default_retrieve_k(),
            mmr_lambda: default_mmr_lambda(),
            super_like_batch: default_super_like_batch(),
            index: IndexKind::default(),
            ivf_lists: default_ivf_lists(),
            ivf_probes: default_ivf_probes(),
            rng_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let app: AppConfig = envy::prefixed("APP_").from_env()?;
        let catalog: CatalogConfig = envy::prefixed("CATALOG_").from_env()?;
        let engine: EngineConfig = envy::prefixed("ENGINE_").from_env()?;
        engine.validate()?;

        Ok(Config {
            app,
            catalog,
            engine,
        })
    }
}

fn default_env() -> String {
    "development".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_catalog_paths() -> Vec<String> {
    vec![
        "frontend/public/products.json".to_string(),
        "data/products.json".to_string(),
    ]
}

fn default_max_features() -> usize {
    1024
}

fn default_retrieve_k() -> usize {
    300
}

fn default_mmr_lambda() -> f32 {
    0.7
}

fn default_super_like_batch() -> usize {
    20
}

fn default_ivf_lists() -> usize {
    16
}

fn default_ivf_probes() -> usize {
    4
}
