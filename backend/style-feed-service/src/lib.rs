pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::{
    build_index, load_catalog, Catalog, DiversityLayer, ProfileStore, RankingLayer,
    RecommenderEngine,
};
