pub mod catalog;
pub mod diversity;
pub mod engine;
pub mod feedback;
pub mod outfit;
pub mod profile;
pub mod ranking;
pub mod similarity;

pub use catalog::{load_catalog, Catalog, CatalogError};
pub use diversity::DiversityLayer;
pub use engine::{ItemLookup, RecommenderEngine};
pub use feedback::FeedbackProcessor;
pub use outfit::OutfitMatcher;
pub use profile::ProfileStore;
pub use ranking::RankingLayer;
pub use similarity::{build_index, SimilarityIndex};
