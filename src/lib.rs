//! Rentscore - ranks rental housing candidates by weighted geospatial signals
//!
//! This library provides the scoring pipeline behind the ranking service:
//! haversine distances, a cubic contamination surface fitted over air-quality
//! stations, zone lookup for greenery, per-column max-scaling and a weighted
//! reward score.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{ContaminationEstimator, FittedSurface, Ranker, RankingInputs, RankingOptions, distance::haversine_distance};
pub use error::ScoringError;
pub use models::{Candidate, Location, ScoreWeights, RankRequest, RankResponse};
