//! Server crate for the latent-recs recommender.
//!
//! This crate contains the service that runs precompute in the background,
//! keeps the live factor snapshot and answers cold-start requests.

pub mod config;
pub mod orchestrator;

pub use config::RecommenderConfig;
pub use orchestrator::RecommendationService;
