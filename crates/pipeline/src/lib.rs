//! Request-time pipeline for cold-start recommendations.
//!
//! This crate provides:
//! - ColdStartPredictor trait with fold-in and full-refit implementations
//! - Filter trait, AlreadyRatedFilter and the FilterPipeline composing them
//! - PopularityReweighter for log popularity damping
//! - TopNSelector for deterministic top-N selection
//!
//! ## Architecture
//! A request is processed in stages:
//! 1. A predictor scores every known item for the new user
//! 2. Filters drop items the user already rated
//! 3. Scores are damped by historical popularity
//! 4. The N best items are returned
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{recommend, NewUserRatings};
//!
//! let ratings: NewUserRatings = [(1, 5.0), (50, 3.0)].into_iter().collect();
//! let recs = recommend(&ratings, &snapshot, 10)?;
//! ```

pub mod types;
pub mod traits;
pub mod predictor;
pub mod filters;
pub mod filter_pipeline;
pub mod reweight;
pub mod selector;
pub mod recommend;

// Re-export main types
pub use types::{Candidate, NewUserRatings, Recommendation};
pub use traits::{ColdStartPredictor, Filter};
pub use predictor::{FoldInPredictor, FullRefitPredictor};
pub use filter_pipeline::FilterPipeline;
pub use reweight::{damp, PopularityReweighter};
pub use selector::TopNSelector;
pub use recommend::{recommend, Recommender, DEFAULT_TOP_N};
