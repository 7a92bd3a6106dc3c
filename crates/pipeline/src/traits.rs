//! Core traits for the recommendation pipeline.

use crate::types::{Candidate, NewUserRatings};
use factorization::Result;

/// Core trait for filtering candidates.
///
/// All filters must implement this trait to be used in the FilterPipeline.
///
/// ## Design Note
/// - `Send + Sync` allows filters to be shared across request threads
/// - Filters take ownership of the Vec<Candidate> and return a filtered Vec
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a set of candidates.
    ///
    /// # Arguments
    /// * `candidates` - The candidates to filter (takes ownership)
    /// * `ratings` - The requesting user's own ratings
    fn apply(
        &self,
        candidates: Vec<Candidate>,
        ratings: &NewUserRatings,
    ) -> Result<Vec<Candidate>>;
}

/// Predicts ratings for a user who is not part of the trained matrix.
pub trait ColdStartPredictor: Send + Sync {
    /// Returns the name of this predictor (for logging/debugging)
    fn name(&self) -> &str;

    /// One candidate per trained item, in ascending item order.
    ///
    /// Fails with `InvalidRating` when `ratings` holds an out-of-range
    /// score or references an item the model was not trained on.
    fn predict(&self, ratings: &NewUserRatings) -> Result<Vec<Candidate>>;
}
