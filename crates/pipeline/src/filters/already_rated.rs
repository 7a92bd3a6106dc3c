//! Filter to remove items the user has already rated.
//!
//! Only the request's own ratings count; whatever the user may have rated
//! in the historical record set is irrelevant here.

use crate::traits::Filter;
use crate::types::{Candidate, NewUserRatings};
use factorization::Result;

/// Removes candidates the user rated with a positive score.
///
/// ## Algorithm
/// Builds a HashSet of rated items once, then O(1) lookups per candidate.
pub struct AlreadyRatedFilter;

impl Filter for AlreadyRatedFilter {
    fn name(&self) -> &str {
        "AlreadyRatedFilter"
    }

    fn apply(
        &self,
        candidates: Vec<Candidate>,
        ratings: &NewUserRatings,
    ) -> Result<Vec<Candidate>> {
        let rated = ratings.rated_set();
        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| !rated.contains(&candidate.item_id))
            .collect();
        Ok(filtered)
    }
}
