//! Popularity damping.
//!
//! Raw factorization scores favour items with few but extreme ratings.
//! Dividing by a log of each item's historical popularity pushes niche items
//! with a comparable predicted fit back up, without ever cancelling the
//! prediction entirely.

use crate::types::Candidate;
use factorization::PopularityTable;
use rayon::prelude::*;

/// `predicted / (1 + ln(1 + popularity))`.
pub fn damp(predicted: f64, popularity: f64) -> f64 {
    predicted / (1.0 + popularity.ln_1p())
}

/// Rewrites candidate scores using the corpus-wide popularity table.
pub struct PopularityReweighter<'a> {
    popularity: &'a PopularityTable,
}

impl<'a> PopularityReweighter<'a> {
    pub fn new(popularity: &'a PopularityTable) -> Self {
        Self { popularity }
    }

    /// Damp every candidate, preserving order. Items missing from the table
    /// are left undamped.
    pub fn reweight(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_par_iter()
            .map(|mut candidate| {
                candidate.score = damp(candidate.predicted, self.popularity.get(candidate.item_id));
                candidate
            })
            .collect()
    }
}
