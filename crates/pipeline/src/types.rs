//! Request-scoped types flowing through the recommendation pipeline.

use data_loader::{ItemId, Rating, RatingScale};
use factorization::{RecError, Result};
use std::collections::{BTreeMap, HashSet};

/// Sparse ratings supplied by a user who is not in the trained matrix.
///
/// A score of 0 means "not rated" and is ignored everywhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUserRatings {
    ratings: BTreeMap<ItemId, f32>,
}

impl NewUserRatings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a stored user's records, e.g. `RatingStore::user_ratings`.
    pub fn from_records(records: &[Rating]) -> Self {
        records.iter().map(|r| (r.item_id, r.rating)).collect()
    }

    pub fn insert(&mut self, item_id: ItemId, score: f32) {
        self.ratings.insert(item_id, score);
    }

    pub fn get(&self, item_id: ItemId) -> Option<f32> {
        self.ratings.get(&item_id).copied()
    }

    /// Entries with a positive score, in ascending item order.
    pub fn rated(&self) -> impl Iterator<Item = (ItemId, f32)> + '_ {
        self.ratings
            .iter()
            .filter(|(_, score)| **score > 0.0)
            .map(|(&item_id, &score)| (item_id, score))
    }

    /// True if the user gave this item a positive score.
    pub fn is_rated(&self, item_id: ItemId) -> bool {
        self.get(item_id).is_some_and(|score| score > 0.0)
    }

    pub fn rated_count(&self) -> usize {
        self.rated().count()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Check every non-zero entry against the scale and the known item axis.
    ///
    /// `known_items` must be sorted ascending.
    pub fn validate(&self, scale: RatingScale, known_items: &[ItemId]) -> Result<()> {
        for (&item_id, &score) in &self.ratings {
            if score == 0.0 {
                continue;
            }
            if !score.is_finite() || !scale.contains(score) {
                return Err(RecError::InvalidRating {
                    item_id,
                    score,
                    reason: format!("score must be between {} and {}", scale.min, scale.max),
                });
            }
            if known_items.binary_search(&item_id).is_err() {
                return Err(RecError::InvalidRating {
                    item_id,
                    score,
                    reason: "item is not part of the trained model".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Item IDs rated with a positive score.
    pub fn rated_set(&self) -> HashSet<ItemId> {
        self.rated().map(|(item_id, _)| item_id).collect()
    }
}

impl FromIterator<(ItemId, f32)> for NewUserRatings {
    fn from_iter<I: IntoIterator<Item = (ItemId, f32)>>(iter: I) -> Self {
        Self {
            ratings: iter.into_iter().collect(),
        }
    }
}

/// A scored item moving through the pipeline.
///
/// `predicted` is the raw de-centered prediction; `score` starts equal to
/// it and is what later stages rewrite and rank on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub item_id: ItemId,
    pub predicted: f64,
    pub score: f64,
}

impl Candidate {
    pub fn new(item_id: ItemId, predicted: f64) -> Self {
        Self {
            item_id,
            predicted,
            score: predicted,
        }
    }
}

/// Final recommendation returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation {
    pub item_id: ItemId,
    /// Raw predicted rating
    pub predicted: f64,
    /// Popularity-damped score used for ranking
    pub score: f64,
}

impl From<Candidate> for Recommendation {
    fn from(candidate: Candidate) -> Self {
        Self {
            item_id: candidate.item_id,
            predicted: candidate.predicted,
            score: candidate.score,
        }
    }
}
