//! Core domain types for rating data.
//!
//! This module defines the records the recommender is trained on and the
//! `RatingStore` boundary through which they are read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================
// These make the domain clearer and prevent mixing up user IDs with item IDs

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a rated item (a MovieLens movie id in practice)
pub type ItemId = u32;

// =============================================================================
// Rating Type
// =============================================================================

/// A single observed rating from a user for an item.
///
/// Records are immutable once ingested; the recommender only ever reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Rating value, 1.0 to 5.0 with the default scale
    pub rating: f32,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

/// Inclusive range of accepted rating values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingScale {
    pub min: f32,
    pub max: f32,
}

impl RatingScale {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns true if `value` lies inside the scale.
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for RatingScale {
    fn default() -> Self {
        Self { min: 1.0, max: 5.0 }
    }
}

// =============================================================================
// RatingStore - The Input Boundary
// =============================================================================

/// Source of observed ratings.
///
/// The recommender core never owns rating data; it asks a store for a full
/// re-read when precomputing and for a single user's ratings when an upstream
/// caller assembles a cold-start vector.
pub trait RatingStore: Send + Sync {
    /// Every rating currently known to the store.
    fn all_ratings(&self) -> Vec<Rating>;

    /// Ratings made by one user (empty if the user is unknown).
    fn user_ratings(&self, user_id: UserId) -> Vec<Rating>;
}

// =============================================================================
// RatingIndex - In-Memory Store
// =============================================================================

/// In-memory rating store with per-user and per-item lookups.
#[derive(Debug, Default)]
pub struct RatingIndex {
    /// All ratings in insertion order
    pub(crate) ratings: Vec<Rating>,
    /// Positions in `ratings` made by each user
    pub(crate) by_user: HashMap<UserId, Vec<usize>>,
    /// Positions in `ratings` received by each item
    pub(crate) by_item: HashMap<ItemId, Vec<usize>>,
    pub(crate) scale: RatingScale,
}

impl RatingIndex {
    /// Creates a new, empty RatingIndex using the default 1-5 scale
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index that validates against a custom scale
    pub fn with_scale(scale: RatingScale) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    /// Insert a rating and update the lookup indices
    pub fn insert_rating(&mut self, rating: Rating) {
        let position = self.ratings.len();
        self.ratings.push(rating);
        self.by_user.entry(rating.user_id).or_default().push(position);
        self.by_item.entry(rating.item_id).or_default().push(position);
    }

    /// Ratings received by one item
    pub fn get_item_ratings(&self, item_id: ItemId) -> Vec<Rating> {
        self.collect(self.by_item.get(&item_id))
    }

    /// All user IDs, sorted ascending
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.by_user.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All item IDs, sorted ascending
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.by_item.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get counts for debugging/logging
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.by_user.len(), self.by_item.len(), self.ratings.len())
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<Rating> {
        positions
            .map(|positions| positions.iter().map(|&p| self.ratings[p]).collect())
            .unwrap_or_default()
    }
}

impl RatingStore for RatingIndex {
    fn all_ratings(&self) -> Vec<Rating> {
        self.ratings.clone()
    }

    fn user_ratings(&self, user_id: UserId) -> Vec<Rating> {
        self.collect(self.by_user.get(&user_id))
    }
}
