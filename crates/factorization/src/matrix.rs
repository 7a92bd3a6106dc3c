//! Dense user x item rating matrix and row centering.
//!
//! Unobserved (user, item) pairs are stored as 0. User means are taken over
//! the zero-filled row, so a user who rated few items gets a mean well below
//! their average observed rating. That normalization is deliberate and is
//! what the factorization is trained on; do not switch it to observed-only
//! means without retraining and re-baselining recommendations.

use crate::error::{RecError, Result};
use data_loader::{ItemId, Rating, RatingScale, UserId};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Dense rating matrix with its axis labels.
///
/// Rows are distinct user ids and columns distinct item ids, both sorted
/// ascending, so each label maps to exactly one index.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    values: DMatrix<f64>,
}

/// First record whose score is NaN or outside `scale`, as `InvalidRating`.
pub fn check_records(ratings: &[Rating], scale: RatingScale) -> Result<()> {
    match ratings.par_iter().find_first(|r| !scale.contains(r.rating)) {
        Some(bad) => Err(RecError::InvalidRating {
            item_id: bad.item_id,
            score: bad.rating,
            reason: format!(
                "record from user {} must be between {} and {}",
                bad.user_id, scale.min, scale.max
            ),
        }),
        None => Ok(()),
    }
}

/// Row-centered matrix together with the means that were subtracted.
#[derive(Debug, Clone)]
pub struct CenteredMatrix {
    pub values: DMatrix<f64>,
    pub means: Vec<f64>,
}

impl RatingMatrix {
    /// Build the zero-filled matrix from the full record set, accepting
    /// scores on the default 1-5 scale.
    pub fn from_ratings(ratings: &[Rating]) -> Result<Self> {
        Self::from_ratings_with_scale(ratings, RatingScale::default())
    }

    /// Build the zero-filled matrix, rejecting any record outside `scale`.
    ///
    /// When a (user, item) pair appears more than once the last record wins.
    pub fn from_ratings_with_scale(ratings: &[Rating], scale: RatingScale) -> Result<Self> {
        if ratings.is_empty() {
            return Err(RecError::EmptyDataset);
        }
        check_records(ratings, scale)?;

        let users: Vec<UserId> = ratings
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let items: Vec<ItemId> = ratings
            .iter()
            .map(|r| r.item_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if users.len() < 2 || items.len() < 2 {
            return Err(RecError::DegenerateAxis {
                rows: users.len(),
                cols: items.len(),
            });
        }

        let mut values = DMatrix::zeros(users.len(), items.len());
        for rating in ratings {
            // Both lookups succeed: the axes were collected from these records.
            if let (Ok(row), Ok(col)) = (
                users.binary_search(&rating.user_id),
                items.binary_search(&rating.item_id),
            ) {
                values[(row, col)] = rating.rating as f64;
            }
        }

        debug!(
            "Built {}x{} rating matrix from {} records",
            users.len(),
            items.len(),
            ratings.len()
        );
        Ok(Self {
            users,
            items,
            values,
        })
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn user_index(&self, user_id: UserId) -> Option<usize> {
        self.users.binary_search(&user_id).ok()
    }

    pub fn item_index(&self, item_id: ItemId) -> Option<usize> {
        self.items.binary_search(&item_id).ok()
    }

    /// Subtract each row's zero-filled mean from the row.
    pub fn center(&self) -> CenteredMatrix {
        center_rows(&self.values)
    }

    /// Copy of the matrix with one extra row appended at the bottom.
    ///
    /// `row` must have one entry per item column.
    pub fn with_appended_row(&self, row: &[f64]) -> DMatrix<f64> {
        debug_assert_eq!(row.len(), self.ncols());
        let (nrows, ncols) = self.values.shape();
        DMatrix::from_fn(nrows + 1, ncols, |i, j| {
            if i < nrows { self.values[(i, j)] } else { row[j] }
        })
    }
}

/// Row means over every column (zeros included) and the centered matrix.
pub fn center_rows(values: &DMatrix<f64>) -> CenteredMatrix {
    let (nrows, ncols) = values.shape();
    let means: Vec<f64> = (0..nrows)
        .into_par_iter()
        .map(|i| values.row(i).sum() / ncols as f64)
        .collect();
    let centered = DMatrix::from_fn(nrows, ncols, |i, j| values[(i, j)] - means[i]);
    CenteredMatrix {
        values: centered,
        means,
    }
}
