//! Fold-in: project a new user into an existing factor space.
//!
//! ## Algorithm
//! 1. Center the user's vector with the zero-filled mean
//!    (`sum of scores / item count`, the same rule used in training)
//! 2. Restrict `Σ·Vᵗ` to the columns of the rated items and solve the
//!    rank-k least-squares problem for the user's latent vector `p`
//!    (minimum-norm solution when fewer items than factors were rated)
//! 3. Predict every item as `p·Σ·Vᵗ + mean`
//!
//! Cost is O(k x items); no other user's row is touched.

use crate::traits::ColdStartPredictor;
use crate::types::{Candidate, NewUserRatings};
use data_loader::RatingScale;
use factorization::{FactorSnapshot, RecError, Result};
use nalgebra::{DVector, SVD};
use tracing::{debug, instrument};

/// Cold-start predictor reading a published snapshot.
pub struct FoldInPredictor<'a> {
    snapshot: &'a FactorSnapshot,
    scale: RatingScale,
}

impl<'a> FoldInPredictor<'a> {
    pub fn new(snapshot: &'a FactorSnapshot) -> Self {
        Self {
            snapshot,
            scale: RatingScale::default(),
        }
    }

    /// Configure the accepted rating range (default: 1.0 to 5.0)
    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }

    /// Latent vector for the user, length k.
    fn project(&self, rated: &[(usize, f64)], mean: f64) -> Result<DVector<f64>> {
        let factors = self.snapshot.factors();
        let k = factors.rank();
        if rated.is_empty() {
            return Ok(DVector::zeros(k));
        }

        let scaled = factors.scaled_item_factors();
        let columns: Vec<usize> = rated.iter().map(|&(col, _)| col).collect();
        let design = scaled.select_columns(columns.iter()).transpose();
        let target = DVector::from_iterator(rated.len(), rated.iter().map(|&(_, score)| score - mean));

        let svd = SVD::try_new(design, true, true, f64::EPSILON, 0).ok_or_else(|| {
            RecError::Factorization {
                k,
                reason: "fold-in projection did not converge".to_string(),
            }
        })?;
        let largest = svd.singular_values.max();
        let cutoff = largest * f64::EPSILON * rated.len().max(k) as f64;
        svd.solve(&target, cutoff)
            .map_err(|reason| RecError::Factorization {
                k,
                reason: reason.to_string(),
            })
    }
}

impl ColdStartPredictor for FoldInPredictor<'_> {
    fn name(&self) -> &str {
        "FoldInPredictor"
    }

    #[instrument(skip(self, ratings), fields(rated = ratings.rated_count(), generation = self.snapshot.generation()))]
    fn predict(&self, ratings: &NewUserRatings) -> Result<Vec<Candidate>> {
        let items = self.snapshot.items();
        ratings.validate(self.scale, items)?;

        let rated: Vec<(usize, f64)> = ratings
            .rated()
            .filter_map(|(item_id, score)| {
                self.snapshot
                    .item_index(item_id)
                    .map(|col| (col, score as f64))
            })
            .collect();
        let mean = rated.iter().map(|&(_, score)| score).sum::<f64>() / items.len() as f64;

        let latent = self.project(&rated, mean)?;
        let predicted = latent.transpose() * self.snapshot.factors().scaled_item_factors();
        debug!("Folded in user with {} ratings, mean {:.4}", rated.len(), mean);

        Ok(items
            .iter()
            .zip(predicted.iter())
            .map(|(&item_id, &value)| Candidate::new(item_id, value + mean))
            .collect())
    }
}
