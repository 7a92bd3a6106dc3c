//! Full refit: retrain with the new user appended to the matrix.
//!
//! Always consistent with an immediate retrain, but every call pays for a
//! complete factorization over all users. Use it for explicit offline
//! comparisons and retraining jobs, not to serve requests.

use crate::traits::ColdStartPredictor;
use crate::types::{Candidate, NewUserRatings};
use data_loader::{Rating, RatingScale};
use factorization::{center_rows, Factorizer, PopularityTable, RatingMatrix, Result, SvdFactorizer};
use tracing::{info, instrument};

pub struct FullRefitPredictor<F: Factorizer = SvdFactorizer> {
    matrix: RatingMatrix,
    popularity: PopularityTable,
    factorizer: F,
    rank: usize,
    scale: RatingScale,
}

impl FullRefitPredictor<SvdFactorizer> {
    /// Build from the full historical record set on the default 1-5 scale.
    pub fn from_ratings(ratings: &[Rating], rank: usize) -> Result<Self> {
        Self::with_factorizer(ratings, rank, RatingScale::default(), SvdFactorizer::new())
    }
}

impl<F: Factorizer> FullRefitPredictor<F> {
    /// Build from the historical records, rejecting any record outside
    /// `scale`. New-user ratings are checked against the same scale.
    pub fn with_factorizer(
        ratings: &[Rating],
        rank: usize,
        scale: RatingScale,
        factorizer: F,
    ) -> Result<Self> {
        Ok(Self {
            matrix: RatingMatrix::from_ratings_with_scale(ratings, scale)?,
            popularity: PopularityTable::from_ratings(ratings),
            factorizer,
            rank,
            scale,
        })
    }

    /// Popularity of the historical record set, for reweighting.
    pub fn popularity(&self) -> &PopularityTable {
        &self.popularity
    }
}

impl<F: Factorizer> ColdStartPredictor for FullRefitPredictor<F> {
    fn name(&self) -> &str {
        "FullRefitPredictor"
    }

    #[instrument(skip(self, ratings), fields(rated = ratings.rated_count(), users = self.matrix.nrows()))]
    fn predict(&self, ratings: &NewUserRatings) -> Result<Vec<Candidate>> {
        ratings.validate(self.scale, self.matrix.items())?;

        let new_row: Vec<f64> = self
            .matrix
            .items()
            .iter()
            .map(|&item_id| match ratings.get(item_id) {
                Some(score) if score > 0.0 => score as f64,
                _ => 0.0,
            })
            .collect();

        let grown = self.matrix.with_appended_row(&new_row);
        let centered = center_rows(&grown);
        let factors = self.factorizer.factorize(&centered.values, self.rank)?;

        let last = grown.nrows() - 1;
        let mean = centered.means[last];
        let predicted = factors.u.row(last) * factors.scaled_item_factors();
        info!(
            "Refit {} users at rank {} for one cold-start request",
            grown.nrows(),
            factors.rank()
        );

        Ok(self
            .matrix
            .items()
            .iter()
            .zip(predicted.iter())
            .map(|(&item_id, &value)| Candidate::new(item_id, value + mean))
            .collect())
    }
}
