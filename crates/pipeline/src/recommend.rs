//! Request-time recommendation: predict -> filter -> reweight -> select.

use crate::filter_pipeline::FilterPipeline;
use crate::filters::AlreadyRatedFilter;
use crate::predictor::FoldInPredictor;
use crate::reweight::PopularityReweighter;
use crate::selector::TopNSelector;
use crate::traits::ColdStartPredictor;
use crate::types::{NewUserRatings, Recommendation};
use data_loader::RatingScale;
use factorization::{FactorSnapshot, PopularityTable, Result, SnapshotStore};
use tracing::debug;

/// Default number of recommendations per request.
pub const DEFAULT_TOP_N: usize = 10;

/// Recommend with fold-in against `snapshot` using the default rating scale.
///
/// Pure: the same ratings, snapshot and `top_n` always give the same
/// ordered result.
pub fn recommend(
    ratings: &NewUserRatings,
    snapshot: &FactorSnapshot,
    top_n: usize,
) -> Result<Vec<Recommendation>> {
    Recommender::new().recommend(ratings, snapshot, top_n)
}

/// Configurable request pipeline.
pub struct Recommender {
    scale: RatingScale,
    filter_pipeline: FilterPipeline,
    selector: TopNSelector,
}

impl Recommender {
    pub fn new() -> Self {
        Self {
            scale: RatingScale::default(),
            filter_pipeline: FilterPipeline::new().add_filter(AlreadyRatedFilter),
            selector: TopNSelector,
        }
    }

    /// Configure the accepted rating range (default: 1.0 to 5.0)
    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    /// Fold-in recommendation against a snapshot.
    pub fn recommend(
        &self,
        ratings: &NewUserRatings,
        snapshot: &FactorSnapshot,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        let predictor = FoldInPredictor::new(snapshot).with_scale(self.scale);
        self.recommend_with(&predictor, snapshot.popularity(), ratings, top_n)
    }

    /// Fold-in recommendation against whatever snapshot is live.
    ///
    /// Fails with `SnapshotUnavailable` when nothing is published; it never
    /// falls back to a full refit.
    pub fn recommend_from_store(
        &self,
        ratings: &NewUserRatings,
        store: &SnapshotStore,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        let snapshot = store.current()?;
        self.recommend(ratings, &snapshot, top_n)
    }

    /// Run the pipeline with any cold-start predictor.
    pub fn recommend_with<P>(
        &self,
        predictor: &P,
        popularity: &PopularityTable,
        ratings: &NewUserRatings,
        top_n: usize,
    ) -> Result<Vec<Recommendation>>
    where
        P: ColdStartPredictor + ?Sized,
    {
        let predictions = predictor.predict(ratings)?;
        debug!(
            "{} produced {} predictions",
            predictor.name(),
            predictions.len()
        );

        let eligible = self.filter_pipeline.apply(predictions, ratings)?;
        let reweighted = PopularityReweighter::new(popularity).reweight(eligible);
        let selected = self.selector.select(reweighted, top_n);

        debug!("Selected {} recommendations (top_n {})", selected.len(), top_n);
        Ok(selected.into_iter().map(Recommendation::from).collect())
    }
}

impl Default for Recommender {
    fn default() -> Self {
        Self::new()
    }
}
