//! # Recommendation Service
//!
//! Coordinates the batch and request sides of the recommender:
//! 1. Precompute re-reads every rating, factorizes off the async runtime,
//!    persists the snapshot and swaps it in
//! 2. Requests fold the new user into whatever snapshot is live
//! 3. Full refit is available as an explicit, expensive baseline
//!
//! The live snapshot sits in a shared `SnapshotStore`. Rebuilds take a
//! generation ticket so a slow, stale rebuild can never overwrite a newer one.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use data_loader::RatingStore;
use factorization::{FactorSnapshot, PrecomputeJob, PrecomputeOutcome, SnapshotStore};
use pipeline::{FullRefitPredictor, NewUserRatings, Recommendation, Recommender};

use crate::config::RecommenderConfig;

#[derive(Clone)]
pub struct RecommendationService {
    ratings: Arc<dyn RatingStore>,
    store: Arc<SnapshotStore>,
    recommender: Arc<Recommender>,
    config: Arc<RecommenderConfig>,
}

impl RecommendationService {
    pub fn new(ratings: Arc<dyn RatingStore>, config: RecommenderConfig) -> Self {
        let recommender = Recommender::new().with_scale(config.scale());
        Self {
            ratings,
            store: Arc::new(SnapshotStore::new()),
            recommender: Arc::new(recommender),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Load the persisted snapshot if there is one, otherwise precompute.
    pub async fn initialize(&self) -> Result<Arc<FactorSnapshot>> {
        let path = self.config.snapshot_path.clone();
        if path.exists() {
            match self.load_snapshot(&path) {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => warn!("Ignoring unusable snapshot at {}: {:#}", path.display(), e),
            }
        }

        match self.precompute().await? {
            PrecomputeOutcome::Published(snapshot) => Ok(snapshot),
            PrecomputeOutcome::Superseded { generation } => {
                info!("Initial precompute {} superseded", generation);
                self.current_snapshot()
            }
        }
    }

    /// Rebuild the snapshot from the full rating set.
    ///
    /// Starting a precompute supersedes any rebuild already running. On
    /// failure the previously published snapshot stays live.
    pub async fn precompute(&self) -> Result<PrecomputeOutcome> {
        let start_time = Instant::now();
        let ticket = self.store.begin_rebuild();
        let generation = ticket.generation();
        info!("Starting precompute generation {}", generation);

        let ratings = Arc::clone(&self.ratings);
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);

        let outcome = tokio::task::spawn_blocking(move || {
            let records = ratings.all_ratings();
            let job = PrecomputeJob::new(config.rank)
                .with_scale(config.scale())
                .with_snapshot_path(&config.snapshot_path);
            job.run(&store, ticket, &records, &config.factorizer())
        })
        .await
        .context("Precompute task panicked")?
        .with_context(|| format!("Precompute generation {} failed", generation))?;

        let elapsed = start_time.elapsed();
        match &outcome {
            PrecomputeOutcome::Published(snapshot) => info!(
                "Precompute generation {} published in {:.2?} (rank {})",
                generation,
                elapsed,
                snapshot.rank()
            ),
            PrecomputeOutcome::Superseded { .. } => info!(
                "Precompute generation {} superseded after {:.2?}",
                generation, elapsed
            ),
        }
        Ok(outcome)
    }

    /// Fold-in recommendations against the live snapshot.
    pub fn recommend(
        &self,
        ratings: &NewUserRatings,
        top_n: Option<usize>,
    ) -> Result<Vec<Recommendation>> {
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        self.recommender
            .recommend_from_store(ratings, &self.store, top_n)
            .context("Failed to recommend from snapshot")
    }

    /// Recommendations from a complete refit that includes the new user.
    ///
    /// Independent of the live snapshot; costs a full factorization.
    pub async fn refit_recommend(
        &self,
        ratings: NewUserRatings,
        top_n: Option<usize>,
    ) -> Result<Vec<Recommendation>> {
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        let start_time = Instant::now();

        let store = Arc::clone(&self.ratings);
        let recommender = Arc::clone(&self.recommender);
        let config = Arc::clone(&self.config);

        let recommendations = tokio::task::spawn_blocking(move || {
            let records = store.all_ratings();
            let refit = FullRefitPredictor::with_factorizer(
                &records,
                config.rank,
                config.scale(),
                config.factorizer(),
            )?;
            recommender.recommend_with(&refit, refit.popularity(), &ratings, top_n)
        })
        .await
        .context("Refit task panicked")?
        .context("Failed to recommend from full refit")?;

        info!(
            "Full refit produced {} recommendations in {:.2?}",
            recommendations.len(),
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    /// Load a persisted snapshot and make it live.
    pub fn load_snapshot(&self, path: &Path) -> Result<Arc<FactorSnapshot>> {
        let snapshot = FactorSnapshot::load(path)
            .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
        let snapshot = self.store.install(snapshot);
        info!(
            "Loaded snapshot from {} as generation {}",
            path.display(),
            snapshot.generation()
        );
        Ok(snapshot)
    }

    pub fn current_snapshot(&self) -> Result<Arc<FactorSnapshot>> {
        self.store
            .current()
            .context("No factor snapshot has been published")
    }

    /// Supersede every in-flight precompute; their results are discarded.
    pub fn cancel_rebuilds(&self) {
        self.store.cancel_rebuilds();
    }
}
