//! Batch precompute: records -> matrix -> centering -> factors -> snapshot.

use crate::error::{RecError, Result};
use crate::matrix::RatingMatrix;
use crate::popularity::PopularityTable;
use crate::snapshot::FactorSnapshot;
use crate::store::{RebuildTicket, SnapshotStore};
use crate::svd::{Factorizer, LatentFactors};
use data_loader::{Rating, RatingScale};
use nalgebra::DMatrix;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Build a complete snapshot from the full record set, accepting scores on
/// the default 1-5 scale.
///
/// Has no side effects: on failure nothing is published or written.
pub fn precompute<F>(ratings: &[Rating], k: usize, factorizer: &F) -> Result<FactorSnapshot>
where
    F: Factorizer + ?Sized,
{
    precompute_with_scale(ratings, k, RatingScale::default(), factorizer)
}

/// Build a complete snapshot, failing with `InvalidRating` on the first
/// record outside `scale`.
#[instrument(skip(ratings, factorizer), fields(records = ratings.len(), factorizer = factorizer.name()))]
pub fn precompute_with_scale<F>(
    ratings: &[Rating],
    k: usize,
    scale: RatingScale,
    factorizer: &F,
) -> Result<FactorSnapshot>
where
    F: Factorizer + ?Sized,
{
    let matrix = RatingMatrix::from_ratings_with_scale(ratings, scale)?;
    let centered = matrix.center();
    let factors = factorize_with_retry(factorizer, &centered.values, k)?;
    let popularity = PopularityTable::from_ratings(ratings);

    FactorSnapshot::new(
        matrix.users().to_vec(),
        matrix.items().to_vec(),
        centered.means,
        factors,
        popularity,
        k,
    )
}

/// Factorize, retrying once at `k - 1` if the solver does not converge.
pub fn factorize_with_retry<F>(
    factorizer: &F,
    centered: &DMatrix<f64>,
    k: usize,
) -> Result<LatentFactors>
where
    F: Factorizer + ?Sized,
{
    match factorizer.factorize(centered, k) {
        Err(RecError::Factorization { reason, .. }) if k > 1 => {
            warn!(
                "Factorization at rank {} failed ({}), retrying at rank {}",
                k,
                reason,
                k - 1
            );
            factorizer.factorize(centered, k - 1)
        }
        other => other,
    }
}

/// What happened to a precompute job.
#[derive(Debug, Clone)]
pub enum PrecomputeOutcome {
    /// The new snapshot is live
    Published(Arc<FactorSnapshot>),
    /// A newer rebuild started (or rebuilds were cancelled); result dropped
    Superseded { generation: u64 },
}

/// A precompute run bound to a snapshot store.
///
/// The job checks its ticket before the expensive factorization and again
/// at publish time. When a snapshot path is set the snapshot is persisted
/// under the store's write lock, after the final ticket check and before it
/// goes live, so a superseded job never touches the file.
#[derive(Debug, Clone)]
pub struct PrecomputeJob {
    rank: usize,
    scale: RatingScale,
    snapshot_path: Option<PathBuf>,
}

impl PrecomputeJob {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            scale: RatingScale::default(),
            snapshot_path: None,
        }
    }

    /// Configure the accepted rating range (default: 1.0 to 5.0)
    pub fn with_scale(mut self, scale: RatingScale) -> Self {
        self.scale = scale;
        self
    }

    /// Persist each published snapshot to `path`
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn run<F>(
        &self,
        store: &SnapshotStore,
        ticket: RebuildTicket,
        ratings: &[Rating],
        factorizer: &F,
    ) -> Result<PrecomputeOutcome>
    where
        F: Factorizer + ?Sized,
    {
        if !ticket.is_current() {
            return Ok(PrecomputeOutcome::Superseded {
                generation: ticket.generation(),
            });
        }

        let snapshot = precompute_with_scale(ratings, self.rank, self.scale, factorizer)?
            .with_generation(ticket.generation());

        if !ticket.is_current() {
            info!(
                "Precompute generation {} was superseded before publishing",
                ticket.generation()
            );
            return Ok(PrecomputeOutcome::Superseded {
                generation: ticket.generation(),
            });
        }

        let published = match &self.snapshot_path {
            Some(path) => store.publish_with(&ticket, snapshot, |s| s.save(path))?,
            None => store.publish(&ticket, snapshot),
        };

        match published {
            Some(published) => Ok(PrecomputeOutcome::Published(published)),
            None => Ok(PrecomputeOutcome::Superseded {
                generation: ticket.generation(),
            }),
        }
    }
}
