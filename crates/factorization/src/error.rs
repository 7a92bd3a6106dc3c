//! Error taxonomy for the recommender core.

use data_loader::ItemId;
use thiserror::Error;

/// Typed failures raised by precompute, persistence and prediction.
///
/// None of these are defaulted away by the core: a missing snapshot in
/// particular is reported, never silently replaced by a full refit.
#[derive(Error, Debug)]
pub enum RecError {
    /// No rating records were supplied
    #[error("cannot build a rating matrix from an empty dataset")]
    EmptyDataset,

    /// The matrix has fewer than two rows or two columns
    #[error("rating matrix is degenerate: {rows} users x {cols} items (need at least 2 x 2)")]
    DegenerateAxis { rows: usize, cols: usize },

    /// Requested rank outside `1..=min(rows, cols) - 1`
    #[error("rank {k} is out of range (must be between 1 and {max})")]
    InvalidRank { k: usize, max: usize },

    /// The numeric solver did not converge
    #[error("factorization at rank {k} failed: {reason}")]
    Factorization { k: usize, reason: String },

    /// Fold-in was requested but no snapshot has been published or loaded
    #[error("no factor snapshot is available; run precompute first")]
    SnapshotUnavailable,

    /// A rating supplied at request time is out of range or references an unknown item
    #[error("invalid rating for item {item_id} ({score}): {reason}")]
    InvalidRating {
        item_id: ItemId,
        score: f32,
        reason: String,
    },

    /// Persisted snapshot was written by an incompatible format version
    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Persisted snapshot is internally inconsistent
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecError>;
