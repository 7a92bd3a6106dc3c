//! # Factorization Crate
//!
//! Offline half of the recommender: turns the full rating record set into an
//! immutable `FactorSnapshot` and publishes it.
//!
//! ## Stages
//! 1. **matrix**: dense zero-filled user x item matrix and row centering
//! 2. **svd**: rank-k truncated SVD behind the `Factorizer` trait
//! 3. **popularity**: per-item `count x mean` table used for damping
//! 4. **snapshot**: the versioned, atomically persisted result
//! 5. **store**: the live snapshot with reference-swap publication
//! 6. **precompute**: the batch job tying the stages together
//!
//! ## Example Usage
//! ```ignore
//! use factorization::{precompute, SnapshotStore, SvdFactorizer, PrecomputeJob};
//!
//! let store = SnapshotStore::new();
//! let job = PrecomputeJob::new(30).with_snapshot_path("precomputed_svd.json");
//! job.run(&store, store.begin_rebuild(), &ratings, &SvdFactorizer::new())?;
//!
//! let snapshot = store.current()?;
//! ```

pub mod error;
pub mod matrix;
pub mod svd;
pub mod popularity;
pub mod snapshot;
pub mod store;
pub mod precompute;

// Re-export main types
pub use error::{RecError, Result};
pub use matrix::{center_rows, check_records, CenteredMatrix, RatingMatrix};
pub use svd::{check_rank, max_rank, Factorizer, LatentFactors, SvdFactorizer, DEFAULT_RANK};
pub use popularity::PopularityTable;
pub use snapshot::{FactorSnapshot, SnapshotSummary, SNAPSHOT_FORMAT_VERSION};
pub use store::{RebuildTicket, SnapshotStore};
pub use precompute::{
    factorize_with_retry, precompute, precompute_with_scale, PrecomputeJob, PrecomputeOutcome,
};
