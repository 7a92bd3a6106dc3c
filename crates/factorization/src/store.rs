//! Live snapshot holder with atomic publication.
//!
//! Readers clone an `Arc<FactorSnapshot>` under a short read lock and then
//! work without any lock held. Writers build a complete snapshot elsewhere
//! and swap the reference in one step, so a reader sees either the old or
//! the new snapshot in full.
//!
//! Every rebuild takes a `RebuildTicket`. Starting a newer rebuild, or
//! calling `cancel_rebuilds`, supersedes all older tickets and their results
//! are dropped at publish time.

use crate::error::{RecError, Result};
use crate::snapshot::FactorSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<FactorSnapshot>>>,
    latest_generation: Arc<AtomicU64>,
}

/// Handle for one in-flight rebuild.
#[derive(Debug, Clone)]
pub struct RebuildTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RebuildTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer rebuild started or rebuilds were cancelled.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published snapshot, or `SnapshotUnavailable`.
    pub fn current(&self) -> Result<Arc<FactorSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(RecError::SnapshotUnavailable)
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start a rebuild, superseding any rebuild already in flight.
    pub fn begin_rebuild(&self) -> RebuildTicket {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        RebuildTicket {
            generation,
            latest: Arc::clone(&self.latest_generation),
        }
    }

    /// Supersede every in-flight rebuild without starting a new one.
    pub fn cancel_rebuilds(&self) {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Cancelled pending rebuilds (generation now {})", generation);
    }

    /// Publish the result of a rebuild.
    ///
    /// Returns `None`, leaving the live snapshot untouched, when the ticket
    /// has been superseded.
    pub fn publish(
        &self,
        ticket: &RebuildTicket,
        snapshot: FactorSnapshot,
    ) -> Option<Arc<FactorSnapshot>> {
        self.publish_with(ticket, snapshot, |_| Ok(()))
            .unwrap_or_default()
    }

    /// Like `publish`, but runs `persist` on the stamped snapshot while the
    /// write lock is held and the ticket is known to be current.
    ///
    /// Persist failures leave the live snapshot untouched. Rebuilds that
    /// lose the race never reach `persist`.
    pub fn publish_with<P>(
        &self,
        ticket: &RebuildTicket,
        snapshot: FactorSnapshot,
        persist: P,
    ) -> Result<Option<Arc<FactorSnapshot>>>
    where
        P: FnOnce(&FactorSnapshot) -> Result<()>,
    {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !ticket.is_current() {
            warn!(
                "Discarding superseded snapshot from generation {}",
                ticket.generation
            );
            return Ok(None);
        }
        let snapshot = snapshot.with_generation(ticket.generation);
        persist(&snapshot)?;

        let snapshot = Arc::new(snapshot);
        *current = Some(Arc::clone(&snapshot));
        info!(
            "Published factor snapshot generation {} ({} users x {} items, rank {})",
            ticket.generation,
            snapshot.users().len(),
            snapshot.items().len(),
            snapshot.rank()
        );
        Ok(Some(snapshot))
    }

    /// Publish a snapshot that was built or loaded outside a rebuild.
    pub fn install(&self, snapshot: FactorSnapshot) -> Arc<FactorSnapshot> {
        let ticket = self.begin_rebuild();
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Arc::new(snapshot.with_generation(ticket.generation));
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::popularity::PopularityTable;
    use crate::svd::LatentFactors;
    use nalgebra::{DMatrix, DVector};

    fn snapshot() -> FactorSnapshot {
        let factors = LatentFactors {
            u: DMatrix::from_element(2, 1, 1.0),
            sigma: DVector::from_vec(vec![1.0]),
            vt: DMatrix::from_element(1, 2, 1.0),
        };
        FactorSnapshot::new(vec![1, 2], vec![1, 2], vec![0.0, 0.0], factors, PopularityTable::default(), 1)
            .unwrap()
    }

    #[test]
    fn test_empty_store_is_unavailable() {
        let store = SnapshotStore::new();
        assert!(!store.is_loaded());
        assert!(matches!(store.current(), Err(RecError::SnapshotUnavailable)));
    }

    #[test]
    fn test_publish_swaps_snapshot() {
        let store = SnapshotStore::new();
        let ticket = store.begin_rebuild();

        let published = store.publish(&ticket, snapshot()).unwrap();
        assert_eq!(published.generation(), ticket.generation());

        let current = store.current().unwrap();
        assert!(Arc::ptr_eq(&current, &published));
    }

    #[test]
    fn test_readers_keep_old_snapshot_after_swap() {
        let store = SnapshotStore::new();
        let first = store.install(snapshot());
        let held = store.current().unwrap();

        let second = store.install(snapshot());

        assert!(Arc::ptr_eq(&held, &first));
        assert_eq!(held.generation(), first.generation());
        assert!(second.generation() > first.generation());
        assert!(Arc::ptr_eq(&store.current().unwrap(), &second));
    }

    #[test]
    fn test_superseded_rebuild_is_discarded() {
        let store = SnapshotStore::new();
        let old = store.begin_rebuild();
        let new = store.begin_rebuild();

        assert!(!old.is_current());
        assert!(store.publish(&old, snapshot()).is_none());
        assert!(!store.is_loaded());

        assert!(store.publish(&new, snapshot()).is_some());
    }

    #[test]
    fn test_cancel_rebuilds() {
        let store = SnapshotStore::new();
        let previous = store.install(snapshot());
        let ticket = store.begin_rebuild();

        store.cancel_rebuilds();

        assert!(store.publish(&ticket, snapshot()).is_none());
        assert!(Arc::ptr_eq(&store.current().unwrap(), &previous));
    }

    #[test]
    fn test_publish_with_skips_persist_when_superseded() {
        let store = SnapshotStore::new();
        let old = store.begin_rebuild();
        let _new = store.begin_rebuild();

        let mut persisted = false;
        let published = store
            .publish_with(&old, snapshot(), |_| {
                persisted = true;
                Ok(())
            })
            .unwrap();

        assert!(published.is_none());
        assert!(!persisted, "a superseded rebuild must not persist");
    }

    #[test]
    fn test_publish_with_persists_stamped_snapshot() {
        let store = SnapshotStore::new();
        let ticket = store.begin_rebuild();

        let mut seen_generation = 0;
        let published = store
            .publish_with(&ticket, snapshot(), |s| {
                seen_generation = s.generation();
                Ok(())
            })
            .unwrap()
            .unwrap();

        assert_eq!(seen_generation, ticket.generation());
        assert_eq!(published.generation(), ticket.generation());
    }

    #[test]
    fn test_failed_persist_keeps_previous_snapshot() {
        let store = SnapshotStore::new();
        let previous = store.install(snapshot());
        let ticket = store.begin_rebuild();

        let result = store.publish_with(&ticket, snapshot(), |_| {
            Err(RecError::CorruptSnapshot("disk full".to_string()))
        });

        assert!(result.is_err());
        assert!(Arc::ptr_eq(&store.current().unwrap(), &previous));
    }
}
