//! Immutable, versioned factor snapshot and its on-disk form.
//!
//! A snapshot bundles everything one precompute produced: the latent
//! factors, the centering means, both axis label lists and the popularity
//! table. It is written as a single JSON blob to a sibling temporary file
//! and renamed over the target, so a reader never sees a half-written file.

use crate::error::{RecError, Result};
use crate::popularity::PopularityTable;
use crate::svd::LatentFactors;
use data_loader::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk format version written by this build.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// One complete set of trained factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSnapshot {
    version: u32,
    /// Rebuild generation that produced this snapshot (0 if never published)
    generation: u64,
    /// Rank asked for; `factors.rank()` is lower when precompute retried
    requested_rank: usize,
    users: Vec<UserId>,
    items: Vec<ItemId>,
    user_means: Vec<f64>,
    factors: LatentFactors,
    popularity: PopularityTable,
}

/// Short description of a snapshot for logs and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSummary {
    pub generation: u64,
    pub users: usize,
    pub items: usize,
    pub rank: usize,
    pub requested_rank: usize,
    pub leading_singular_values: Vec<f64>,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl FactorSnapshot {
    /// Assemble a snapshot, checking that every part agrees on its shape.
    pub fn new(
        users: Vec<UserId>,
        items: Vec<ItemId>,
        user_means: Vec<f64>,
        factors: LatentFactors,
        popularity: PopularityTable,
        requested_rank: usize,
    ) -> Result<Self> {
        let snapshot = Self {
            version: SNAPSHOT_FORMAT_VERSION,
            generation: 0,
            requested_rank,
            users,
            items,
            user_means,
            factors,
            popularity,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Same snapshot stamped with the rebuild generation that produced it.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rank(&self) -> usize {
        self.factors.rank()
    }

    pub fn requested_rank(&self) -> usize {
        self.requested_rank
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn user_means(&self) -> &[f64] {
        &self.user_means
    }

    pub fn factors(&self) -> &LatentFactors {
        &self.factors
    }

    pub fn popularity(&self) -> &PopularityTable {
        &self.popularity
    }

    pub fn item_index(&self, item_id: ItemId) -> Option<usize> {
        self.items.binary_search(&item_id).ok()
    }

    pub fn user_index(&self, user_id: UserId) -> Option<usize> {
        self.users.binary_search(&user_id).ok()
    }

    /// De-centered reconstructed ratings for a user that was in the training
    /// matrix, one value per item in item-axis order.
    pub fn reconstruct_user(&self, user_id: UserId) -> Option<Vec<f64>> {
        let row = self.user_index(user_id)?;
        let user_factors = self.factors.u.row(row);
        let scaled = self.factors.scaled_item_factors();
        let mean = self.user_means[row];
        Some(
            (user_factors * scaled)
                .iter()
                .map(|value| value + mean)
                .collect(),
        )
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            generation: self.generation,
            users: self.users.len(),
            items: self.items.len(),
            rank: self.rank(),
            requested_rank: self.requested_rank,
            leading_singular_values: self.factors.sigma.iter().take(5).copied().collect(),
        }
    }

    /// Write the snapshot atomically: temp file, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path, self.generation)?;
        if let Err(e) = self.write_to(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        info!(
            "Saved factor snapshot (generation {}, rank {}) to {:?}",
            self.generation,
            self.rank(),
            path
        );
        Ok(())
    }

    /// Read and validate a snapshot written by `save`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;

        let header: VersionHeader = serde_json::from_str(&content)?;
        if header.version != SNAPSHOT_FORMAT_VERSION {
            return Err(RecError::UnsupportedVersion {
                found: header.version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let snapshot: FactorSnapshot = serde_json::from_str(&content)?;
        snapshot.validate()?;
        debug!(
            "Loaded factor snapshot: {} users x {} items at rank {}",
            snapshot.users.len(),
            snapshot.items.len(),
            snapshot.rank()
        );
        Ok(snapshot)
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let LatentFactors { u, sigma, vt } = &self.factors;
        let corrupt = |reason: String| Err(RecError::CorruptSnapshot(reason));

        if sigma.is_empty() {
            return corrupt("rank is zero".to_string());
        }
        if u.nrows() != self.users.len() || self.user_means.len() != self.users.len() {
            return corrupt(format!(
                "{} users but U has {} rows and {} means",
                self.users.len(),
                u.nrows(),
                self.user_means.len()
            ));
        }
        if vt.ncols() != self.items.len() {
            return corrupt(format!(
                "{} items but V^T has {} columns",
                self.items.len(),
                vt.ncols()
            ));
        }
        if u.ncols() != sigma.len() || vt.nrows() != sigma.len() {
            return corrupt(format!(
                "rank mismatch: U has {} columns, sigma {} values, V^T {} rows",
                u.ncols(),
                sigma.len(),
                vt.nrows()
            ));
        }
        if sigma.as_slice().windows(2).any(|pair| pair[0] < pair[1]) {
            return corrupt("singular values are not in descending order".to_string());
        }
        if !is_strictly_ascending(&self.users) || !is_strictly_ascending(&self.items) {
            return corrupt("axis labels are not strictly ascending".to_string());
        }
        Ok(())
    }
}

fn is_strictly_ascending(ids: &[u32]) -> bool {
    ids.windows(2).all(|pair| pair[0] < pair[1])
}

/// `<name>.<generation>.tmp` next to `path`.
fn temp_path(path: &Path, generation: u64) -> Result<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("snapshot path {:?} has no file name", path),
            )
        })?
        .to_os_string();
    name.push(format!(".{}.tmp", generation));
    Ok(path.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn small_snapshot() -> FactorSnapshot {
        let factors = LatentFactors {
            u: DMatrix::from_row_slice(3, 1, &[0.5, 0.25, -0.5]),
            sigma: DVector::from_vec(vec![4.0]),
            vt: DMatrix::from_row_slice(1, 2, &[1.0, -1.0]),
        };
        let popularity: PopularityTable = [(1, 10.0), (2, 8.0)].into_iter().collect();
        FactorSnapshot::new(vec![1, 2, 3], vec![1, 2], vec![3.0, 3.0, 3.0], factors, popularity, 1)
            .unwrap()
    }

    #[test]
    fn test_reconstruct_user() {
        let snapshot = small_snapshot();
        let row = snapshot.reconstruct_user(1).unwrap();
        assert_eq!(row, vec![5.0, 1.0]);
        assert!(snapshot.reconstruct_user(42).is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = small_snapshot().with_generation(7);

        snapshot.save(&path).unwrap();
        let loaded = FactorSnapshot::load(&path).unwrap();

        assert_eq!(loaded, snapshot);
        assert!(!dir.path().join("snapshot.json.7.tmp").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        small_snapshot().with_generation(1).save(&path).unwrap();
        small_snapshot().with_generation(2).save(&path).unwrap();

        assert_eq!(FactorSnapshot::load(&path).unwrap().generation(), 2);
    }

    #[test]
    fn test_load_rejects_other_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, r#"{"version": 99}"#).unwrap();

        let err = FactorSnapshot::load(&path).unwrap_err();
        assert!(matches!(err, RecError::UnsupportedVersion { found: 99, expected: 1 }));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FactorSnapshot::load(&path),
            Err(RecError::Serialization(_))
        ));
    }

    #[test]
    fn test_new_rejects_shape_mismatch() {
        let factors = LatentFactors {
            u: DMatrix::zeros(2, 1),
            sigma: DVector::from_vec(vec![1.0]),
            vt: DMatrix::zeros(1, 2),
        };
        let result = FactorSnapshot::new(
            vec![1, 2, 3],
            vec![1, 2],
            vec![0.0; 3],
            factors,
            PopularityTable::default(),
            1,
        );
        assert!(matches!(result, Err(RecError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_summary() {
        let summary = small_snapshot().summary();
        assert_eq!(summary.users, 3);
        assert_eq!(summary.items, 2);
        assert_eq!(summary.rank, 1);
        assert_eq!(summary.leading_singular_values, vec![4.0]);
    }
}
