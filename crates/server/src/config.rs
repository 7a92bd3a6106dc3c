//! Service configuration.
//!
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```json
//! { "rank": 20, "snapshot_path": "/var/lib/latent-recs/factors.json" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use data_loader::RatingScale;
use factorization::{SvdFactorizer, DEFAULT_RANK};
use pipeline::DEFAULT_TOP_N;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Number of latent dimensions kept by the factorization
    pub rank: usize,
    pub rating_min: f32,
    pub rating_max: f32,
    /// Used when a request does not ask for a specific N
    pub default_top_n: usize,
    /// Solver iteration cap, 0 means unbounded
    pub svd_max_iterations: usize,
    pub svd_tolerance: f64,
    /// Where precompute persists the snapshot
    pub snapshot_path: PathBuf,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            rank: DEFAULT_RANK,
            rating_min: 1.0,
            rating_max: 5.0,
            default_top_n: DEFAULT_TOP_N,
            svd_max_iterations: 0,
            svd_tolerance: f64::EPSILON,
            snapshot_path: PathBuf::from("precomputed_svd.json"),
        }
    }
}

impl RecommenderConfig {
    /// Load and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_rating_range(mut self, min: f32, max: f32) -> Self {
        self.rating_min = min;
        self.rating_max = max;
        self
    }

    pub fn with_default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    pub fn with_svd_max_iterations(mut self, max_iterations: usize) -> Self {
        self.svd_max_iterations = max_iterations;
        self
    }

    pub fn with_svd_tolerance(mut self, tolerance: f64) -> Self {
        self.svd_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.rank >= 1, "rank must be at least 1");
        ensure!(self.default_top_n >= 1, "default_top_n must be at least 1");
        ensure!(
            self.rating_min < self.rating_max,
            "rating_min ({}) must be below rating_max ({})",
            self.rating_min,
            self.rating_max
        );
        ensure!(
            self.svd_tolerance.is_finite() && self.svd_tolerance > 0.0,
            "svd_tolerance must be a positive number"
        );
        Ok(())
    }

    pub fn scale(&self) -> RatingScale {
        RatingScale::new(self.rating_min, self.rating_max)
    }

    pub fn factorizer(&self) -> SvdFactorizer {
        SvdFactorizer::new()
            .with_tolerance(self.svd_tolerance)
            .with_max_iterations(self.svd_max_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RecommenderConfig::default();
        assert_eq!(config.rank, 30);
        assert_eq!(config.default_top_n, 10);
        assert_eq!(config.snapshot_path, PathBuf::from("precomputed_svd.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "rank": 12, "rating_max": 10.0 }}"#).unwrap();

        let config = RecommenderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.rank, 12);
        assert_eq!(config.rating_max, 10.0);
        assert_eq!(config.rating_min, 1.0);
        assert_eq!(config.default_top_n, 10);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let config = RecommenderConfig::default().with_rating_range(5.0, 1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = RecommenderConfig::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/config.json"));
    }
}
