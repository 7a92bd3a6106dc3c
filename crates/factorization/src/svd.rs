//! Truncated singular value decomposition of the centered rating matrix.

use crate::error::{RecError, Result};
use nalgebra::{DMatrix, DVector, SVD};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Default number of latent factors.
pub const DEFAULT_RANK: usize = 30;

/// Rank-k factors `(U, Σ, Vᵗ)`.
///
/// `u` is users x k, `sigma` holds the k singular values in descending
/// order and `vt` is k x items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentFactors {
    pub u: DMatrix<f64>,
    pub sigma: DVector<f64>,
    pub vt: DMatrix<f64>,
}

impl LatentFactors {
    pub fn rank(&self) -> usize {
        self.sigma.len()
    }

    /// `Σ·Vᵗ`, the item factors scaled by their singular values (k x items).
    pub fn scaled_item_factors(&self) -> DMatrix<f64> {
        let mut scaled = self.vt.clone();
        for (mut row, &s) in scaled.row_iter_mut().zip(self.sigma.iter()) {
            row *= s;
        }
        scaled
    }

    /// `U·Σ·Vᵗ`, the rank-k approximation of the centered matrix.
    pub fn reconstruct(&self) -> DMatrix<f64> {
        &self.u * self.scaled_item_factors()
    }

    /// Frobenius norm of `centered - U·Σ·Vᵗ`.
    pub fn approximation_error(&self, centered: &DMatrix<f64>) -> f64 {
        (centered - self.reconstruct()).norm()
    }
}

/// Largest rank allowed for a `rows x cols` matrix.
pub fn max_rank(rows: usize, cols: usize) -> usize {
    rows.min(cols).saturating_sub(1)
}

pub fn check_rank(k: usize, rows: usize, cols: usize) -> Result<()> {
    let max = max_rank(rows, cols);
    if k == 0 || k > max {
        return Err(RecError::InvalidRank { k, max });
    }
    Ok(())
}

/// Computes a rank-k decomposition of a centered matrix.
///
/// Implementations must return singular values in descending order and fail
/// with `RecError::Factorization` when their solver does not converge.
pub trait Factorizer: Send + Sync {
    /// Returns the name of this factorizer (for logging/debugging)
    fn name(&self) -> &str;

    fn factorize(&self, centered: &DMatrix<f64>, k: usize) -> Result<LatentFactors>;
}

/// Factorizer backed by nalgebra's SVD.
///
/// The full thin SVD is computed and then truncated to the k largest
/// singular values.
#[derive(Debug, Clone)]
pub struct SvdFactorizer {
    /// Convergence tolerance handed to the solver
    tolerance: f64,
    /// Iteration cap for the solver, 0 means unbounded
    max_iterations: usize,
}

impl SvdFactorizer {
    pub fn new() -> Self {
        Self {
            tolerance: f64::EPSILON,
            max_iterations: 0,
        }
    }

    /// Configure the convergence tolerance (default: f64::EPSILON)
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Configure the iteration cap (default: 0, unbounded)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for SvdFactorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Factorizer for SvdFactorizer {
    fn name(&self) -> &str {
        "SvdFactorizer"
    }

    #[instrument(skip(self, centered), fields(rows = centered.nrows(), cols = centered.ncols()))]
    fn factorize(&self, centered: &DMatrix<f64>, k: usize) -> Result<LatentFactors> {
        check_rank(k, centered.nrows(), centered.ncols())?;

        let svd = SVD::try_new(
            centered.clone(),
            true,
            true,
            self.tolerance,
            self.max_iterations,
        )
        .ok_or_else(|| RecError::Factorization {
            k,
            reason: format!(
                "solver did not converge within {} iterations",
                self.max_iterations
            ),
        })?;

        let u = svd.u.ok_or_else(|| RecError::Factorization {
            k,
            reason: "solver did not return U".to_string(),
        })?;
        let vt = svd.v_t.ok_or_else(|| RecError::Factorization {
            k,
            reason: "solver did not return V^T".to_string(),
        })?;

        let factors = truncate_descending(&u, &svd.singular_values, &vt, k);
        debug!(
            "Factorized at rank {}: leading singular values {:?}",
            k,
            factors.sigma.iter().take(5).collect::<Vec<_>>()
        );
        Ok(factors)
    }
}

/// Keep the k largest singular triplets, ordered by descending singular value.
///
/// Solvers disagree on ordering (some return ascending values), so the
/// order is always rebuilt here. Equal values keep their solver order.
pub fn truncate_descending(
    u: &DMatrix<f64>,
    sigma: &DVector<f64>,
    vt: &DMatrix<f64>,
    k: usize,
) -> LatentFactors {
    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]).then(a.cmp(&b)));
    order.truncate(k);

    LatentFactors {
        u: u.select_columns(order.iter()),
        sigma: DVector::from_iterator(order.len(), order.iter().map(|&i| sigma[i])),
        vt: vt.select_rows(order.iter()),
    }
}
