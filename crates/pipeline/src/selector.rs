//! Top-N selection.

use crate::types::Candidate;
use std::cmp::Ordering;

/// Orders candidates by score and keeps the best N.
///
/// Ties break on ascending item id so the output is fully deterministic.
/// NaN scores rank below every real score.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopNSelector;

impl TopNSelector {
    /// Sort and truncate. `top_n` is clamped to `[1, candidates.len()]`;
    /// an empty input yields an empty output.
    pub fn select(&self, mut candidates: Vec<Candidate>, top_n: usize) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }
        let n = top_n.clamp(1, candidates.len());
        candidates.sort_by(compare);
        candidates.truncate(n);
        candidates
    }
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() { f64::NEG_INFINITY } else { score }
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    rank_key(b.score)
        .total_cmp(&rank_key(a.score))
        .then_with(|| a.item_id.cmp(&b.item_id))
}
