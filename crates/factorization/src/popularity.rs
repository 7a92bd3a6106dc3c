//! Corpus-wide item popularity.

use data_loader::{ItemId, Rating};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-item popularity, `observed_count x mean_observed_rating`.
///
/// Derived from the full record set and independent of the factorization
/// rank. Items that nobody rated are absent and read as 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopularityTable {
    scores: BTreeMap<ItemId, f64>,
}

impl PopularityTable {
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        let totals = ratings
            .par_iter()
            .fold(
                HashMap::new,
                |mut local: HashMap<ItemId, (u32, f64)>, rating| {
                    let entry = local.entry(rating.item_id).or_insert((0, 0.0));
                    entry.0 += 1;
                    entry.1 += rating.rating as f64;
                    local
                },
            )
            .reduce(HashMap::new, |mut acc, local| {
                for (item_id, (count, sum)) in local {
                    let entry = acc.entry(item_id).or_insert((0, 0.0));
                    entry.0 += count;
                    entry.1 += sum;
                }
                acc
            });

        let scores = totals
            .into_iter()
            .map(|(item_id, (count, sum))| {
                let mean = sum / count as f64;
                (item_id, count as f64 * mean)
            })
            .collect();
        Self { scores }
    }

    /// Popularity of an item, 0 when it was never rated.
    pub fn get(&self, item_id: ItemId) -> f64 {
        self.scores.get(&item_id).copied().unwrap_or(0.0)
    }

    pub fn insert(&mut self, item_id: ItemId, score: f64) {
        self.scores.insert(item_id, score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, f64)> + '_ {
        self.scores.iter().map(|(&item_id, &score)| (item_id, score))
    }
}

impl FromIterator<(ItemId, f64)> for PopularityTable {
    fn from_iter<I: IntoIterator<Item = (ItemId, f64)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}
