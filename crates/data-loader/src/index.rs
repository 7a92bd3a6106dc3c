//! RatingIndex loading and validation.

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

impl RatingIndex {
    /// Load a ratings file using the default 1-5 scale.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::load_from_file_with_scale(path, RatingScale::default())
    }

    /// Load a ratings file and validate it against `scale`.
    ///
    /// Steps:
    /// 1. Parse every line into a `Rating`
    /// 2. Build the per-user and per-item indices
    /// 3. Validate that every rating is inside the scale
    pub fn load_from_file_with_scale(path: &Path, scale: RatingScale) -> Result<Self> {
        info!("Loading ratings from {:?}", path);

        let ratings = parser::parse_ratings(path)?;

        let mut index = RatingIndex::with_scale(scale);
        for rating in ratings {
            index.insert_rating(rating);
        }

        index.validate()?;

        let (users, items, ratings) = index.counts();
        info!(
            "Loaded {} ratings from {} users over {} items",
            ratings, users, items
        );
        Ok(index)
    }

    /// Validate data integrity
    ///
    /// Every rating value must lie inside the configured scale. The first
    /// offending rating in input order is reported.
    pub fn validate(&self) -> Result<()> {
        let scale = self.scale;
        let invalid = self
            .ratings
            .par_iter()
            .find_first(|rating| !scale.contains(rating.rating));

        match invalid {
            Some(rating) => Err(DataLoadError::InvalidValue {
                field: "rating".to_string(),
                value: format!(
                    "{} (user {}, item {}, expected {}..={})",
                    rating.rating, rating.user_id, rating.item_id, scale.min, scale.max
                ),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut index = RatingIndex::new();
        index.insert_rating(Rating::new(1, 1, 4.0));
        index.insert_rating(Rating::new(1, 2, 7.0));

        let err = index.validate().unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { .. }));
        assert!(err.to_string().contains("7"));
    }

    #[test]
    fn test_custom_scale() {
        let mut index = RatingIndex::with_scale(RatingScale::new(0.5, 5.0));
        index.insert_rating(Rating::new(1, 1, 0.5));
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "userId,movieId,rating,timestamp").unwrap();
        writeln!(file, "1,10,5,0").unwrap();
        writeln!(file, "1,20,1,0").unwrap();
        writeln!(file, "2,10,4,0").unwrap();

        let index = RatingIndex::load_from_file(file.path()).unwrap();
        assert_eq!(index.counts(), (2, 2, 3));
        assert_eq!(index.user_ratings(1).len(), 2);
        assert_eq!(index.get_item_ratings(10).len(), 2);
    }

    #[test]
    fn test_load_rejects_invalid_rating() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1,10,9,0").unwrap();

        let result = RatingIndex::load_from_file(file.path());
        assert!(result.is_err());
    }
}
