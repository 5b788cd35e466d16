//! RatingIndex loading, validation and statistics.
//!
//! Rust concepts you'll see here:
//! - Using Rayon for parallel aggregation
//! - Iterator methods (map, fold, reduce)
//! - Returning `Result` from validation

use crate::error::{DataLoadError, Result};
use crate::parser::{self, RatingFormat};
use crate::types::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

impl RatingIndex {
    /// Load a ratings file and build the index
    ///
    /// Steps:
    /// 1. Parse the file (in parallel)
    /// 2. Build the user / item adjacency
    /// 3. Validate that the file was not empty
    pub fn load_from_file(path: &Path, format: RatingFormat) -> Result<Self> {
        info!("Loading ratings from {:?} ({})", path, format);

        let ratings = parser::parse_ratings(path, format)?;
        let index = RatingIndex::from_ratings(ratings);
        index.validate().map_err(|err| match err {
            DataLoadError::Empty(_) => DataLoadError::Empty(path.display().to_string()),
            other => other,
        })?;

        let (users, items, ratings) = index.counts();
        info!("Loaded {} users, {} items, {} ratings", users, items, ratings);
        Ok(index)
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - There is at least one rating
    /// - Every rating value is finite
    pub fn validate(&self) -> Result<()> {
        if self.ratings.is_empty() {
            return Err(DataLoadError::Empty("rating index".to_string()));
        }
        if let Some(bad) = self.ratings.par_iter().find_any(|r| !r.value.is_finite()) {
            return Err(DataLoadError::InvalidValue {
                field: format!("rating of user {} for item {}", bad.user_id, bad.item_id),
                value: bad.value.to_string(),
            });
        }
        Ok(())
    }

    /// Compute summary statistics over all ratings
    ///
    /// Returns `None` for an empty index.
    pub fn stats(&self) -> Option<RatingStats> {
        if self.ratings.is_empty() {
            return None;
        }

        let (sum, min, max) = self
            .ratings
            .par_iter()
            .map(|r| (r.value, r.value, r.value))
            .reduce(
                || (0.0, f64::INFINITY, f64::NEG_INFINITY),
                |a, b| (a.0 + b.0, a.1.min(b.1), a.2.max(b.2)),
            );

        let (users, items, ratings) = self.counts();
        Some(RatingStats {
            users,
            items,
            ratings,
            mean: sum / ratings as f64,
            min,
            max,
            density: ratings as f64 / (users as f64 * items as f64),
        })
    }

    /// Number of ratings per user, sorted by user id
    pub fn ratings_per_user(&self) -> Vec<(UserId, usize)> {
        let mut counts: Vec<_> = self
            .user_ratings
            .iter()
            .map(|(&id, positions)| (id, positions.len()))
            .collect();
        counts.sort_unstable();
        counts
    }

    /// Number of ratings per item, sorted by item id
    pub fn ratings_per_item(&self) -> Vec<(ItemId, usize)> {
        let mut counts: Vec<_> = self
            .item_ratings
            .iter()
            .map(|(&id, positions)| (id, positions.len()))
            .collect();
        counts.sort_unstable();
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> RatingIndex {
        RatingIndex::from_ratings(vec![
            Rating::new(1, 1, 5.0),
            Rating::new(1, 2, 3.0),
            Rating::new(2, 1, 4.0),
            Rating::new(3, 2, 2.0),
        ])
    }

    #[test]
    fn test_stats() {
        let stats = sample_index().stats().unwrap();

        assert_eq!(stats.users, 3);
        assert_eq!(stats.items, 2);
        assert_eq!(stats.ratings, 4);
        assert!((stats.mean - 3.5).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.density - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_stats_empty() {
        assert!(RatingIndex::new().stats().is_none());
    }

    #[test]
    fn test_validate_rejects_empty_and_non_finite() {
        assert!(matches!(
            RatingIndex::new().validate(),
            Err(DataLoadError::Empty(_))
        ));

        let index = RatingIndex::from_ratings(vec![Rating::new(1, 1, f64::INFINITY)]);
        assert!(matches!(
            index.validate(),
            Err(DataLoadError::InvalidValue { .. })
        ));

        assert!(sample_index().validate().is_ok());
    }

    #[test]
    fn test_per_entity_counts() {
        let index = sample_index();
        assert_eq!(index.ratings_per_user(), vec![(1, 2), (2, 1), (3, 1)]);
        assert_eq!(index.ratings_per_item(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.csv");
        std::fs::write(&path, "userId,itemId,rating\n1,1,5\n2,1,4\n").unwrap();

        let index = RatingIndex::load_from_file(&path, RatingFormat::Csv).unwrap();
        assert_eq!(index.counts(), (2, 1, 2));
    }

    #[test]
    fn test_load_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.dat");
        std::fs::write(&path, "\n").unwrap();

        let err = RatingIndex::load_from_file(&path, RatingFormat::Dat).unwrap_err();
        assert!(matches!(err, DataLoadError::Empty(p) if p.ends_with("ratings.dat")));
    }
}
