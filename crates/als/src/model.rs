//! Factor vectors and the final factorization.

use crate::error::Result;
use data_loader::{ItemId, Rating, UserId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Id of a user or an item, depending on which side a collection describes
pub type EntityId = u32;

/// Latent factors of one entity.
///
/// A new generation of vectors is produced by every half-iteration; vectors
/// are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorVector {
    pub id: EntityId,
    pub values: Vec<f64>,
}

impl FactorVector {
    pub fn new(id: EntityId, values: Vec<f64>) -> Self {
        Self { id, values }
    }

    pub fn rank(&self) -> usize {
        self.values.len()
    }

    pub fn dot(&self, other: &FactorVector) -> f64 {
        dot(&self.values, &other.values)
    }

    pub fn norm(&self) -> f64 {
        dot(&self.values, &self.values).sqrt()
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Result of a training run: one factor vector per user and per item.
///
/// Both collections are sorted by id, so lookups are binary searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factorization {
    pub rank: usize,
    pub user_factors: Vec<FactorVector>,
    pub item_factors: Vec<FactorVector>,
}

impl Factorization {
    pub fn new(
        rank: usize,
        mut user_factors: Vec<FactorVector>,
        mut item_factors: Vec<FactorVector>,
    ) -> Self {
        user_factors.sort_by_key(|f| f.id);
        item_factors.sort_by_key(|f| f.id);
        Self {
            rank,
            user_factors,
            item_factors,
        }
    }

    pub fn user_factor(&self, user_id: UserId) -> Option<&FactorVector> {
        lookup(&self.user_factors, user_id)
    }

    pub fn item_factor(&self, item_id: ItemId) -> Option<&FactorVector> {
        lookup(&self.item_factors, item_id)
    }

    /// Predicted rating, or `None` if either side has no factors
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        let user = self.user_factor(user_id)?;
        let item = self.item_factor(item_id)?;
        Some(user.dot(item))
    }

    /// `Σ (rating − user·item)²` over the ratings both of whose entities
    /// have factors
    pub fn reconstruction_error(&self, ratings: &[Rating]) -> f64 {
        ratings
            .iter()
            .filter_map(|r| {
                self.predict(r.user_id, r.item_id)
                    .map(|p| (r.value - p).powi(2))
            })
            .sum()
    }

    /// Root mean squared error over `ratings` (0 for an empty slice)
    pub fn rmse(&self, ratings: &[Rating]) -> f64 {
        if ratings.is_empty() {
            return 0.0;
        }
        (self.reconstruction_error(ratings) / ratings.len() as f64).sqrt()
    }

    /// Write the factorization as JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a factorization written by [`Factorization::save_json`]
    pub fn load_json(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn lookup(factors: &[FactorVector], id: EntityId) -> Option<&FactorVector> {
    factors
        .binary_search_by_key(&id, |f| f.id)
        .ok()
        .map(|idx| &factors[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Factorization {
        Factorization::new(
            2,
            vec![
                FactorVector::new(2, vec![1.0, 0.0]),
                FactorVector::new(1, vec![1.0, 2.0]),
            ],
            vec![FactorVector::new(10, vec![2.0, 1.0])],
        )
    }

    #[test]
    fn test_sorted_lookup() {
        let model = sample();
        assert_eq!(model.user_factors[0].id, 1);
        assert_eq!(model.user_factor(2).unwrap().values, vec![1.0, 0.0]);
        assert!(model.user_factor(3).is_none());
    }

    #[test]
    fn test_predict() {
        let model = sample();
        assert_eq!(model.predict(1, 10), Some(4.0));
        assert_eq!(model.predict(2, 10), Some(2.0));
        assert_eq!(model.predict(1, 11), None);
    }

    #[test]
    fn test_reconstruction_error_and_rmse() {
        let model = sample();
        let ratings = vec![Rating::new(1, 10, 5.0), Rating::new(2, 10, 2.0)];

        assert!((model.reconstruction_error(&ratings) - 1.0).abs() < 1e-12);
        assert!((model.rmse(&ratings) - 0.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(model.rmse(&[]), 0.0);
    }

    #[test]
    fn test_norm() {
        let v = FactorVector::new(1, vec![3.0, 4.0]);
        assert_eq!(v.rank(), 2);
        assert!((v.norm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = sample();

        model.save_json(&path).unwrap();
        assert_eq!(Factorization::load_json(&path).unwrap(), model);
    }
}
