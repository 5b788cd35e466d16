//! Noise-free low-rank rating generator for tests, benchmarks and demos.

use crate::init::random_factors;
use crate::model::{dot, EntityId};
use data_loader::Rating;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Ratings `u·v` sampled from uniform ground-truth factors.
///
/// Every user rates item `user % items` and every item is rated by user
/// `item % users`, so no user or item is left without ratings; other cells
/// are kept with probability `density`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticRatings {
    pub users: u32,
    pub items: u32,
    pub rank: usize,
    pub density: f64,
    pub seed: u64,
}

impl SyntheticRatings {
    pub fn new(users: u32, items: u32, rank: usize) -> Self {
        Self {
            users,
            items,
            rank,
            density: 0.5,
            seed: 42,
        }
    }

    /// Configure the fraction of observed cells (default: 0.5)
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Configure the generator seed (default: 42)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn generate(&self) -> Vec<Rating> {
        if self.users == 0 || self.items == 0 {
            return Vec::new();
        }

        let user_ids: Vec<EntityId> = (0..self.users).collect();
        let item_ids: Vec<EntityId> = (0..self.items).collect();
        let user_truth = random_factors(&user_ids, self.rank, self.seed);
        let item_truth = random_factors(&item_ids, self.rank, self.seed.wrapping_add(1));

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut ratings = Vec::new();
        for user in &user_truth {
            for item in &item_truth {
                let guaranteed =
                    item.id == user.id % self.items || user.id == item.id % self.users;
                if guaranteed || rng.random::<f64>() < self.density {
                    ratings.push(Rating::new(
                        user.id,
                        item.id,
                        dot(&user.values, &item.values),
                    ));
                }
            }
        }
        ratings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_entity_rated() {
        let ratings = SyntheticRatings::new(12, 5, 2).with_density(0.0).generate();

        assert_eq!(ratings.len(), 12);
        let items: HashSet<_> = ratings.iter().map(|r| r.item_id).collect();
        assert_eq!(items.len(), 5);
    }

    #[test]
    fn test_more_items_than_users() {
        let ratings = SyntheticRatings::new(3, 6, 2).with_density(0.0).generate();

        let users: HashSet<_> = ratings.iter().map(|r| r.user_id).collect();
        let items: HashSet<_> = ratings.iter().map(|r| r.item_id).collect();
        assert_eq!(users.len(), 3);
        assert_eq!(items.len(), 6);
        assert_eq!(ratings.len(), 6);
    }

    #[test]
    fn test_full_density() {
        let ratings = SyntheticRatings::new(4, 3, 2).with_density(1.0).generate();
        assert_eq!(ratings.len(), 12);
        assert!(ratings.iter().all(|r| r.value >= 0.0 && r.value < 2.0));
    }

    #[test]
    fn test_deterministic() {
        let generator = SyntheticRatings::new(10, 8, 3).with_seed(9);
        assert_eq!(generator.generate(), generator.generate());
        assert_ne!(generator.generate(), generator.with_seed(10).generate());
    }

    #[test]
    fn test_empty_shape() {
        assert!(SyntheticRatings::new(0, 5, 2).generate().is_empty());
    }
}
