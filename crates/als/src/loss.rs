//! Reconstruction error evaluated through the engine.

use crate::error::Result;
use crate::model::{dot, EntityId, FactorVector};
use crate::update::{key_factors, KeyedRating};
use dataflow::Engine;

type UserJoined = (EntityId, ((EntityId, f64), Vec<f64>));
type ItemKeyed = (EntityId, (f64, Vec<f64>));
type ItemJoined = (EntityId, ((f64, Vec<f64>), Vec<f64>));

/// `Σ (rating − user·item)²` over every rating whose user and item both
/// have factors.
///
/// `by_user` holds ratings as `(user id, (item id, rating))`.
pub fn squared_error<E: Engine>(
    engine: &E,
    by_user: &E::Dataset<KeyedRating>,
    users: &E::Dataset<FactorVector>,
    items: &E::Dataset<FactorVector>,
) -> Result<f64> {
    let with_user = engine.join::<EntityId, (EntityId, f64), Vec<f64>>(by_user, &key_factors(engine, users));
    let by_item = engine.map::<UserJoined, ItemKeyed, _>(&with_user, |row: &UserJoined| {
        let (_, ((item, rating), user)) = row;
        (*item, (*rating, user.clone()))
    });
    let with_item = engine.join::<EntityId, (f64, Vec<f64>), Vec<f64>>(&by_item, &key_factors(engine, items));
    let residuals = engine.map::<ItemJoined, f64, _>(&with_item, |row: &ItemJoined| {
        let (_, ((rating, user), item)) = row;
        (rating - dot(user, item)).powi(2)
    });

    Ok(engine.collect::<f64>(&residuals)?.iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow::LocalEngine;

    #[test]
    fn test_matches_direct_computation() {
        let engine = LocalEngine::new(2).unwrap();
        let by_user = engine.parallelize(vec![(1u32, (10u32, 5.0)), (2, (10, 2.0)), (3, (10, 1.0))]);
        let users = engine.parallelize(vec![
            FactorVector::new(1, vec![1.0, 2.0]),
            FactorVector::new(2, vec![1.0, 0.0]),
        ]);
        let items = engine.parallelize(vec![FactorVector::new(10, vec![2.0, 1.0])]);

        // (5 - 4)² + (2 - 2)²; user 3 has no factors
        let error = squared_error(&engine, &by_user, &users, &items).unwrap();
        assert!((error - 1.0).abs() < 1e-12);
    }
}
