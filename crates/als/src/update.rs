//! The ALS update step.
//!
//! Given ratings keyed by the *opposite* entity and the opposite side's
//! current factors, recompute this side's factors:
//!
//! 1. join ratings with opposite factors on the opposite id
//! 2. re-key every joined row by the target id and group
//! 3. solve each group's regularized normal equations
//!
//! An entity with no ratings never reaches step 2 and is absent from the
//! output.

use crate::error::EntitySolveError;
use crate::model::{EntityId, FactorVector};
use crate::solve::solve_ridge;
use dataflow::Engine;
use tracing::instrument;

/// `(opposite id, (target id, rating))`: a rating keyed for a join against
/// the opposite side's factors
pub type KeyedRating = (EntityId, (EntityId, f64));

/// Factor values keyed by their owner's id, ready for a join
pub type KeyedFactor = (EntityId, Vec<f64>);

/// Joined row: `(opposite id, ((target id, rating), opposite factor))`
type JoinedRow = (EntityId, ((EntityId, f64), Vec<f64>));

/// One observation for a target entity: the rating and the opposite factor
type Observation = (f64, Vec<f64>);

pub fn key_factors<E: Engine>(engine: &E, factors: &E::Dataset<FactorVector>) -> E::Dataset<KeyedFactor> {
    engine.map::<FactorVector, KeyedFactor, _>(factors, |f: &FactorVector| {
        (f.id, f.values.clone())
    })
}

/// Recompute one side's factor vectors from the opposite side's.
///
/// The returned dataset is lazy; solve failures surface when it is evaluated.
#[instrument(level = "trace", skip(engine, ratings, opposite))]
pub fn update_factors<E: Engine>(
    engine: &E,
    ratings: &E::Dataset<KeyedRating>,
    opposite: &E::Dataset<FactorVector>,
    rank: usize,
    lambda: f64,
) -> E::Dataset<FactorVector> {
    let keyed = key_factors(engine, opposite);
    let joined = engine.join::<EntityId, (EntityId, f64), Vec<f64>>(ratings, &keyed);

    let by_target = engine.map::<JoinedRow, (EntityId, Observation), _>(&joined, |row: &JoinedRow| {
        let (_, ((target, rating), factor)) = row;
        (*target, (*rating, factor.clone()))
    });
    let groups = engine.group_by_key::<EntityId, Observation>(&by_target);

    engine.try_map::<(EntityId, Vec<Observation>), FactorVector, EntitySolveError, _>(
        &groups,
        move |(id, observations): &(EntityId, Vec<Observation>)| {
            solve_ridge(observations, rank, lambda)
                .map(|values| FactorVector::new(*id, values))
                .map_err(|source| EntitySolveError { id: *id, source })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolveError;
    use dataflow::{DataflowError, LocalEngine};

    fn engine() -> LocalEngine {
        LocalEngine::new(3).unwrap()
    }

    #[test]
    fn test_single_user_closed_form() {
        // User 1 rated item 10 (factor [1, 0]) with 4 and item 11 (factor [0, 2]) with 2.
        let engine = engine();
        let ratings = engine.parallelize(vec![(10u32, (1u32, 4.0)), (11, (1, 2.0))]);
        let items = engine.parallelize(vec![
            FactorVector::new(10, vec![1.0, 0.0]),
            FactorVector::new(11, vec![0.0, 2.0]),
        ]);

        let users = engine
            .collect(&update_factors(&engine, &ratings, &items, 2, 0.5))
            .unwrap();

        // M = diag(1 + 1, 4 + 1), b = (4, 4)
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1);
        assert!((users[0].values[0] - 2.0).abs() < 1e-12);
        assert!((users[0].values[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_one_output_per_rated_target() {
        let engine = engine();
        let ratings = engine.parallelize(vec![
            (10u32, (1u32, 5.0)),
            (10, (2, 4.0)),
            (11, (1, 3.0)),
            (11, (3, 2.0)),
        ]);
        let items = engine.parallelize(vec![
            FactorVector::new(10, vec![0.5, 0.1]),
            FactorVector::new(11, vec![0.2, 0.9]),
            FactorVector::new(12, vec![0.7, 0.7]),
        ]);

        let mut users = engine
            .collect(&update_factors(&engine, &ratings, &items, 2, 0.1))
            .unwrap();
        users.sort_by_key(|f| f.id);

        assert_eq!(users.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(users.iter().all(|f| f.rank() == 2));
        assert!(users.iter().flat_map(|f| &f.values).all(|v| v.is_finite()));
    }

    #[test]
    fn test_ratings_without_opposite_factor_are_dropped() {
        let engine = engine();
        let ratings = engine.parallelize(vec![(10u32, (1u32, 5.0)), (99, (2, 4.0))]);
        let items = engine.parallelize(vec![FactorVector::new(10, vec![1.0])]);

        let users = engine
            .collect(&update_factors(&engine, &ratings, &items, 1, 0.1))
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1);
    }

    #[test]
    fn test_singular_group_fails_with_entity_id() {
        let engine = engine();
        let ratings = engine.parallelize(vec![(10u32, (7u32, 5.0))]);
        let items = engine.parallelize(vec![FactorVector::new(10, vec![1.0, 1.0])]);

        let result = engine.collect(&update_factors(&engine, &ratings, &items, 2, 0.0));
        match result {
            Err(DataflowError::TaskFailed { source, .. }) => {
                let err = source.downcast::<EntitySolveError>().unwrap();
                assert_eq!(err.id, 7);
                assert_eq!(err.source, SolveError::NotPositiveDefinite { observations: 1 });
            }
            other => panic!("expected solve failure, got {other:?}"),
        }
    }
}
