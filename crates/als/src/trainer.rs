//! ALS iteration controller.
//!
//! ## Algorithm
//! 1. Key the ratings by item (to update users) and by user (to update
//!    items); persist both, they are re-joined on every iteration
//! 2. Draw random item factors for every distinct item
//! 3. `iterations` times: update users from items, then items from users
//! 4. One final user update against the last item factors
//!
//! The loop is a fold over immutable (users, items) generations. Each half-step
//! is materialized before the next one starts, so an iteration only ever
//! reads a finished generation of the opposite side.

use crate::config::AlsConfig;
use crate::error::{AlsError, Result};
use crate::init::initialize_factors;
use crate::loss::squared_error;
use crate::model::{EntityId, FactorVector, Factorization};
use crate::update::{update_factors, KeyedRating};
use data_loader::Rating;
use dataflow::Engine;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// One generation of factors for both sides
struct FactorState<E: Engine> {
    iteration: usize,
    users: E::Dataset<FactorVector>,
    items: E::Dataset<FactorVector>,
}

/// Training loss after one full (users, items) alternation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationStats {
    pub iteration: usize,
    pub squared_error: f64,
    pub rmse: f64,
}

/// Ratings derived once per run and reused by every iteration
struct PreparedRatings<E: Engine> {
    /// `(item, (user, rating))`: input for user updates
    by_item: E::Dataset<KeyedRating>,
    /// `(user, (item, rating))`: input for item updates
    by_user: E::Dataset<KeyedRating>,
    item_ids: E::Dataset<EntityId>,
    count: usize,
}

/// Runs ALS on any [`Engine`]
pub struct AlsTrainer<E: Engine> {
    engine: E,
    config: AlsConfig,
}

impl<E: Engine> AlsTrainer<E> {
    /// Validates `config` before anything is computed
    pub fn new(engine: E, config: AlsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &AlsConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Factorize `ratings`
    pub fn fit(&self, ratings: &E::Dataset<Rating>) -> Result<Factorization> {
        self.run(ratings, false).map(|(model, _)| model)
    }

    /// Factorize `ratings`, evaluating the training error after every
    /// iteration (one extra pair of joins per iteration)
    pub fn fit_with_history(
        &self,
        ratings: &E::Dataset<Rating>,
    ) -> Result<(Factorization, Vec<IterationStats>)> {
        self.run(ratings, true)
    }

    #[instrument(
        skip(self, ratings),
        fields(
            engine = self.engine.name(),
            factors = self.config.factors,
            lambda = self.config.lambda,
            iterations = self.config.iterations,
        )
    )]
    fn run(
        &self,
        ratings: &E::Dataset<Rating>,
        track_loss: bool,
    ) -> Result<(Factorization, Vec<IterationStats>)> {
        let start = Instant::now();
        let prepared = self.prepare(ratings)?;
        info!(ratings = prepared.count, "starting ALS");

        let initial = self.initial_state(&prepared)?;
        let mut history = Vec::new();

        let trained = (1..=self.config.iterations).try_fold(initial, |state, iteration| {
            let next = self.iterate(&prepared, state, iteration)?;
            if track_loss {
                let stats = self.evaluate(&prepared, &next)?;
                debug!(iteration, rmse = stats.rmse, "finished iteration");
                history.push(stats);
            } else {
                debug!(iteration, "finished iteration");
            }
            Ok::<_, AlsError>(next)
        })?;

        // Users catch up with the final item factors.
        let users = self.half_step(&prepared.by_item, &trained.items)?;

        let user_factors = self.engine.collect::<FactorVector>(&users)?;
        let item_factors = self.engine.collect::<FactorVector>(&trained.items)?;
        info!(
            users = user_factors.len(),
            items = item_factors.len(),
            elapsed = ?start.elapsed(),
            "ALS finished"
        );

        Ok((
            Factorization::new(self.config.factors, user_factors, item_factors),
            history,
        ))
    }

    fn prepare(&self, ratings: &E::Dataset<Rating>) -> Result<PreparedRatings<E>> {
        let engine = &self.engine;
        let ratings = engine.persist::<Rating>(ratings);

        let by_item = engine.persist::<KeyedRating>(&engine.map::<Rating, KeyedRating, _>(
            &ratings,
            |r: &Rating| (r.item_id, (r.user_id, r.value)),
        ));
        let by_user = engine.persist::<KeyedRating>(&engine.map::<Rating, KeyedRating, _>(
            &ratings,
            |r: &Rating| (r.user_id, (r.item_id, r.value)),
        ));
        let item_ids = engine.distinct::<EntityId>(&engine.map::<Rating, EntityId, _>(
            &ratings,
            |r: &Rating| r.item_id,
        ));
        let count = engine.count::<Rating>(&ratings)?;

        Ok(PreparedRatings {
            by_item,
            by_user,
            item_ids,
            count,
        })
    }

    fn initial_state(&self, prepared: &PreparedRatings<E>) -> Result<FactorState<E>> {
        let items = initialize_factors(
            &self.engine,
            &prepared.item_ids,
            self.config.factors,
            self.config.seed,
        );
        Ok(FactorState {
            iteration: 0,
            users: self.engine.parallelize::<FactorVector>(Vec::new()),
            items: self.engine.materialize::<FactorVector>(&items)?,
        })
    }

    /// One (update users, update items) alternation
    fn iterate(
        &self,
        prepared: &PreparedRatings<E>,
        state: FactorState<E>,
        iteration: usize,
    ) -> Result<FactorState<E>> {
        let users = self.half_step(&prepared.by_item, &state.items)?;
        let items = self.half_step(&prepared.by_user, &users)?;
        Ok(FactorState {
            iteration,
            users,
            items,
        })
    }

    /// Update one side and wait for the result
    fn half_step(
        &self,
        ratings: &E::Dataset<KeyedRating>,
        opposite: &E::Dataset<FactorVector>,
    ) -> Result<E::Dataset<FactorVector>> {
        let updated = update_factors(
            &self.engine,
            ratings,
            opposite,
            self.config.factors,
            self.config.lambda,
        );
        Ok(self.engine.materialize::<FactorVector>(&updated)?)
    }

    fn evaluate(&self, prepared: &PreparedRatings<E>, state: &FactorState<E>) -> Result<IterationStats> {
        let error = squared_error(&self.engine, &prepared.by_user, &state.users, &state.items)?;
        Ok(IterationStats {
            iteration: state.iteration,
            squared_error: error,
            rmse: (error / prepared.count.max(1) as f64).sqrt(),
        })
    }
}
