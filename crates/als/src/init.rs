//! Random factor initialization.
//!
//! Each entity gets its own generator, seeded from the run seed and the id,
//! so a vector does not depend on how ids are enumerated or partitioned.

use crate::model::{EntityId, FactorVector};
use dataflow::Engine;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// SplitMix64 finalizer; spreads neighbouring ids over the seed space
fn mix(seed: u64, id: EntityId) -> u64 {
    let mut z = seed ^ (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Factor vector for one id with components uniform in `[0, 1)`
pub fn random_factor(id: EntityId, rank: usize, seed: u64) -> FactorVector {
    let mut rng = StdRng::seed_from_u64(mix(seed, id));
    let values = (0..rank).map(|_| rng.random::<f64>()).collect();
    FactorVector::new(id, values)
}

/// One random factor vector per id; empty input gives an empty result
pub fn random_factors(ids: &[EntityId], rank: usize, seed: u64) -> Vec<FactorVector> {
    ids.iter().map(|&id| random_factor(id, rank, seed)).collect()
}

/// Distributed form: map a dataset of distinct ids to factor vectors
pub fn initialize_factors<E: Engine>(
    engine: &E,
    ids: &E::Dataset<EntityId>,
    rank: usize,
    seed: u64,
) -> E::Dataset<FactorVector> {
    engine.map::<EntityId, FactorVector, _>(ids, move |id: &EntityId| {
        random_factor(*id, rank, seed)
    })
}
