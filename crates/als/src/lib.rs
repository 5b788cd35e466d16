//! # ALS Crate
//!
//! Low-rank factorization of a sparse user-item rating matrix with
//! Alternating Least Squares, written as join / group / reduce passes over
//! any [`dataflow::Engine`].
//!
//! ## Components
//!
//! - **config**: [`AlsConfig`] (rank, regularization, iterations, seed)
//! - **model**: [`FactorVector`] and the final [`Factorization`]
//! - **init**: deterministic random initial factors
//! - **solve**: the per-entity ridge regression kernel
//! - **update**: one ALS half-step as a dataflow pipeline
//! - **trainer**: [`AlsTrainer`], the iteration controller
//! - **loss**: training error evaluated through the engine
//! - **synthetic**: noise-free low-rank test data
//!
//! ## Example Usage
//!
//! ```ignore
//! use als::{AlsConfig, AlsTrainer};
//! use dataflow::{Engine, LocalEngine};
//!
//! let engine = LocalEngine::new(8)?;
//! let ratings = engine.parallelize(index.into_ratings());
//! let trainer = AlsTrainer::new(engine, AlsConfig::default().with_factors(20))?;
//! let model = trainer.fit(&ratings)?;
//! println!("{:?}", model.predict(1, 1193));
//! ```

pub mod config;
pub mod error;
pub mod init;
pub mod loss;
pub mod model;
pub mod solve;
pub mod synthetic;
pub mod trainer;
pub mod update;

pub use config::AlsConfig;
pub use error::{AlsError, ConfigError, EntitySolveError, Result, SolveError};
pub use model::{EntityId, FactorVector, Factorization};
pub use synthetic::SyntheticRatings;
pub use trainer::{AlsTrainer, IterationStats};
