//! # Dataflow Crate
//!
//! Join / group / reduce over partitioned datasets.
//!
//! ## Components
//!
//! - **engine**: The [`Engine`] trait. Numeric code is written against it and
//!   never against a concrete runtime.
//! - **local**: [`LocalEngine`], a single-machine implementation that hash
//!   partitions records and runs every partition on the Rayon pool.
//!
//! ## Example Usage
//!
//! ```ignore
//! use dataflow::{Engine, LocalEngine};
//!
//! let engine = LocalEngine::new(4)?;
//! let ratings = engine.parallelize(vec![(1u32, 5.0f64), (1, 3.0), (2, 4.0)]);
//! let grouped = engine.group_by_key::<u32, f64>(&ratings);
//! let means = engine.map::<(u32, Vec<f64>), (u32, f64), _>(&grouped, |(id, values): &(u32, Vec<f64>)| {
//!     (*id, values.iter().sum::<f64>() / values.len() as f64)
//! });
//! println!("{:?}", engine.collect(&means)?);
//! ```

pub mod engine;
pub mod error;
pub mod local;

pub use engine::{Data, Engine, Key};
pub use error::{BoxError, DataflowError, Result};
pub use local::{LocalDataset, LocalEngine};
