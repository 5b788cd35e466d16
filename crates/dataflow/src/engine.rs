//! Core traits for partitioned dataset engines.
//!
//! An [`Engine`] owns a family of immutable, partitioned datasets and the
//! operations that derive new datasets from old ones. Numeric code written
//! against this trait does not care whether the engine runs on one machine
//! or many.
//!
//! ## Design Note
//! - Datasets are values: every operation returns a new dataset and never
//!   mutates its inputs.
//! - Building a pipeline is cheap; work happens when a dataset is
//!   collected, counted or materialized.
//! - Closures are `Send + Sync + 'static` because an engine may run them on
//!   any worker, any number of times.
//!
//! Generic callers should name the element types explicitly
//! (`engine.map::<T, U, _>(..)`), since they cannot be recovered from an
//! associated type projection.

use crate::error::Result;
use std::hash::Hash;

/// Anything that can live in a dataset.
pub trait Data: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Data for T {}

/// Anything that can be used to repartition, join or group a dataset.
pub trait Key: Data + Eq + Hash {}

impl<T: Data + Eq + Hash> Key for T {}

/// A join / group / reduce engine over partitioned datasets.
pub trait Engine: Clone + Send + Sync + 'static {
    /// Handle to a (possibly not yet computed) partitioned collection.
    type Dataset<T: Data>: Clone + Send + Sync;

    /// Returns the name of this engine (for logging/debugging)
    fn name(&self) -> &str;

    /// Distribute an in-memory collection across the engine's partitions.
    fn parallelize<T: Data>(&self, items: Vec<T>) -> Self::Dataset<T>;

    /// Apply `f` to every element.
    fn map<T, U, F>(&self, dataset: &Self::Dataset<T>, f: F) -> Self::Dataset<U>
    where
        T: Data,
        U: Data,
        F: Fn(&T) -> U + Send + Sync + 'static;

    /// Apply a fallible `f` to every element.
    ///
    /// The first error aborts evaluation and is reported as
    /// [`DataflowError::TaskFailed`](crate::DataflowError::TaskFailed).
    fn try_map<T, U, E, F>(&self, dataset: &Self::Dataset<T>, f: F) -> Self::Dataset<U>
    where
        T: Data,
        U: Data,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&T) -> std::result::Result<U, E> + Send + Sync + 'static;

    /// Keep only the elements for which `predicate` holds.
    fn filter<T, F>(&self, dataset: &Self::Dataset<T>, predicate: F) -> Self::Dataset<T>
    where
        T: Data,
        F: Fn(&T) -> bool + Send + Sync + 'static;

    /// Replace every element by zero or more elements.
    fn flat_map<T, U, I, F>(&self, dataset: &Self::Dataset<T>, f: F) -> Self::Dataset<U>
    where
        T: Data,
        U: Data,
        I: IntoIterator<Item = U>,
        F: Fn(&T) -> I + Send + Sync + 'static;

    /// Inner equi-join on the key. Every matching `(left, right)` pair is emitted.
    fn join<K, V, W>(
        &self,
        left: &Self::Dataset<(K, V)>,
        right: &Self::Dataset<(K, W)>,
    ) -> Self::Dataset<(K, (V, W))>
    where
        K: Key,
        V: Data,
        W: Data;

    /// Collect all values sharing a key into one record per distinct key.
    fn group_by_key<K, V>(&self, dataset: &Self::Dataset<(K, V)>) -> Self::Dataset<(K, Vec<V>)>
    where
        K: Key,
        V: Data;

    /// Remove duplicate elements.
    fn distinct<T: Key>(&self, dataset: &Self::Dataset<T>) -> Self::Dataset<T>;

    /// Keep the dataset resident after its first evaluation so every
    /// downstream use reads the cached partitions instead of recomputing.
    fn persist<T: Data>(&self, dataset: &Self::Dataset<T>) -> Self::Dataset<T>;

    /// Evaluate now and return a dataset that no longer references its
    /// lineage. This is the barrier between dependent pipeline stages.
    fn materialize<T: Data>(&self, dataset: &Self::Dataset<T>) -> Result<Self::Dataset<T>>;

    /// Evaluate and gather every element, in partition order.
    fn collect<T: Data>(&self, dataset: &Self::Dataset<T>) -> Result<Vec<T>>;

    /// Evaluate and count the elements.
    fn count<T: Data>(&self, dataset: &Self::Dataset<T>) -> Result<usize>;
}
