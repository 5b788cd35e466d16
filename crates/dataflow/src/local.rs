//! Single-machine engine backed by Rayon.
//!
//! A [`LocalDataset`] is a node in a lazy lineage graph. Evaluating a node
//! evaluates its parents, then runs the node's stage partition by partition
//! on the Rayon pool. Keyed stages (join, group, distinct) first shuffle
//! their input into `partitions` hash buckets, exactly as a cluster engine
//! would, so code tested here sees realistic repartitioning.
//!
//! Hashing uses `FxHasher`, which has no per-process random state: for a fixed
//! partition count every evaluation produces the same records in the same
//! order.

use crate::engine::{Data, Engine, Key};
use crate::error::{BoxError, DataflowError, Result};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::trace;

type Partitions<T> = Vec<Vec<T>>;
type Compute<T> = dyn Fn() -> Result<Arc<Partitions<T>>> + Send + Sync;

struct Node<T> {
    stage: &'static str,
    compute: Arc<Compute<T>>,
    persist: bool,
    cache: OnceLock<Arc<Partitions<T>>>,
    evaluations: AtomicUsize,
}

/// Lazily computed, hash-partitioned in-memory collection.
pub struct LocalDataset<T> {
    node: Arc<Node<T>>,
}

impl<T> Clone for LocalDataset<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: Data> LocalDataset<T> {
    fn source(stage: &'static str, partitions: Partitions<T>) -> Self {
        let partitions = Arc::new(partitions);
        Self::derived(stage, move || Ok(Arc::clone(&partitions)))
    }

    fn derived<F>(stage: &'static str, compute: F) -> Self
    where
        F: Fn() -> Result<Arc<Partitions<T>>> + Send + Sync + 'static,
    {
        Self {
            node: Arc::new(Node {
                stage,
                compute: Arc::new(compute),
                persist: false,
                cache: OnceLock::new(),
                evaluations: AtomicUsize::new(0),
            }),
        }
    }

    fn evaluate(&self) -> Result<Arc<Partitions<T>>> {
        if let Some(cached) = self.node.cache.get() {
            return Ok(Arc::clone(cached));
        }

        self.node.evaluations.fetch_add(1, Ordering::Relaxed);
        let partitions = (self.node.compute)()?;
        trace!(
            stage = self.node.stage,
            partitions = partitions.len(),
            records = partitions.iter().map(Vec::len).sum::<usize>(),
            "evaluated stage"
        );

        if self.node.persist {
            // Two threads may race to fill the cache; both computed the same value.
            let _ = self.node.cache.set(Arc::clone(&partitions));
        }
        Ok(partitions)
    }

    /// Name of the stage that produces this dataset
    pub fn stage(&self) -> &'static str {
        self.node.stage
    }

    /// How many times this node has computed its partitions
    pub fn evaluations(&self) -> usize {
        self.node.evaluations.load(Ordering::Relaxed)
    }

    /// Whether the first evaluation is cached for later uses
    pub fn is_persisted(&self) -> bool {
        self.node.persist
    }
}

/// Rayon-backed [`Engine`] with a fixed number of hash partitions.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    partitions: usize,
}

impl LocalEngine {
    pub fn new(partitions: usize) -> Result<Self> {
        if partitions == 0 {
            return Err(DataflowError::InvalidPartitionCount(partitions));
        }
        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }
}

impl Default for LocalEngine {
    /// One partition per Rayon worker thread
    fn default() -> Self {
        Self {
            partitions: rayon::current_num_threads().max(1),
        }
    }
}

fn partition_for<K: Hash>(key: &K, partitions: usize) -> usize {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

/// Hash-repartition keyed records. Records keep their relative order within
/// each target partition.
fn shuffle<K: Key, V: Data>(input: &Partitions<(K, V)>, partitions: usize) -> Partitions<(K, V)> {
    let split: Vec<Partitions<(K, V)>> = input
        .par_iter()
        .map(|partition| {
            let mut buckets: Partitions<(K, V)> = vec![Vec::new(); partitions];
            for record in partition {
                buckets[partition_for(&record.0, partitions)].push(record.clone());
            }
            buckets
        })
        .collect();

    let mut output: Partitions<(K, V)> = vec![Vec::new(); partitions];
    for buckets in split {
        for (target, bucket) in output.iter_mut().zip(buckets) {
            target.extend(bucket);
        }
    }
    output
}

impl Engine for LocalEngine {
    type Dataset<T: Data> = LocalDataset<T>;

    fn name(&self) -> &str {
        "local"
    }

    fn parallelize<T: Data>(&self, items: Vec<T>) -> LocalDataset<T> {
        let chunk = items.len().div_ceil(self.partitions).max(1);
        let mut partitions: Partitions<T> = Vec::with_capacity(self.partitions);
        let mut items = items.into_iter().peekable();
        while items.peek().is_some() {
            partitions.push(items.by_ref().take(chunk).collect());
        }
        partitions.resize_with(self.partitions, Vec::new);
        LocalDataset::source("parallelize", partitions)
    }

    fn map<T, U, F>(&self, dataset: &LocalDataset<T>, f: F) -> LocalDataset<U>
    where
        T: Data,
        U: Data,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let parent = dataset.clone();
        LocalDataset::derived("map", move || {
            let input = parent.evaluate()?;
            let output: Partitions<U> = input
                .par_iter()
                .map(|partition| partition.iter().map(&f).collect())
                .collect();
            Ok(Arc::new(output))
        })
    }

    fn try_map<T, U, E, F>(&self, dataset: &LocalDataset<T>, f: F) -> LocalDataset<U>
    where
        T: Data,
        U: Data,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn(&T) -> std::result::Result<U, E> + Send + Sync + 'static,
    {
        let parent = dataset.clone();
        LocalDataset::derived("try_map", move || {
            let input = parent.evaluate()?;
            let output: std::result::Result<Partitions<U>, E> = input
                .par_iter()
                .map(|partition| partition.iter().map(&f).collect())
                .collect();
            output.map(Arc::new).map_err(|err| DataflowError::TaskFailed {
                stage: "try_map",
                source: BoxError::from(err),
            })
        })
    }

    fn filter<T, F>(&self, dataset: &LocalDataset<T>, predicate: F) -> LocalDataset<T>
    where
        T: Data,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let parent = dataset.clone();
        LocalDataset::derived("filter", move || {
            let input = parent.evaluate()?;
            let output: Partitions<T> = input
                .par_iter()
                .map(|partition| partition.iter().filter(|x| predicate(x)).cloned().collect())
                .collect();
            Ok(Arc::new(output))
        })
    }

    fn flat_map<T, U, I, F>(&self, dataset: &LocalDataset<T>, f: F) -> LocalDataset<U>
    where
        T: Data,
        U: Data,
        I: IntoIterator<Item = U>,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        let parent = dataset.clone();
        LocalDataset::derived("flat_map", move || {
            let input = parent.evaluate()?;
            let output: Partitions<U> = input
                .par_iter()
                .map(|partition| partition.iter().flat_map(&f).collect())
                .collect();
            Ok(Arc::new(output))
        })
    }

    fn join<K, V, W>(
        &self,
        left: &LocalDataset<(K, V)>,
        right: &LocalDataset<(K, W)>,
    ) -> LocalDataset<(K, (V, W))>
    where
        K: Key,
        V: Data,
        W: Data,
    {
        let (left, right) = (left.clone(), right.clone());
        let partitions = self.partitions;
        LocalDataset::derived("join", move || {
            let (left, right) = rayon::join(|| left.evaluate(), || right.evaluate());
            let left = shuffle(left?.as_ref(), partitions);
            let right = shuffle(right?.as_ref(), partitions);

            let output: Partitions<(K, (V, W))> = left
                .into_par_iter()
                .zip(right.into_par_iter())
                .map(|(left, right)| {
                    let mut index: FxHashMap<&K, Vec<&W>> = FxHashMap::default();
                    for (key, value) in &right {
                        index.entry(key).or_default().push(value);
                    }

                    let mut joined = Vec::new();
                    for (key, value) in &left {
                        if let Some(matches) = index.get(key) {
                            for &other in matches {
                                joined.push((key.clone(), (value.clone(), other.clone())));
                            }
                        }
                    }
                    joined
                })
                .collect();
            Ok(Arc::new(output))
        })
    }

    fn group_by_key<K, V>(&self, dataset: &LocalDataset<(K, V)>) -> LocalDataset<(K, Vec<V>)>
    where
        K: Key,
        V: Data,
    {
        let parent = dataset.clone();
        let partitions = self.partitions;
        LocalDataset::derived("group_by_key", move || {
            let input = shuffle(parent.evaluate()?.as_ref(), partitions);
            let output: Partitions<(K, Vec<V>)> = input
                .into_par_iter()
                .map(|partition| {
                    // Groups come out in first-seen key order.
                    let mut slots: FxHashMap<K, usize> = FxHashMap::default();
                    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
                    for (key, value) in partition {
                        match slots.get(&key) {
                            Some(&slot) => groups[slot].1.push(value),
                            None => {
                                slots.insert(key.clone(), groups.len());
                                groups.push((key, vec![value]));
                            }
                        }
                    }
                    groups
                })
                .collect();
            Ok(Arc::new(output))
        })
    }

    fn distinct<T: Key>(&self, dataset: &LocalDataset<T>) -> LocalDataset<T> {
        let parent = dataset.clone();
        let partitions = self.partitions;
        LocalDataset::derived("distinct", move || {
            let input = parent.evaluate()?;
            let keyed: Partitions<(T, ())> = input
                .iter()
                .map(|partition| partition.iter().map(|x| (x.clone(), ())).collect())
                .collect();
            let output: Partitions<T> = shuffle(&keyed, partitions)
                .into_par_iter()
                .map(|partition| {
                    let mut seen = FxHashSet::default();
                    partition
                        .into_iter()
                        .filter_map(|(x, ())| seen.insert(x.clone()).then_some(x))
                        .collect()
                })
                .collect();
            Ok(Arc::new(output))
        })
    }

    fn persist<T: Data>(&self, dataset: &LocalDataset<T>) -> LocalDataset<T> {
        if dataset.is_persisted() {
            return dataset.clone();
        }
        LocalDataset {
            node: Arc::new(Node {
                stage: dataset.node.stage,
                compute: Arc::clone(&dataset.node.compute),
                persist: true,
                cache: OnceLock::new(),
                evaluations: AtomicUsize::new(0),
            }),
        }
    }

    fn materialize<T: Data>(&self, dataset: &LocalDataset<T>) -> Result<LocalDataset<T>> {
        let partitions = dataset.evaluate()?;
        let materialized = LocalDataset::derived(dataset.node.stage, move || Ok(Arc::clone(&partitions)));
        Ok(materialized)
    }

    fn collect<T: Data>(&self, dataset: &LocalDataset<T>) -> Result<Vec<T>> {
        let partitions = dataset.evaluate()?;
        Ok(partitions.iter().flatten().cloned().collect())
    }

    fn count<T: Data>(&self, dataset: &LocalDataset<T>) -> Result<usize> {
        Ok(dataset.evaluate()?.iter().map(Vec::len).sum())
    }
}
