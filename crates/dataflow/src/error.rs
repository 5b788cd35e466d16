//! Error types for the dataflow crate.

use thiserror::Error;

/// Boxed error raised by a user-supplied task closure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced when a dataset is evaluated
#[derive(Error, Debug)]
pub enum DataflowError {
    /// An engine needs at least one partition to schedule work on
    #[error("partition count must be positive, got {0}")]
    InvalidPartitionCount(usize),

    /// A task closure returned an error; the whole evaluation is aborted
    #[error("task failed in stage {stage}")]
    TaskFailed {
        stage: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataflowError>;
