//! Error types for the als crate.
//!
//! Every error is fatal to a training run: there are no partial results.

use crate::model::EntityId;
use dataflow::DataflowError;
use thiserror::Error;

/// Rejected configuration, reported before any computation starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("rank must be a positive integer, got {0}")]
    InvalidRank(usize),

    #[error("regularization must be a finite, non-negative number, got {0}")]
    InvalidLambda(f64),

    #[error("iteration count must be a positive integer, got {0}")]
    InvalidIterations(usize),
}

/// Failure of one entity's regularized least-squares solve
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("factor vector has {found} components, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Only reachable with a zero (or vanishing) regularization weight
    #[error("normal equations over {observations} observations are not positive definite")]
    NotPositiveDefinite { observations: usize },

    #[error("solution contains a non-finite component")]
    NonFinite,
}

/// A [`SolveError`] tagged with the entity whose group failed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("could not solve factors for entity {id}")]
pub struct EntitySolveError {
    pub id: EntityId,
    #[source]
    pub source: SolveError,
}

/// Errors that abort a factorization run
#[derive(Error, Debug)]
pub enum AlsError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Solve(EntitySolveError),

    #[error("dataflow evaluation failed: {0}")]
    Dataflow(DataflowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DataflowError> for AlsError {
    /// Solve failures travel through the engine as boxed task errors;
    /// unwrap them so callers can match on [`AlsError::Solve`].
    fn from(err: DataflowError) -> Self {
        match err {
            DataflowError::TaskFailed { stage, source } => {
                match source.downcast::<EntitySolveError>() {
                    Ok(solve) => AlsError::Solve(*solve),
                    Err(source) => AlsError::Dataflow(DataflowError::TaskFailed { stage, source }),
                }
            }
            other => AlsError::Dataflow(other),
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, AlsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failure_becomes_solve_error() {
        let task = DataflowError::TaskFailed {
            stage: "try_map",
            source: Box::new(EntitySolveError {
                id: 3,
                source: SolveError::NonFinite,
            }),
        };

        match AlsError::from(task) {
            AlsError::Solve(err) => {
                assert_eq!(err.id, 3);
                assert_eq!(err.source, SolveError::NonFinite);
            }
            other => panic!("expected solve error, got {other:?}"),
        }
    }

    #[test]
    fn test_other_task_failures_stay_dataflow_errors() {
        let task = DataflowError::TaskFailed {
            stage: "try_map",
            source: "boom".into(),
        };
        assert!(matches!(
            AlsError::from(task),
            AlsError::Dataflow(DataflowError::TaskFailed { stage: "try_map", .. })
        ));
        assert!(matches!(
            AlsError::from(DataflowError::InvalidPartitionCount(0)),
            AlsError::Dataflow(DataflowError::InvalidPartitionCount(0))
        ));
    }
}
