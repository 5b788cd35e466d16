//! Training configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Hyper-parameters of an ALS run.
///
/// These four values are the only options the factorization core recognizes.
/// Engine and I/O settings live with the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlsConfig {
    /// Rank `k` of every factor vector
    pub factors: usize,
    /// Ridge weight; each entity's diagonal term is `lambda * n_ratings`
    pub lambda: f64,
    /// Number of (update users, update items) alternations
    pub iterations: usize,
    /// Seed for the initial item factors
    pub seed: u64,
}

impl Default for AlsConfig {
    fn default() -> Self {
        Self {
            factors: 10,
            lambda: 0.1,
            iterations: 10,
            seed: 42,
        }
    }
}

impl AlsConfig {
    pub fn new(factors: usize, lambda: f64, iterations: usize, seed: u64) -> Self {
        Self {
            factors,
            lambda,
            iterations,
            seed,
        }
    }

    /// Configure the rank (default: 10)
    pub fn with_factors(mut self, factors: usize) -> Self {
        self.factors = factors;
        self
    }

    /// Configure the regularization weight (default: 0.1)
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Configure the number of alternations (default: 10)
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Configure the initialization seed (default: 42)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject configurations that cannot produce a factorization.
    ///
    /// `lambda == 0` passes: it is only a problem if some entity's
    /// unregularized system turns out singular, which surfaces as a solve error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.factors == 0 {
            return Err(ConfigError::InvalidRank(self.factors));
        }
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(ConfigError::InvalidLambda(self.lambda));
        }
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations(self.iterations));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AlsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = AlsConfig::default();

        assert_eq!(
            base.with_factors(0).validate(),
            Err(ConfigError::InvalidRank(0))
        );
        assert_eq!(
            base.with_lambda(-0.5).validate(),
            Err(ConfigError::InvalidLambda(-0.5))
        );
        assert!(matches!(
            base.with_lambda(f64::NAN).validate(),
            Err(ConfigError::InvalidLambda(_))
        ));
        assert_eq!(
            base.with_iterations(0).validate(),
            Err(ConfigError::InvalidIterations(0))
        );
    }

    #[test]
    fn test_zero_lambda_accepted() {
        assert!(AlsConfig::default().with_lambda(0.0).validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: AlsConfig = serde_json::from_str(r#"{"factors": 4, "seed": 7}"#).unwrap();
        assert_eq!(config, AlsConfig::new(4, 0.1, 10, 7));
    }
}
