//! Per-entity regularized least squares.
//!
//! For one entity with observations `(r_j, v_j)`, `j = 1..n`, solve
//!
//! ```text
//! (Σ v_j v_jᵀ + n·λ·I) x = Σ r_j v_j
//! ```
//!
//! The ridge term grows with the entity's observation count (weighted-λ
//! regularization), so heavily rated entities are regularized harder.

use crate::error::SolveError;
use nalgebra::{DMatrix, DVector};

/// Solve one entity's normal equations.
///
/// The result does not depend on the order of `observations` beyond
/// floating-point reassociation. With `lambda > 0` the system is positive
/// definite; with `lambda == 0` a rank-deficient set of observations fails
/// with [`SolveError::NotPositiveDefinite`], as does an empty slice.
pub fn solve_ridge(
    observations: &[(f64, Vec<f64>)],
    rank: usize,
    lambda: f64,
) -> Result<Vec<f64>, SolveError> {
    let mut gram = DMatrix::<f64>::zeros(rank, rank);
    let mut rhs = DVector::<f64>::zeros(rank);

    for (rating, factor) in observations {
        if factor.len() != rank {
            return Err(SolveError::DimensionMismatch {
                expected: rank,
                found: factor.len(),
            });
        }
        let v = DVector::from_column_slice(factor);
        gram.ger(1.0, &v, &v, 1.0);
        rhs.axpy(*rating, &v, 1.0);
    }

    let ridge = lambda * observations.len() as f64;
    for i in 0..rank {
        gram[(i, i)] += ridge;
    }

    let cholesky = gram.cholesky().ok_or(SolveError::NotPositiveDefinite {
        observations: observations.len(),
    })?;
    let solution = cholesky.solve(&rhs);

    if solution.iter().any(|x| !x.is_finite()) {
        return Err(SolveError::NonFinite);
    }
    Ok(solution.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    #[test]
    fn test_single_observation_closed_form() {
        // (v vᵀ + λI) x = r v  =>  x = r v / (|v|² + λ)
        let v = vec![1.0, 2.0];
        let x = solve_ridge(&[(3.0, v.clone())], 2, 0.5).unwrap();

        let scale = 3.0 / (5.0 + 0.5);
        assert!((x[0] - scale * 1.0).abs() < 1e-12);
        assert!((x[1] - scale * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_fit_without_regularization() {
        // Ratings generated by x = (2, -1)
        let observations = vec![
            (2.0, vec![1.0, 0.0]),
            (-1.0, vec![0.0, 1.0]),
            (1.0, vec![1.0, 1.0]),
        ];
        let x = solve_ridge(&observations, 2, 0.0).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_ridge_scales_with_observation_count() {
        // Two identical observations: (2 v vᵀ + 2λ I) x = 2 r v, same as one.
        let one = solve_ridge(&[(4.0, vec![1.0])], 1, 1.0).unwrap();
        let two = solve_ridge(&[(4.0, vec![1.0]), (4.0, vec![1.0])], 1, 1.0).unwrap();
        assert!((one[0] - 2.0).abs() < 1e-12);
        assert!((two[0] - one[0]).abs() < 1e-12);
    }

    #[test]
    fn test_larger_lambda_shrinks_solution() {
        let observations = vec![
            (5.0, vec![0.9, 0.2, 0.4]),
            (3.0, vec![0.1, 0.8, 0.3]),
            (4.0, vec![0.5, 0.5, 0.9]),
        ];
        let norms: Vec<f64> = [0.01, 0.1, 1.0, 10.0]
            .iter()
            .map(|&lambda| norm(&solve_ridge(&observations, 3, lambda).unwrap()))
            .collect();

        assert!(norms.windows(2).all(|w| w[1] < w[0]), "norms: {norms:?}");
    }

    #[test]
    fn test_order_independent() {
        let mut observations = vec![
            (1.0, vec![0.3, 0.7]),
            (2.0, vec![0.6, 0.1]),
            (5.0, vec![0.9, 0.9]),
        ];
        let a = solve_ridge(&observations, 2, 0.1).unwrap();
        observations.reverse();
        let b = solve_ridge(&observations, 2, 0.1).unwrap();
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-12));
    }

    #[test]
    fn test_singular_without_regularization() {
        // One observation cannot pin down a rank-2 vector.
        let err = solve_ridge(&[(1.0, vec![1.0, 1.0])], 2, 0.0).unwrap_err();
        assert_eq!(err, SolveError::NotPositiveDefinite { observations: 1 });
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = solve_ridge(&[(1.0, vec![1.0])], 2, 0.1).unwrap_err();
        assert_eq!(err, SolveError::DimensionMismatch { expected: 2, found: 1 });
    }
}
