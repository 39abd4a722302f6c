/////////////////////////////////////////////////////////////////////////////////////////////\
//
// Shared dense linear algebra and statistics helpers for the inference engine.
//
// Created on: 19 Oct 2026
//
/////////////////////////////////////////////////////////////////////////////////////////////

//! # Utilities
//!
//! Small-matrix helpers on `faer` matrices: LU solves and inverses, faer's
//! Cholesky factorization for positive-definiteness checks and log
//! determinants, and column statistics for sample chains.

use faer::linalg::solvers::Llt;
use faer::prelude::Solve;
use faer::{Mat, Side};
use thiserror::Error;

/// Errors raised by the dense linear-algebra helpers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinalgError {
    #[error("matrix must be square; found {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("linear solve produced non-finite values")]
    SolveFailed,
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,
}

#[must_use]
pub fn matrix_is_finite(matrix: &Mat<f64>) -> bool {
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if !matrix[(i, j)].is_finite() {
                return false;
            }
        }
    }
    true
}

/// # Errors
///
/// Returns `LinalgError::SolveFailed` if the solve produces non-finite values.
pub fn solve_linear_system(a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>, LinalgError> {
    let rhs = b.clone();
    let lu = a.full_piv_lu();
    let solution = lu.solve(rhs);
    if !matrix_is_finite(&solution) {
        return Err(LinalgError::SolveFailed);
    }
    Ok(solution)
}

/// Inverse of a square matrix, column by column through a pivoted LU solve.
///
/// # Errors
///
/// Returns `LinalgError` if the matrix is not square or is numerically singular.
pub fn matrix_inverse(matrix: &Mat<f64>) -> Result<Mat<f64>, LinalgError> {
    let dim = matrix.ncols();
    if matrix.nrows() != dim {
        return Err(LinalgError::NotSquare {
            rows: matrix.nrows(),
            cols: dim,
        });
    }
    let inverse = solve_linear_system(matrix, &identity_matrix(dim))?;
    Ok(inverse)
}

/// Cholesky factorization `A = L Lᵀ`, or `None` if `matrix` is not square,
/// not finite or not positive definite.
#[must_use]
pub fn cholesky(matrix: &Mat<f64>) -> Option<Llt<f64>> {
    if matrix.nrows() != matrix.ncols() || !matrix_is_finite(matrix) {
        return None;
    }
    Llt::new(matrix.as_ref(), Side::Lower).ok()
}

/// `log |A|` from the Cholesky factor of `A`.
#[must_use]
pub fn log_det_from_cholesky(factor: &Llt<f64>) -> f64 {
    let lower = factor.L();
    2.0 * (0..lower.nrows())
        .map(|idx| lower[(idx, idx)].ln())
        .sum::<f64>()
}

/// `xᵀ A⁻¹ x` through the Cholesky factor of `A`.
#[must_use]
pub fn inverse_quadratic_form(factor: &Llt<f64>, vector: &[f64]) -> f64 {
    let rhs = Mat::from_fn(vector.len(), 1, |row, _| vector[row]);
    let solved = factor.solve(rhs);
    vector
        .iter()
        .enumerate()
        .map(|(row, x)| x * solved[(row, 0)])
        .sum()
}

/// `A x` for a square matrix and a plain vector.
#[must_use]
pub fn mat_vec(matrix: &Mat<f64>, vector: &[f64]) -> Vec<f64> {
    (0..matrix.nrows())
        .map(|row| {
            (0..matrix.ncols())
                .map(|col| matrix[(row, col)] * vector[col])
                .sum()
        })
        .collect()
}

#[must_use]
pub fn identity_matrix(dim: usize) -> Mat<f64> {
    Mat::from_fn(dim, dim, |row, col| if row == col { 1.0 } else { 0.0 })
}

#[must_use]
pub fn row_to_vec(matrix: &Mat<f64>, row: usize) -> Vec<f64> {
    (0..matrix.ncols()).map(|col| matrix[(row, col)]).collect()
}

/// Per-column sample mean of a row-major sample matrix.
#[must_use]
pub fn column_means(samples: &Mat<f64>) -> Vec<f64> {
    let n = usize_to_f64(samples.nrows()).max(1.0);
    (0..samples.ncols())
        .map(|col| (0..samples.nrows()).map(|row| samples[(row, col)]).sum::<f64>() / n)
        .collect()
}

/// Per-column population standard deviation (denominator `n`).
#[must_use]
pub fn column_std(samples: &Mat<f64>, means: &[f64]) -> Vec<f64> {
    let n = usize_to_f64(samples.nrows()).max(1.0);
    (0..samples.ncols())
        .map(|col| {
            let variance = (0..samples.nrows())
                .map(|row| {
                    let centered = samples[(row, col)] - means[col];
                    centered * centered
                })
                .sum::<f64>()
                / n;
            variance.max(0.0).sqrt()
        })
        .collect()
}

#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
