// src/diagnostics.rs

use crate::decomposition::QrDecomposition;
use crate::eigen::EigenDecomposition;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::scalar::Real;
use serde::{Deserialize, Serialize};

/// Numerical quality of one eigen decomposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EigenDiagnostics {
    pub matrix_dims: (usize, usize),
    pub iterations: usize,
    pub input_fro_norm: f64,
    /// ||I - E^T E||_F for the eigenvector matrix E.
    pub eigenvector_orthogonality_error: f64,
    /// max_i ||A v_i - lambda_i v_i||_2
    pub max_eigenpair_residual: f64,
    /// Largest |lambda| first.
    pub eigenvalues_sample: Vec<f64>,
    /// Count of NaN/inf entries across eigenvalues and eigenvectors.
    pub non_finite_entries: usize,
}

const EIGENVALUE_SAMPLE_LEN: usize = 10;

impl EigenDiagnostics {
    /// Measures `decomposition` against the matrix it was computed from.
    pub fn collect<F: Real>(matrix: &Matrix<F>, decomposition: &EigenDecomposition<F>) -> Result<Self> {
        let sample = decomposition
            .magnitude_order()
            .into_iter()
            .take(EIGENVALUE_SAMPLE_LEN)
            .map(|i| decomposition.eigenvalues[i].as_f64())
            .collect();
        let non_finite_entries = decomposition
            .eigenvalues
            .iter()
            .chain(decomposition.eigenvectors.iter())
            .filter(|v| !v.is_finite())
            .count();

        Ok(EigenDiagnostics {
            matrix_dims: matrix.shape(),
            iterations: decomposition.iterations,
            input_fro_norm: matrix.norm(),
            eigenvector_orthogonality_error: orthogonality_error(&decomposition.eigenvectors)?,
            max_eigenpair_residual: eigen_residual(matrix, decomposition)?,
            eigenvalues_sample: sample,
            non_finite_entries,
        })
    }
}

/// ||I - Q^T Q||_F. Zero for a matrix with orthonormal columns.
pub fn orthogonality_error<F: Real>(q: &Matrix<F>) -> Result<f64> {
    let gram = q.transpose().multiply(q)?;
    let identity = gram.identity()?;
    Ok(identity.sub(&gram)?.norm())
}

/// ||A - Q R||_F
pub fn reconstruction_error<F: Real>(a: &Matrix<F>, qr: &QrDecomposition<F>) -> Result<f64> {
    let rebuilt = qr.q.multiply(&qr.r)?;
    Ok(a.sub(&rebuilt)?.norm())
}

/// Largest Euclidean residual `||A v_i - lambda_i v_i||` over all eigenpairs.
pub fn eigen_residual<F: Real>(a: &Matrix<F>, decomposition: &EigenDecomposition<F>) -> Result<f64> {
    let av = a.multiply(&decomposition.eigenvectors)?;
    let mut worst = 0.0_f64;
    for i in 0..decomposition.len() {
        let lambda = decomposition.eigenvalues[i];
        let residual = av.column(i)?.sub(&decomposition.eigenvectors.column(i)?.scale(lambda))?;
        worst = worst.max(residual.norm());
    }
    Ok(worst)
}

/// Frobenius norm of everything off the main diagonal.
pub fn off_diagonal_norm<F: Real>(t: &Matrix<F>) -> f64 {
    let lower = t.lower_triangle_norm();
    let upper = t.transpose().lower_triangle_norm();
    (lower * lower + upper * upper).sqrt()
}
