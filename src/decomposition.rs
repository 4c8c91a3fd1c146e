// src/decomposition.rs

use crate::matrix::Matrix;
use crate::scalar::{Real, Scalar};
use log::{trace, warn};
use ndarray::Array1;

/// Result of [`qr_decomposition`]: `a ≈ q * r`.
#[derive(Clone, Debug)]
pub struct QrDecomposition<F: Real> {
    /// Orthonormal factor, same shape as the input.
    pub q: Matrix<F>,
    /// Upper-triangular factor, `cols x cols`.
    pub r: Matrix<F>,
}

/// A residual whose norm is at most this fraction of its input column's norm marks
/// the column as linearly dependent on the columns before it.
pub const DEPENDENCE_TOLERANCE: f64 = 1e-10;

/// Orthonormal basis for the columns of `a` via the Gram-Schmidt process.
///
/// Column 0 is the normalized first column. Each later column starts from the raw
/// input column, has its projection `(v·u / u·u) u` onto every previously produced
/// column `u` subtracted from the running residual `v`, and is then normalized.
///
/// The input must have full column rank. When a residual shrinks to
/// [`DEPENDENCE_TOLERANCE`] of its column's norm or below, the column is numerically
/// dependent: it is filled with NaN (which then spreads to every later column) and a
/// warning is logged. No error is raised.
pub fn gram_schmidt<F: Real>(a: &Matrix<F>) -> Matrix<F> {
    let source = a.view();
    let mut basis = a.view().to_owned();
    basis.fill(F::zero());
    let tolerance = F::from_constant(DEPENDENCE_TOLERANCE);

    for i in 0..a.cols() {
        let column = source.column(i);
        let mut residual: Array1<F> = column.to_owned();
        for j in 0..i {
            let u = basis.column(j);
            let scalar = residual.dot(&u) / u.dot(&u);
            residual.scaled_add(-scalar, &u);
        }

        let norm = residual.dot(&residual).sqrt();
        if !norm.is_finite() {
            warn!("Gram-Schmidt: column {} has non-finite residual norm.", i);
        } else if norm <= tolerance * column.dot(&column).sqrt() {
            warn!(
                "Gram-Schmidt: column {} is linearly dependent (residual norm {:?}); basis column set to NaN.",
                i, norm
            );
            residual.fill(F::nan());
        }
        residual.mapv_inplace(|v| v / norm);
        basis.column_mut(i).assign(&residual);
    }

    trace!("Gram-Schmidt produced a {}x{} basis.", a.rows(), a.cols());
    Matrix::wrap(basis)
}

/// QR decomposition through [`gram_schmidt`].
///
/// `q = gram_schmidt(a)` and `r = qᵗ a`. Entries of `r` strictly below the main
/// diagonal are then overwritten with zero; anything left above the diagonal,
/// including rounding leakage, is kept as computed.
pub fn qr_decomposition<F: Real>(a: &Matrix<F>) -> QrDecomposition<F> {
    let q = gram_schmidt(a);
    let mut r = q.transpose().product(a);
    for i in 0..r.rows() {
        for j in 0..i.min(r.cols()) {
            r[(i, j)] = F::zero();
        }
    }
    QrDecomposition { q, r }
}

impl<T: Scalar> Matrix<T> {
    /// [`gram_schmidt`] on the `f64` promotion of `self`.
    pub fn gram_schmidt(&self) -> Matrix<f64> {
        gram_schmidt(&self.to_f64())
    }

    /// [`qr_decomposition`] on the `f64` promotion of `self`.
    pub fn qr_decomposition(&self) -> QrDecomposition<f64> {
        qr_decomposition(&self.to_f64())
    }
}
