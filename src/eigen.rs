// src/eigen.rs

use crate::decomposition::{qr_decomposition, QrDecomposition};
use crate::error::{LinalgError, Result};
use crate::matrix::Matrix;
use crate::scalar::{Real, Scalar};
use log::{debug, info, trace, warn};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

/// Iteration budget of the reference QR algorithm.
pub const DEFAULT_ITERATIONS: usize = 50_000;

/// An eigenvalue estimate moving by no more than this counts as settled in the Jacobi method.
pub const DEFAULT_JACOBI_TOLERANCE: f64 = 1e-5;

/// Relative asymmetry above which the Jacobi solver rejects its input.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Which iterative algorithm computes the eigenpairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EigenStrategy {
    /// Unshifted QR iteration: `T = R Q`, `E = E Q`. Works on any square matrix but
    /// converges slowly when eigenvalue magnitudes are close.
    #[default]
    QrIteration,
    /// Cyclic Jacobi rotations on a symmetric matrix. Converges quadratically and
    /// keeps the eigenvectors orthogonal; the preferred choice for scatter matrices.
    Jacobi,
}

/// Configuration for the eigen decomposition.
#[derive(Clone, Debug)]
pub struct EigenConfig {
    /// QR iterations to run, or the rotation cap for the Jacobi method.
    pub max_iterations: usize,
    /// QR: stop early once the strictly lower triangle has Frobenius norm at or below this.
    /// Jacobi: an eigenvalue update no larger than this counts as unchanged
    /// (`DEFAULT_JACOBI_TOLERANCE` when `None`).
    pub tolerance: Option<f64>,
    pub strategy: EigenStrategy,
    /// Log progress at every 10% of the QR iteration budget.
    pub report_progress: bool,
}

impl Default for EigenConfig {
    fn default() -> Self {
        EigenConfig {
            max_iterations: DEFAULT_ITERATIONS,
            tolerance: None,
            strategy: EigenStrategy::QrIteration,
            report_progress: false,
        }
    }
}

impl EigenConfig {
    /// Builds the solver selected by `strategy`.
    pub fn solver<F: Real>(&self) -> Box<dyn EigenSolver<F>> {
        match self.strategy {
            EigenStrategy::QrIteration => Box::new(QrAlgorithm {
                iterations: self.max_iterations,
                tolerance: self.tolerance,
                report_progress: self.report_progress,
            }),
            EigenStrategy::Jacobi => Box::new(JacobiRotation {
                max_rotations: self.max_iterations,
                tolerance: self.tolerance.unwrap_or(DEFAULT_JACOBI_TOLERANCE),
            }),
        }
    }
}

/// Eigenvectors and eigenvalues of a square matrix.
#[derive(Clone, Debug)]
pub struct EigenDecomposition<F: Real> {
    /// `n x n`; column `i` pairs with `eigenvalues[i]`.
    pub eigenvectors: Matrix<F>,
    /// `n x 1`.
    pub eigenvalues: Matrix<F>,
    /// QR iterations or Jacobi rotations actually performed.
    pub iterations: usize,
}

impl<F: Real> EigenDecomposition<F> {
    pub fn len(&self) -> usize {
        self.eigenvalues.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column indices ordered by descending `|eigenvalue|`. Ties keep their original order.
    pub fn magnitude_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            self.eigenvalues[b]
                .abs()
                .partial_cmp(&self.eigenvalues[a].abs())
                .unwrap_or(Ordering::Equal)
        });
        order
    }

    /// Copy with eigenpairs reordered by descending `|eigenvalue|`.
    pub fn sorted_by_magnitude(&self) -> Self {
        let order = self.magnitude_order();
        let eigenvectors = self.eigenvectors.view().select(Axis(1), &order);
        let eigenvalues = self.eigenvalues.view().select(Axis(0), &order);
        EigenDecomposition {
            eigenvectors: Matrix::wrap(eigenvectors),
            eigenvalues: Matrix::wrap(eigenvalues),
            iterations: self.iterations,
        }
    }
}

/// An eigen decomposition algorithm.
pub trait EigenSolver<F: Real> {
    fn decompose(&self, matrix: &Matrix<F>) -> Result<EigenDecomposition<F>>;
}

fn ensure_square<F: Real>(matrix: &Matrix<F>) -> Result<()> {
    if !matrix.is_square() {
        return Err(LinalgError::NotSquare { operation: "eigen", rows: matrix.rows(), cols: matrix.cols() });
    }
    Ok(())
}

struct Progress {
    total: usize,
    step: usize,
    enabled: bool,
}

impl Progress {
    fn new(total: usize, enabled: bool) -> Self {
        Progress { total, step: (total / 10).max(1), enabled }
    }

    fn tick(&self, done: usize) {
        if self.enabled && (done % self.step == 0 || done == self.total) {
            info!("Eigen decomposition: {}% ({}/{} iterations)", done * 100 / self.total.max(1), done, self.total);
        }
    }
}

// --- QR algorithm ---

/// Unshifted QR algorithm. Each step factors `T_k = Q R` with Gram-Schmidt and
/// sets `T_{k+1} = R Q`, `E_{k+1} = E_k Q`. Eigenvalues are read off the diagonal
/// of the final `T`, eigenvectors are the columns of `E`.
#[derive(Clone, Debug)]
pub struct QrAlgorithm {
    pub iterations: usize,
    pub tolerance: Option<f64>,
    pub report_progress: bool,
}

impl Default for QrAlgorithm {
    fn default() -> Self {
        QrAlgorithm { iterations: DEFAULT_ITERATIONS, tolerance: None, report_progress: false }
    }
}

impl<F: Real> EigenSolver<F> for QrAlgorithm {
    fn decompose(&self, matrix: &Matrix<F>) -> Result<EigenDecomposition<F>> {
        ensure_square(matrix)?;
        let mut t = matrix.clone();
        let mut e = matrix.identity()?;
        let progress = Progress::new(self.iterations, self.report_progress);

        let mut performed = 0;
        for iteration in 0..self.iterations {
            if let Some(tol) = self.tolerance {
                let residual = t.lower_triangle_norm();
                if residual <= tol {
                    debug!("QR iteration converged after {} steps (lower-triangle norm {:e}).", iteration, residual);
                    break;
                }
            }
            let QrDecomposition { q, r } = qr_decomposition(&t);
            t = r.product(&q);
            e = e.product(&q);
            performed = iteration + 1;
            progress.tick(performed);
        }
        trace!("QR iteration finished: {} steps, lower-triangle norm {:e}.", performed, t.lower_triangle_norm());

        Ok(EigenDecomposition { eigenvectors: e, eigenvalues: t.diagonal(), iterations: performed })
    }
}

// --- Jacobi rotations ---

/// Classic Jacobi eigenvalue method for symmetric matrices.
///
/// Repeatedly zeroes the largest off-diagonal element with a plane rotation,
/// touching only the upper triangle. Convergence is tracked per index: a `changed`
/// flag says whether the last update moved that eigenvalue estimate by more than
/// `tolerance`, and `state` counts the indices still changing. The method stops
/// when `state` reaches zero, when no off-diagonal mass is left, or after
/// `max_rotations` rotations.
#[derive(Clone, Debug)]
pub struct JacobiRotation {
    pub max_rotations: usize,
    pub tolerance: f64,
}

impl Default for JacobiRotation {
    fn default() -> Self {
        JacobiRotation { max_rotations: DEFAULT_ITERATIONS, tolerance: DEFAULT_JACOBI_TOLERANCE }
    }
}

/// Column of the largest `|s[row][j]|` with `j > row`. Requires `row + 1 < n`.
fn max_index<F: Real>(s: &Array2<F>, row: usize) -> usize {
    let n = s.ncols();
    let mut best = row + 1;
    for j in (row + 2)..n {
        if s[[row, j]].abs() > s[[row, best]].abs() {
            best = j;
        }
    }
    best
}

/// `[s_a; s_b] <- [c -sn; sn c] [s_a; s_b]`
fn rotate<F: Real>(s: &mut Array2<F>, c: F, sn: F, a: (usize, usize), b: (usize, usize)) {
    let x = s[[a.0, a.1]];
    let y = s[[b.0, b.1]];
    s[[a.0, a.1]] = c * x - sn * y;
    s[[b.0, b.1]] = sn * x + c * y;
}

struct Convergence {
    changed: Vec<bool>,
    state: usize,
}

impl Convergence {
    fn update<F: Real>(&mut self, values: &mut [F], k: usize, t: F, tolerance: F) {
        let before = values[k];
        values[k] = before + t;
        let moved = (values[k] - before).abs() > tolerance;
        if self.changed[k] && !moved {
            self.changed[k] = false;
            self.state -= 1;
        } else if !self.changed[k] && moved {
            self.changed[k] = true;
            self.state += 1;
        }
    }
}

impl<F: Real> EigenSolver<F> for JacobiRotation {
    fn decompose(&self, matrix: &Matrix<F>) -> Result<EigenDecomposition<F>> {
        ensure_square(matrix)?;
        if !matrix.is_symmetric(SYMMETRY_TOLERANCE) {
            return Err(LinalgError::NotSymmetric {
                operation: "jacobi",
                asymmetry: matrix.max_asymmetry().unwrap_or(f64::NAN),
            });
        }

        let n = matrix.rows();
        let mut s = matrix.view().to_owned();
        let mut vectors = Array2::<F>::eye(n);
        let mut values: Vec<F> = (0..n).map(|k| s[[k, k]]).collect();
        let tolerance = F::from_constant(self.tolerance);
        let two = F::one() + F::one();

        let mut pivots: Vec<usize> = (0..n.saturating_sub(1)).map(|k| max_index(&s, k)).collect();
        let mut convergence = Convergence { changed: vec![true; n], state: n };
        let mut rotations = 0;

        while n > 1 && convergence.state > 0 {
            if rotations >= self.max_rotations {
                warn!(
                    "Jacobi method hit the rotation cap ({}) with {} eigenvalues still changing.",
                    self.max_rotations, convergence.state
                );
                break;
            }

            let mut m = 0;
            for k in 1..(n - 1) {
                if s[[k, pivots[k]]].abs() > s[[m, pivots[m]]].abs() {
                    m = k;
                }
            }
            let (k, l) = (m, pivots[m]);
            let p = s[[k, l]];
            let negligible = F::epsilon() * F::epsilon() * (values[k].abs() + values[l].abs());
            if p == F::zero() || p.abs() <= negligible {
                trace!("Jacobi method: off-diagonal exhausted after {} rotations.", rotations);
                break;
            }

            let y = (values[l] - values[k]) / two;
            let d = y.abs() + (p * p + y * y).sqrt();
            let r = (p * p + d * d).sqrt();
            let c = d / r;
            let mut sn = p / r;
            let mut t = p * p / d;
            if y < F::zero() {
                sn = -sn;
                t = -t;
            }

            s[[k, l]] = F::zero();
            convergence.update(&mut values, k, -t, tolerance);
            convergence.update(&mut values, l, t, tolerance);

            for i in 0..k {
                rotate(&mut s, c, sn, (i, k), (i, l));
            }
            for i in (k + 1)..l {
                rotate(&mut s, c, sn, (k, i), (i, l));
            }
            for i in (l + 1)..n {
                rotate(&mut s, c, sn, (k, i), (l, i));
            }
            for i in 0..n {
                let ek = vectors[[i, k]];
                let el = vectors[[i, l]];
                vectors[[i, k]] = c * ek - sn * el;
                vectors[[i, l]] = sn * ek + c * el;
            }

            pivots[k] = max_index(&s, k);
            if l + 1 < n {
                pivots[l] = max_index(&s, l);
            }
            rotations += 1;
        }

        let eigenvalues = Matrix::column_vector(values)?;
        Ok(EigenDecomposition { eigenvectors: Matrix::wrap(vectors), eigenvalues, iterations: rotations })
    }
}

// --- Entry points ---

/// Eigen decomposition of `matrix` with the reference QR algorithm.
///
/// The matrix is promoted to `f64`, then `iterations` QR steps are run with no
/// early exit. `progress` logs at every 10% of the budget.
///
/// # Errors
/// `NotSquare` for a non-square matrix.
pub fn eigen<T: Scalar>(matrix: &Matrix<T>, iterations: usize, progress: bool) -> Result<EigenDecomposition<f64>> {
    let config = EigenConfig { max_iterations: iterations, report_progress: progress, ..EigenConfig::default() };
    eigen_with(matrix, &config)
}

/// Eigen decomposition of the `f64` promotion of `matrix` with the solver chosen by `config`.
pub fn eigen_with<T: Scalar>(matrix: &Matrix<T>, config: &EigenConfig) -> Result<EigenDecomposition<f64>> {
    let floating = matrix.to_f64();
    debug!(
        "Eigen decomposition of a {}x{} matrix: strategy {:?}, budget {}, tolerance {:?}.",
        floating.rows(),
        floating.cols(),
        config.strategy,
        config.max_iterations,
        config.tolerance
    );
    let start = Instant::now();
    let decomposition = config.solver::<f64>().decompose(&floating)?;
    debug!("Eigen decomposition finished after {} iterations in {:?}.", decomposition.iterations, start.elapsed());
    Ok(decomposition)
}

impl<T: Scalar> Matrix<T> {
    /// See [`eigen`].
    pub fn eigen(&self, iterations: usize, progress: bool) -> Result<EigenDecomposition<f64>> {
        eigen(self, iterations, progress)
    }
}
