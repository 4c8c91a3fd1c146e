// In tests/decomposition_tests.rs

use eigenfaces::diagnostics::{eigen_residual, off_diagonal_norm, orthogonality_error, reconstruction_error};
use eigenfaces::{eigen_with, gram_schmidt, qr_decomposition, EigenConfig, EigenStrategy, Matrix};
use float_cmp::assert_approx_eq;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const KNOWN_SPECTRUM: [f64; 5] = [10.0, 6.0, 3.0, 1.5, 0.5];

fn random_matrix(rows: usize, cols: usize, seed: u64) -> Matrix<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = Array2::random_using((rows, cols), Uniform::new(-1.0, 1.0), &mut rng);
    Matrix::from_array(data).unwrap()
}

/// `Q diag(KNOWN_SPECTRUM) Qᵀ` for a random orthonormal `Q`, symmetrized exactly.
fn matrix_with_known_spectrum(seed: u64) -> (Matrix<f64>, Matrix<f64>) {
    let n = KNOWN_SPECTRUM.len();
    let q = gram_schmidt(&random_matrix(n, n, seed));
    let d = Matrix::from_fn(n, n, |i, j| if i == j { KNOWN_SPECTRUM[i] } else { 0.0 }).unwrap();
    let s = q.multiply(&d).unwrap().multiply(&q.transpose()).unwrap();
    let symmetric = s.add(&s.transpose()).unwrap().divide(2.0).unwrap();
    (symmetric, q)
}

fn sorted_descending(values: &Matrix<f64>) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    sorted
}

#[test]
fn test_qr_reconstructs_random_matrices() {
    for (seed, (rows, cols)) in [(1u64, (5, 5)), (2, (8, 3)), (3, (12, 12)), (4, (3, 5))] {
        let a = random_matrix(rows, cols, seed);
        let qr = qr_decomposition(&a);
        assert_eq!(qr.q.shape(), (rows, cols), "seed {}", seed);
        assert_eq!(qr.r.shape(), (cols, cols), "seed {}", seed);
        if rows >= cols {
            assert!(reconstruction_error(&a, &qr).unwrap() <= 1e-10 * a.norm(), "seed {}", seed);
            assert!(orthogonality_error(&qr.q).unwrap() <= 1e-4, "seed {}", seed);
        }
    }
}

#[test]
fn test_gram_schmidt_columns_are_unit_length() {
    let q = gram_schmidt(&random_matrix(7, 4, 9));
    for j in 0..4 {
        assert_approx_eq!(f64, q.column(j).unwrap().norm(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_qr_iteration_recovers_known_spectrum() {
    let (s, q) = matrix_with_known_spectrum(17);
    let config = EigenConfig { tolerance: Some(1e-12), ..EigenConfig::default() };
    let result = eigen_with(&s, &config).unwrap();
    assert!(result.iterations < 1_000, "took {} iterations", result.iterations);

    // Unshifted QR iteration leaves a positive definite spectrum in descending order.
    for (i, expected) in KNOWN_SPECTRUM.iter().enumerate() {
        assert_approx_eq!(f64, result.eigenvalues[i], *expected, epsilon = 1e-8);
        let alignment = result.eigenvectors.column(i).unwrap().dot(&q.column(i).unwrap()).unwrap();
        assert_approx_eq!(f64, alignment.abs(), 1.0, epsilon = 1e-6);
    }
    assert!(eigen_residual(&s, &result).unwrap() < 1e-6);
}

#[test]
fn test_jacobi_and_qr_iteration_agree() {
    let (s, _) = matrix_with_known_spectrum(23);
    let qr = eigen_with(&s, &EigenConfig { tolerance: Some(1e-12), ..EigenConfig::default() }).unwrap();
    let jacobi = eigen_with(
        &s,
        &EigenConfig { strategy: EigenStrategy::Jacobi, tolerance: Some(1e-12), ..EigenConfig::default() },
    )
    .unwrap();

    for (a, b) in sorted_descending(&qr.eigenvalues).iter().zip(sorted_descending(&jacobi.eigenvalues)) {
        assert_approx_eq!(f64, *a, b, epsilon = 1e-8);
    }
    assert!(orthogonality_error(&jacobi.eigenvectors).unwrap() < 1e-10);
    assert!(eigen_residual(&s, &jacobi).unwrap() < 1e-8);
}

#[test]
fn test_jacobi_on_random_symmetric_matrix() {
    let m = random_matrix(9, 9, 31);
    let s = m.add(&m.transpose()).unwrap();
    let config = EigenConfig { strategy: EigenStrategy::Jacobi, tolerance: Some(1e-12), ..EigenConfig::default() };
    let result = eigen_with(&s, &config).unwrap();

    assert!(orthogonality_error(&result.eigenvectors).unwrap() < 1e-10);
    assert!(eigen_residual(&s, &result).unwrap() < 1e-8 * s.norm());
    let trace: f64 = s.diagonal().iter().sum();
    assert_approx_eq!(f64, result.eigenvalues.iter().sum::<f64>(), trace, epsilon = 1e-10);
}

#[test]
fn test_qr_iteration_without_tolerance_runs_full_budget() {
    let (s, _) = matrix_with_known_spectrum(5);
    let config = EigenConfig { max_iterations: 300, ..EigenConfig::default() };
    let result = eigen_with(&s, &config).unwrap();
    assert_eq!(result.iterations, 300);

    // The iterate converges to diagonal form; Eᵀ S E reproduces it.
    let t = result.eigenvectors.transpose().multiply(&s).unwrap().multiply(&result.eigenvectors).unwrap();
    assert!(off_diagonal_norm(&t) < 1e-8);
}
