#![cfg(test)]

use crate::eigen::{eigen, EigenConfig, EigenStrategy, DEFAULT_ITERATIONS};
use crate::error::{ErrorKind, LinalgError};
use crate::image::{FaceImage, FaceSample};
use crate::matrix::Matrix;
use crate::pca::{train, ComponentOrder, EigenfaceTrainer, ScatterStrategy, TrainingConfig};
use float_cmp::assert_approx_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_images(count: usize, rows: usize, cols: usize, seed: u64) -> Vec<FaceImage> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let pixels: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(0.0..255.0)).collect();
            FaceImage::new(Matrix::from_vec(rows, cols, pixels).unwrap(), format!("s{}", i % 3), i / 3)
        })
        .collect()
}

fn jacobi_config(scatter: ScatterStrategy) -> TrainingConfig {
    TrainingConfig {
        eigen: EigenConfig { strategy: EigenStrategy::Jacobi, tolerance: Some(1e-12), ..EigenConfig::default() },
        ordering: ComponentOrder::DescendingMagnitude,
        scatter,
        log_diagnostics: true,
    }
}

#[test]
fn test_train_returns_leading_eigenvectors_of_scatter_matrix() {
    let images = random_images(10, 3, 2, 7);
    let k = 3;
    let vk = train(&images, k, false).unwrap();
    assert_eq!(vk.shape(), (6, k));

    // Rebuild C = A Aᵗ step by step and decompose it directly.
    let mut average = Matrix::zeros(6, 1).unwrap();
    for image in &images {
        average.add_assign(&image.pixels().flatten()).unwrap();
    }
    average.divide_assign(images.len() as f64).unwrap();
    let mut a = Matrix::zeros(6, images.len()).unwrap();
    for (i, image) in images.iter().enumerate() {
        let mut column = image.pixels().flatten();
        column.sub_assign(&average).unwrap();
        a.set_column(i, &column).unwrap();
    }
    let c = a.multiply(&a.transpose()).unwrap();
    let expected = eigen(&c, DEFAULT_ITERATIONS, false).unwrap();

    for i in 0..6 {
        for j in 0..k {
            assert_approx_eq!(f64, vk[(i, j)], expected.eigenvectors[(i, j)], epsilon = 1e-9);
        }
    }
}

#[test]
fn test_average_face_is_pixelwise_mean() {
    let images: Vec<FaceImage> = [[1.0, 2.0, 3.0, 4.0], [3.0, 2.0, 1.0, 0.0], [5.0, 8.0, 2.0, 2.0]]
        .iter()
        .enumerate()
        .map(|(i, values)| FaceImage::new(Matrix::from_slice(2, 2, values).unwrap(), "a", i))
        .collect();
    let model = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Full)).fit(&images, 1).unwrap();

    assert_eq!(model.average_face().shape(), (4, 1));
    assert_eq!(model.average_face().to_vec(), vec![3.0, 4.0, 2.0, 2.0]);
    assert_eq!(model.image_shape(), (2, 2));
    assert_eq!(model.num_components(), 1);
}

#[test]
fn test_component_count_must_be_below_available_columns() {
    let images = random_images(4, 2, 2, 1);
    let trainer = EigenfaceTrainer::default();
    for k in [0, 4, 9] {
        let err = trainer.fit(&images, k).unwrap_err();
        assert_eq!(err, LinalgError::InvalidComponentCount { requested: k, available: 4 });
        assert_eq!(err.kind(), ErrorKind::Dimension);
    }

    let gram = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Gram));
    let err = gram.fit(&random_images(3, 4, 4, 1), 3).unwrap_err();
    assert_eq!(err, LinalgError::InvalidComponentCount { requested: 3, available: 3 });
}

#[test]
fn test_invalid_training_sets_are_rejected() {
    let empty: Vec<FaceImage> = Vec::new();
    assert_eq!(train(&empty, 1, false).unwrap_err(), LinalgError::EmptyTrainingSet);

    let mut images = random_images(3, 2, 2, 3);
    images.push(FaceImage::new(Matrix::zeros(2, 3).unwrap(), "odd", 0));
    let err = train(&images, 1, false).unwrap_err();
    assert_eq!(
        err,
        LinalgError::InconsistentImage { index: 3, expected_rows: 2, expected_cols: 2, found_rows: 2, found_cols: 3 }
    );
}

#[test]
fn test_descending_order_sorts_eigenvalues() {
    let images = random_images(8, 3, 3, 11);
    let model = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Full)).fit(&images, 5).unwrap();
    let values = model.eigenvalues().to_vec();
    assert_eq!(values.len(), 5);
    for pair in values.windows(2) {
        assert!(pair[0].abs() >= pair[1].abs(), "{:?}", values);
    }
}

#[test]
fn test_gram_strategy_matches_full_scatter() {
    let images = random_images(5, 2, 5, 21);
    let k = 3;
    let full = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Full)).fit(&images, k).unwrap();
    let gram = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Gram)).fit(&images, k).unwrap();

    assert_eq!(gram.eigenbasis().shape(), (10, k));
    for j in 0..k {
        let scale = full.eigenvalues()[j].abs();
        assert_approx_eq!(f64, gram.eigenvalues()[j] / scale, full.eigenvalues()[j] / scale, epsilon = 1e-8);

        // Eigenvectors agree up to sign.
        let u = full.eigenbasis().column(j).unwrap();
        let v = gram.eigenbasis().column(j).unwrap();
        assert_approx_eq!(f64, u.dot(&v).unwrap().abs(), 1.0, epsilon = 1e-6);
        assert_approx_eq!(f64, v.norm(), 1.0, epsilon = 1e-10);
    }
}

#[test]
fn test_projection_round_trips_training_images() {
    let images = random_images(5, 2, 5, 5);
    let model = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Gram)).fit(&images, 4).unwrap();

    for image in &images {
        let weights = model.project(image).unwrap();
        assert_eq!(weights.shape(), (4, 1));
        let rebuilt = model.reconstruct(&weights).unwrap();
        assert_eq!(rebuilt.shape(), (2, 5));
        for (x, y) in rebuilt.iter().zip(image.pixels.iter()) {
            assert_approx_eq!(f64, *x, *y, epsilon = 1e-6);
        }
    }

    let wrong = FaceImage::new(Matrix::zeros(5, 2).unwrap(), "t", 0);
    assert_eq!(model.project(&wrong).unwrap_err().kind(), ErrorKind::Dimension);
}

#[test]
fn test_nearest_match_picks_same_face() {
    let images = random_images(6, 3, 3, 13);
    let model = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Full)).fit(&images, 4).unwrap();

    let query = images[2].clone();
    let found = model.nearest_match(&images, &query).unwrap().unwrap();
    assert_eq!(found.index, 2);
    assert!(found.distance < 1e-12);

    let empty: Vec<&FaceImage> = Vec::new();
    assert!(model.nearest_match(&empty, &query).unwrap().is_none());
}

#[test]
fn test_default_train_on_rank_deficient_scatter_is_non_finite() {
    // Five images of nine pixels: C = A Aᵗ is 9x9 with rank at most 4.
    let images = random_images(5, 3, 3, 29);
    let vk = train(&images, 3, false).unwrap();
    assert_eq!(vk.shape(), (9, 3));
    assert!(vk.iter().any(|v| !v.is_finite()));

    let model = EigenfaceTrainer::new(jacobi_config(ScatterStrategy::Full)).fit(&images, 3).unwrap();
    assert!(model.eigenbasis().iter().all(|v| v.is_finite()));
    for value in model.eigenvalues().iter() {
        assert!(*value > 0.0, "{:?}", model.eigenvalues());
    }
}
