// Eigenfaces: dense linear algebra and principal component analysis of face images

#![doc = include_str!("../README.md")]

pub mod decomposition;
pub mod diagnostics;
pub mod eigen;
pub mod error;
pub mod image;
pub mod matrix;
pub mod pca;
pub mod scalar;

#[cfg(test)]
mod pca_tests;

pub use decomposition::{gram_schmidt, qr_decomposition, QrDecomposition, DEPENDENCE_TOLERANCE};
pub use diagnostics::EigenDiagnostics;
pub use eigen::{
    eigen, eigen_with, EigenConfig, EigenDecomposition, EigenSolver, EigenStrategy, JacobiRotation, QrAlgorithm,
    DEFAULT_ITERATIONS,
};
pub use error::{ErrorKind, LinalgError, Result};
pub use image::{split_by_exemplar, FaceImage, FaceSample};
pub use matrix::Matrix;
pub use pca::{train, ComponentOrder, EigenfaceModel, EigenfaceTrainer, Match, ScatterStrategy, TrainingConfig};
pub use scalar::{Real, Scalar};
