// Eigenfaces: principal component analysis of face images

use crate::diagnostics::EigenDiagnostics;
use crate::eigen::{eigen_with, EigenConfig, EigenDecomposition, EigenStrategy};
use crate::error::{LinalgError, Result};
use crate::image::FaceSample;
use crate::matrix::Matrix;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Order of the eigenpairs before the first `k` are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentOrder {
    /// Keep the order the eigen solver produced. This is the reference behaviour; it
    /// is only variance-maximizing when the solver happens to emit eigenvalues by
    /// descending magnitude, which unshifted QR iteration usually does and the
    /// Jacobi method does not.
    #[default]
    AsComputed,
    /// Sort eigenpairs by descending `|eigenvalue|` first.
    DescendingMagnitude,
}

/// Which matrix is handed to the eigen solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScatterStrategy {
    /// Decompose the `pixels x pixels` scatter matrix `A Aᵗ`.
    #[default]
    Full,
    /// Decompose the `images x images` matrix `Aᵗ A` and map each eigenvector `v`
    /// back to pixel space as `A v / |A v|`. Much smaller when there are fewer images
    /// than pixels; only `images` components exist.
    Gram,
}

/// Configuration for [`EigenfaceTrainer`].
#[derive(Clone, Debug, Default)]
pub struct TrainingConfig {
    pub eigen: EigenConfig,
    pub ordering: ComponentOrder,
    pub scatter: ScatterStrategy,
    /// Collect [`EigenDiagnostics`] for the decomposition and log them at debug level.
    pub log_diagnostics: bool,
}

/// Trained eigenface basis.
#[derive(Clone, Debug)]
pub struct EigenfaceModel {
    /// Mean of the flattened training images, `pixels x 1`.
    average_face: Matrix<f64>,
    /// Kept eigenvectors as columns (Vk), `pixels x k`.
    eigenbasis: Matrix<f64>,
    /// Eigenvalues paired with the columns of `eigenbasis`, `k x 1`.
    eigenvalues: Matrix<f64>,
    /// `(height, width)` of the training images.
    image_shape: (usize, usize),
}

/// Closest gallery entry found by [`EigenfaceModel::nearest_match`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    /// Index into the gallery slice.
    pub index: usize,
    /// `l2` distance between the projections.
    pub distance: f64,
}

impl EigenfaceModel {
    pub fn average_face(&self) -> &Matrix<f64> {
        &self.average_face
    }

    pub fn eigenbasis(&self) -> &Matrix<f64> {
        &self.eigenbasis
    }

    pub fn into_eigenbasis(self) -> Matrix<f64> {
        self.eigenbasis
    }

    pub fn eigenvalues(&self) -> &Matrix<f64> {
        &self.eigenvalues
    }

    pub fn num_components(&self) -> usize {
        self.eigenbasis.cols()
    }

    pub fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    /// Weights of `image` in the eigenface basis: `Vkᵗ (x - average)`, `k x 1`.
    ///
    /// # Errors
    /// `InconsistentImage` if the image does not have the training shape.
    pub fn project<S: FaceSample>(&self, image: &S) -> Result<Matrix<f64>> {
        let pixels = image.pixels();
        if pixels.shape() != self.image_shape {
            return Err(LinalgError::InconsistentImage {
                index: 0,
                expected_rows: self.image_shape.0,
                expected_cols: self.image_shape.1,
                found_rows: pixels.rows(),
                found_cols: pixels.cols(),
            });
        }
        let centered = pixels.flatten().sub(&self.average_face)?;
        self.eigenbasis.transpose().multiply(&centered)
    }

    /// Image rebuilt from eigenface weights: `average + Vk w`, reshaped to the training shape.
    pub fn reconstruct(&self, weights: &Matrix<f64>) -> Result<Matrix<f64>> {
        let flat = self.average_face.add(&self.eigenbasis.multiply(weights)?)?;
        Matrix::from_vec(self.image_shape.0, self.image_shape.1, flat.to_vec())
    }

    /// Gallery entry whose projection is closest to the projection of `query`.
    /// `None` for an empty gallery.
    pub fn nearest_match<S: FaceSample, P: FaceSample>(&self, gallery: &[S], query: &P) -> Result<Option<Match>> {
        let target = self.project(query)?;
        let mut best: Option<Match> = None;
        for (index, candidate) in gallery.iter().enumerate() {
            let distance = self.project(candidate)?.l2(&target)?;
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Match { index, distance });
            }
        }
        Ok(best)
    }
}

/// Runs the eigenface training pipeline.
#[derive(Clone, Debug, Default)]
pub struct EigenfaceTrainer {
    config: TrainingConfig,
}

impl EigenfaceTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fits an eigenface basis with `k` components to `images`.
    ///
    /// 1. Flatten every pixel grid into a column and average them.
    /// 2. Build the face matrix `A` whose column `i` is image `i` minus the average.
    /// 3. Decompose the scatter matrix (see [`ScatterStrategy`]); it is not divided by
    ///    the number of images.
    /// 4. Optionally reorder the eigenpairs (see [`ComponentOrder`]) and keep the first `k`.
    ///
    /// # Errors
    /// - `EmptyTrainingSet` for no images, `InconsistentImage` when pixel grids differ in shape.
    /// - `InvalidComponentCount` unless `0 < k < available eigenvectors`.
    /// - Any error from the eigen solver. Nothing is returned on failure.
    pub fn fit<S: FaceSample>(&self, images: &[S], k: usize) -> Result<EigenfaceModel> {
        let image_shape = validate_images(images)?;
        let (height, width) = image_shape;
        let pixel_count = height * width;
        let available = match self.config.scatter {
            ScatterStrategy::Full => pixel_count,
            ScatterStrategy::Gram => images.len(),
        };
        if k == 0 || k >= available {
            return Err(LinalgError::InvalidComponentCount { requested: k, available });
        }

        info!(
            "Creating face matrix: images {}x{}, {} training images, {} components.",
            height,
            width,
            images.len(),
            k
        );
        let overall_start_time = Instant::now();

        if self.config.scatter == ScatterStrategy::Full
            && self.config.eigen.strategy == EigenStrategy::QrIteration
            && images.len() <= pixel_count
        {
            warn!(
                "Scatter matrix C has rank at most {} but is {}x{}; QR iteration will produce NaN eigenvectors. Use the Gram scatter or the Jacobi solver.",
                images.len() - 1,
                pixel_count,
                pixel_count
            );
        }

        let average_face = average_face(images, pixel_count)?;
        let face_matrix = face_matrix(images, &average_face)?;
        debug!("Face matrix A is {}x{}.", face_matrix.rows(), face_matrix.cols());

        let decomposition = match self.config.scatter {
            ScatterStrategy::Full => {
                let scatter = face_matrix.multiply(&face_matrix.transpose())?;
                info!("Decomposing scatter matrix C = A Aᵗ ({}x{}).", scatter.rows(), scatter.cols());
                self.decompose(&scatter)?
            }
            ScatterStrategy::Gram => {
                let gram = face_matrix.transpose().multiply(&face_matrix)?;
                info!("Decomposing Gram matrix Aᵗ A ({}x{}).", gram.rows(), gram.cols());
                let small = self.decompose(&gram)?;
                lift_to_pixel_space(&face_matrix, small)?
            }
        };

        let decomposition = match self.config.ordering {
            ComponentOrder::AsComputed => decomposition,
            ComponentOrder::DescendingMagnitude => decomposition.sorted_by_magnitude(),
        };

        let eigenbasis = decomposition.eigenvectors.slice(0, k)?;
        let eigenvalues = decomposition.eigenvalues.to_vec();
        let eigenvalues = Matrix::column_vector(eigenvalues[..k].to_vec())?;

        info!("Trained {} eigenfaces in {:?}.", k, overall_start_time.elapsed());
        Ok(EigenfaceModel { average_face, eigenbasis, eigenvalues, image_shape })
    }

    fn decompose(&self, matrix: &Matrix<f64>) -> Result<EigenDecomposition<f64>> {
        let decomposition = eigen_with(matrix, &self.config.eigen)?;
        if self.config.log_diagnostics {
            let report = EigenDiagnostics::collect(matrix, &decomposition)?;
            debug!("Eigen decomposition diagnostics: {:?}", report);
            if report.non_finite_entries > 0 {
                warn!("Eigen decomposition produced {} non-finite entries.", report.non_finite_entries);
            }
        }
        Ok(decomposition)
    }
}

/// Shape shared by every image.
fn validate_images<S: FaceSample>(images: &[S]) -> Result<(usize, usize)> {
    let first = images.first().ok_or(LinalgError::EmptyTrainingSet)?;
    let expected = first.pixels().shape();
    for (index, image) in images.iter().enumerate().skip(1) {
        let found = image.pixels().shape();
        if found != expected {
            return Err(LinalgError::InconsistentImage {
                index,
                expected_rows: expected.0,
                expected_cols: expected.1,
                found_rows: found.0,
                found_cols: found.1,
            });
        }
    }
    Ok(expected)
}

/// Mean of the flattened images, `pixel_count x 1`.
fn average_face<S: FaceSample>(images: &[S], pixel_count: usize) -> Result<Matrix<f64>> {
    let mut sum = Matrix::zeros(pixel_count, 1)?;
    for image in images {
        sum.add_assign(&image.pixels().flatten())?;
    }
    sum.divide_assign(images.len() as f64)?;
    Ok(sum)
}

/// `pixel_count x images` matrix of mean-subtracted flattened images.
fn face_matrix<S: FaceSample>(images: &[S], average_face: &Matrix<f64>) -> Result<Matrix<f64>> {
    let mut a = Matrix::zeros(average_face.rows(), images.len())?;
    for (i, image) in images.iter().enumerate() {
        let mut column = image.pixels().flatten();
        column.sub_assign(average_face)?;
        a.set_column(i, &column)?;
    }
    Ok(a)
}

/// Maps eigenvectors `v` of `Aᵗ A` to unit eigenvectors `A v / |A v|` of `A Aᵗ`.
/// The eigenvalues are shared by both matrices.
fn lift_to_pixel_space(
    face_matrix: &Matrix<f64>,
    small: EigenDecomposition<f64>,
) -> Result<EigenDecomposition<f64>> {
    let mut lifted = face_matrix.multiply(&small.eigenvectors)?;
    for i in 0..lifted.cols() {
        let column = lifted.column(i)?;
        let norm = column.norm();
        if norm <= f64::EPSILON {
            warn!("Gram eigenvector {} maps to a null pixel-space vector; leaving it zero.", i);
            continue;
        }
        lifted.set_column(i, &column.divide(norm)?)?;
    }
    Ok(EigenDecomposition { eigenvectors: lifted, eigenvalues: small.eigenvalues, iterations: small.iterations })
}

/// Trains an eigenface basis with the default configuration and returns Vk,
/// the first `k` eigenvectors of the scatter matrix in solver order (`pixels x k`).
///
/// `verbose` turns on progress logging and diagnostics.
///
/// The default solver is QR iteration on the full `pixels x pixels` scatter matrix,
/// which needs more training images than pixels. With `images <= pixels` the scatter
/// matrix is rank-deficient, Gram-Schmidt marks its dependent columns as NaN, and the
/// returned basis is NaN. Use [`EigenfaceTrainer`] with [`ScatterStrategy::Gram`] or
/// the Jacobi solver for such training sets.
///
/// # Examples
///
/// ```
/// use eigenfaces::{train, FaceImage, Matrix};
///
/// let images: Vec<FaceImage> = (0..6)
///     .map(|i| {
///         let p = i as f64;
///         let pixels = Matrix::from_vec(2, 2, vec![p, p * p, (1.7 * p).sin(), (0.9 * p).cos()]).unwrap();
///         FaceImage::new(pixels, "s1", i)
///     })
///     .collect();
///
/// let vk = train(&images, 2, false).unwrap();
/// assert_eq!(vk.shape(), (4, 2));
/// ```
pub fn train<S: FaceSample>(images: &[S], k: usize, verbose: bool) -> Result<Matrix<f64>> {
    let config = TrainingConfig {
        eigen: EigenConfig { report_progress: verbose, ..EigenConfig::default() },
        log_diagnostics: verbose,
        ..TrainingConfig::default()
    };
    EigenfaceTrainer::new(config).fit(images, k).map(EigenfaceModel::into_eigenbasis)
}
