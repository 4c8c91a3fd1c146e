// src/image.rs

use crate::matrix::Matrix;

/// Defines how the training pipeline reads a face image.
///
/// Decoding, resizing and label parsing happen outside the crate; the pipeline
/// only ever sees a fixed-size grid of pixel intensities, the subject it shows
/// and which exemplar of that subject it is.
pub trait FaceSample {
    /// Pixel grid, `height x width`.
    fn pixels(&self) -> &Matrix<f64>;

    /// Subject label, e.g. `"17"`.
    fn subject(&self) -> &str;

    /// Zero-based exemplar number of this image within its subject.
    fn exemplar(&self) -> usize;
}

/// An owned face image.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceImage {
    pub pixels: Matrix<f64>,
    pub subject: String,
    pub exemplar: usize,
}

impl FaceImage {
    pub fn new(pixels: Matrix<f64>, subject: impl Into<String>, exemplar: usize) -> Self {
        FaceImage { pixels, subject: subject.into(), exemplar }
    }
}

impl FaceSample for FaceImage {
    fn pixels(&self) -> &Matrix<f64> {
        &self.pixels
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    fn exemplar(&self) -> usize {
        self.exemplar
    }
}

impl<S: FaceSample + ?Sized> FaceSample for &S {
    fn pixels(&self) -> &Matrix<f64> {
        (**self).pixels()
    }

    fn subject(&self) -> &str {
        (**self).subject()
    }

    fn exemplar(&self) -> usize {
        (**self).exemplar()
    }
}

/// Splits a dataset into training and test halves by exemplar number.
///
/// With `exemplars_per_subject` images per subject, the first
/// `floor(train_fraction * exemplars_per_subject)` exemplars of every subject go to
/// training and the rest to testing. Input order is preserved within each half.
pub fn split_by_exemplar<S: FaceSample>(
    images: Vec<S>,
    train_fraction: f64,
    exemplars_per_subject: usize,
) -> (Vec<S>, Vec<S>) {
    let cutoff = (train_fraction.clamp(0.0, 1.0) * exemplars_per_subject as f64).floor() as usize;
    images.into_iter().partition(|image| image.exemplar() < cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(subject: &str, exemplar: usize) -> FaceImage {
        FaceImage::new(Matrix::zeros(2, 2).unwrap(), subject, exemplar)
    }

    #[test]
    fn test_half_split_keeps_first_exemplars_for_training() {
        let images: Vec<FaceImage> = (0..2)
            .flat_map(|s| (0..10).map(move |e| image(&s.to_string(), e)))
            .collect();
        let (train, test) = split_by_exemplar(images, 0.5, 10);
        assert_eq!(train.len(), 10);
        assert_eq!(test.len(), 10);
        assert!(train.iter().all(|i| i.exemplar < 5));
        assert!(test.iter().all(|i| i.exemplar >= 5));
        assert_eq!(train[0].subject, "0");
        assert_eq!(train[5].subject, "1");
    }

    #[test]
    fn test_zero_fraction_sends_everything_to_test() {
        let (train, test) = split_by_exemplar(vec![image("a", 0), image("a", 1)], 0.0, 10);
        assert!(train.is_empty());
        assert_eq!(test.len(), 2);
    }
}
