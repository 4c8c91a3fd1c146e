// src/error.rs

use thiserror::Error;

/// Coarse classification of a [`LinalgError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operand shapes do not fit the operation, or a training set is empty/ragged.
    Dimension,
    /// An element or column index lies outside the matrix.
    Index,
    /// The values themselves are outside what the operation accepts.
    Domain,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("matrix dimensions must be positive, got {rows}x{cols}")]
    EmptyDimensions { rows: usize, cols: usize },

    #[error("buffer of length {found} cannot fill a {rows}x{cols} matrix (needs {expected})")]
    BufferLength {
        rows: usize,
        cols: usize,
        expected: usize,
        found: usize,
    },

    #[error("{operation}: dimensions do not match ({left_rows}x{left_cols} vs {right_rows}x{right_cols})")]
    ShapeMismatch {
        operation: &'static str,
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("{operation}: expected a square matrix, got {rows}x{cols}")]
    NotSquare {
        operation: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("index ({row}, {col}) out of range for a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("linear index {index} out of range for {len} elements")]
    LinearIndexOutOfBounds { index: usize, len: usize },

    #[error("column {col} out of range for a matrix with {cols} columns")]
    ColumnOutOfBounds { col: usize, cols: usize },

    #[error("invalid column range [{start}, {end}) for a matrix with {cols} columns")]
    InvalidSlice { start: usize, end: usize, cols: usize },

    #[error("division of a matrix by zero")]
    DivisionByZero,

    #[error("{operation}: matrix is not symmetric (max asymmetry {asymmetry:e})")]
    NotSymmetric {
        operation: &'static str,
        asymmetry: f64,
    },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("image {index} is {found_rows}x{found_cols}, expected {expected_rows}x{expected_cols}")]
    InconsistentImage {
        index: usize,
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    #[error("cannot keep {requested} components, {available} eigenvectors available (need 0 < k < {available})")]
    InvalidComponentCount { requested: usize, available: usize },
}

impl LinalgError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinalgError::EmptyDimensions { .. }
            | LinalgError::BufferLength { .. }
            | LinalgError::ShapeMismatch { .. }
            | LinalgError::NotSquare { .. }
            | LinalgError::EmptyTrainingSet
            | LinalgError::InconsistentImage { .. }
            | LinalgError::InvalidComponentCount { .. } => ErrorKind::Dimension,
            LinalgError::IndexOutOfBounds { .. }
            | LinalgError::LinearIndexOutOfBounds { .. }
            | LinalgError::ColumnOutOfBounds { .. }
            | LinalgError::InvalidSlice { .. } => ErrorKind::Index,
            LinalgError::DivisionByZero | LinalgError::NotSymmetric { .. } => ErrorKind::Domain,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinalgError>;
