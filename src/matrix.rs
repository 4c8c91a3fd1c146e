// src/matrix.rs

use crate::error::{LinalgError, Result};
use crate::scalar::{Real, Scalar};
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use num_traits::NumCast;
use rayon::prelude::*;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Below this many output elements the kernels fill rows on the calling thread.
/// The eigen loop runs tens of thousands of small products, where handing rows to
/// the rayon pool costs more than the arithmetic.
pub const PARALLEL_MIN_ELEMENTS: usize = 4096;

/// Dense `rows x cols` matrix stored row-major (linear index = `row * cols + col`).
///
/// `Matrix` owns its buffer. Cloning deep-copies, and every arithmetic or
/// decomposition routine returns a freshly allocated matrix, so two handles never
/// alias each other's storage. Borrowed, non-owning access goes through
/// [`Matrix::view`] and [`Matrix::column_view`], which hand out ndarray views tied
/// to the lifetime of the matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T: Scalar> {
    data: Array2<T>,
}

// --- Row kernels ---

fn fill_row<T: Scalar, F: Fn(usize, usize) -> T>(row_idx: usize, mut row: ArrayViewMut1<'_, T>, cell: &F) {
    for (col_idx, slot) in row.iter_mut().enumerate() {
        *slot = cell(row_idx, col_idx);
    }
}

/// Builds a `rows x cols` array where every cell is produced by `cell(row, col)`.
/// Each output row has exactly one writer, and `cell` may only read shared inputs,
/// so rows are dispatched to rayon without any locking.
fn build<T, F>(rows: usize, cols: usize, cell: F) -> Array2<T>
where
    T: Scalar,
    F: Fn(usize, usize) -> T + Sync,
{
    let mut out = Array2::<T>::zeros((rows, cols));
    if rows * cols >= PARALLEL_MIN_ELEMENTS {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row_idx, row)| fill_row(row_idx, row, &cell));
    } else {
        out.axis_iter_mut(Axis(0))
            .enumerate()
            .for_each(|(row_idx, row)| fill_row(row_idx, row, &cell));
    }
    out
}

/// Elementwise `lhs[i] = op(lhs[i], rhs[i])` for equally shaped arrays.
fn zip_in_place<T, F>(lhs: &mut Array2<T>, rhs: &Array2<T>, op: F)
where
    T: Scalar,
    F: Fn(T, T) -> T + Sync + Send,
{
    if lhs.len() >= PARALLEL_MIN_ELEMENTS {
        Zip::from(lhs).and(rhs).par_for_each(|a, &b| *a = op(*a, b));
    } else {
        Zip::from(lhs).and(rhs).for_each(|a, &b| *a = op(*a, b));
    }
}

fn check_dims(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(LinalgError::EmptyDimensions { rows, cols });
    }
    Ok(())
}

impl<T: Scalar> Matrix<T> {
    // --- Construction ---

    /// Zero-filled `rows x cols` matrix.
    ///
    /// # Errors
    /// `EmptyDimensions` if either dimension is zero.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self { data: Array2::zeros((rows, cols)) })
    }

    /// Matrix initialised from a row-major buffer of exactly `rows * cols` values.
    ///
    /// # Errors
    /// `EmptyDimensions` for a zero dimension, `BufferLength` if `values` has the wrong length.
    ///
    /// # Examples
    ///
    /// ```
    /// use eigenfaces::Matrix;
    /// let m = Matrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
    /// assert_eq!(m[(1, 0)], 4);
    /// assert_eq!(m[5], 6);
    /// ```
    pub fn from_vec(rows: usize, cols: usize, values: Vec<T>) -> Result<Self> {
        check_dims(rows, cols)?;
        let expected = rows * cols;
        let found = values.len();
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|_| LinalgError::BufferLength { rows, cols, expected, found })?;
        Ok(Self { data })
    }

    /// Copies `values` linearly into a new `rows x cols` matrix.
    pub fn from_slice(rows: usize, cols: usize, values: &[T]) -> Result<Self> {
        Self::from_vec(rows, cols, values.to_vec())
    }

    /// `values.len() x 1` column vector.
    pub fn column_vector(values: Vec<T>) -> Result<Self> {
        let rows = values.len();
        Self::from_vec(rows, 1, values)
    }

    /// Wraps an existing ndarray, copying it into row-major layout if needed.
    pub fn from_array(array: Array2<T>) -> Result<Self> {
        check_dims(array.nrows(), array.ncols())?;
        let data = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        Ok(Self { data })
    }

    /// Wraps an array whose shape is already known to be non-empty.
    pub(crate) fn wrap(data: Array2<T>) -> Self {
        debug_assert!(data.nrows() > 0 && data.ncols() > 0);
        Self { data }
    }

    /// Matrix whose cell `(i, j)` is `cell(i, j)`; rows are filled in parallel.
    pub fn from_fn<F>(rows: usize, cols: usize, cell: F) -> Result<Self>
    where
        F: Fn(usize, usize) -> T + Sync,
    {
        check_dims(rows, cols)?;
        Ok(Self { data: build(rows, cols, cell) })
    }

    /// `n x n` Kronecker-delta matrix.
    pub fn identity_of_size(n: usize) -> Result<Self> {
        Self::from_fn(n, n, |i, j| if i == j { T::one() } else { T::zero() })
    }

    // --- Shape and raw access ---

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a matrix has at least one element.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.cols()
    }

    /// Non-owning view of the whole matrix.
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Non-owning view of one column. Unlike [`Matrix::column`] nothing is copied,
    /// so the view cannot outlive or be mutated alongside `self`.
    pub fn column_view(&self, col: usize) -> Result<ArrayView1<'_, T>> {
        self.check_column(col)?;
        Ok(self.data.column(col))
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    /// Elements in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.data.iter()
    }

    /// Copy of the buffer in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().copied().collect()
    }

    // --- Element access ---

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.check_index(row, col)?;
        Ok(self.data[[row, col]])
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.check_index(row, col)?;
        self.data[[row, col]] = value;
        Ok(())
    }

    /// Element at row-major position `index`.
    pub fn get_linear(&self, index: usize) -> Result<T> {
        let (row, col) = self.split_linear(index)?;
        Ok(self.data[[row, col]])
    }

    pub fn set_linear(&mut self, index: usize, value: T) -> Result<()> {
        let (row, col) = self.split_linear(index)?;
        self.data[[row, col]] = value;
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        let (rows, cols) = self.shape();
        if row >= rows || col >= cols {
            return Err(LinalgError::IndexOutOfBounds { row, col, rows, cols });
        }
        Ok(())
    }

    fn check_column(&self, col: usize) -> Result<()> {
        if col >= self.cols() {
            return Err(LinalgError::ColumnOutOfBounds { col, cols: self.cols() });
        }
        Ok(())
    }

    fn split_linear(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.len() {
            return Err(LinalgError::LinearIndexOutOfBounds { index, len: self.len() });
        }
        Ok((index / self.cols(), index % self.cols()))
    }

    fn check_same_shape(&self, other: &Self, operation: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(LinalgError::ShapeMismatch {
                operation,
                left_rows: self.rows(),
                left_cols: self.cols(),
                right_rows: other.rows(),
                right_cols: other.cols(),
            });
        }
        Ok(())
    }

    // --- Arithmetic ---

    /// Matrix product `self * other`.
    ///
    /// Every output cell is an independent dot product accumulated from `T::zero()`,
    /// so output rows are computed in parallel.
    ///
    /// # Errors
    /// `ShapeMismatch` unless `self.cols() == other.rows()`.
    ///
    /// # Examples
    ///
    /// ```
    /// use eigenfaces::Matrix;
    /// let a = Matrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
    /// let b = Matrix::from_vec(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
    /// let c = a.multiply(&b).unwrap();
    /// assert_eq!(c.to_vec(), vec![22, 28, 49, 64]);
    /// ```
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        if self.cols() != other.rows() {
            return Err(LinalgError::ShapeMismatch {
                operation: "multiply",
                left_rows: self.rows(),
                left_cols: self.cols(),
                right_rows: other.rows(),
                right_cols: other.cols(),
            });
        }
        Ok(self.product(other))
    }

    /// Product without the shape check; callers guarantee `self.cols() == other.rows()`.
    pub(crate) fn product(&self, other: &Self) -> Self {
        let (lhs, rhs) = (&self.data, &other.data);
        if lhs.nrows() * rhs.ncols() < PARALLEL_MIN_ELEMENTS {
            return Self { data: lhs.dot(rhs) };
        }
        let mut data = Array2::<T>::zeros((lhs.nrows(), rhs.ncols()));
        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row_idx, mut row)| row.assign(&lhs.row(row_idx).dot(rhs)));
        Self { data }
    }

    /// Multiplies every element by `scalar`.
    pub fn scale(&self, scalar: T) -> Self {
        let src = &self.data;
        Self { data: build(self.rows(), self.cols(), |i, j| src[[i, j]] * scalar) }
    }

    /// Elementwise sum.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other, "add")?;
        let (lhs, rhs) = (&self.data, &other.data);
        Ok(Self { data: build(self.rows(), self.cols(), |i, j| lhs[[i, j]] + rhs[[i, j]]) })
    }

    /// Elementwise difference `self - other`.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other, "sub")?;
        let (lhs, rhs) = (&self.data, &other.data);
        Ok(Self { data: build(self.rows(), self.cols(), |i, j| lhs[[i, j]] - rhs[[i, j]]) })
    }

    /// Divides every element by `scalar`.
    ///
    /// # Errors
    /// `DivisionByZero` when `scalar` is the additive identity, for every element type.
    pub fn divide(&self, scalar: T) -> Result<Self> {
        if scalar.is_zero() {
            return Err(LinalgError::DivisionByZero);
        }
        let src = &self.data;
        Ok(Self { data: build(self.rows(), self.cols(), |i, j| src[[i, j]] / scalar) })
    }

    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other, "add_assign")?;
        zip_in_place(&mut self.data, &other.data, |a, b| a + b);
        Ok(())
    }

    pub fn sub_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_shape(other, "sub_assign")?;
        zip_in_place(&mut self.data, &other.data, |a, b| a - b);
        Ok(())
    }

    pub fn divide_assign(&mut self, scalar: T) -> Result<()> {
        if scalar.is_zero() {
            return Err(LinalgError::DivisionByZero);
        }
        if self.len() >= PARALLEL_MIN_ELEMENTS {
            self.data.par_mapv_inplace(|x| x / scalar);
        } else {
            self.data.mapv_inplace(|x| x / scalar);
        }
        Ok(())
    }

    /// Applies `f` to every element, producing a matrix of a possibly different type.
    pub fn map<U, F>(&self, f: F) -> Matrix<U>
    where
        U: Scalar,
        F: Fn(T) -> U + Sync,
    {
        let src = &self.data;
        Matrix { data: build(self.rows(), self.cols(), |i, j| f(src[[i, j]])) }
    }

    /// `cols x rows` transpose.
    pub fn transpose(&self) -> Self {
        let src = &self.data;
        Self { data: build(self.cols(), self.rows(), |i, j| src[[j, i]]) }
    }

    /// Shape-preserving conversion to a floating element type.
    pub fn to_floating<F: Real>(&self) -> Matrix<F> {
        self.map(|x| <F as NumCast>::from(x).unwrap_or_else(F::nan))
    }

    pub fn to_f64(&self) -> Matrix<f64> {
        self.to_floating::<f64>()
    }

    // --- Columns and sub-matrices ---

    /// Owned copy of column `col` as a `rows x 1` matrix.
    pub fn column(&self, col: usize) -> Result<Self> {
        self.check_column(col)?;
        let data = self.data.column(col).to_owned().insert_axis(Axis(1));
        Ok(Self { data })
    }

    /// Overwrites column `col` with the `rows x 1` matrix `values`.
    pub fn set_column(&mut self, col: usize, values: &Self) -> Result<()> {
        self.check_column(col)?;
        if values.shape() != (self.rows(), 1) {
            return Err(LinalgError::ShapeMismatch {
                operation: "set_column",
                left_rows: self.rows(),
                left_cols: 1,
                right_rows: values.rows(),
                right_cols: values.cols(),
            });
        }
        self.data.column_mut(col).assign(&values.data.column(0));
        Ok(())
    }

    /// Columns `[start, end)`.
    ///
    /// # Errors
    /// `InvalidSlice` if `end >= cols`, `start > end`, or the range is empty.
    /// The last column is therefore never part of a slice.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if end >= self.cols() || start >= end {
            return Err(LinalgError::InvalidSlice { start, end, cols: self.cols() });
        }
        let src = &self.data;
        Ok(Self { data: build(self.rows(), end - start, |i, j| src[[i, start + j]]) })
    }

    /// Main diagonal as a `min(rows, cols) x 1` column.
    pub fn diagonal(&self) -> Self {
        Self { data: self.data.diag().to_owned().insert_axis(Axis(1)) }
    }

    /// Identity matrix with the shape of `self`.
    ///
    /// # Errors
    /// `NotSquare` for a non-square matrix.
    pub fn identity(&self) -> Result<Self> {
        if !self.is_square() {
            return Err(LinalgError::NotSquare { operation: "identity", rows: self.rows(), cols: self.cols() });
        }
        Self::identity_of_size(self.rows())
    }

    /// Reshapes into a `rows * cols x 1` column, keeping row-major order.
    pub fn flatten(&self) -> Self {
        let flat: Vec<T> = self.to_vec();
        let len = flat.len();
        Self { data: Array2::from_shape_fn((len, 1), |(i, _)| flat[i]) }
    }

    // --- Reductions ---

    /// Sum of elementwise products of two equally shaped matrices.
    pub fn dot(&self, other: &Self) -> Result<T> {
        self.check_same_shape(other, "dot")?;
        Ok(Zip::from(&self.data).and(&other.data).fold(T::zero(), |acc, &x, &y| acc + x * y))
    }

    /// Frobenius norm, `sqrt(sum of squares)`, always computed in `f64`.
    pub fn norm(&self) -> f64 {
        self.data
            .iter()
            .map(|&x| {
                let v = x.as_f64();
                v * v
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Mean of squared elementwise differences. Not square-rooted.
    pub fn l2(&self, other: &Self) -> Result<f64> {
        self.check_same_shape(other, "l2")?;
        let total: f64 = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| {
                let d = a.as_f64() - b.as_f64();
                d * d
            })
            .sum();
        Ok(total / self.len() as f64)
    }

    /// Frobenius norm of the entries strictly below the main diagonal.
    pub fn lower_triangle_norm(&self) -> f64 {
        self.data
            .indexed_iter()
            .filter(|((i, j), _)| i > j)
            .map(|(_, &x)| {
                let v = x.as_f64();
                v * v
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Largest `|a[i][j] - a[j][i]|`, or `None` for a non-square matrix.
    pub fn max_asymmetry(&self) -> Option<f64> {
        if !self.is_square() {
            return None;
        }
        let n = self.rows();
        let mut worst = 0.0_f64;
        for i in 0..n {
            for j in (i + 1)..n {
                worst = worst.max((self.data[[i, j]].as_f64() - self.data[[j, i]].as_f64()).abs());
            }
        }
        Some(worst)
    }

    /// Square and symmetric to within `tolerance` relative to the largest magnitude entry.
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        let scale = self.data.iter().fold(0.0_f64, |m, &x| m.max(x.as_f64().abs())).max(1.0);
        self.max_asymmetry().map_or(false, |worst| worst <= tolerance * scale)
    }
}

impl<T: Scalar> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[[row, col]]
    }
}

impl<T: Scalar> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        &mut self.data[[row, col]]
    }
}

/// Row-major linear indexing. Panics when out of range, like ndarray indexing.
impl<T: Scalar> Index<usize> for Matrix<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        let cols = self.cols();
        &self.data[[index / cols, index % cols]]
    }
}

impl<T: Scalar> IndexMut<usize> for Matrix<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        let cols = self.cols();
        &mut self.data[[index / cols, index % cols]]
    }
}

impl<T: Scalar> fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.axis_iter(Axis(0)) {
            let mut first = true;
            for value in row.iter() {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}", value)?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
