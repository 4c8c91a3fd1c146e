// src/scalar.rs

use num_traits::{Float, Num, NumCast};
use std::fmt::{Debug, Display};

/// Element type a [`Matrix`](crate::Matrix) can hold.
///
/// Anything with `+ - * /`, an additive identity (`zero()`) and a lossy cast to
/// other numeric types qualifies, so integer and floating matrices share one
/// implementation. `Send + Sync` lets the row kernels run on the rayon pool.
pub trait Scalar: Num + NumCast + Copy + Send + Sync + Debug + Display + 'static {
    /// Lossy conversion to `f64`; values with no `f64` representation become NaN.
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

impl<T> Scalar for T where T: Num + NumCast + Copy + Send + Sync + Debug + Display + 'static {}

/// Floating element type. All decompositions run on `Real` matrices.
pub trait Real: Scalar + Float {
    /// Converts an `f64` constant (tolerances, counts) into `Self`.
    fn from_constant(value: f64) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::nan)
    }
}

impl<T> Real for T where T: Scalar + Float {}
