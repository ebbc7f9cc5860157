//! Generic scalar contract for basis evaluation.
//!
//! Every evaluation routine in this crate is written once, generically, and
//! runs both on plain `f64` and on a caller-supplied differentiable numeric
//! type (a forward/tape scalar that records the operations performed on it).
//! Configuration data (knots, recurrence coefficients) always stays `f64`;
//! [`Scalar::from_f64`] lifts those constants into the evaluation type at the
//! point of use.

use num_traits::{One, Zero};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Numeric type accepted by every basis evaluation.
///
/// Comparisons against knot positions use `PartialOrd`; a differentiable
/// implementation should compare (and test equality on) its primal value so
/// that branch selection matches the plain floating-point path.
pub trait Scalar:
    Copy
    + Debug
    + PartialOrd
    + Zero
    + One
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + Send
    + Sync
    + 'static
{
    /// Lifts a configuration constant into the evaluation type.
    fn from_f64(value: f64) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Scalar for f32 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}
