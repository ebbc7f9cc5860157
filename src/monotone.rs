//! Monotone spline transforms of the boundary-extrapolated B-spline basis.
//!
//! [`ISplineBasis`] produces integrated, non-decreasing basis functions for
//! monotone effects on time rescaled to `[0, 1]`; [`MSplineBasis`] produces
//! the matching density-normalized basis functions.

use ndarray::Array1;

use crate::basis::{BasisError, BasisExpansion};
use crate::bspline::BSplineBasis;
use crate::scalar::Scalar;

/// Integrated (I-spline) basis: each entry is a non-decreasing function of
/// `x` over `[0, 1]`, zero below 0 and saturating at 1 above 1.
///
/// The caller is expected to rescale time so that the support is `[0, 1]`.
#[derive(Clone, Debug)]
pub struct ISplineBasis {
    bspline: BSplineBasis,
    intercept: bool,
}

impl ISplineBasis {
    pub fn new(
        boundary_knots: (f64, f64),
        interior_knots: Array1<f64>,
        intercept: bool,
        order: usize,
    ) -> Result<Self, BasisError> {
        // The running-sum transform works on the wrapped spline with its
        // leading column already dropped; the intercept flag here decides
        // whether one more column goes on output.
        let bspline = BSplineBasis::new(boundary_knots, interior_knots, false, order)?;
        Ok(Self { bspline, intercept })
    }

    pub fn intercept(&self) -> bool {
        self.intercept
    }

    /// First index in the knot vector (excluding the final knot) whose value
    /// is at least `x`.
    fn span_bound<T: Scalar>(&self, x: T) -> usize {
        let knots = self.bspline.knots();
        let mut lo = 0usize;
        let mut hi = knots.len() - 1;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if T::from_f64(knots[mid]) < x {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl BasisExpansion for ISplineBasis {
    fn n_basis(&self) -> usize {
        self.bspline
            .n_basis()
            .saturating_sub(usize::from(!self.intercept))
    }

    fn n_scratch(&self) -> usize {
        self.bspline.n_scratch() + self.bspline.n_basis()
    }

    fn evaluate<T: Scalar>(
        &self,
        out: &mut [T],
        scratch: &mut [T],
        x: T,
        deriv: i32,
    ) -> Result<(), BasisError> {
        if deriv < 0 {
            return Err(BasisError::UnsupportedDerivative {
                deriv,
                basis: "integrated spline",
            });
        }
        debug_assert_eq!(out.len(), self.n_basis());

        if x < T::zero() {
            for slot in out.iter_mut() {
                *slot = T::zero();
            }
            return Ok(());
        }
        if x > T::one() {
            let fill = if deriv > 0 { T::zero() } else { T::one() };
            for slot in out.iter_mut() {
                *slot = fill;
            }
            return Ok(());
        }

        let n_b = self.bspline.n_basis();
        let (b, rest) = scratch.split_at_mut(n_b);
        self.bspline.evaluate(b, rest, x, deriv)?;

        let order = self.bspline.order();
        let js = if self.bspline.interior_knots().is_empty() {
            order + 1
        } else {
            self.span_bound(x)
        };

        // Right-to-left running sum, truncated past the active span.
        for j in (0..n_b).rev() {
            if j > js {
                b[j] = T::zero();
            } else if j != n_b - 1 {
                let carry = b[j + 1];
                b[j] += carry;
            }
        }
        if deriv == 0 {
            // Basis functions whose support is entirely below x integrate to 1.
            for j in (0..n_b.saturating_sub(1)).rev() {
                if j + order + 1 < js {
                    b[j] = T::one();
                }
            }
        }

        let skip = usize::from(!self.intercept);
        out.copy_from_slice(&b[skip..n_b]);
        Ok(())
    }
}

/// Density (M-spline) basis: the B-spline basis rescaled so each function
/// integrates to one over its support span.
#[derive(Clone, Debug)]
pub struct MSplineBasis {
    bspline: BSplineBasis,
    intercept: bool,
}

impl MSplineBasis {
    pub fn new(
        boundary_knots: (f64, f64),
        interior_knots: Array1<f64>,
        intercept: bool,
        order: usize,
    ) -> Result<Self, BasisError> {
        let bspline = BSplineBasis::new(boundary_knots, interior_knots, true, order)?;
        Ok(Self { bspline, intercept })
    }

    pub fn intercept(&self) -> bool {
        self.intercept
    }
}

impl BasisExpansion for MSplineBasis {
    fn n_basis(&self) -> usize {
        self.bspline
            .n_basis()
            .saturating_sub(usize::from(!self.intercept))
    }

    fn n_scratch(&self) -> usize {
        self.bspline.n_scratch() + self.bspline.n_basis()
    }

    fn evaluate<T: Scalar>(
        &self,
        out: &mut [T],
        scratch: &mut [T],
        x: T,
        deriv: i32,
    ) -> Result<(), BasisError> {
        if deriv < 0 {
            return Err(BasisError::UnsupportedDerivative {
                deriv,
                basis: "density spline",
            });
        }
        debug_assert_eq!(out.len(), self.n_basis());

        let n_b = self.bspline.n_basis();
        let (wrk, rest) = scratch.split_at_mut(n_b);
        self.bspline.evaluate(wrk, rest, x, deriv)?;

        let knots = self.bspline.knots();
        let order = self.bspline.order();
        for j in 0..n_b {
            let denom = knots[j + order] - knots[j];
            let factor = if denom > 0.0 { order as f64 / denom } else { 0.0 };
            wrk[j] *= T::from_f64(factor);
        }

        let skip = usize::from(!self.intercept);
        out.copy_from_slice(&wrk[skip..n_b]);
        Ok(())
    }
}
