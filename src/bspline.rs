//! B-spline basis with linear extrapolation beyond its boundary knots.
//!
//! Inside the boundary interval this delegates to the underlying
//! [`SplineBasis`] built on a clamped knot vector (each boundary knot repeated
//! `order` times). Outside it, the requested value or derivative is
//! reconstructed from a cubic Taylor expansion around a pivot point placed a
//! quarter of a knot interval inside the boundary, which makes the basis
//! linear far from the data while keeping value and slope continuous at the
//! boundary.

use ndarray::Array1;

use crate::basis::{BasisError, BasisExpansion};
use crate::scalar::Scalar;
use crate::spline::SplineBasis;

/// Boundary-extrapolated B-spline basis.
#[derive(Clone, Debug)]
pub struct BSplineBasis {
    spline: SplineBasis,
    boundary_knots: [f64; 2],
    interior_knots: Array1<f64>,
    intercept: bool,
}

impl BSplineBasis {
    /// Builds the basis from boundary knots, interior knots strictly inside
    /// them, an intercept flag, and the spline order.
    pub fn new(
        boundary_knots: (f64, f64),
        interior_knots: Array1<f64>,
        intercept: bool,
        order: usize,
    ) -> Result<Self, BasisError> {
        let (lo, hi) = boundary_knots;
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(BasisError::InvalidBoundaryKnots(lo, hi));
        }
        if let Some(&k) = interior_knots.iter().find(|&&k| k <= lo || k >= hi) {
            return Err(BasisError::InteriorKnotOutOfRange(k, lo, hi));
        }
        let mut knots = Vec::with_capacity(2 * order + interior_knots.len());
        knots.extend(std::iter::repeat(lo).take(order));
        knots.extend(interior_knots.iter().copied());
        knots.extend(std::iter::repeat(hi).take(order));
        let spline = SplineBasis::new(Array1::from(knots), order)?;
        Ok(Self {
            spline,
            boundary_knots: [lo, hi],
            interior_knots,
            intercept,
        })
    }

    pub fn order(&self) -> usize {
        self.spline.order()
    }

    pub fn knots(&self) -> &Array1<f64> {
        self.spline.knots()
    }

    pub fn boundary_knots(&self) -> [f64; 2] {
        self.boundary_knots
    }

    pub fn interior_knots(&self) -> &Array1<f64> {
        &self.interior_knots
    }

    pub fn intercept(&self) -> bool {
        self.intercept
    }

    fn buffer_len(&self) -> usize {
        self.spline.n_basis().max(self.n_basis())
    }

    /// Accumulates `f` times the `d`-th derivative at the pivot into `out`.
    fn add_term<T: Scalar>(
        &self,
        out: &mut [T],
        buf: &mut [T],
        rest: &mut [T],
        pivot: T,
        d: i32,
        f: T,
    ) -> Result<(), BasisError> {
        let nb = self.n_basis();
        self.evaluate(&mut buf[..nb], rest, pivot, d)?;
        for (slot, &term) in out.iter_mut().zip(buf[..nb].iter()) {
            *slot += f * term;
        }
        Ok(())
    }
}

impl BasisExpansion for BSplineBasis {
    fn n_basis(&self) -> usize {
        self.spline
            .n_basis()
            .saturating_sub(usize::from(!self.intercept))
    }

    fn n_scratch(&self) -> usize {
        2 * self.buffer_len() + self.spline.n_scratch()
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
                basis: "boundary-extrapolated spline",
            });
        }
        debug_assert_eq!(out.len(), self.n_basis());
        let (buf, rest) = scratch.split_at_mut(self.buffer_len());

        let lo = self.boundary_knots[0];
        let hi = self.boundary_knots[1];
        let below = x < T::from_f64(lo);
        if below || x > T::from_f64(hi) {
            let knots = self.spline.knots();
            let order = self.spline.order();
            let pivot = if below {
                0.75 * lo + 0.25 * knots[order]
            } else {
                0.75 * hi + 0.25 * knots[knots.len() - order - 2]
            };
            let pivot_t = T::from_f64(pivot);
            let delta = x - pivot_t;
            let half = T::from_f64(0.5);
            let sixth = T::from_f64(1.0 / 6.0);

            for slot in out.iter_mut() {
                *slot = T::zero();
            }
            match deriv {
                0 => {
                    self.add_term(out, buf, rest, pivot_t, 0, T::one())?;
                    self.add_term(out, buf, rest, pivot_t, 1, delta)?;
                    self.add_term(out, buf, rest, pivot_t, 2, delta * delta * half)?;
                    self.add_term(out, buf, rest, pivot_t, 3, delta * delta * delta * sixth)?;
                }
                1 => {
                    self.add_term(out, buf, rest, pivot_t, 1, T::one())?;
                    self.add_term(out, buf, rest, pivot_t, 2, delta)?;
                    self.add_term(out, buf, rest, pivot_t, 3, delta * delta * half)?;
                }
                2 => {
                    self.add_term(out, buf, rest, pivot_t, 2, T::one())?;
                    self.add_term(out, buf, rest, pivot_t, 3, delta)?;
                }
                3 => {
                    self.add_term(out, buf, rest, pivot_t, 3, T::one())?;
                }
                _ => {
                    return Err(BasisError::UnsupportedDerivative {
                        deriv,
                        basis: "boundary-extrapolated spline",
                    });
                }
            }
            return Ok(());
        }

        if self.intercept {
            self.spline.evaluate(out, rest, x, deriv)
        } else {
            let m = self.spline.n_basis();
            self.spline.evaluate(&mut buf[..m], rest, x, deriv)?;
            out.copy_from_slice(&buf[1..m]);
            Ok(())
        }
    }
}
