//! Polynomial B-spline basis over an explicit knot vector.
//!
//! This is the computational core of the spline family: every other spline
//! basis in the crate wraps it. Value evaluation uses the forward Cox-de Boor
//! recursion; derivative evaluation uses the slower per-basis-function
//! algorithm that differentiates a unit impulse in the coefficient space.
//!
//! Knot vectors are allowed to contain repeated values. Zero-width spans make
//! some denominators in the recursion vanish; whether any interior span can
//! trigger that is decided once at construction time, selecting either an
//! unguarded fast recursion or a guarded variant where a vanishing denominator
//! contributes a defined zero instead of a NaN.

use ndarray::Array1;

use crate::basis::{BasisError, BasisExpansion};
use crate::scalar::Scalar;

/// B-spline basis defined by a knot vector and a spline order (degree + 1).
#[derive(Clone, Debug)]
pub struct SplineBasis {
    knots: Array1<f64>,
    order: usize,
    ncoef: usize,
    no_div_zero: bool,
}

impl SplineBasis {
    /// Builds the basis from a non-decreasing knot vector.
    ///
    /// The number of basis functions is `knots.len() - order` (zero when the
    /// knot vector is shorter than that).
    pub fn new(knots: Array1<f64>, order: usize) -> Result<Self, BasisError> {
        if order == 0 {
            return Err(BasisError::InvalidOrder);
        }
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(BasisError::InvalidKnotVector(
                "knot vector contains non-finite values".to_string(),
            ));
        }
        if (1..knots.len()).any(|i| knots[i - 1] > knots[i]) {
            return Err(BasisError::InvalidKnotVector(
                "knot vector is not non-decreasing".to_string(),
            ));
        }
        let ncoef = knots.len().saturating_sub(order);
        let no_div_zero = scan_interior_spans(&knots, order);
        log::debug!(
            "spline basis with {} knots, order {}: {} recursion selected",
            knots.len(),
            order,
            if no_div_zero { "unguarded" } else { "guarded" }
        );
        Ok(Self {
            knots,
            order,
            ncoef,
            no_div_zero,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn knots(&self) -> &Array1<f64> {
        &self.knots
    }

    /// True when no interior span can produce a zero denominator in the value
    /// recursion, so the unguarded path is in use.
    pub fn unguarded(&self) -> bool {
        self.no_div_zero
    }

    /// Locates the knot span for `x`.
    ///
    /// Returns the cursor and whether `x` sits exactly on the right boundary
    /// of the usable range (which maps into the last span by convention).
    fn locate<T: Scalar>(&self, x: T) -> (usize, bool) {
        let mut curs = 0usize;
        for (i, &k) in self.knots.iter().enumerate() {
            let k = T::from_f64(k);
            if k >= x {
                curs = i;
            }
            if k > x {
                break;
            }
        }
        if curs > self.ncoef && x == T::from_f64(self.knots[self.ncoef]) {
            return (self.ncoef, true);
        }
        (curs, false)
    }

    fn diff_table<T: Scalar>(&self, curs: usize, x: T, ndiff: usize, ldel: &mut [T], rdel: &mut [T]) {
        for i in 0..ndiff {
            rdel[i] = T::from_f64(self.knots[curs + i]) - x;
            ldel[i] = x - T::from_f64(self.knots[curs - (i + 1)]);
        }
    }

    /// Evaluates one basis function's `nder`-th derivative from a unit impulse
    /// stored in `a`: `nder` rounds of finite differencing followed by the
    /// remaining recursion rounds.
    fn slow_evaluate<T: Scalar>(
        &self,
        curs: usize,
        boundary: bool,
        x: T,
        nder: usize,
        ldel: &mut [T],
        rdel: &mut [T],
        a: &mut [T],
    ) -> T {
        let ordm1 = self.order - 1;
        // The value at the right boundary is arbitrary for the top derivative
        // order; return 0 by convention.
        if boundary && nder == ordm1 {
            return T::zero();
        }
        let mut outer = ordm1;
        for _ in 0..nder {
            for apt in 0..outer {
                let lpt = curs - outer + apt;
                a[apt] = T::from_f64(outer as f64) * (a[apt + 1] - a[apt])
                    / T::from_f64(self.knots[lpt + outer] - self.knots[lpt]);
            }
            outer -= 1;
        }
        self.diff_table(curs, x, outer, ldel, rdel);
        while outer > 0 {
            outer -= 1;
            for apt in 0..=outer {
                let lpt = outer - apt;
                a[apt] = (a[apt + 1] * ldel[lpt] + a[apt] * rdel[apt]) / (rdel[apt] + ldel[lpt]);
            }
        }
        a[0]
    }

    /// Forward Cox-de Boor recursion for all `order` basis functions that are
    /// non-zero on the located span.
    fn basis_funcs<T: Scalar>(&self, curs: usize, x: T, ldel: &mut [T], rdel: &mut [T], b: &mut [T]) {
        let ordm1 = self.order - 1;
        self.diff_table(curs, x, ordm1, ldel, rdel);
        b[0] = T::one();
        if self.no_div_zero {
            for j in 1..=ordm1 {
                let mut saved = T::zero();
                for r in 0..j {
                    let den = rdel[r] + ldel[j - 1 - r];
                    let term = b[r] / den;
                    b[r] = saved + rdel[r] * term;
                    saved = ldel[j - 1 - r] * term;
                }
                b[j] = saved;
            }
        } else {
            for j in 1..=ordm1 {
                let mut saved = T::zero();
                for r in 0..j {
                    let den = rdel[r] + ldel[j - 1 - r];
                    if den != T::zero() {
                        let term = b[r] / den;
                        b[r] = saved + rdel[r] * term;
                        saved = ldel[j - 1 - r] * term;
                    } else {
                        // A vanishing span contributes a defined zero.
                        if r != 0 || rdel[r] != T::zero() {
                            b[r] = saved;
                        }
                        saved = T::zero();
                    }
                }
                b[j] = saved;
            }
        }
    }
}

impl BasisExpansion for SplineBasis {
    fn n_basis(&self) -> usize {
        self.ncoef
    }

    fn n_scratch(&self) -> usize {
        2 * (self.order - 1) + 2 * self.order
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
                basis: "polynomial spline",
            });
        }
        debug_assert_eq!(out.len(), self.ncoef);
        for slot in out.iter_mut() {
            *slot = T::zero();
        }
        if self.ncoef == 0 {
            return Ok(());
        }

        let (curs, boundary) = self.locate(x);
        if curs < self.order || curs > self.ncoef {
            // x lies outside the span covered by the available knots.
            return Ok(());
        }
        let io = curs - self.order;

        let ordm1 = self.order - 1;
        let (ldel, rest) = scratch.split_at_mut(ordm1);
        let (rdel, rest) = rest.split_at_mut(ordm1);
        let (a, rest) = rest.split_at_mut(self.order);
        let (wrk, _) = rest.split_at_mut(self.order);

        if deriv == 0 {
            self.basis_funcs(curs, x, ldel, rdel, wrk);
            out[io..io + self.order].copy_from_slice(&wrk[..self.order]);
        } else {
            let nder = deriv as usize;
            if nder >= self.order {
                // Derivative order exceeds the piecewise polynomial degree.
                return Ok(());
            }
            for i in 0..self.order {
                for slot in a.iter_mut() {
                    *slot = T::zero();
                }
                a[i] = T::one();
                out[io + i] = self.slow_evaluate(curs, boundary, x, nder, ldel, rdel, a);
            }
        }
        Ok(())
    }
}

/// Scans every interior span reachable by the value recursion for a zero
/// denominator, deciding once whether the unguarded path is safe.
fn scan_interior_spans(knots: &Array1<f64>, order: usize) -> bool {
    let ordm1 = order - 1;
    let nknots = knots.len();
    let end_curs = if nknots > ordm1 { nknots - ordm1 } else { order };
    for curs in order..end_curs {
        for j in 1..=ordm1 {
            for r in 0..j {
                if knots[curs + r] - knots[curs - (j - r)] == 0.0 {
                    return false;
                }
            }
        }
    }
    true
}
