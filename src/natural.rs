//! Natural spline basis: a boundary-extrapolated spline projected onto the
//! null space of its boundary second-derivative constraint, making the basis
//! exactly linear at and beyond both boundary knots.

use ndarray::{Array1, Array2};

use crate::basis::{BasisError, BasisExpansion};
use crate::bspline::BSplineBasis;
use crate::linalg;
use crate::scalar::Scalar;

/// Spline basis constrained to be linear beyond its boundary knots.
///
/// Construction evaluates the wrapped spline's second derivative at the two
/// boundary knots, factorizes the resulting constraint matrix, and keeps an
/// orthonormal basis of its null space as the projection applied to every
/// evaluation. Beyond the boundaries, evaluation short-circuits to
/// precomputed tangent lines.
#[derive(Clone, Debug)]
pub struct NaturalSplineBasis {
    bspline: BSplineBasis,
    intercept: bool,
    /// Orthonormal rows; the first two span the constraint row space and are
    /// dropped from every projected result.
    q_matrix: Array2<f64>,
    tl0: Array1<f64>,
    tl1: Array1<f64>,
    tr0: Array1<f64>,
    tr1: Array1<f64>,
}

impl NaturalSplineBasis {
    pub fn new(
        boundary_knots: (f64, f64),
        interior_knots: Array1<f64>,
        intercept: bool,
        order: usize,
    ) -> Result<Self, BasisError> {
        // The wrapped spline keeps its intercept column; this basis drops it
        // during projection instead.
        let bspline = BSplineBasis::new(boundary_knots, interior_knots, true, order)?;
        let m = bspline.n_basis();
        let skip = usize::from(!intercept);
        let p = m - skip;

        let mut scratch = vec![0.0; bspline.n_scratch()];
        let mut row = vec![0.0; m];
        let mut constraints = Array2::<f64>::zeros((2, p));
        for (r, &knot) in [boundary_knots.0, boundary_knots.1].iter().enumerate() {
            bspline.evaluate(&mut row, &mut scratch, knot, 2)?;
            for (c, &value) in row[skip..].iter().enumerate() {
                constraints[[r, c]] = value;
            }
        }

        let (singular, q_matrix) = linalg::constraint_factorization(&constraints)?;
        let tol = p as f64 * 1e-12 * singular.iter().fold(1.0_f64, |acc, &s| acc.max(s));
        if singular.len() < 2 || singular.iter().take(2).any(|&s| s <= tol) {
            return Err(BasisError::RankDeficient);
        }
        log::debug!(
            "natural spline constraint factorized: {} columns, {} retained",
            p,
            p - 2
        );

        let project = |v: &[f64]| -> Array1<f64> {
            let q = q_matrix.nrows();
            let mut out = Array1::<f64>::zeros(q - 2);
            for i in 2..q {
                let mut acc = 0.0;
                for j in 0..q_matrix.ncols() {
                    acc += q_matrix[[i, j]] * v[j + skip];
                }
                out[i - 2] = acc;
            }
            out
        };

        let mut values = vec![0.0; m];
        bspline.evaluate(&mut values, &mut scratch, boundary_knots.0, 0)?;
        let tl0 = project(&values);
        bspline.evaluate(&mut values, &mut scratch, boundary_knots.0, 1)?;
        let tl1 = project(&values);
        bspline.evaluate(&mut values, &mut scratch, boundary_knots.1, 0)?;
        let tr0 = project(&values);
        bspline.evaluate(&mut values, &mut scratch, boundary_knots.1, 1)?;
        let tr1 = project(&values);

        Ok(Self {
            bspline,
            intercept,
            q_matrix,
            tl0,
            tl1,
            tr0,
            tr1,
        })
    }

    pub fn boundary_knots(&self) -> [f64; 2] {
        self.bspline.boundary_knots()
    }

    pub fn intercept(&self) -> bool {
        self.intercept
    }

    /// Fills `out` with the tangent-line evaluation around `boundary`.
    fn tangent<T: Scalar>(
        out: &mut [T],
        offset: &Array1<f64>,
        slope: &Array1<f64>,
        boundary: f64,
        x: T,
        deriv: i32,
    ) {
        match deriv {
            0 => {
                let shift = x - T::from_f64(boundary);
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = T::from_f64(offset[i]) + T::from_f64(slope[i]) * shift;
                }
            }
            1 => {
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = T::from_f64(slope[i]);
                }
            }
            _ => {
                for slot in out.iter_mut() {
                    *slot = T::zero();
                }
            }
        }
    }
}

impl BasisExpansion for NaturalSplineBasis {
    fn n_basis(&self) -> usize {
        self.q_matrix.nrows().saturating_sub(2)
    }

    fn n_scratch(&self) -> usize {
        self.bspline.n_scratch() + self.q_matrix.nrows() + self.bspline.n_basis()
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
                basis: "natural spline",
            });
        }
        debug_assert_eq!(out.len(), self.n_basis());
        let [lo, hi] = self.bspline.boundary_knots();

        if x < T::from_f64(lo) {
            Self::tangent(out, &self.tl0, &self.tl1, lo, x, deriv);
            return Ok(());
        }
        if x > T::from_f64(hi) {
            Self::tangent(out, &self.tr0, &self.tr1, hi, x, deriv);
            return Ok(());
        }

        let q = self.q_matrix.nrows();
        let m = self.bspline.n_basis();
        let (lhs, rest) = scratch.split_at_mut(q);
        let (b, rest) = rest.split_at_mut(m);
        self.bspline.evaluate(b, rest, x, deriv)?;

        let skip = usize::from(!self.intercept);
        for i in 0..q {
            let mut acc = T::zero();
            for j in 0..self.q_matrix.ncols() {
                acc += T::from_f64(self.q_matrix[[i, j]]) * b[j + skip];
            }
            lhs[i] = acc;
        }
        out.copy_from_slice(&lhs[2..q]);
        Ok(())
    }
}
