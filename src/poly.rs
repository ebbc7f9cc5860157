//! Raw and orthogonalized polynomial bases.
//!
//! The raw variant evaluates plain powers of `x` with closed-form derivatives
//! and antiderivatives. The orthogonalized variant is driven by three-term
//! recurrence coefficients (`alpha`, `norm2`); its derivatives and
//! antiderivatives are computed in the monomial basis and mapped back through
//! a triangular change-of-basis matrix generated once at construction.
//!
//! This is the only basis in the crate that supports antiderivative
//! evaluation (`deriv < 0`); the definite integral runs from the instance's
//! configured lower limit to `x`.

use ndarray::{Array2, ArrayView1};

use crate::basis::{BasisError, BasisExpansion};
use crate::scalar::Scalar;

/// Polynomial basis, either raw powers or an orthogonalized recurrence.
#[derive(Clone, Debug)]
pub struct OrthPolyBasis {
    alpha: Vec<f64>,
    norm2: Vec<f64>,
    sqrt_norm2: Vec<f64>,
    raw: bool,
    intercept: bool,
    n_basis: usize,
    /// Monomial coefficients of every orthonormalized basis function, laid
    /// out triangularly; empty for the raw variant.
    orth_map: Vec<f64>,
    lower_limit: f64,
}

impl OrthPolyBasis {
    /// Raw powers of `x`: `1, x, …, x^degree` with an intercept, `x, …,
    /// x^degree` without.
    pub fn raw(degree: usize, intercept: bool) -> Self {
        Self {
            alpha: Vec::new(),
            norm2: Vec::new(),
            sqrt_norm2: Vec::new(),
            raw: true,
            intercept,
            n_basis: degree + usize::from(intercept),
            orth_map: Vec::new(),
            lower_limit: 0.0,
        }
    }

    /// Orthogonalized polynomials from three-term recurrence coefficients.
    ///
    /// `norm2` must hold exactly `alpha.len() + 2` strictly positive entries,
    /// following the usual convention `norm2[0] = 1`, `norm2[1] = n`, and
    /// `norm2[j + 1]` the squared norm of the degree-`j` recurrence
    /// polynomial.
    pub fn orthogonal(
        alpha: Vec<f64>,
        norm2: Vec<f64>,
        intercept: bool,
    ) -> Result<Self, BasisError> {
        if norm2.len() != alpha.len() + 2 || norm2.iter().any(|&n| !(n > 0.0)) {
            return Err(BasisError::InvalidRecurrence);
        }
        let sqrt_norm2: Vec<f64> = norm2.iter().map(|&n| n.sqrt()).collect();
        let orth_map = build_orth_map(&alpha, &norm2, &sqrt_norm2);
        let n_basis = alpha.len() + usize::from(intercept);
        Ok(Self {
            alpha,
            norm2,
            sqrt_norm2,
            raw: false,
            intercept,
            n_basis,
            orth_map,
            lower_limit: 0.0,
        })
    }

    /// Fits recurrence coefficients to sample points (the moment recurrence
    /// behind R's `poly`) and returns the basis together with its evaluation
    /// matrix at those points. Columns beyond the intercept have unit norm
    /// and are mutually orthogonal over the sample.
    pub fn from_data(
        x: ArrayView1<'_, f64>,
        degree: usize,
        intercept: bool,
    ) -> Result<(Self, Array2<f64>), BasisError> {
        let n = x.len();
        if n <= degree {
            return Err(BasisError::DegenerateSample {
                degree,
                detail: format!("need more than {degree} sample points, got {n}"),
            });
        }

        let mut alpha = Vec::with_capacity(degree);
        let mut norm2 = vec![1.0, n as f64];
        let mut table = Array2::<f64>::zeros((n, degree + 1));
        let mut p_prev = vec![0.0; n];
        let mut p_curr = vec![1.0; n];
        for i in 0..n {
            table[[i, 0]] = 1.0;
        }

        for j in 0..degree {
            let nj = norm2[j + 1];
            let a = x
                .iter()
                .zip(p_curr.iter())
                .map(|(&xi, &p)| xi * p * p)
                .sum::<f64>()
                / nj;
            let beta = nj / norm2[j];
            let mut n_next = 0.0;
            let mut scale = 0.0;
            let mut p_next = vec![0.0; n];
            for i in 0..n {
                let lead = (x[i] - a) * p_curr[i];
                let value = lead - beta * p_prev[i];
                scale += lead * lead;
                n_next += value * value;
                p_next[i] = value;
                table[[i, j + 1]] = value;
            }
            if !n_next.is_finite() || n_next <= scale * 1e-20 {
                return Err(BasisError::DegenerateSample {
                    degree,
                    detail: format!("sample does not support degree {}", j + 1),
                });
            }
            alpha.push(a);
            norm2.push(n_next);
            p_prev = p_curr;
            p_curr = p_next;
        }

        let offset = usize::from(intercept);
        let mut matrix = Array2::<f64>::zeros((n, degree + offset));
        if intercept {
            for i in 0..n {
                matrix[[i, 0]] = 1.0;
            }
        }
        for j in 1..=degree {
            let scale = norm2[j + 1].sqrt();
            for i in 0..n {
                matrix[[i, offset + j - 1]] = table[[i, j]] / scale;
            }
        }

        let basis = Self::orthogonal(alpha, norm2, intercept)?;
        Ok((basis, matrix))
    }

    pub fn lower_limit(&self) -> f64 {
        self.lower_limit
    }

    /// Sets the lower bound used by antiderivative evaluation. Exclusive
    /// access makes the single-writer-then-many-readers discipline explicit;
    /// clone the basis per worker when different limits are needed
    /// concurrently.
    pub fn set_lower_limit(&mut self, limit: f64) {
        self.lower_limit = limit;
    }

    /// Evaluates monomials (or their derivative / antiderivative) into `out`.
    /// With `inter` the powers start at `x^0`, otherwise at `x^1`.
    fn eval_raw<T: Scalar>(&self, out: &mut [T], x: T, inter: bool, deriv: i32) {
        let n = out.len();
        if n == 0 {
            return;
        }
        if deriv == 0 {
            if inter {
                out[0] = T::one();
                for c in 1..n {
                    out[c] = out[c - 1] * x;
                }
            } else {
                let mut value = T::one();
                for slot in out.iter_mut() {
                    value *= x;
                    *slot = value;
                }
            }
        } else if deriv < 0 {
            // u-fold primitive of x^m is x^(m+u) * m! / (m+u)!; the output is
            // the primitive at x minus the primitive at the lower limit.
            let u = (-deriv) as usize;
            let lower = T::from_f64(self.lower_limit);
            let m0 = usize::from(!inter);
            let mut upper_term = T::one();
            let mut lower_term = T::one();
            for i in 1..=u {
                let inv = T::from_f64(1.0 / i as f64);
                upper_term = upper_term * x * inv;
                lower_term = lower_term * lower * inv;
            }
            for i in 1..=m0 {
                let f = T::from_f64(i as f64 / (u + i) as f64);
                upper_term = upper_term * x * f;
                lower_term = lower_term * lower * f;
            }
            let mut m = m0;
            for slot in out.iter_mut() {
                *slot = upper_term - lower_term;
                let f = T::from_f64((m + 1) as f64 / (m + u + 1) as f64);
                upper_term = upper_term * x * f;
                lower_term = lower_term * lower * f;
                m += 1;
            }
        } else {
            let u = deriv as usize;
            let m0 = usize::from(!inter);
            let mut power = T::one();
            for c in 0..n {
                let m = m0 + c;
                if m < u {
                    out[c] = T::zero();
                    continue;
                }
                let mut falling = 1.0;
                for k in 0..u {
                    falling *= (m - k) as f64;
                }
                out[c] = T::from_f64(falling) * power;
                power *= x;
            }
        }
    }
}

impl BasisExpansion for OrthPolyBasis {
    fn n_basis(&self) -> usize {
        self.n_basis
    }

    fn n_scratch(&self) -> usize {
        if self.intercept {
            self.n_basis
        } else {
            self.n_basis + 1
        }
    }

    fn evaluate<T: Scalar>(
        &self,
        out: &mut [T],
        scratch: &mut [T],
        x: T,
        deriv: i32,
    ) -> Result<(), BasisError> {
        debug_assert_eq!(out.len(), self.n_basis);
        if self.raw {
            self.eval_raw(out, x, self.intercept, deriv);
            return Ok(());
        }

        let d = self.alpha.len();
        let offset = usize::from(self.intercept);
        if deriv == 0 {
            if self.intercept && !out.is_empty() {
                out[0] = T::one();
            }
            if d > 0 {
                out[offset] = x - T::from_f64(self.alpha[0]);
                let mut old = T::one();
                for c in 1..d {
                    out[c + offset] = (x - T::from_f64(self.alpha[c])) * out[c - 1 + offset]
                        - T::from_f64(self.norm2[c + 1] / self.norm2[c]) * old;
                    old = out[c - 1 + offset];
                }
                for j in 1..=d {
                    out[j - 1 + offset] /= T::from_f64(self.sqrt_norm2[j + 1]);
                }
            }
            return Ok(());
        }

        // Monomial derivative / antiderivative mapped back into the
        // orthogonalized coordinates.
        let (mono, _) = scratch.split_at_mut(d + 1);
        self.eval_raw(mono, x, true, deriv);

        let mut g = usize::from(!self.intercept);
        for slot in out.iter_mut() {
            *slot = mono[0] * T::from_f64(self.orth_map[g]);
            g += 1;
        }
        for j in 0..d {
            for i in j..d {
                out[i + offset] += mono[j + 1] * T::from_f64(self.orth_map[g]);
                g += 1;
            }
        }
        Ok(())
    }
}

/// Runs the recurrence symbolically on monomial coefficient vectors and packs
/// the normalized coefficients triangularly: first the constant-term
/// coefficient of every basis function, then for each power `p ≥ 1` the
/// coefficients of the basis functions of degree `p` and above.
fn build_orth_map(alpha: &[f64], norm2: &[f64], sqrt_norm2: &[f64]) -> Vec<f64> {
    let d = alpha.len();
    let mut polys: Vec<Vec<f64>> = Vec::with_capacity(d + 1);
    polys.push(vec![1.0]);
    if d > 0 {
        polys.push(vec![-alpha[0], 1.0]);
        for c in 1..d {
            let beta = norm2[c + 1] / norm2[c];
            let mut next = vec![0.0; c + 2];
            for (j, &coef) in polys[c].iter().enumerate() {
                next[j + 1] += coef;
                next[j] -= alpha[c] * coef;
            }
            for (j, &coef) in polys[c - 1].iter().enumerate() {
                next[j] -= beta * coef;
            }
            polys.push(next);
        }
    }

    let mut map = Vec::with_capacity((d + 1) * (d + 2) / 2);
    map.push(1.0);
    for i in 1..=d {
        map.push(polys[i][0] / sqrt_norm2[i + 1]);
    }
    for p in 1..=d {
        for i in p..=d {
            map.push(polys[i][p] / sqrt_norm2[i + 1]);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn eval(basis: &OrthPolyBasis, x: f64, deriv: i32) -> Vec<f64> {
        let mut out = vec![0.0; basis.n_basis()];
        let mut scratch = vec![0.0; basis.n_scratch()];
        basis
            .evaluate(&mut out, &mut scratch, x, deriv)
            .expect("evaluation should succeed");
        out
    }

    #[test]
    fn raw_degree_two_without_intercept_returns_the_plain_powers() {
        let basis = OrthPolyBasis::raw(2, false);
        let values = eval(&basis, 2.0, 0);
        assert_eq!(values.len(), 2);
        assert_abs_diff_eq!(values[0], 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(values[1], 4.0, epsilon = 1e-14);
    }

    #[test]
    fn raw_with_intercept_starts_at_one() {
        let basis = OrthPolyBasis::raw(3, true);
        let values = eval(&basis, 1.5, 0);
        let expected = [1.0, 1.5, 2.25, 3.375];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(v, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn raw_first_derivative_follows_the_power_rule() {
        let basis = OrthPolyBasis::raw(3, true);
        let values = eval(&basis, 2.0, 1);
        // d/dx of 1, x, x^2, x^3 at 2.
        let expected = [0.0, 1.0, 4.0, 12.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(v, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn raw_second_derivative_without_intercept() {
        let basis = OrthPolyBasis::raw(3, false);
        let values = eval(&basis, 2.0, 2);
        // d2/dx2 of x, x^2, x^3 at 2.
        let expected = [0.0, 2.0, 12.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(v, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn raw_antiderivative_is_the_definite_integral_from_the_lower_limit() {
        let mut basis = OrthPolyBasis::raw(2, true);
        basis.set_lower_limit(1.0);
        let values = eval(&basis, 3.0, -1);
        // Integrals of 1, x, x^2 over [1, 3].
        let expected = [2.0, 4.0, 26.0 / 3.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(v, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn raw_antiderivative_without_intercept() {
        let mut basis = OrthPolyBasis::raw(2, false);
        basis.set_lower_limit(0.0);
        let values = eval(&basis, 2.0, -1);
        // Integrals of x, x^2 over [0, 2].
        let expected = [2.0, 8.0 / 3.0];
        for (v, e) in values.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(v, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn fitted_basis_reproduces_its_evaluation_matrix() {
        let x = array![-2.0, -1.0, -0.5, 0.0, 0.5, 1.0, 2.0, 3.0];
        let (basis, matrix) =
            OrthPolyBasis::from_data(x.view(), 3, false).expect("sample is non-degenerate");
        for (i, &xi) in x.iter().enumerate() {
            let values = eval(&basis, xi, 0);
            for (j, &v) in values.iter().enumerate() {
                assert_abs_diff_eq!(v, matrix[[i, j]], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn fitted_columns_are_orthonormal_over_the_sample() {
        let x = array![-1.5, -1.0, -0.25, 0.0, 0.3, 0.8, 1.1, 1.9, 2.4];
        let (_, matrix) =
            OrthPolyBasis::from_data(x.view(), 3, false).expect("sample is non-degenerate");
        let gram = matrix.t().dot(&matrix);
        for i in 0..gram.nrows() {
            for j in 0..gram.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn orthogonalized_derivative_matches_central_differences() {
        let x = array![-2.0, -1.2, -0.7, 0.0, 0.4, 1.0, 1.6, 2.2];
        let (basis, _) =
            OrthPolyBasis::from_data(x.view(), 3, true).expect("sample is non-degenerate");
        let h = 1e-6;
        for &xi in &[-0.9, 0.2, 1.3] {
            let up = eval(&basis, xi + h, 0);
            let down = eval(&basis, xi - h, 0);
            let analytic = eval(&basis, xi, 1);
            for j in 0..basis.n_basis() {
                let numeric = (up[j] - down[j]) / (2.0 * h);
                assert_abs_diff_eq!(numeric, analytic[j], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn orthogonalized_antiderivative_differentiates_back_to_the_value() {
        let x = array![-2.0, -1.2, -0.7, 0.0, 0.4, 1.0, 1.6, 2.2];
        let (mut basis, _) =
            OrthPolyBasis::from_data(x.view(), 3, true).expect("sample is non-degenerate");
        basis.set_lower_limit(-1.0);
        let h = 1e-6;
        for &b in &[-0.5, 0.6, 1.8] {
            let up = eval(&basis, b + h, -1);
            let down = eval(&basis, b - h, -1);
            let value = eval(&basis, b, 0);
            for j in 0..basis.n_basis() {
                let numeric = (up[j] - down[j]) / (2.0 * h);
                assert_abs_diff_eq!(numeric, value[j], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn too_few_sample_points_fail_construction() {
        let x = array![0.0, 1.0];
        assert!(matches!(
            OrthPolyBasis::from_data(x.view(), 3, false).unwrap_err(),
            BasisError::DegenerateSample { .. }
        ));
    }

    #[test]
    fn coincident_sample_points_fail_construction() {
        let x = array![1.0, 1.0, 1.0, 1.0, 1.0];
        assert!(matches!(
            OrthPolyBasis::from_data(x.view(), 2, false).unwrap_err(),
            BasisError::DegenerateSample { .. }
        ));
    }

    #[test]
    fn mismatched_recurrence_lengths_are_rejected() {
        assert!(matches!(
            OrthPolyBasis::orthogonal(vec![0.0, 0.0], vec![1.0, 4.0], false).unwrap_err(),
            BasisError::InvalidRecurrence
        ));
    }
}
