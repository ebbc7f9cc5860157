//! Runs every basis through the generic scalar path with a forward-mode dual
//! number and checks that the propagated derivative slot matches the analytic
//! derivative evaluation.

use joint_bases::{
    BSplineBasis, Basis, BasisExpansion, ISplineBasis, MSplineBasis, NaturalSplineBasis,
    OrthPolyBasis, Scalar, SplineBasis,
};
use ndarray::array;
use num_traits::{One, Zero};
use std::cmp::Ordering;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Minimal forward-mode dual number: `re` is the primal value, `eps` the
/// derivative with respect to the seeded input. Comparisons use the primal
/// value only so branch selection matches the `f64` path.
#[derive(Clone, Copy, Debug)]
struct Dual {
    re: f64,
    eps: f64,
}

impl Dual {
    fn variable(value: f64) -> Self {
        Self { re: value, eps: 1.0 }
    }

    fn constant(value: f64) -> Self {
        Self { re: value, eps: 0.0 }
    }
}

impl PartialEq for Dual {
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl PartialOrd for Dual {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self {
            re: self.re / rhs.re,
            eps: (self.eps * rhs.re - self.re * rhs.eps) / (rhs.re * rhs.re),
        }
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl AddAssign for Dual {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Dual {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Dual {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Dual {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Scalar for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }
}

/// Evaluates with the dual type and checks both slots against the plain
/// `f64` value and first-derivative evaluations.
fn assert_dual_matches(basis: &Basis, x: f64, tol: f64) {
    let n = basis.n_basis();
    let mut value = vec![0.0; n];
    let mut slope = vec![0.0; n];
    let mut scratch = vec![0.0; basis.n_scratch()];
    basis
        .evaluate(&mut value, &mut scratch, x, 0)
        .expect("value evaluation");
    basis
        .evaluate(&mut slope, &mut scratch, x, 1)
        .expect("derivative evaluation");

    let mut dual_out = vec![Dual::zero(); n];
    let mut dual_scratch = vec![Dual::zero(); basis.n_scratch()];
    basis
        .evaluate(&mut dual_out, &mut dual_scratch, Dual::variable(x), 0)
        .expect("dual evaluation");

    for i in 0..n {
        assert!(
            (dual_out[i].re - value[i]).abs() <= tol,
            "primal mismatch at x={x}, entry {i}: {} vs {}",
            dual_out[i].re,
            value[i]
        );
        assert!(
            (dual_out[i].eps - slope[i]).abs() <= tol,
            "derivative mismatch at x={x}, entry {i}: {} vs {}",
            dual_out[i].eps,
            slope[i]
        );
    }
}

#[test]
fn dual_derivatives_match_the_analytic_path_for_the_spline_core() {
    let basis: Basis = SplineBasis::new(
        array![0.0, 0.0, 0.0, 0.0, 0.3, 0.7, 1.0, 1.0, 1.0, 1.0],
        4,
    )
    .expect("valid")
    .into();
    for &x in &[0.1, 0.3, 0.55, 0.95] {
        assert_dual_matches(&basis, x, 1e-11);
    }
}

#[test]
fn dual_derivatives_match_inside_and_beyond_the_boundaries() {
    let basis: Basis = BSplineBasis::new((0.0, 1.0), array![0.4, 0.7], true, 4)
        .expect("valid")
        .into();
    for &x in &[0.2, 0.65, -0.8, 1.9] {
        assert_dual_matches(&basis, x, 1e-10);
    }
}

#[test]
fn dual_derivatives_match_for_the_natural_spline() {
    let basis: Basis = NaturalSplineBasis::new((0.0, 1.0), array![0.5], false, 4)
        .expect("valid")
        .into();
    for &x in &[0.15, 0.5, -1.2, 2.3] {
        assert_dual_matches(&basis, x, 1e-10);
    }
}

#[test]
fn dual_derivatives_match_for_the_monotone_family() {
    let ispline: Basis = ISplineBasis::new((0.0, 1.0), array![0.4, 0.7], true, 4)
        .expect("valid")
        .into();
    let mspline: Basis = MSplineBasis::new((0.0, 1.0), array![0.4, 0.7], true, 4)
        .expect("valid")
        .into();
    for &x in &[0.1, 0.45, 0.85] {
        assert_dual_matches(&ispline, x, 1e-10);
        assert_dual_matches(&mspline, x, 1e-10);
    }
}

#[test]
fn dual_derivatives_match_for_polynomials() {
    let raw: Basis = OrthPolyBasis::raw(3, true).into();
    let sample = array![-1.8, -1.0, -0.4, 0.0, 0.5, 1.1, 1.7, 2.5];
    let (fitted, _) = OrthPolyBasis::from_data(sample.view(), 3, false).expect("non-degenerate");
    let fitted: Basis = fitted.into();
    for &x in &[-1.5, 0.3, 2.0] {
        assert_dual_matches(&raw, x, 1e-10);
        assert_dual_matches(&fitted, x, 1e-9);
    }
}

#[test]
fn dual_antiderivative_slope_recovers_the_value() {
    let mut poly = OrthPolyBasis::raw(2, true);
    poly.set_lower_limit(-0.5);
    let basis: Basis = poly.into();
    let x = 1.25;

    let n = basis.n_basis();
    let mut value = vec![0.0; n];
    let mut scratch = vec![0.0; basis.n_scratch()];
    basis
        .evaluate(&mut value, &mut scratch, x, 0)
        .expect("value evaluation");

    // d/dx of the definite integral from the lower limit to x is the value.
    let mut dual_out = vec![Dual::zero(); n];
    let mut dual_scratch = vec![Dual::zero(); basis.n_scratch()];
    basis
        .evaluate(&mut dual_out, &mut dual_scratch, Dual::variable(x), -1)
        .expect("antiderivative evaluation");
    for i in 0..n {
        assert!(
            (dual_out[i].eps - value[i]).abs() <= 1e-12,
            "entry {i}: {} vs {}",
            dual_out[i].eps,
            value[i]
        );
    }
}
