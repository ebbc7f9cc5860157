//! Basis-expansion kernel for joint survival/longitudinal models.
//!
//! The crate provides a family of function bases — polynomial B-splines,
//! boundary-extrapolated and natural splines, monotone (integrated) and
//! density spline transforms, and raw/orthogonalized polynomials — behind one
//! evaluation contract: report an output dimension and a scratch requirement
//! once, then evaluate values, derivatives, or antiderivatives at scalar
//! points into caller-owned buffers, allocation-free and reentrant.
//!
//! Evaluation is generic over [`Scalar`], so the same code path serves plain
//! `f64` and a differentiable numeric type supplied by the caller.

pub mod basis;
pub mod bspline;
pub mod linalg;
pub mod monotone;
pub mod natural;
pub mod poly;
pub mod scalar;
pub mod spline;

pub use basis::{Basis, BasisError, BasisExpansion, BasisSet, BasisSpec, DEFAULT_ORDER};
pub use bspline::BSplineBasis;
pub use monotone::{ISplineBasis, MSplineBasis};
pub use natural::NaturalSplineBasis;
pub use poly::OrthPolyBasis;
pub use scalar::Scalar;
pub use spline::SplineBasis;
