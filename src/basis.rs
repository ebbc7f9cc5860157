//! Shared contract for every basis expansion in the crate.
//!
//! Concrete bases implement [`BasisExpansion`]; downstream model code holds
//! them behind the closed [`Basis`] enum so heterogeneous collections stay
//! uniform without open-ended dispatch. Evaluation writes into caller-owned
//! buffers: ask each basis for [`BasisExpansion::n_scratch`] once, allocate
//! per worker, and reuse the buffer across calls.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rayon::prelude::ParallelSlice;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bspline::BSplineBasis;
use crate::monotone::{ISplineBasis, MSplineBasis};
use crate::natural::NaturalSplineBasis;
use crate::poly::OrthPolyBasis;
use crate::scalar::Scalar;
use crate::spline::SplineBasis;

/// Default spline order (degree + 1), i.e. cubic splines.
pub const DEFAULT_ORDER: usize = 4;

/// A comprehensive error type for all operations within the basis family.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error("derivative order {deriv} is not implemented by the {basis} basis")]
    UnsupportedDerivative { deriv: i32, basis: &'static str },

    #[error("spline order must be at least 1")]
    InvalidOrder,

    #[error("boundary knots must satisfy lower < upper and be finite, got ({0}, {1})")]
    InvalidBoundaryKnots(f64, f64),

    #[error("interior knot {0} lies outside the open boundary interval ({1}, {2})")]
    InteriorKnotOutOfRange(f64, f64, f64),

    #[error("the provided knot vector is invalid: {0}")]
    InvalidKnotVector(String),

    #[error(
        "the boundary constraint factorization is rank deficient; the spline \
         order and knots cannot support natural boundary conditions"
    )]
    RankDeficient,

    #[error(
        "orthogonal polynomial recurrence is invalid: norm2 must hold exactly \
         two more entries than alpha, all strictly positive"
    )]
    InvalidRecurrence,

    #[error("sample is too degenerate for a degree-{degree} orthogonal polynomial: {detail}")]
    DegenerateSample { degree: usize, detail: String },

    #[error("linear algebra backend failure: {0}")]
    Linalg(#[from] crate::linalg::LinalgError),
}

/// Chunk size for the parallel batch evaluation; one scratch allocation per
/// chunk.
const BATCH_CHUNK: usize = 256;

/// Capability shared by every basis expansion.
///
/// Evaluation is pure and reentrant: many threads may evaluate the same
/// instance concurrently as long as each brings its own scratch buffer.
pub trait BasisExpansion: Clone + Send + Sync {
    /// Number of basis functions written per evaluation.
    fn n_basis(&self) -> usize;

    /// Scratch slots required per evaluation call; fixed per instance and
    /// independent of the evaluation point.
    fn n_scratch(&self) -> usize;

    /// Writes the basis values (or the `deriv`-th derivative, or the
    /// antiderivative for negative `deriv` where supported) at `x` into
    /// `out`, using `scratch` purely as workspace.
    fn evaluate<T: Scalar>(
        &self,
        out: &mut [T],
        scratch: &mut [T],
        x: T,
        deriv: i32,
    ) -> Result<(), BasisError>;

    /// Evaluates the basis over a sequence of points into an
    /// `xs.len() × n_basis` matrix, optionally subtracting the basis value at
    /// a reference point from every row (skipped when a derivative is
    /// requested). Rows are filled in parallel chunks, one scratch buffer per
    /// chunk.
    fn design_matrix(
        &self,
        xs: &[f64],
        deriv: i32,
        center: Option<f64>,
    ) -> Result<Array2<f64>, BasisError> {
        let nb = self.n_basis();
        let centering = match center {
            Some(reference) if deriv <= 0 => {
                let mut scratch = vec![0.0; self.n_scratch()];
                let mut row = vec![0.0; nb];
                self.evaluate(&mut row, &mut scratch, reference, 0)?;
                Some(row)
            }
            _ => None,
        };

        let mut out = Array2::<f64>::zeros((xs.len(), nb));
        out.axis_chunks_iter_mut(Axis(0), BATCH_CHUNK)
            .into_par_iter()
            .zip(xs.par_chunks(BATCH_CHUNK))
            .try_for_each(|(mut block, points)| {
                let mut scratch = vec![0.0; self.n_scratch()];
                let mut row = vec![0.0; nb];
                for (mut out_row, &x) in block.axis_iter_mut(Axis(0)).zip(points.iter()) {
                    self.evaluate(&mut row, &mut scratch, x, deriv)?;
                    match &centering {
                        Some(reference) => {
                            for ((slot, &value), &base) in
                                out_row.iter_mut().zip(row.iter()).zip(reference.iter())
                            {
                                *slot = value - base;
                            }
                        }
                        None => {
                            for (slot, &value) in out_row.iter_mut().zip(row.iter()) {
                                *slot = value;
                            }
                        }
                    }
                }
                Ok::<(), BasisError>(())
            })?;
        Ok(out)
    }
}

/// The closed set of concrete basis kinds.
///
/// Construction decides the variant once; collections store this enum and
/// dispatch through it, keeping iteration uniform over heterogeneous bases.
#[derive(Clone, Debug)]
pub enum Basis {
    Spline(SplineBasis),
    BSpline(BSplineBasis),
    NaturalSpline(NaturalSplineBasis),
    ISpline(ISplineBasis),
    MSpline(MSplineBasis),
    OrthPoly(OrthPolyBasis),
}

impl Basis {
    /// Sets the lower integration limit used by antiderivative evaluation.
    ///
    /// Only the orthogonal polynomial basis evaluates antiderivatives; on the
    /// spline variants (which reject `deriv < 0`) this is a no-op.
    pub fn set_lower_limit(&mut self, limit: f64) {
        if let Basis::OrthPoly(poly) = self {
            poly.set_lower_limit(limit);
        }
    }
}

impl BasisExpansion for Basis {
    fn n_basis(&self) -> usize {
        match self {
            Basis::Spline(b) => b.n_basis(),
            Basis::BSpline(b) => b.n_basis(),
            Basis::NaturalSpline(b) => b.n_basis(),
            Basis::ISpline(b) => b.n_basis(),
            Basis::MSpline(b) => b.n_basis(),
            Basis::OrthPoly(b) => b.n_basis(),
        }
    }

    fn n_scratch(&self) -> usize {
        match self {
            Basis::Spline(b) => b.n_scratch(),
            Basis::BSpline(b) => b.n_scratch(),
            Basis::NaturalSpline(b) => b.n_scratch(),
            Basis::ISpline(b) => b.n_scratch(),
            Basis::MSpline(b) => b.n_scratch(),
            Basis::OrthPoly(b) => b.n_scratch(),
        }
    }

    fn evaluate<T: Scalar>(
        &self,
        out: &mut [T],
        scratch: &mut [T],
        x: T,
        deriv: i32,
    ) -> Result<(), BasisError> {
        match self {
            Basis::Spline(b) => b.evaluate(out, scratch, x, deriv),
            Basis::BSpline(b) => b.evaluate(out, scratch, x, deriv),
            Basis::NaturalSpline(b) => b.evaluate(out, scratch, x, deriv),
            Basis::ISpline(b) => b.evaluate(out, scratch, x, deriv),
            Basis::MSpline(b) => b.evaluate(out, scratch, x, deriv),
            Basis::OrthPoly(b) => b.evaluate(out, scratch, x, deriv),
        }
    }
}

impl From<SplineBasis> for Basis {
    fn from(basis: SplineBasis) -> Self {
        Basis::Spline(basis)
    }
}

impl From<BSplineBasis> for Basis {
    fn from(basis: BSplineBasis) -> Self {
        Basis::BSpline(basis)
    }
}

impl From<NaturalSplineBasis> for Basis {
    fn from(basis: NaturalSplineBasis) -> Self {
        Basis::NaturalSpline(basis)
    }
}

impl From<ISplineBasis> for Basis {
    fn from(basis: ISplineBasis) -> Self {
        Basis::ISpline(basis)
    }
}

impl From<MSplineBasis> for Basis {
    fn from(basis: MSplineBasis) -> Self {
        Basis::MSpline(basis)
    }
}

impl From<OrthPolyBasis> for Basis {
    fn from(basis: OrthPolyBasis) -> Self {
        Basis::OrthPoly(basis)
    }
}

/// Ordered, clonable collection of heterogeneous bases.
///
/// Cloning deep-copies every element, so each worker thread can hold an
/// independent set (required when workers need different lower integration
/// limits).
#[derive(Clone, Debug, Default)]
pub struct BasisSet {
    bases: Vec<Basis>,
}

impl BasisSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, basis: impl Into<Basis>) {
        self.bases.push(basis.into());
    }

    /// Total output dimension across all bases.
    pub fn n_basis_total(&self) -> usize {
        self.bases.iter().map(BasisExpansion::n_basis).sum()
    }

    /// Summed scratch requirement, sized so one contiguous allocation can be
    /// split into per-basis scratch regions.
    pub fn n_scratch_total(&self) -> usize {
        self.bases.iter().map(BasisExpansion::n_scratch).sum()
    }
}

impl From<Vec<Basis>> for BasisSet {
    fn from(bases: Vec<Basis>) -> Self {
        Self { bases }
    }
}

impl std::ops::Deref for BasisSet {
    type Target = [Basis];

    fn deref(&self) -> &Self::Target {
        &self.bases
    }
}

impl std::ops::DerefMut for BasisSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bases
    }
}

impl<'a> IntoIterator for &'a BasisSet {
    type Item = &'a Basis;
    type IntoIter = std::slice::Iter<'a, Basis>;

    fn into_iter(self) -> Self::IntoIter {
        self.bases.iter()
    }
}

fn default_order() -> usize {
    DEFAULT_ORDER
}

/// Plain-data description of a basis, suitable for model configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BasisSpec {
    BSpline {
        boundary_knots: (f64, f64),
        #[serde(default)]
        interior_knots: Vec<f64>,
        #[serde(default)]
        intercept: bool,
        #[serde(default = "default_order")]
        order: usize,
    },
    NaturalSpline {
        boundary_knots: (f64, f64),
        #[serde(default)]
        interior_knots: Vec<f64>,
        #[serde(default)]
        intercept: bool,
        #[serde(default = "default_order")]
        order: usize,
    },
    ISpline {
        boundary_knots: (f64, f64),
        #[serde(default)]
        interior_knots: Vec<f64>,
        #[serde(default)]
        intercept: bool,
        #[serde(default = "default_order")]
        order: usize,
    },
    MSpline {
        boundary_knots: (f64, f64),
        #[serde(default)]
        interior_knots: Vec<f64>,
        #[serde(default)]
        intercept: bool,
        #[serde(default = "default_order")]
        order: usize,
    },
    RawPoly {
        degree: usize,
        #[serde(default)]
        intercept: bool,
    },
    OrthPoly {
        alpha: Vec<f64>,
        norm2: Vec<f64>,
        #[serde(default)]
        intercept: bool,
    },
}

impl BasisSpec {
    /// Builds the described basis.
    pub fn build(&self) -> Result<Basis, BasisError> {
        match self {
            BasisSpec::BSpline {
                boundary_knots,
                interior_knots,
                intercept,
                order,
            } => Ok(BSplineBasis::new(
                *boundary_knots,
                interior_knots.clone().into(),
                *intercept,
                *order,
            )?
            .into()),
            BasisSpec::NaturalSpline {
                boundary_knots,
                interior_knots,
                intercept,
                order,
            } => Ok(NaturalSplineBasis::new(
                *boundary_knots,
                interior_knots.clone().into(),
                *intercept,
                *order,
            )?
            .into()),
            BasisSpec::ISpline {
                boundary_knots,
                interior_knots,
                intercept,
                order,
            } => Ok(ISplineBasis::new(
                *boundary_knots,
                interior_knots.clone().into(),
                *intercept,
                *order,
            )?
            .into()),
            BasisSpec::MSpline {
                boundary_knots,
                interior_knots,
                intercept,
                order,
            } => Ok(MSplineBasis::new(
                *boundary_knots,
                interior_knots.clone().into(),
                *intercept,
                *order,
            )?
            .into()),
            BasisSpec::RawPoly { degree, intercept } => {
                Ok(OrthPolyBasis::raw(*degree, *intercept).into())
            }
            BasisSpec::OrthPoly {
                alpha,
                norm2,
                intercept,
            } => Ok(OrthPolyBasis::orthogonal(alpha.clone(), norm2.clone(), *intercept)?.into()),
        }
    }
}
