//! Minimal ndarray/faer bridge for the one factorization this crate performs:
//! the orthonormal null-space basis behind the natural-spline boundary
//! constraint.

use faer::diag::{Diag, DiagRef};
use faer::dyn_stack::{MemBuffer, MemStack};
use faer::linalg::svd::{self, ComputeSvdVectors};
use faer::{Mat, MatRef, get_global_parallelism};
use ndarray::{Array1, Array2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("singular value decomposition failed to converge")]
    NoConvergence,
}

fn array_to_mat(array: &Array2<f64>) -> Mat<f64> {
    let (rows, cols) = array.dim();
    Mat::from_fn(rows, cols, |i, j| array[[i, j]])
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let col = diag.column_vector().as_mat();
    let mut out = Array1::<f64>::zeros(col.nrows());
    for i in 0..col.nrows() {
        out[i] = col[(i, 0)];
    }
    out
}

fn transpose_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((mat.ncols(), mat.nrows()));
    for j in 0..mat.nrows() {
        for i in 0..mat.ncols() {
            out[[i, j]] = mat[(j, i)];
        }
    }
    out
}

/// Factorizes a wide constraint matrix (`c × p`, `c ≤ p`) and returns its
/// singular values together with the full `p × p` matrix of transposed right
/// singular vectors.
///
/// The rows of the returned matrix are orthonormal; the first `c` rows span
/// the constraint row space and the remaining `p − c` rows span its null
/// space.
pub(crate) fn constraint_factorization(
    constraints: &Array2<f64>,
) -> Result<(Array1<f64>, Array2<f64>), LinalgError> {
    let mat = array_to_mat(constraints);
    let (rows, cols) = (mat.nrows(), mat.ncols());

    let mut singular = Diag::<f64>::zeros(rows.min(cols));
    let mut v_storage = Mat::<f64>::zeros(cols, cols);

    let par = get_global_parallelism();
    let mut mem = MemBuffer::new(svd::svd_scratch::<f64>(
        rows,
        cols,
        ComputeSvdVectors::No,
        ComputeSvdVectors::Full,
        par,
        Default::default(),
    ));
    let stack = MemStack::new(&mut mem);

    svd::svd(
        mat.as_ref(),
        singular.as_mut(),
        None,
        Some(v_storage.as_mut()),
        par,
        stack,
        Default::default(),
    )
    .map_err(|_| LinalgError::NoConvergence)?;

    Ok((
        diag_to_array(singular.as_ref()),
        transpose_to_array(v_storage.as_ref()),
    ))
}
