//! The optimization drivers.
//!
//! Each driver is one outer iteration loop run to completion: it repeatedly
//! evaluates the objective and its derivatives, asks a
//! [subproblem](crate::subproblem) solver for a candidate step and applies
//! the trust region acceptance logic until a stopping criterion fires. The
//! drivers always return a valid [`OptimizeResult`](crate::OptimizeResult);
//! running out of budget is a termination, not an error.
//!
//! * [`lsqtr`] -- least squares trust region loop; recommended default for
//!   residual objectives.
//! * [`fmintr`] -- scalar trust region loop with an exact or BFGS model
//!   Hessian.
//! * [`sgd`] -- plain gradient descent; a fallback for cases where the
//!   second-order methods diverge.

pub mod fmintr;
pub mod lsqtr;
pub mod sgd;

pub use fmintr::{fmintr, HessianSpec};
pub use lsqtr::lsqtr;
pub use sgd::sgd;

use nalgebra::{DimName, Dyn, OMatrix, OVector, U1};
use num_traits::{One, Zero};

use crate::core::RealField;

// Infinity norm used for the first-order optimality measure.
pub(crate) fn inf_norm<T: RealField>(v: &OVector<T, Dyn>) -> T {
    v.iter().fold(T::zero(), |max, value| max.max(value.abs()))
}

// Variable scale from the column norms of the Jacobian. Columns with zero
// norm get unit scale; when a previous scale is given, the new one never
// decreases, which keeps the scaled problem stable across iterations.
pub(crate) fn compute_jac_scale<T: RealField>(
    jac: &OMatrix<T, Dyn, Dyn>,
    prev_scale_inv: Option<&OVector<T, Dyn>>,
) -> (OVector<T, Dyn>, OVector<T, Dyn>) {
    let mut scale_inv = OVector::zeros_generic(Dyn(jac.ncols()), U1::name());
    for (j, col) in jac.column_iter().enumerate() {
        scale_inv[j] = col.norm();
    }

    finish_scale(scale_inv, prev_scale_inv)
}

// Variable scale from the Hessian diagonal, the scalar-objective analogue of
// the Jacobian column norms.
pub(crate) fn compute_hess_scale<T: RealField>(
    hess: &OMatrix<T, Dyn, Dyn>,
    prev_scale_inv: Option<&OVector<T, Dyn>>,
) -> (OVector<T, Dyn>, OVector<T, Dyn>) {
    let mut scale_inv = OVector::zeros_generic(Dyn(hess.ncols()), U1::name());
    for i in 0..hess.ncols() {
        scale_inv[i] = hess[(i, i)].abs().sqrt();
    }

    finish_scale(scale_inv, prev_scale_inv)
}

fn finish_scale<T: RealField>(
    mut scale_inv: OVector<T, Dyn>,
    prev_scale_inv: Option<&OVector<T, Dyn>>,
) -> (OVector<T, Dyn>, OVector<T, Dyn>) {
    match prev_scale_inv {
        None => scale_inv.apply(|v| {
            if *v == T::zero() {
                *v = T::one();
            }
        }),
        Some(prev) => scale_inv = scale_inv.zip_map(prev, |v, p| v.max(p)),
    }

    let scale = scale_inv.map(|v| T::one() / v);
    (scale, scale_inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn jac_scale_from_column_norms() {
        let jac = dmatrix![3.0, 0.0; 4.0, 0.0];
        let (scale, scale_inv) = compute_jac_scale(&jac, None);

        assert_abs_diff_eq!(scale_inv, dvector![5.0, 1.0], epsilon = 1e-12);
        assert_abs_diff_eq!(scale, dvector![0.2, 1.0], epsilon = 1e-12);
    }

    #[test]
    fn jac_scale_never_decreases() {
        let jac = dmatrix![1.0, 0.0; 0.0, 1.0];
        let prev = dvector![5.0, 0.5];
        let (_, scale_inv) = compute_jac_scale(&jac, Some(&prev));

        assert_abs_diff_eq!(scale_inv, dvector![5.0, 1.0], epsilon = 1e-12);
    }
}
