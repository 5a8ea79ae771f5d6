//! Linear equality constraints and their null-space reduction.
//!
//! A constraint `A x = b` with `m < n` independent rows leaves `n - r` free
//! directions, where `r` is the rank of `A`. [`ConstraintReduction`]
//! factorizes the constraint once into a particular solution `x_p` and an
//! orthonormal null-space basis `Z`, so that every feasible point can be
//! written as `x = x_p + Z y`. The drivers then minimize over the reduced
//! variable `y` without ever seeing the constraint; the
//! [`ReducedResiduals`] and [`ReducedObjective`] adapters present a wrapped
//! problem in the reduced coordinates.

use log::debug;
use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    DimName, Dyn, IsContiguous, OMatrix, OVector, Vector, U1,
};
use num_traits::One;
use thiserror::Error;

use crate::core::{LeastSquares, Objective, Problem, RealField};

/// Linear equality constraint `A x = b`.
#[derive(Debug, Clone)]
pub struct LinearConstraint<T: RealField> {
    a: OMatrix<T, Dyn, Dyn>,
    b: OVector<T, Dyn>,
}

impl<T: RealField> LinearConstraint<T> {
    /// Creates the constraint from the matrix and the right-hand side.
    ///
    /// # Panics
    ///
    /// Panics if the right-hand side length does not match the number of rows
    /// or if the matrix does not have fewer rows than columns.
    pub fn new(a: OMatrix<T, Dyn, Dyn>, b: OVector<T, Dyn>) -> Self {
        assert_eq!(
            a.nrows(),
            b.len(),
            "right-hand side length does not match the number of constraint rows"
        );
        assert!(
            a.nrows() < a.ncols(),
            "constraint matrix must have fewer rows than columns"
        );

        Self { a, b }
    }

    /// The constraint matrix.
    pub fn matrix(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.a
    }

    /// The right-hand side.
    pub fn rhs(&self) -> &OVector<T, Dyn> {
        &self.b
    }

    /// Number of variables constrained.
    pub fn dim(&self) -> usize {
        self.a.ncols()
    }
}

/// Error while building a [`ConstraintReduction`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// The right-hand side is not in the range of the constraint matrix, so
    /// no feasible point exists.
    #[error("right-hand side is not in the range of the constraint matrix")]
    Infeasible,
    /// The factorization of the constraint matrix did not converge.
    #[error("factorization of the constraint matrix did not converge")]
    Factorization,
}

/// Reparametrization of a linearly constrained problem into an unconstrained
/// one of lower dimension.
///
/// Invariants maintained by the factorization: `A x_p == b` and `A Z == 0`
/// within numerical tolerance, with the columns of `Z` orthonormal.
/// Redundant constraint rows are absorbed; the reduced dimension reflects the
/// numerical rank of `A`.
#[derive(Debug, Clone)]
pub struct ConstraintReduction<T: RealField> {
    particular: OVector<T, Dyn>,
    basis: OMatrix<T, Dyn, Dyn>,
}

impl<T: RealField> ConstraintReduction<T> {
    /// Factorizes the constraint.
    ///
    /// Fails with [`ConstraintError::Infeasible`] only if `b` is not in the
    /// range of `A` within tolerance.
    pub fn new(constraint: &LinearConstraint<T>) -> Result<Self, ConstraintError> {
        let m = constraint.a.nrows();
        let n = constraint.a.ncols();

        // Pad A with zero rows to a square matrix. The SVD of the square
        // matrix carries the complete right-singular basis, including the
        // null space of A, which a thin decomposition of the wide matrix
        // would not provide.
        let mut padded = OMatrix::zeros_generic(Dyn(n), Dyn(n));
        padded.rows_mut(0, m).copy_from(&constraint.a);

        let mut b_padded = OVector::zeros_generic(Dyn(n), U1::name());
        b_padded.rows_mut(0, m).copy_from(&constraint.b);

        let svd = padded
            .try_svd(true, true, T::EPSILON, 0)
            .ok_or(ConstraintError::Factorization)?;
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => return Err(ConstraintError::Factorization),
        };
        let s = svd.singular_values;

        // Numerical rank. The singular values are sorted in decreasing order.
        let tol = T::EPSILON * convert(n as f64) * s[0];
        let rank = s.iter().take_while(|sv| **sv > tol).count();

        // Minimum-norm particular solution x_p = V S^+ U^T b.
        let utb = u.tr_mul(&b_padded);
        let mut particular = OVector::zeros_generic(Dyn(n), U1::name());
        for i in 0..rank {
            particular.axpy(utb[i] / s[i], &v_t.row(i).transpose(), T::one());
        }

        let residual = &constraint.a * &particular - &constraint.b;
        if residual.norm() > T::EPSILON_SQRT * constraint.b.norm().max(T::one()) {
            return Err(ConstraintError::Infeasible);
        }

        // Null-space basis: the right-singular vectors past the numerical
        // rank.
        let free = n - rank;
        let mut basis = OMatrix::zeros_generic(Dyn(n), Dyn(free));
        for j in 0..free {
            basis.column_mut(j).copy_from(&v_t.row(rank + j).transpose());
        }

        debug!(
            "constraint reduction: {} rows of rank {}, {} free directions",
            m, rank, free
        );

        Ok(Self { particular, basis })
    }

    /// Dimension of the full variable vector.
    pub fn dim(&self) -> usize {
        self.basis.nrows()
    }

    /// Dimension of the reduced variable vector.
    pub fn reduced_dim(&self) -> usize {
        self.basis.ncols()
    }

    /// The particular solution `x_p`.
    pub fn particular(&self) -> &OVector<T, Dyn> {
        &self.particular
    }

    /// The orthonormal null-space basis `Z`.
    pub fn basis(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.basis
    }

    /// Projects an arbitrary point onto the reduced coordinates, in the least
    /// squares sense.
    pub fn reduce<Sx>(&self, x: &Vector<T, Dyn, Sx>) -> OVector<T, Dyn>
    where
        Sx: Storage<T, Dyn>,
    {
        self.basis.tr_mul(&(x - &self.particular))
    }

    /// Maps reduced variables back to the full space.
    pub fn expand<Sy>(&self, y: &Vector<T, Dyn, Sy>) -> OVector<T, Dyn>
    where
        Sy: Storage<T, Dyn>,
    {
        &self.particular + &self.basis * y
    }
}

/// View of a least squares problem in the reduced coordinates of a
/// constraint.
///
/// The Jacobian of the view is `J Z`.
pub struct ReducedResiduals<'a, F: LeastSquares> {
    f: &'a F,
    reduction: &'a ConstraintReduction<F::Field>,
}

impl<'a, F: LeastSquares> ReducedResiduals<'a, F> {
    /// Wraps a problem into the reduced coordinates of the reduction.
    pub fn new(f: &'a F, reduction: &'a ConstraintReduction<F::Field>) -> Self {
        assert_eq!(
            f.dim(),
            reduction.dim(),
            "constraint dimension does not match the problem"
        );
        Self { f, reduction }
    }
}

impl<F: LeastSquares> Problem for ReducedResiduals<'_, F> {
    type Field = F::Field;

    fn dim(&self) -> usize {
        self.reduction.reduced_dim()
    }
}

impl<F: LeastSquares> LeastSquares for ReducedResiduals<'_, F> {
    fn residual_dim(&self) -> usize {
        self.f.residual_dim()
    }

    fn eval<Sx, Sfx>(
        &self,
        y: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>,
    {
        let x = self.reduction.expand(y);
        self.f.eval(&x, fx);
    }

    fn jacobian<Sx>(&self, y: &Vector<Self::Field, Dyn, Sx>, jac: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let x = self.reduction.expand(y);
        let mut full = OMatrix::zeros_generic(Dyn(self.f.residual_dim()), Dyn(self.f.dim()));
        self.f.jacobian(&x, &mut full);
        full.mul_to(&self.reduction.basis, jac);
    }
}

/// View of a scalar problem in the reduced coordinates of a constraint.
///
/// The gradient of the view is `Z^T g` and the Hessian is `Z^T H Z`.
pub struct ReducedObjective<'a, F: Objective> {
    f: &'a F,
    reduction: &'a ConstraintReduction<F::Field>,
}

impl<'a, F: Objective> ReducedObjective<'a, F> {
    /// Wraps a problem into the reduced coordinates of the reduction.
    pub fn new(f: &'a F, reduction: &'a ConstraintReduction<F::Field>) -> Self {
        assert_eq!(
            f.dim(),
            reduction.dim(),
            "constraint dimension does not match the problem"
        );
        Self { f, reduction }
    }
}

impl<F: Objective> Problem for ReducedObjective<'_, F> {
    type Field = F::Field;

    fn dim(&self) -> usize {
        self.reduction.reduced_dim()
    }
}

impl<F: Objective> Objective for ReducedObjective<'_, F> {
    fn value<Sx>(&self, y: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let x = self.reduction.expand(y);
        self.f.value(&x)
    }

    fn gradient<Sx, Sg>(&self, y: &Vector<Self::Field, Dyn, Sx>, g: &mut Vector<Self::Field, Dyn, Sg>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        let x = self.reduction.expand(y);
        let mut full = OVector::zeros_generic(Dyn(self.f.dim()), U1::name());
        self.f.gradient(&x, &mut full);
        self.reduction.basis.tr_mul_to(&full, g);
    }

    fn hessian<Sx>(&self, y: &Vector<Self::Field, Dyn, Sx>, hess: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let x = self.reduction.expand(y);
        let mut full = OMatrix::zeros_generic(Dyn(self.f.dim()), Dyn(self.f.dim()));
        self.f.hessian(&x, &mut full);
        let left = self.reduction.basis.tr_mul(&full);
        left.mul_to(&self.reduction.basis, hess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn roundtrip() {
        let constraint = LinearConstraint::new(dmatrix![1.0, 1.0, 0.0; 0.0, 1.0, -1.0], dvector![1.0, 0.5]);
        let reduction = ConstraintReduction::new(&constraint).unwrap();

        assert_eq!(reduction.reduced_dim(), 1);

        for y in [-3.0, 0.0, 1.0, 7.5] {
            let y = dvector![y];
            let x = reduction.expand(&y);

            assert_abs_diff_eq!(reduction.reduce(&x), y, epsilon = 1e-12);
            assert_abs_diff_eq!(constraint.matrix() * x, dvector![1.0, 0.5], epsilon = 1e-12);
        }
    }

    #[test]
    fn particular_solution_is_feasible() {
        let constraint = LinearConstraint::new(dmatrix![1.0, 1.0], dvector![1.0]);
        let reduction = ConstraintReduction::new(&constraint).unwrap();

        assert_abs_diff_eq!(reduction.particular(), &dvector![0.5, 0.5], epsilon = 1e-12);
    }

    #[test]
    fn redundant_rows_are_absorbed() {
        let single = LinearConstraint::new(dmatrix![1.0, 1.0, 1.0], dvector![3.0]);
        let duplicated =
            LinearConstraint::new(dmatrix![1.0, 1.0, 1.0; 2.0, 2.0, 2.0], dvector![3.0, 6.0]);

        let single = ConstraintReduction::new(&single).unwrap();
        let duplicated = ConstraintReduction::new(&duplicated).unwrap();

        assert_eq!(single.reduced_dim(), 2);
        assert_eq!(duplicated.reduced_dim(), 2);
        assert_abs_diff_eq!(duplicated.particular(), single.particular(), epsilon = 1e-12);
    }

    #[test]
    fn inconsistent_rows_are_infeasible() {
        let constraint =
            LinearConstraint::new(dmatrix![1.0, 1.0, 1.0; 1.0, 1.0, 1.0], dvector![3.0, 4.0]);

        assert!(matches!(
            ConstraintReduction::new(&constraint),
            Err(ConstraintError::Infeasible)
        ));
    }

    #[test]
    fn basis_is_orthonormal() {
        let constraint = LinearConstraint::new(dmatrix![1.0, 2.0, 3.0], dvector![6.0]);
        let reduction = ConstraintReduction::new(&constraint).unwrap();

        let basis = reduction.basis();
        let gram = basis.tr_mul(basis);

        assert_abs_diff_eq!(gram, nalgebra::DMatrix::identity(2, 2), epsilon = 1e-12);
    }
}
