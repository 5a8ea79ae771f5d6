use nalgebra::{
    convert,
    storage::{Storage, StorageMut},
    DimName, Dyn, IsContiguous, OMatrix, OVector, Vector, U1,
};

/// Extension of real number types used throughout the crate.
///
/// Adds machine-precision constants that the algorithms need for rank
/// decisions and curvature guards.
pub trait RealField: nalgebra::RealField + Copy {
    /// Machine epsilon.
    const EPSILON: Self;
    /// Square root of machine epsilon. This value is a standard tolerance for
    /// first-order derivative-based concepts.
    const EPSILON_SQRT: Self;
    /// Cubic root of machine epsilon. This value is a standard tolerance for
    /// second-order derivative-based concepts.
    const EPSILON_CBRT: Self;
    /// Positive infinity.
    const INFINITY: Self;
}

impl RealField for f32 {
    const EPSILON: Self = f32::EPSILON;
    const EPSILON_SQRT: Self = 0.00034526698;
    const EPSILON_CBRT: Self = 0.0049215667;
    const INFINITY: Self = f32::INFINITY;
}

impl RealField for f64 {
    const EPSILON: Self = f64::EPSILON;
    const EPSILON_SQRT: Self = 0.000000014901161193847656;
    const EPSILON_CBRT: Self = 0.0000060554544523933395;
    const INFINITY: Self = f64::INFINITY;
}

/// The base trait for [`LeastSquares`] and [`Objective`].
pub trait Problem {
    /// Type of the field, usually f64 or f32.
    type Field: RealField;

    /// Dimension of the variable vector.
    fn dim(&self) -> usize;
}

/// A vector-valued residual objective together with its Jacobian.
///
/// This is the boundary contract with the code that defines the objective:
/// the residuals and the Jacobian are expected to be consistent to machine
/// precision, typically because both come from the same automatic
/// differentiation engine. The drivers never differentiate anything
/// themselves; they treat both methods as opaque, deterministic callables.
///
/// ## Defining a problem
///
/// ```rust
/// use descent::nalgebra as na;
/// use descent::{LeastSquares, Problem};
/// use na::{Dyn, IsContiguous, OMatrix};
///
/// // A problem is represented by a type.
/// struct Shifted {
///     c: Vec<f64>,
/// }
///
/// impl Problem for Shifted {
///     // The numeric type. Usually f64 or f32.
///     type Field = f64;
///
///     fn dim(&self) -> usize {
///         self.c.len()
///     }
/// }
///
/// impl LeastSquares for Shifted {
///     fn residual_dim(&self) -> usize {
///         self.c.len()
///     }
///
///     // Compute the residuals of the trial point.
///     fn eval<Sx, Sfx>(
///         &self,
///         x: &na::Vector<Self::Field, Dyn, Sx>,
///         fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
///     ) where
///         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
///         Sfx: na::storage::StorageMut<Self::Field, Dyn>,
///     {
///         for i in 0..self.c.len() {
///             fx[i] = x[i] - self.c[i];
///         }
///     }
///
///     // The Jacobian matrix, consistent with `eval`.
///     fn jacobian<Sx>(
///         &self,
///         _x: &na::Vector<Self::Field, Dyn, Sx>,
///         jac: &mut OMatrix<Self::Field, Dyn, Dyn>,
///     ) where
///         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
///     {
///         jac.fill_with_identity();
///     }
/// }
/// ```
pub trait LeastSquares: Problem {
    /// Length of the residual vector.
    fn residual_dim(&self) -> usize;

    /// Calculates the residuals of the objective given values of the
    /// variables.
    fn eval<Sx, Sfx>(
        &self,
        x: &Vector<Self::Field, Dyn, Sx>,
        fx: &mut Vector<Self::Field, Dyn, Sfx>,
    ) where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sfx: StorageMut<Self::Field, Dyn>;

    /// Calculates the Jacobian matrix of the residuals given values of the
    /// variables.
    fn jacobian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, jac: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;
}

/// A scalar objective together with its gradient and Hessian.
///
/// As with [`LeastSquares`], the derivatives are inputs supplied by the
/// objective, not something this crate computes.
pub trait Objective: Problem {
    /// Calculates the objective value given values of the variables.
    fn value<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;

    /// Calculates the gradient of the objective given values of the
    /// variables.
    fn gradient<Sx, Sg>(&self, x: &Vector<Self::Field, Dyn, Sx>, g: &mut Vector<Self::Field, Dyn, Sg>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>;

    /// Calculates the symmetric Hessian matrix of the objective given values
    /// of the variables.
    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, hess: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;
}

// Every least squares problem has a scalar view: the cost `0.5 * || f ||^2`
// with gradient `J^T f` and the Gauss-Newton Hessian `J^T J`. The scalar
// drivers accept least squares problems through this impl.
impl<F: LeastSquares> Objective for F {
    fn value<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let mut fx = OVector::zeros_generic(Dyn(self.residual_dim()), U1::name());
        self.eval(x, &mut fx);
        fx.norm_squared() * convert(0.5)
    }

    fn gradient<Sx, Sg>(&self, x: &Vector<Self::Field, Dyn, Sx>, g: &mut Vector<Self::Field, Dyn, Sg>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
        Sg: StorageMut<Self::Field, Dyn>,
    {
        let mut fx = OVector::zeros_generic(Dyn(self.residual_dim()), U1::name());
        let mut jac = OMatrix::zeros_generic(Dyn(self.residual_dim()), Dyn(self.dim()));
        self.eval(x, &mut fx);
        self.jacobian(x, &mut jac);
        jac.tr_mul_to(&fx, g);
    }

    fn hessian<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>, hess: &mut OMatrix<Self::Field, Dyn, Dyn>)
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let mut jac = OMatrix::zeros_generic(Dyn(self.residual_dim()), Dyn(self.dim()));
        self.jacobian(x, &mut jac);
        jac.tr_mul_to(&jac, hess);
    }
}
