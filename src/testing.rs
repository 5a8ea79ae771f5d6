//! Objectives with hand-supplied analytic derivatives, useful for
//! benchmarking, debugging and smoke testing the drivers.
//!
//! Derivatives are an input of this crate, so every problem here carries its
//! Jacobian, gradient or Hessian in closed form. [`ExtendedRosenbrock`] and
//! [`Sphere`] are recommended for first tests; [`LinearResidual`] is the
//! smallest possible problem with an exact Gauss-Newton step and
//! [`ConvexQuadratic`] the smallest with an exact Newton step.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use nalgebra::{
    storage::{Storage, StorageMut},
    Dyn, IsContiguous, OMatrix, OVector, Vector,
};

use crate::core::{LeastSquares, Objective, Problem};

/// [Extended Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\] in
/// residual form (also known as Rosenbrock's valley or banana function).
///
/// The global minimum is inside a long, narrow, parabolic shaped flat
/// valley. The challenge is to follow the valley.
#[derive(Debug, Clone, Copy)]
pub struct ExtendedRosenbrock {
    n: usize,
}

impl ExtendedRosenbrock {
    /// Initializes the problem with given dimension.
    ///
    /// The dimension **must** be a multiple of 2.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 2 == 0, "n must be a multiple of 2");

        Self { n }
    }
}

impl Problem for ExtendedRosenbrock {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl LeastSquares for ExtendedRosenbrock {
    fn residual_dim(&self) -> usize {
        self.n
    }

    fn eval<Sx, Sfx>(&self, x: &Vector<f64, Dyn, Sx>, fx: &mut Vector<f64, Dyn, Sfx>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
        Sfx: StorageMut<f64, Dyn>,
    {
        for i in 0..self.n / 2 {
            let x1 = x[2 * i];
            let x2 = x[2 * i + 1];

            fx[2 * i] = 10.0 * (x2 - x1 * x1);
            fx[2 * i + 1] = 1.0 - x1;
        }
    }

    fn jacobian<Sx>(&self, x: &Vector<f64, Dyn, Sx>, jac: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        jac.fill(0.0);

        for i in 0..self.n / 2 {
            let x1 = x[2 * i];

            jac[(2 * i, 2 * i)] = -20.0 * x1;
            jac[(2 * i, 2 * i + 1)] = 10.0;
            jac[(2 * i + 1, 2 * i)] = -1.0;
        }
    }
}

/// Sphere function in residual form: the residuals are the variables
/// themselves, with the root and global optimum in the origin.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Initializes the problem with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");

        Self { n }
    }
}

impl Problem for Sphere {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl LeastSquares for Sphere {
    fn residual_dim(&self) -> usize {
        self.n
    }

    fn eval<Sx, Sfx>(&self, x: &Vector<f64, Dyn, Sx>, fx: &mut Vector<f64, Dyn, Sfx>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
        Sfx: StorageMut<f64, Dyn>,
    {
        for i in 0..self.n {
            fx[i] = x[i];
        }
    }

    fn jacobian<Sx>(&self, _x: &Vector<f64, Dyn, Sx>, jac: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        jac.fill_with_identity();
    }
}

/// The residuals `x - c` with an identity Jacobian.
///
/// The Gauss-Newton model is exact for this problem, so the trust region
/// least squares driver converges in a single (interior) step.
#[derive(Debug, Clone)]
pub struct LinearResidual {
    c: OVector<f64, Dyn>,
}

impl LinearResidual {
    /// Initializes the problem with given target point.
    pub fn new(c: OVector<f64, Dyn>) -> Self {
        Self { c }
    }
}

impl Problem for LinearResidual {
    type Field = f64;

    fn dim(&self) -> usize {
        self.c.len()
    }
}

impl LeastSquares for LinearResidual {
    fn residual_dim(&self) -> usize {
        self.c.len()
    }

    fn eval<Sx, Sfx>(&self, x: &Vector<f64, Dyn, Sx>, fx: &mut Vector<f64, Dyn, Sfx>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
        Sfx: StorageMut<f64, Dyn>,
    {
        for i in 0..self.c.len() {
            fx[i] = x[i] - self.c[i];
        }
    }

    fn jacobian<Sx>(&self, _x: &Vector<f64, Dyn, Sx>, jac: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        jac.fill_with_identity();
    }
}

/// Convex quadratic `0.5 x^T H x` with a positive definite `H` and the
/// minimum in the origin.
#[derive(Debug, Clone)]
pub struct ConvexQuadratic {
    hess: OMatrix<f64, Dyn, Dyn>,
}

impl ConvexQuadratic {
    /// Initializes the problem with given positive definite matrix.
    pub fn new(hess: OMatrix<f64, Dyn, Dyn>) -> Self {
        assert_eq!(hess.nrows(), hess.ncols(), "matrix must be square");

        Self { hess }
    }
}

impl Problem for ConvexQuadratic {
    type Field = f64;

    fn dim(&self) -> usize {
        self.hess.nrows()
    }
}

impl Objective for ConvexQuadratic {
    fn value<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        let hx = &self.hess * x;
        0.5 * x.dot(&hx)
    }

    fn gradient<Sx, Sg>(&self, x: &Vector<f64, Dyn, Sx>, g: &mut Vector<f64, Dyn, Sg>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
        Sg: StorageMut<f64, Dyn>,
    {
        self.hess.mul_to(x, g);
    }

    fn hessian<Sx>(&self, _x: &Vector<f64, Dyn, Sx>, hess: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        hess.copy_from(&self.hess);
    }
}

/// Shifted paraboloid `sum (x_i - c_i)^2`, a scalar-only problem with the
/// minimum in `c`.
#[derive(Debug, Clone)]
pub struct Paraboloid {
    center: OVector<f64, Dyn>,
}

impl Paraboloid {
    /// Initializes the problem with given minimum location.
    pub fn new(center: OVector<f64, Dyn>) -> Self {
        Self { center }
    }
}

impl Problem for Paraboloid {
    type Field = f64;

    fn dim(&self) -> usize {
        self.center.len()
    }
}

impl Objective for Paraboloid {
    fn value<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        (0..self.center.len())
            .map(|i| (x[i] - self.center[i]).powi(2))
            .sum()
    }

    fn gradient<Sx, Sg>(&self, x: &Vector<f64, Dyn, Sx>, g: &mut Vector<f64, Dyn, Sg>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
        Sg: StorageMut<f64, Dyn>,
    {
        for i in 0..self.center.len() {
            g[i] = 2.0 * (x[i] - self.center[i]);
        }
    }

    fn hessian<Sx>(&self, _x: &Vector<f64, Dyn, Sx>, hess: &mut OMatrix<f64, Dyn, Dyn>)
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        hess.fill(0.0);
        hess.fill_diagonal(2.0);
    }
}
