#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # Descent
//!
//! A pure Rust implementation of constrained trust region methods for
//! nonlinear least-squares and scalar minimization.
//!
//! This library provides the iterative core used to drive physics and
//! engineering models to numerically optimal solutions: given a residual
//! objective `f(x)` with its Jacobian (or a scalar objective with its
//! gradient and Hessian), the drivers minimize the cost with adaptive trust
//! region step control, which is robust on ill-conditioned, nonlinear,
//! non-convex problems. Linear equality constraints `A x = b` are supported
//! first-class through a null-space reduction, so every method works on the
//! feasible affine subspace without penalty terms or multipliers.
//!
//! Derivatives are *inputs*: the objective supplies them, typically from an
//! automatic differentiation engine or in closed form. This crate never
//! differentiates anything itself.
//!
//! ## Methods
//!
//! Methods are selected by name through the [registry](crate::registry):
//!
//! * `lsq-exact` -- trust region Gauss-Newton with the exact (secular
//!   equation) subproblem. Recommended default for residual objectives.
//! * `dogleg`, `subspace` -- scalar trust region Newton with the dogleg or
//!   the two-dimensional subspace subproblem.
//! * `dogleg-bfgs`, `subspace-bfgs` -- the same loops with a BFGS
//!   quasi-Newton model built from gradients only.
//! * `sgd` -- plain gradient descent, a fallback for problems where the
//!   second-order methods diverge.
//!
//! ## Problem
//!
//! A problem is any type implementing [`LeastSquares`] (residual vector plus
//! Jacobian) or [`Objective`] (scalar value plus gradient and Hessian).
//! Every least squares problem automatically gets a scalar view with the
//! cost `0.5 * || f ||^2` and the Gauss-Newton Hessian, so the scalar
//! methods accept it as well.
//!
//! ```rust
//! use descent::nalgebra as na;
//! use descent::{LeastSquares, Problem};
//! use na::{Dyn, IsContiguous, OMatrix};
//!
//! struct Rosenbrock;
//!
//! impl Problem for Rosenbrock {
//!     type Field = f64;
//!
//!     fn dim(&self) -> usize {
//!         2
//!     }
//! }
//!
//! impl LeastSquares for Rosenbrock {
//!     fn residual_dim(&self) -> usize {
//!         2
//!     }
//!
//!     fn eval<Sx, Sfx>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
//!     ) where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!         Sfx: na::storage::StorageMut<Self::Field, Dyn>,
//!     {
//!         fx[0] = 10.0 * (x[1] - x[0] * x[0]);
//!         fx[1] = 1.0 - x[0];
//!     }
//!
//!     fn jacobian<Sx>(
//!         &self,
//!         x: &na::Vector<Self::Field, Dyn, Sx>,
//!         jac: &mut OMatrix<Self::Field, Dyn, Dyn>,
//!     ) where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         jac[(0, 0)] = -20.0 * x[0];
//!         jac[(0, 1)] = 10.0;
//!         jac[(1, 0)] = -1.0;
//!         jac[(1, 1)] = 0.0;
//!     }
//! }
//! ```
//!
//! ## Optimizing
//!
//! [`optimize`] resolves a method name and runs it to completion. The
//! outcome is always an [`OptimizeResult`]; failing to converge within the
//! iteration or evaluation budgets is a termination with `success == false`,
//! not an error.
//!
//! ```rust
//! # use descent::nalgebra as na;
//! # use descent::{LeastSquares, Problem};
//! # use na::{Dyn, IsContiguous, OMatrix};
//! #
//! # struct Rosenbrock;
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl LeastSquares for Rosenbrock {
//! #     fn residual_dim(&self) -> usize {
//! #         2
//! #     }
//! #
//! #     fn eval<Sx, Sfx>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #         Sfx: na::storage::StorageMut<Self::Field, Dyn>,
//! #     {
//! #         fx[0] = 10.0 * (x[1] - x[0] * x[0]);
//! #         fx[1] = 1.0 - x[0];
//! #     }
//! #
//! #     fn jacobian<Sx>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         jac: &mut OMatrix<Self::Field, Dyn, Dyn>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         jac[(0, 0)] = -20.0 * x[0];
//! #         jac[(0, 1)] = 10.0;
//! #         jac[(1, 0)] = -1.0;
//! #         jac[(1, 1)] = 0.0;
//! #     }
//! # }
//! #
//! use descent::{optimize, OptimizeConfig};
//! use na::dvector;
//!
//! let f = Rosenbrock;
//! let result = optimize(
//!     &f,
//!     "lsq-exact",
//!     dvector![-10.0, -5.0],
//!     None,
//!     &OptimizeConfig::default(),
//!     None,
//! )
//! .expect("method is registered");
//!
//! assert!(result.success());
//! assert!((result.x[0] - 1.0).abs() < 1e-6);
//! assert!((result.x[1] - 1.0).abs() < 1e-6);
//! ```
//!
//! ## Constraints
//!
//! A [`LinearConstraint`] passed to [`optimize`] is factorized once into a
//! particular solution and an orthonormal null-space basis; the driver then
//! iterates in the reduced coordinates and the result is expanded back:
//!
//! ```rust
//! # use descent::nalgebra as na;
//! # use descent::{LeastSquares, Problem};
//! # use na::{Dyn, IsContiguous, OMatrix};
//! #
//! # struct Identity;
//! #
//! # impl Problem for Identity {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl LeastSquares for Identity {
//! #     fn residual_dim(&self) -> usize {
//! #         2
//! #     }
//! #
//! #     fn eval<Sx, Sfx>(
//! #         &self,
//! #         x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         fx: &mut na::Vector<Self::Field, Dyn, Sfx>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #         Sfx: na::storage::StorageMut<Self::Field, Dyn>,
//! #     {
//! #         fx[0] = x[0];
//! #         fx[1] = x[1];
//! #     }
//! #
//! #     fn jacobian<Sx>(
//! #         &self,
//! #         _x: &na::Vector<Self::Field, Dyn, Sx>,
//! #         jac: &mut OMatrix<Self::Field, Dyn, Dyn>,
//! #     ) where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         jac.fill_with_identity();
//! #     }
//! # }
//! #
//! use descent::{optimize, LinearConstraint, OptimizeConfig};
//! use na::{dmatrix, dvector};
//!
//! // min || x ||^2 subject to x1 + x2 = 1.
//! let f = Identity;
//! let constraint = LinearConstraint::new(dmatrix![1.0, 1.0], dvector![1.0]);
//!
//! let result = optimize(
//!     &f,
//!     "lsq-exact",
//!     dvector![0.0, 0.0],
//!     Some(&constraint),
//!     &OptimizeConfig::default(),
//!     None,
//! )
//! .unwrap();
//!
//! assert!((result.x[0] - 0.5).abs() < 1e-8);
//! assert!((result.x[1] - 0.5).abs() < 1e-8);
//! ```
//!
//! ## License
//!
//! Licensed under MIT.

pub mod algo;
pub mod constraint;
mod core;
pub mod registry;
pub mod subproblem;

pub use constraint::{ConstraintError, ConstraintReduction, LinearConstraint};
pub use core::*;
pub use registry::{install, optimize, optimize_scalar, registry, OptimizeError, Registry};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
