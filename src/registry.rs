//! Method registry and dispatch.
//!
//! Optimization methods are identified by name. The [`Registry`] maps each
//! name to a [`MethodRecord`]: the driver to run plus the capability flags
//! that the dispatch layer consults before running it. The process-wide
//! instance behind [`registry`] is populated exactly once, either with the
//! [built-in catalog](Registry::builtin) on first use or with a custom table
//! passed to [`install`] beforehand, and is read-only afterwards, so lookups
//! take no lock.
//!
//! The built-in catalog:
//!
//! | Name            | Driver    | Subproblem | Hessian |
//! |-----------------|-----------|------------|---------|
//! | `lsq-exact`     | [`lsqtr`] | exact      | --      |
//! | `dogleg`        | [`fmintr`]| dogleg     | exact   |
//! | `subspace`      | [`fmintr`]| subspace   | exact   |
//! | `dogleg-bfgs`   | [`fmintr`]| dogleg     | BFGS    |
//! | `subspace-bfgs` | [`fmintr`]| subspace   | BFGS    |
//! | `sgd`           | [`sgd`]   | --         | --      |
//!
//! [`optimize`] and [`optimize_scalar`] are the entry points that tie
//! everything together: they resolve the method, validate its capabilities
//! against the problem, reduce linearly constrained problems to unconstrained
//! ones and expand the result back.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;
use nalgebra::{Dyn, OVector};
use thiserror::Error;

use crate::algo::{fmintr, lsqtr, sgd, HessianSpec};
use crate::constraint::{
    ConstraintError, ConstraintReduction, LinearConstraint, ReducedObjective, ReducedResiduals,
};
use crate::core::{LeastSquares, Objective, OptimizeConfig, OptimizeResult};
use crate::subproblem::Subproblem;

/// Identifies the driver loop run for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// Least squares trust region loop ([`lsqtr`]) with the exact
    /// subproblem.
    LeastSquares,
    /// Scalar trust region loop ([`fmintr`]) with the given subproblem.
    Scalar(Subproblem),
    /// Gradient descent loop ([`sgd`]).
    GradientDescent,
}

/// Driver and capability flags of one registered method.
///
/// The registry itself performs no validation beyond lookup; the flags are
/// consulted by the dispatch layer (and can be by callers) to check
/// method/problem compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRecord {
    /// Driver loop to run.
    pub driver: Driver,
    /// Model Hessian strategy for scalar drivers.
    pub hessian: HessianSpec,
    /// Whether the method minimizes a scalar objective, as opposed to
    /// requiring a residual vector.
    pub scalar: bool,
    /// Whether the method accepts linear equality constraints.
    pub equality_constraints: bool,
    /// Whether the method accepts inequality constraints.
    pub inequality_constraints: bool,
    /// Whether the method is stochastic.
    pub stochastic: bool,
}

/// Error of resolving a method name that is not registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown optimization method `{0}`")]
pub struct UnknownMethodError(pub String);

/// Table of optimization methods.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    methods: HashMap<String, MethodRecord>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry populated with the built-in method catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            &["lsq-exact"],
            MethodRecord {
                driver: Driver::LeastSquares,
                hessian: HessianSpec::None,
                scalar: false,
                equality_constraints: true,
                inequality_constraints: false,
                stochastic: false,
            },
        );
        registry.register(
            &["dogleg"],
            MethodRecord {
                driver: Driver::Scalar(Subproblem::Dogleg),
                hessian: HessianSpec::Exact,
                scalar: true,
                equality_constraints: true,
                inequality_constraints: false,
                stochastic: false,
            },
        );
        registry.register(
            &["subspace"],
            MethodRecord {
                driver: Driver::Scalar(Subproblem::Subspace),
                hessian: HessianSpec::Exact,
                scalar: true,
                equality_constraints: true,
                inequality_constraints: false,
                stochastic: false,
            },
        );
        registry.register(
            &["dogleg-bfgs"],
            MethodRecord {
                driver: Driver::Scalar(Subproblem::Dogleg),
                hessian: HessianSpec::Bfgs,
                scalar: true,
                equality_constraints: true,
                inequality_constraints: false,
                stochastic: false,
            },
        );
        registry.register(
            &["subspace-bfgs"],
            MethodRecord {
                driver: Driver::Scalar(Subproblem::Subspace),
                hessian: HessianSpec::Bfgs,
                scalar: true,
                equality_constraints: true,
                inequality_constraints: false,
                stochastic: false,
            },
        );
        registry.register(
            &["sgd"],
            MethodRecord {
                driver: Driver::GradientDescent,
                hessian: HessianSpec::None,
                scalar: true,
                equality_constraints: false,
                inequality_constraints: false,
                stochastic: true,
            },
        );

        registry
    }

    /// Registers a method under one or more names.
    ///
    /// An existing entry with the same name is replaced.
    pub fn register(&mut self, names: &[&str], record: MethodRecord) {
        for name in names {
            self.methods.insert((*name).to_owned(), record);
        }
    }

    /// Resolves a method name.
    pub fn resolve(&self, name: &str) -> Result<&MethodRecord, UnknownMethodError> {
        self.methods
            .get(name)
            .ok_or_else(|| UnknownMethodError(name.to_owned()))
    }

    /// Names of all registered methods, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Installs a custom registry as the process-wide instance.
///
/// Must be called before the first use of [`registry`]; once the instance is
/// initialized it never changes. Returns the rejected registry when called
/// too late.
pub fn install(registry: Registry) -> Result<(), Registry> {
    REGISTRY.set(registry)
}

/// The process-wide registry, initialized with the built-in catalog on first
/// use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::builtin)
}

/// Error raised at the entry of [`optimize`] or [`optimize_scalar`].
///
/// These are the only fatal conditions; everything that happens inside a
/// driver is reported through the termination of the returned result.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// The method name is not present in the registry.
    #[error(transparent)]
    UnknownMethod(#[from] UnknownMethodError),
    /// Building the constraint reduction failed.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    /// The capabilities of the method do not match the problem.
    #[error("method `{method}` does not support {reason}")]
    Unsupported {
        /// The offending method name.
        method: String,
        /// What the problem requires.
        reason: &'static str,
    },
}

/// Minimizes the cost `0.5 * || f(x) ||^2` of a residual objective with the
/// named method.
///
/// The method name is resolved against the process-wide [`registry`]; scalar
/// methods see the problem through its scalar view. When a constraint is
/// given, the starting point is projected onto the feasible affine subspace,
/// the drivers run in the reduced coordinates and the returned iterate is
/// expanded back to the full space.
pub fn optimize<F: LeastSquares>(
    f: &F,
    method: &str,
    x0: OVector<F::Field, Dyn>,
    constraint: Option<&LinearConstraint<F::Field>>,
    config: &OptimizeConfig<F::Field>,
    callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> Result<OptimizeResult<F::Field>, OptimizeError> {
    let record = *registry().resolve(method)?;
    if constraint.is_some() && !record.equality_constraints {
        return Err(OptimizeError::Unsupported {
            method: method.to_owned(),
            reason: "equality constraints",
        });
    }

    debug!("dispatching method `{}`", method);

    match constraint {
        Some(constraint) => {
            let reduction = ConstraintReduction::new(constraint)?;
            let y0 = reduction.reduce(&x0);
            let reduced = ReducedResiduals::new(f, &reduction);
            let mut result = run_least_squares(&reduced, &record, y0, config, callback);
            result.x = reduction.expand(&result.x);
            Ok(result)
        }
        None => Ok(run_least_squares(f, &record, x0, config, callback)),
    }
}

fn run_least_squares<F: LeastSquares>(
    f: &F,
    record: &MethodRecord,
    x0: OVector<F::Field, Dyn>,
    config: &OptimizeConfig<F::Field>,
    callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> OptimizeResult<F::Field> {
    match record.driver {
        Driver::LeastSquares => lsqtr(f, x0, config, callback),
        Driver::Scalar(subproblem) => fmintr(f, x0, subproblem, record.hessian, config, callback),
        Driver::GradientDescent => sgd(f, x0, config, callback),
    }
}

/// Minimizes a scalar objective with the named method.
///
/// Methods that require a residual vector (such as `lsq-exact`) are rejected
/// with [`OptimizeError::Unsupported`]. Constraints are handled as in
/// [`optimize`].
pub fn optimize_scalar<F: Objective>(
    f: &F,
    method: &str,
    x0: OVector<F::Field, Dyn>,
    constraint: Option<&LinearConstraint<F::Field>>,
    config: &OptimizeConfig<F::Field>,
    callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> Result<OptimizeResult<F::Field>, OptimizeError> {
    let record = *registry().resolve(method)?;
    if !record.scalar || matches!(record.driver, Driver::LeastSquares) {
        return Err(OptimizeError::Unsupported {
            method: method.to_owned(),
            reason: "objectives without a residual vector",
        });
    }
    if constraint.is_some() && !record.equality_constraints {
        return Err(OptimizeError::Unsupported {
            method: method.to_owned(),
            reason: "equality constraints",
        });
    }

    debug!("dispatching method `{}`", method);

    match constraint {
        Some(constraint) => {
            let reduction = ConstraintReduction::new(constraint)?;
            let y0 = reduction.reduce(&x0);
            let reduced = ReducedObjective::new(f, &reduction);
            let mut result = run_scalar(&reduced, &record, y0, config, callback);
            result.x = reduction.expand(&result.x);
            Ok(result)
        }
        None => Ok(run_scalar(f, &record, x0, config, callback)),
    }
}

fn run_scalar<F: Objective>(
    f: &F,
    record: &MethodRecord,
    x0: OVector<F::Field, Dyn>,
    config: &OptimizeConfig<F::Field>,
    callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> OptimizeResult<F::Field> {
    match record.driver {
        Driver::Scalar(subproblem) => fmintr(f, x0, subproblem, record.hessian, config, callback),
        _ => sgd(f, x0, config, callback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    use crate::testing::{ExtendedRosenbrock, Paraboloid, Sphere};

    #[test]
    fn builtin_names_resolve() {
        let registry = Registry::builtin();

        for name in ["lsq-exact", "dogleg", "subspace", "dogleg-bfgs", "subspace-bfgs", "sgd"] {
            assert!(registry.resolve(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn unknown_method_fails() {
        let registry = Registry::builtin();
        let error = registry.resolve("simplex").unwrap_err();

        assert_eq!(error, UnknownMethodError("simplex".to_owned()));
    }

    #[test]
    fn registered_record_is_returned_unchanged() {
        let mut registry = Registry::builtin();
        let record = MethodRecord {
            driver: Driver::Scalar(Subproblem::Dogleg),
            hessian: HessianSpec::Bfgs,
            scalar: true,
            equality_constraints: false,
            inequality_constraints: false,
            stochastic: false,
        };
        registry.register(&["foo"], record);

        assert_eq!(registry.resolve("foo"), Ok(&record));
    }

    #[test]
    fn least_squares_method_rejects_scalar_objective() {
        let f = Paraboloid::new(dvector![1.0, 2.0]);
        let result = optimize_scalar(
            &f,
            "lsq-exact",
            dvector![0.0, 0.0],
            None,
            &OptimizeConfig::default(),
            None,
        );

        assert!(matches!(result, Err(OptimizeError::Unsupported { .. })));
    }

    #[test]
    fn sgd_rejects_constraints() {
        let f = Sphere::new(2);
        let constraint = LinearConstraint::new(dmatrix![1.0, 1.0], dvector![1.0]);
        let result = optimize(
            &f,
            "sgd",
            dvector![0.0, 0.0],
            Some(&constraint),
            &OptimizeConfig::default(),
            None,
        );

        assert!(matches!(result, Err(OptimizeError::Unsupported { .. })));
    }

    #[test]
    fn unconstrained_rosenbrock_end_to_end() {
        let f = ExtendedRosenbrock::new(2);
        let result = optimize(
            &f,
            "lsq-exact",
            dvector![-1.2, 1.0],
            None,
            &OptimizeConfig::default(),
            None,
        )
        .unwrap();

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-6);
    }

    #[test]
    fn constrained_minimum_norm_end_to_end() {
        // min || x ||^2 subject to x1 + x2 = 1.
        let f = Sphere::new(2);
        let constraint = LinearConstraint::new(dmatrix![1.0, 1.0], dvector![1.0]);
        let result = optimize(
            &f,
            "lsq-exact",
            dvector![0.0, 0.0],
            Some(&constraint),
            &OptimizeConfig::default(),
            None,
        )
        .unwrap();

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![0.5, 0.5], epsilon = 1e-8);
    }

    #[test]
    fn constrained_scalar_end_to_end() {
        let f = Paraboloid::new(dvector![0.0, 0.0]);
        let constraint = LinearConstraint::new(dmatrix![1.0, 1.0], dvector![1.0]);
        let result = optimize_scalar(
            &f,
            "dogleg",
            dvector![3.0, -1.0],
            Some(&constraint),
            &OptimizeConfig::default(),
            None,
        )
        .unwrap();

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![0.5, 0.5], epsilon = 1e-6);
    }

    #[test]
    fn scalar_method_on_least_squares_problem() {
        let f = ExtendedRosenbrock::new(2);
        let result = optimize(
            &f,
            "subspace",
            dvector![-1.2, 1.0],
            None,
            &OptimizeConfig::default(),
            None,
        )
        .unwrap();

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-4);
    }

    #[test]
    fn paraboloid_from_origin_end_to_end() {
        let f = Paraboloid::new(dvector![1.0, 2.0]);
        let result = optimize_scalar(
            &f,
            "dogleg",
            dvector![0.0, 0.0],
            None,
            &OptimizeConfig::default(),
            None,
        )
        .unwrap();

        assert!(result.success());
        assert!(result.optimality < 1e-6);
        assert_abs_diff_eq!(result.x, dvector![1.0, 2.0], epsilon = 1e-6);
    }
}
