//! Gradient descent driver.
//!
//! A single first-order loop without a trust region: `x <- x - eta * g(x)`
//! with a constant or decaying learning rate. There is no descent guarantee
//! and no correction when the objective increases; failure to converge is
//! reported through the termination, not fixed. Intended as a fallback for
//! problems where the second-order methods diverge.

use log::{debug, info, warn};
use nalgebra::{convert, ComplexField, DimName, Dyn, OVector, RealField as _, U1};

use crate::core::{
    EvalCounters, Objective, OptimizeConfig, OptimizeResult, Termination, Verbosity,
};

use super::inf_norm;

/// Minimizes a scalar objective by gradient descent.
///
/// The callback, when given, is invoked once per iteration; returning `true`
/// stops the run with [`Termination::Callback`].
///
/// # Panics
///
/// Panics if the initial point does not match the problem dimension.
pub fn sgd<F: Objective>(
    f: &F,
    x0: OVector<F::Field, Dyn>,
    config: &OptimizeConfig<F::Field>,
    mut callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> OptimizeResult<F::Field> {
    let n = f.dim();
    assert_eq!(x0.len(), n, "initial point has invalid dimension");

    let one: F::Field = convert(1.0);

    let budget = config.tolerances.budget(n);
    let opts = &config.sgd;

    let mut counters = EvalCounters::default();
    let mut x = x0;
    let mut fx = f.value(&x);
    counters.nfev += 1;

    let mut g = OVector::zeros_generic(Dyn(n), U1::name());
    f.gradient(&x, &mut g);
    counters.ngev += 1;

    let mut iteration = 0;

    if config.verbosity >= Verbosity::Iterations {
        info!(
            "{:>5} {:>6} {:>16} {:>16} {:>16}",
            "iter", "ngev", "objective", "step", "optimality"
        );
    }

    let termination = loop {
        let g_norm = inf_norm(&g);
        if g_norm < budget.gtol {
            break Termination::Gtol;
        }
        if iteration >= budget.maxiter {
            break Termination::MaxIter;
        }
        if counters.ngev >= budget.max_ngev {
            break Termination::MaxGev;
        }
        if counters.nfev >= budget.max_nfev {
            break Termination::MaxFev;
        }

        let rate =
            opts.learning_rate() / (one + opts.decay() * convert(iteration as f64));
        let step = &g * (-rate);
        let step_norm = step.norm();
        x += &step;

        let fx_new = f.value(&x);
        counters.nfev += 1;
        if !fx_new.is_finite() {
            debug!("objective value is not finite, stopping");
            break Termination::Stalled;
        }

        let reduction = fx - fx_new;
        if reduction < convert(0.0) {
            debug!("objective increased by {} at iteration {}", -reduction, iteration);
        }

        let ftol_satisfied = reduction.abs() < budget.ftol * fx.abs();
        let xtol_satisfied = step_norm < budget.xtol * (budget.xtol + x.norm());
        fx = fx_new;

        f.gradient(&x, &mut g);
        counters.ngev += 1;

        iteration += 1;

        if config.verbosity >= Verbosity::Iterations {
            info!(
                "{:>5} {:>6} {:>16} {:>16} {:>16}",
                iteration,
                counters.ngev,
                fx,
                step_norm,
                inf_norm(&g)
            );
        }

        if let Some(callback) = callback.as_mut() {
            if callback(x.as_slice()) {
                break Termination::Callback;
            }
        }

        if xtol_satisfied {
            break Termination::Xtol;
        }
        if ftol_satisfied {
            break Termination::Ftol;
        }
    };

    let result = OptimizeResult {
        x,
        cost: fx,
        optimality: inf_norm(&g),
        termination,
        iterations: iteration,
        counters,
    };

    if config.verbosity >= Verbosity::Summary {
        if result.success() {
            info!("{}", result.termination);
        } else {
            warn!("{}", result.termination);
        }
        info!(
            "objective = {}, iterations = {}, gradient evaluations = {}",
            result.cost, result.iterations, result.counters.ngev
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    use crate::testing::ConvexQuadratic;

    #[test]
    fn zero_learning_rate_leaves_x_unchanged() {
        let f = ConvexQuadratic::new(dmatrix![1.0, 0.0; 0.0, 1.0]);
        let mut config = OptimizeConfig::default();
        config.sgd.set_learning_rate(0.0);
        let result = sgd(&f, dvector![3.0, -2.0], &config, None);

        assert_eq!(result.x, dvector![3.0, -2.0]);
    }

    #[test]
    fn quadratic_descends() {
        let f = ConvexQuadratic::new(dmatrix![1.0, 0.0; 0.0, 1.0]);
        let mut config = OptimizeConfig::default();
        config.sgd.set_learning_rate(0.5);
        let result = sgd(&f, dvector![4.0, -4.0], &config, None);

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![0.0, 0.0], epsilon = 1e-3);
    }

    #[test]
    fn iteration_limit_is_reported_as_failure() {
        let f = ConvexQuadratic::new(dmatrix![1.0, 0.0; 0.0, 1.0]);
        let mut config = OptimizeConfig::default();
        config.sgd.set_learning_rate(1e-6);
        config.tolerances.set_maxiter(Some(5));
        config.tolerances.set_ftol(0.0);
        config.tolerances.set_xtol(0.0);
        let result = sgd(&f, dvector![4.0, -4.0], &config, None);

        assert!(!result.success());
        assert_eq!(result.termination, Termination::MaxIter);
        assert_eq!(result.iterations, 5);
    }

    #[test]
    fn decaying_rate_shrinks_steps() {
        let f = ConvexQuadratic::new(dmatrix![1.0, 0.0; 0.0, 1.0]);
        let mut config = OptimizeConfig::default();
        config.sgd.set_learning_rate(0.5);
        config.sgd.set_decay(10.0);
        config.tolerances.set_maxiter(Some(50));
        let result = sgd(&f, dvector![4.0, 0.0], &config, None);

        // With a heavily decayed rate the iterates move, but only slowly.
        assert!(result.x[0] > 0.0 && result.x[0] < 4.0);
    }
}
