//! Least squares trust region driver.
//!
//! Minimizes the cost `0.5 * || f(x) ||^2` of a residual objective with a
//! Gauss-Newton model and the [exact](crate::subproblem::trust_region_step_exact)
//! trust region subproblem. The Levenberg-Marquardt parameter found by the
//! secular equation is carried between iterations (rescaled with the trust
//! region radius) as a warm start, and an optional geodesic acceleration
//! correction can be enabled through
//! [`ga_tr_ratio`](crate::TrustRegionOptions::ga_tr_ratio).

use log::{debug, info, warn};
use nalgebra::{convert, ComplexField, DimName, Dyn, OMatrix, OVector, RealField as _, U1};

use crate::core::{
    check_termination, EvalCounters, LeastSquares, OptimizeConfig, OptimizeResult, RealField,
    Termination, Verbosity, XScale,
};
use crate::subproblem::{
    cauchy_step_least_squares, evaluate_gauss_newton, trust_region_step_exact, update_tr_radius,
};

use super::{compute_jac_scale, inf_norm};

/// Minimizes `0.5 * || f(x) ||^2` with a trust region Gauss-Newton iteration.
///
/// The callback, when given, is invoked once per accepted iterate; returning
/// `true` stops the run with [`Termination::Callback`].
///
/// # Panics
///
/// Panics if the initial point does not match the problem dimension.
pub fn lsqtr<F: LeastSquares>(
    f: &F,
    x0: OVector<F::Field, Dyn>,
    config: &OptimizeConfig<F::Field>,
    mut callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> OptimizeResult<F::Field> {
    let n = f.dim();
    let m = f.residual_dim();
    assert_eq!(x0.len(), n, "initial point has invalid dimension");

    let zero: F::Field = convert(0.0);
    let one: F::Field = convert(1.0);
    let half: F::Field = convert(0.5);

    let budget = config.tolerances.budget(n);
    let tr = &config.trust_region;

    let mut counters = EvalCounters::default();
    let mut x = x0;
    let mut fx = OVector::zeros_generic(Dyn(m), U1::name());
    f.eval(&x, &mut fx);
    counters.nfev += 1;
    let mut cost = fx.norm_squared() * half;

    let mut jac = OMatrix::zeros_generic(Dyn(m), Dyn(n));
    f.jacobian(&x, &mut jac);
    counters.njev += 1;
    let mut g = jac.tr_mul(&fx);

    let (mut scale, mut scale_inv, auto_scale) = match &config.x_scale {
        XScale::Unit => (
            OVector::from_element_generic(Dyn(n), U1::name(), one),
            OVector::from_element_generic(Dyn(n), U1::name(), one),
            false,
        ),
        XScale::Fixed(s) => {
            assert_eq!(s.len(), n, "scale vector has invalid dimension");
            (s.clone(), s.map(|v| one / v), false)
        }
        XScale::Auto => {
            let (scale, scale_inv) = compute_jac_scale(&jac, None);
            (scale, scale_inv, true)
        }
    };

    let mut radius = tr
        .initial_trust_radius()
        .unwrap_or_else(|| x.component_mul(&scale_inv).norm());
    if radius == zero {
        radius = one;
    }
    let max_radius = tr.max_trust_radius().unwrap_or(radius * tr.max_trust_ratio());
    let min_radius = tr.min_trust_radius();
    radius = radius.min(max_radius);

    let mut x_norm = x.norm();
    let mut iteration = 0;
    // Levenberg-Marquardt parameter carried between iterations.
    let mut alpha: Option<F::Field> = None;

    if config.verbosity >= Verbosity::Iterations {
        info!(
            "{:>5} {:>6} {:>16} {:>16} {:>16}",
            "iter", "nfev", "cost", "step", "optimality"
        );
    }

    let termination = 'outer: loop {
        let g_norm = inf_norm(&g);
        if g_norm < budget.gtol {
            break 'outer Termination::Gtol;
        }
        if iteration >= budget.maxiter {
            break 'outer Termination::MaxIter;
        }

        // Scaled Gauss-Newton model.
        let mut jac_h = jac.clone();
        for (j, mut col) in jac_h.column_iter_mut().enumerate() {
            col *= scale[j];
        }
        let g_h = g.component_mul(&scale);

        let factors = jac_h
            .clone()
            .try_svd(true, true, F::Field::EPSILON, 0)
            .and_then(|svd| match (svd.u, svd.v_t) {
                (Some(u), Some(v_t)) => Some((u, svd.singular_values, v_t.transpose())),
                _ => None,
            });
        let uf = factors.as_ref().map(|(u, _, _)| u.tr_mul(&fx));

        let mut pending: Option<Termination> = None;
        let mut accepted = None;
        let mut rejections = 0;
        let mut last_step_norm = zero;

        // Attempt steps with the current model until one reduces the cost or
        // a stopping condition fires.
        loop {
            let (mut step_h, hits_boundary) = match (&factors, &uf) {
                (Some((_, s, v)), Some(uf)) => {
                    match trust_region_step_exact(uf, s, v, m, radius, alpha) {
                        Ok((step, hits, new_alpha)) => {
                            alpha = Some(new_alpha);
                            (step, hits)
                        }
                        Err(failure) => {
                            debug!("exact subproblem failed ({}), taking the gradient step", failure);
                            let fallback = cauchy_step_least_squares(&jac_h, &g_h, radius);
                            (fallback.step, fallback.hits_boundary)
                        }
                    }
                }
                _ => {
                    debug!("SVD of the Jacobian did not converge, taking the gradient step");
                    let fallback = cauchy_step_least_squares(&jac_h, &g_h, radius);
                    (fallback.step, fallback.hits_boundary)
                }
            };
            let step_h_norm = step_h.norm();

            // Optional geodesic acceleration: correct the step with the
            // curvature of the residual along it, estimated by one extra
            // evaluation.
            if tr.ga_tr_ratio() > zero {
                if let (Some((u, s, v)), true) = (&factors, counters.nfev < budget.max_nfev) {
                    let h = tr.ga_fd_step();
                    let probe = &x + step_h.component_mul(&scale) * h;
                    let mut f_probe = OVector::zeros_generic(Dyn(m), U1::name());
                    f.eval(&probe, &mut f_probe);
                    counters.nfev += 1;

                    let df = (f_probe - &fx) / h;
                    let rhs = (df - &jac_h * &step_h) * (convert::<f64, F::Field>(2.0) / h);
                    let uf_rhs = u.tr_mul(&rhs);
                    if let Ok((ga_step, _, _)) = trust_region_step_exact(
                        &uf_rhs,
                        s,
                        v,
                        m,
                        tr.ga_tr_ratio() * step_h_norm,
                        alpha,
                    ) {
                        step_h += ga_step;
                    }
                }
            }

            let predicted_reduction = -evaluate_gauss_newton(&jac_h, &g_h, &step_h);

            let step = step_h.component_mul(&scale);
            let step_norm = step.norm();
            last_step_norm = step_norm;
            let x_trial = &x + &step;

            let mut fx_trial = OVector::zeros_generic(Dyn(m), U1::name());
            f.eval(&x_trial, &mut fx_trial);
            counters.nfev += 1;

            let is_trial_valid = fx_trial.iter().all(|v| v.is_finite());
            let cost_trial = if is_trial_valid {
                fx_trial.norm_squared() * half
            } else {
                zero
            };
            let actual_reduction = if is_trial_valid {
                cost - cost_trial
            } else {
                debug!("trial residuals are not finite, rejecting the step");
                -F::Field::INFINITY
            };

            let radius_old = radius;
            let (new_radius, ratio) = update_tr_radius(
                radius,
                actual_reduction,
                predicted_reduction,
                step_h_norm,
                hits_boundary,
                max_radius,
                min_radius,
                tr.increase_threshold(),
                tr.increase_ratio(),
                tr.decrease_threshold(),
                tr.decrease_ratio(),
            );
            radius = new_radius;
            alpha = alpha.map(|a| a * radius_old / radius);

            let stop = check_termination(
                actual_reduction,
                cost,
                step_norm,
                x_norm,
                ratio,
                iteration,
                counters,
                &budget,
            );

            if actual_reduction > zero {
                accepted = Some((x_trial, fx_trial, cost_trial));
                pending = stop;
                break;
            }
            if let Some(termination) = stop {
                pending = Some(termination);
                break;
            }

            rejections += 1;
            debug!(
                "step rejected (gain ratio = {}), radius shrunk to {}",
                ratio, radius
            );
            if rejections >= tr.rejections_limit() {
                pending = Some(Termination::Stalled);
                break;
            }
        }

        if let Some((x_trial, fx_trial, cost_trial)) = accepted {
            x = x_trial;
            fx = fx_trial;
            cost = cost_trial;

            if pending.is_none() {
                if counters.njev >= budget.max_njev {
                    pending = Some(Termination::MaxJev);
                } else {
                    f.jacobian(&x, &mut jac);
                    counters.njev += 1;
                    g = jac.tr_mul(&fx);
                    x_norm = x.norm();

                    if auto_scale {
                        let (new_scale, new_scale_inv) = compute_jac_scale(&jac, Some(&scale_inv));
                        scale = new_scale;
                        scale_inv = new_scale_inv;
                    }

                    if let Some(callback) = callback.as_mut() {
                        if callback(x.as_slice()) {
                            pending = Some(Termination::Callback);
                        }
                    }
                }
            }
        }

        iteration += 1;

        if config.verbosity >= Verbosity::Iterations {
            info!(
                "{:>5} {:>6} {:>16} {:>16} {:>16}",
                iteration,
                counters.nfev,
                cost,
                last_step_norm,
                inf_norm(&g)
            );
        }

        if let Some(termination) = pending {
            break 'outer termination;
        }
    };

    let result = OptimizeResult {
        x,
        cost,
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
            "cost = {}, iterations = {}, residual evaluations = {}, Jacobian evaluations = {}",
            result.cost, result.iterations, result.counters.nfev, result.counters.njev
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use crate::testing::{ExtendedRosenbrock, LinearResidual, Sphere};

    #[test]
    fn linear_residual_converges_in_one_iteration() {
        // Gauss-Newton is exact for linear residuals.
        let f = LinearResidual::new(dvector![1.0, 2.0]);
        let result = lsqtr(&f, dvector![4.0, 4.0], &OptimizeConfig::default(), None);

        assert!(result.success());
        assert_eq!(result.termination, Termination::Gtol);
        assert_eq!(result.iterations, 1);
        assert_abs_diff_eq!(result.x, dvector![1.0, 2.0], epsilon = 1e-8);
    }

    #[test]
    fn sphere() {
        let f = Sphere::new(4);
        let result = lsqtr(&f, dvector![10.0, -10.0, 3.0, 7.0], &OptimizeConfig::default(), None);

        assert!(result.success());
        assert!(result.cost < 1e-8);
    }

    #[test]
    fn rosenbrock() {
        let f = ExtendedRosenbrock::new(2);
        let result = lsqtr(&f, dvector![-1.2, 1.0], &OptimizeConfig::default(), None);

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-6);
    }

    #[test]
    fn rosenbrock_with_auto_scale() {
        let f = ExtendedRosenbrock::new(2);
        let config = OptimizeConfig {
            x_scale: XScale::Auto,
            ..OptimizeConfig::default()
        };
        let result = lsqtr(&f, dvector![-1.2, 1.0], &config, None);

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-6);
    }

    #[test]
    fn rosenbrock_with_geodesic_acceleration() {
        let f = ExtendedRosenbrock::new(2);
        let mut config = OptimizeConfig::default();
        config.trust_region.set_ga_tr_ratio(0.1);
        let result = lsqtr(&f, dvector![-1.2, 1.0], &config, None);

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-6);
    }

    #[test]
    fn iteration_budget_is_reported_as_failure() {
        let f = ExtendedRosenbrock::new(2);
        let mut config = OptimizeConfig::default();
        config.tolerances.set_maxiter(Some(2));
        let result = lsqtr(&f, dvector![-1.2, 1.0], &config, None);

        assert!(!result.success());
        assert_eq!(result.termination, Termination::MaxIter);
    }

    #[test]
    fn evaluation_budget_is_respected() {
        let f = ExtendedRosenbrock::new(2);
        let mut config = OptimizeConfig::default();
        config.tolerances.set_max_nfev(Some(3));
        let result = lsqtr(&f, dvector![-1.2, 1.0], &config, None);

        assert!(!result.success());
        assert_eq!(result.termination, Termination::MaxFev);
        assert!(result.counters.nfev <= 4);
    }

    #[test]
    fn callback_stops_the_run() {
        let f = ExtendedRosenbrock::new(2);
        let mut calls = 0;
        let mut callback = |_: &[f64]| {
            calls += 1;
            true
        };
        let result = lsqtr(
            &f,
            dvector![-1.2, 1.0],
            &OptimizeConfig::default(),
            Some(&mut callback),
        );

        assert!(!result.success());
        assert_eq!(result.termination, Termination::Callback);
        assert_eq!(calls, 1);
    }
}
