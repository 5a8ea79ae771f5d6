//! Scalar trust region driver.
//!
//! Minimizes a scalar objective with a quadratic model built either from the
//! Hessian supplied by the objective or from a BFGS approximation updated
//! with gradients only. The trust region subproblem is solved by the
//! [dogleg](crate::subproblem::dogleg_step) or the two-dimensional
//! [subspace](crate::subproblem::subspace_step) variant.

use log::{debug, info, warn};
use nalgebra::{convert, ComplexField, DimName, Dyn, OMatrix, OVector, RealField as _, U1};
use num_traits::Zero;

use crate::core::{
    check_termination, EvalCounters, Objective, OptimizeConfig, OptimizeResult, RealField,
    Termination, Verbosity, XScale,
};
use crate::subproblem::{cauchy_step, dogleg_step, subspace_step, Subproblem, update_tr_radius};

use super::{compute_hess_scale, inf_norm};

/// Strategy for the model Hessian of a scalar driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HessianSpec {
    /// Hessian supplied by the objective.
    #[default]
    Exact,
    /// BFGS approximation built from gradient differences; the objective's
    /// Hessian is never evaluated.
    Bfgs,
    /// No Hessian is involved. Used by registry records of first-order and
    /// least squares methods; [`fmintr`] treats it as
    /// [`Exact`](HessianSpec::Exact).
    None,
}

/// Minimizes a scalar objective with a trust region (quasi-)Newton iteration.
///
/// The callback, when given, is invoked once per accepted iterate; returning
/// `true` stops the run with [`Termination::Callback`].
///
/// # Panics
///
/// Panics if the initial point does not match the problem dimension.
pub fn fmintr<F: Objective>(
    f: &F,
    x0: OVector<F::Field, Dyn>,
    subproblem: Subproblem,
    hessian: HessianSpec,
    config: &OptimizeConfig<F::Field>,
    mut callback: Option<&mut dyn FnMut(&[F::Field]) -> bool>,
) -> OptimizeResult<F::Field> {
    let n = f.dim();
    assert_eq!(x0.len(), n, "initial point has invalid dimension");

    let zero: F::Field = convert(0.0);
    let one: F::Field = convert(1.0);

    let budget = config.tolerances.budget(n);
    let tr = &config.trust_region;
    let bfgs = matches!(hessian, HessianSpec::Bfgs);

    let mut counters = EvalCounters::default();
    let mut x = x0;
    let mut fx = f.value(&x);
    counters.nfev += 1;

    let mut g = OVector::zeros_generic(Dyn(n), U1::name());
    f.gradient(&x, &mut g);
    counters.ngev += 1;

    let mut hess = OMatrix::identity_generic(Dyn(n), Dyn(n));
    if !bfgs {
        f.hessian(&x, &mut hess);
        counters.nhev += 1;
    }

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
            let (scale, scale_inv) = compute_hess_scale(&hess, None);
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

    if config.verbosity >= Verbosity::Iterations {
        info!(
            "{:>5} {:>6} {:>16} {:>16} {:>16}",
            "iter", "nfev", "objective", "step", "optimality"
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

        // Scaled quadratic model.
        let g_h = g.component_mul(&scale);
        let mut hess_h = hess.clone();
        for j in 0..n {
            for i in 0..n {
                hess_h[(i, j)] *= scale[i] * scale[j];
            }
        }

        let mut pending: Option<Termination> = None;
        let mut accepted = None;
        let mut rejections = 0;
        let mut last_step_norm = zero;

        loop {
            let step_result = match subproblem {
                Subproblem::Dogleg | Subproblem::Exact => dogleg_step(&g_h, &hess_h, radius),
                Subproblem::Subspace => subspace_step(&g_h, &hess_h, radius),
            }
            .unwrap_or_else(|failure| {
                debug!("subproblem solver failed ({}), taking the gradient step", failure);
                cauchy_step(&g_h, &hess_h, radius)
            });

            let step_h_norm = step_result.step.norm();
            let predicted_reduction = step_result.predicted_reduction;

            let step = step_result.step.component_mul(&scale);
            let step_norm = step.norm();
            last_step_norm = step_norm;
            let x_trial = &x + &step;

            let fx_trial = f.value(&x_trial);
            counters.nfev += 1;

            let is_trial_valid = fx_trial.is_finite();
            let actual_reduction = if is_trial_valid {
                fx - fx_trial
            } else {
                debug!("trial value is not finite, rejecting the step");
                -F::Field::INFINITY
            };

            let (new_radius, ratio) = update_tr_radius(
                radius,
                actual_reduction,
                predicted_reduction,
                step_h_norm,
                step_result.hits_boundary,
                max_radius,
                min_radius,
                tr.increase_threshold(),
                tr.increase_ratio(),
                tr.decrease_threshold(),
                tr.decrease_ratio(),
            );
            radius = new_radius;

            let stop = check_termination(
                actual_reduction,
                fx,
                step_norm,
                x_norm,
                ratio,
                iteration,
                counters,
                &budget,
            );

            if actual_reduction > zero {
                accepted = Some((x_trial, fx_trial, step));
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

        if let Some((x_trial, fx_trial, step)) = accepted {
            x = x_trial;
            fx = fx_trial;

            if pending.is_none() {
                if counters.ngev >= budget.max_ngev {
                    pending = Some(Termination::MaxGev);
                } else {
                    let mut g_new = OVector::zeros_generic(Dyn(n), U1::name());
                    f.gradient(&x, &mut g_new);
                    counters.ngev += 1;

                    if bfgs {
                        let y = &g_new - &g;
                        bfgs_update(&mut hess, &step, &y);
                    } else if counters.nhev >= budget.max_nhev {
                        pending = Some(Termination::MaxHev);
                    } else {
                        f.hessian(&x, &mut hess);
                        counters.nhev += 1;
                    }

                    g = g_new;
                    x_norm = x.norm();

                    if auto_scale {
                        let (new_scale, new_scale_inv) = compute_hess_scale(&hess, Some(&scale_inv));
                        scale = new_scale;
                        scale_inv = new_scale_inv;
                    }

                    if pending.is_none() {
                        if let Some(callback) = callback.as_mut() {
                            if callback(x.as_slice()) {
                                pending = Some(Termination::Callback);
                            }
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
                fx,
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
            "objective = {}, iterations = {}, evaluations = {}, gradient evaluations = {}, Hessian evaluations = {}",
            result.cost,
            result.iterations,
            result.counters.nfev,
            result.counters.ngev,
            result.counters.nhev
        );
    }

    result
}

// Standard BFGS update of the model Hessian from the secant pair (s, y). The
// update is skipped when the curvature condition fails within tolerance,
// which preserves positive definiteness of the approximation.
fn bfgs_update<T: RealField>(hess: &mut OMatrix<T, Dyn, Dyn>, s: &OVector<T, Dyn>, y: &OVector<T, Dyn>) {
    let sy = s.dot(y);
    if sy <= T::EPSILON_SQRT * s.norm() * y.norm() {
        debug!("skipping BFGS update (s^T y = {})", sy);
        return;
    }

    let hs = &*hess * s;
    let shs = s.dot(&hs);
    if shs <= T::zero() {
        debug!("skipping BFGS update (s^T B s = {})", shs);
        return;
    }

    *hess += y * y.transpose() / sy;
    *hess -= &hs * hs.transpose() / shs;
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};

    use crate::testing::{ConvexQuadratic, ExtendedRosenbrock, Paraboloid};

    fn methods() -> [(Subproblem, HessianSpec); 4] {
        [
            (Subproblem::Dogleg, HessianSpec::Exact),
            (Subproblem::Subspace, HessianSpec::Exact),
            (Subproblem::Dogleg, HessianSpec::Bfgs),
            (Subproblem::Subspace, HessianSpec::Bfgs),
        ]
    }

    #[test]
    fn convex_quadratic() {
        let f = ConvexQuadratic::new(dmatrix![2.0, 0.5; 0.5, 3.0]);

        for (subproblem, hessian) in methods() {
            let result = fmintr(
                &f,
                dvector![10.0, -7.0],
                subproblem,
                hessian,
                &OptimizeConfig::default(),
                None,
            );

            assert!(result.success(), "{:?}/{:?}", subproblem, hessian);
            assert_abs_diff_eq!(result.x, dvector![0.0, 0.0], epsilon = 1e-4);
        }
    }

    #[test]
    fn paraboloid() {
        let f = Paraboloid::new(dvector![1.0, 2.0]);
        let result = fmintr(
            &f,
            dvector![0.0, 0.0],
            Subproblem::Dogleg,
            HessianSpec::Exact,
            &OptimizeConfig::default(),
            None,
        );

        assert!(result.success());
        assert!(result.optimality < 1e-6);
        assert_abs_diff_eq!(result.x, dvector![1.0, 2.0], epsilon = 1e-6);
    }

    #[test]
    fn rosenbrock_through_scalar_view() {
        // Least squares problems have a scalar view with the Gauss-Newton
        // Hessian, which is exact enough for Rosenbrock.
        let f = ExtendedRosenbrock::new(2);
        let result = fmintr(
            &f,
            dvector![-1.2, 1.0],
            Subproblem::Subspace,
            HessianSpec::Exact,
            &OptimizeConfig::default(),
            None,
        );

        assert!(result.success());
        assert_abs_diff_eq!(result.x, dvector![1.0, 1.0], epsilon = 1e-4);
    }

    #[test]
    fn hessian_budget_is_respected() {
        let f = Paraboloid::new(dvector![1.0, 2.0]);
        let mut config = OptimizeConfig::default();
        config.tolerances.set_max_nhev(Some(1));
        config.tolerances.set_gtol(1e-12);
        let result = fmintr(
            &f,
            dvector![100.0, 100.0],
            Subproblem::Dogleg,
            HessianSpec::Exact,
            &config,
            None,
        );

        assert!(result.counters.nhev <= 1);
    }

    #[test]
    fn bfgs_update_skips_on_negative_curvature() {
        let mut hess = dmatrix![1.0, 0.0; 0.0, 1.0];
        let s = dvector![1.0, 0.0];
        let y = dvector![-1.0, 0.0];

        bfgs_update(&mut hess, &s, &y);

        assert_abs_diff_eq!(hess, dmatrix![1.0, 0.0; 0.0, 1.0], epsilon = 1e-12);
    }

    #[test]
    fn bfgs_update_satisfies_secant_condition() {
        let mut hess = dmatrix![1.0, 0.0; 0.0, 1.0];
        let s = dvector![1.0, 2.0];
        let y = dvector![3.0, 1.0];

        bfgs_update(&mut hess, &s, &y);

        assert_abs_diff_eq!(&hess * s, y, epsilon = 1e-12);
    }
}
