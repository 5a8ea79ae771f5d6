//! Trust region subproblem solvers.
//!
//! Given a local quadratic model of the objective around the current iterate
//! (a gradient with a symmetric, possibly indefinite, Hessian, or a residual
//! vector with its Jacobian in the least squares case), these routines
//! compute a step `p` minimizing the model subject to `|| p || <= radius`.
//!
//! Three variants are implemented. [`trust_region_step_exact`] solves the
//! least squares subproblem to near optimality through the secular equation
//! in the Levenberg-Marquardt parameter; [`dogleg_step`] interpolates between
//! the steepest descent and the Newton step; [`subspace_step`] minimizes the
//! model exactly on the plane spanned by the gradient and the Newton
//! direction, which keeps the robustness of the exact method at a fraction of
//! the cost and also handles indefinite Hessian matrices.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Computing a Trust Region
//! Step](https://epubs.siam.org/doi/10.1137/0904038)
//!
//! \[3\] [Methods for Non-Linear Least Squares
//! Problems](https://api.semanticscholar.org/CorpusID:64217935)

use log::debug;
use nalgebra::{convert, Complex, DimName, Dyn, OMatrix, OVector, U1};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::core::RealField;

/// Selector for the trust region subproblem variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subproblem {
    /// Secular equation solved on the SVD of the Jacobian. The most expensive
    /// variant but the most robust per step; the least squares default.
    Exact,
    /// Piecewise linear interpolation between the steepest descent and the
    /// Newton step. Cheap and adequate for well-conditioned models.
    Dogleg,
    /// Exact minimization restricted to the plane of the gradient and the
    /// Newton direction. More robust than dogleg for near-singular models.
    Subspace,
}

/// Candidate step produced by a subproblem solver.
#[derive(Debug, Clone)]
pub struct StepResult<T: RealField> {
    /// The step vector.
    pub step: OVector<T, Dyn>,
    /// Reduction of the local model value predicted for the step.
    pub predicted_reduction: T,
    /// Whether the step lies on the trust region boundary. Boundary steps
    /// with a good gain ratio let the trust region grow.
    pub hits_boundary: bool,
}

/// Failure of a subproblem solver.
///
/// The drivers recover from these locally with a gradient step scaled to the
/// current radius; the failure is never surfaced to the caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StepSolverFailure {
    /// A factorization of the model matrix failed or did not converge.
    #[error("factorization of the model matrix failed")]
    Factorization,
    /// The computed step contains non-finite values.
    #[error("computed step is not finite")]
    NonFinite,
}

/// Updates the trust region radius from the agreement between the actual and
/// the predicted reduction.
///
/// Returns the new radius, clamped into `[min_radius, max_radius]`, and the
/// gain ratio. The ratio is defined as one when both reductions are exactly
/// zero and as zero when the predicted reduction is not positive.
#[allow(clippy::too_many_arguments)]
pub fn update_tr_radius<T: RealField>(
    radius: T,
    actual_reduction: T,
    predicted_reduction: T,
    step_norm: T,
    hits_boundary: bool,
    max_radius: T,
    min_radius: T,
    increase_threshold: T,
    increase_ratio: T,
    decrease_threshold: T,
    decrease_ratio: T,
) -> (T, T) {
    let zero = T::zero();

    let ratio = if predicted_reduction > zero {
        actual_reduction / predicted_reduction
    } else if predicted_reduction == zero && actual_reduction == zero {
        T::one()
    } else {
        zero
    };

    let mut radius = radius;
    if ratio < decrease_threshold {
        radius = decrease_ratio * step_norm;
    } else if ratio > increase_threshold && hits_boundary {
        radius *= increase_ratio;
    }

    (radius.max(min_radius).min(max_radius), ratio)
}

/// Value of the Gauss-Newton model `0.5 || J p ||^2 + g^T p`.
pub(crate) fn evaluate_gauss_newton<T: RealField>(
    jac: &OMatrix<T, Dyn, Dyn>,
    g: &OVector<T, Dyn>,
    p: &OVector<T, Dyn>,
) -> T {
    let jp = jac * p;
    jp.norm_squared() * convert(0.5) + g.dot(p)
}

/// Value of the quadratic model `0.5 p^T B p + g^T p`.
pub(crate) fn evaluate_quadratic<T: RealField>(
    hess: &OMatrix<T, Dyn, Dyn>,
    g: &OVector<T, Dyn>,
    p: &OVector<T, Dyn>,
) -> T {
    let bp = hess * p;
    p.dot(&bp) * convert(0.5) + g.dot(p)
}

fn zero_step<T: RealField>(dim: usize) -> StepResult<T> {
    StepResult {
        step: OVector::zeros_generic(Dyn(dim), U1::name()),
        predicted_reduction: T::zero(),
        hits_boundary: false,
    }
}

/// Steepest descent minimizing the quadratic model along the gradient,
/// clipped to the trust region boundary (the Cauchy point).
///
/// This is the fallback the drivers use when a more ambitious solver fails;
/// it requires nothing beyond a nonzero gradient.
pub fn cauchy_step<T: RealField>(
    g: &OVector<T, Dyn>,
    hess: &OMatrix<T, Dyn, Dyn>,
    radius: T,
) -> StepResult<T> {
    let g_norm = g.norm();
    if g_norm == T::zero() {
        return zero_step(g.len());
    }

    // tau = min(|| g ||^3 / (radius * g^T B g), 1), taking the full boundary
    // step for nonpositive curvature.
    let bg = hess * g;
    let quad = g.dot(&bg);
    let tau = if quad <= T::zero() {
        T::one()
    } else {
        (g_norm.powi(3) / (radius * quad)).min(T::one())
    };

    let step = g * (-(tau * radius) / g_norm);
    let predicted_reduction = -evaluate_quadratic(hess, g, &step);

    StepResult {
        step,
        predicted_reduction,
        hits_boundary: tau == T::one(),
    }
}

/// The Cauchy point of the Gauss-Newton model, where the curvature along the
/// gradient is `|| J g ||^2`.
pub fn cauchy_step_least_squares<T: RealField>(
    jac: &OMatrix<T, Dyn, Dyn>,
    g: &OVector<T, Dyn>,
    radius: T,
) -> StepResult<T> {
    let g_norm = g.norm();
    if g_norm == T::zero() {
        return zero_step(g.len());
    }

    let jg = jac * g;
    let quad = jg.norm_squared();
    let tau = if quad <= T::zero() {
        T::one()
    } else {
        (g_norm.powi(3) / (radius * quad)).min(T::one())
    };

    let step = g * (-(tau * radius) / g_norm);
    let predicted_reduction = -evaluate_gauss_newton(jac, g, &step);

    StepResult {
        step,
        predicted_reduction,
        hits_boundary: tau == T::one(),
    }
}

/// Dogleg solution of the trust region subproblem.
///
/// Requires a positive definite model matrix for the Newton step; fails with
/// [`StepSolverFailure::Factorization`] otherwise so that the caller can fall
/// back to a gradient step.
pub fn dogleg_step<T: RealField>(
    g: &OVector<T, Dyn>,
    hess: &OMatrix<T, Dyn, Dyn>,
    radius: T,
) -> Result<StepResult<T>, StepSolverFailure> {
    let zero = T::zero();

    let g_norm = g.norm();
    if g_norm == zero {
        // Zero gradient; convergence is declared upstream.
        return Ok(zero_step(g.len()));
    }

    let chol = hess
        .clone()
        .cholesky()
        .ok_or(StepSolverFailure::Factorization)?;
    let newton = chol.solve(&(-g));
    if !newton.iter().all(|v| v.is_finite()) {
        return Err(StepSolverFailure::NonFinite);
    }

    if newton.norm() <= radius {
        // The Newton step is inside the trust region. We can safely take it.
        let predicted_reduction = -evaluate_quadratic(hess, g, &newton);
        debug!("take full Newton: {:?}", newton.as_slice());
        return Ok(StepResult {
            step: newton,
            predicted_reduction,
            hits_boundary: false,
        });
    }

    // The Newton step is outside the trust region. We need to involve the
    // gradient.
    let bg = hess * g;
    let quad = g.dot(&bg);
    if quad <= zero {
        // Nonpositive curvature along the gradient. Take the steepest descent
        // to the trust region boundary.
        let step = g * (-radius / g_norm);
        let predicted_reduction = -evaluate_quadratic(hess, g, &step);
        debug!("take steepest descent to trust-region boundary");
        return Ok(StepResult {
            step,
            predicted_reduction,
            hits_boundary: true,
        });
    }

    let cauchy = g * (-(g_norm * g_norm) / quad);
    let cauchy_norm = cauchy.norm();

    if cauchy_norm >= radius {
        // The Cauchy point is outside the trust region. We take the steepest
        // gradient descent to the trust region boundary.
        let step = g * (-radius / g_norm);
        let predicted_reduction = -evaluate_quadratic(hess, g, &step);
        debug!("take scaled Cauchy to trust-region boundary");
        return Ok(StepResult {
            step,
            predicted_reduction,
            hits_boundary: true,
        });
    }

    // The trust region boundary is crossed by the dogleg path p(alpha) =
    // cauchy + alpha (newton - cauchy). We need to find alpha such that
    // || p || = radius. It is found by solving the quadratic equation
    //
    //     a alpha^2 + 2b alpha + c = 0
    //
    // with a = || newton - cauchy ||^2, b = cauchy^T (newton - cauchy) and
    // c = || cauchy ||^2 - radius^2. Because the Cauchy point is interior, c
    // is negative and the root in (0, 1) can be computed without catastrophic
    // cancellation by working with -c and using Muller's formula for b > 0.
    let diff = &newton - &cauchy;
    let a = diff.norm_squared();
    let b = cauchy.dot(&diff);
    let c_neg = radius * radius - cauchy_norm * cauchy_norm;

    #[allow(clippy::suspicious_operation_groupings)]
    let d = (b * b + a * c_neg).sqrt();
    let alpha = if b <= zero { (-b + d) / a } else { c_neg / (b + d) };

    let step = &cauchy + diff * alpha;
    let predicted_reduction = -evaluate_quadratic(hess, g, &step);
    debug!("take dogleg (factor = {})", alpha);

    Ok(StepResult {
        step,
        predicted_reduction,
        hits_boundary: true,
    })
}

/// Trust region subproblem restricted to the plane spanned by the gradient
/// and the Newton direction.
///
/// The reduced two-dimensional problem is solved exactly: either the interior
/// Newton point of the plane, or the boundary minimizer found through the
/// roots of a quartic. When the model matrix is indefinite the curvature
/// direction `B g` replaces the Newton direction, which implicitly
/// regularizes the step.
pub fn subspace_step<T: RealField>(
    g: &OVector<T, Dyn>,
    hess: &OMatrix<T, Dyn, Dyn>,
    radius: T,
) -> Result<StepResult<T>, StepSolverFailure> {
    let n = g.len();

    let g_norm = g.norm();
    if g_norm == T::zero() {
        return Ok(zero_step(n));
    }

    let s1 = g / g_norm;
    let raw = match hess.clone().cholesky() {
        Some(chol) => chol.solve(&(-g)),
        None => hess * g,
    };
    if !raw.iter().all(|v| v.is_finite()) {
        return Err(StepSolverFailure::NonFinite);
    }

    // Gram-Schmidt against the normalized gradient.
    let mut s2 = &raw - &s1 * s1.dot(&raw);
    let s2_norm = s2.norm();
    if s2_norm <= T::EPSILON_SQRT * raw.norm() {
        // Degenerate plane; minimize along the gradient only.
        debug!("subspace collapsed to the gradient direction");
        return Ok(cauchy_step(g, hess, radius));
    }
    s2 /= s2_norm;

    let mut basis = OMatrix::zeros_generic(Dyn(n), Dyn(2));
    basis.column_mut(0).copy_from(&s1);
    basis.column_mut(1).copy_from(&s2);

    let g2 = basis.tr_mul(g);
    let b2 = basis.tr_mul(hess) * &basis;

    let (p2, hits_boundary) = solve_2d(&g2, &b2, radius)?;
    let step = &basis * &p2;
    let predicted_reduction = -evaluate_quadratic(hess, g, &step);
    debug!("take two-dimensional subspace step");

    Ok(StepResult {
        step,
        predicted_reduction,
        hits_boundary,
    })
}

// Solves the two-dimensional trust region subproblem exactly. On the
// boundary, the step is parametrized as p = radius (2t, 1 - t^2) / (1 + t^2)
// and the stationary points of the model are the real roots of a quartic in
// t; the parametrization misses the single point (0, -radius), which is
// always included as a candidate.
fn solve_2d<T: RealField>(
    g: &OVector<T, Dyn>,
    hess: &OMatrix<T, Dyn, Dyn>,
    radius: T,
) -> Result<(OVector<T, Dyn>, bool), StepSolverFailure> {
    let one = T::one();
    let two: T = convert(2.0);

    if let Some(chol) = hess.clone().cholesky() {
        let p = chol.solve(&(-g));
        if p.iter().all(|v| v.is_finite()) && p.norm() <= radius {
            return Ok((p, false));
        }
    }

    let r2 = radius * radius;
    let a = hess[(0, 0)] * r2;
    let b = hess[(0, 1)] * r2;
    let c = hess[(1, 1)] * r2;
    let d = g[0] * radius;
    let f = g[1] * radius;

    let coeffs = [
        -b + d,
        two * (a - c + f),
        convert::<f64, T>(6.0) * b,
        two * (c - a + f),
        -b - d,
    ];
    let roots = real_poly_roots(&coeffs)?;

    let mut best: Option<(OVector<T, Dyn>, T)> = None;
    let candidates = roots
        .into_iter()
        .map(|t| {
            let denom = one + t * t;
            OVector::from_vec_generic(
                Dyn(2),
                U1::name(),
                vec![radius * two * t / denom, radius * (one - t * t) / denom],
            )
        })
        .chain(std::iter::once(OVector::from_vec_generic(
            Dyn(2),
            U1::name(),
            vec![T::zero(), -radius],
        )));

    for p in candidates {
        let value = evaluate_quadratic(hess, g, &p);
        if best.as_ref().map(|(_, v)| value < *v).unwrap_or(true) {
            best = Some((p, value));
        }
    }

    match best {
        Some((p, _)) if p.iter().all(|v| v.is_finite()) => Ok((p, true)),
        _ => Err(StepSolverFailure::NonFinite),
    }
}

// Real roots of a polynomial with coefficients ordered from the highest
// degree, computed as the eigenvalues of the companion matrix. Leading
// coefficients that vanish relative to the largest one are trimmed.
fn real_poly_roots<T: RealField>(coeffs: &[T]) -> Result<Vec<T>, StepSolverFailure> {
    let max_coeff = coeffs.iter().fold(T::zero(), |m, c| m.max(c.abs()));
    if max_coeff == T::zero() {
        return Ok(Vec::new());
    }

    let tol = T::EPSILON * max_coeff;
    let mut first = 0;
    while first < coeffs.len() && coeffs[first].abs() <= tol {
        first += 1;
    }
    let degree = coeffs.len().saturating_sub(first + 1);
    if degree == 0 {
        return Ok(Vec::new());
    }

    let leading = coeffs[first];
    if degree == 1 {
        return Ok(vec![-coeffs[first + 1] / leading]);
    }

    // Companion matrix of the monic polynomial; its eigenvalues are the
    // roots.
    let mut companion = OMatrix::zeros_generic(Dyn(degree), Dyn(degree));
    for i in 1..degree {
        companion[(i, i - 1)] = T::one();
    }
    for i in 0..degree {
        companion[(i, degree - 1)] = -coeffs[coeffs.len() - 1 - i] / leading;
    }

    let eigenvalues: OVector<Complex<T>, Dyn> = companion.complex_eigenvalues();
    let real_tol = T::EPSILON_SQRT;
    let roots = eigenvalues
        .iter()
        .filter(|ev| ev.im.abs() <= real_tol * (T::one() + ev.re.abs()))
        .map(|ev| ev.re)
        .collect();

    Ok(roots)
}

/// Nearly exact solution of the least squares trust region subproblem.
///
/// Works on the thin SVD of the (scaled) Jacobian: `uf` is `U^T f`, `s` the
/// singular values in decreasing order and `v` the matrix of right singular
/// vectors; `residual_dim` is the number of Jacobian rows. The secular
/// equation `|| p(alpha) || = radius` in the Levenberg-Marquardt parameter is
/// solved by a safeguarded Newton iteration capped at 10 steps with a
/// relative tolerance of `0.01 * radius`, which in practice converges in a
/// few steps.
///
/// Returns the step, whether it lies on the boundary, and the final value of
/// `alpha` for warm starting the next call.
pub fn trust_region_step_exact<T: RealField>(
    uf: &OVector<T, Dyn>,
    s: &OVector<T, Dyn>,
    v: &OMatrix<T, Dyn, Dyn>,
    residual_dim: usize,
    radius: T,
    initial_alpha: Option<T>,
) -> Result<(OVector<T, Dyn>, bool, T), StepSolverFailure> {
    let zero = T::zero();
    let n = v.nrows();
    let m = residual_dim;

    let suf = s.component_mul(uf);
    if suf.norm() == zero {
        // Zero gradient; there is nothing to minimize.
        return Ok((OVector::zeros_generic(Dyn(n), U1::name()), false, zero));
    }

    // The Gauss-Newton step solves the subproblem when the Jacobian has full
    // rank and the step is interior.
    let threshold = T::EPSILON * convert(m.max(n) as f64) * s[0];
    let full_rank = m >= n && s[s.len() - 1] > threshold;
    if full_rank {
        let p = -(v * uf.component_div(s));
        if p.norm() <= radius {
            debug!("take full Gauss-Newton: {:?}", p.as_slice());
            return Ok((p, false, zero));
        }
    }

    let rtol: T = convert(0.01);
    let mut alpha_upper = suf.norm() / radius;
    let mut alpha_lower = zero;
    if full_rank {
        let (phi, phi_prime) = phi_and_derivative(zero, &suf, s, radius);
        alpha_lower = -phi / phi_prime;
    }

    let heuristic =
        |lower: T, upper: T| (convert::<f64, T>(0.001) * upper).max((lower * upper).sqrt());
    let mut alpha = match initial_alpha {
        None => heuristic(alpha_lower, alpha_upper),
        Some(a) if !full_rank && a == zero => heuristic(alpha_lower, alpha_upper),
        Some(a) => a,
    };

    for _ in 0..10 {
        if alpha < alpha_lower || alpha > alpha_upper {
            alpha = heuristic(alpha_lower, alpha_upper);
        }

        let (phi, phi_prime) = phi_and_derivative(alpha, &suf, s, radius);
        if phi < zero {
            alpha_upper = alpha;
        }

        let ratio = phi / phi_prime;
        alpha_lower = alpha_lower.max(alpha - ratio);
        alpha -= (phi + radius) * ratio / radius;

        if phi.abs() < rtol * radius {
            break;
        }
    }

    let damped = suf.zip_map(s, |sufi, si| sufi / (si * si + alpha));
    let mut p = -(v * damped);
    let p_norm = p.norm();
    if !p_norm.is_finite() || p_norm == zero {
        return Err(StepSolverFailure::NonFinite);
    }

    // Move the step exactly onto the boundary; `p` changes only slightly.
    p *= radius / p_norm;

    Ok((p, true, alpha))
}

// The secular function `|| p(alpha) || - radius` and its derivative in the
// Levenberg-Marquardt parameter.
fn phi_and_derivative<T: RealField>(
    alpha: T,
    suf: &OVector<T, Dyn>,
    s: &OVector<T, Dyn>,
    radius: T,
) -> (T, T) {
    let denom = s.map(|si| si * si + alpha);
    let p_norm = suf.component_div(&denom).norm();
    let phi = p_norm - radius;
    let phi_prime = -suf
        .zip_map(&denom, |sufi, di| sufi * sufi / (di * di * di))
        .sum()
        / p_norm;
    (phi, phi_prime)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector, DMatrix};

    fn exact_from_jacobian(
        jac: &DMatrix<f64>,
        fx: &nalgebra::DVector<f64>,
        radius: f64,
    ) -> (nalgebra::DVector<f64>, bool, f64) {
        let svd = jac.clone().try_svd(true, true, f64::EPSILON, 0).unwrap();
        let u = svd.u.unwrap();
        let v = svd.v_t.unwrap().transpose();
        let uf = u.tr_mul(fx);
        trust_region_step_exact(&uf, &svd.singular_values, &v, jac.nrows(), radius, None).unwrap()
    }

    #[test]
    fn exact_interior_gauss_newton() {
        // For an identity Jacobian the Gauss-Newton step is -f.
        let jac = DMatrix::identity(2, 2);
        let fx = dvector![3.0, -4.0];

        let (step, hits_boundary, alpha) = exact_from_jacobian(&jac, &fx, 10.0);

        assert_abs_diff_eq!(step, dvector![-3.0, 4.0], epsilon = 1e-12);
        assert!(!hits_boundary);
        assert_eq!(alpha, 0.0);
    }

    #[test]
    fn exact_boundary_norm() {
        let jac = dmatrix![1.0, 0.0; 0.0, 1.0];
        let fx = dvector![3.0, -4.0];
        let radius = 1.0;

        let (step, hits_boundary, alpha) = exact_from_jacobian(&jac, &fx, radius);

        assert!(hits_boundary);
        assert!(alpha > 0.0);
        assert_abs_diff_eq!(step.norm(), radius, epsilon = 1e-12);
        // The boundary step still points towards the Gauss-Newton solution.
        assert!(step[0] < 0.0 && step[1] > 0.0);
    }

    #[test]
    fn exact_rank_deficient_jacobian() {
        let jac = dmatrix![1.0, 1.0; 1.0, 1.0];
        let fx = dvector![1.0, 1.0];

        let (step, hits_boundary, _) = exact_from_jacobian(&jac, &fx, 0.5);

        assert!(hits_boundary);
        assert_abs_diff_eq!(step.norm(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn dogleg_interior_newton() {
        let hess = dmatrix![2.0, 0.0; 0.0, 2.0];
        let g = dvector![2.0, 4.0];

        let result = dogleg_step(&g, &hess, 10.0).unwrap();

        assert_abs_diff_eq!(result.step, dvector![-1.0, -2.0], epsilon = 1e-12);
        assert!(!result.hits_boundary);
        assert!(result.predicted_reduction > 0.0);
    }

    #[test]
    fn dogleg_boundary() {
        let hess = dmatrix![2.0, 0.0; 0.0, 2.0];
        let g = dvector![2.0, 4.0];
        let radius = 1.0;

        let result = dogleg_step(&g, &hess, radius).unwrap();

        assert!(result.hits_boundary);
        assert_abs_diff_eq!(result.step.norm(), radius, epsilon = 1e-12);
    }

    #[test]
    fn dogleg_rejects_indefinite_model() {
        let hess = dmatrix![1.0, 0.0; 0.0, -1.0];
        let g = dvector![1.0, 1.0];

        assert!(matches!(
            dogleg_step(&g, &hess, 1.0),
            Err(StepSolverFailure::Factorization)
        ));
    }

    #[test]
    fn subspace_interior_newton() {
        let hess = dmatrix![2.0, 0.0; 0.0, 4.0];
        let g = dvector![2.0, 4.0];

        let result = subspace_step(&g, &hess, 10.0).unwrap();

        assert_abs_diff_eq!(result.step, dvector![-1.0, -1.0], epsilon = 1e-8);
        assert!(!result.hits_boundary);
    }

    #[test]
    fn subspace_handles_indefinite_model() {
        let hess = dmatrix![1.0, 0.0; 0.0, -1.0];
        let g = dvector![1.0, 1.0];
        let radius = 1.0;

        let result = subspace_step(&g, &hess, radius).unwrap();

        assert!(result.hits_boundary);
        assert_abs_diff_eq!(result.step.norm(), radius, epsilon = 1e-8);
        assert!(result.predicted_reduction > 0.0);
    }

    #[test]
    fn cauchy_step_within_radius() {
        let hess = dmatrix![2.0, 0.0; 0.0, 2.0];
        let g = dvector![2.0, 0.0];

        let result = cauchy_step(&g, &hess, 10.0);

        // The exact minimizer along -g for this model.
        assert_abs_diff_eq!(result.step, dvector![-1.0, 0.0], epsilon = 1e-12);
        assert!(!result.hits_boundary);
    }

    #[test]
    fn radius_update_shrinks_on_poor_ratio() {
        let (radius, ratio) =
            update_tr_radius(1.0, 0.01, 1.0, 0.8, true, 10.0, 1e-12, 0.75, 2.0, 0.25, 0.25);

        assert_eq!(ratio, 0.01);
        assert_abs_diff_eq!(radius, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn radius_update_grows_on_boundary_hit() {
        let (radius, _) =
            update_tr_radius(1.0, 1.0, 1.0, 1.0, true, 10.0, 1e-12, 0.75, 2.0, 0.25, 0.25);

        assert_abs_diff_eq!(radius, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn radius_update_respects_bounds() {
        let (grown, _) =
            update_tr_radius(8.0, 1.0, 1.0, 8.0, true, 10.0, 1e-12, 0.75, 2.0, 0.25, 0.25);
        assert_abs_diff_eq!(grown, 10.0, epsilon = 1e-12);

        let (shrunk, _) =
            update_tr_radius(1.0, -1.0, 1.0, 0.0, false, 10.0, 1e-12, 0.75, 2.0, 0.25, 0.25);
        assert!(shrunk >= 1e-12);
    }

    #[test]
    fn real_roots_of_cubic() {
        // (t - 1)(t + 2)t = t^3 + t^2 - 2t
        let roots = real_poly_roots(&[0.0, 1.0, 1.0, -2.0, 0.0]).unwrap();

        let mut roots = roots;
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(roots.len(), 3);
        assert_abs_diff_eq!(roots[0], -2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(roots[1], 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(roots[2], 1.0, epsilon = 1e-8);
    }
}
