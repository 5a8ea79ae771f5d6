use std::fmt;

use nalgebra::{convert, Dyn, OVector};

use super::config::Budget;
use super::problem::RealField;

/// Reason for stopping the iterative process.
///
/// Terminations are not errors. Budget-exhausted and stalled runs are the
/// expected outcome for hard, non-convergent problems and still produce a
/// valid [`OptimizeResult`], only with `success == false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The infinity norm of the gradient dropped below `gtol`.
    Gtol,
    /// The relative step size dropped below `xtol`.
    Xtol,
    /// The relative reduction of the cost dropped below `ftol`.
    Ftol,
    /// The maximum number of iterations was reached.
    MaxIter,
    /// The budget of residual or objective evaluations was exhausted.
    MaxFev,
    /// The budget of Jacobian evaluations was exhausted.
    MaxJev,
    /// The budget of gradient evaluations was exhausted.
    MaxGev,
    /// The budget of Hessian evaluations was exhausted.
    MaxHev,
    /// The step rejection limit was reached without making progress.
    Stalled,
    /// The user-provided callback requested a stop.
    Callback,
}

impl Termination {
    /// Whether the termination indicates a converged solution.
    pub fn success(&self) -> bool {
        matches!(self, Termination::Gtol | Termination::Xtol | Termination::Ftol)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Termination::Gtol => "`gtol` termination condition is satisfied",
            Termination::Xtol => "`xtol` termination condition is satisfied",
            Termination::Ftol => "`ftol` termination condition is satisfied",
            Termination::MaxIter => "maximum number of iterations is reached",
            Termination::MaxFev => "maximum number of function evaluations is reached",
            Termination::MaxJev => "maximum number of Jacobian evaluations is reached",
            Termination::MaxGev => "maximum number of gradient evaluations is reached",
            Termination::MaxHev => "maximum number of Hessian evaluations is reached",
            Termination::Stalled => "step rejection limit is reached without making progress",
            Termination::Callback => "optimization is stopped by the callback",
        };
        f.write_str(message)
    }
}

/// Counters of objective and derivative evaluations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalCounters {
    /// Number of residual or objective evaluations.
    pub nfev: usize,
    /// Number of Jacobian evaluations.
    pub njev: usize,
    /// Number of gradient evaluations.
    pub ngev: usize,
    /// Number of Hessian evaluations.
    pub nhev: usize,
}

/// Terminal record of one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizeResult<T: RealField> {
    /// Final iterate.
    pub x: OVector<T, Dyn>,
    /// Final objective value (the cost `0.5 * || f ||^2` for least squares).
    pub cost: T,
    /// Infinity norm of the gradient at the final iterate.
    pub optimality: T,
    /// Reason for stopping.
    pub termination: Termination,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Evaluation counters.
    pub counters: EvalCounters,
}

impl<T: RealField> OptimizeResult<T> {
    /// Whether the run converged.
    pub fn success(&self) -> bool {
        self.termination.success()
    }

    /// Human-readable description of the termination.
    pub fn message(&self) -> String {
        self.termination.to_string()
    }
}

/// Shared convergence and budget test run after every attempted step.
///
/// The `ftol` condition additionally requires an adequate agreement between
/// the local model and the objective in the last step (gain ratio above
/// 0.25), so a tiny reduction caused by a poor model does not pass as
/// convergence. The gradient condition is tested separately by the drivers
/// before the step is computed.
pub(crate) fn check_termination<T: RealField>(
    actual_reduction: T,
    cost: T,
    step_norm: T,
    x_norm: T,
    ratio: T,
    iteration: usize,
    counters: EvalCounters,
    budget: &Budget<T>,
) -> Option<Termination> {
    let quarter: T = convert(0.25);

    if actual_reduction < budget.ftol * cost.abs() && ratio > quarter {
        Some(Termination::Ftol)
    } else if step_norm < budget.xtol * (budget.xtol + x_norm) {
        Some(Termination::Xtol)
    } else if iteration >= budget.maxiter {
        Some(Termination::MaxIter)
    } else if counters.nfev >= budget.max_nfev {
        Some(Termination::MaxFev)
    } else if counters.njev >= budget.max_njev {
        Some(Termination::MaxJev)
    } else if counters.ngev >= budget.max_ngev {
        Some(Termination::MaxGev)
    } else if counters.nhev >= budget.max_nhev {
        Some(Termination::MaxHev)
    } else {
        None
    }
}
