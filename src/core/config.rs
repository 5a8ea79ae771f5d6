use getset::{CopyGetters, Setters};
use nalgebra::{convert, Dyn, OVector};

use super::problem::RealField;

/// Stopping tolerances and iteration/evaluation budgets of one optimization
/// run.
///
/// Budgets that are `None` are unlimited. Exhausting a budget is not an
/// error; it produces a result with the corresponding termination and
/// `success == false`.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct Tolerances<T: RealField> {
    /// Relative tolerance on the reduction of the cost. Default: `1e-6`.
    ftol: T,
    /// Relative tolerance on the step size. Default: `1e-6`.
    xtol: T,
    /// Absolute tolerance on the infinity norm of the gradient. Default:
    /// `1e-6`.
    gtol: T,
    /// Maximum number of outer iterations. Default: `100 * n`.
    maxiter: Option<usize>,
    /// Budget of residual or objective evaluations. Default: unlimited.
    max_nfev: Option<usize>,
    /// Budget of Jacobian evaluations. Default: unlimited.
    max_njev: Option<usize>,
    /// Budget of gradient evaluations. Default: unlimited.
    max_ngev: Option<usize>,
    /// Budget of Hessian evaluations. Default: unlimited.
    max_nhev: Option<usize>,
}

impl<T: RealField> Default for Tolerances<T> {
    fn default() -> Self {
        Self {
            ftol: convert(1e-6),
            xtol: convert(1e-6),
            gtol: convert(1e-6),
            maxiter: None,
            max_nfev: None,
            max_njev: None,
            max_ngev: None,
            max_nhev: None,
        }
    }
}

impl<T: RealField> Tolerances<T> {
    /// Resolves the defaulted fields for a problem of given dimension.
    pub(crate) fn budget(&self, dim: usize) -> Budget<T> {
        Budget {
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
            maxiter: self.maxiter.unwrap_or(100 * dim),
            max_nfev: self.max_nfev.unwrap_or(usize::MAX),
            max_njev: self.max_njev.unwrap_or(usize::MAX),
            max_ngev: self.max_ngev.unwrap_or(usize::MAX),
            max_nhev: self.max_nhev.unwrap_or(usize::MAX),
        }
    }
}

/// Tolerances with all defaults resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget<T: RealField> {
    pub ftol: T,
    pub xtol: T,
    pub gtol: T,
    pub maxiter: usize,
    pub max_nfev: usize,
    pub max_njev: usize,
    pub max_ngev: usize,
    pub max_nhev: usize,
}

/// Options for the trust region drivers.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct TrustRegionOptions<T: RealField> {
    /// Initial trust region radius. Default: `|| x0 * scale_inv ||`, or 1 if
    /// that norm is zero.
    initial_trust_radius: Option<T>,
    /// Maximum trust region radius. Default: the initial radius multiplied by
    /// [`max_trust_ratio`](TrustRegionOptions::max_trust_ratio).
    max_trust_radius: Option<T>,
    /// Ratio between the maximum and the initial radius, used when
    /// [`max_trust_radius`](TrustRegionOptions::max_trust_radius) is not set.
    /// Default: `1000`.
    max_trust_ratio: T,
    /// Minimum trust region radius. Keeps the radius positive under repeated
    /// shrinking. Default: machine epsilon.
    min_trust_radius: T,
    /// Gain ratio below which the radius shrinks. Default: `0.25`.
    decrease_threshold: T,
    /// Gain ratio above which the radius grows after a boundary step.
    /// Default: `0.75`.
    increase_threshold: T,
    /// Factor applied to the step norm when shrinking. Default: `0.25`.
    decrease_ratio: T,
    /// Factor applied to the radius when growing. Default: `2`.
    increase_ratio: T,
    /// Number of consecutive step rejections tolerated before the driver
    /// stalls. Default: `10`.
    rejections_limit: usize,
    /// Radius of the geodesic acceleration correction relative to the step
    /// norm. Zero disables the correction. Default: `0`.
    ga_tr_ratio: T,
    /// Finite difference step used by the geodesic acceleration correction.
    /// Default: `1e-3`.
    ga_fd_step: T,
}

impl<T: RealField> Default for TrustRegionOptions<T> {
    fn default() -> Self {
        Self {
            initial_trust_radius: None,
            max_trust_radius: None,
            max_trust_ratio: convert(1000.0),
            min_trust_radius: T::EPSILON,
            decrease_threshold: convert(0.25),
            increase_threshold: convert(0.75),
            decrease_ratio: convert(0.25),
            increase_ratio: convert(2.0),
            rejections_limit: 10,
            ga_tr_ratio: convert(0.0),
            ga_fd_step: convert(1e-3),
        }
    }
}

/// Options for the gradient descent driver.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct SgdOptions<T: RealField> {
    /// Learning rate. Default: `1e-2`.
    learning_rate: T,
    /// Decay rate of the learning rate: the step at iteration `k` uses
    /// `learning_rate / (1 + decay * k)`. Zero keeps the rate constant.
    /// Default: `0`.
    decay: T,
}

impl<T: RealField> Default for SgdOptions<T> {
    fn default() -> Self {
        Self {
            learning_rate: convert(1e-2),
            decay: convert(0.0),
        }
    }
}

/// Characteristic scale of the variables.
///
/// Setting the scale is equivalent to reformulating the problem in scaled
/// variables `xs = x / x_scale`; the size of the trust region along a
/// dimension is proportional to the scale of that variable.
#[derive(Debug, Clone)]
pub enum XScale<T: RealField> {
    /// All variables have unit scale.
    Unit,
    /// Fixed per-variable scale.
    Fixed(OVector<T, Dyn>),
    /// Scale derived from the Jacobian columns (Hessian diagonal for scalar
    /// objectives) and refreshed after every accepted step.
    Auto,
}

impl<T: RealField> Default for XScale<T> {
    fn default() -> Self {
        XScale::Unit
    }
}

/// Progress reporting level, mapped onto the `log` facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No progress output.
    #[default]
    Silent,
    /// Termination report once the run finishes.
    Summary,
    /// Termination report plus one row per outer iteration.
    Iterations,
}

/// Aggregate configuration passed to the drivers.
#[derive(Debug, Clone)]
pub struct OptimizeConfig<T: RealField> {
    /// Stopping tolerances and budgets.
    pub tolerances: Tolerances<T>,
    /// Trust region tuning.
    pub trust_region: TrustRegionOptions<T>,
    /// Gradient descent tuning.
    pub sgd: SgdOptions<T>,
    /// Variable scaling.
    pub x_scale: XScale<T>,
    /// Progress reporting level.
    pub verbosity: Verbosity,
}

impl<T: RealField> Default for OptimizeConfig<T> {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            trust_region: TrustRegionOptions::default(),
            sgd: SgdOptions::default(),
            x_scale: XScale::default(),
            verbosity: Verbosity::default(),
        }
    }
}
