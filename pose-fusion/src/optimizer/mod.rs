//! First-order optimizers over manifold-valued estimates.
//!
//! Every optimizer here repeats the same cycle:
//!
//! 1. evaluate the total loss and its gradient at the current estimates, in tangent
//!    coordinates, through an [`Objective`];
//! 2. turn the gradient into one tangent step per variable;
//! 3. apply the steps to all variables at once through [`LieGroup::retract`].
//!
//! Two step policies are provided:
//! - [`GradientDescent`]: `step = −learning_rate · gradient`
//! - [`Sgd`]: a stateful policy with learning-rate decay, momentum and Nesterov momentum
//!
//! Both run for a fixed iteration budget by default. Tolerance-based stopping, stall
//! detection, a timeout and cooperative cancellation through [`StopHandle`] are opt-in, and
//! all of them are checked only at iteration boundaries.

use crate::core::{
    CoreError,
    values::{TangentValues, Values},
};
use crate::error::PoseFusionResult;
use crate::manifold::{LieGroup, Tangent};
use nalgebra::DVector;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use web_time as time;

pub mod gradient_descent;
pub mod sgd;

pub use gradient_descent::{GradientDescent, GradientDescentConfig};
pub use sgd::{Sgd, SgdConfig};

// Re-export observer types from the observers module
pub use crate::observers::{OptObserver, OptObserverVec};

/// Optimizer-specific error types
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimization parameters
    #[error("Invalid optimization parameters: {0}")]
    InvalidParameters(String),

    /// Empty problem (no variables)
    #[error("Problem has no variables to optimize")]
    EmptyProblem,

    /// Loss is NaN or infinite where a finite value is required
    #[error("Non-finite cost {cost} at iteration {iteration}")]
    NonFiniteCost { cost: f64, iteration: usize },

    /// Evaluating the loss or its gradient failed
    #[error("Objective evaluation failed")]
    Objective(#[from] CoreError),
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// A differentiable scalar loss over an estimate collection.
///
/// The gradient is expressed in tangent coordinates: entry `i` is the derivative of the
/// loss with respect to a right perturbation of variable `i`. It points uphill.
pub trait Objective<G: LieGroup> {
    /// Loss and gradient at `values`.
    fn value_with_gradient(&self, values: &Values<G>) -> OptimizerResult<(f64, TangentValues<G>)>;

    /// Loss alone.
    fn value(&self, values: &Values<G>) -> OptimizerResult<f64> {
        Ok(self.value_with_gradient(values)?.0)
    }
}

/// Default finite-difference step of [`LossFunction`].
pub const DEFAULT_DIFFERENCE_STEP: f64 = 1e-6;

/// Objective built from a plain closure over all variables.
///
/// The gradient is computed with central differences on each variable's tangent space,
/// `(f(x ⊕ h·eₖ) − f(x ⊕ −h·eₖ)) / 2h`, variable by variable in insertion order.
///
/// ```
/// use pose_fusion::core::values::Values;
/// use pose_fusion::manifold::se2::SE2;
/// use pose_fusion::optimizer::{LossFunction, Objective};
///
/// let values: Values<SE2> = vec![SE2::from_xy_angle(1.0, 0.0, 0.0)].into();
/// let loss = LossFunction::new(|poses: &[SE2]| poses[0].x() * poses[0].x());
///
/// let (cost, gradient) = loss.value_with_gradient(&values).unwrap();
/// assert_eq!(cost, 1.0);
/// assert!((gradient.to_dvector()[0] - 2.0).abs() < 1e-6);
/// ```
pub struct LossFunction<G, F> {
    loss: F,
    step: f64,
    _group: PhantomData<fn() -> G>,
}

impl<G, F> LossFunction<G, F>
where
    G: LieGroup,
    F: Fn(&[G]) -> f64,
{
    pub fn new(loss: F) -> Self {
        LossFunction {
            loss,
            step: DEFAULT_DIFFERENCE_STEP,
            _group: PhantomData,
        }
    }

    /// Use a different finite-difference step.
    ///
    /// # Errors
    /// `OptimizerError::InvalidParameters` unless `step` is finite and positive.
    pub fn with_step(mut self, step: f64) -> OptimizerResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(OptimizerError::InvalidParameters(format!(
                "finite-difference step must be finite and positive, got {step}"
            ))
            .log());
        }
        self.step = step;
        Ok(self)
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

impl<G, F> Objective<G> for LossFunction<G, F>
where
    G: LieGroup,
    F: Fn(&[G]) -> f64,
{
    fn value_with_gradient(&self, values: &Values<G>) -> OptimizerResult<(f64, TangentValues<G>)> {
        let dim = G::TangentVector::DIM;
        let mut probe = values.as_slice().to_vec();
        let mut gradient = DVector::zeros(values.tangent_dim());
        let mut basis = vec![0.0; dim];

        for (i, base) in values.iter().enumerate() {
            for k in 0..dim {
                basis[k] = self.step;
                let forward = G::TangentVector::from_slice(&basis).map_err(|e| {
                    OptimizerError::InvalidParameters(format!(
                        "finite-difference step {} is not usable",
                        self.step
                    ))
                    .log_with_source(e)
                })?;
                basis[k] = 0.0;

                probe[i] = base.retract(&forward, None, None);
                let upper = (self.loss)(&probe);
                probe[i] = base.retract(&-forward, None, None);
                let lower = (self.loss)(&probe);

                gradient[i * dim + k] = (upper - lower) / (2.0 * self.step);
            }
            probe[i] = base.clone();
        }

        let cost = (self.loss)(values.as_slice());
        Ok((cost, TangentValues::from_dvector(&gradient)?))
    }

    fn value(&self, values: &Values<G>) -> OptimizerResult<f64> {
        Ok((self.loss)(values.as_slice()))
    }
}

/// Summary of the last iterate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceInfo {
    /// Norm of the gradient at the final estimates
    pub final_gradient_norm: f64,
    /// Norm of the last applied step
    pub final_step_norm: f64,
    /// Cost decrease achieved by the last step (negative if it went up)
    pub final_cost_change: f64,
    /// Number of loss/gradient evaluations
    pub cost_evaluations: usize,
}

impl Display for ConvergenceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Final gradient norm: {:.2e}, Final step norm: {:.2e}, Final cost change: {:.2e}, Cost evaluations: {}",
            self.final_gradient_norm,
            self.final_step_norm,
            self.final_cost_change,
            self.cost_evaluations
        )
    }
}

/// How an optimization run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OptimizationStatus {
    /// Cost fell below the configured threshold
    Converged,
    /// The iteration budget ran out; the normal end of a fixed-budget run
    MaxIterationsReached,
    /// Relative cost change fell below the configured tolerance
    CostToleranceReached,
    /// Gradient norm fell below the configured tolerance
    GradientToleranceReached,
    /// Loss or gradient became NaN or infinite; estimates are the last finite ones
    NumericalFailure,
    /// Cancelled through a [`StopHandle`]
    UserTerminated,
    /// Wall-clock limit reached
    Timeout,
    /// The cost did not improve for this many consecutive iterations
    Stalled(usize),
}

impl OptimizationStatus {
    /// Whether the status signals a solution rather than an exhausted or interrupted run.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Converged
                | OptimizationStatus::CostToleranceReached
                | OptimizationStatus::GradientToleranceReached
        )
    }
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Converged => write!(f, "Converged"),
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::CostToleranceReached => write!(f, "Cost tolerance reached"),
            OptimizationStatus::GradientToleranceReached => write!(f, "Gradient tolerance reached"),
            OptimizationStatus::NumericalFailure => write!(f, "Numerical failure"),
            OptimizationStatus::UserTerminated => write!(f, "User terminated"),
            OptimizationStatus::Timeout => write!(f, "Timeout"),
            OptimizationStatus::Stalled(window) => {
                write!(f, "Stalled (no cost decrease in {window} iterations)")
            }
        }
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct SolverResult<G> {
    /// Final estimates
    pub values: Values<G>,
    pub status: OptimizationStatus,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Number of applied steps
    pub iterations: usize,
    pub elapsed_time: time::Duration,
    pub convergence_info: Option<ConvergenceInfo>,
}

impl<G> SolverResult<G> {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}

impl<G> Display for SolverResult<G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_converged() {
            writeln!(f, "CONVERGED ({})", self.status)?;
        } else {
            writeln!(f, "NOT CONVERGED ({})", self.status)?;
        }
        writeln!(f, "Cost:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_cost)?;
        writeln!(f, "  Final:     {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.max(1e-12)
        )?;
        writeln!(f, "Iterations: {}", self.iterations)?;
        if let Some(info) = &self.convergence_info {
            writeln!(f, "{info}")?;
        }
        write!(
            f,
            "Total time: {:.2}ms",
            self.elapsed_time.as_secs_f64() * 1000.0
        )
    }
}

/// Clonable cancellation token, checked at every iteration boundary.
///
/// ```
/// use pose_fusion::optimizer::StopHandle;
///
/// let handle = StopHandle::new();
/// let for_other_thread = handle.clone();
/// for_other_thread.stop();
/// assert!(handle.is_stopped());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination at the next iteration boundary.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the handle can be reused.
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

/// Common interface of the step policies.
pub trait Solver<G: LieGroup> {
    type Config;

    fn with_config(config: Self::Config) -> Self
    where
        Self: Sized;

    /// Run from `initial` until a termination criterion fires.
    fn optimize(
        &mut self,
        objective: &dyn Objective<G>,
        initial: &Values<G>,
    ) -> PoseFusionResult<SolverResult<G>>;
}

/// Per-iteration statistics printed at debug level.
#[derive(Debug, Clone)]
pub struct IterationStats {
    pub iteration: usize,
    pub cost: f64,
    pub cost_change: f64,
    pub gradient_norm: f64,
    pub step_norm: f64,
    pub learning_rate: f64,
    pub iter_time_ms: f64,
    pub total_time_ms: f64,
}

impl IterationStats {
    pub fn print_header() {
        debug!(
            "{:>5}  {:>13}  {:>13}  {:>13}  {:>13}  {:>11}  {:>11}  {:>13}",
            "iter", "cost", "cost_change", "|gradient|", "|step|", "lr", "iter_time", "total_time"
        );
    }

    pub fn print_line(&self) {
        debug!(
            "{:>5}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>13.2e}  {:>11.2e}  {:>9.2}ms  {:>11.2}ms",
            self.iteration,
            self.cost,
            self.cost_change,
            self.gradient_norm,
            self.step_norm,
            self.learning_rate,
            self.iter_time_ms,
            self.total_time_ms
        );
    }
}

/// Stopping rules shared by both step policies.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TerminationCriteria {
    pub max_iterations: usize,
    pub gradient_tolerance: Option<f64>,
    pub cost_tolerance: Option<f64>,
    pub min_cost_threshold: Option<f64>,
    pub stall_window: Option<usize>,
    pub timeout: Option<time::Duration>,
}

impl TerminationCriteria {
    /// Checked before a step is taken.
    fn check_boundary(
        &self,
        iteration: usize,
        gradient_norm: f64,
        elapsed: time::Duration,
        stop: &StopHandle,
    ) -> Option<OptimizationStatus> {
        if stop.is_stopped() {
            return Some(OptimizationStatus::UserTerminated);
        }

        if self.timeout.is_some_and(|timeout| elapsed >= timeout) {
            return Some(OptimizationStatus::Timeout);
        }

        if iteration >= self.max_iterations {
            return Some(OptimizationStatus::MaxIterationsReached);
        }

        if self
            .gradient_tolerance
            .is_some_and(|tolerance| gradient_norm < tolerance)
        {
            return Some(OptimizationStatus::GradientToleranceReached);
        }

        None
    }

    /// Checked after a step is accepted.
    fn check_progress(
        &self,
        previous_cost: f64,
        new_cost: f64,
        iterations_without_improvement: usize,
    ) -> Option<OptimizationStatus> {
        if self
            .min_cost_threshold
            .is_some_and(|threshold| new_cost < threshold)
        {
            return Some(OptimizationStatus::Converged);
        }

        if let Some(tolerance) = self.cost_tolerance {
            let relative_change = (previous_cost - new_cost).abs() / previous_cost.max(1e-10);
            if relative_change < tolerance {
                return Some(OptimizationStatus::CostToleranceReached);
            }
        }

        if let Some(window) = self.stall_window {
            if iterations_without_improvement >= window {
                return Some(OptimizationStatus::Stalled(window));
            }
        }

        None
    }

    /// Validate the settings shared by every policy.
    fn validate(&self) -> OptimizerResult<()> {
        for (name, value) in [
            ("gradient_tolerance", self.gradient_tolerance),
            ("cost_tolerance", self.cost_tolerance),
        ] {
            if let Some(value) = value {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(OptimizerError::InvalidParameters(format!(
                        "{name} must be finite and non-negative, got {value}"
                    ))
                    .log());
                }
            }
        }

        if self.stall_window == Some(0) {
            return Err(OptimizerError::InvalidParameters(
                "stall_window must be at least 1".to_string(),
            )
            .log());
        }

        Ok(())
    }
}

/// Validate a learning rate: finite and strictly positive.
pub(crate) fn validate_learning_rate(learning_rate: f64) -> OptimizerResult<()> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(OptimizerError::InvalidParameters(format!(
            "learning_rate must be finite and positive, got {learning_rate}"
        ))
        .log());
    }
    Ok(())
}

/// A step produced by a [`StepRule`], not yet accepted.
pub(crate) struct Proposal<P> {
    pub step_norm: f64,
    pub learning_rate: f64,
    pub pending: P,
}

/// Step policy driven by [`DescentRun`].
///
/// `propose` moves the candidate estimates without touching the rule. The run hands the
/// pending state back through `accept` only once the moved estimates evaluate to a finite
/// cost and gradient, so a rejected or failed step leaves the rule as it was.
pub(crate) trait StepRule<G: LieGroup> {
    type Pending;

    fn propose(
        &self,
        values: &mut Values<G>,
        gradient: &TangentValues<G>,
    ) -> OptimizerResult<Proposal<Self::Pending>>;

    fn accept(&mut self, pending: Self::Pending);
}

/// Everything the shared iteration loop needs besides the step rule itself.
pub(crate) struct DescentRun<'a, G: LieGroup> {
    pub name: &'static str,
    pub criteria: TerminationCriteria,
    pub observers: &'a OptObserverVec<G>,
    pub stop: &'a StopHandle,
    pub verbose: bool,
}

impl<G: LieGroup> DescentRun<'_, G> {
    /// Drive evaluate → step → retract cycles until a criterion fires.
    ///
    /// `rule` moves a copy of the estimates along the gradient. Its state advances only for
    /// steps that are accepted.
    pub fn run(
        &self,
        objective: &dyn Objective<G>,
        initial: &Values<G>,
        rule: &mut impl StepRule<G>,
    ) -> PoseFusionResult<SolverResult<G>> {
        let start_time = time::Instant::now();

        self.criteria.validate()?;
        if initial.is_empty() {
            return Err(OptimizerError::EmptyProblem.log().into());
        }

        let mut values = initial.clone();
        let (mut cost, mut gradient) = objective.value_with_gradient(&values)?;
        let mut cost_evaluations = 1;
        if !cost.is_finite() {
            return Err(OptimizerError::NonFiniteCost { cost, iteration: 0 }
                .log()
                .into());
        }

        let initial_cost = cost;
        let mut best_cost = cost;
        let mut iterations_without_improvement = 0;
        let mut iteration = 0;
        let mut final_step_norm = 0.0;
        let mut final_cost_change = 0.0;

        if tracing::enabled!(tracing::Level::DEBUG) {
            IterationStats::print_header();
        }

        let status = loop {
            let iter_start = time::Instant::now();
            let gradient_norm = gradient.norm();

            if let Some(status) = self.criteria.check_boundary(
                iteration,
                gradient_norm,
                start_time.elapsed(),
                self.stop,
            ) {
                break status;
            }

            // Full loss and gradient are known; only now are the estimates moved.
            let mut candidate = values.clone();
            let Proposal {
                step_norm,
                learning_rate,
                pending,
            } = rule.propose(&mut candidate, &gradient)?;

            let (new_cost, new_gradient) = objective.value_with_gradient(&candidate)?;
            cost_evaluations += 1;
            if !new_cost.is_finite() || !new_gradient.is_finite() {
                break OptimizationStatus::NumericalFailure;
            }

            rule.accept(pending);
            iteration += 1;
            values = candidate;
            final_step_norm = step_norm;
            final_cost_change = cost - new_cost;

            if new_cost < best_cost {
                best_cost = new_cost;
                iterations_without_improvement = 0;
            } else {
                iterations_without_improvement += 1;
            }

            if tracing::enabled!(tracing::Level::DEBUG) {
                IterationStats {
                    iteration,
                    cost: new_cost,
                    cost_change: final_cost_change,
                    gradient_norm,
                    step_norm,
                    learning_rate,
                    iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                    total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                }
                .print_line();
            }

            self.observers
                .set_iteration_metrics(new_cost, gradient_norm, step_norm);
            self.observers.notify(&values, iteration);

            let progress =
                self.criteria
                    .check_progress(cost, new_cost, iterations_without_improvement);
            cost = new_cost;
            gradient = new_gradient;

            if let Some(status) = progress {
                break status;
            }
        };

        match status {
            OptimizationStatus::UserTerminated
            | OptimizationStatus::Timeout
            | OptimizationStatus::Stalled(_)
            | OptimizationStatus::NumericalFailure => {
                warn!("{} stopped early after {iteration} iterations: {status}", self.name);
            }
            _ => {}
        }

        let result = SolverResult {
            values,
            status,
            initial_cost,
            final_cost: cost,
            iterations: iteration,
            elapsed_time: start_time.elapsed(),
            convergence_info: Some(ConvergenceInfo {
                final_gradient_norm: gradient.norm(),
                final_step_norm,
                final_cost_change,
                cost_evaluations,
            }),
        };

        if self.verbose {
            info!("{} Final Result\n{}", self.name, result);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::se2::SE2;

    const TOLERANCE: f64 = 1e-6;

    fn criteria() -> TerminationCriteria {
        TerminationCriteria {
            max_iterations: 10,
            gradient_tolerance: None,
            cost_tolerance: None,
            min_cost_threshold: None,
            stall_window: None,
            timeout: None,
        }
    }

    #[test]
    fn test_loss_function_gradient_matches_analytic() {
        // f = x² + 3y² + θ², evaluated on raw pose fields.
        let loss = LossFunction::new(|poses: &[SE2]| {
            let p = &poses[0];
            p.x() * p.x() + 3.0 * p.y() * p.y() + p.angle() * p.angle()
        });
        let values: Values<SE2> = vec![SE2::from_xy_angle(0.5, -0.2, 0.3)].into();
        let (cost, gradient) = loss.value_with_gradient(&values).unwrap();

        assert!((cost - (0.25 + 0.12 + 0.09)).abs() < 1e-12);

        // Right perturbation moves translation along the rotated axes.
        let (s, c) = 0.3_f64.sin_cos();
        let dx = 2.0 * 0.5;
        let dy = 6.0 * -0.2;
        let expected = [dx * c + dy * s, -dx * s + dy * c, 2.0 * 0.3];
        let gradient = gradient.to_dvector();
        for k in 0..3 {
            assert!((gradient[k] - expected[k]).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_loss_function_step_must_be_positive() {
        let quadratic = |poses: &[SE2]| poses[0].x() * poses[0].x();
        for step in [0.0, -1e-6, f64::NAN, f64::INFINITY] {
            let result = LossFunction::new(quadratic).with_step(step);
            assert!(matches!(result, Err(OptimizerError::InvalidParameters(_))));
        }

        let loss = LossFunction::new(quadratic).with_step(1e-4).unwrap();
        assert_eq!(loss.step(), 1e-4);
        let values: Values<SE2> = vec![SE2::from_xy_angle(1.5, 0.0, 0.0)].into();
        let (_, gradient) = loss.value_with_gradient(&values).unwrap();
        assert!(gradient.is_finite());
        assert!((gradient.to_dvector()[0] - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_loss_function_value_skips_gradient() {
        let loss = LossFunction::new(|poses: &[SE2]| poses.len() as f64);
        let values: Values<SE2> = vec![SE2::identity(), SE2::identity()].into();
        assert_eq!(loss.value(&values).unwrap(), 2.0);
    }

    #[test]
    fn test_status_is_converged() {
        assert!(OptimizationStatus::Converged.is_converged());
        assert!(OptimizationStatus::GradientToleranceReached.is_converged());
        assert!(!OptimizationStatus::MaxIterationsReached.is_converged());
        assert!(!OptimizationStatus::Stalled(5).is_converged());
        assert!(OptimizationStatus::Stalled(5).to_string().contains('5'));
    }

    #[test]
    fn test_status_serializes() {
        let json = serde_json::to_string(&OptimizationStatus::Timeout).unwrap();
        assert_eq!(json, "\"Timeout\"");
    }

    #[test]
    fn test_stop_handle_shared_between_clones() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_stopped());
        clone.stop();
        assert!(handle.is_stopped());
        handle.reset();
        assert!(!clone.is_stopped());
    }

    #[test]
    fn test_boundary_checks_in_order() {
        let stop = StopHandle::new();
        let mut rules = criteria();
        rules.gradient_tolerance = Some(1e-3);
        rules.timeout = Some(time::Duration::from_secs(1));

        assert_eq!(
            rules.check_boundary(0, 1.0, time::Duration::ZERO, &stop),
            None
        );
        assert_eq!(
            rules.check_boundary(0, 1e-4, time::Duration::ZERO, &stop),
            Some(OptimizationStatus::GradientToleranceReached)
        );
        assert_eq!(
            rules.check_boundary(10, 1.0, time::Duration::ZERO, &stop),
            Some(OptimizationStatus::MaxIterationsReached)
        );
        assert_eq!(
            rules.check_boundary(0, 1.0, time::Duration::from_secs(2), &stop),
            Some(OptimizationStatus::Timeout)
        );
        stop.stop();
        assert_eq!(
            rules.check_boundary(0, 1.0, time::Duration::from_secs(2), &stop),
            Some(OptimizationStatus::UserTerminated)
        );
    }

    #[test]
    fn test_progress_checks() {
        let mut rules = criteria();
        assert_eq!(rules.check_progress(1.0, 1.0, 100), None);

        rules.stall_window = Some(3);
        assert_eq!(rules.check_progress(1.0, 1.0, 2), None);
        assert_eq!(
            rules.check_progress(1.0, 1.0, 3),
            Some(OptimizationStatus::Stalled(3))
        );

        rules.cost_tolerance = Some(1e-6);
        assert_eq!(
            rules.check_progress(1.0, 1.0 - 1e-9, 0),
            Some(OptimizationStatus::CostToleranceReached)
        );

        rules.min_cost_threshold = Some(1e-3);
        assert_eq!(
            rules.check_progress(1.0, 1e-4, 0),
            Some(OptimizationStatus::Converged)
        );
    }

    #[test]
    fn test_criteria_validation() {
        let mut rules = criteria();
        assert!(rules.validate().is_ok());
        rules.stall_window = Some(0);
        assert!(rules.validate().is_err());
        rules.stall_window = None;
        rules.cost_tolerance = Some(f64::NAN);
        assert!(rules.validate().is_err());

        assert!(validate_learning_rate(0.1).is_ok());
        assert!(validate_learning_rate(0.0).is_err());
        assert!(validate_learning_rate(f64::INFINITY).is_err());
    }

    #[test]
    fn test_objective_error_keeps_source() {
        let err = OptimizerError::from(CoreError::InvalidInput("x3".to_string()));
        assert_eq!(err.to_string(), "Objective evaluation failed");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Invalid input: x3"));
    }
}
