//! Full-batch gradient descent on a manifold.
//!
//! Every iteration evaluates the loss and its tangent-space gradient at all estimates, then
//! retracts every variable at once along `−learning_rate · gradient`. The learning rate is
//! fixed; there is no line search.
//!
//! ```
//! use pose_fusion::core::graph::FactorGraph;
//! use pose_fusion::core::values::Values;
//! use pose_fusion::factors::{BetweenFactor, PriorFactor};
//! use pose_fusion::manifold::se2::SE2;
//! use pose_fusion::optimizer::{GradientDescent, GradientDescentConfig};
//!
//! let mut values = Values::new();
//! let x0 = values.insert(SE2::from_xy_angle(0.2, -0.1, 0.1));
//! let x1 = values.insert(SE2::from_xy_angle(0.8, 0.3, -0.2));
//!
//! let mut graph = FactorGraph::new();
//! graph.add_factor(PriorFactor::new(x0, SE2::from_xy_angle(0.0, 0.0, 0.0)));
//! graph.add_factor(BetweenFactor::new(x0, x1, SE2::from_xy_angle(1.0, 0.0, 0.0)));
//!
//! let config = GradientDescentConfig::new()
//!     .with_learning_rate(0.1)
//!     .with_max_iterations(500);
//! let mut solver = GradientDescent::with_config(config);
//! let result = solver.optimize(&graph, &values).unwrap();
//!
//! assert!(result.final_cost < 1e-8);
//! assert!((result.values[x1].x() - 1.0).abs() < 1e-4);
//! ```

use crate::core::values::{TangentValues, Values};
use crate::error::PoseFusionResult;
use crate::manifold::LieGroup;
use crate::optimizer::{
    DescentRun, Objective, OptObserver, OptObserverVec, OptimizerResult, Proposal, SolverResult,
    StepRule, StopHandle, TerminationCriteria, validate_learning_rate,
};
use tracing::debug;
use web_time as time;

/// Configuration parameters for gradient descent.
///
/// Only the iteration budget stops a run by default; every other criterion is opt-in.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientDescentConfig {
    /// Number of steps to take
    ///
    /// Default: 1500
    pub max_iterations: usize,
    /// Scale applied to the gradient to form each step
    ///
    /// Default: 1.0
    pub learning_rate: f64,
    /// Stop when the gradient norm falls below this value
    ///
    /// Default: None (disabled)
    pub gradient_tolerance: Option<f64>,
    /// Stop when the relative cost change of a step falls below this value
    ///
    /// Default: None (disabled)
    pub cost_tolerance: Option<f64>,
    /// Stop with [`OptimizationStatus::Converged`](crate::optimizer::OptimizationStatus::Converged)
    /// once the cost falls below this value
    ///
    /// Default: None (disabled)
    pub min_cost_threshold: Option<f64>,
    /// Report a stall after this many consecutive steps without a new best cost
    ///
    /// Default: None (disabled)
    pub stall_window: Option<usize>,
    /// Wall-clock limit, checked between iterations
    ///
    /// Default: None (disabled)
    pub timeout: Option<time::Duration>,
    /// Log the final summary at info level
    ///
    /// Default: false
    pub verbose: bool,
}

impl Default for GradientDescentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1500,
            learning_rate: 1.0,
            gradient_tolerance: None,
            cost_tolerance: None,
            min_cost_threshold: None,
            stall_window: None,
            timeout: None,
            verbose: false,
        }
    }
}

impl GradientDescentConfig {
    /// Create a new gradient descent configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_gradient_tolerance(mut self, gradient_tolerance: f64) -> Self {
        self.gradient_tolerance = Some(gradient_tolerance);
        self
    }

    pub fn with_cost_tolerance(mut self, cost_tolerance: f64) -> Self {
        self.cost_tolerance = Some(cost_tolerance);
        self
    }

    pub fn with_min_cost_threshold(mut self, min_cost: f64) -> Self {
        self.min_cost_threshold = Some(min_cost);
        self
    }

    pub fn with_stall_window(mut self, iterations: usize) -> Self {
        self.stall_window = Some(iterations);
        self
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Print configuration parameters (debug level)
    pub fn print_configuration(&self) {
        debug!(
            "\nConfiguration:\n  Solver:        Gradient Descent\n  Learning rate: {:.2e}\n  Convergence Criteria:\n  Max iterations:      {}\n  Gradient tolerance:  {:?}\n  Cost tolerance:      {:?}\n  Min cost threshold:  {:?}\n  Stall window:        {:?}\n  Timeout:             {:?}",
            self.learning_rate,
            self.max_iterations,
            self.gradient_tolerance,
            self.cost_tolerance,
            self.min_cost_threshold,
            self.stall_window,
            self.timeout
        );
    }

    pub(crate) fn criteria(&self) -> TerminationCriteria {
        TerminationCriteria {
            max_iterations: self.max_iterations,
            gradient_tolerance: self.gradient_tolerance,
            cost_tolerance: self.cost_tolerance,
            min_cost_threshold: self.min_cost_threshold,
            stall_window: self.stall_window,
            timeout: self.timeout,
        }
    }
}

/// Gradient descent solver.
pub struct GradientDescent<G: LieGroup> {
    config: GradientDescentConfig,
    observers: OptObserverVec<G>,
    stop: StopHandle,
}

impl<G: LieGroup> Default for GradientDescent<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: LieGroup> GradientDescent<G> {
    /// Create a new gradient descent solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(GradientDescentConfig::default())
    }

    pub fn with_config(config: GradientDescentConfig) -> Self {
        Self {
            config,
            observers: OptObserverVec::new(),
            stop: StopHandle::new(),
        }
    }

    pub fn config(&self) -> &GradientDescentConfig {
        &self.config
    }

    /// Add an observer, notified after every accepted step.
    pub fn add_observer(&mut self, observer: impl OptObserver<G> + 'static) {
        self.observers.add(observer);
    }

    /// Handle that cancels a running [`GradientDescent::optimize`] from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Descend from `initial` until a termination criterion fires.
    ///
    /// # Errors
    /// `OptimizerError::InvalidParameters` for a bad configuration, `EmptyProblem` for an empty
    /// collection, `NonFiniteCost` if the loss at `initial` is not finite, and any error the
    /// objective reports.
    pub fn optimize(
        &mut self,
        objective: &dyn Objective<G>,
        initial: &Values<G>,
    ) -> PoseFusionResult<SolverResult<G>> {
        validate_learning_rate(self.config.learning_rate)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            self.config.print_configuration();
        }

        let run = DescentRun {
            name: "Gradient Descent",
            criteria: self.config.criteria(),
            observers: &self.observers,
            stop: &self.stop,
            verbose: self.config.verbose,
        };

        run.run(
            objective,
            initial,
            &mut FixedRate(self.config.learning_rate),
        )
    }
}

/// `step = −learning_rate · gradient`, with nothing carried between steps.
struct FixedRate(f64);

impl<G: LieGroup> StepRule<G> for FixedRate {
    type Pending = ();

    fn propose(
        &self,
        values: &mut Values<G>,
        gradient: &TangentValues<G>,
    ) -> OptimizerResult<Proposal<()>> {
        let step = gradient.scaled(-self.0);
        values.move_along(&step)?;
        Ok(Proposal {
            step_norm: step.norm(),
            learning_rate: self.0,
            pending: (),
        })
    }

    fn accept(&mut self, _pending: ()) {}
}

impl<G: LieGroup> crate::optimizer::Solver<G> for GradientDescent<G> {
    type Config = GradientDescentConfig;

    fn with_config(config: GradientDescentConfig) -> Self {
        GradientDescent::with_config(config)
    }

    fn optimize(
        &mut self,
        objective: &dyn Objective<G>,
        initial: &Values<G>,
    ) -> PoseFusionResult<SolverResult<G>> {
        GradientDescent::optimize(self, objective, initial)
    }
}
