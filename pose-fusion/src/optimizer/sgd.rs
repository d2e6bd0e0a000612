//! Stateful stochastic gradient descent with momentum.
//!
//! The update rule follows the Keras/TensorFlow `SGD` optimizer, applied per variable in its
//! own tangent space:
//!
//! ```text
//! t    = t + 1
//! lr_t = learning_rate / (1 + decay · t)
//! v    = momentum · v − lr_t · g
//! step = v                           (plain momentum)
//! step = momentum · v − lr_t · g     (Nesterov)
//! x    = retract(x, step)
//! ```
//!
//! `t` counts updates including the current one and `v` starts at zero. Both live in an
//! explicit [`SgdState`] owned by the optimizer, so one [`Sgd`] can be driven step by step
//! with [`Sgd::update`] or run to completion with [`Sgd::minimize`]. The state only changes
//! when a step is actually applied.
//!
//! Velocities are stored in the tangent space of the variable they belong to and are not
//! transported when the variable moves.

use crate::core::values::{TangentValues, Values};
use crate::error::PoseFusionResult;
use crate::manifold::LieGroup;
use crate::optimizer::{
    DescentRun, Objective, OptObserver, OptObserverVec, OptimizerError, OptimizerResult,
    Proposal, SolverResult, StepRule, StopHandle, TerminationCriteria, validate_learning_rate,
};
use tracing::debug;
use web_time as time;

/// Configuration parameters for SGD.
#[derive(Clone, Debug, PartialEq)]
pub struct SgdConfig {
    /// Number of updates [`Sgd::minimize`] applies
    ///
    /// Default: 1500
    pub max_iterations: usize,
    /// Initial learning rate
    ///
    /// Default: 0.01
    pub learning_rate: f64,
    /// Velocity retention factor in `[0, 1)`
    ///
    /// Default: 0.0 (no momentum)
    pub momentum: f64,
    /// Use Nesterov momentum
    ///
    /// Default: false
    pub nesterov: bool,
    /// Inverse-time learning-rate decay per update
    ///
    /// Default: 0.0 (constant rate)
    pub decay: f64,
    /// Stop when the gradient norm falls below this value
    ///
    /// Default: None (disabled)
    pub gradient_tolerance: Option<f64>,
    /// Stop when the relative cost change of a step falls below this value
    ///
    /// Default: None (disabled)
    pub cost_tolerance: Option<f64>,
    /// Stop once the cost falls below this value
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

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1500,
            learning_rate: 0.01,
            momentum: 0.0,
            nesterov: false,
            decay: 0.0,
            gradient_tolerance: None,
            cost_tolerance: None,
            min_cost_threshold: None,
            stall_window: None,
            timeout: None,
            verbose: false,
        }
    }
}

impl SgdConfig {
    /// Create a new SGD configuration with default values.
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

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
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

    /// Check the step-rule parameters.
    ///
    /// # Errors
    /// `OptimizerError::InvalidParameters` unless the learning rate is finite and positive,
    /// the momentum lies in `[0, 1)` and the decay is finite and non-negative.
    pub fn validate(&self) -> OptimizerResult<()> {
        validate_learning_rate(self.learning_rate)?;

        if !(0.0..1.0).contains(&self.momentum) {
            return Err(OptimizerError::InvalidParameters(format!(
                "momentum must lie in [0, 1), got {}",
                self.momentum
            ))
            .log());
        }

        if !(self.decay.is_finite() && self.decay >= 0.0) {
            return Err(OptimizerError::InvalidParameters(format!(
                "decay must be finite and non-negative, got {}",
                self.decay
            ))
            .log());
        }

        Ok(())
    }

    /// Print configuration parameters (debug level)
    pub fn print_configuration(&self) {
        debug!(
            "\nConfiguration:\n  Solver:        SGD\n  Learning rate: {:.2e}\n  Momentum:      {}\n  Nesterov:      {}\n  Decay:         {:.2e}\n  Convergence Criteria:\n  Max iterations:      {}\n  Gradient tolerance:  {:?}\n  Cost tolerance:      {:?}\n  Min cost threshold:  {:?}\n  Stall window:        {:?}\n  Timeout:             {:?}",
            self.learning_rate,
            self.momentum,
            if self.nesterov { "enabled" } else { "disabled" },
            self.decay,
            self.max_iterations,
            self.gradient_tolerance,
            self.cost_tolerance,
            self.min_cost_threshold,
            self.stall_window,
            self.timeout
        );
    }

    fn criteria(&self) -> TerminationCriteria {
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

/// Per-variable optimizer state carried between updates.
#[derive(Debug, Clone)]
pub struct SgdState<G: LieGroup> {
    velocities: Option<TangentValues<G>>,
    updates: usize,
}

impl<G: LieGroup> Default for SgdState<G> {
    fn default() -> Self {
        SgdState {
            velocities: None,
            updates: 0,
        }
    }
}

impl<G: LieGroup> SgdState<G> {
    /// Velocity of every variable, `None` before the first update.
    pub fn velocities(&self) -> Option<&TangentValues<G>> {
        self.velocities.as_ref()
    }

    /// Number of updates applied since creation or the last reset.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Learning rate of the next update.
    fn learning_rate(&self, config: &SgdConfig) -> f64 {
        config.learning_rate / (1.0 + config.decay * (self.updates + 1) as f64)
    }

    /// Move `values` by one update and return the step norm with the state that follows it.
    ///
    /// `values` is left untouched on error.
    fn advance(
        &self,
        config: &SgdConfig,
        values: &mut Values<G>,
        gradient: &TangentValues<G>,
    ) -> OptimizerResult<(f64, SgdState<G>)> {
        let descent = gradient.scaled(-self.learning_rate(config));

        let (step, velocities) = if config.momentum > 0.0 {
            let velocities = match &self.velocities {
                Some(previous) if previous.len() == gradient.len() => {
                    previous.scaled(config.momentum).add(&descent)?
                }
                _ => descent.clone(),
            };
            let step = if config.nesterov {
                velocities.scaled(config.momentum).add(&descent)?
            } else {
                velocities.clone()
            };
            (step, Some(velocities))
        } else {
            (descent, None)
        };

        values.move_along(&step)?;
        let next = SgdState {
            velocities,
            updates: self.updates + 1,
        };
        Ok((step.norm(), next))
    }
}

/// Borrowed view of an [`Sgd`] that [`DescentRun`] drives.
struct SgdStep<'a, G: LieGroup> {
    config: &'a SgdConfig,
    state: &'a mut SgdState<G>,
}

impl<G: LieGroup> StepRule<G> for SgdStep<'_, G> {
    type Pending = SgdState<G>;

    fn propose(
        &self,
        values: &mut Values<G>,
        gradient: &TangentValues<G>,
    ) -> OptimizerResult<Proposal<SgdState<G>>> {
        let learning_rate = self.state.learning_rate(self.config);
        let (step_norm, pending) = self.state.advance(self.config, values, gradient)?;
        Ok(Proposal {
            step_norm,
            learning_rate,
            pending,
        })
    }

    fn accept(&mut self, pending: SgdState<G>) {
        *self.state = pending;
    }
}

/// SGD solver with explicit momentum state.
///
/// ```
/// use pose_fusion::core::values::{TangentValues, Values};
/// use pose_fusion::manifold::se2::{SE2, SE2Tangent};
/// use pose_fusion::optimizer::{Sgd, SgdConfig};
///
/// let mut values: Values<SE2> = vec![SE2::from_xy_angle(1.0, 0.0, 0.0)].into();
/// let gradient = TangentValues::from_vec(vec![SE2Tangent::new(1.0, 0.0, 0.0)]);
///
/// let mut sgd = Sgd::new(SgdConfig::new().with_learning_rate(0.1).with_momentum(0.5));
/// sgd.update(&mut values, &gradient).unwrap();
/// sgd.update(&mut values, &gradient).unwrap();
///
/// // Steps of 0.1 and then 0.5 · 0.1 + 0.1.
/// assert!((values.as_slice()[0].x() - 0.75).abs() < 1e-12);
/// ```
pub struct Sgd<G: LieGroup> {
    config: SgdConfig,
    state: SgdState<G>,
    observers: OptObserverVec<G>,
    stop: StopHandle,
}

impl<G: LieGroup> Default for Sgd<G> {
    fn default() -> Self {
        Self::new(SgdConfig::default())
    }
}

impl<G: LieGroup> Sgd<G> {
    pub fn new(config: SgdConfig) -> Self {
        Self {
            config,
            state: SgdState::default(),
            observers: OptObserverVec::new(),
            stop: StopHandle::new(),
        }
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    pub fn state(&self) -> &SgdState<G> {
        &self.state
    }

    /// Forget velocities and restart the decay schedule.
    pub fn reset(&mut self) {
        self.state = SgdState::default();
    }

    /// Add an observer, notified after every accepted step of [`Sgd::minimize`].
    pub fn add_observer(&mut self, observer: impl OptObserver<G> + 'static) {
        self.observers.add(observer);
    }

    /// Handle that cancels a running [`Sgd::minimize`] from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Apply one update along the gradient `along` and return the norm of the step.
    ///
    /// All variables move together. Velocities kept from an earlier collection of a different
    /// length are discarded.
    ///
    /// # Errors
    /// `OptimizerError::InvalidParameters` for a bad configuration, and
    /// `OptimizerError::Objective` if `along` does not match `values` in length. Neither
    /// `values` nor the optimizer state changes on error.
    pub fn update(
        &mut self,
        values: &mut Values<G>,
        along: &TangentValues<G>,
    ) -> OptimizerResult<f64> {
        self.config.validate()?;
        let (step_norm, next) = self.state.advance(&self.config, values, along)?;
        self.state = next;
        Ok(step_norm)
    }

    /// Run updates from `initial` until a termination criterion fires.
    ///
    /// The state carries over from earlier calls; call [`Sgd::reset`] for a fresh start. A step
    /// rejected for a non-finite cost does not advance it.
    pub fn minimize(
        &mut self,
        objective: &dyn Objective<G>,
        initial: &Values<G>,
    ) -> PoseFusionResult<SolverResult<G>> {
        self.config.validate()?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            self.config.print_configuration();
        }

        let Sgd {
            config,
            state,
            observers,
            stop,
        } = self;

        let run = DescentRun {
            name: "SGD",
            criteria: config.criteria(),
            observers,
            stop,
            verbose: config.verbose,
        };

        run.run(objective, initial, &mut SgdStep { config, state })
    }
}

impl<G: LieGroup> crate::optimizer::Solver<G> for Sgd<G> {
    type Config = SgdConfig;

    fn with_config(config: SgdConfig) -> Self {
        Sgd::new(config)
    }

    fn optimize(
        &mut self,
        objective: &dyn Objective<G>,
        initial: &Values<G>,
    ) -> PoseFusionResult<SolverResult<G>> {
        self.minimize(objective, initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoseFusionError;
    use crate::manifold::Tangent;
    use crate::manifold::se2::{SE2, SE2Tangent};
    use crate::optimizer::{LossFunction, OptimizationStatus};

    const TOLERANCE: f64 = 1e-12;

    fn unit_gradient() -> TangentValues<SE2> {
        TangentValues::from_vec(vec![SE2Tangent::new(1.0, 0.0, 0.0)])
    }

    fn origin() -> Values<SE2> {
        vec![SE2::identity()].into()
    }

    #[test]
    fn test_default_config() {
        let config = SgdConfig::default();
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.momentum, 0.0);
        assert!(!config.nesterov);
        assert_eq!(config.decay, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(SgdConfig::new().with_learning_rate(0.0).validate().is_err());
        assert!(SgdConfig::new().with_momentum(1.0).validate().is_err());
        assert!(SgdConfig::new().with_momentum(-0.1).validate().is_err());
        assert!(SgdConfig::new().with_decay(-1.0).validate().is_err());
        assert!(SgdConfig::new().with_momentum(0.9).validate().is_ok());
    }

    #[test]
    fn test_plain_update() {
        let mut values = origin();
        let mut sgd = Sgd::new(SgdConfig::new().with_learning_rate(0.5));

        let norm = sgd.update(&mut values, &unit_gradient()).unwrap();
        assert!((norm - 0.5).abs() < TOLERANCE);
        assert!((values.as_slice()[0].x() + 0.5).abs() < TOLERANCE);
        assert!(sgd.state().velocities().is_none());
        assert_eq!(sgd.state().updates(), 1);
    }

    #[test]
    fn test_momentum_accumulates() {
        let mut values = origin();
        let mut sgd = Sgd::new(SgdConfig::new().with_learning_rate(1.0).with_momentum(0.5));

        // Steps: −1, −1.5, −1.75
        for _ in 0..3 {
            sgd.update(&mut values, &unit_gradient()).unwrap();
        }
        assert!((values.as_slice()[0].x() + 4.25).abs() < TOLERANCE);

        let velocity = &sgd.state().velocities().unwrap().as_slice()[0];
        assert!((velocity.x() + 1.75).abs() < TOLERANCE);
    }

    #[test]
    fn test_nesterov_looks_ahead() {
        let mut values = origin();
        let mut sgd = Sgd::new(
            SgdConfig::new()
                .with_learning_rate(1.0)
                .with_momentum(0.5)
                .with_nesterov(true),
        );

        // v1 = −1, step1 = 0.5·v1 − 1 = −1.5; v2 = −1.5, step2 = −1.75
        sgd.update(&mut values, &unit_gradient()).unwrap();
        assert!((values.as_slice()[0].x() + 1.5).abs() < TOLERANCE);
        sgd.update(&mut values, &unit_gradient()).unwrap();
        assert!((values.as_slice()[0].x() + 3.25).abs() < TOLERANCE);
    }

    #[test]
    fn test_decay_shrinks_rate() {
        let mut values = origin();
        let mut sgd = Sgd::new(SgdConfig::new().with_learning_rate(1.0).with_decay(1.0));

        // The count includes the current update: rates 1/2, 1/3, 1/4
        for _ in 0..3 {
            sgd.update(&mut values, &unit_gradient()).unwrap();
        }
        let expected = -(0.5 + 1.0 / 3.0 + 0.25);
        assert!((values.as_slice()[0].x() - expected).abs() < TOLERANCE);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut values = origin();
        let mut sgd = Sgd::new(SgdConfig::new().with_momentum(0.5));
        sgd.update(&mut values, &unit_gradient()).unwrap();
        assert!(sgd.state().velocities().is_some());

        sgd.reset();
        assert!(sgd.state().velocities().is_none());
        assert_eq!(sgd.state().updates(), 0);
    }

    #[test]
    fn test_update_rejects_length_mismatch() {
        let mut values: Values<SE2> = vec![SE2::identity(), SE2::identity()].into();
        let mut sgd = Sgd::new(SgdConfig::new());
        let err = sgd.update(&mut values, &unit_gradient()).unwrap_err();
        assert!(matches!(err, OptimizerError::Objective(_)));
        assert_eq!(sgd.state().updates(), 0);
    }

    #[test]
    fn test_failed_update_keeps_momentum() {
        let config = SgdConfig::new().with_learning_rate(1.0).with_momentum(0.5);
        let mismatched = TangentValues::from_vec(vec![SE2Tangent::zero(), SE2Tangent::zero()]);

        let mut values = origin();
        let mut sgd = Sgd::new(config.clone());
        sgd.update(&mut values, &unit_gradient()).unwrap();
        assert!(sgd.update(&mut values, &mismatched).is_err());
        assert_eq!(sgd.state().updates(), 1);
        assert_eq!(sgd.state().velocities().map(|v| v.len()), Some(1));
        assert!((values.as_slice()[0].x() + 1.0).abs() < TOLERANCE);
        sgd.update(&mut values, &unit_gradient()).unwrap();

        let mut reference_values = origin();
        let mut reference = Sgd::new(config);
        reference.update(&mut reference_values, &unit_gradient()).unwrap();
        reference.update(&mut reference_values, &unit_gradient()).unwrap();

        // Steps −1 and −1.5
        assert!((values.as_slice()[0].x() + 2.5).abs() < TOLERANCE);
        assert_eq!(values, reference_values);
        assert_eq!(sgd.state().updates(), 2);
    }

    #[test]
    fn test_rejected_step_keeps_state() {
        // The first step overshoots 1e200·x² into overflow.
        let loss = LossFunction::new(|poses: &[SE2]| 1e200 * poses[0].x().powi(2));
        let initial: Values<SE2> = vec![SE2::from_xy_angle(1.0, 0.0, 0.0)].into();

        let mut sgd = Sgd::new(
            SgdConfig::new()
                .with_learning_rate(1.0)
                .with_momentum(0.5)
                .with_decay(0.1),
        );
        let result = sgd.minimize(&loss, &initial).unwrap();

        assert_eq!(result.status, OptimizationStatus::NumericalFailure);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.values, initial);
        assert_eq!(sgd.state().updates(), 0);
        assert!(sgd.state().velocities().is_none());
    }

    #[test]
    fn test_minimize_quadratic() {
        let loss = LossFunction::new(|poses: &[SE2]| poses[0].x().powi(2) + poses[0].y().powi(2));
        let initial: Values<SE2> = vec![SE2::from_xy_angle(1.0, 1.0, 0.0)].into();

        let mut sgd = Sgd::new(
            SgdConfig::new()
                .with_learning_rate(0.1)
                .with_momentum(0.5)
                .with_max_iterations(200),
        );
        let result = sgd.minimize(&loss, &initial).unwrap();

        assert_eq!(result.status, OptimizationStatus::MaxIterationsReached);
        assert_eq!(result.iterations, 200);
        assert!(result.final_cost < 1e-12);
        assert_eq!(sgd.state().updates(), 200);
    }

    #[test]
    fn test_minimize_rejects_invalid_momentum() {
        let loss = LossFunction::new(|poses: &[SE2]| poses[0].x().powi(2));
        let mut sgd = Sgd::new(SgdConfig::new().with_momentum(1.5));
        let err = sgd.minimize(&loss, &origin()).unwrap_err();
        assert!(matches!(
            err,
            PoseFusionError::Optimizer(OptimizerError::InvalidParameters(_))
        ));
    }
}
