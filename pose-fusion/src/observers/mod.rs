//! Observer pattern for optimization monitoring.
//!
//! Observers are registered with an optimizer and notified after every accepted step with
//! the current estimates and the iteration number. They cannot modify the estimates.
//!
//! ```
//! use pose_fusion::core::values::Values;
//! use pose_fusion::manifold::se2::SE2;
//! use pose_fusion::observers::{OptObserver, OptObserverVec};
//!
//! struct PrintFirstPose;
//!
//! impl OptObserver<SE2> for PrintFirstPose {
//!     fn on_step(&self, values: &Values<SE2>, iteration: usize) {
//!         if let Some(pose) = values.iter().next() {
//!             println!("{iteration}: {pose}");
//!         }
//!     }
//! }
//!
//! let mut observers = OptObserverVec::new();
//! observers.add(PrintFirstPose);
//! observers.notify(&Values::<SE2>::new(), 0);
//! ```

use crate::core::values::Values;
use crate::manifold::LieGroup;

/// Hook called by the optimizers after each accepted step.
///
/// Observers must be `Send`; use interior mutability (`Mutex`, atomics) to keep state.
/// Errors inside an observer should be handled there and never abort the optimization.
pub trait OptObserver<G: LieGroup>: Send {
    /// Called after each accepted step.
    ///
    /// # Arguments
    ///
    /// * `values` - Estimates after the step
    /// * `iteration` - Number of steps applied so far, starting at 1
    fn on_step(&self, values: &Values<G>, iteration: usize);

    /// Metrics of the step, delivered right before [`OptObserver::on_step`].
    ///
    /// The default implementation ignores them.
    fn set_iteration_metrics(&self, _cost: f64, _gradient_norm: f64, _step_norm: f64) {}
}

/// Ordered collection of observers, notified in registration order.
pub struct OptObserverVec<G: LieGroup> {
    observers: Vec<Box<dyn OptObserver<G>>>,
}

impl<G: LieGroup> Default for OptObserverVec<G> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
        }
    }
}

impl<G: LieGroup> OptObserverVec<G> {
    /// Create a new empty observer collection.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: impl OptObserver<G> + 'static) {
        self.observers.push(Box::new(observer));
    }

    #[inline]
    pub fn set_iteration_metrics(&self, cost: f64, gradient_norm: f64, step_norm: f64) {
        for observer in &self.observers {
            observer.set_iteration_metrics(cost, gradient_norm, step_norm);
        }
    }

    /// Call [`OptObserver::on_step`] on every observer. A no-op when empty.
    #[inline]
    pub fn notify(&self, values: &Values<G>, iteration: usize) {
        for observer in &self.observers {
            observer.on_step(values, iteration);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }
}
