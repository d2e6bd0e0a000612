//! Factors: residual functions over a fixed set of manifold variables.
//!
//! A factor ties a few variables of a [`Values`] collection to an observation and produces an
//! error vector in tangent coordinates. It never owns or mutates the variables it reads.
//!
//! # Available factors
//!
//! - [`BetweenFactor`]: relative-pose measurement between two variables
//! - [`PriorFactor`]: absolute measurement on one variable, used to fix gauge freedom
//!
//! Both compute their Jacobians analytically from the manifold layer's Jacobians, so
//! linearization needs no differentiation engine.

use crate::core::{CoreResult, jacobian_factor::LinearFactor, values::Values, values::VariableId};
use crate::manifold::LieGroup;
use nalgebra::DVector;
use thiserror::Error;
use tracing::error;

pub mod between_factor;
pub mod prior_factor;

pub use between_factor::{BetweenFactor, BetweenFactor2, BetweenFactor3};
pub use prior_factor::PriorFactor;

/// Factor-specific error types
#[derive(Debug, Clone, Error)]
pub enum FactorError {
    /// An edge points past the end of the estimate collection
    #[error("Missing variable x{index} (collection holds {len} values)")]
    MissingVariable { index: usize, len: usize },

    /// Edges do not describe a valid binding, e.g. both ends of a pairwise factor coincide
    #[error("Invalid edges: {0}")]
    InvalidEdges(String),
}

impl FactorError {
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

/// Result type for factor operations
pub type FactorResult<T> = Result<T, FactorError>;

/// Look up a variable, reporting a missing one as [`FactorError::MissingVariable`].
pub(crate) fn lookup<G: LieGroup>(values: &Values<G>, id: VariableId<G>) -> FactorResult<&G> {
    values.get(id).ok_or_else(|| {
        FactorError::MissingVariable {
            index: id.index(),
            len: values.len(),
        }
        .log()
    })
}

/// A residual function over a fixed set of variables.
///
/// # Implementing a factor
///
/// ```
/// use pose_fusion::core::CoreResult;
/// use pose_fusion::core::jacobian_factor::{JacobianFactor, LinearFactor};
/// use pose_fusion::core::values::{Values, VariableId};
/// use pose_fusion::factors::Factor;
/// use pose_fusion::manifold::{LieGroup, Tangent, se2::SE2};
/// use nalgebra::{DMatrix, DVector};
///
/// /// Pulls the translation of one pose towards the origin.
/// struct OriginFactor {
///     keys: [VariableId<SE2>; 1],
/// }
///
/// impl Factor<SE2> for OriginFactor {
///     fn keys(&self) -> &[VariableId<SE2>] {
///         &self.keys
///     }
///
///     fn residual_dimension(&self) -> usize {
///         2
///     }
///
///     fn error_vector(&self, values: &Values<SE2>) -> CoreResult<DVector<f64>> {
///         let pose = &values[self.keys[0]];
///         Ok(DVector::from_vec(vec![pose.x(), pose.y()]))
///     }
///
///     fn linearize(&self, values: &Values<SE2>) -> CoreResult<Box<dyn LinearFactor>> {
///         let pose = &values[self.keys[0]];
///         let rotation = pose.rotation_matrix();
///         let mut jacobian = DMatrix::zeros(2, 3);
///         jacobian.view_mut((0, 0), (2, 2)).copy_from(&rotation);
///         Ok(Box::new(JacobianFactor::new(
///             [self.keys[0].index()],
///             [jacobian],
///             self.error_vector(values)?,
///             [3],
///         )?))
///     }
/// }
///
/// let mut values = Values::new();
/// let x0 = values.insert(SE2::from_xy_angle(3.0, 4.0, 0.0));
/// let factor = OriginFactor { keys: [x0] };
/// assert_eq!(factor.error(&values).unwrap(), 25.0);
/// ```
pub trait Factor<G: LieGroup>: Send + Sync {
    /// Variables this factor reads, in Jacobian block order.
    fn keys(&self) -> &[VariableId<G>];

    /// Length of the error vector.
    fn residual_dimension(&self) -> usize;

    /// Tangent-space discrepancy between the measurement and the current estimates.
    fn error_vector(&self, values: &Values<G>) -> CoreResult<DVector<f64>>;

    /// Squared norm of [`Factor::error_vector`].
    fn error(&self, values: &Values<G>) -> CoreResult<f64> {
        Ok(self.error_vector(values)?.norm_squared())
    }

    /// Residual and per-edge Jacobian blocks at the current estimates.
    fn linearize(&self, values: &Values<G>) -> CoreResult<Box<dyn LinearFactor>>;
}
