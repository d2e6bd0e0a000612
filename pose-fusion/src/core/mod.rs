//! Core building blocks of a factor graph.
//!
//! - [`values`]: the estimate collection and its typed variable indices
//! - [`jacobian_factor`]: linearization records produced fresh at every iteration
//! - [`graph`]: a sum of factors with analytic error and gradient

pub mod graph;
pub mod jacobian_factor;
pub mod values;

use crate::factors::FactorError;
use thiserror::Error;
use tracing::error;

/// Core module error types for estimate collections, linearization and graphs
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Dimension mismatch between residual/Jacobian/variables
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Factor linearization failed
    #[error("Factor linearization failed: {0}")]
    FactorLinearization(String),

    /// Invalid input parameter or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A factor could not read its variables
    #[error(transparent)]
    Factor(#[from] FactorError),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// values.retract(&step)
    ///     .map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the third-party error that caused it
    ///
    /// # Arguments
    /// * `source_error` - The original error from the third-party library (must implement Debug)
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
