//! Error types for the pose-fusion library
//!
//! `PoseFusionError` is the error returned by the public solver API. Module errors
//! (`CoreError`, `FactorError`, `OptimizerError`, ...) are wrapped transparently, so their
//! sources stay inspectable.
//!
//! Example error chain:
//! ```text
//! PoseFusionError::Optimizer(
//!     OptimizerError::Objective(
//!         CoreError::Factor(FactorError::MissingVariable { index: 4, len: 3 })
//!     )
//! )
//! ```

use crate::{
    core::CoreError, factors::FactorError, manifold::ManifoldError, optimizer::OptimizerError,
};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the pose-fusion library
pub type PoseFusionResult<T> = Result<T, PoseFusionError>;

/// Main error type for the pose-fusion library
///
/// ```rust,ignore
/// if let Err(e) = solver.optimize(&graph, &initial) {
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum PoseFusionError {
    /// Estimate collection and linearization errors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Optimization algorithm errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Manifold operation errors
    #[error(transparent)]
    Manifold(#[from] ManifoldError),

    /// Factor construction and evaluation errors
    #[error(transparent)]
    Factor(#[from] FactorError),
}

impl PoseFusionError {
    /// Full error chain, one error per line, from this error down to the root cause.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Same as [`PoseFusionError::chain`] on a single line.
    ///
    /// ```rust,ignore
    /// error!("Optimization failed: {}", err.chain_compact());
    /// // "Objective evaluation failed → Missing variable x4 (collection holds 3 values)"
    /// ```
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_fusion_error_display() {
        let error = PoseFusionError::from(OptimizerError::EmptyProblem);
        assert!(error.to_string().contains("no variables"));
    }

    #[test]
    fn test_pose_fusion_error_chain() {
        let missing = FactorError::MissingVariable { index: 4, len: 3 };
        let error = PoseFusionError::from(OptimizerError::Objective(CoreError::from(missing)));

        let chain = error.chain();
        assert!(chain.starts_with("Objective evaluation failed"));
        assert!(chain.contains("Missing variable x4"));
        assert_eq!(chain.lines().count(), 2);
    }

    #[test]
    fn test_pose_fusion_error_chain_compact() {
        let error = PoseFusionError::from(OptimizerError::Objective(
            CoreError::DimensionMismatch("x7 was never inserted".to_string()),
        ));

        let chain_compact = error.chain_compact();
        assert!(chain_compact.contains(" → "));
        assert!(chain_compact.contains("x7 was never inserted"));
    }

    #[test]
    fn test_pose_fusion_result_err() {
        let result: PoseFusionResult<i32> = Err(PoseFusionError::from(FactorError::InvalidEdges(
            "x1 to x1".to_string(),
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_transparent_error_conversion() {
        let manifold_error = ManifoldError::InvalidTangentDimension {
            expected: 3,
            actual: 2,
        };

        let error: PoseFusionError = manifold_error.into();
        match error {
            PoseFusionError::Manifold(_) => { /* Expected */ }
            _ => panic!("Expected Manifold variant"),
        }
    }
}
