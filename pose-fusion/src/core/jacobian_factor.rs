//! Linearization records.
//!
//! A [`JacobianFactor`] is the first-order Taylor expansion of a factor's error at one
//! estimate: for small tangent perturbations δᵢ of the touched variables,
//!
//! ```text
//! error_vector(x ⊕ δ) ≈ residual + Σᵢ Jᵢ δᵢ
//! ```
//!
//! It holds one Jacobian block per edge. Block `i` has `residual.len()` rows and as many
//! columns as the tangent dimension of edge `i`. Records are immutable and valid only at
//! their linearization point, so optimizers build new ones every iteration.
//!
//! Jacobians and gradients point towards increasing error; descent steps use their negation.

use crate::core::{CoreError, CoreResult};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Per-edge Jacobian blocks and the residual of an `N`-ary factor at a linearization point.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor<const N: usize> {
    edges: [usize; N],
    jacobians: [DMatrix<f64>; N],
    residual: DVector<f64>,
}

impl<const N: usize> JacobianFactor<N> {
    /// Build a record, validating every block shape.
    ///
    /// # Arguments
    /// * `edges` - Positions of the touched variables in the estimate collection
    /// * `jacobians` - One block per edge, ∂error/∂δᵢ
    /// * `residual` - The error vector at the linearization point
    /// * `tangent_dims` - Tangent dimension of each edge's variable
    pub fn new(
        edges: [usize; N],
        jacobians: [DMatrix<f64>; N],
        residual: DVector<f64>,
        tangent_dims: [usize; N],
    ) -> CoreResult<Self> {
        for (i, (block, &cols)) in jacobians.iter().zip(tangent_dims.iter()).enumerate() {
            if block.nrows() != residual.len() || block.ncols() != cols {
                return Err(CoreError::DimensionMismatch(format!(
                    "Jacobian block {i} is {}x{}, expected {}x{cols}",
                    block.nrows(),
                    block.ncols(),
                    residual.len()
                ))
                .log());
            }
        }

        Ok(JacobianFactor {
            edges,
            jacobians,
            residual,
        })
    }

    /// Typed view of the edges, in declaration order.
    pub fn edge_array(&self) -> &[usize; N] {
        &self.edges
    }

    /// Typed view of the Jacobian blocks.
    pub fn jacobian_array(&self) -> &[DMatrix<f64>; N] {
        &self.jacobians
    }
}

/// Object-safe view of a [`JacobianFactor`] of any arity.
pub trait LinearFactor: fmt::Debug + Send + Sync {
    /// Positions of the touched variables, in declaration order.
    fn edges(&self) -> &[usize];

    /// One Jacobian block per edge.
    fn jacobians(&self) -> &[DMatrix<f64>];

    /// Error vector at the linearization point.
    fn residual(&self) -> &DVector<f64>;

    /// Number of rows of the residual and of every block.
    fn residual_dimension(&self) -> usize {
        self.residual().len()
    }

    /// The linear model `residual + Σᵢ Jᵢ δᵢ`.
    ///
    /// # Errors
    /// `CoreError::DimensionMismatch` if `delta` has the wrong arity or a block the wrong length.
    fn error_vector(&self, delta: &[DVector<f64>]) -> CoreResult<DVector<f64>> {
        let jacobians = self.jacobians();
        if delta.len() != jacobians.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} perturbations for {} edges",
                delta.len(),
                jacobians.len()
            ))
            .log());
        }

        let mut error = self.residual().clone();
        for (jacobian, step) in jacobians.iter().zip(delta) {
            if jacobian.ncols() != step.len() {
                return Err(CoreError::DimensionMismatch(format!(
                    "perturbation of length {}, block has {} columns",
                    step.len(),
                    jacobian.ncols()
                ))
                .log());
            }
            error += jacobian * step;
        }
        Ok(error)
    }

    /// Squared norm of [`LinearFactor::error_vector`].
    fn error(&self, delta: &[DVector<f64>]) -> CoreResult<f64> {
        Ok(self.error_vector(delta)?.norm_squared())
    }

    /// Gradient of `‖residual‖²` with respect to each edge: `2 Jᵢᵀ r`.
    fn gradient_contributions(&self) -> Vec<DVector<f64>> {
        self.jacobians()
            .iter()
            .map(|jacobian| 2.0 * jacobian.transpose() * self.residual())
            .collect()
    }
}

impl<const N: usize> LinearFactor for JacobianFactor<N> {
    fn edges(&self) -> &[usize] {
        &self.edges
    }

    fn jacobians(&self) -> &[DMatrix<f64>] {
        &self.jacobians
    }

    fn residual(&self) -> &DVector<f64> {
        &self.residual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn binary_factor() -> JacobianFactor<2> {
        JacobianFactor::new(
            [0, 3],
            [
                DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]),
                DMatrix::from_row_slice(2, 1, &[-1.0, 1.0]),
            ],
            DVector::from_vec(vec![0.5, -0.5]),
            [2, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_block_shapes() {
        let bad_rows = JacobianFactor::new(
            [0],
            [DMatrix::zeros(3, 3)],
            DVector::zeros(2),
            [3],
        );
        assert!(matches!(bad_rows, Err(CoreError::DimensionMismatch(_))));

        let bad_cols = JacobianFactor::new(
            [0],
            [DMatrix::zeros(2, 3)],
            DVector::zeros(2),
            [6],
        );
        assert!(bad_cols.is_err());
    }

    #[test]
    fn test_accessors() {
        let factor = binary_factor();
        assert_eq!(factor.edges(), &[0, 3]);
        assert_eq!(factor.edge_array(), &[0, 3]);
        assert_eq!(factor.residual_dimension(), 2);
        assert_eq!(factor.jacobians()[1].ncols(), 1);
    }

    #[test]
    fn test_error_vector_is_linear_model() {
        let factor = binary_factor();

        let at_point = factor
            .error_vector(&[DVector::zeros(2), DVector::zeros(1)])
            .unwrap();
        assert_eq!(&at_point, factor.residual());

        let moved = factor
            .error_vector(&[
                DVector::from_vec(vec![1.0, 1.0]),
                DVector::from_vec(vec![2.0]),
            ])
            .unwrap();
        // [0.5 + 1 - 2, -0.5 + 2 + 2]
        assert!((moved[0] - (-0.5)).abs() < TOLERANCE);
        assert!((moved[1] - 3.5).abs() < TOLERANCE);

        let error = factor
            .error(&[DVector::from_vec(vec![1.0, 1.0]), DVector::from_vec(vec![2.0])])
            .unwrap();
        assert!((error - 12.5).abs() < TOLERANCE);
    }

    #[test]
    fn test_error_vector_rejects_bad_perturbations() {
        let factor = binary_factor();
        assert!(factor.error_vector(&[DVector::zeros(2)]).is_err());
        assert!(
            factor
                .error_vector(&[DVector::zeros(3), DVector::zeros(1)])
                .is_err()
        );
    }

    #[test]
    fn test_gradient_contributions_point_uphill() {
        let factor = binary_factor();
        let gradients = factor.gradient_contributions();

        assert_eq!(gradients.len(), 2);
        assert!((gradients[0][0] - 1.0).abs() < TOLERANCE);
        assert!((gradients[0][1] - (-2.0)).abs() < TOLERANCE);
        assert!((gradients[1][0] - (-2.0)).abs() < TOLERANCE);

        // A small step against the gradient lowers the error.
        let step: Vec<DVector<f64>> = gradients.iter().map(|g| -0.01 * g).collect();
        let before = factor.error(&[DVector::zeros(2), DVector::zeros(1)]).unwrap();
        let after = factor.error(&step).unwrap();
        assert!(after < before);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let factors: Vec<Box<dyn LinearFactor>> = vec![
            Box::new(binary_factor()),
            Box::new(
                JacobianFactor::new([1], [DMatrix::identity(1, 1)], DVector::zeros(1), [1])
                    .unwrap(),
            ),
        ];
        let total_edges: usize = factors.iter().map(|f| f.edges().len()).sum();
        assert_eq!(total_edges, 3);
    }
}
