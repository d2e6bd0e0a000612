//! A factor graph: the sum of its factors' squared errors.
//!
//! The total loss is `Σ ‖eᵢ(x)‖²` over all factors. Its gradient with respect to a right
//! perturbation of each variable is assembled from the factors' linearizations by summing
//! `2 Jᵢᵀ rᵢ` into the slots of the variables each factor touches.

use crate::core::{
    CoreError, CoreResult,
    jacobian_factor::LinearFactor,
    values::{TangentValues, Values},
};
use crate::factors::Factor;
use crate::manifold::{LieGroup, Tangent};
use crate::optimizer::{Objective, OptimizerResult};
use nalgebra::DVector;

/// Owned collection of factors over variables of one group.
///
/// ```
/// use pose_fusion::core::graph::FactorGraph;
/// use pose_fusion::core::values::Values;
/// use pose_fusion::factors::BetweenFactor;
/// use pose_fusion::manifold::se2::SE2;
///
/// let mut values = Values::new();
/// let x0 = values.insert(SE2::from_xy_angle(0.0, 0.0, 0.0));
/// let x1 = values.insert(SE2::from_xy_angle(1.0, 0.0, 0.0));
///
/// let mut graph = FactorGraph::new();
/// graph.add_factor(BetweenFactor::new(x0, x1, SE2::from_xy_angle(1.0, 0.0, 0.0)));
/// assert!(graph.error(&values).unwrap() < 1e-12);
/// ```
pub struct FactorGraph<G: LieGroup> {
    factors: Vec<Box<dyn Factor<G>>>,
}

impl<G: LieGroup> Default for FactorGraph<G> {
    fn default() -> Self {
        FactorGraph {
            factors: Vec::new(),
        }
    }
}

impl<G: LieGroup> std::fmt::Debug for FactorGraph<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorGraph")
            .field("factors", &self.factors.len())
            .finish()
    }
}

impl<G: LieGroup> FactorGraph<G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_factor(&mut self, factor: impl Factor<G> + 'static) {
        self.factors.push(Box::new(factor));
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn factors(&self) -> &[Box<dyn Factor<G>>] {
        &self.factors
    }

    /// Sum of the squared errors of all factors.
    pub fn error(&self, values: &Values<G>) -> CoreResult<f64> {
        self.factors
            .iter()
            .map(|factor| factor.error(values))
            .sum()
    }

    /// One linearization record per factor, in insertion order.
    pub fn linearize(&self, values: &Values<G>) -> CoreResult<Vec<Box<dyn LinearFactor>>> {
        self.factors
            .iter()
            .map(|factor| factor.linearize(values))
            .collect()
    }

    /// Gradient of [`FactorGraph::error`] in the tangent space of every variable.
    ///
    /// Variables no factor touches get a zero gradient.
    pub fn gradient(&self, values: &Values<G>) -> CoreResult<TangentValues<G>> {
        Ok(self.error_and_gradient(values)?.1)
    }

    fn error_and_gradient(&self, values: &Values<G>) -> CoreResult<(f64, TangentValues<G>)> {
        let dim = G::TangentVector::DIM;
        let mut error = 0.0;
        let mut gradient = DVector::zeros(values.tangent_dim());

        for linear in self.linearize(values)? {
            error += linear.residual().norm_squared();
            for (&edge, contribution) in linear.edges().iter().zip(linear.gradient_contributions())
            {
                if edge >= values.len() || contribution.len() != dim {
                    return Err(CoreError::FactorLinearization(format!(
                        "block for x{edge} has {} rows, collection holds {} values of dimension {dim}",
                        contribution.len(),
                        values.len()
                    ))
                    .log());
                }
                let mut slot = gradient.rows_mut(edge * dim, dim);
                slot += contribution;
            }
        }

        Ok((error, TangentValues::from_dvector(&gradient)?))
    }
}

impl<G: LieGroup> Objective<G> for FactorGraph<G> {
    fn value_with_gradient(&self, values: &Values<G>) -> OptimizerResult<(f64, TangentValues<G>)> {
        Ok(self.error_and_gradient(values)?)
    }

    fn value(&self, values: &Values<G>) -> OptimizerResult<f64> {
        Ok(self.error(values)?)
    }
}
