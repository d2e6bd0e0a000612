use super::{Factor, FactorError, FactorResult, lookup};
use crate::core::{
    CoreResult,
    jacobian_factor::{JacobianFactor, LinearFactor},
    values::{Values, VariableId},
};
use crate::manifold::{LieGroup, Tangent, jacobian_to_dmatrix, se2::SE2, se3::SE3};
use nalgebra::DVector;

/// Relative-pose constraint between two variables.
///
/// Holds two edges and the measured relative transform `difference`. The error is the
/// tangent vector that explains the gap between the measurement and the relative transform
/// implied by the current estimates:
///
/// ```text
/// d = x₁⁻¹ ∘ x₂
/// e = local_coordinate(difference, d) = Log(difference⁻¹ ∘ d)
/// ```
///
/// The error is zero exactly when the estimates reproduce the measurement. Jacobians are
/// analytic, with `∂e/∂x₁ = −Jr⁻¹(e)·Ad(d⁻¹)` and `∂e/∂x₂ = Jr⁻¹(e)`.
///
/// # Residual Dimensions by Manifold Type
///
/// - **SE(2)**: 3D residual `[dx, dy, dθ]`
/// - **SE(3)**: 6D residual `[ρ_x, ρ_y, ρ_z, θ_x, θ_y, θ_z]`
/// - **SO(2)** / **SO(3)**: rotation-only residuals of dimension 1 / 3
///
/// # Example
///
/// ```
/// use pose_fusion::core::values::Values;
/// use pose_fusion::factors::{BetweenFactor, Factor};
/// use pose_fusion::manifold::se2::SE2;
///
/// let mut values = Values::new();
/// let x0 = values.insert(SE2::from_xy_angle(0.0, 0.0, 0.0));
/// let x1 = values.insert(SE2::from_xy_angle(2.0, 0.0, 0.0));
///
/// // Robot drove 2m forward.
/// let odometry = BetweenFactor::new(x0, x1, SE2::from_xy_angle(2.0, 0.0, 0.0));
/// assert!(odometry.error(&values).unwrap() < 1e-20);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenFactor<G: LieGroup> {
    edges: [VariableId<G>; 2],
    difference: G,
}

/// Between factor on 2D poses.
pub type BetweenFactor2 = BetweenFactor<SE2>;

/// Between factor on 3D poses.
pub type BetweenFactor3 = BetweenFactor<SE3>;

impl<G: LieGroup> BetweenFactor<G> {
    /// Create a factor measuring `difference ≈ from⁻¹ ∘ to`.
    ///
    /// # Errors
    /// [`FactorError::InvalidEdges`] when `from` and `to` are the same variable.
    pub fn try_new(from: VariableId<G>, to: VariableId<G>, difference: G) -> FactorResult<Self> {
        if from == to {
            return Err(FactorError::InvalidEdges(format!(
                "between factor connects {from} to itself"
            ))
            .log());
        }

        Ok(BetweenFactor {
            edges: [from, to],
            difference,
        })
    }

    /// Create a factor measuring `difference ≈ from⁻¹ ∘ to`.
    ///
    /// # Panics
    /// When `from == to`. A self-loop is a graph construction bug, not a runtime condition;
    /// use [`BetweenFactor::try_new`] to handle it as an error instead.
    pub fn new(from: VariableId<G>, to: VariableId<G>, difference: G) -> Self {
        match Self::try_new(from, to, difference) {
            Ok(factor) => factor,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn edges(&self) -> &[VariableId<G>; 2] {
        &self.edges
    }

    /// The measured relative transform.
    pub fn difference(&self) -> &G {
        &self.difference
    }

    /// Error for explicit estimates, with optional Jacobians with respect to each of them.
    pub fn error_vector_between(
        &self,
        x1: &G,
        x2: &G,
        jacobian_x1: Option<&mut G::JacobianMatrix>,
        jacobian_x2: Option<&mut G::JacobianMatrix>,
    ) -> G::TangentVector {
        let mut d_x1 = G::jacobian_identity();
        let mut d_x2 = G::jacobian_identity();
        let relative = x1.between(x2, Some(&mut d_x1), Some(&mut d_x2));

        let mut e_relative = G::jacobian_identity();
        let error = self
            .difference
            .local_coordinate(&relative, None, Some(&mut e_relative));

        if let Some(jac) = jacobian_x1 {
            *jac = e_relative.clone() * d_x1;
        }
        if let Some(jac) = jacobian_x2 {
            *jac = e_relative * d_x2;
        }

        error
    }

    /// Linearize at the current estimates.
    pub fn linearized(&self, values: &Values<G>) -> CoreResult<JacobianFactor<2>> {
        let [from, to] = self.edges;
        let x1 = lookup(values, from)?;
        let x2 = lookup(values, to)?;

        let mut jac_x1 = G::jacobian_identity();
        let mut jac_x2 = G::jacobian_identity();
        let error = self.error_vector_between(x1, x2, Some(&mut jac_x1), Some(&mut jac_x2));

        let dim = G::TangentVector::DIM;
        JacobianFactor::new(
            [from.index(), to.index()],
            [
                jacobian_to_dmatrix::<G>(&jac_x1),
                jacobian_to_dmatrix::<G>(&jac_x2),
            ],
            error.to_dvector(),
            [dim, dim],
        )
    }
}

impl<G: LieGroup + Send + Sync> Factor<G> for BetweenFactor<G> {
    fn keys(&self) -> &[VariableId<G>] {
        &self.edges
    }

    fn residual_dimension(&self) -> usize {
        G::TangentVector::DIM
    }

    fn error_vector(&self, values: &Values<G>) -> CoreResult<DVector<f64>> {
        let [from, to] = self.edges;
        let x1 = lookup(values, from)?;
        let x2 = lookup(values, to)?;
        Ok(self.error_vector_between(x1, x2, None, None).to_dvector())
    }

    fn linearize(&self, values: &Values<G>) -> CoreResult<Box<dyn LinearFactor>> {
        Ok(Box::new(self.linearized(values)?))
    }
}
