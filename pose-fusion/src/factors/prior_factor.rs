use super::{Factor, lookup};
use crate::core::{
    CoreResult,
    jacobian_factor::{JacobianFactor, LinearFactor},
    values::{Values, VariableId},
};
use crate::manifold::{LieGroup, Tangent, jacobian_to_dmatrix};
use nalgebra::DVector;

/// Unary factor pinning one variable to a known value.
///
/// A graph built only from relative measurements is invariant to a global transform; a
/// prior on one pose removes that freedom. The error is `local_coordinate(prior, x)` and its
/// Jacobian is `Jr⁻¹(e)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorFactor<G: LieGroup> {
    keys: [VariableId<G>; 1],
    prior: G,
}

impl<G: LieGroup> PriorFactor<G> {
    pub fn new(key: VariableId<G>, prior: G) -> Self {
        PriorFactor { keys: [key], prior }
    }

    pub fn prior(&self) -> &G {
        &self.prior
    }

    pub fn linearized(&self, values: &Values<G>) -> CoreResult<JacobianFactor<1>> {
        let x = lookup(values, self.keys[0])?;
        let mut jacobian = G::jacobian_identity();
        let error = self.prior.local_coordinate(x, None, Some(&mut jacobian));

        JacobianFactor::new(
            [self.keys[0].index()],
            [jacobian_to_dmatrix::<G>(&jacobian)],
            error.to_dvector(),
            [G::TangentVector::DIM],
        )
    }
}

impl<G: LieGroup + Send + Sync> Factor<G> for PriorFactor<G> {
    fn keys(&self) -> &[VariableId<G>] {
        &self.keys
    }

    fn residual_dimension(&self) -> usize {
        G::TangentVector::DIM
    }

    fn error_vector(&self, values: &Values<G>) -> CoreResult<DVector<f64>> {
        let x = lookup(values, self.keys[0])?;
        Ok(self.prior.local_coordinate(x, None, None).to_dvector())
    }

    fn linearize(&self, values: &Values<G>) -> CoreResult<Box<dyn LinearFactor>> {
        Ok(Box::new(self.linearized(values)?))
    }
}
