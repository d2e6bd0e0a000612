//! Lie-group manifolds that estimated states live on.
//!
//! Every unknown in a factor graph is an element of a Lie group: a 2D pose, a 3D pose, or a
//! bare rotation. The optimizer never edits group elements field by field. It computes a step
//! in the tangent space and pushes it back onto the manifold through [`LieGroup::retract`].
//!
//! Lie group M,° | size   | dim | X ∈ M          | Constraint | T_X M        | Exp(τ)        | Comp.
//! ------------- | ------ | --- | -------------- | ---------- | ------------ | ------------- | -----
//! Rotation      | SO(2),.| 1   | z ∈ C          | z*z = 1    | θ ∈ R        | z = exp(iθ)   | z₁z₂
//! Rotation      | SO(3),.| 3   | q ∈ H          | q*q = 1    | θ ∈ R³       | q = exp(uθ/2) | q₁q₂
//! Rigid motion  | SE(2),.| 3   | M = [R t; 0 1] | RᵀR = I    | [x, y, θ]    | Exp([v̂])      | M₁M₂
//! Rigid motion  | SE(3),.| 6   | M = [R t; 0 1] | RᵀR = I    | [ρ, θ] ∈ R⁶  | Exp([v̂])      | M₁M₂
//!
//! Conventions follow [manif](https://github.com/artivis/manif):
//! - perturbations are applied on the right, `X ⊕ τ = X ∘ Exp(τ)`;
//! - tangent vectors list translational components before rotational ones;
//! - every operation can write its analytic Jacobian into an optional out-parameter.
//!
//! Angles are never wrapped beyond what `atan2` of the underlying unit complex number or
//! quaternion yields, so a relative rotation of almost −π stays at almost −π.

use nalgebra::{DMatrix, DVector};
use std::ops::{Add, Index, Mul, Neg, Sub};
use std::{
    error, fmt,
    fmt::{Display, Formatter},
};

pub mod se2;
pub mod se3;
pub mod so2;
pub mod so3;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    InvalidTangentDimension { expected: usize, actual: usize },
}

impl Display for ManifoldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ManifoldError::InvalidTangentDimension { expected, actual } => {
                write!(
                    f,
                    "Invalid tangent dimension: expected {expected}, got {actual}"
                )
            }
        }
    }
}

impl error::Error for ManifoldError {}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Group operations shared by every state type the optimizer can estimate.
///
/// Jacobians are expressed with respect to right perturbations of the arguments, so the
/// Jacobian of `f` at `X` maps `τ` to `f(X ⊕ τ) ⊖ f(X)` to first order.
pub trait LieGroup: Clone + PartialEq + fmt::Debug {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// Square Jacobian matrix, DOF × DOF.
    type JacobianMatrix: Clone
        + PartialEq
        + fmt::Debug
        + Neg<Output = Self::JacobianMatrix>
        + Mul<Output = Self::JacobianMatrix>
        + Index<(usize, usize), Output = f64>;

    /// Matrix form of the Lie algebra (hat space).
    type LieAlgebra: Clone + PartialEq;

    /// Neutral element e with e ∘ g = g ∘ e = g.
    fn identity() -> Self;

    /// Compute the inverse g⁻¹.
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂(g⁻¹)/∂g, which is −Ad(g)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// Group multiplication g₁ ∘ g₂.
    ///
    /// # Arguments
    /// * `other` - The right operand
    /// * `jacobian_self` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₁, which is Ad(g₂⁻¹)
    /// * `jacobian_other` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₂, which is I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Logarithmic map, Log(g) ∈ T_e M.
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂Log(g)/∂g, which is Jr⁻¹(Log(g))
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector;

    /// Adjoint matrix Ad(g), with Ad(g) τ = Log(g ∘ Exp(τ) ∘ g⁻¹).
    ///
    /// Moves a tangent vector expressed at g into the tangent space at the identity.
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Random element, used by property tests and initialization.
    fn random() -> Self;

    /// DOF × DOF identity matrix.
    fn jacobian_identity() -> Self::JacobianMatrix;

    /// Project the element back onto the manifold (unit complex / unit quaternion).
    fn normalize(&mut self);

    /// Whether the element satisfies the manifold constraint within `tolerance`.
    fn is_valid(&self, tolerance: f64) -> bool;

    /// Whether `self ⊖ other` is approximately zero.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other, None, None).is_zero(tolerance)
    }

    /// Right plus: g ⊕ τ = g ∘ Exp(τ).
    ///
    /// # Notes
    /// J_g = Ad(Exp(τ))⁻¹, J_τ = Jr(τ)
    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let exp_tangent = tangent.exp(jacobian_tangent);
        self.compose(&exp_tangent, jacobian_self, None)
    }

    /// Right minus: g₁ ⊖ g₂ = Log(g₂⁻¹ ∘ g₁).
    ///
    /// # Notes
    /// J_g₁ = Jr⁻¹(τ), J_g₂ = −Jl⁻¹(τ)
    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        let result = other.inverse(None).compose(self, None, None).log(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = result.right_jacobian_inv();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = -result.left_jacobian_inv();
        }

        result
    }

    /// Convenience alias for [`LieGroup::right_plus`].
    fn plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        self.right_plus(tangent, jacobian_self, jacobian_tangent)
    }

    /// Convenience alias for [`LieGroup::right_minus`].
    fn minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        self.right_minus(other, jacobian_self, jacobian_other)
    }

    /// Relative transform g₁⁻¹ ∘ g₂.
    ///
    /// # Notes
    /// With d = g₁⁻¹ ∘ g₂: J_g₁ = −Ad(d⁻¹), J_g₂ = I
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = self.inverse(None).compose(other, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = -result.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Self::jacobian_identity();
        }

        result
    }

    /// Local coordinates of `other` around `self`: Log(self⁻¹ ∘ other).
    ///
    /// Zero when both elements coincide, and the inverse of [`LieGroup::retract`] at `self`.
    ///
    /// # Notes
    /// J_self = −Jl⁻¹(τ), J_other = Jr⁻¹(τ)
    fn local_coordinate(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        other.right_minus(self, jacobian_other, jacobian_self)
    }

    /// Apply a tangent perturbation and re-normalize the rotation part.
    ///
    /// This is the only way the optimizer mutates an estimate.
    fn retract(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let mut result = self.right_plus(tangent, jacobian_self, jacobian_tangent);
        result.normalize();
        result
    }

    /// Degrees of freedom of the tangent space.
    fn tangent_dim(&self) -> usize {
        Self::TangentVector::DIM
    }
}

/// Vectors of the tangent space (Lie algebra in vector form).
///
/// Tangent vectors form a vector space: they add, subtract and scale like plain arrays of
/// `DIM` reals, which is what gradients and optimizer steps need.
pub trait Tangent<Group: LieGroup>:
    Clone
    + PartialEq
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<f64, Output = Self>
{
    /// Dimension of the tangent space
    const DIM: usize;

    /// Exponential map Exp(τ).
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂Exp(τ)/∂τ, which is Jr(τ)
    fn exp(&self, jacobian: Option<&mut Group::JacobianMatrix>) -> Group;

    /// Right Jacobian Jr, with Exp(τ + δ) ≈ Exp(τ) ∘ Exp(Jr δ).
    fn right_jacobian(&self) -> Group::JacobianMatrix;

    /// Left Jacobian Jl, with Exp(τ + δ) ≈ Exp(Jl δ) ∘ Exp(τ).
    fn left_jacobian(&self) -> Group::JacobianMatrix;

    /// Inverse of the right Jacobian.
    fn right_jacobian_inv(&self) -> Group::JacobianMatrix;

    /// Inverse of the left Jacobian.
    fn left_jacobian_inv(&self) -> Group::JacobianMatrix;

    /// Hat operator τ^∧.
    fn hat(&self) -> Group::LieAlgebra;

    /// Zero tangent vector.
    fn zero() -> Self;

    /// Random tangent vector (useful for testing).
    fn random() -> Self;

    /// Sum of squared components.
    fn squared_norm(&self) -> f64;

    /// Euclidean norm of the components.
    fn norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Check if the tangent vector is approximately zero.
    fn is_zero(&self, tolerance: f64) -> bool {
        self.norm() < tolerance
    }

    /// Check if the tangent vector is approximately equal to another tangent vector.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.clone() - other.clone()).norm() < tolerance
    }

    /// Components as a dynamic vector, in storage order.
    fn to_dvector(&self) -> DVector<f64>;

    /// Build a tangent vector from exactly `DIM` components.
    fn from_slice(data: &[f64]) -> ManifoldResult<Self>;
}

/// Copy a fixed-size Jacobian into a dynamic matrix of the group's tangent dimension.
pub fn jacobian_to_dmatrix<G: LieGroup>(jacobian: &G::JacobianMatrix) -> DMatrix<f64> {
    let dim = G::TangentVector::DIM;
    DMatrix::from_fn(dim, dim, |row, col| jacobian[(row, col)])
}

/// Verify that a slice has the expected tangent dimension.
///
/// Non-finite components are accepted: gradients that blew up must still reach the optimizer,
/// which reports them as a numerical failure.
pub(crate) fn check_tangent_dim(expected: usize, data: &[f64]) -> ManifoldResult<()> {
    if data.len() != expected {
        return Err(ManifoldError::InvalidTangentDimension {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
