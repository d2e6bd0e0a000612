//! SO(2), planar rotations.
//!
//! Elements are stored as a unit complex number and the tangent space is a single angle.
//! SO(2) is abelian, so its adjoint and all of its Jacobians are the 1×1 identity.

use crate::manifold::{LieGroup, ManifoldResult, Tangent, check_tangent_dim};
use nalgebra::{DVector, Matrix1, Matrix2, UnitComplex};
use std::ops::{Add, Mul, Neg, Sub};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// Planar rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO2 {
    complex: UnitComplex<f64>,
}

impl Display for SO2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SO2(angle: {:.4})", self.angle())
    }
}

impl From<DVector<f64>> for SO2 {
    fn from(data: DVector<f64>) -> Self {
        SO2::from_angle(data[0])
    }
}

impl From<SO2> for DVector<f64> {
    fn from(so2: SO2) -> Self {
        DVector::from_vec(vec![so2.angle()])
    }
}

impl SO2 {
    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 1;

    /// Wrap a unit complex number.
    pub fn new(complex: UnitComplex<f64>) -> Self {
        SO2 { complex }
    }

    /// Rotation by `angle` radians.
    pub fn from_angle(angle: f64) -> Self {
        SO2::new(UnitComplex::from_angle(angle))
    }

    /// The underlying unit complex number.
    pub fn complex(&self) -> UnitComplex<f64> {
        self.complex
    }

    /// Rotation angle in (−π, π].
    pub fn angle(&self) -> f64 {
        self.complex.angle()
    }

    /// 2×2 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.complex.to_rotation_matrix().into_inner()
    }
}

impl LieGroup for SO2 {
    type TangentVector = SO2Tangent;
    type JacobianMatrix = Matrix1<f64>;
    type LieAlgebra = Matrix2<f64>;

    fn identity() -> Self {
        SO2::new(UnitComplex::identity())
    }

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SO2::new(self.complex.inverse())
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix1::identity();
        }
        SO2::new(self.complex * other.complex)
    }

    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        if let Some(jac) = jacobian {
            *jac = Matrix1::identity();
        }
        SO2Tangent::new(self.angle())
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SO2::from_angle(rng.random_range(-std::f64::consts::PI..std::f64::consts::PI))
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn normalize(&mut self) {
        self.complex.renormalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.complex.norm() - 1.0).abs() < tolerance
    }
}

/// Tangent of SO(2): a rotation angle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO2Tangent {
    data: f64,
}

impl Display for SO2Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "so2(angle: {:.4})", self.data)
    }
}

impl SO2Tangent {
    pub fn new(angle: f64) -> Self {
        SO2Tangent { data: angle }
    }

    pub fn angle(&self) -> f64 {
        self.data
    }
}

impl Add for SO2Tangent {
    type Output = SO2Tangent;

    fn add(self, rhs: SO2Tangent) -> SO2Tangent {
        SO2Tangent::new(self.data + rhs.data)
    }
}

impl Sub for SO2Tangent {
    type Output = SO2Tangent;

    fn sub(self, rhs: SO2Tangent) -> SO2Tangent {
        SO2Tangent::new(self.data - rhs.data)
    }
}

impl Neg for SO2Tangent {
    type Output = SO2Tangent;

    fn neg(self) -> SO2Tangent {
        SO2Tangent::new(-self.data)
    }
}

impl Mul<f64> for SO2Tangent {
    type Output = SO2Tangent;

    fn mul(self, scale: f64) -> SO2Tangent {
        SO2Tangent::new(self.data * scale)
    }
}

impl Tangent<SO2> for SO2Tangent {
    const DIM: usize = 1;

    fn exp(&self, jacobian: Option<&mut Matrix1<f64>>) -> SO2 {
        if let Some(jac) = jacobian {
            *jac = Matrix1::identity();
        }
        SO2::new(UnitComplex::new(self.data))
    }

    fn right_jacobian(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn left_jacobian(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn right_jacobian_inv(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn left_jacobian_inv(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn hat(&self) -> Matrix2<f64> {
        Matrix2::new(0.0, -self.data, self.data, 0.0)
    }

    fn zero() -> Self {
        SO2Tangent::new(0.0)
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SO2Tangent::new(rng.random_range(-std::f64::consts::PI..std::f64::consts::PI))
    }

    fn squared_norm(&self) -> f64 {
        self.data * self.data
    }

    fn to_dvector(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.data])
    }

    fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_tangent_dim(Self::DIM, data)?;
        Ok(SO2Tangent::new(data[0]))
    }
}
