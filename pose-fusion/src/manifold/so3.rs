//! SO3 - Special Orthogonal Group in 3D
//!
//! SO(3) elements are stored as nalgebra `UnitQuaternion`s. Tangent elements are
//! axis-angle vectors in R³: the direction is the rotation axis and the magnitude the angle.
//!
//! SO(3) is the rotational block of [`crate::manifold::se3::SE3`], which reuses the
//! Jacobians defined here.

use crate::manifold::{LieGroup, ManifoldResult, Tangent, check_tangent_dim};
use nalgebra::{DVector, Matrix3, Quaternion, Unit, UnitQuaternion, Vector3};
use std::ops::{Add, Mul, Neg, Sub};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SO(3) group element representing rotations in 3D.
#[derive(Debug, Clone, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl Display for SO3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

impl SO3 {
    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 3;

    /// Representation size - size of the underlying data representation
    pub const REP_SIZE: usize = 4;

    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from quaternion coefficients, normalizing them.
    pub fn from_quaternion_coeffs(w: f64, x: f64, y: f64, z: f64) -> Self {
        SO3::new(UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)))
    }

    /// Create SO(3) from Euler angles (roll, pitch, yaw).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from a rotation axis and an angle in radians.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        let unit_axis = Unit::new_normalize(*axis);
        SO3::new(UnitQuaternion::from_axis_angle(&unit_axis, angle))
    }

    /// Create SO(3) from a scaled axis (axis-angle vector).
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Quaternion coefficients `[w, x, y, z]`.
    pub fn coeffs(&self) -> [f64; 4] {
        let q = self.quaternion.quaternion();
        [q.w, q.i, q.j, q.k]
    }

    /// Rotate a vector.
    pub fn rotate(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * vector
    }

    /// Geodesic distance (rotation angle of `self⁻¹ ∘ other`).
    pub fn distance(&self, other: &Self) -> f64 {
        self.between(other, None, None).log(None).angle()
    }
}

impl From<DVector<f64>> for SO3 {
    fn from(data: DVector<f64>) -> Self {
        SO3::from_quaternion_coeffs(data[0], data[1], data[2], data[3])
    }
}

impl From<SO3> for DVector<f64> {
    fn from(so3: SO3) -> Self {
        DVector::from_vec(so3.coeffs().to_vec())
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    fn identity() -> Self {
        SO3::new(UnitQuaternion::identity())
    }

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SO3::new(self.quaternion.inverse())
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
            *jac_other = Matrix3::identity();
        }
        SO3::new(self.quaternion * other.quaternion)
    }

    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let q = self.quaternion.quaternion();
        let sin_half_sq = q.i * q.i + q.j * q.j + q.k * q.k;

        let log_coeff = if sin_half_sq > f64::EPSILON {
            let sin_half = sin_half_sq.sqrt();
            let cos_half = q.w;
            // q and −q are the same rotation; pick the representative with angle ≤ π.
            let two_angle = 2.0
                * if cos_half < 0.0 {
                    f64::atan2(-sin_half, -cos_half)
                } else {
                    f64::atan2(sin_half, cos_half)
                };
            two_angle / sin_half
        } else {
            2.0
        };

        let axis_angle = SO3Tangent::new(Vector3::new(
            q.i * log_coeff,
            q.j * log_coeff,
            q.k * log_coeff,
        ));

        if let Some(jac) = jacobian {
            *jac = axis_angle.right_jacobian_inv();
        }

        axis_angle
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        self.rotation_matrix()
    }

    fn random() -> Self {
        SO3::from_scaled_axis(SO3Tangent::random().coeffs() * std::f64::consts::PI)
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix3::identity()
    }

    fn normalize(&mut self) {
        self.quaternion.renormalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.quaternion.norm() - 1.0).abs() < tolerance
    }
}

/// SO(3) tangent vector in axis-angle form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl Display for SO3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3(axis-angle: [{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SO3Tangent {
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    pub fn from_components(x: f64, y: f64, z: f64) -> Self {
        SO3Tangent::new(Vector3::new(x, y, z))
    }

    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    /// Rotation angle, the norm of the axis-angle vector.
    pub fn angle(&self) -> f64 {
        self.data.norm()
    }
}

impl Add for SO3Tangent {
    type Output = SO3Tangent;

    fn add(self, rhs: SO3Tangent) -> SO3Tangent {
        SO3Tangent::new(self.data + rhs.data)
    }
}

impl Sub for SO3Tangent {
    type Output = SO3Tangent;

    fn sub(self, rhs: SO3Tangent) -> SO3Tangent {
        SO3Tangent::new(self.data - rhs.data)
    }
}

impl Neg for SO3Tangent {
    type Output = SO3Tangent;

    fn neg(self) -> SO3Tangent {
        SO3Tangent::new(-self.data)
    }
}

impl Mul<f64> for SO3Tangent {
    type Output = SO3Tangent;

    fn mul(self, scale: f64) -> SO3Tangent {
        SO3Tangent::new(self.data * scale)
    }
}

impl Tangent<SO3> for SO3Tangent {
    const DIM: usize = 3;

    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SO3 {
        let theta_sq = self.data.norm_squared();

        let quaternion = if theta_sq > f64::EPSILON {
            UnitQuaternion::from_scaled_axis(self.data)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                self.data.x / 2.0,
                self.data.y / 2.0,
                self.data.z / 2.0,
            ))
        };

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SO3::new(quaternion)
    }

    fn right_jacobian(&self) -> Matrix3<f64> {
        self.left_jacobian().transpose()
    }

    /// Jl = I + (1 − cos θ)/θ² [θ]ₓ + (θ − sin θ)/θ³ [θ]ₓ²
    fn left_jacobian(&self) -> Matrix3<f64> {
        let theta_sq = self.data.norm_squared();
        let skew = self.hat();

        if theta_sq <= f64::EPSILON {
            Matrix3::identity() + 0.5 * skew
        } else {
            let theta = theta_sq.sqrt();
            let (sin_theta, cos_theta) = theta.sin_cos();

            Matrix3::identity()
                + (1.0 - cos_theta) / theta_sq * skew
                + (theta - sin_theta) / (theta_sq * theta) * skew * skew
        }
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        self.left_jacobian_inv().transpose()
    }

    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let theta_sq = self.data.norm_squared();
        let skew = self.hat();

        if theta_sq <= f64::EPSILON {
            Matrix3::identity() - 0.5 * skew
        } else {
            let theta = theta_sq.sqrt();
            let (sin_theta, cos_theta) = theta.sin_cos();

            Matrix3::identity() - 0.5 * skew
                + (1.0 / theta_sq - (1.0 + cos_theta) / (2.0 * theta * sin_theta)) * skew * skew
        }
    }

    fn hat(&self) -> Matrix3<f64> {
        Matrix3::new(
            0.0,
            -self.data.z,
            self.data.y,
            self.data.z,
            0.0,
            -self.data.x,
            -self.data.y,
            self.data.x,
            0.0,
        )
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SO3Tangent::from_components(
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
        )
    }

    fn squared_norm(&self) -> f64 {
        self.data.norm_squared()
    }

    fn to_dvector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn from_slice(data: &[f64]) -> ManifoldResult<Self> {
        check_tangent_dim(Self::DIM, data)?;
        Ok(SO3Tangent::from_components(data[0], data[1], data[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-10;

    #[test]
    fn test_so3_identity() {
        let identity = SO3::identity();
        assert!(identity.is_valid(TOLERANCE));
        assert_eq!(identity.coeffs(), [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_so3_rotate() {
        let rotation = SO3::from_axis_angle(&Vector3::z(), PI / 2.0);
        let rotated = rotation.rotate(&Vector3::x());
        assert!((rotated - Vector3::y()).norm() < TOLERANCE);
    }

    #[test]
    fn test_so3_exp_log() {
        let tangent = SO3Tangent::from_components(0.3, -0.4, 1.1);
        assert!(tangent.exp(None).log(None).is_approx(&tangent, TOLERANCE));

        let small = SO3Tangent::from_components(1e-9, 0.0, -1e-9);
        assert!(small.exp(None).log(None).is_approx(&small, 1e-15));
    }

    #[test]
    fn test_so3_log_takes_short_way_round() {
        let rotation = SO3::from_axis_angle(&Vector3::x(), 1.5 * PI);
        let tangent = rotation.log(None);
        assert!((tangent.angle() - 0.5 * PI).abs() < TOLERANCE);
        assert!(tangent.coeffs().x < 0.0);
    }

    #[test]
    fn test_so3_inverse_and_compose() {
        for _ in 0..10 {
            let rotation = SO3::random();
            let composed = rotation.compose(&rotation.inverse(None), None, None);
            assert!(composed.is_approx(&SO3::identity(), TOLERANCE));
        }
    }

    #[test]
    fn test_so3_distance() {
        let a = SO3::from_axis_angle(&Vector3::y(), 0.2);
        let b = SO3::from_axis_angle(&Vector3::y(), 0.7);
        assert!((a.distance(&b) - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn test_so3_jacobian_inverses() {
        for tangent in [
            SO3Tangent::from_components(0.3, -0.4, 1.1),
            SO3Tangent::from_components(1e-9, 2e-9, 0.0),
        ] {
            let right = tangent.right_jacobian() * tangent.right_jacobian_inv();
            let left = tangent.left_jacobian() * tangent.left_jacobian_inv();
            assert!((right - Matrix3::identity()).abs().max() < 1e-8);
            assert!((left - Matrix3::identity()).abs().max() < 1e-8);
        }
    }

    #[test]
    fn test_so3_right_jacobian_matches_exp() {
        let tangent = SO3Tangent::from_components(0.3, -0.4, 1.1);
        let base = tangent.exp(None);
        let h = 1e-6;
        let mut numerical = Matrix3::zeros();
        for i in 0..3 {
            let mut step = Vector3::zeros();
            step[i] = h;
            let forward = (tangent + SO3Tangent::new(step)).exp(None);
            let backward = (tangent - SO3Tangent::new(step)).exp(None);
            let column = (forward.right_minus(&base, None, None).coeffs()
                - backward.right_minus(&base, None, None).coeffs())
                / (2.0 * h);
            numerical.set_column(i, &column);
        }
        assert!((numerical - tangent.right_jacobian()).abs().max() < 1e-6);
    }

    #[test]
    fn test_so3_left_jacobian_matches_exp() {
        let tangent = SO3Tangent::from_components(-0.8, 0.2, 0.5);
        let base = tangent.exp(None);
        let h = 1e-6;
        let mut numerical = Matrix3::zeros();
        for i in 0..3 {
            let mut step = Vector3::zeros();
            step[i] = h;
            let forward = (tangent + SO3Tangent::new(step)).exp(None);
            let backward = (tangent - SO3Tangent::new(step)).exp(None);
            // Left perturbation: Exp(τ + δ) ∘ Exp(τ)⁻¹
            let column = (forward.compose(&base.inverse(None), None, None).log(None).coeffs()
                - backward.compose(&base.inverse(None), None, None).log(None).coeffs())
                / (2.0 * h);
            numerical.set_column(i, &column);
        }
        assert!((numerical - tangent.left_jacobian()).abs().max() < 1e-6);
    }

    #[test]
    fn test_so3_between_jacobians() {
        let a = SO3::from_euler_angles(0.1, -0.3, 0.8);
        let b = SO3::from_euler_angles(-0.5, 0.2, 0.4);
        let mut jac_a = Matrix3::zeros();
        let mut jac_b = Matrix3::zeros();
        let d = a.between(&b, Some(&mut jac_a), Some(&mut jac_b));

        assert!((jac_a + d.inverse(None).adjoint()).abs().max() < TOLERANCE);
        assert_eq!(jac_b, Matrix3::identity());
    }

    #[test]
    fn test_so3_retract_stays_normalized() {
        let mut rotation = SO3::random();
        for _ in 0..1000 {
            rotation = rotation.retract(&SO3Tangent::from_components(0.1, 0.2, 0.3), None, None);
        }
        assert!(rotation.is_valid(1e-12));
    }

    #[test]
    fn test_so3_tangent_from_slice() {
        assert!(SO3Tangent::from_slice(&[0.1, 0.2, 0.3]).is_ok());
        assert!(SO3Tangent::from_slice(&[0.1, 0.2]).is_err());
    }
}
