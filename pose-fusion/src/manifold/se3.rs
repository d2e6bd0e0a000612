//! SE(3) - rigid body transformations in 3D space (Pose3).
//!
//! Elements are an [`SO3`] rotation plus a `Vector3` translation. Tangent elements are
//! `[rho(3), theta(3)]`: translational components first, rotational components last.
//!
//! The Jacobians follow the manif conventions. The upper-right block of the SE(3) left
//! Jacobian is the `Q(ρ, θ)` matrix of Barfoot, "State Estimation for Robotics", eq. 7.86.

use crate::manifold::{
    LieGroup, ManifoldResult, Tangent, check_tangent_dim,
    so3::{SO3, SO3Tangent},
};
use nalgebra::{
    DVector, Isometry3, Matrix3, Matrix4, Matrix6, Quaternion, Translation3, UnitQuaternion,
    Vector3, Vector6,
};
use std::ops::{Add, Mul, Neg, Sub};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SE(3) group element: a 3D pose.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl Display for SE3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        let q = self.rotation_quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

impl SE3 {
    /// Space dimension - dimension of the ambient space that the group acts on
    pub const DIM: usize = 3;

    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 6;

    /// Representation size - size of the underlying data representation
    pub const REP_SIZE: usize = 7;

    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        SE3 {
            rotation: SO3::new(rotation),
            translation,
        }
    }

    /// Create SE3 from a translation and an unnormalized quaternion.
    pub fn from_translation_quaternion(
        translation: Vector3<f64>,
        quaternion: Quaternion<f64>,
    ) -> Self {
        Self::new(translation, UnitQuaternion::from_quaternion(quaternion))
    }

    /// Create SE3 from translation components and Euler angles (roll, pitch, yaw).
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    pub fn from_isometry(isometry: Isometry3<f64>) -> Self {
        Self::new(isometry.translation.vector, isometry.rotation)
    }

    pub fn from_translation_so3(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    pub fn rotation_so3(&self) -> SO3 {
        self.rotation.clone()
    }

    pub fn rotation_quaternion(&self) -> UnitQuaternion<f64> {
        self.rotation.quaternion()
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation_quaternion(),
        )
    }

    /// Homogeneous 4×4 transformation matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn z(&self) -> f64 {
        self.translation.z
    }

    /// `[x, y, z, qw, qx, qy, qz]`.
    pub fn coeffs(&self) -> [f64; 7] {
        let [w, i, j, k] = self.rotation.coeffs();
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            w,
            i,
            j,
            k,
        ]
    }

    /// Transform a point from the local frame into the parent frame.
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.rotate(point) + self.translation
    }
}

impl From<DVector<f64>> for SE3 {
    fn from(data: DVector<f64>) -> Self {
        // [tx, ty, tz, qw, qx, qy, qz]
        SE3::from_translation_quaternion(
            Vector3::new(data[0], data[1], data[2]),
            Quaternion::new(data[3], data[4], data[5], data[6]),
        )
    }
}

impl From<SE3> for DVector<f64> {
    fn from(se3: SE3) -> Self {
        DVector::from_vec(se3.coeffs().to_vec())
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type LieAlgebra = Matrix4<f64>;

    fn identity() -> Self {
        SE3::from_translation_so3(Vector3::zeros(), SO3::identity())
    }

    /// # Notes
    /// g⁻¹ = [Rᵀ, −Rᵀt; 0, 1], J = −Ad(g)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        let rot_inv = self.rotation.inverse(None);
        let trans_inv = -rot_inv.rotate(&self.translation);

        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        SE3::from_translation_so3(trans_inv, rot_inv)
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = SE3::from_translation_so3(
            self.transform_point(&other.translation),
            self.rotation.compose(&other.rotation, None, None),
        );

        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix6::identity();
        }

        result
    }

    /// # Notes
    /// θ = Log(R), ρ = Jl⁻¹(θ) t
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let theta = self.rotation.log(None);
        let rho = theta.left_jacobian_inv() * self.translation;
        let result = SE3Tangent::from_parts(rho, theta.coeffs());

        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }

        result
    }

    /// # Notes
    /// Ad(g) = [R, [t]ₓR; 0, R]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let rotation = self.rotation_matrix();
        let translation_skew = SO3Tangent::new(self.translation).hat();

        let mut adjoint_matrix = Matrix6::zeros();
        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(translation_skew * rotation));
        adjoint_matrix
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let translation = Vector3::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
            rng.random_range(-5.0..5.0),
        );
        SE3::from_translation_so3(translation, SO3::random())
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix6::identity()
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance)
    }
}

/// SE(3) tangent vector `[rho_x, rho_y, rho_z, theta_x, theta_y, theta_z]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl Display for SE3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rho = self.rho();
        let theta = self.theta();
        write!(
            f,
            "se3(rho: [{:.4}, {:.4}, {:.4}], theta: [{:.4}, {:.4}, {:.4}])",
            rho.x, rho.y, rho.z, theta.x, theta.y, theta.z
        )
    }
}

impl From<Vector6<f64>> for SE3Tangent {
    fn from(data: Vector6<f64>) -> Self {
        SE3Tangent { data }
    }
}

impl SE3Tangent {
    pub fn new(rho_x: f64, rho_y: f64, rho_z: f64, theta_x: f64, theta_y: f64, theta_z: f64) -> Self {
        SE3Tangent {
            data: Vector6::new(rho_x, rho_y, rho_z, theta_x, theta_y, theta_z),
        }
    }

    pub fn from_parts(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        SE3Tangent::new(rho.x, rho.y, rho.z, theta.x, theta.y, theta.z)
    }

    /// Translational part.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Rotational part (axis-angle).
    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    pub fn coeffs(&self) -> Vector6<f64> {
        self.data
    }

    /// Upper-right block of the SE(3) left Jacobian.
    fn q_block(rho: &Vector3<f64>, theta: &Vector3<f64>) -> Matrix3<f64> {
        let rho_skew = SO3Tangent::new(*rho).hat();
        let theta_skew = SO3Tangent::new(*theta).hat();
        let theta_sq = theta.norm_squared();

        let (b, c, d) = if theta_sq <= f64::EPSILON {
            (
                1.0 / 6.0 + theta_sq / 120.0,
                -1.0 / 24.0 + theta_sq / 720.0,
                -1.0 / 60.0,
            )
        } else {
            let angle = theta_sq.sqrt();
            let angle_cu = theta_sq * angle;
            let (sin_angle, cos_angle) = angle.sin_cos();
            let c = (1.0 - theta_sq / 2.0 - cos_angle) / (theta_sq * theta_sq);
            (
                (angle - sin_angle) / angle_cu,
                c,
                c - 3.0 * (angle - sin_angle - angle_cu / 6.0) / (theta_sq * angle_cu),
            )
        };

        let wv = theta_skew * rho_skew;
        let vw = rho_skew * theta_skew;
        let wvw = wv * theta_skew;
        let wwv = theta_skew * wv;
        let vww = vw * theta_skew;

        let m1 = rho_skew;
        let m2 = wv + vw + wvw;
        let m3 = wwv + vww - 3.0 * wvw;
        let m4 = wvw * theta_skew + theta_skew * wvw;

        0.5 * m1 + b * m2 - c * m3 - 0.5 * d * m4
    }
}

impl Add for SE3Tangent {
    type Output = SE3Tangent;

    fn add(self, rhs: SE3Tangent) -> SE3Tangent {
        SE3Tangent::from(self.data + rhs.data)
    }
}

impl Sub for SE3Tangent {
    type Output = SE3Tangent;

    fn sub(self, rhs: SE3Tangent) -> SE3Tangent {
        SE3Tangent::from(self.data - rhs.data)
    }
}

impl Neg for SE3Tangent {
    type Output = SE3Tangent;

    fn neg(self) -> SE3Tangent {
        SE3Tangent::from(-self.data)
    }
}

impl Mul<f64> for SE3Tangent {
    type Output = SE3Tangent;

    fn mul(self, scale: f64) -> SE3Tangent {
        SE3Tangent::from(self.data * scale)
    }
}

impl Tangent<SE3> for SE3Tangent {
    const DIM: usize = 6;

    /// # Notes
    /// R = Exp(θ), t = Jl(θ) ρ
    fn exp(&self, jacobian: Option<&mut Matrix6<f64>>) -> SE3 {
        let theta = SO3Tangent::new(self.theta());
        let rotation = theta.exp(None);
        let translation = theta.left_jacobian() * self.rho();

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SE3::from_translation_so3(translation, rotation)
    }

    /// Jr(τ) = Jl(−τ)
    fn right_jacobian(&self) -> Matrix6<f64> {
        (-*self).left_jacobian()
    }

    fn left_jacobian(&self) -> Matrix6<f64> {
        let rho = self.rho();
        let theta = self.theta();
        let jl_so3 = SO3Tangent::new(theta).left_jacobian();

        let mut jac = Matrix6::zeros();
        jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&jl_so3);
        jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&jl_so3);
        jac.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&Self::q_block(&rho, &theta));
        jac
    }

    fn right_jacobian_inv(&self) -> Matrix6<f64> {
        (-*self).left_jacobian_inv()
    }

    /// Jl⁻¹ = [Jl⁻¹(θ), −Jl⁻¹(θ) Q Jl⁻¹(θ); 0, Jl⁻¹(θ)]
    fn left_jacobian_inv(&self) -> Matrix6<f64> {
        let rho = self.rho();
        let theta = self.theta();
        let jl_inv_so3 = SO3Tangent::new(theta).left_jacobian_inv();
        let q = Self::q_block(&rho, &theta);

        let mut jac = Matrix6::zeros();
        jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&jl_inv_so3);
        jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&jl_inv_so3);
        jac.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(-jl_inv_so3 * q * jl_inv_so3));
        jac
    }

    fn hat(&self) -> Matrix4<f64> {
        let mut lie_alg = Matrix4::zeros();
        lie_alg
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&SO3Tangent::new(self.theta()).hat());
        lie_alg.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.rho());
        lie_alg
    }

    fn zero() -> Self {
        SE3Tangent::from(Vector6::zeros())
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SE3Tangent::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
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
        Ok(SE3Tangent::from(Vector6::from_column_slice(data)))
    }
}
