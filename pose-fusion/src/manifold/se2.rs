//! SE(2) - rigid motions of the plane (Pose2).
//!
//! SE(2) elements are represented as a unit complex rotation plus a `Vector2` translation.
//! Tangent elements are `[x, y, theta]`: translational components first, rotation last.
//!
//! The implementation follows the [manif](https://github.com/artivis/manif) C++ library
//! conventions. Closed-form `V(θ)` coefficients switch to Taylor expansions near θ = 0.

use crate::manifold::{LieGroup, ManifoldResult, Tangent, check_tangent_dim, so2::SO2};
use nalgebra::{
    Complex, DVector, Isometry2, Matrix2, Matrix3, Point2, Translation2, UnitComplex, Vector2,
    Vector3,
};
use std::ops::{Add, Mul, Neg, Sub};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SE(2) group element: a 2D pose.
#[derive(Debug, Clone, PartialEq)]
pub struct SE2 {
    /// Translation part as Vector2
    translation: Vector2<f64>,
    /// Rotation part as UnitComplex
    rotation: UnitComplex<f64>,
}

impl Display for SE2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = self.translation();
        write!(
            f,
            "SE2(translation: [{:.4}, {:.4}], rotation: {:.4})",
            t.x,
            t.y,
            self.angle()
        )
    }
}

impl From<DVector<f64>> for SE2 {
    fn from(data: DVector<f64>) -> Self {
        // [x, y, theta]
        SE2::from_xy_angle(data[0], data[1], data[2])
    }
}

impl From<SE2> for DVector<f64> {
    fn from(se2: SE2) -> Self {
        DVector::from_vec(se2.to_xy_angle().to_vec())
    }
}

/// Coefficients (sin θ / θ, (1 − cos θ) / θ) of the SE(2) V matrix.
fn v_coefficients(theta: f64) -> (f64, f64) {
    let theta_sq = theta * theta;
    if theta_sq < f64::EPSILON {
        (1.0 - theta_sq / 6.0, 0.5 * theta - theta * theta_sq / 24.0)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    }
}

impl SE2 {
    /// Space dimension - dimension of the ambient space that the group acts on
    pub const DIM: usize = 2;

    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 3;

    /// Representation size - size of the underlying data representation
    pub const REP_SIZE: usize = 4;

    /// Create a new SE2 element from translation and rotation.
    pub fn new(translation: Vector2<f64>, rotation: UnitComplex<f64>) -> Self {
        SE2 {
            translation,
            rotation,
        }
    }

    /// Create SE2 from translation components and angle.
    pub fn from_xy_angle(x: f64, y: f64, theta: f64) -> Self {
        Self::new(Vector2::new(x, y), UnitComplex::from_angle(theta))
    }

    /// Create SE2 from translation components and an unnormalized complex rotation.
    pub fn from_xy_complex(x: f64, y: f64, real: f64, imag: f64) -> Self {
        Self::new(
            Vector2::new(x, y),
            UnitComplex::new_unchecked(Complex::new(real, imag)),
        )
    }

    /// Create SE2 directly from an Isometry2.
    pub fn from_isometry(isometry: Isometry2<f64>) -> Self {
        Self::new(isometry.translation.vector, isometry.rotation)
    }

    /// Create SE2 from a rotation followed by a translation, as `Pose2(Rot2, Point2)`.
    pub fn from_translation_so2(translation: Vector2<f64>, rotation: SO2) -> Self {
        Self::new(translation, rotation.complex())
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    pub fn rotation_complex(&self) -> UnitComplex<f64> {
        self.rotation
    }

    pub fn rotation_so2(&self) -> SO2 {
        SO2::new(self.rotation)
    }

    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::from_parts(Translation2::from(self.translation), self.rotation)
    }

    /// Homogeneous 3×3 transformation matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        self.isometry().to_homogeneous()
    }

    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn real(&self) -> f64 {
        self.rotation.re
    }

    pub fn imag(&self) -> f64 {
        self.rotation.im
    }

    /// Rotation angle in radians, `atan2(imag, real)`.
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// `[x, y, theta]`, the layout used when dumping estimates.
    pub fn to_xy_angle(&self) -> [f64; 3] {
        [self.x(), self.y(), self.angle()]
    }

    /// Transform a point from the local frame into the parent frame.
    pub fn transform_point(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation.transform_point(&Point2::from(*point)).coords + self.translation
    }
}

impl LieGroup for SE2 {
    type TangentVector = SE2Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    fn identity() -> Self {
        SE2::new(Vector2::zeros(), UnitComplex::identity())
    }

    /// # Notes
    /// g⁻¹ = [Rᵀ, −Rᵀt; 0, 1], J = −Ad(g)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        let rot_inv = self.rotation.inverse();
        let trans_inv = -(rot_inv * self.translation);

        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        SE2::new(trans_inv, rot_inv)
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = SE2::new(
            self.transform_point(&other.translation),
            self.rotation * other.rotation,
        );

        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }

        result
    }

    /// # Notes
    /// τ = [V⁻¹(θ) t; θ]
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let theta = self.angle();
        let (a, b) = v_coefficients(theta);

        let den = 1.0 / (a * a + b * b);
        let a_scaled = a * den;
        let b_scaled = b * den;

        let x = a_scaled * self.x() + b_scaled * self.y();
        let y = -b_scaled * self.x() + a_scaled * self.y();

        let result = SE2Tangent::new(x, y, theta);

        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }

        result
    }

    /// # Notes
    /// Ad(g) = [R, (y, −x)ᵀ; 0, 1]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let mut adjoint_matrix = Matrix3::identity();
        adjoint_matrix
            .fixed_view_mut::<2, 2>(0, 0)
            .copy_from(&self.rotation_matrix());
        adjoint_matrix[(0, 2)] = self.y();
        adjoint_matrix[(1, 2)] = -self.x();
        adjoint_matrix
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();

        let translation = Vector2::new(
            rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0),
        );
        let angle = rng.random_range(0.0..2.0 * std::f64::consts::PI);

        SE2::new(translation, UnitComplex::from_angle(angle))
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix3::identity()
    }

    fn normalize(&mut self) {
        self.rotation.renormalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.rotation.norm() - 1.0).abs() < tolerance
    }
}

/// SE(2) tangent vector `[x, y, theta]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE2Tangent {
    data: Vector3<f64>,
}

impl Display for SE2Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "se2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.x(),
            self.y(),
            self.angle()
        )
    }
}

impl From<Vector3<f64>> for SE2Tangent {
    fn from(data: Vector3<f64>) -> Self {
        SE2Tangent { data }
    }
}

impl From<SE2Tangent> for DVector<f64> {
    fn from(tangent: SE2Tangent) -> Self {
        tangent.to_dvector()
    }
}

impl SE2Tangent {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        SE2Tangent {
            data: Vector3::new(x, y, theta),
        }
    }

    pub fn x(&self) -> f64 {
        self.data[0]
    }

    pub fn y(&self) -> f64 {
        self.data[1]
    }

    pub fn angle(&self) -> f64 {
        self.data[2]
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.x(), self.y())
    }

    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }
}

impl Add for SE2Tangent {
    type Output = SE2Tangent;

    fn add(self, rhs: SE2Tangent) -> SE2Tangent {
        SE2Tangent::from(self.data + rhs.data)
    }
}

impl Sub for SE2Tangent {
    type Output = SE2Tangent;

    fn sub(self, rhs: SE2Tangent) -> SE2Tangent {
        SE2Tangent::from(self.data - rhs.data)
    }
}

impl Neg for SE2Tangent {
    type Output = SE2Tangent;

    fn neg(self) -> SE2Tangent {
        SE2Tangent::from(-self.data)
    }
}

impl Mul<f64> for SE2Tangent {
    type Output = SE2Tangent;

    fn mul(self, scale: f64) -> SE2Tangent {
        SE2Tangent::from(self.data * scale)
    }
}

impl Tangent<SE2> for SE2Tangent {
    const DIM: usize = 3;

    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SE2 {
        let theta = self.angle();
        let (a, b) = v_coefficients(theta);

        let translation = Vector2::new(a * self.x() - b * self.y(), b * self.x() + a * self.y());
        let rotation = UnitComplex::from_cos_sin_unchecked(theta.cos(), theta.sin());

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SE2::new(translation, rotation)
    }

    fn right_jacobian(&self) -> Matrix3<f64> {
        let theta = self.angle();
        let theta_sq = theta * theta;
        let (a, b) = v_coefficients(theta);
        let (x, y) = (self.x(), self.y());

        let mut jac = Matrix3::identity();
        jac[(0, 0)] = a;
        jac[(0, 1)] = b;
        jac[(1, 0)] = -b;
        jac[(1, 1)] = a;

        if theta_sq < f64::EPSILON {
            jac[(0, 2)] = -y / 2.0 + theta * x / 6.0;
            jac[(1, 2)] = x / 2.0 + theta * y / 6.0;
        } else {
            let (sin_theta, cos_theta) = theta.sin_cos();
            jac[(0, 2)] = (-y + theta * x + y * cos_theta - x * sin_theta) / theta_sq;
            jac[(1, 2)] = (x + theta * y - x * cos_theta - y * sin_theta) / theta_sq;
        }

        jac
    }

    fn left_jacobian(&self) -> Matrix3<f64> {
        let theta = self.angle();
        let theta_sq = theta * theta;
        let (a, b) = v_coefficients(theta);
        let (x, y) = (self.x(), self.y());

        let mut jac = Matrix3::identity();
        jac[(0, 0)] = a;
        jac[(0, 1)] = -b;
        jac[(1, 0)] = b;
        jac[(1, 1)] = a;

        if theta_sq < f64::EPSILON {
            jac[(0, 2)] = y / 2.0 + theta * x / 6.0;
            jac[(1, 2)] = -x / 2.0 + theta * y / 6.0;
        } else {
            let (sin_theta, cos_theta) = theta.sin_cos();
            jac[(0, 2)] = (y + theta * x - y * cos_theta - x * sin_theta) / theta_sq;
            jac[(1, 2)] = (-x + theta * y + x * cos_theta - y * sin_theta) / theta_sq;
        }

        jac
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        let theta = self.angle();
        let theta_sq = theta * theta;
        let (x, y) = (self.x(), self.y());

        let mut jac_inv = Matrix3::zeros();
        jac_inv[(0, 1)] = -theta * 0.5;
        jac_inv[(1, 0)] = theta * 0.5;
        jac_inv[(2, 2)] = 1.0;

        if theta_sq > f64::EPSILON {
            let (sin_theta, cos_theta) = theta.sin_cos();
            let a = theta * sin_theta;
            let b = theta * cos_theta;

            jac_inv[(0, 0)] = -a / (2.0 * cos_theta - 2.0);
            jac_inv[(1, 1)] = jac_inv[(0, 0)];

            let den = 2.0 * theta * (cos_theta - 1.0);
            jac_inv[(0, 2)] =
                (a * x + b * y - theta * y + 2.0 * x * cos_theta - 2.0 * x) / den;
            jac_inv[(1, 2)] =
                (-b * x + a * y + theta * x + 2.0 * y * cos_theta - 2.0 * y) / den;
        } else {
            jac_inv[(0, 0)] = 1.0 - theta_sq / 12.0;
            jac_inv[(1, 1)] = jac_inv[(0, 0)];
            jac_inv[(0, 2)] = y / 2.0 + theta * x / 12.0;
            jac_inv[(1, 2)] = -x / 2.0 + theta * y / 12.0;
        }

        jac_inv
    }

    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let theta = self.angle();
        let theta_sq = theta * theta;
        let (x, y) = (self.x(), self.y());

        let mut jac_inv = Matrix3::zeros();
        jac_inv[(0, 1)] = theta * 0.5;
        jac_inv[(1, 0)] = -theta * 0.5;
        jac_inv[(2, 2)] = 1.0;

        if theta_sq > f64::EPSILON {
            let (sin_theta, cos_theta) = theta.sin_cos();
            let a = theta * sin_theta;
            let b = theta * cos_theta;

            jac_inv[(0, 0)] = -a / (2.0 * cos_theta - 2.0);
            jac_inv[(1, 1)] = jac_inv[(0, 0)];

            let den = 2.0 * theta * (cos_theta - 1.0);
            jac_inv[(0, 2)] =
                (a * x - b * y + theta * y + 2.0 * x * cos_theta - 2.0 * x) / den;
            jac_inv[(1, 2)] =
                (b * x + a * y - theta * x + 2.0 * y * cos_theta - 2.0 * y) / den;
        } else {
            jac_inv[(0, 0)] = 1.0 - theta_sq / 12.0;
            jac_inv[(1, 1)] = jac_inv[(0, 0)];
            jac_inv[(0, 2)] = -y / 2.0 + theta * x / 12.0;
            jac_inv[(1, 2)] = x / 2.0 + theta * y / 12.0;
        }

        jac_inv
    }

    fn hat(&self) -> Matrix3<f64> {
        Matrix3::new(
            0.0,
            -self.angle(),
            self.x(),
            self.angle(),
            0.0,
            self.y(),
            0.0,
            0.0,
            0.0,
        )
    }

    fn zero() -> Self {
        SE2Tangent::new(0.0, 0.0, 0.0)
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SE2Tangent::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-std::f64::consts::PI..std::f64::consts::PI),
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
        Ok(SE2Tangent::new(data[0], data[1], data[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-12;

    /// Central-difference Jacobian of `f` under right perturbations of its argument.
    fn numerical_jacobian(f: impl Fn(&SE2) -> SE2, at: &SE2) -> Matrix3<f64> {
        let h = 1e-6;
        let base = f(at);
        let mut jac = Matrix3::zeros();
        for i in 0..3 {
            let mut step = Vector3::zeros();
            step[i] = h;
            let forward = f(&at.right_plus(&SE2Tangent::from(step), None, None));
            let backward = f(&at.right_plus(&SE2Tangent::from(-step), None, None));
            let column = (forward.right_minus(&base, None, None).coeffs()
                - backward.right_minus(&base, None, None).coeffs())
                / (2.0 * h);
            jac.set_column(i, &column);
        }
        jac
    }

    #[test]
    fn test_se2_identity() {
        let identity = SE2::identity();
        assert!(identity.is_valid(TOLERANCE));
        assert_eq!(identity.to_xy_angle(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_se2_from_xy_angle() {
        let se2 = SE2::from_xy_angle(4.0, 2.0, PI / 4.0);
        assert_eq!(se2.x(), 4.0);
        assert_eq!(se2.y(), 2.0);
        assert!((se2.angle() - PI / 4.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_se2_from_translation_so2() {
        let se2 = SE2::from_translation_so2(Vector2::new(0.5, 0.0), SO2::from_angle(0.2));
        assert_eq!(se2.x(), 0.5);
        assert!((se2.rotation_so2().angle() - 0.2).abs() < TOLERANCE);
    }

    #[test]
    fn test_se2_between_trivial() {
        let a = SE2::identity();
        let b = SE2::identity();
        assert!(a.between(&b, None, None).is_approx(&SE2::identity(), TOLERANCE));
    }

    #[test]
    fn test_se2_between_translation_only() {
        let a = SE2::from_xy_angle(2.0, 1.0, 0.0);
        let b = SE2::from_xy_angle(5.0, 2.0, 0.0);
        assert_eq!(a.between(&b, None, None).to_xy_angle(), [3.0, 1.0, 0.0]);
    }

    #[test]
    fn test_se2_between_rotated_keeps_angle_near_minus_pi() {
        let half_pi = 3.1415926 / 2.0;
        let a = SE2::from_xy_angle(1.0, 0.0, half_pi);
        let b = SE2::from_xy_angle(1.0, 0.0, -half_pi);
        let [x, y, theta] = a.between(&b, None, None).to_xy_angle();

        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        assert!((theta - (-3.1415926)).abs() < 1e-6);
    }

    #[test]
    fn test_se2_between_with_self_is_identity() {
        for _ in 0..10 {
            let a = SE2::random();
            let d = a.between(&a, None, None);
            assert!(d.log(None).is_zero(1e-10));
        }
    }

    #[test]
    fn test_se2_inverse() {
        let se2 = SE2::from_xy_angle(0.7, 2.3, PI / 3.0);
        let se2_inv = se2.inverse(None);

        assert!((se2_inv.x() - (-2.341858428704209)).abs() < 1e-10);
        assert!((se2_inv.y() - (-0.543782217350893)).abs() < 1e-10);
        assert!((se2_inv.angle() - (-PI / 3.0)).abs() < 1e-10);

        for _ in 0..10 {
            let a = SE2::random();
            let composed = a.compose(&a.inverse(None), None, None);
            assert!(composed.is_approx(&SE2::identity(), 1e-10));
        }
    }

    #[test]
    fn test_se2_compose() {
        let a = SE2::from_xy_angle(1.0, 1.0, PI / 2.0);
        let b = SE2::from_xy_angle(2.0, 2.0, PI / 2.0);
        let c = a.compose(&b, None, None);

        assert!((c.x() - (-1.0)).abs() < TOLERANCE);
        assert!((c.y() - 3.0).abs() < TOLERANCE);
        assert!((c.angle() - PI).abs() < TOLERANCE);
    }

    #[test]
    fn test_se2_associativity() {
        let a = SE2::random();
        let b = SE2::random();
        let c = SE2::random();

        let left = a.compose(&b, None, None).compose(&c, None, None);
        let right = a.compose(&b.compose(&c, None, None), None, None);
        assert!(left.is_approx(&right, 1e-10));
    }

    #[test]
    fn test_se2_exp_log() {
        let tangent = SE2Tangent::new(4.0, 2.0, PI);
        let recovered = tangent.exp(None).log(None);
        assert!(recovered.is_approx(&tangent, 1e-12));

        let small = SE2Tangent::new(1e-8, 2e-8, 1e-9);
        assert!(small.exp(None).log(None).is_approx(&small, TOLERANCE));
    }

    #[test]
    fn test_se2_identity_map_jacobian() {
        for _ in 0..10 {
            let pose = SE2::random();
            let mut jac = Matrix3::zeros();
            pose.local_coordinate(&pose, None, Some(&mut jac));
            assert!((jac - Matrix3::identity()).abs().max() < 1e-10);
        }
    }

    #[test]
    fn test_se2_inverse_jacobian_is_negative_adjoint() {
        for _ in 0..10 {
            let pose = SE2::random();
            let mut jac = Matrix3::zeros();
            pose.inverse(Some(&mut jac));
            assert!((jac + pose.adjoint()).abs().max() < 1e-10);

            let numerical = numerical_jacobian(|x| x.inverse(None), &pose);
            assert!((numerical - jac).abs().max() < 1e-6);
        }
    }

    #[test]
    fn test_se2_compose_jacobians() {
        for _ in 0..10 {
            let lhs = SE2::random();
            let rhs = SE2::random();
            let mut jac_lhs = Matrix3::zeros();
            let mut jac_rhs = Matrix3::zeros();
            lhs.compose(&rhs, Some(&mut jac_lhs), Some(&mut jac_rhs));

            let expected_lhs = rhs.inverse(None).adjoint();
            assert!((jac_lhs - expected_lhs).abs().max() < 1e-10);
            assert!((jac_rhs - Matrix3::identity()).abs().max() < 1e-10);

            let numerical_lhs = numerical_jacobian(|x| x.compose(&rhs, None, None), &lhs);
            let numerical_rhs = numerical_jacobian(|y| lhs.compose(y, None, None), &rhs);
            assert!((numerical_lhs - jac_lhs).abs().max() < 1e-6);
            assert!((numerical_rhs - jac_rhs).abs().max() < 1e-6);
        }
    }

    #[test]
    fn test_se2_between_jacobians() {
        for _ in 0..10 {
            let a = SE2::random();
            let b = SE2::random();
            let mut jac_a = Matrix3::zeros();
            let mut jac_b = Matrix3::zeros();
            a.between(&b, Some(&mut jac_a), Some(&mut jac_b));

            let numerical_a = numerical_jacobian(|x| x.between(&b, None, None), &a);
            let numerical_b = numerical_jacobian(|y| a.between(y, None, None), &b);
            assert!((numerical_a - jac_a).abs().max() < 1e-6);
            assert!((numerical_b - jac_b).abs().max() < 1e-6);
        }
    }

    #[test]
    fn test_se2_right_jacobian_matches_exp() {
        let tangent = SE2Tangent::new(0.4, -0.7, 1.3);
        let base = tangent.exp(None);
        let h = 1e-6;
        let mut numerical = Matrix3::zeros();
        for i in 0..3 {
            let mut step = Vector3::zeros();
            step[i] = h;
            let forward = (tangent + SE2Tangent::from(step)).exp(None);
            let backward = (tangent - SE2Tangent::from(step)).exp(None);
            let column = (forward.right_minus(&base, None, None).coeffs()
                - backward.right_minus(&base, None, None).coeffs())
                / (2.0 * h);
            numerical.set_column(i, &column);
        }
        assert!((numerical - tangent.right_jacobian()).abs().max() < 1e-6);
    }

    #[test]
    fn test_se2_jacobian_inverses() {
        let tangent = SE2Tangent::new(0.4, -0.7, 1.3);
        let right = tangent.right_jacobian() * tangent.right_jacobian_inv();
        let left = tangent.left_jacobian() * tangent.left_jacobian_inv();
        assert!((right - Matrix3::identity()).abs().max() < 1e-10);
        assert!((left - Matrix3::identity()).abs().max() < 1e-10);

        let small = SE2Tangent::new(0.4, -0.7, 1e-9);
        let right = small.right_jacobian() * small.right_jacobian_inv();
        assert!((right - Matrix3::identity()).abs().max() < 1e-8);
    }

    #[test]
    fn test_se2_adjoint_transports_tangents() {
        let pose = SE2::random();
        let tangent = SE2Tangent::new(0.1, -0.2, 0.3);
        let lhs = pose.compose(&tangent.exp(None), None, None);
        let transported = SE2Tangent::from(pose.adjoint() * tangent.coeffs());
        let rhs = transported.exp(None).compose(&pose, None, None);
        assert!(lhs.is_approx(&rhs, 1e-10));
    }

    #[test]
    fn test_se2_retract_normalizes() {
        let pose = SE2::from_xy_complex(1.0, 2.0, 0.5, 0.5);
        assert!(!pose.is_valid(1e-6));
        let moved = pose.retract(&SE2Tangent::zero(), None, None);
        assert!(moved.is_valid(TOLERANCE));
    }

    #[test]
    fn test_se2_retract_local_coordinate_round_trip() {
        for _ in 0..10 {
            let pose = SE2::random();
            let delta = SE2Tangent::random() * 0.05;
            let moved = pose.retract(&delta, None, None);
            assert!(pose.local_coordinate(&moved, None, None).is_approx(&delta, 1e-10));
        }
    }

    #[test]
    fn test_se2_tangent_vector_space() {
        let a = SE2Tangent::new(1.0, 2.0, 3.0);
        let b = SE2Tangent::new(0.5, 0.5, 0.5);

        assert_eq!(a + b, SE2Tangent::new(1.5, 2.5, 3.5));
        assert_eq!(a - b, SE2Tangent::new(0.5, 1.5, 2.5));
        assert_eq!(-b, SE2Tangent::new(-0.5, -0.5, -0.5));
        assert_eq!(a * 2.0, SE2Tangent::new(2.0, 4.0, 6.0));
        assert_eq!(SE2Tangent::new(3.0, 4.0, 0.0).norm(), 5.0);
    }

    #[test]
    fn test_se2_tangent_from_slice() {
        let tangent = SE2Tangent::from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(tangent, Ok(SE2Tangent::new(1.0, 2.0, 3.0)));
        assert!(SE2Tangent::from_slice(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_se2_tangent_hat() {
        let hat_matrix = SE2Tangent::new(4.0, 2.0, PI).hat();
        assert_eq!(hat_matrix[(0, 2)], 4.0);
        assert_eq!(hat_matrix[(1, 2)], 2.0);
        assert_eq!(hat_matrix[(1, 0)], PI);
        assert_eq!(hat_matrix[(0, 1)], -PI);
    }

    #[test]
    fn test_se2_isometry_round_trip() {
        let isometry = Isometry2::new(Vector2::new(1.0, 2.0), PI / 4.0);
        let se2 = SE2::from_isometry(isometry);
        let recovered = se2.isometry();

        assert!((isometry.translation.vector - recovered.translation.vector).norm() < TOLERANCE);
        assert!((isometry.rotation.angle() - recovered.rotation.angle()).abs() < TOLERANCE);
        assert!((se2.matrix()[(2, 2)] - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_se2_dvector_conversion() {
        let se2 = SE2::from(DVector::from_vec(vec![1.0, -1.0, 0.5]));
        let data: DVector<f64> = se2.into();
        assert!((data[2] - 0.5).abs() < TOLERANCE);
    }
}
