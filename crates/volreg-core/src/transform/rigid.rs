//! Rigid transform implementation.
//!
//! This module turns a [`RigidParams`] vector into a voxel-to-voxel mapping
//! on a fixed grid geometry.

use nalgebra::{Matrix3, Point3, Rotation3, Vector3};

use super::trait_::Transform;
use super::RigidParams;
use crate::error::Result;
use crate::spatial::Affine;

/// Rigid Transform (Rotation + Translation) in voxel space.
///
/// The rotation is built from Euler angles (`R = Rz * Ry * Rx`) and applied in
/// world space about the grid centre `c`, while the translation is in voxels:
///
/// `T(v) = M⁻¹ R M (v - c) + c + t`
///
/// where `M` is the linear part of the voxel-to-world affine. For an isotropic
/// axis-aligned affine this reduces to `R (v - c) + c + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix3<f64>,
    center: Vector3<f64>,
    translation: Vector3<f64>,
}

impl RigidTransform {
    /// Create the mapping for `params` on a grid with the given affine and
    /// voxel-space centre.
    ///
    /// Fails when the parameters are not finite or the affine is singular.
    pub fn new(params: &RigidParams, affine: &Affine, center: Vector3<f64>) -> Result<Self> {
        params.ensure_finite()?;
        let linear = affine.linear();
        let linear_inv = affine.linear_inverse()?;
        let rotation = rotation_matrix(&params.rotation());
        Ok(Self {
            matrix: linear_inv * rotation * linear,
            center,
            translation: params.translation(),
        })
    }

    /// Identity mapping about `center`.
    pub fn identity(center: Vector3<f64>) -> Self {
        Self {
            matrix: Matrix3::identity(),
            center,
            translation: Vector3::zeros(),
        }
    }

    /// Voxel-space linear part `M⁻¹ R M`.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn center(&self) -> &Vector3<f64> {
        &self.center
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }
}

impl Transform for RigidTransform {
    fn map_index(&self, index: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.matrix * (index.coords - self.center) + self.center + self.translation)
    }
}

/// Rotation matrix for Euler angles `(rx, ry, rz)`: `R = Rz(rz) * Ry(ry) * Rx(rx)`.
pub fn rotation_matrix(angles: &Vector3<f64>) -> Matrix3<f64> {
    // from_euler_angles(roll, pitch, yaw) composes exactly Rz * Ry * Rx.
    Rotation3::from_euler_angles(angles.x, angles.y, angles.z).into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity_params() {
        let c = Vector3::new(9.5, 9.5, 9.5);
        let t = RigidTransform::new(&RigidParams::zeros(), &Affine::identity(), c).unwrap();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(t.map_index(&p), p, epsilon = 1e-12);
        assert_eq!(t, RigidTransform::identity(c));
    }

    #[test]
    fn test_translation_in_voxels() {
        let params = RigidParams::new([2.0, -1.0, 0.5, 0.0, 0.0, 0.0]);
        let affine = Affine::from_spacing([3.0, 3.0, 4.0], [0.0, 0.0, 0.0]);
        let t = RigidTransform::new(&params, &affine, Vector3::zeros()).unwrap();
        let mapped = t.map_index(&Point3::new(5.0, 5.0, 5.0));
        assert_relative_eq!(mapped, Point3::new(7.0, 4.0, 5.5), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_about_center() {
        // 90 degrees about z maps +x to +y around the centre.
        let params = RigidParams::new([0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2]);
        let c = Vector3::new(5.0, 5.0, 5.0);
        let t = RigidTransform::new(&params, &Affine::identity(), c).unwrap();
        assert_relative_eq!(t.map_index(&Point3::from(c)), Point3::from(c), epsilon = 1e-12);
        let mapped = t.map_index(&Point3::new(6.0, 5.0, 5.0));
        assert_relative_eq!(mapped, Point3::new(5.0, 6.0, 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_respects_anisotropic_spacing() {
        // With 2 mm x-voxels, one x-voxel is two y-voxels of world distance.
        let params = RigidParams::new([0.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2]);
        let affine = Affine::from_spacing([2.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
        let t = RigidTransform::new(&params, &affine, Vector3::zeros()).unwrap();
        let mapped = t.map_index(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(mapped, Point3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_euler_order() {
        let angles = Vector3::new(0.1, -0.2, 0.3);
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), angles.x);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), angles.y);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), angles.z);
        let expected = (rz * ry * rx).into_inner();
        assert_relative_eq!(rotation_matrix(&angles), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_rejected() {
        let result =
            RigidTransform::new(&RigidParams::nan(), &Affine::identity(), Vector3::zeros());
        assert!(result.is_err());
    }
}
