//! Voxel-to-world affine transform.
//!
//! Every volume of a series shares one 4x4 affine mapping array indices
//! `(i, j, k)` to scanner coordinates in millimetres.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::Spacing;
use crate::error::{ImageError, Result};

/// Homogeneous voxel-to-world transform.
///
/// Only the top three rows carry information; the last row is always
/// `[0, 0, 0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine(pub Matrix4<f64>);

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    /// Identity mapping (1 mm isotropic voxels at the origin).
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Diagonal affine with the given voxel size and origin.
    pub fn from_spacing(spacing: [f64; 3], origin: [f64; 3]) -> Self {
        Self::from_rows([
            [spacing[0], 0.0, 0.0, origin[0]],
            [0.0, spacing[1], 0.0, origin[1]],
            [0.0, 0.0, spacing[2], origin[2]],
        ])
    }

    /// Build from the top three rows (e.g. NIfTI `srow_x/y/z`).
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        let mut m = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                m[(r, c)] = *value;
            }
        }
        Self(m)
    }

    /// Top three rows, row-major.
    pub fn rows(&self) -> [[f64; 4]; 3] {
        let mut rows = [[0.0; 4]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = self.0[(r, c)];
            }
        }
        rows
    }

    /// The 3x3 linear part (rotation, scaling, shear).
    pub fn linear(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation column (world position of voxel `(0, 0, 0)`).
    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Inverse of the linear part.
    pub fn linear_inverse(&self) -> Result<Matrix3<f64>> {
        let linear = self.linear();
        linear.try_inverse().ok_or_else(|| {
            ImageError::singular_affine(format!("determinant {:.3e}", linear.determinant()))
        })
    }

    /// Check that all entries are finite and the linear part is invertible.
    pub fn validate(&self) -> Result<()> {
        if self.0.iter().any(|v| !v.is_finite()) {
            return Err(ImageError::singular_affine("affine contains non-finite entries"));
        }
        self.linear_inverse().map(|_| ())
    }

    /// Voxel size along each array axis (column norms of the linear part).
    pub fn spacing(&self) -> Spacing {
        let linear = self.linear();
        Spacing::new([
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        ])
    }

    /// Map a continuous voxel index to world coordinates.
    pub fn voxel_to_world(&self, index: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.linear() * index.coords + self.translation())
    }

    /// Map world coordinates to a continuous voxel index.
    pub fn world_to_voxel(&self, point: &Point3<f64>) -> Result<Point3<f64>> {
        let inv = self.linear_inverse()?;
        Ok(Point3::from(inv * (point.coords - self.translation())))
    }
}
