//! Parameter trajectories and their display-unit conversion.
//!
//! [`ParameterTrajectory`] holds the raw per-volume estimates (voxels and
//! radians). [`DisplayTrajectory`] is the same table converted to millimetres
//! and degrees for reporting. They are distinct types, so a converted table
//! can never be converted a second time by mistake.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use volreg_core::{RigidParams, Spacing};

use crate::error::{RegistrationError, Result};

/// One row of raw rigid parameters per volume, in acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTrajectory {
    rows: Vec<RigidParams>,
}

impl ParameterTrajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn from_rows(rows: Vec<RigidParams>) -> Self {
        Self { rows }
    }

    /// Build from an `N x 6` table.
    pub fn from_array(table: &Array2<f64>) -> Result<Self> {
        if table.ncols() != RigidParams::LEN {
            return Err(RegistrationError::invalid_configuration(format!(
                "parameter table needs {} columns, got {}",
                RigidParams::LEN,
                table.ncols()
            )));
        }
        let rows = table
            .rows()
            .into_iter()
            .map(|row| RigidParams::new([row[0], row[1], row[2], row[3], row[4], row[5]]))
            .collect();
        Ok(Self { rows })
    }

    pub fn push(&mut self, params: RigidParams) {
        self.rows.push(params);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&RigidParams> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[RigidParams] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RigidParams> {
        self.rows.iter()
    }

    /// The trajectory as a plain `N x 6` numeric table.
    pub fn as_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), RigidParams::LEN), |(r, c)| self.rows[r].0[c])
    }

    /// Convert to millimetres and degrees.
    ///
    /// Translations are multiplied by the voxel size of their axis; rotations
    /// go from radians to degrees. `self` is left untouched.
    pub fn to_display_units(&self, voxel_size: &Spacing) -> DisplayTrajectory {
        let rows = self
            .rows
            .iter()
            .map(|p| {
                let v = p.as_array();
                [
                    v[0] * voxel_size[0],
                    v[1] * voxel_size[1],
                    v[2] * voxel_size[2],
                    v[3].to_degrees(),
                    v[4].to_degrees(),
                    v[5].to_degrees(),
                ]
            })
            .collect();
        DisplayTrajectory {
            rows,
            voxel_size: *voxel_size,
        }
    }
}

impl<'a> IntoIterator for &'a ParameterTrajectory {
    type Item = &'a RigidParams;
    type IntoIter = std::slice::Iter<'a, RigidParams>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<RigidParams> for ParameterTrajectory {
    fn from_iter<I: IntoIterator<Item = RigidParams>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// A trajectory in display units: translations in mm, rotations in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTrajectory {
    rows: Vec<[f64; 6]>,
    voxel_size: Spacing,
}

impl DisplayTrajectory {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[[f64; 6]] {
        &self.rows
    }

    /// Voxel size used for the conversion.
    pub fn voxel_size(&self) -> &Spacing {
        &self.voxel_size
    }

    /// Translation series per axis, in mm.
    pub fn translations_mm(&self) -> [Vec<f64>; 3] {
        self.column_group(0)
    }

    /// Rotation series per axis, in degrees.
    pub fn rotations_deg(&self) -> [Vec<f64>; 3] {
        self.column_group(3)
    }

    fn column_group(&self, offset: usize) -> [Vec<f64>; 3] {
        [0, 1, 2].map(|axis| self.rows.iter().map(|r| r[offset + axis]).collect())
    }

    /// Largest absolute finite translation (mm) and rotation (degrees).
    pub fn max_abs(&self) -> (f64, f64) {
        let max_of = |range: std::ops::Range<usize>| {
            self.rows
                .iter()
                .flat_map(|r| r[range.clone()].iter().copied())
                .filter(|v| v.is_finite())
                .fold(0.0f64, |acc, v| acc.max(v.abs()))
        };
        (max_of(0..3), max_of(3..6))
    }

    pub fn as_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), 6), |(r, c)| self.rows[r][c])
    }

    /// Convert back to raw voxels and radians.
    pub fn to_raw(&self) -> ParameterTrajectory {
        self.rows
            .iter()
            .map(|v| {
                RigidParams::new([
                    v[0] / self.voxel_size[0],
                    v[1] / self.voxel_size[1],
                    v[2] / self.voxel_size[2],
                    v[3].to_radians(),
                    v[4].to_radians(),
                    v[5].to_radians(),
                ])
            })
            .collect()
    }
}
