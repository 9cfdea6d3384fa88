//! The six-parameter rigid-body vector.

use std::fmt;
use std::ops::Neg;

use nalgebra::{Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};

/// Rigid-body motion parameters `(tx, ty, tz, rx, ry, rz)`.
///
/// Translations are in voxel units, rotations in radians about the x, y and z
/// axes (applied as `Rz * Ry * Rx`).
///
/// # Examples
/// ```rust
/// use volreg_core::RigidParams;
///
/// let p = RigidParams::new([2.0, 0.0, 0.0, 0.0, 0.0, 0.1]);
/// assert_eq!(p.translation().x, 2.0);
/// assert_eq!((-p).as_array()[5], -0.1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidParams(pub Vector6<f64>);

impl Default for RigidParams {
    fn default() -> Self {
        Self::zeros()
    }
}

impl RigidParams {
    /// Number of parameters.
    pub const LEN: usize = 6;

    /// Column labels in storage order.
    pub const LABELS: [&'static str; 6] = ["tx", "ty", "tz", "rx", "ry", "rz"];

    pub fn new(values: [f64; 6]) -> Self {
        Self(Vector6::from_row_slice(&values))
    }

    /// Identity motion.
    pub fn zeros() -> Self {
        Self(Vector6::zeros())
    }

    /// All-NaN sentinel used for volumes that could not be realigned.
    pub fn nan() -> Self {
        Self(Vector6::repeat(f64::NAN))
    }

    /// Build from separate translation and rotation parts.
    pub fn from_parts(translation: Vector3<f64>, rotation: Vector3<f64>) -> Self {
        Self(Vector6::new(
            translation.x,
            translation.y,
            translation.z,
            rotation.x,
            rotation.y,
            rotation.z,
        ))
    }

    /// Build from a slice of exactly six values.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != Self::LEN {
            return Err(ImageError::invalid_parameter(format!(
                "rigid parameters need {} values, got {}",
                Self::LEN,
                values.len()
            )));
        }
        Ok(Self(Vector6::from_column_slice(values)))
    }

    /// `(tx, ty, tz)` in voxels.
    pub fn translation(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(0).into_owned()
    }

    /// `(rx, ry, rz)` in radians.
    pub fn rotation(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).into_owned()
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]]
    }

    pub fn as_vector(&self) -> &Vector6<f64> {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// True when every component is NaN (the failure sentinel).
    pub fn is_nan(&self) -> bool {
        self.0.iter().all(|v| v.is_nan())
    }

    /// Error unless every component is finite.
    pub fn ensure_finite(&self) -> Result<()> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(ImageError::NonFiniteParameters(self.to_string()))
        }
    }

    /// Largest absolute component difference to `other`.
    pub fn max_abs_diff(&self, other: &RigidParams) -> f64 {
        (self.0 - other.0).amax()
    }
}

impl Neg for RigidParams {
    type Output = RigidParams;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl From<Vector6<f64>> for RigidParams {
    fn from(v: Vector6<f64>) -> Self {
        Self(v)
    }
}

impl From<RigidParams> for Vector6<f64> {
    fn from(p: RigidParams) -> Self {
        p.0
    }
}

impl fmt::Display for RigidParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[t=({:.4}, {:.4}, {:.4}) vox, r=({:.5}, {:.5}, {:.5}) rad]",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}
