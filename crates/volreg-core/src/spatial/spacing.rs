//! Spacing type for representing physical distances between voxels.
//!
//! Spacing represents the physical size of a voxel (in mm) along each
//! array axis of a volume.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Voxel size along each array axis, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing(pub Vector3<f64>);

impl Spacing {
    /// Create spacing from per-axis values.
    pub fn new(values: [f64; 3]) -> Self {
        Self(Vector3::new(values[0], values[1], values[2]))
    }

    /// Create uniform spacing (same value for all axes).
    pub fn uniform(value: f64) -> Self {
        Self(Vector3::repeat(value))
    }

    /// Check if spacing is uniform (all components equal).
    pub fn is_uniform(&self) -> bool {
        let first = self.0[0];
        (1..3).all(|i| (self.0[i] - first).abs() < 1e-9)
    }

    /// Get the minimum spacing value.
    pub fn min_spacing(&self) -> f64 {
        self.0.min()
    }

    /// Get the maximum spacing value.
    pub fn max_spacing(&self) -> f64 {
        self.0.max()
    }

    /// Spacing as a plain array.
    pub fn to_array(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

impl std::ops::Index<usize> for Spacing {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_creation() {
        let s = Spacing::new([1.0, 2.0, 3.0]);
        assert_eq!(s[0], 1.0);
        assert_eq!(s[1], 2.0);
        assert_eq!(s[2], 3.0);
    }

    #[test]
    fn test_spacing_uniform() {
        let s = Spacing::uniform(3.0);
        assert_eq!(s, Spacing::new([3.0, 3.0, 3.0]));
        assert!(s.is_uniform());
        assert!(!Spacing::new([1.0, 2.0, 3.0]).is_uniform());
    }

    #[test]
    fn test_spacing_min_max() {
        let s = Spacing::new([1.0, 2.0, 3.0]);
        assert_eq!(s.min_spacing(), 1.0);
        assert_eq!(s.max_spacing(), 3.0);
        assert_eq!(s.to_array(), [1.0, 2.0, 3.0]);
    }
}
