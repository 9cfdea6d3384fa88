//! Nearest neighbor interpolation implementation.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::trait_::Interpolator;
use crate::image::Volume;

/// Nearest Neighbor Interpolator.
///
/// Rounds to the nearest integer index, clamped to the grid.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    /// Create a new nearest neighbor interpolator.
    pub fn new() -> Self {
        Self
    }
}

impl Interpolator for NearestNeighborInterpolator {
    fn interpolate(&self, volume: &Volume, index: &Point3<f64>) -> f64 {
        let shape = volume.shape();
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let max = (shape[axis] - 1) as f64;
            idx[axis] = index[axis].round().clamp(0.0, max) as usize;
        }
        volume.data()[idx] as f64
    }
}
