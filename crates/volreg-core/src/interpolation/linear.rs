//! Linear interpolation implementation.
//!
//! Trilinear interpolation over the eight voxels surrounding a continuous
//! index, with indices clamped to the grid.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::trait_::Interpolator;
use crate::image::Volume;

/// Linear Interpolator.
///
/// Performs trilinear interpolation. Coordinates outside the grid are clamped
/// to the edge voxels, which keeps the sampled intensity continuous in the
/// coordinates (a property the optimizer relies on).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    /// Create a new linear interpolator.
    pub fn new() -> Self {
        Self
    }
}

/// Floor index, upper neighbour and weight of the upper neighbour along one axis.
#[inline]
fn axis_weights(coord: f64, len: usize) -> (usize, usize, f64) {
    let max = (len - 1) as f64;
    let c = coord.clamp(0.0, max);
    let lo = c.floor();
    let hi = (lo + 1.0).min(max);
    (lo as usize, hi as usize, c - lo)
}

impl Interpolator for LinearInterpolator {
    fn interpolate(&self, volume: &Volume, index: &Point3<f64>) -> f64 {
        let data = volume.data();
        let [nx, ny, nz] = volume.shape();
        let (x0, x1, wx) = axis_weights(index.x, nx);
        let (y0, y1, wy) = axis_weights(index.y, ny);
        let (z0, z1, wz) = axis_weights(index.z, nz);

        let v = |x: usize, y: usize, z: usize| data[[x, y, z]] as f64;

        // Interpolate along X
        let c00 = v(x0, y0, z0) * (1.0 - wx) + v(x1, y0, z0) * wx;
        let c10 = v(x0, y1, z0) * (1.0 - wx) + v(x1, y1, z0) * wx;
        let c01 = v(x0, y0, z1) * (1.0 - wx) + v(x1, y0, z1) * wx;
        let c11 = v(x0, y1, z1) * (1.0 - wx) + v(x1, y1, z1) * wx;

        // Interpolate along Y
        let c0 = c00 * (1.0 - wy) + c10 * wy;
        let c1 = c01 * (1.0 - wy) + c11 * wy;

        // Interpolate along Z
        c0 * (1.0 - wz) + c1 * wz
    }
}
