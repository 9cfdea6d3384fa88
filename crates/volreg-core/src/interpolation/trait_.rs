//! Interpolator trait for sampling values at continuous coordinates.

use nalgebra::Point3;

use crate::image::Volume;

/// Tolerance for treating a coordinate on the grid boundary as inside.
const BOUNDARY_EPS: f64 = 1e-6;

/// Interpolator trait for sampling values at continuous coordinates.
///
/// Interpolators sample volume intensities at non-integer voxel indices,
/// which is what both the registration metric and the resampler need.
pub trait Interpolator: Send + Sync {
    /// Sample `volume` at a continuous `[x, y, z]` index.
    ///
    /// Indices outside the grid are clamped to the nearest edge voxel, so the
    /// result is always defined.
    fn interpolate(&self, volume: &Volume, index: &Point3<f64>) -> f64;

    /// Sample only when `index` lies inside the grid, `None` otherwise.
    fn interpolate_inside(&self, volume: &Volume, index: &Point3<f64>) -> Option<f64> {
        contains(volume.shape(), index).then(|| self.interpolate(volume, index))
    }
}

/// True when a continuous index lies within `[0, n - 1]` on every axis.
pub fn contains(shape: [usize; 3], index: &Point3<f64>) -> bool {
    (0..3).all(|axis| {
        let v = index[axis];
        v.is_finite() && v >= -BOUNDARY_EPS && v <= (shape[axis] as f64 - 1.0) + BOUNDARY_EPS
    })
}
