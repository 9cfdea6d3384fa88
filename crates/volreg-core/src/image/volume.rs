//! Single 3D scalar volume.
//!
//! A `Volume` is one time point of a functional series: a dense grid of
//! intensities indexed `[x, y, z]` in NIfTI array order. Geometry lives on the
//! owning [`VolumeSeries`](super::VolumeSeries), since every volume of a run
//! shares one affine.

use nalgebra::Vector3;
use ndarray::Array3;

/// Dense 3D grid of voxel intensities.
///
/// Intensities are stored as `f32`, matching the precision of typical EPI
/// data; all arithmetic that accumulates over voxels is done in `f64`.
///
/// # Examples
/// ```rust
/// use volreg_core::Volume;
///
/// let volume = Volume::from_fn([4, 5, 6], |x, y, z| (x + y + z) as f32);
/// assert_eq!(volume.shape(), [4, 5, 6]);
/// assert_eq!(volume.get([1, 1, 1]), Some(3.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<f32>,
}

impl Volume {
    /// Wrap an existing array.
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// Volume of zeros.
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self::new(Array3::zeros((shape[0], shape[1], shape[2])))
    }

    /// Volume with every voxel set to `value`.
    pub fn filled(shape: [usize; 3], value: f32) -> Self {
        Self::new(Array3::from_elem((shape[0], shape[1], shape[2]), value))
    }

    /// Build a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn(shape: [usize; 3], f: impl Fn(usize, usize, usize) -> f32) -> Self {
        Self::new(Array3::from_shape_fn(
            (shape[0], shape[1], shape[2]),
            |(x, y, z)| f(x, y, z),
        ))
    }

    /// Get the voxel data.
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Consume the volume and return the voxel data.
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// Grid shape `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        let dims = self.data.dim();
        [dims.0, dims.1, dims.2]
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.data.len()
    }

    /// Intensity at an integer index, `None` outside the grid.
    pub fn get(&self, index: [usize; 3]) -> Option<f32> {
        self.data.get((index[0], index[1], index[2])).copied()
    }

    /// Voxel-space centre of the grid, `(n - 1) / 2` along each axis.
    pub fn center(&self) -> Vector3<f64> {
        let [nx, ny, nz] = self.shape();
        Vector3::new(
            (nx as f64 - 1.0) / 2.0,
            (ny as f64 - 1.0) / 2.0,
            (nz as f64 - 1.0) / 2.0,
        )
    }

    /// Mean intensity.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Largest absolute voxel-wise difference to another volume of the same shape.
    ///
    /// Returns `f64::INFINITY` when the shapes differ.
    pub fn max_abs_diff(&self, other: &Volume) -> f64 {
        if self.shape() != other.shape() {
            return f64::INFINITY;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| (a as f64 - b as f64).abs())
            .fold(0.0, f64::max)
    }

    /// True when any voxel is NaN.
    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }
}
