//! Transform trait for voxel coordinate mappings.

use nalgebra::Point3;

/// Maps a continuous voxel index of the reference grid to a continuous voxel
/// index of the moving grid.
///
/// Resamplers pull intensities through this mapping: for every output voxel
/// `v` they sample the moving volume at `map_index(v)`.
pub trait Transform {
    /// Apply the mapping to one index.
    fn map_index(&self, index: &Point3<f64>) -> Point3<f64>;

    /// Apply the mapping to a batch of indices.
    fn map_indices(&self, indices: &[Point3<f64>]) -> Vec<Point3<f64>> {
        indices.iter().map(|p| self.map_index(p)).collect()
    }
}
