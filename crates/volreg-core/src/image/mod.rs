//! Volume types.
//!
//! A functional run is a [`VolumeSeries`]: ordered [`Volume`]s sharing one
//! voxel-to-world affine.

pub mod volume;
pub mod series;

pub use volume::Volume;
pub use series::VolumeSeries;
