//! Spatial types: the voxel-to-world affine and voxel spacing.
//!
//! All types are based on nalgebra for linear algebra operations.

pub mod affine;
pub mod spacing;

pub use affine::Affine;
pub use spacing::Spacing;
