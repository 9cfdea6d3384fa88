//! Interpolation types and operations.
//!
//! This module provides interpolation traits and implementations
//! for sampling volumes at continuous voxel indices.

pub mod trait_;
pub mod linear;
pub mod nearest;

pub use trait_::{contains, Interpolator};
pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;
