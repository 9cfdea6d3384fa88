//! Core types for fMRI rigid-body motion correction.
//!
//! Volumes and series ([`Volume`], [`VolumeSeries`]), grid geometry
//! ([`Affine`], [`Spacing`]), the six-parameter rigid transform
//! ([`RigidParams`], [`RigidTransform`]), interpolation, Gaussian smoothing and
//! resampling.

pub mod error;
pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;
pub mod filter;

pub use error::{ImageError, Result};
pub use image::{Volume, VolumeSeries};
pub use spatial::{Affine, Spacing};
pub use transform::{RigidParams, RigidTransform, Transform};
pub use interpolation::{Interpolator, LinearInterpolator, NearestNeighborInterpolator};
pub use filter::{GaussianFilter, Interpolation, ResampleFilter, Resampler};
