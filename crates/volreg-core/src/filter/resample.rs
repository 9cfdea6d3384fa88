//! Resample filter.
//!
//! Resamples a moving volume onto the reference grid through a rigid
//! transform and an interpolator.

use std::fmt;
use std::str::FromStr;

use nalgebra::Point3;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};
use crate::image::Volume;
use crate::interpolation::{Interpolator, LinearInterpolator, NearestNeighborInterpolator};
use crate::spatial::Affine;
use crate::transform::{RigidParams, RigidTransform, Transform};

/// Produces the moving volume resampled into the reference frame.
pub trait Resampler {
    /// Resample `moving` onto the grid of `reference` using `params`.
    ///
    /// The output has the shape of `reference`.
    fn resample(
        &self,
        params: &RigidParams,
        reference: &Volume,
        moving: &Volume,
        affine: &Affine,
    ) -> Result<Volume>;
}

/// Interpolation scheme used when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpolation {
    #[default]
    Linear,
    Nearest,
}

impl FromStr for Interpolation {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "trilinear" => Ok(Self::Linear),
            "nearest" => Ok(Self::Nearest),
            other => Err(ImageError::invalid_parameter(format!(
                "unknown interpolation '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Nearest => write!(f, "nearest"),
        }
    }
}

/// Resample filter.
///
/// For every reference voxel `v` the moving volume is sampled at
/// `T(v)` (see [`RigidTransform`]). Samples falling outside the moving grid
/// take `default_value`; if no sample falls inside, resampling fails with
/// [`ImageError::NoOverlap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleFilter {
    interpolation: Interpolation,
    default_value: f32,
}

impl Default for ResampleFilter {
    fn default() -> Self {
        Self::new(Interpolation::Linear)
    }
}

impl ResampleFilter {
    pub fn new(interpolation: Interpolation) -> Self {
        Self {
            interpolation,
            default_value: 0.0,
        }
    }

    /// Value written where the transform leaves the moving grid.
    pub fn with_default_value(mut self, value: f32) -> Self {
        self.default_value = value;
        self
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    fn resample_with<I: Interpolator>(
        &self,
        interpolator: &I,
        transform: &RigidTransform,
        shape: [usize; 3],
        moving: &Volume,
    ) -> Result<Volume> {
        let mut inside = 0usize;
        let data = Array3::from_shape_fn((shape[0], shape[1], shape[2]), |(x, y, z)| {
            let index = Point3::new(x as f64, y as f64, z as f64);
            let mapped = transform.map_index(&index);
            match interpolator.interpolate_inside(moving, &mapped) {
                Some(value) => {
                    inside += 1;
                    value as f32
                }
                None => self.default_value,
            }
        });
        if inside == 0 {
            return Err(ImageError::NoOverlap);
        }
        Ok(Volume::new(data))
    }
}

impl Resampler for ResampleFilter {
    fn resample(
        &self,
        params: &RigidParams,
        reference: &Volume,
        moving: &Volume,
        affine: &Affine,
    ) -> Result<Volume> {
        let transform = RigidTransform::new(params, affine, reference.center())?;
        let shape = reference.shape();
        match self.interpolation {
            Interpolation::Linear => {
                self.resample_with(&LinearInterpolator::new(), &transform, shape, moving)
            }
            Interpolation::Nearest => {
                self.resample_with(&NearestNeighborInterpolator::new(), &transform, shape, moving)
            }
        }
    }
}
