//! Gaussian smoothing filter.

use std::borrow::Cow;

use ndarray::{Array3, Axis, Zip};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{ImageError, Result};
use crate::image::{Volume, VolumeSeries};
use crate::spatial::Spacing;

/// `FWHM = sigma * sqrt(8 ln 2)`.
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (8.0 * std::f64::consts::LN_2).sqrt()
}

/// Gaussian smoothing filter.
///
/// Applies a Gaussian smoothing filter to a volume using separable 1D
/// convolutions. Widths are given in millimetres and converted to voxels with
/// the series spacing, so anisotropic voxels get anisotropic kernels. Edges are
/// handled by replicating the border voxel, which keeps the mean of a
/// constant volume unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianFilter {
    sigmas_mm: [f64; 3],
    max_kernel_width: usize,
}

impl GaussianFilter {
    /// Create a new Gaussian filter with the given standard deviation per axis
    /// (in physical units).
    pub fn new(sigmas_mm: [f64; 3]) -> Result<Self> {
        if sigmas_mm.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ImageError::invalid_parameter(format!(
                "Gaussian sigma must be finite and non-negative, got {:?}",
                sigmas_mm
            )));
        }
        Ok(Self {
            sigmas_mm,
            max_kernel_width: 65,
        })
    }

    /// Isotropic filter from a full width at half maximum in millimetres.
    pub fn from_fwhm(fwhm_mm: f64) -> Result<Self> {
        if !fwhm_mm.is_finite() || fwhm_mm < 0.0 {
            return Err(ImageError::invalid_parameter(format!(
                "smoothing FWHM must be finite and non-negative, got {}",
                fwhm_mm
            )));
        }
        Self::new([fwhm_to_sigma(fwhm_mm); 3])
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    pub fn sigmas_mm(&self) -> [f64; 3] {
        self.sigmas_mm
    }

    /// True when the filter leaves every volume unchanged.
    pub fn is_identity(&self) -> bool {
        self.sigmas_mm.iter().all(|s| *s <= 1e-6)
    }

    /// Apply the filter to one volume with the given voxel spacing.
    pub fn apply(&self, volume: &Volume, spacing: &Spacing) -> Volume {
        let mut data = volume.data().clone();
        for axis in 0..3 {
            let sigma = self.sigmas_mm[axis];
            // Skip if sigma is close to zero
            if sigma <= 1e-6 || data.len_of(Axis(axis)) < 2 {
                continue;
            }

            let voxel_sigma = sigma / spacing[axis];
            // Clamp before any arithmetic: a huge sigma saturates the cast.
            let radius = ((3.0 * voxel_sigma).ceil() as usize).min(self.max_kernel_width / 2);
            let kernel = generate_kernel(voxel_sigma, radius);
            data = convolve_axis(&data, &kernel, axis);
        }
        Volume::new(data)
    }

    /// Smooth every volume of a series, in parallel across volumes.
    pub fn apply_series(&self, series: &VolumeSeries) -> Result<VolumeSeries> {
        let spacing = series.affine().spacing();
        let smoothed: Vec<Volume> = series
            .volumes()
            .par_iter()
            .map(|volume| self.apply(volume, &spacing))
            .collect();
        series.with_volumes(smoothed)
    }
}

/// Smoothed view of `series` for parameter estimation.
///
/// A zero width borrows the original series; anything else produces one new
/// smoothed series up front.
pub fn smooth_series(series: &VolumeSeries, fwhm_mm: f64) -> Result<Cow<'_, VolumeSeries>> {
    let filter = GaussianFilter::from_fwhm(fwhm_mm)?;
    if filter.is_identity() {
        debug!("Smoothing width is zero, estimating on original data");
        return Ok(Cow::Borrowed(series));
    }
    debug!(
        fwhm_mm,
        sigma_mm = filter.sigmas_mm[0],
        volumes = series.len(),
        "Smoothing series for estimation"
    );
    Ok(Cow::Owned(filter.apply_series(series)?))
}

fn generate_kernel(sigma: f64, radius: usize) -> Vec<f64> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=(2 * radius))
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp() // Unnormalized Gaussian
        })
        .collect();

    // Normalize
    let sum: f64 = kernel.iter().sum();
    for val in &mut kernel {
        *val /= sum;
    }
    kernel
}

fn convolve_axis(input: &Array3<f32>, kernel: &[f64], axis: usize) -> Array3<f32> {
    let radius = (kernel.len() / 2) as isize;
    let mut output = Array3::<f32>::zeros(input.raw_dim());
    Zip::from(output.lanes_mut(Axis(axis)))
        .and(input.lanes(Axis(axis)))
        .for_each(|mut out, lane| {
            let last = lane.len() as isize - 1;
            for (i, o) in out.iter_mut().enumerate() {
                let acc: f64 = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let src = (i as isize + k as isize - radius).clamp(0, last);
                        w * lane[src as usize] as f64
                    })
                    .sum();
                *o = acc as f32;
            }
        });
    output
}
