//! Volume filters: Gaussian smoothing for estimation and rigid resampling.

pub mod gaussian;
pub mod resample;

pub use gaussian::{fwhm_to_sigma, smooth_series, GaussianFilter};
pub use resample::{Interpolation, ResampleFilter, Resampler};
