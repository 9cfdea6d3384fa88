//! Packaging realignment results as output files.

use anyhow::{anyhow, Result};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::info;
use volreg_core::VolumeSeries;
use volreg_registration::{ParameterTrajectory, RealignOutput};

use crate::nifti_io::{write_nifti_series, write_nifti_volume};

/// `<input dir>/<prefix><input file name>`.
pub fn output_path(input: &Path, prefix: &str) -> Result<PathBuf> {
    prefixed_path(input, prefix, "")
}

fn prefixed_path(input: &Path, prefix: &str, tag: &str) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Input path {} has no file name", input.display()))?;
    Ok(input.with_file_name(format!("{prefix}{tag}{name}")))
}

/// Writes the output containers that sit next to the input file.
#[derive(Debug, Clone)]
pub struct SeriesAssembler {
    input: PathBuf,
    prefix: String,
}

impl SeriesAssembler {
    pub fn new(input: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            prefix: prefix.into(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn original_path(&self) -> Result<PathBuf> {
        output_path(&self.input, &self.prefix)
    }

    pub fn realigned_path(&self) -> Result<PathBuf> {
        prefixed_path(&self.input, &self.prefix, "realigned_")
    }

    pub fn mean_path(&self) -> Result<PathBuf> {
        prefixed_path(&self.input, &self.prefix, "mean_")
    }

    /// Re-save the unmodified input intensities with their affine.
    pub fn persist_original(&self, series: &VolumeSeries) -> Result<PathBuf> {
        let path = self.original_path()?;
        write_nifti_series(&path, series)?;
        info!(path = %path.display(), "Saved original series");
        Ok(path)
    }

    /// Save the resampled series produced by the realignment.
    pub fn persist_realigned(&self, output: &RealignOutput) -> Result<PathBuf> {
        let path = self.realigned_path()?;
        write_nifti_series(&path, &output.realigned)?;
        info!(path = %path.display(), "Saved realigned series");
        Ok(path)
    }

    /// Save the voxel-wise mean of the realigned series as a 3D image.
    pub fn persist_mean(&self, output: &RealignOutput) -> Result<PathBuf> {
        let path = self.mean_path()?;
        write_nifti_volume(&path, &output.mean_volume(), &output.affine)?;
        info!(path = %path.display(), "Saved mean volume");
        Ok(path)
    }

    /// The trajectory as a plain `N x 6` table.
    pub fn parameter_table(trajectory: &ParameterTrajectory) -> Array2<f64> {
        trajectory.as_array()
    }
}
