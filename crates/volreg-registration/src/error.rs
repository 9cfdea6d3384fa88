//! Error types for realignment operations.
//!
//! Configuration and input problems are plain [`RegistrationError`] variants.
//! Problems with a single volume are wrapped in a [`VolumeFailure`] that
//! records which volume failed, at which stage, and what was known about it.

use std::fmt;

use thiserror::Error;
use volreg_core::{ImageError, RigidParams};

use crate::trajectory::ParameterTrajectory;

/// Main error type for realignment operations.
#[derive(Error, Debug, Clone)]
pub enum RegistrationError {
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error in metric computation.
    #[error("Metric error: {0}")]
    MetricError(String),

    /// Convergence failure.
    #[error("Convergence failure: {0}")]
    ConvergenceFailure(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Volume, geometry or resampling error from the core crate.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Fail-fast policy stopped the run at the first per-volume failure.
    #[error(
        "Realignment halted after {} completed volumes: {failure}",
        .completed.len()
    )]
    Halted {
        failure: Box<VolumeFailure>,
        completed: ParameterTrajectory,
    },
}

/// Result type for realignment operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a metric error.
    pub fn metric(msg: impl Into<String>) -> Self {
        Self::MetricError(msg.into())
    }

    /// Create a convergence failure error.
    pub fn convergence_failure(msg: impl Into<String>) -> Self {
        Self::ConvergenceFailure(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }
}

/// Stage of the per-volume cycle at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The optimizer produced no parameter vector.
    Estimation,
    /// Parameters were estimated but the volume could not be resampled.
    Resampling,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Estimation => write!(f, "estimation"),
            Self::Resampling => write!(f, "resampling"),
        }
    }
}

/// A single volume that could not be realigned.
#[derive(Error, Debug, Clone)]
#[error("volume {index}: {stage} failed (guess {guess}): {source}")]
pub struct VolumeFailure {
    /// Position of the volume in the (trimmed) series.
    pub index: usize,
    pub stage: FailureStage,
    /// Initial guess handed to the optimizer.
    pub guess: RigidParams,
    /// Estimated parameters; `None` when estimation itself failed.
    pub params: Option<RigidParams>,
    pub source: Box<RegistrationError>,
}

impl VolumeFailure {
    /// Optimizer failure for volume `index`.
    pub fn estimation(index: usize, guess: RigidParams, source: RegistrationError) -> Self {
        Self {
            index,
            stage: FailureStage::Estimation,
            guess,
            params: None,
            source: Box::new(source),
        }
    }

    /// Resampler failure for volume `index` after estimating `params`.
    pub fn resampling(
        index: usize,
        guess: RigidParams,
        params: RigidParams,
        source: RegistrationError,
    ) -> Self {
        Self {
            index,
            stage: FailureStage::Resampling,
            guess,
            params: Some(params),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::invalid_configuration("bad mode");
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
        assert_eq!(err.to_string(), "Invalid configuration: bad mode");
    }

    #[test]
    fn test_image_error_conversion() {
        let err: RegistrationError = ImageError::NoOverlap.into();
        assert!(matches!(err, RegistrationError::Image(ImageError::NoOverlap)));
    }

    #[test]
    fn test_volume_failure_display() {
        let failure = VolumeFailure::estimation(
            2,
            RigidParams::zeros(),
            RegistrationError::convergence_failure("200 iterations"),
        );
        let msg = failure.to_string();
        assert!(msg.starts_with("volume 2: estimation failed"));
        assert!(msg.contains("200 iterations"));
        assert!(failure.params.is_none());
    }

    #[test]
    fn test_halted_display() {
        let failure = VolumeFailure::resampling(
            1,
            RigidParams::zeros(),
            RigidParams::new([50.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ImageError::NoOverlap.into(),
        );
        let err = RegistrationError::Halted {
            failure: Box::new(failure),
            completed: ParameterTrajectory::from_rows(vec![RigidParams::zeros()]),
        };
        let msg = err.to_string();
        assert!(msg.contains("after 1 completed volumes"));
        assert!(msg.contains("resampling failed"));
    }
}
