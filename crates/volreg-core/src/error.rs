//! Error types for volume and geometry operations.

use thiserror::Error;

/// Errors raised by volume construction, smoothing and resampling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    /// A series must hold at least one volume.
    #[error("Volume series is empty")]
    EmptySeries,

    /// Volumes (or a volume and its reference grid) disagree in shape.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    /// The linear part of the voxel-to-world affine cannot be inverted.
    #[error("Affine is not invertible: {0}")]
    SingularAffine(String),

    /// Rigid parameters contain NaN or infinite values.
    #[error("Non-finite rigid parameters: {0}")]
    NonFiniteParameters(String),

    /// Every sample position falls outside the moving grid.
    #[error("Transform maps the reference grid entirely outside the moving volume")]
    NoOverlap,

    /// Filter configuration is unusable.
    #[error("Invalid filter parameter: {0}")]
    InvalidParameter(String),

    /// Index outside the series.
    #[error("Volume index {index} out of range for series of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ImageError>;

impl ImageError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a singular affine error.
    pub fn singular_affine(msg: impl Into<String>) -> Self {
        Self::SingularAffine(msg.into())
    }
}
