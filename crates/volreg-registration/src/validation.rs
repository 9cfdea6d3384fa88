//! Validation utilities for realignment operations.
//!
//! This module provides validation functions for configuration values and
//! inputs, plus the loss-history convergence check used by the optimizer.

use volreg_core::{ImageError, Volume};

use crate::error::{RegistrationError, Result};

/// Validate that the reference and moving volumes share a grid.
pub fn validate_volume_shapes(reference: &Volume, moving: &Volume) -> Result<()> {
    if reference.shape() != moving.shape() {
        return Err(ImageError::ShapeMismatch {
            expected: reference.shape(),
            actual: moving.shape(),
        }
        .into());
    }
    Ok(())
}

/// Validate iteration count.
pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Iterations must be positive",
        ));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }

    Ok(())
}

/// Validate L-BFGS history size.
pub fn validate_lbfgs_history_size(history_size: usize) -> Result<()> {
    if history_size < 1 {
        return Err(RegistrationError::invalid_configuration(
            "L-BFGS history size must be at least 1",
        ));
    }

    if history_size > 100 {
        return Err(RegistrationError::invalid_configuration(format!(
            "L-BFGS history size too large: {}",
            history_size
        )));
    }

    Ok(())
}

/// Validate a strictly positive, finite tolerance or step size.
pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validate the smoothing width used for estimation.
pub fn validate_smoothing_fwhm(fwhm_mm: f64) -> Result<()> {
    if !fwhm_mm.is_finite() || fwhm_mm < 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Smoothing FWHM must be finite and non-negative, got {}",
            fwhm_mm
        )));
    }
    Ok(())
}

/// Validate the output file prefix.
pub fn validate_output_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(RegistrationError::invalid_configuration(
            "Output prefix must not be empty",
        ));
    }
    if prefix.contains('/') || prefix.contains('\\') {
        return Err(RegistrationError::invalid_configuration(format!(
            "Output prefix must not contain a path separator: '{}'",
            prefix
        )));
    }
    Ok(())
}

/// Check for convergence based on loss history.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceChecker {
    /// Minimum relative improvement over `patience` iterations to keep going.
    pub min_improvement: f64,
    /// Number of iterations to look back.
    pub patience: usize,
    /// Loss below which the run counts as converged.
    pub min_loss: Option<f64>,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self {
            min_improvement: 1e-9,
            patience: 3,
            min_loss: None,
        }
    }
}

impl ConvergenceChecker {
    /// Create a new convergence checker.
    pub fn new(min_improvement: f64, patience: usize) -> Self {
        Self {
            min_improvement,
            patience: patience.max(1),
            min_loss: None,
        }
    }

    /// Set minimum loss threshold.
    pub fn with_min_loss(mut self, min_loss: f64) -> Self {
        self.min_loss = Some(min_loss);
        self
    }

    /// Check if converged based on loss history.
    ///
    /// Compares the latest loss with the loss `patience` iterations earlier.
    pub fn check_convergence(&self, loss_history: &[f64]) -> bool {
        let Some(&current) = loss_history.last() else {
            return false;
        };

        // Check minimum loss threshold
        if let Some(min_loss) = self.min_loss {
            if current < min_loss {
                return true;
            }
        }

        // Need at least patience + 1 samples
        if loss_history.len() < self.patience + 1 {
            return false;
        }

        let earlier = loss_history[loss_history.len() - 1 - self.patience];
        let relative_improvement = (earlier - current) / (earlier.abs() + 1e-10);

        relative_improvement < self.min_improvement
    }
}
