//! Realignment configuration.
//!
//! [`RealignConfig`] is the validated, strongly typed configuration used by
//! the loop. [`RealignOptions`] is its serde-facing counterpart: every field
//! optional, loaded from JSON and checked when converted.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use volreg_core::Interpolation;

use crate::error::{RegistrationError, Result};
use crate::optimizer::LbfgsConfig;
use crate::reference::ReferenceMode;
use crate::validation::{validate_output_prefix, validate_smoothing_fwhm};
use crate::warm_start::WarmStart;

/// What happens when a single volume cannot be realigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailurePolicy {
    /// Stop at the first failure.
    #[default]
    FailFast,
    /// Record the failure, emit a NaN row and volume, and continue.
    BestEffort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Configuration of one realignment run.
#[derive(Debug, Clone, PartialEq)]
pub struct RealignConfig {
    pub reference_mode: ReferenceMode,
    /// Gaussian FWHM (mm) applied to the estimation copy; 0 disables smoothing.
    pub smoothing_fwhm_mm: f64,
    /// Prefix of the output file name.
    pub output_prefix: String,
    /// Leading volumes removed before reference selection.
    pub drop_leading_volumes: usize,
    pub failure_policy: FailurePolicy,
    pub warm_start: WarmStart,
    /// Skip estimation for the reference volume and emit it unchanged.
    pub reference_fast_path: bool,
    pub interpolation: Interpolation,
    pub optimizer: LbfgsConfig,
}

impl Default for RealignConfig {
    fn default() -> Self {
        Self {
            reference_mode: ReferenceMode::First,
            smoothing_fwhm_mm: 0.0,
            output_prefix: "r".to_string(),
            drop_leading_volumes: 0,
            failure_policy: FailurePolicy::FailFast,
            warm_start: WarmStart::NegatePrevious,
            reference_fast_path: false,
            interpolation: Interpolation::Linear,
            optimizer: LbfgsConfig::default(),
        }
    }
}

impl RealignConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_mode(mut self, mode: ReferenceMode) -> Self {
        self.reference_mode = mode;
        self
    }

    pub fn with_smoothing_fwhm_mm(mut self, fwhm_mm: f64) -> Self {
        self.smoothing_fwhm_mm = fwhm_mm;
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    pub fn with_drop_leading_volumes(mut self, count: usize) -> Self {
        self.drop_leading_volumes = count;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_warm_start(mut self, warm_start: WarmStart) -> Self {
        self.warm_start = warm_start;
        self
    }

    pub fn with_reference_fast_path(mut self, enabled: bool) -> Self {
        self.reference_fast_path = enabled;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_optimizer(mut self, optimizer: LbfgsConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Check every setting; called before any I/O or optimizer call.
    pub fn validate(&self) -> Result<()> {
        validate_smoothing_fwhm(self.smoothing_fwhm_mm)?;
        validate_output_prefix(&self.output_prefix)?;
        self.optimizer.validate()
    }

    /// Check that dropping leading volumes leaves something to realign.
    pub fn validate_series_length(&self, len: usize) -> Result<()> {
        if self.drop_leading_volumes >= len {
            return Err(RegistrationError::invalid_configuration(format!(
                "dropping {} leading volumes leaves nothing of a {}-volume series",
                self.drop_leading_volumes, len
            )));
        }
        Ok(())
    }
}

/// Serializable realignment options, e.g. from a JSON file.
///
/// Missing fields take the [`RealignConfig`] defaults. Reference modes are
/// parsed case-insensitively at conversion time so that an unknown mode is
/// reported as a configuration error.
///
/// # Examples
///
/// ```rust
/// use volreg_registration::RealignOptions;
///
/// let json = r#"{ "reference_mode": "middle", "smoothing_fwhm_mm": 5.0 }"#;
/// let options = RealignOptions::from_json(json).unwrap();
/// let config = options.into_config().unwrap();
/// assert_eq!(config.smoothing_fwhm_mm, 5.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealignOptions {
    pub reference_mode: Option<String>,
    pub smoothing_fwhm_mm: Option<f64>,
    pub output_prefix: Option<String>,
    pub drop_leading_volumes: Option<usize>,
    pub failure_policy: Option<FailurePolicy>,
    pub warm_start: Option<WarmStart>,
    pub reference_fast_path: Option<bool>,
    pub interpolation: Option<Interpolation>,
    pub max_iterations: Option<usize>,
    pub history_size: Option<usize>,
    pub gradient_tolerance: Option<f64>,
    pub max_duration_secs: Option<f64>,
}

impl RealignOptions {
    /// Parse options from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            RegistrationError::invalid_configuration(format!("malformed options: {}", e))
        })
    }

    /// Options overlaid on the defaults, then validated.
    pub fn into_config(self) -> Result<RealignConfig> {
        self.apply_to(RealignConfig::default())
    }

    /// Overlay the options that are set on `base`, then validate.
    pub fn apply_to(self, base: RealignConfig) -> Result<RealignConfig> {
        let mut config = base;
        if let Some(mode) = self.reference_mode {
            config.reference_mode = mode.parse()?;
        }
        if let Some(fwhm) = self.smoothing_fwhm_mm {
            config.smoothing_fwhm_mm = fwhm;
        }
        if let Some(prefix) = self.output_prefix {
            config.output_prefix = prefix;
        }
        if let Some(count) = self.drop_leading_volumes {
            config.drop_leading_volumes = count;
        }
        if let Some(policy) = self.failure_policy {
            config.failure_policy = policy;
        }
        if let Some(warm_start) = self.warm_start {
            config.warm_start = warm_start;
        }
        if let Some(enabled) = self.reference_fast_path {
            config.reference_fast_path = enabled;
        }
        if let Some(interpolation) = self.interpolation {
            config.interpolation = interpolation;
        }
        if let Some(iterations) = self.max_iterations {
            config.optimizer.max_iterations = iterations;
        }
        if let Some(size) = self.history_size {
            config.optimizer.history_size = size;
        }
        if let Some(tolerance) = self.gradient_tolerance {
            config.optimizer.gradient_tolerance = tolerance;
        }
        if let Some(secs) = self.max_duration_secs {
            let duration = Duration::try_from_secs_f64(secs).map_err(|_| {
                RegistrationError::invalid_configuration(format!(
                    "time budget must be a non-negative number of seconds, got {}",
                    secs
                ))
            })?;
            config.optimizer.max_duration = Some(duration);
        }
        config.validate()?;
        Ok(config)
    }
}
