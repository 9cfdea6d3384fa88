//! The per-volume realignment loop.
//!
//! Every volume of a series is registered to one reference volume. The run
//! proceeds in acquisition order as a fold: each [`Realigner::step`] receives
//! the previously accepted parameters (the carry), turns them into an initial
//! guess through the warm-start policy, estimates on the smoothed copy,
//! resamples the original data and hands back the next carry.

use std::borrow::Cow;

use tracing::{debug, info, warn};
use volreg_core::filter::smooth_series;
use volreg_core::{Affine, ResampleFilter, Resampler, RigidParams, Volume, VolumeSeries};

use crate::config::{FailurePolicy, RealignConfig};
use crate::error::{RegistrationError, Result, VolumeFailure};
use crate::optimizer::{ParameterOptimizer, RigidRegistration};
use crate::progress::ProgressTracker;
use crate::trajectory::ParameterTrajectory;
use crate::warm_start::WarmStartPolicy;

/// Read-only inputs shared by every step of a run.
///
/// `smoothed` is the estimation view; it may be the very same series as
/// `original` when no smoothing is requested.
#[derive(Debug, Clone, Copy)]
pub struct RunInputs<'a> {
    original: &'a VolumeSeries,
    smoothed: &'a VolumeSeries,
    reference_index: usize,
}

impl<'a> RunInputs<'a> {
    pub fn new(
        original: &'a VolumeSeries,
        smoothed: &'a VolumeSeries,
        reference_index: usize,
    ) -> Result<Self> {
        if smoothed.len() != original.len() {
            return Err(RegistrationError::invalid_configuration(format!(
                "smoothed series has {} volumes, original has {}",
                smoothed.len(),
                original.len()
            )));
        }
        if smoothed.shape() != original.shape() {
            return Err(volreg_core::ImageError::ShapeMismatch {
                expected: original.shape(),
                actual: smoothed.shape(),
            }
            .into());
        }
        original.volume(reference_index)?;
        original.affine().validate()?;
        Ok(Self {
            original,
            smoothed,
            reference_index,
        })
    }

    pub fn original(&self) -> &'a VolumeSeries {
        self.original
    }

    pub fn smoothed(&self) -> &'a VolumeSeries {
        self.smoothed
    }

    pub fn reference_index(&self) -> usize {
        self.reference_index
    }

    /// The alignment target, taken from the original (unsmoothed) data.
    pub fn reference(&self) -> &'a Volume {
        &self.original.volumes()[self.reference_index]
    }

    pub fn affine(&self) -> &'a Affine {
        self.original.affine()
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }
}

/// Result of a single step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Realigned { params: RigidParams, volume: Volume },
    Failed(VolumeFailure),
}

/// Everything a completed run produces.
#[derive(Debug, Clone)]
pub struct RealignOutput {
    /// One row per volume of the (trimmed) series.
    pub trajectory: ParameterTrajectory,
    /// Original data resampled into the reference frame.
    pub realigned: VolumeSeries,
    pub affine: Affine,
    /// Reference index within the trimmed series.
    pub reference_index: usize,
    /// Leading volumes removed before realignment.
    pub dropped_volumes: usize,
    /// Failures recorded under the best-effort policy.
    pub failures: Vec<VolumeFailure>,
}

impl RealignOutput {
    /// True when every volume was realigned.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Voxel-wise mean of the realigned series, ignoring failed volumes.
    pub fn mean_volume(&self) -> Volume {
        self.realigned.mean_volume()
    }
}

/// Per-run accumulator threaded through the fold.
#[derive(Debug, Default)]
struct Accumulator {
    trajectory: ParameterTrajectory,
    volumes: Vec<Volume>,
    failures: Vec<VolumeFailure>,
}

/// Drives the optimizer and resampler over a series.
pub struct Realigner<O, R = ResampleFilter> {
    config: RealignConfig,
    optimizer: O,
    resampler: R,
    warm_start: Box<dyn WarmStartPolicy>,
    progress: ProgressTracker,
}

impl Realigner<RigidRegistration, ResampleFilter> {
    /// Realigner with the built-in MSE/L-BFGS optimizer configured from `config`.
    pub fn from_config(config: RealignConfig) -> Result<Self> {
        let optimizer = RigidRegistration::mse(config.optimizer.clone());
        Self::new(config, optimizer)
    }
}

impl<O: ParameterOptimizer> Realigner<O, ResampleFilter> {
    /// Validate `config` and build a realigner around `optimizer`.
    ///
    /// Fails before touching any data when the configuration is invalid.
    pub fn new(config: RealignConfig, optimizer: O) -> Result<Self> {
        config.validate()?;
        let resampler = ResampleFilter::new(config.interpolation);
        let warm_start = config.warm_start.policy();
        Ok(Self {
            config,
            optimizer,
            resampler,
            warm_start,
            progress: ProgressTracker::new(),
        })
    }
}

impl<O: ParameterOptimizer, R: Resampler> Realigner<O, R> {
    /// Replace the resampler.
    pub fn with_resampler<R2: Resampler>(self, resampler: R2) -> Realigner<O, R2> {
        Realigner {
            config: self.config,
            optimizer: self.optimizer,
            resampler,
            warm_start: self.warm_start,
            progress: self.progress,
        }
    }

    /// Replace the warm-start policy chosen by the configuration.
    pub fn with_warm_start_policy(mut self, policy: impl WarmStartPolicy + 'static) -> Self {
        self.warm_start = Box::new(policy);
        self
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &RealignConfig {
        &self.config
    }

    pub fn optimizer(&self) -> &O {
        &self.optimizer
    }

    /// Full run: trim leading volumes, smooth, pick the reference, realign.
    pub fn run(&mut self, series: &VolumeSeries) -> Result<RealignOutput> {
        let dropped = self.config.drop_leading_volumes;
        self.config.validate_series_length(series.len())?;

        let trimmed: Cow<'_, VolumeSeries> = if dropped == 0 {
            Cow::Borrowed(series)
        } else {
            info!(dropped, remaining = series.len() - dropped, "Dropping leading volumes");
            Cow::Owned(series.drop_leading(dropped)?)
        };

        let reference_index = self.config.reference_mode.select(trimmed.len())?;
        let smoothed = smooth_series(&trimmed, self.config.smoothing_fwhm_mm)?;
        info!(
            volumes = trimmed.len(),
            reference = reference_index,
            mode = %self.config.reference_mode,
            fwhm_mm = self.config.smoothing_fwhm_mm,
            "Realigning series"
        );

        let mut output = self.realign(&trimmed, &smoothed, reference_index)?;
        output.dropped_volumes = dropped;
        Ok(output)
    }

    /// Realign `original` to its volume `reference_index`, estimating on
    /// `smoothed`.
    pub fn realign(
        &mut self,
        original: &VolumeSeries,
        smoothed: &VolumeSeries,
        reference_index: usize,
    ) -> Result<RealignOutput> {
        let inputs = RunInputs::new(original, smoothed, reference_index)?;
        let len = inputs.len();
        let shape = original.shape();
        let policy = self.config.failure_policy;
        self.progress.start(len);

        let initial = Accumulator {
            trajectory: ParameterTrajectory::with_capacity(len),
            volumes: Vec::with_capacity(len),
            failures: Vec::new(),
        };

        let (acc, _) = (0..len).try_fold(
            (initial, None),
            |(mut acc, carry): (Accumulator, Option<RigidParams>),
             index|
             -> Result<(Accumulator, Option<RigidParams>)> {
                let (outcome, next) = self.step(&inputs, carry, index)?;
                match outcome {
                    StepOutcome::Realigned { params, volume } => {
                        self.progress.volume_done(index, params);
                        acc.trajectory.push(params);
                        acc.volumes.push(volume);
                    }
                    StepOutcome::Failed(failure) => {
                        self.progress.volume_failed(&failure);
                        match policy {
                            FailurePolicy::FailFast => {
                                return Err(RegistrationError::Halted {
                                    failure: Box::new(failure),
                                    completed: acc.trajectory,
                                });
                            }
                            FailurePolicy::BestEffort => {
                                warn!(index, "Recording failed volume as NaN: {}", failure);
                                acc.trajectory.push(RigidParams::nan());
                                acc.volumes.push(Volume::filled(shape, f32::NAN));
                                acc.failures.push(failure);
                            }
                        }
                    }
                }
                Ok((acc, next))
            },
        )?;

        self.progress.complete();
        Ok(RealignOutput {
            trajectory: acc.trajectory,
            realigned: original.with_volumes(acc.volumes)?,
            affine: *original.affine(),
            reference_index,
            dropped_volumes: 0,
            failures: acc.failures,
        })
    }

    /// Process volume `index` given the carried previous estimate.
    ///
    /// Returns the outcome and the carry for the next volume: the accepted
    /// parameters on success, `None` after a failure.
    pub fn step(
        &mut self,
        inputs: &RunInputs<'_>,
        carry: Option<RigidParams>,
        index: usize,
    ) -> Result<(StepOutcome, Option<RigidParams>)> {
        let original = inputs.original().volume(index)?;
        let moving = inputs.smoothed().volume(index)?;
        let reference = inputs.reference();
        let affine = inputs.affine();

        if self.config.reference_fast_path && index == inputs.reference_index() {
            debug!(index, "Reference volume passed through unchanged");
            let params = RigidParams::zeros();
            let outcome = StepOutcome::Realigned {
                params,
                volume: original.clone(),
            };
            return Ok((outcome, Some(params)));
        }

        let guess = self.warm_start.initial_guess(carry.as_ref());
        let estimated = self
            .optimizer
            .optimize(reference, moving, affine, &guess)
            .and_then(|params| -> Result<RigidParams> {
                params.ensure_finite()?;
                Ok(params)
            });
        let params = match estimated {
            Ok(params) => params,
            Err(err) => {
                let failure = VolumeFailure::estimation(index, guess, err);
                return Ok((StepOutcome::Failed(failure), None));
            }
        };
        debug!(index, guess = %guess, params = %params, "Estimated rigid parameters");

        match self.resampler.resample(&params, reference, original, affine) {
            Ok(volume) => Ok((StepOutcome::Realigned { params, volume }, Some(params))),
            Err(err) => {
                let failure = VolumeFailure::resampling(index, guess, params, err.into());
                Ok((StepOutcome::Failed(failure), None))
            }
        }
    }
}

/// Realign `series` with the built-in optimizer and resampler.
pub fn realign_series(series: &VolumeSeries, config: RealignConfig) -> Result<RealignOutput> {
    Realigner::from_config(config)?.run(series)
}
