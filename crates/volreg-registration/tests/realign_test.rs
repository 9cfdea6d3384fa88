use volreg_core::{Affine, ImageError, Resampler, RigidParams, Volume, VolumeSeries};
use volreg_registration::optimizer::ParameterOptimizer;
use volreg_registration::{
    realign_series, FailurePolicy, FailureStage, HistoryCallback, ProgressTracker, RealignConfig,
    RealignOptions, Realigner, ReferenceMode, RegistrationError, Result, RunInputs, StepOutcome,
    WarmStart, ZeroGuess,
};

use std::cell::Cell;
use std::sync::Arc;

const D: usize = 20;

/// Anisotropic Gaussian blob centred at `c` (voxel coordinates).
fn blob(c: [f64; 3]) -> Volume {
    Volume::from_fn([D, D, D], |x, y, z| {
        let dx = (x as f64 - c[0]) / 2.5;
        let dy = (y as f64 - c[1]) / 3.0;
        let dz = (z as f64 - c[2]) / 3.5;
        (100.0 * (-(dx * dx + dy * dy + dz * dz) / 2.0).exp()) as f32
    })
}

fn affine_3mm() -> Affine {
    Affine::from_spacing([3.0, 3.0, 3.0], [-28.5, -28.5, -28.5])
}

fn constant_series(values: &[f32]) -> VolumeSeries {
    let volumes = values.iter().map(|&v| Volume::filled([6, 6, 6], v)).collect();
    VolumeSeries::new(volumes, Affine::identity()).unwrap()
}

/// What a scripted optimizer saw on one call.
#[derive(Debug, Clone)]
struct Call {
    guess: RigidParams,
    reference_mean: f64,
    moving_max: f32,
}

/// Returns a scripted parameter vector per call and records its inputs.
#[derive(Default)]
struct ScriptedOptimizer {
    calls: Vec<Call>,
    fail_on_call: Option<usize>,
}

impl ScriptedOptimizer {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Default::default()
        }
    }

    fn answer(call: usize) -> RigidParams {
        let k = call as f64 + 1.0;
        RigidParams::new([0.1 * k, -0.05 * k, 0.02 * k, 0.001 * k, 0.0, -0.002 * k])
    }

    fn guesses(&self) -> Vec<RigidParams> {
        self.calls.iter().map(|c| c.guess).collect()
    }
}

impl ParameterOptimizer for ScriptedOptimizer {
    fn optimize(
        &mut self,
        reference: &Volume,
        moving: &Volume,
        _affine: &Affine,
        guess: &RigidParams,
    ) -> Result<RigidParams> {
        let call = self.calls.len();
        self.calls.push(Call {
            guess: *guess,
            reference_mean: reference.mean(),
            moving_max: moving.data().fold(f32::MIN, |acc, &v| acc.max(v)),
        });
        if self.fail_on_call == Some(call) {
            return Err(RegistrationError::convergence_failure("scripted failure"));
        }
        Ok(Self::answer(call))
    }
}

#[test]
fn test_single_volume_self_alignment() {
    // 1. N = 1, reference FIRST
    let original = blob([9.5, 9.5, 9.5]);
    let series = VolumeSeries::new(vec![original.clone()], affine_3mm()).unwrap();

    // 2. Realign with the built-in optimizer
    let mut realigner = Realigner::from_config(RealignConfig::default()).unwrap();
    let output = realigner.run(&series).unwrap();

    // 3. Row 0 is the identity and the volume comes back unchanged
    assert_eq!(output.trajectory.len(), 1);
    assert_eq!(output.reference_index, 0);
    let row = output.trajectory.row(0).unwrap();
    assert!(row.max_abs_diff(&RigidParams::zeros()) < 1e-3, "row 0 = {}", row);
    assert_eq!(output.realigned.len(), 1);
    assert!(output.realigned.volumes()[0].max_abs_diff(&original) < 1e-2);
}

#[test]
fn test_recovers_single_shifted_volume() {
    // Volume 3 moved by +2 voxels along x; everything else sits on the reference.
    let still = blob([9.5, 9.5, 9.5]);
    let moved = blob([11.5, 9.5, 9.5]);
    let volumes = vec![still.clone(), still.clone(), still.clone(), moved, still.clone()];
    let series = VolumeSeries::new(volumes, affine_3mm()).unwrap();

    let mut realigner = Realigner::from_config(RealignConfig::default()).unwrap();
    let output = realigner.run(&series).unwrap();

    assert_eq!(output.trajectory.as_array().dim(), (5, 6));
    assert_eq!(output.realigned.len(), 5);
    assert_eq!(output.realigned.shape(), [D, D, D]);
    assert!(output.is_complete());

    let expected = RigidParams::new([2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    for (i, row) in output.trajectory.iter().enumerate() {
        if i == 3 {
            assert!(row.max_abs_diff(&expected) < 0.1, "row 3 = {}", row);
        } else {
            assert!(row.max_abs_diff(&RigidParams::zeros()) < 0.05, "row {} = {}", i, row);
        }
    }

    // The moved volume is brought back onto the reference.
    let restored = &output.realigned.volumes()[3];
    assert!(restored.max_abs_diff(&still) < 5.0);
}

#[test]
fn test_unknown_reference_mode_is_rejected_before_any_work() {
    let series = constant_series(&[1.0, 1.0, 1.0]);
    let options = RealignOptions {
        reference_mode: Some("LAST".to_string()),
        ..Default::default()
    };

    let mut optimizer_calls = None;
    let err = options
        .into_config()
        .and_then(|config| {
            let mut realigner = Realigner::new(config, ScriptedOptimizer::default())?;
            let output = realigner.run(&series);
            optimizer_calls = Some(realigner.optimizer().calls.len());
            output
        })
        .unwrap_err();

    assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
    assert!(err.to_string().contains("invalid reference mode"));
    // No realigner was built, so the optimizer never saw a volume.
    assert_eq!(optimizer_calls, None);

    // An invalid config never reaches the optimizer either.
    let config = RealignConfig::default().with_smoothing_fwhm_mm(-2.0);
    assert!(Realigner::new(config, ScriptedOptimizer::default()).is_err());
}

#[test]
fn test_fail_fast_halts_with_completed_rows() {
    let series = constant_series(&[1.0, 1.0, 1.0, 1.0]);
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::failing_on(2))
        .unwrap();

    let err = realigner.run(&series).unwrap_err();
    match err {
        RegistrationError::Halted { failure, completed } => {
            assert_eq!(failure.index, 2);
            assert_eq!(failure.stage, FailureStage::Estimation);
            assert!(failure.params.is_none());
            assert_eq!(completed.len(), 2);
        }
        other => panic!("expected Halted, got {other:?}"),
    }
    assert_eq!(realigner.optimizer().calls.len(), 3);
}

#[test]
fn test_best_effort_records_nan_row() {
    let series = constant_series(&[1.0, 1.0, 1.0, 1.0]);
    let config = RealignConfig::default().with_failure_policy(FailurePolicy::BestEffort);
    let history = Arc::new(HistoryCallback::new());
    let mut realigner = Realigner::new(config, ScriptedOptimizer::failing_on(2))
        .unwrap()
        .with_progress(ProgressTracker::new().with_callback(history.clone()));

    let output = realigner.run(&series).unwrap();

    assert_eq!(output.trajectory.len(), 4);
    assert!(!output.is_complete());
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].index, 2);

    let rows = output.trajectory.rows();
    assert!(rows[2].is_nan());
    assert!(!rows[1].is_nan());
    assert!(rows[3].is_finite());
    assert!(output.realigned.volumes()[2].has_nan());
    assert!(!output.realigned.volumes()[3].has_nan());

    // The carry is reset after the failure: volume 3 starts from zero.
    let guesses = realigner.optimizer().guesses();
    assert_eq!(guesses.len(), 4);
    assert_eq!(guesses[3], RigidParams::zeros());

    assert_eq!(history.realigned_volumes(), vec![0, 1, 3]);
}

/// Passes volumes through unchanged, except on one scripted call.
struct FailingResampler {
    calls: Cell<usize>,
    fail_on_call: usize,
}

impl FailingResampler {
    fn failing_on(call: usize) -> Self {
        Self {
            calls: Cell::new(0),
            fail_on_call: call,
        }
    }
}

impl Resampler for FailingResampler {
    fn resample(
        &self,
        _params: &RigidParams,
        _reference: &Volume,
        moving: &Volume,
        _affine: &Affine,
    ) -> volreg_core::Result<Volume> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if call == self.fail_on_call {
            return Err(ImageError::NoOverlap);
        }
        Ok(moving.clone())
    }
}

#[test]
fn test_fail_fast_halts_on_resampling_failure() {
    let series = constant_series(&[1.0, 1.0, 1.0, 1.0]);
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::default())
        .unwrap()
        .with_resampler(FailingResampler::failing_on(2));

    let err = realigner.run(&series).unwrap_err();
    match err {
        RegistrationError::Halted { failure, completed } => {
            assert_eq!(failure.index, 2);
            assert_eq!(failure.stage, FailureStage::Resampling);
            // Estimation succeeded, so its parameters are kept on the failure.
            assert_eq!(failure.params, Some(ScriptedOptimizer::answer(2)));
            assert_eq!(completed.len(), 2);
        }
        other => panic!("expected Halted, got {other:?}"),
    }
    assert_eq!(realigner.optimizer().calls.len(), 3);
}

#[test]
fn test_best_effort_resampling_failure_resets_carry() {
    let series = constant_series(&[1.0, 1.0, 1.0, 1.0]);
    let config = RealignConfig::default().with_failure_policy(FailurePolicy::BestEffort);
    let mut realigner = Realigner::new(config, ScriptedOptimizer::default())
        .unwrap()
        .with_resampler(FailingResampler::failing_on(2));

    let output = realigner.run(&series).unwrap();

    assert_eq!(output.trajectory.len(), 4);
    assert_eq!(output.failures.len(), 1);
    let failure = &output.failures[0];
    assert_eq!(failure.index, 2);
    assert_eq!(failure.stage, FailureStage::Resampling);
    assert_eq!(failure.params, Some(ScriptedOptimizer::answer(2)));

    let rows = output.trajectory.rows();
    assert!(rows[2].is_nan());
    assert!(rows[3].is_finite());
    assert!(output.realigned.volumes()[2].has_nan());
    assert!(!output.realigned.volumes()[3].has_nan());

    // Volume 3 starts from the no-history guess, not from the unresampled estimate.
    let guesses = realigner.optimizer().guesses();
    assert_eq!(guesses.len(), 4);
    assert_eq!(guesses[2], -ScriptedOptimizer::answer(1));
    assert_eq!(guesses[3], RigidParams::zeros());
}

#[test]
fn test_negate_previous_warm_start() {
    let series = constant_series(&[1.0; 5]);
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::default())
        .unwrap();
    let output = realigner.run(&series).unwrap();

    let guesses = realigner.optimizer().guesses();
    assert_eq!(guesses[0], RigidParams::zeros());
    for i in 1..guesses.len() {
        assert_eq!(guesses[i], -*output.trajectory.row(i - 1).unwrap());
    }
}

#[test]
fn test_zero_warm_start() {
    let series = constant_series(&[1.0; 4]);
    let config = RealignConfig::default().with_warm_start(WarmStart::Zero);
    let mut realigner = Realigner::new(config, ScriptedOptimizer::default()).unwrap();
    realigner.run(&series).unwrap();
    assert!(realigner
        .optimizer()
        .guesses()
        .iter()
        .all(|g| *g == RigidParams::zeros()));

    // Same through an explicitly installed policy.
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::default())
        .unwrap()
        .with_warm_start_policy(ZeroGuess);
    realigner.run(&series).unwrap();
    assert!(realigner.optimizer().guesses()[1..]
        .iter()
        .all(|g| *g == RigidParams::zeros()));
}

#[test]
fn test_closure_warm_start_policy() {
    let series = constant_series(&[1.0; 3]);
    let fixed = RigidParams::new([0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::default())
        .unwrap()
        .with_warm_start_policy(move |_: Option<&RigidParams>| fixed);
    realigner.run(&series).unwrap();
    assert!(realigner.optimizer().guesses().iter().all(|g| *g == fixed));
}

#[test]
fn test_drop_leading_before_reference_selection() {
    // Volume k is filled with the value k.
    let series = constant_series(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let config = RealignConfig::default()
        .with_drop_leading_volumes(2)
        .with_reference_mode(ReferenceMode::Middle);
    let mut realigner = Realigner::new(config, ScriptedOptimizer::default()).unwrap();
    let output = realigner.run(&series).unwrap();

    // Trimmed series is [2, 3, 4, 5]; MIDDLE picks index 2, i.e. value 4.
    assert_eq!(output.dropped_volumes, 2);
    assert_eq!(output.reference_index, 2);
    assert_eq!(output.trajectory.len(), 4);
    for call in &realigner.optimizer().calls {
        assert_eq!(call.reference_mean, 4.0);
    }
}

#[test]
fn test_dropping_every_volume_is_rejected() {
    let series = constant_series(&[1.0, 1.0]);
    let config = RealignConfig::default().with_drop_leading_volumes(2);
    let mut realigner = Realigner::new(config, ScriptedOptimizer::default()).unwrap();
    assert!(matches!(
        realigner.run(&series),
        Err(RegistrationError::InvalidConfiguration(_))
    ));
    assert!(realigner.optimizer().calls.is_empty());
}

#[test]
fn test_estimation_sees_smoothed_data() {
    // A single bright voxel in an otherwise empty volume.
    let spike = Volume::from_fn([9, 9, 9], |x, y, z| {
        if (x, y, z) == (4, 4, 4) {
            100.0
        } else {
            0.0
        }
    });
    let series =
        VolumeSeries::new(vec![spike.clone(), spike.clone()], Affine::identity()).unwrap();
    let config = RealignConfig::default().with_smoothing_fwhm_mm(4.0);
    let mut realigner = Realigner::new(config, ScriptedOptimizer::default()).unwrap();
    let output = realigner.run(&series).unwrap();

    // Estimation saw the blurred copy, the reference stays the raw volume.
    for call in &realigner.optimizer().calls {
        assert!(call.moving_max < 100.0);
        assert!((call.reference_mean - spike.mean()).abs() < 1e-9);
    }
    assert_eq!(output.realigned.shape(), [9, 9, 9]);
    assert_eq!(output.realigned.len(), 2);
}

#[test]
fn test_reference_fast_path() {
    let series = constant_series(&[1.0, 2.0, 3.0]);
    let config = RealignConfig::default()
        .with_reference_mode(ReferenceMode::Middle)
        .with_reference_fast_path(true);
    let mut realigner = Realigner::new(config, ScriptedOptimizer::default()).unwrap();
    let output = realigner.run(&series).unwrap();

    assert_eq!(realigner.optimizer().calls.len(), 2);
    assert_eq!(*output.trajectory.row(1).unwrap(), RigidParams::zeros());
    assert_eq!(output.realigned.volumes()[1], series.volumes()[1]);

    // Volume 2 is seeded from the reference's zero vector.
    assert_eq!(realigner.optimizer().guesses()[1], RigidParams::zeros());
}

#[test]
fn test_single_step_in_isolation() {
    let series = constant_series(&[1.0, 1.0, 1.0]);
    let inputs = RunInputs::new(&series, &series, 0).unwrap();
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::default())
        .unwrap();

    let carry = RigidParams::new([0.3, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let (outcome, next) = realigner.step(&inputs, Some(carry), 2).unwrap();

    assert_eq!(realigner.optimizer().guesses(), vec![-carry]);
    match outcome {
        StepOutcome::Realigned { params, volume } => {
            assert_eq!(Some(params), next);
            assert_eq!(volume.shape(), [6, 6, 6]);
        }
        StepOutcome::Failed(failure) => panic!("unexpected failure: {failure}"),
    }
}

#[test]
fn test_run_inputs_reject_mismatched_views() {
    let original = constant_series(&[1.0, 1.0]);
    let shorter = constant_series(&[1.0]);
    assert!(RunInputs::new(&original, &shorter, 0).is_err());
    assert!(RunInputs::new(&original, &original, 2).is_err());
}

#[test]
fn test_deterministic_trajectories() {
    let volumes = vec![
        blob([9.5, 9.5, 9.5]),
        blob([10.0, 9.5, 9.0]),
        blob([9.0, 10.0, 9.5]),
    ];
    let series = VolumeSeries::new(volumes, affine_3mm()).unwrap();
    let config = RealignConfig::default().with_smoothing_fwhm_mm(3.0);

    let first = Realigner::from_config(config.clone()).unwrap().run(&series).unwrap();
    let second = realign_series(&series, config).unwrap();
    assert_eq!(first.trajectory, second.trajectory);
}

#[test]
fn test_mean_volume_of_output() {
    let series = constant_series(&[2.0, 2.0, 2.0]);
    let mut realigner = Realigner::new(RealignConfig::default(), ScriptedOptimizer::default())
        .unwrap();
    let output = realigner.run(&series).unwrap();
    let mean = output.mean_volume();
    assert_eq!(mean.shape(), [6, 6, 6]);
    // Interior voxels only see the constant; edges may sample outside the grid.
    assert!((mean.get([3, 3, 3]).unwrap() - 2.0).abs() < 1e-4);
}
