//! Rigid-body realignment of fMRI volume series.

pub mod metric;
pub mod optimizer;
pub mod error;
pub mod validation;
pub mod progress;
pub mod reference;
pub mod warm_start;
pub mod config;
pub mod trajectory;
pub mod realign;

pub use error::{FailureStage, RegistrationError, Result, VolumeFailure};
pub use validation::ConvergenceChecker;
pub use progress::{
    ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressEvent, ProgressInfo,
    ProgressTracker, RunSummary,
};
pub use reference::ReferenceMode;
pub use warm_start::{NegatePrevious, WarmStart, WarmStartPolicy, ZeroGuess};
pub use config::{FailurePolicy, RealignConfig, RealignOptions};
pub use trajectory::{DisplayTrajectory, ParameterTrajectory};
pub use optimizer::{LbfgsConfig, ParameterOptimizer, RigidRegistration};
pub use realign::{realign_series, RealignOutput, Realigner, RunInputs, StepOutcome};
