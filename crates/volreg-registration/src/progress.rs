//! Progress tracking and callbacks for realignment runs.
//!
//! This module provides per-volume progress reporting for the realignment
//! loop: callbacks are told when a run starts, when each volume is realigned
//! or fails, and when the run completes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use volreg_core::RigidParams;

use crate::error::VolumeFailure;

/// Progress information for one processed volume.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Index of the volume just processed.
    pub volume: usize,
    /// Total number of volumes in the run.
    pub total_volumes: usize,
    /// Accepted parameters (NaN sentinel for a recorded failure).
    pub params: RigidParams,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    /// Create new progress information.
    pub fn new(
        volume: usize,
        total_volumes: usize,
        params: RigidParams,
        elapsed: Duration,
    ) -> Self {
        Self {
            volume,
            total_volumes,
            params,
            elapsed,
            estimated_remaining: None,
        }
    }

    /// Number of volumes processed so far, this one included.
    pub fn completed(&self) -> usize {
        self.volume + 1
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> f64 {
        if self.total_volumes == 0 {
            return 100.0;
        }
        (self.completed() as f64 / self.total_volumes as f64) * 100.0
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self) {
        let done = self.completed();
        let avg_time_per_volume = self.elapsed.as_secs_f64() / done as f64;
        let remaining = self.total_volumes.saturating_sub(done);
        self.estimated_remaining = Some(Duration::from_secs_f64(
            avg_time_per_volume * remaining as f64,
        ));
    }
}

/// Summary handed to [`ProgressCallback::on_complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_volumes: usize,
    pub failed_volumes: usize,
    pub elapsed: Duration,
}

/// Progress callback trait for monitoring realignment progress.
pub trait ProgressCallback: Send + Sync {
    /// Called after each volume is realigned.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when a run over `total_volumes` volumes starts.
    fn on_start(&self, _total_volumes: usize) {
        // Default: no-op
    }

    /// Called when a volume fails, whatever the failure policy.
    fn on_failure(&self, _failure: &VolumeFailure) {
        // Default: no-op
    }

    /// Called when the run finishes without halting.
    fn on_complete(&self, _summary: &RunSummary) {
        // Default: no-op
    }
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (volumes).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.volume % self.log_interval == 0 || info.completed() == info.total_volumes {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.1}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "Volume {}/{} ({:.1}%) | {} | Elapsed: {:.2}s | ETA: {}",
                info.completed(),
                info.total_volumes,
                info.progress_percent(),
                info.params,
                info.elapsed.as_secs_f64(),
                remaining
            );
        }
    }

    fn on_start(&self, total_volumes: usize) {
        tracing::info!("Realignment started: {} volumes", total_volumes);
    }

    fn on_failure(&self, failure: &VolumeFailure) {
        tracing::warn!("Realignment failed for {}", failure);
    }

    fn on_complete(&self, summary: &RunSummary) {
        tracing::info!(
            "Realignment completed in {:.2}s ({} of {} volumes failed)",
            summary.elapsed.as_secs_f64(),
            summary.failed_volumes,
            summary.total_volumes
        );
    }
}

/// Event recorded by [`HistoryCallback`].
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started(usize),
    Volume(ProgressInfo),
    Failed(VolumeFailure),
    Completed(RunSummary),
}

/// History callback that records every event.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressEvent>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<ProgressEvent> {
        self.lock().clone()
    }

    /// Indices of volumes reported as realigned, in order.
    pub fn realigned_volumes(&self) -> Vec<usize> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Volume(info) => Some(info.volume),
                _ => None,
            })
            .collect()
    }

    /// Clear the history.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.lock().push(ProgressEvent::Volume(info.clone()));
    }

    fn on_start(&self, total_volumes: usize) {
        self.lock().push(ProgressEvent::Started(total_volumes));
    }

    fn on_failure(&self, failure: &VolumeFailure) {
        self.lock().push(ProgressEvent::Failed(failure.clone()));
    }

    fn on_complete(&self, summary: &RunSummary) {
        self.lock().push(ProgressEvent::Completed(summary.clone()));
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    /// Registered callbacks.
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    /// Start time.
    start_time: Option<Instant>,
    total_volumes: usize,
    failed_volumes: usize,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("callbacks", &self.callbacks.len())
            .field("total_volumes", &self.total_volumes)
            .finish()
    }
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Builder form of [`add_callback`](Self::add_callback).
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Start tracking a run.
    pub fn start(&mut self, total_volumes: usize) {
        self.start_time = Some(Instant::now());
        self.total_volumes = total_volumes;
        self.failed_volumes = 0;
        for callback in &self.callbacks {
            callback.on_start(total_volumes);
        }
    }

    /// Report a processed volume.
    pub fn volume_done(&self, volume: usize, params: RigidParams) {
        let mut info = ProgressInfo::new(volume, self.total_volumes, params, self.elapsed());
        info.calculate_remaining();

        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// Report a failed volume.
    pub fn volume_failed(&mut self, failure: &VolumeFailure) {
        self.failed_volumes += 1;
        for callback in &self.callbacks {
            callback.on_failure(failure);
        }
    }

    /// Complete tracking.
    pub fn complete(&self) {
        let summary = RunSummary {
            total_volumes: self.total_volumes,
            failed_volumes: self.failed_volumes,
            elapsed: self.elapsed(),
        };
        for callback in &self.callbacks {
            callback.on_complete(&summary);
        }
    }
}
