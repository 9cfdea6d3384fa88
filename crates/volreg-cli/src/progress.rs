//! Terminal progress bar for realignment runs.

use indicatif::{ProgressBar, ProgressStyle};
use volreg_registration::{ProgressCallback, ProgressInfo, RunSummary, VolumeFailure};

/// Drives an `indicatif` bar from realignment progress events.
pub struct ProgressBarCallback {
    bar: ProgressBar,
}

impl ProgressBarCallback {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                     {pos}/{len} volumes ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Leave the bar on screen after a halted run.
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressCallback for ProgressBarCallback {
    fn on_start(&self, total_volumes: usize) {
        self.bar.set_length(total_volumes as u64);
        self.bar.set_position(0);
    }

    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_message(info.params.to_string());
        self.bar.inc(1);
    }

    fn on_failure(&self, failure: &VolumeFailure) {
        self.bar.println(format!("volume {} failed: {}", failure.index, failure.source));
        self.bar.inc(1);
    }

    fn on_complete(&self, summary: &RunSummary) {
        self.bar.finish_with_message(format!(
            "done, {} failed",
            summary.failed_volumes
        ));
    }
}
