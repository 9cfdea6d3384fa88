//! Metric trait for volume similarity measurement.
//!
//! This module defines the core Metric trait that all similarity metrics
//! must implement for rigid realignment.

use volreg_core::{RigidTransform, Volume};

use crate::error::Result;

/// Metric trait for measuring dissimilarity between volumes.
///
/// Metrics compare the reference volume with the moving volume sampled
/// through a transform. Lower values indicate better alignment.
pub trait Metric: Send + Sync {
    /// Calculate the loss between `reference` and `moving` under `transform`.
    ///
    /// The transform maps reference voxel indices to moving voxel indices.
    fn evaluate(
        &self,
        reference: &Volume,
        moving: &Volume,
        transform: &RigidTransform,
    ) -> Result<f64>;

    /// Get the name of this metric.
    fn name(&self) -> &'static str;
}
