//! Metric-driven rigid registration of one volume pair.

use nalgebra::Vector6;
use tracing::debug;
use volreg_core::{Affine, RigidParams, RigidTransform, Volume};

use super::lbfgs::{LbfgsConfig, LbfgsOptimizer};
use super::trait_::ParameterOptimizer;
use crate::error::Result;
use crate::metric::{MeanSquaredError, Metric};
use crate::validation::validate_volume_shapes;

/// Rigid registration: minimizes a [`Metric`] over the six rigid parameters
/// with L-BFGS.
///
/// The transform rotates about the voxel-space centre of the reference grid.
#[derive(Debug, Clone)]
pub struct RigidRegistration<M = MeanSquaredError> {
    metric: M,
    optimizer: LbfgsOptimizer,
}

impl RigidRegistration<MeanSquaredError> {
    /// Mean-squared-error registration with the given optimizer settings.
    pub fn mse(config: LbfgsConfig) -> Self {
        Self::new(MeanSquaredError::new(), LbfgsOptimizer::new(config))
    }
}

impl Default for RigidRegistration<MeanSquaredError> {
    fn default() -> Self {
        Self::mse(LbfgsConfig::default())
    }
}

impl<M: Metric> RigidRegistration<M> {
    pub fn new(metric: M, optimizer: LbfgsOptimizer) -> Self {
        Self { metric, optimizer }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn optimizer(&self) -> &LbfgsOptimizer {
        &self.optimizer
    }
}

impl<M: Metric> ParameterOptimizer for RigidRegistration<M> {
    fn optimize(
        &mut self,
        reference: &Volume,
        moving: &Volume,
        affine: &Affine,
        guess: &RigidParams,
    ) -> Result<RigidParams> {
        validate_volume_shapes(reference, moving)?;
        guess.ensure_finite()?;
        affine.validate()?;

        let center = reference.center();
        let metric = &self.metric;
        let objective = |x: &Vector6<f64>| -> Result<f64> {
            let transform = RigidTransform::new(&RigidParams(*x), affine, center)?;
            metric.evaluate(reference, moving, &transform)
        };

        let result = self.optimizer.minimize(objective, guess.0)?;
        debug!(
            metric = metric.name(),
            iterations = result.iterations,
            evaluations = result.evaluations,
            loss = result.loss,
            "Rigid registration converged"
        );
        Ok(RigidParams(result.params))
    }
}
