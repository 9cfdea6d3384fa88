//! Mean Squared Error metric implementation.

use nalgebra::Point3;
use volreg_core::interpolation::contains;
use volreg_core::{Interpolator, LinearInterpolator, RigidTransform, Transform, Volume};

use super::trait_::Metric;
use crate::error::{RegistrationError, Result};

/// Mean Squared Error Metric.
///
/// Computes the mean squared difference between voxel intensities:
/// MSE = (1/N) * sum((Reference(x) - Moving(T(x)))^2)
///
/// Every reference voxel contributes. Positions outside the moving grid are
/// sampled with edge clamping, so the metric stays continuous as the
/// transform moves voxels across the boundary.
#[derive(Debug, Clone, Default)]
pub struct MeanSquaredError {
    interpolator: LinearInterpolator,
}

impl MeanSquaredError {
    /// Create a new MSE metric.
    pub fn new() -> Self {
        Self {
            interpolator: LinearInterpolator::new(),
        }
    }
}

impl Metric for MeanSquaredError {
    fn evaluate(
        &self,
        reference: &Volume,
        moving: &Volume,
        transform: &RigidTransform,
    ) -> Result<f64> {
        let moving_shape = moving.shape();
        let mut sum = 0.0;
        let mut inside = 0usize;
        for ((x, y, z), &fixed) in reference.data().indexed_iter() {
            let mapped = transform.map_index(&Point3::new(x as f64, y as f64, z as f64));
            if contains(moving_shape, &mapped) {
                inside += 1;
            }
            let diff = self.interpolator.interpolate(moving, &mapped) - fixed as f64;
            sum += diff * diff;
        }

        if inside == 0 {
            return Err(RegistrationError::metric(
                "no reference voxel maps inside the moving volume",
            ));
        }
        Ok(sum / reference.num_voxels() as f64)
    }

    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use volreg_core::{Affine, RigidParams};

    fn gradient() -> Volume {
        Volume::from_fn([5, 5, 5], |x, y, z| (x + y + z) as f32)
    }

    #[test]
    fn test_mse_identity() {
        let volume = gradient();
        let transform = RigidTransform::identity(volume.center());
        let loss = MeanSquaredError::new().evaluate(&volume, &volume, &transform).unwrap();
        assert!(loss < 1e-12, "MSE should be 0 for identical volumes, got {}", loss);
    }

    #[test]
    fn test_mse_increases_with_shift() {
        let volume = gradient();
        let metric = MeanSquaredError::new();
        let loss_at = |tx: f64| {
            let params = RigidParams::new([tx, 0.0, 0.0, 0.0, 0.0, 0.0]);
            let t =
                RigidTransform::new(&params, &Affine::identity(), Vector3::repeat(2.0)).unwrap();
            metric.evaluate(&volume, &volume, &t).unwrap()
        };
        assert!(loss_at(0.5) > 0.0);
        assert!(loss_at(1.0) > loss_at(0.5));
    }

    #[test]
    fn test_mse_no_overlap() {
        let volume = gradient();
        let params = RigidParams::new([50.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let t = RigidTransform::new(&params, &Affine::identity(), Vector3::zeros()).unwrap();
        let result = MeanSquaredError::new().evaluate(&volume, &volume, &t);
        assert!(matches!(result, Err(RegistrationError::MetricError(_))));
    }
}
