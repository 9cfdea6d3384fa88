//! L-BFGS Optimizer Implementation
//!
//! Limited-memory BFGS over the six rigid parameters.
//! This implementation follows the standard L-BFGS two-loop recursion
//! algorithm, with central finite-difference gradients and a backtracking
//! (Armijo) line search.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use nalgebra::Vector6;
use tracing::{debug, trace};

use crate::error::{RegistrationError, Result};
use crate::validation::{
    validate_iterations, validate_lbfgs_history_size, validate_positive, ConvergenceChecker,
};

/// Sufficient-decrease constant of the Armijo condition.
const ARMIJO_C1: f64 = 1e-4;

/// L-BFGS Configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LbfgsConfig {
    /// History size (number of correction pairs to keep)
    pub history_size: usize,
    /// Iteration cap; reaching it without converging is a failure
    pub max_iterations: usize,
    /// Converged once the gradient norm drops below this value
    pub gradient_tolerance: f64,
    /// Converged once an accepted step is shorter than this
    pub step_tolerance: f64,
    /// Step used for central-difference gradients
    pub finite_difference_step: f64,
    /// Largest parameter change (voxels or radians) of the first step
    pub initial_step: f64,
    /// Maximum number of step halvings per line search
    pub max_line_search_steps: usize,
    /// Optional wall-clock budget per optimization
    pub max_duration: Option<Duration>,
    /// Loss-history stall detection
    pub convergence: ConvergenceChecker,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            history_size: 10,
            max_iterations: 200,
            gradient_tolerance: 1e-6,
            step_tolerance: 1e-7,
            finite_difference_step: 1e-4,
            initial_step: 1.0,
            max_line_search_steps: 30,
            max_duration: None,
            convergence: ConvergenceChecker::default(),
        }
    }
}

impl LbfgsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = tolerance;
        self
    }

    pub fn with_step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = tolerance;
        self
    }

    pub fn with_finite_difference_step(mut self, step: f64) -> Self {
        self.finite_difference_step = step;
        self
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    pub fn with_convergence(mut self, checker: ConvergenceChecker) -> Self {
        self.convergence = checker;
        self
    }

    /// Check every setting before any optimization runs.
    pub fn validate(&self) -> Result<()> {
        validate_lbfgs_history_size(self.history_size)?;
        validate_iterations(self.max_iterations)?;
        validate_positive("gradient tolerance", self.gradient_tolerance)?;
        validate_positive("step tolerance", self.step_tolerance)?;
        validate_positive("finite difference step", self.finite_difference_step)?;
        validate_positive("initial step", self.initial_step)?;
        if self.max_line_search_steps == 0 {
            return Err(RegistrationError::invalid_configuration(
                "line search needs at least one step",
            ));
        }
        if self.max_duration == Some(Duration::ZERO) {
            return Err(RegistrationError::invalid_configuration(
                "time budget must be positive",
            ));
        }
        Ok(())
    }

    /// Initialize L-BFGS optimizer
    pub fn init(self) -> LbfgsOptimizer {
        LbfgsOptimizer::new(self)
    }
}

/// Outcome of a successful minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub params: Vector6<f64>,
    pub loss: f64,
    pub iterations: usize,
    /// Number of objective evaluations, gradients included.
    pub evaluations: usize,
}

/// Correction pairs for the two-loop recursion.
#[derive(Debug, Clone)]
struct History {
    capacity: usize,
    /// (s, y, rho) with s = x_k - x_{k-1}, y = g_k - g_{k-1}, rho = 1 / y^T s
    pairs: VecDeque<(Vector6<f64>, Vector6<f64>, f64)>,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pairs: VecDeque::with_capacity(capacity),
        }
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn clear(&mut self) {
        self.pairs.clear();
    }

    fn push(&mut self, s: Vector6<f64>, y: Vector6<f64>) {
        let ys = y.dot(&s);
        // Curvature condition
        if ys <= 1e-10 {
            return;
        }
        if self.pairs.len() >= self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, 1.0 / ys));
    }

    /// Approximate inverse Hessian times `g`.
    fn apply(&self, g: &Vector6<f64>) -> Vector6<f64> {
        let mut q = *g;
        let mut alphas = Vec::with_capacity(self.pairs.len());

        // First loop (backward)
        for (s, y, rho) in self.pairs.iter().rev() {
            let alpha = rho * s.dot(&q);
            q -= y * alpha;
            alphas.push(alpha);
        }

        // Initial Hessian approximation: gamma = s^T y / y^T y
        let mut r = match self.pairs.back() {
            Some((s, y, _)) => q * (s.dot(y) / y.dot(y)),
            None => q,
        };

        // Second loop (forward); alphas were collected in reverse order
        for ((s, y, rho), alpha) in self.pairs.iter().zip(alphas.iter().rev()) {
            let beta = rho * y.dot(&r);
            r += s * (alpha - beta);
        }
        r
    }
}

/// Counts evaluations and rejects non-finite losses.
struct Objective<F> {
    f: F,
    evaluations: usize,
}

impl<F> Objective<F>
where
    F: FnMut(&Vector6<f64>) -> Result<f64>,
{
    fn value(&mut self, x: &Vector6<f64>) -> Result<f64> {
        self.evaluations += 1;
        let value = (self.f)(x)?;
        if !value.is_finite() {
            return Err(RegistrationError::numerical_instability(format!(
                "objective is {} at {:?}",
                value,
                x.as_slice()
            )));
        }
        Ok(value)
    }

    fn gradient(&mut self, x: &Vector6<f64>, h: f64) -> Result<Vector6<f64>> {
        let mut g = Vector6::zeros();
        for i in 0..6 {
            let mut forward = *x;
            let mut backward = *x;
            forward[i] += h;
            backward[i] -= h;
            g[i] = (self.value(&forward)? - self.value(&backward)?) / (2.0 * h);
        }
        Ok(g)
    }
}

/// L-BFGS Optimizer
#[derive(Debug, Clone)]
pub struct LbfgsOptimizer {
    config: LbfgsConfig,
}

impl Default for LbfgsOptimizer {
    fn default() -> Self {
        Self::new(LbfgsConfig::default())
    }
}

impl LbfgsOptimizer {
    pub fn new(config: LbfgsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LbfgsConfig {
        &self.config
    }

    /// Minimize `objective` starting from `x0`.
    ///
    /// Fails with [`RegistrationError::ConvergenceFailure`] when the iteration
    /// cap or the time budget is exhausted, and with
    /// [`RegistrationError::NumericalInstability`] when the loss is not
    /// finite at an accepted point.
    pub fn minimize<F>(&self, objective: F, x0: Vector6<f64>) -> Result<OptimizationResult>
    where
        F: FnMut(&Vector6<f64>) -> Result<f64>,
    {
        let config = &self.config;
        let start = Instant::now();
        let mut objective = Objective {
            f: objective,
            evaluations: 0,
        };
        let h = config.finite_difference_step;

        let mut x = x0;
        let mut loss = objective.value(&x)?;
        let mut g = objective.gradient(&x, h)?;
        let mut history = History::new(config.history_size);
        let mut losses = vec![loss];

        for iteration in 1..=config.max_iterations {
            let done = |x: Vector6<f64>, loss: f64, evaluations: usize| OptimizationResult {
                params: x,
                loss,
                iterations: iteration - 1,
                evaluations,
            };

            if let Some(limit) = config.max_duration {
                if start.elapsed() > limit {
                    return Err(RegistrationError::convergence_failure(format!(
                        "time budget of {:.3}s exhausted after {} iterations",
                        limit.as_secs_f64(),
                        iteration - 1
                    )));
                }
            }

            if g.norm() < config.gradient_tolerance {
                trace!(iteration, loss, "gradient below tolerance");
                return Ok(done(x, loss, objective.evaluations));
            }

            let mut direction = -history.apply(&g);
            if direction.dot(&g) >= 0.0 {
                // Not a descent direction: restart from steepest descent
                history.clear();
                direction = -g;
            }

            let mut alpha = if history.is_empty() {
                config.initial_step / direction.amax()
            } else {
                1.0
            };
            let slope = g.dot(&direction);

            let mut accepted = None;
            for _ in 0..config.max_line_search_steps {
                let candidate = x + direction * alpha;
                // A trial point the objective cannot score is treated like an
                // increase and the step is halved.
                if let Ok(value) = objective.value(&candidate) {
                    if value <= loss + ARMIJO_C1 * alpha * slope {
                        accepted = Some((candidate, value));
                        break;
                    }
                }
                alpha *= 0.5;
            }

            let Some((x_new, loss_new)) = accepted else {
                debug!(iteration, loss, "line search made no progress, stopping");
                return Ok(done(x, loss, objective.evaluations));
            };

            let g_new = objective.gradient(&x_new, h)?;
            let step = x_new - x;
            history.push(step, g_new - g);

            x = x_new;
            loss = loss_new;
            g = g_new;
            losses.push(loss);
            trace!(iteration, loss, step = step.norm(), "L-BFGS step");

            if step.norm() < config.step_tolerance || config.convergence.check_convergence(&losses)
            {
                return Ok(OptimizationResult {
                    params: x,
                    loss,
                    iterations: iteration,
                    evaluations: objective.evaluations,
                });
            }
        }

        Err(RegistrationError::convergence_failure(format!(
            "no convergence within {} iterations (loss {:.6e})",
            config.max_iterations, loss
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(
        target: Vector6<f64>,
        scales: Vector6<f64>,
    ) -> impl FnMut(&Vector6<f64>) -> Result<f64> {
        move |x: &Vector6<f64>| Ok((x - target).component_mul(&scales).norm_squared())
    }

    #[test]
    fn test_lbfgs_quadratic() {
        let target = Vector6::new(5.0, -2.0, 0.5, 0.1, -0.2, 0.05);
        let scales = Vector6::new(1.0, 2.0, 0.5, 10.0, 8.0, 12.0);
        let result = LbfgsOptimizer::default()
            .minimize(quadratic(target, scales), Vector6::zeros())
            .unwrap();
        assert!(
            (result.params - target).amax() < 1e-3,
            "L-BFGS should optimize to target, got {:?}",
            result.params.as_slice()
        );
        assert!(result.evaluations > 0);
    }

    #[test]
    fn test_lbfgs_starts_at_optimum() {
        let target = Vector6::new(1.0, 1.0, 1.0, 0.0, 0.0, 0.0);
        let result = LbfgsOptimizer::default()
            .minimize(quadratic(target, Vector6::repeat(1.0)), target)
            .unwrap();
        assert_eq!(result.iterations, 0);
        assert_eq!(result.params, target);
    }

    #[test]
    fn test_rosenbrock_like() {
        // Coupled, curved valley in the first two coordinates.
        let objective = |x: &Vector6<f64>| {
            let a = 1.0 - x[0];
            let b = x[1] - x[0] * x[0];
            Ok(a * a + 10.0 * b * b + x.fixed_rows::<4>(2).norm_squared())
        };
        let optimizer = LbfgsConfig::new().with_max_iterations(500).init();
        let result = optimizer.minimize(objective, Vector6::zeros()).unwrap();
        assert!((result.params[0] - 1.0).abs() < 1e-2);
        assert!((result.params[1] - 1.0).abs() < 2e-2);
    }

    #[test]
    fn test_iteration_cap_is_failure() {
        let optimizer = LbfgsConfig::new()
            .with_max_iterations(1)
            .with_convergence(ConvergenceChecker::new(-1.0, 100))
            .init();
        let target = Vector6::new(50.0, -30.0, 20.0, 1.0, 2.0, 3.0);
        let scales = Vector6::new(1.0, 100.0, 0.01, 5.0, 0.1, 50.0);
        let err = optimizer
            .minimize(quadratic(target, scales), Vector6::zeros())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ConvergenceFailure(_)));
    }

    #[test]
    fn test_non_finite_objective() {
        let err = LbfgsOptimizer::default()
            .minimize(|_: &Vector6<f64>| Ok(f64::NAN), Vector6::zeros())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NumericalInstability(_)));
    }

    #[test]
    fn test_config_validation() {
        assert!(LbfgsConfig::default().validate().is_ok());
        assert!(LbfgsConfig::new().with_max_iterations(0).validate().is_err());
        assert!(LbfgsConfig::new().with_history_size(0).validate().is_err());
        assert!(LbfgsConfig::new().with_gradient_tolerance(-1.0).validate().is_err());
        assert!(LbfgsConfig::new()
            .with_max_duration(Duration::ZERO)
            .validate()
            .is_err());
    }
}
