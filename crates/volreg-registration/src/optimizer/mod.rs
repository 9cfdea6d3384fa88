//! Optimizer module for rigid parameter estimation.
//!
//! [`LbfgsOptimizer`] minimizes a scalar objective over the six rigid
//! parameters; [`RigidRegistration`] wires it to a [`Metric`](crate::metric::Metric)
//! and exposes it through the [`ParameterOptimizer`] capability used by the
//! realignment loop.
//!
//! # Examples
//!
//! ```rust
//! use volreg_registration::optimizer::{LbfgsConfig, RigidRegistration};
//!
//! let config = LbfgsConfig::new().with_max_iterations(100);
//! let registration = RigidRegistration::mse(config);
//! ```

pub mod trait_;
pub mod lbfgs;
pub mod rigid;

pub use trait_::ParameterOptimizer;
pub use lbfgs::{LbfgsConfig, LbfgsOptimizer, OptimizationResult};
pub use rigid::RigidRegistration;
