//! Optimizer trait for rigid parameter estimation.
//!
//! This module defines the capability the realignment loop needs from an
//! optimizer: turn a reference/moving pair and an initial guess into a
//! best-fit parameter vector.

use volreg_core::{Affine, RigidParams, Volume};

use crate::error::Result;

/// Estimates the rigid-body parameters aligning `moving` to `reference`.
///
/// Implementations may keep state between calls (counters, caches), hence
/// `&mut self`. The loop calls [`optimize`](Self::optimize) once per volume,
/// in acquisition order.
///
/// # Examples
///
/// ```rust
/// use volreg_core::{Affine, RigidParams, Volume};
/// use volreg_registration::optimizer::ParameterOptimizer;
/// use volreg_registration::Result;
///
/// /// Accepts the initial guess unchanged.
/// struct KeepGuess;
///
/// impl ParameterOptimizer for KeepGuess {
///     fn optimize(
///         &mut self,
///         _reference: &Volume,
///         _moving: &Volume,
///         _affine: &Affine,
///         guess: &RigidParams,
///     ) -> Result<RigidParams> {
///         Ok(*guess)
///     }
/// }
/// ```
pub trait ParameterOptimizer {
    fn optimize(
        &mut self,
        reference: &Volume,
        moving: &Volume,
        affine: &Affine,
        guess: &RigidParams,
    ) -> Result<RigidParams>;
}
