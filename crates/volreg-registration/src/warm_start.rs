//! Initial guesses for successive volumes.
//!
//! Each volume's optimization is seeded from the previously accepted
//! parameter vector through a [`WarmStartPolicy`]. The first volume, and any
//! volume following a failed one, sees no previous estimate.

use std::fmt;

use serde::{Deserialize, Serialize};
use volreg_core::RigidParams;

/// Maps the previous volume's accepted parameters to the next initial guess.
///
/// Closures `Fn(Option<&RigidParams>) -> RigidParams` implement this trait.
pub trait WarmStartPolicy: Send + Sync {
    fn initial_guess(&self, previous: Option<&RigidParams>) -> RigidParams;
}

/// Seed with the negated previous estimate; zero when there is none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegatePrevious;

impl WarmStartPolicy for NegatePrevious {
    fn initial_guess(&self, previous: Option<&RigidParams>) -> RigidParams {
        previous.map(|p| -*p).unwrap_or_default()
    }
}

/// Always start from the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroGuess;

impl WarmStartPolicy for ZeroGuess {
    fn initial_guess(&self, _previous: Option<&RigidParams>) -> RigidParams {
        RigidParams::zeros()
    }
}

impl<F> WarmStartPolicy for F
where
    F: Fn(Option<&RigidParams>) -> RigidParams + Send + Sync,
{
    fn initial_guess(&self, previous: Option<&RigidParams>) -> RigidParams {
        self(previous)
    }
}

/// Built-in policy selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarmStart {
    #[default]
    NegatePrevious,
    Zero,
}

impl WarmStart {
    pub fn policy(self) -> Box<dyn WarmStartPolicy> {
        match self {
            Self::NegatePrevious => Box::new(NegatePrevious),
            Self::Zero => Box::new(ZeroGuess),
        }
    }
}

impl fmt::Display for WarmStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegatePrevious => write!(f, "negate-previous"),
            Self::Zero => write!(f, "zero"),
        }
    }
}
