//! Reference volume selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// Which volume of the series every other volume is aligned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum ReferenceMode {
    /// Volume 0.
    #[default]
    First,
    /// Volume `N / 2` (integer division).
    Middle,
}

impl ReferenceMode {
    /// Index of the reference volume in a series of `len` volumes.
    pub fn select(self, len: usize) -> Result<usize> {
        if len == 0 {
            return Err(RegistrationError::invalid_configuration(
                "cannot select a reference volume from an empty series",
            ));
        }
        Ok(match self {
            Self::First => 0,
            Self::Middle => len / 2,
        })
    }
}

impl FromStr for ReferenceMode {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIRST" => Ok(Self::First),
            "MIDDLE" => Ok(Self::Middle),
            _ => Err(RegistrationError::invalid_configuration(format!(
                "invalid reference mode '{}', expected FIRST or MIDDLE",
                s
            ))),
        }
    }
}

impl TryFrom<String> for ReferenceMode {
    type Error = RegistrationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ReferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "FIRST"),
            Self::Middle => write!(f, "MIDDLE"),
        }
    }
}
