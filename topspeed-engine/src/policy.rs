//! Error policy chosen per call
//!
//! Every enumeration takes a [`Policy`]. Under [`Policy::Strict`] the first
//! failure is handed to the caller and the enumeration ends. Under
//! [`Policy::Tolerant`] the failing unit (a page, a subtree or a single
//! record) is logged and dropped, and the enumeration carries on.

use serde::{Deserialize, Serialize};

use crate::error::TpsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Abort on the first structural or decoding error
    #[default]
    Strict,
    /// Skip whatever fails and keep going
    Tolerant,
}

impl Policy {
    /// Decide what happens to an error raised while processing `unit`.
    ///
    /// Returns the error when it has to reach the caller, or `None` after
    /// logging it when the unit may be skipped.
    pub fn absorb(self, err: TpsError, unit: std::fmt::Arguments<'_>) -> Option<TpsError> {
        match self {
            Policy::Strict => Some(err),
            Policy::Tolerant => {
                tracing::warn!(kind = %err.kind(), "skipping {}: {}", unit, err);
                None
            }
        }
    }
}

impl std::str::FromStr for Policy {
    type Err = TpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Policy::Strict),
            "tolerant" => Ok(Policy::Tolerant),
            other => Err(TpsError::InvalidArgument(format!(
                "unknown policy '{}', expected 'strict' or 'tolerant'",
                other
            ))),
        }
    }
}
