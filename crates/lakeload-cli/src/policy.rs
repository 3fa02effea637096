//! Per-step failure policy
//!
//! A fatal step aborts the run on error. A best-effort step logs the error
//! and lets the run continue in a partially completed state.

use crate::error::Result;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepPolicy {
    #[default]
    Fatal,
    BestEffort,
}

impl StepPolicy {
    /// `Ok(Some(v))` on success, `Ok(None)` for a tolerated failure
    pub fn apply<T>(self, step: &str, result: Result<T>) -> Result<Option<T>> {
        match (self, result) {
            (_, Ok(value)) => Ok(Some(value)),
            (StepPolicy::Fatal, Err(e)) => Err(e),
            (StepPolicy::BestEffort, Err(e)) => {
                warn!(step, error = %e, "Step failed; continuing (best-effort)");
                Ok(None)
            }
        }
    }
}

impl FromStr for StepPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fatal" => Ok(StepPolicy::Fatal),
            "best-effort" | "best_effort" | "besteffort" => Ok(StepPolicy::BestEffort),
            other => Err(format!(
                "unknown step policy '{}', expected 'fatal' or 'best-effort'",
                other
            )),
        }
    }
}

impl fmt::Display for StepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepPolicy::Fatal => write!(f, "fatal"),
            StepPolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}
