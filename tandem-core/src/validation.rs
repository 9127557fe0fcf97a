//! Outcome of speculative checks.
//!
//! State-transition and signed-state checks are probed in normal control
//! flow, so they report a verdict plus a human-readable reason instead of an
//! error.

use std::fmt;

/// Verdict of a validation probe.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Validation {
    /// The input passed every check.
    Valid,
    /// The input was rejected for the given reason.
    Invalid(String),
}

impl Validation {
    /// Builds a rejection with the given reason.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Validation::Invalid(reason.into())
    }

    /// Returns true if the input passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    /// Returns the rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Validation::Valid => None,
            Validation::Invalid(reason) => Some(reason),
        }
    }

    /// Splits into the `(is_valid, reason)` pair; the reason is empty when valid.
    pub fn into_parts(self) -> (bool, String) {
        match self {
            Validation::Valid => (true, String::new()),
            Validation::Invalid(reason) => (false, reason),
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Valid => write!(f, "valid"),
            Validation::Invalid(reason) => write!(f, "invalid: {}", reason),
        }
    }
}
