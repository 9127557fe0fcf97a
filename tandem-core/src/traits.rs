//! Common traits for Tandem.
//!
//! These are the seams where the channel core consumes collaborators it does
//! not implement itself: signature verification, session-id validation and
//! wall-clock time.

use chrono::{DateTime, FixedOffset};

use crate::error::Result;
use crate::types::{Address, SessionId, Signature};
use crate::validation::Validation;

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURE VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies that a signature over a message was produced by a ledger address.
pub trait SignatureVerifier: Send + Sync {
    /// Checks `signature` over `message` against `signer`.
    ///
    /// Returns `Ok(false)` for a well-formed signature made by another key,
    /// and an error when the signature bytes themselves are unusable.
    fn verify(&self, message: &[u8], signature: &Signature, signer: &Address) -> Result<bool>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION ID VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether a negotiated session id is well formed.
pub trait SessionIdValidator: Send + Sync {
    /// Validates the session id, reporting the reason on rejection.
    fn validate(&self, session_id: &SessionId) -> Validation;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of message timestamps.
pub trait Clock: Send + Sync {
    /// Current time in the configured location.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Changes the location used by [`Clock::now`].
    ///
    /// Accepts `Local`, `UTC` or a fixed offset such as `+05:30`.
    fn set_location(&mut self, zone: &str) -> Result<()>;
}
