//! Error types for Tandem.
//!
//! This module provides the error hierarchy using `thiserror`. Wrapping
//! variants keep the underlying error as their `source` so callers can
//! inspect the failing step and the root cause separately.

use thiserror::Error;

/// Result type alias using `TandemError`.
pub type Result<T> = std::result::Result<T, TandemError>;

/// Main error type for all Tandem operations.
#[derive(Debug, Error)]
pub enum TandemError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CRYPTOGRAPHIC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Invalid key size or format.
    #[error("Invalid key: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Required length in bytes.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Key material could not be parsed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signature bytes are structurally invalid.
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Signing failed.
    #[error("Signing failed: {0}")]
    SigningError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // IDENTITY & VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Invalid ledger address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Role is not one of sender/receiver.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// The channel identity for the given role is not established yet.
    #[error("{0} identity not established on channel")]
    IdentityNotEstablished(&'static str),

    /// Session id rejected by the validator.
    #[error("session id invalid - {0}")]
    SessionIdInvalid(String),

    /// A signature on the MSC base state did not verify.
    #[error("{0} signature on msc base state invalid")]
    MscSignatureInvalid(&'static str),

    /// A VPC state failed full validation.
    #[error("new state is invalid - {0}")]
    StateRejected(String),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CHANNEL & PROTOCOL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Message could not be serialized or deserialized.
    #[error("error parsing message - {0}")]
    MessageParse(#[source] serde_json::Error),

    /// Transport failed while sending a message.
    #[error("error sending message - {0}")]
    MessageSend(#[source] Box<TandemError>),

    /// Transport failed while reading a message.
    #[error("error reading message - {0}")]
    MessageRead(#[source] Box<TandemError>),

    /// Instance has no transport handle attached.
    #[error("transport handle is not attached")]
    NotConnected,

    /// Peer sent a message the protocol does not allow at this point.
    #[error("unexpected message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Message id that was awaited.
        expected: &'static str,
        /// Message id that arrived.
        actual: String,
    },

    /// Handshake aborted at the given step.
    #[error("handshake failed at {step} - {source}")]
    Handshake {
        /// Step that failed.
        step: &'static str,
        /// Failure of that step.
        #[source]
        source: Box<TandemError>,
    },

    /// Peer answered the identity request with an unexpected identity.
    #[error(
        "peer identity mismatch: expected {expected}, got {actual}{}",
        close_suffix(.close_error)
    )]
    PeerIdentityMismatch {
        /// Identity the caller dialed.
        expected: String,
        /// Identity the peer presented.
        actual: String,
        /// Failure while closing the connection afterwards, if any.
        close_error: Option<String>,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSPORT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Connection closed by the remote side or locally.
    #[error("connection closed")]
    ConnectionClosed,

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Read or write deadline expired.
    #[error("{0} deadline exceeded")]
    DeadlineExceeded(&'static str),

    // ═══════════════════════════════════════════════════════════════════════════
    // STARTUP & CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Requested transport kind cannot be used here.
    #[error("unsupported transport kind - {0}")]
    UnsupportedTransport(String),

    /// Listener address could not be resolved.
    #[error("address resolution failed - {0}")]
    AddressResolution(String),

    /// Loopback self-test failed during session start.
    #[error("loopback test error - {0}")]
    LoopbackFailed(#[source] Box<TandemError>),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION & STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Contact book content is unusable.
    #[error("contact book error: {0}")]
    ContactError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn close_suffix(close_error: &Option<String>) -> String {
    match close_error {
        Some(err) => format!("; error closing connection - {}", err),
        None => String::new(),
    }
}

impl TandemError {
    /// Returns true for connection-level failures (dropped, unreachable, timed out).
    pub fn is_transport_error(&self) -> bool {
        match self {
            TandemError::ConnectionClosed
            | TandemError::Transport(_)
            | TandemError::DeadlineExceeded(_)
            | TandemError::NotConnected
            | TandemError::IoError(_) => true,
            TandemError::MessageSend(inner) | TandemError::MessageRead(inner) => {
                inner.is_transport_error()
            }
            _ => false,
        }
    }

    /// Returns true if this is a validation error.
    ///
    /// Validation errors leave channel state untouched; the channel stays usable.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            TandemError::SessionIdInvalid(_)
                | TandemError::MscSignatureInvalid(_)
                | TandemError::StateRejected(_)
                | TandemError::MalformedSignature(_)
                | TandemError::IdentityNotEstablished(_)
                | TandemError::InvalidRole(_)
                | TandemError::ValidationError(_)
        )
    }

    /// Returns true if the peer broke the handshake protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            TandemError::PeerIdentityMismatch { .. } | TandemError::UnexpectedMessage { .. }
        )
    }

    /// Returns true if this error aborts session startup.
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            TandemError::UnsupportedTransport(_)
                | TandemError::AddressResolution(_)
                | TandemError::LoopbackFailed(_)
                | TandemError::ConfigError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = TandemError::InvalidKeySize {
            expected: 32,
            actual: 16,
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_wrapped_errors_keep_source() {
        let err = TandemError::MessageSend(Box::new(TandemError::ConnectionClosed));
        assert_eq!(err.to_string(), "error sending message - connection closed");
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "connection closed");

        let err = TandemError::LoopbackFailed(Box::new(TandemError::NotConnected));
        assert!(err.to_string().starts_with("loopback test error - "));
    }

    #[test]
    fn test_identity_mismatch_chains_close_error() {
        let err = TandemError::PeerIdentityMismatch {
            expected: "a".into(),
            actual: "b".into(),
            close_error: None,
        };
        assert_eq!(err.to_string(), "peer identity mismatch: expected a, got b");

        let err = TandemError::PeerIdentityMismatch {
            expected: "a".into(),
            actual: "b".into(),
            close_error: Some("broken pipe".into()),
        };
        assert!(err
            .to_string()
            .ends_with("; error closing connection - broken pipe"));
    }

    #[test]
    fn test_error_classification() {
        assert!(TandemError::ConnectionClosed.is_transport_error());
        assert!(TandemError::MessageRead(Box::new(TandemError::ConnectionClosed)).is_transport_error());
        assert!(!TandemError::StateRejected("x".into()).is_transport_error());

        assert!(TandemError::SessionIdInvalid("x".into()).is_validation_error());
        assert!(TandemError::MscSignatureInvalid("sender").is_validation_error());

        assert!(TandemError::UnsupportedTransport("mock".into()).is_startup_error());
        assert!(!TandemError::ConnectionClosed.is_startup_error());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid");
        let result: Result<serde_json::Value> = json_result.map_err(TandemError::from);
        assert!(matches!(result, Err(TandemError::JsonError(_))));
    }
}
