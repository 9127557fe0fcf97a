//! Roles, closing modes and transport kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TandemError};

/// Role of a participant, tracked per concern (channel, closing).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Party that pays.
    Sender,
    /// Party that gets paid.
    Receiver,
    /// Not assigned, or an unrecognised value.
    #[default]
    #[serde(other)]
    Unset,
}

impl Role {
    /// Returns the opposite party's role. `Unset` stays `Unset`.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
            Role::Unset => Role::Unset,
        }
    }

    /// Returns true for `Sender` and `Receiver`.
    pub fn is_set(self) -> bool {
        !matches!(self, Role::Unset)
    }

    /// Lowercase label used in messages and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
            Role::Unset => "unset",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a channel gets closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClosingMode {
    /// Closed only on explicit request.
    Manual,
    /// Closed automatically after normal settlement.
    AutoNormal,
    /// Closed automatically right away.
    AutoImmediate,
    /// Not configured, or an unrecognised value.
    #[default]
    #[serde(other)]
    Unset,
}

impl fmt::Display for ClosingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClosingMode::Manual => "manual",
            ClosingMode::AutoNormal => "auto-normal",
            ClosingMode::AutoImmediate => "auto-immediate",
            ClosingMode::Unset => "unset",
        };
        f.write_str(s)
    }
}

/// Transport adapter used to carry a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Websocket over TCP.
    #[serde(alias = "ws")]
    WebSocket,
    /// No-op adapter for tests: no dial, no handshake.
    Mock,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::WebSocket => f.write_str("websocket"),
            TransportKind::Mock => f.write_str("mock"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = TandemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "mock" => Ok(TransportKind::Mock),
            other => Err(TandemError::UnsupportedTransport(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&ClosingMode::AutoNormal).unwrap(),
            "\"auto-normal\""
        );
        let mode: ClosingMode = serde_json::from_str("\"auto-immediate\"").unwrap();
        assert_eq!(mode, ClosingMode::AutoImmediate);
    }

    #[test]
    fn test_unknown_values_deserialize_unset() {
        let mode: ClosingMode = serde_json::from_str("\"sometimes\"").unwrap();
        assert_eq!(mode, ClosingMode::Unset);
        let role: Role = serde_json::from_str("\"arbiter\"").unwrap();
        assert_eq!(role, Role::Unset);
    }

    #[test]
    fn test_role_counterpart() {
        assert_eq!(Role::Sender.counterpart(), Role::Receiver);
        assert_eq!(Role::Receiver.counterpart(), Role::Sender);
        assert_eq!(Role::Unset.counterpart(), Role::Unset);
        assert!(!Role::default().is_set());
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("websocket".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!("Mock".parse::<TransportKind>().unwrap(), TransportKind::Mock);
        assert!(matches!(
            "carrier-pigeon".parse::<TransportKind>(),
            Err(TandemError::UnsupportedTransport(_))
        ));
    }
}
