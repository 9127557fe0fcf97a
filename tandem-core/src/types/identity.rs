//! Participant identities.
//!
//! - [`Address`]: a 20-byte ledger address
//! - [`OffChainId`]: everything needed to reach and authenticate a peer

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::constants::{ADDRESS_SIZE, DEFAULT_LISTENER_ENDPOINT};
use crate::error::{Result, TandemError};

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A 20-byte ledger address (the on-chain identity of a participant).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    bytes: [u8; ADDRESS_SIZE],
}

impl Address {
    /// Creates an address from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_SIZE {
            return Err(TandemError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }

        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates from a fixed-size array.
    pub fn from_array(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the `0x`-prefixed lowercase hex form.
    pub fn to_hex_string(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Parses from hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Returns the zero address.
    pub fn zero() -> Self {
        Self {
            bytes: [0u8; ADDRESS_SIZE],
        }
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

impl std::str::FromStr for Address {
    type Err = TandemError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

// Serde implementation that uses hex encoding
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OFF-CHAIN IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity of a channel participant.
///
/// Two identities are the same participant when their on-chain address,
/// listener address and listener endpoint all match. The alias is a local
/// label and never takes part in comparisons, so an identity loaded from a
/// contact book compares equal to the one a peer announces on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OffChainId {
    /// Ledger address used to verify this participant's signatures.
    pub on_chain_id: Address,
    /// Address the participant listens on, as `host:port`.
    pub listener_ip_addr: String,
    /// Endpoint path the participant serves channels on.
    #[serde(default = "default_endpoint")]
    pub listener_endpoint: String,
    /// Local display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

fn default_endpoint() -> String {
    DEFAULT_LISTENER_ENDPOINT.to_string()
}

impl OffChainId {
    /// Creates an identity listening on `listener_ip_addr` at `listener_endpoint`.
    pub fn new(
        on_chain_id: Address,
        listener_ip_addr: impl Into<String>,
        listener_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            on_chain_id,
            listener_ip_addr: listener_ip_addr.into(),
            listener_endpoint: normalize_endpoint(listener_endpoint.into()),
            alias: None,
        }
    }

    /// Attaches a display label.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns true if both identities describe the same participant.
    pub fn same_as(&self, other: &OffChainId) -> bool {
        self.on_chain_id == other.on_chain_id
            && self.listener_ip_addr.trim() == other.listener_ip_addr.trim()
            && normalize_endpoint(self.listener_endpoint.clone())
                == normalize_endpoint(other.listener_endpoint.clone())
    }

    /// Resolves the local address a listener for this identity binds to.
    ///
    /// Loopback literals are kept so test listeners stay local; any other
    /// host binds every interface of the same family on the identity's port.
    pub fn listener_local_addr(&self) -> Result<SocketAddr> {
        let raw = self.listener_ip_addr.trim();

        if let Ok(addr) = raw.parse::<SocketAddr>() {
            if addr.port() == 0 {
                return Err(TandemError::AddressResolution(format!(
                    "listener address '{}' has no port to dial back",
                    raw
                )));
            }
            let ip = match addr.ip() {
                ip if ip.is_loopback() => ip,
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            };
            return Ok(SocketAddr::new(ip, addr.port()));
        }

        let (host, port) = raw.rsplit_once(':').ok_or_else(|| {
            TandemError::AddressResolution(format!("listener address '{}' has no port", raw))
        })?;
        if host.is_empty() {
            return Err(TandemError::AddressResolution(format!(
                "listener address '{}' has no host",
                raw
            )));
        }
        let port: u16 = port.parse().map_err(|e| {
            TandemError::AddressResolution(format!("invalid port in '{}': {}", raw, e))
        })?;
        if port == 0 {
            return Err(TandemError::AddressResolution(format!(
                "listener address '{}' has no port to dial back",
                raw
            )));
        }

        Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Websocket URL peers dial to reach this identity.
    pub fn ws_url(&self) -> String {
        format!(
            "ws://{}{}",
            self.listener_ip_addr.trim(),
            normalize_endpoint(self.listener_endpoint.clone())
        )
    }
}

impl PartialEq for OffChainId {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for OffChainId {}

impl fmt::Display for OffChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{} ", alias)?;
        }
        write!(
            f,
            "{}@{}{}",
            self.on_chain_id, self.listener_ip_addr, self.listener_endpoint
        )
    }
}

/// Identity-equality primitive used for peer confirmation.
pub fn same_identity(a: &OffChainId, b: &OffChainId) -> bool {
    a.same_as(b)
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        DEFAULT_LISTENER_ENDPOINT.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8, addr: &str) -> OffChainId {
        OffChainId::new(Address::from_array([byte; ADDRESS_SIZE]), addr, "/channel")
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::from_array([0x12; ADDRESS_SIZE]);
        let hex = addr.to_hex_string();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 42);
        assert_eq!(Address::from_hex(&hex).unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!(matches!(
            Address::from_hex("0x1234"),
            Err(TandemError::InvalidAddress(_))
        ));
        assert!(matches!(
            Address::from_hex("0xzz"),
            Err(TandemError::HexError(_))
        ));
    }

    #[test]
    fn test_address_json_is_hex_string() {
        let addr = Address::from_array([0xAB; ADDRESS_SIZE]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
    }

    #[test]
    fn test_equality_ignores_alias() {
        let a = id(1, "127.0.0.1:9000").with_alias("alice");
        let b = id(1, "127.0.0.1:9000");
        assert!(same_identity(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_uses_every_defining_field() {
        let base = id(1, "127.0.0.1:9000");
        assert_ne!(base, id(2, "127.0.0.1:9000"));
        assert_ne!(base, id(1, "127.0.0.1:9001"));

        let mut other_endpoint = base.clone();
        other_endpoint.listener_endpoint = "/other".into();
        assert_ne!(base, other_endpoint);
    }

    #[test]
    fn test_endpoint_normalized() {
        let a = OffChainId::new(Address::zero(), "h:1", "channel");
        assert_eq!(a.listener_endpoint, "/channel");
        let b = OffChainId::new(Address::zero(), "h:1", "");
        assert_eq!(b.listener_endpoint, "/");
    }

    #[test]
    fn test_listener_local_addr() {
        let local = id(1, "127.0.0.1:9000").listener_local_addr().unwrap();
        assert_eq!(local, "127.0.0.1:9000".parse().unwrap());

        let public = id(1, "203.0.113.7:9000").listener_local_addr().unwrap();
        assert_eq!(public, "0.0.0.0:9000".parse().unwrap());

        let named = id(1, "node.example.org:7000").listener_local_addr().unwrap();
        assert_eq!(named.port(), 7000);
    }

    #[test]
    fn test_listener_local_addr_errors() {
        for bad in ["no-port", "host:notaport", ":9000", "127.0.0.1:0"] {
            assert!(
                matches!(
                    id(1, bad).listener_local_addr(),
                    Err(TandemError::AddressResolution(_))
                ),
                "{} should not resolve",
                bad
            );
        }
    }

    #[test]
    fn test_ws_url() {
        assert_eq!(id(1, "127.0.0.1:9000").ws_url(), "ws://127.0.0.1:9000/channel");
    }
}
