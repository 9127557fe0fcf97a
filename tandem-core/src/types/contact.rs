//! Contact book records.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_LISTENER_ENDPOINT;
use crate::types::{Address, OffChainId, TransportKind};

/// One entry of a contact book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Local label.
    pub alias: String,
    /// Listener address, `host:port` optionally followed by an endpoint path.
    pub communication_address: String,
    /// Transport used to reach the contact.
    pub communication_type: TransportKind,
    /// Ledger address of the contact.
    pub on_chain_address: Address,
}

impl ContactRecord {
    /// Converts the record into the identity used on channels.
    ///
    /// `host:port/path` splits into listener address and endpoint; without a
    /// path the endpoint defaults to `/`.
    pub fn to_off_chain_id(&self) -> OffChainId {
        let raw = self.communication_address.trim();
        let raw = raw.strip_prefix("ws://").unwrap_or(raw);
        let (addr, endpoint) = match raw.find('/') {
            Some(idx) => (&raw[..idx], &raw[idx..]),
            None => (raw, DEFAULT_LISTENER_ENDPOINT),
        };

        OffChainId::new(self.on_chain_address, addr, endpoint).with_alias(self.alias.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ADDRESS_SIZE;

    fn record(addr: &str) -> ContactRecord {
        ContactRecord {
            alias: "bob".into(),
            communication_address: addr.into(),
            communication_type: TransportKind::WebSocket,
            on_chain_address: Address::from_array([3; ADDRESS_SIZE]),
        }
    }

    #[test]
    fn test_address_without_path() {
        let id = record("127.0.0.1:9605").to_off_chain_id();
        assert_eq!(id.listener_ip_addr, "127.0.0.1:9605");
        assert_eq!(id.listener_endpoint, "/");
        assert_eq!(id.alias.as_deref(), Some("bob"));
    }

    #[test]
    fn test_address_with_path() {
        let id = record("ws://node.local:9605/channel").to_off_chain_id();
        assert_eq!(id.listener_ip_addr, "node.local:9605");
        assert_eq!(id.listener_endpoint, "/channel");
    }

    #[test]
    fn test_record_json() {
        let json = r#"{
            "alias": "bob",
            "communication_address": "127.0.0.1:9605",
            "communication_type": "websocket",
            "on_chain_address": "0x0303030303030303030303030303030303030303"
        }"#;
        let parsed: ContactRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, record("127.0.0.1:9605"));
    }
}
