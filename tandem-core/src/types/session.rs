//! Session identifiers.

use serde::{Deserialize, Serialize};

use crate::types::Uint;

/// Session id negotiated by both parties.
///
/// Each party contributes a random part; `sid_complete` binds the two
/// together and is the value the ledger contract refers to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionId {
    /// Sender's random contribution.
    #[serde(with = "hex")]
    pub sender_part: Vec<u8>,
    /// Receiver's random contribution.
    #[serde(with = "hex")]
    pub receiver_part: Vec<u8>,
    /// Combined session id.
    pub sid_complete: Uint,
}

impl SessionId {
    /// Returns true if no part has been negotiated yet.
    pub fn is_empty(&self) -> bool {
        self.sender_part.is_empty() && self.receiver_part.is_empty()
    }
}
