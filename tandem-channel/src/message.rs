//! Messages exchanged over a channel.
//!
//! Every message travels as one JSON document:
//!
//! ```json
//! {
//!   "version": "1",
//!   "body": { "message_id": "identity_request", "message": { ... } },
//!   "timestamp": "2024-01-02T03:04:05+00:00"
//! }
//! ```
//!
//! The timestamp is stamped by the sending [`Instance`](crate::Instance)
//! just before serialization.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use tandem_core::constants::PROTOCOL_VERSION;
use tandem_core::types::{MscBaseStateSigned, OffChainId, SessionId, VpcStateSigned};

/// Envelope of every channel message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Protocol version of the sender.
    pub version: String,
    /// Message payload.
    pub body: MessageBody,
    /// Send time, set when the message is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

/// Message payloads, tagged by message id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_id", content = "message", rename_all = "snake_case")]
pub enum MessageBody {
    /// Outbound side announces its identity and asks for the peer's.
    IdentityRequest(OffChainId),
    /// Inbound side answers with its own identity.
    IdentityResponse(OffChainId),
    /// Proposes a session id.
    SessionIdRequest(SessionId),
    /// Confirms a session id.
    SessionIdResponse(SessionId),
    /// Proposes a signed MSC base state.
    MscBaseStateRequest(MscBaseStateSigned),
    /// Answers with a countersigned MSC base state.
    MscBaseStateResponse(MscBaseStateSigned),
    /// Proposes a new VPC state.
    VpcStateRequest(VpcStateSigned),
    /// Answers with a countersigned VPC state.
    VpcStateResponse(VpcStateSigned),
}

impl MessageBody {
    /// Wire name of the message.
    pub fn id(&self) -> &'static str {
        match self {
            MessageBody::IdentityRequest(_) => "identity_request",
            MessageBody::IdentityResponse(_) => "identity_response",
            MessageBody::SessionIdRequest(_) => "session_id_request",
            MessageBody::SessionIdResponse(_) => "session_id_response",
            MessageBody::MscBaseStateRequest(_) => "msc_base_state_request",
            MessageBody::MscBaseStateResponse(_) => "msc_base_state_response",
            MessageBody::VpcStateRequest(_) => "vpc_state_request",
            MessageBody::VpcStateResponse(_) => "vpc_state_response",
        }
    }
}

impl ChannelMessage {
    /// Wraps a payload in an unstamped envelope.
    pub fn new(body: MessageBody) -> Self {
        Self {
            version: PROTOCOL_VERSION.into(),
            body,
            timestamp: None,
        }
    }

    /// Wire name of the payload.
    pub fn id(&self) -> &'static str {
        self.body.id()
    }
}

impl From<MessageBody> for ChannelMessage {
    fn from(body: MessageBody) -> Self {
        Self::new(body)
    }
}
