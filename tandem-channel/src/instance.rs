//! Channel instance.
//!
//! An [`Instance`] is one established channel: its transport, its status
//! state machine, the roles of both parties and the history of accepted
//! signed states.
//!
//! ## Concurrency contract
//!
//! Only `status` sits behind a lock, because a status observer may race with
//! the protocol handler. Everything else is written during construction and
//! the identity handshake (through `&mut self`) and is read-only once the
//! instance is shared. Identities are bound exactly once.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use tandem_core::error::{Result, TandemError};
use tandem_core::traits::{Clock, SessionIdValidator, SignatureVerifier};
use tandem_core::types::{
    ChannelStatus, ClosingMode, ContractStore, MscBaseStateSigned, OffChainId, Role, SessionId,
    VpcStateSigned,
};
use tandem_core::validation::Validation;
use tandem_core::SystemClock;

use crate::message::ChannelMessage;
use crate::transport::Transport;

/// One channel between this node and a peer.
pub struct Instance {
    transport: Option<Box<dyn Transport>>,
    clock: Box<dyn Clock>,
    verifier: Arc<dyn SignatureVerifier>,
    session_validator: Arc<dyn SessionIdValidator>,
    read_write_logging: bool,

    closing_mode: ClosingMode,
    self_id: Option<OffChainId>,
    peer_id: Option<OffChainId>,
    role_channel: Role,
    role_closing: Role,

    status: Mutex<ChannelStatus>,
    contract_store: ContractStore,
    session_id: Option<SessionId>,
    msc_base_state: Option<MscBaseStateSigned>,
    vpc_states: Vec<VpcStateSigned>,
}

impl Instance {
    /// Creates an instance over `transport`. `None` yields a never-connected instance.
    pub fn new(
        transport: Option<Box<dyn Transport>>,
        verifier: Arc<dyn SignatureVerifier>,
        session_validator: Arc<dyn SessionIdValidator>,
    ) -> Self {
        Self {
            transport,
            clock: Box::new(SystemClock::new()),
            verifier,
            session_validator,
            read_write_logging: false,
            closing_mode: ClosingMode::Unset,
            self_id: None,
            peer_id: None,
            role_channel: Role::Unset,
            role_closing: Role::Unset,
            status: Mutex::new(ChannelStatus::PreSetup),
            contract_store: ContractStore::default(),
            session_id: None,
            msc_base_state: None,
            vpc_states: Vec::new(),
        }
    }

    /// Enables logging of every message read and written.
    pub fn with_read_write_logging(mut self, enabled: bool) -> Self {
        self.read_write_logging = enabled;
        self
    }

    /// Replaces the clock used to timestamp outgoing messages.
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATUS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sets a starting status during construction.
    ///
    /// Only `PreSetup` and `Init` are starting statuses; anything else is
    /// refused and the status is left alone.
    pub fn init_status(&mut self, status: ChannelStatus) -> bool {
        match status {
            ChannelStatus::PreSetup | ChannelStatus::Init => {
                *self.status.get_mut() = status;
                true
            }
            _ => false,
        }
    }

    /// Moves the channel to `target` if the transition table allows it.
    ///
    /// Returns false, leaving the status untouched, for an illegal move.
    pub fn set_status(&self, target: ChannelStatus) -> bool {
        let mut status = self.status.lock();
        if !status.can_transition_to(target) {
            debug!(from = %*status, to = %target, "status change rejected");
            return false;
        }

        debug!(from = %*status, to = %target, "status changed");
        *status = target;
        true
    }

    /// Current status.
    pub fn status(&self) -> ChannelStatus {
        *self.status.lock()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROLES & IDENTITIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sets the closing mode. `Unset` is ignored.
    pub fn set_closing_mode(&mut self, mode: ClosingMode) {
        if mode != ClosingMode::Unset {
            self.closing_mode = mode;
        }
    }

    /// Configured closing mode.
    pub fn closing_mode(&self) -> ClosingMode {
        self.closing_mode
    }

    /// Sets this node's role in the channel. `Unset` is ignored.
    pub fn set_role_channel(&mut self, role: Role) {
        if role.is_set() {
            self.role_channel = role;
        }
    }

    /// This node's role in the channel.
    pub fn role_channel(&self) -> Role {
        self.role_channel
    }

    /// Sets this node's role in the closing procedure. `Unset` is ignored.
    pub fn set_role_closing(&mut self, role: Role) {
        if role.is_set() {
            self.role_closing = role;
        }
    }

    /// This node's role in the closing procedure.
    pub fn role_closing(&self) -> Role {
        self.role_closing
    }

    /// Binds both identities. Refused once they are bound.
    pub(crate) fn bind_identities(&mut self, self_id: OffChainId, peer_id: OffChainId) -> bool {
        if self.self_id.is_some() || self.peer_id.is_some() {
            warn!(peer = %peer_id, "identities already bound on channel");
            return false;
        }
        self.self_id = Some(self_id);
        self.peer_id = Some(peer_id);
        true
    }

    /// Identity of this node.
    pub fn self_id(&self) -> Option<&OffChainId> {
        self.self_id.as_ref()
    }

    /// Identity of the peer.
    pub fn peer_id(&self) -> Option<&OffChainId> {
        self.peer_id.as_ref()
    }

    /// Identity of the party that opened the channel.
    pub fn sender_id(&self) -> Option<&OffChainId> {
        match self.role_channel {
            Role::Sender => self.self_id(),
            Role::Receiver => self.peer_id(),
            Role::Unset => None,
        }
    }

    /// Identity of the party that accepted the channel.
    pub fn receiver_id(&self) -> Option<&OffChainId> {
        match self.role_channel {
            Role::Sender => self.peer_id(),
            Role::Receiver => self.self_id(),
            Role::Unset => None,
        }
    }

    fn id_for(&self, role: Role) -> Result<&OffChainId> {
        let (id, label) = match role {
            Role::Sender => (self.sender_id(), "sender"),
            Role::Receiver => (self.receiver_id(), "receiver"),
            Role::Unset => return Err(TandemError::InvalidRole("unset".into())),
        };
        id.ok_or(TandemError::IdentityNotEstablished(label))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SESSION & CONTRACTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Validates and stores the session id.
    ///
    /// A rejected id leaves the stored one unchanged.
    pub fn set_session_id(&mut self, session_id: SessionId) -> Result<()> {
        if let Validation::Invalid(reason) = self.session_validator.validate(&session_id) {
            return Err(TandemError::SessionIdInvalid(reason));
        }
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Negotiated session id.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Stores the contract set of the channel.
    pub fn set_contract_store(&mut self, store: ContractStore) {
        self.contract_store = store;
    }

    /// Contract set of the channel.
    pub fn contract_store(&self) -> &ContractStore {
        &self.contract_store
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SIGNED STATES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Stores the MSC base state after checking both signatures.
    ///
    /// Verifier errors are returned as they are. A rejected state leaves the
    /// stored one unchanged.
    pub fn set_msc_base_state(&mut self, state: MscBaseStateSigned) -> Result<()> {
        let verifier = self.verifier.as_ref();

        if !state.verify_sign(verifier, self.id_for(Role::Sender)?, Role::Sender)? {
            return Err(TandemError::MscSignatureInvalid("sender"));
        }
        if !state.verify_sign(verifier, self.id_for(Role::Receiver)?, Role::Receiver)? {
            return Err(TandemError::MscSignatureInvalid("receiver"));
        }

        debug!(version = %state.version(), "msc base state set");
        self.msc_base_state = Some(state);
        Ok(())
    }

    /// Stored MSC base state.
    pub fn msc_base_state(&self) -> Option<&MscBaseStateSigned> {
        self.msc_base_state.as_ref()
    }

    /// Checks a state received from the peer: the peer's signature and the version.
    pub fn validate_incoming_state(&self, state: &VpcStateSigned) -> Validation {
        let peer_role = match self.role_channel {
            Role::Sender => Role::Receiver,
            _ => Role::Sender,
        };
        let Some(peer) = self.peer_id() else {
            return Validation::invalid(TandemError::IdentityNotEstablished("peer").to_string());
        };

        match state.verify_sign(self.verifier.as_ref(), peer, peer_role) {
            Ok(true) => {}
            Ok(false) => return Validation::invalid("invalid peer signature"),
            Err(e) => return Validation::invalid(e.to_string()),
        }

        self.check_version(state)
    }

    /// Checks both signatures and the version of a state.
    pub fn validate_full_state(&self, state: &VpcStateSigned) -> Validation {
        for role in [Role::Sender, Role::Receiver] {
            let signer = match self.id_for(role) {
                Ok(id) => id,
                Err(e) => return Validation::invalid(format!("invalid {} signature - {}", role, e)),
            };
            match state.verify_sign(self.verifier.as_ref(), signer, role) {
                Ok(true) => {}
                Ok(false) => return Validation::invalid(format!("invalid {} signature", role)),
                Err(e) => {
                    return Validation::invalid(format!("invalid {} signature - {}", role, e))
                }
            }
        }

        self.check_version(state)
    }

    fn check_version(&self, state: &VpcStateSigned) -> Validation {
        match self.vpc_states.last() {
            Some(last) if state.version() <= last.version() => Validation::invalid(format!(
                "version {} not greater than previous {}",
                state.version(),
                last.version()
            )),
            _ => Validation::Valid,
        }
    }

    /// Appends a fully validated state to the history.
    pub fn set_current_vpc_state(&mut self, state: VpcStateSigned) -> Result<()> {
        if let Validation::Invalid(reason) = self.validate_full_state(&state) {
            return Err(TandemError::StateRejected(reason));
        }

        debug!(version = %state.version(), "vpc state accepted");
        self.vpc_states.push(state);
        Ok(())
    }

    /// Most recently accepted VPC state.
    pub fn current_vpc_state(&self) -> Option<&VpcStateSigned> {
        self.vpc_states.last()
    }

    /// Every accepted VPC state, oldest first.
    pub fn vpc_states(&self) -> &[VpcStateSigned] {
        &self.vpc_states
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MESSAGING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Timestamps, serializes and sends a message.
    pub async fn write(&mut self, mut message: ChannelMessage) -> Result<()> {
        message.timestamp = Some(self.clock.now());
        let bytes = serde_json::to_vec(&message).map_err(TandemError::MessageParse)?;

        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| TandemError::MessageSend(Box::new(TandemError::NotConnected)))?;
        transport
            .write(&bytes)
            .await
            .map_err(|e| TandemError::MessageSend(Box::new(e)))?;

        if self.read_write_logging {
            debug!(message_id = message.id(), message = ?message, "outgoing message");
        }
        Ok(())
    }

    /// Reads and parses the next message.
    pub async fn read(&mut self) -> Result<ChannelMessage> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| TandemError::MessageRead(Box::new(TandemError::NotConnected)))?;
        let bytes = transport
            .read()
            .await
            .map_err(|e| TandemError::MessageRead(Box::new(e)))?;

        let message: ChannelMessage =
            serde_json::from_slice(&bytes).map_err(TandemError::MessageParse)?;

        if self.read_write_logging {
            debug!(message_id = message.id(), message = ?message, "incoming message");
        }
        Ok(message)
    }

    /// Returns true while the transport is attached and usable.
    pub fn connected(&self) -> bool {
        self.transport.as_ref().map_or(false, |t| t.connected())
    }

    /// Closes the transport.
    pub async fn close(&mut self) -> Result<()> {
        match self.transport.as_mut() {
            Some(transport) => transport.close().await,
            None => Err(TandemError::NotConnected),
        }
    }

    /// Sets the transport read deadline.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        match self.transport.as_mut() {
            Some(transport) => transport.set_read_deadline(deadline),
            None => Err(TandemError::NotConnected),
        }
    }

    /// Sets the transport write deadline.
    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        match self.transport.as_mut() {
            Some(transport) => transport.set_write_deadline(deadline),
            None => Err(TandemError::NotConnected),
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("status", &self.status())
            .field("role_channel", &self.role_channel)
            .field("self_id", &self.self_id)
            .field("peer_id", &self.peer_id)
            .field("connected", &self.connected())
            .field("vpc_states", &self.vpc_states.len())
            .finish()
    }
}
