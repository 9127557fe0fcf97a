//! Listener and session management.
//!
//! ```text
//!  accept loop ──raw conns──▶ dispatcher ──spawn──▶ handshake task ─┐
//!                                                                   │
//!  Session::next_channel ◀──────── verified queue (bounded) ◀───────┘
//! ```
//!
//! A session starts by dialing itself: the loopback channel proves the
//! listener is reachable under the advertised identity. Startup waits for
//! the inbound half of that loopback to come through the verified queue and
//! discards it; channels from other peers that finish first are kept and
//! handed out in arrival order.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use tandem_core::error::{Result, TandemError};
use tandem_core::traits::{SessionIdValidator, SignatureVerifier};
use tandem_core::types::{OffChainId, Role, TransportKind};
use tandem_core::SystemClock;

use crate::config::ChannelConfig;
use crate::handshake::{verify_inbound, verify_outbound};
use crate::instance::Instance;
use crate::transport::websocket::{self, WsListener};
use crate::transport::{spawn_accept_loop, ListenerHandle, Transport};

/// Creates channels and runs listeners with one shared configuration.
#[derive(Clone)]
pub struct ChannelManager {
    config: Arc<ChannelConfig>,
    clock: SystemClock,
    verifier: Arc<dyn SignatureVerifier>,
    session_validator: Arc<dyn SessionIdValidator>,
}

impl ChannelManager {
    /// Creates a manager. Fails if `config` is not usable.
    pub fn new(
        config: ChannelConfig,
        verifier: Arc<dyn SignatureVerifier>,
        session_validator: Arc<dyn SessionIdValidator>,
    ) -> Result<Self> {
        config.validate()?;
        let clock = SystemClock::with_zone(&config.time_zone)?;

        Ok(Self {
            config: Arc::new(config),
            clock,
            verifier,
            session_validator,
        })
    }

    /// Configuration shared by every channel.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Builds an instance over `transport` with the manager's collaborators.
    pub fn instance(&self, transport: Option<Box<dyn Transport>>) -> Instance {
        let mut inst = Instance::new(
            transport,
            Arc::clone(&self.verifier),
            Arc::clone(&self.session_validator),
        )
        .with_read_write_logging(self.config.read_write_logging);
        inst.set_clock(Box::new(self.clock.clone()));
        inst
    }

    /// Starts accepting raw connections on the listener address of `self_id`.
    ///
    /// Accepted connections are queued, up to `max_conn` at a time, on the
    /// returned receiver. Only websocket listeners exist.
    #[instrument(skip(self), fields(self_id = %self_id))]
    pub async fn start_listener(
        &self,
        self_id: &OffChainId,
        max_conn: usize,
        kind: TransportKind,
    ) -> Result<(mpsc::Receiver<Box<dyn Transport>>, ListenerHandle)> {
        if kind != TransportKind::WebSocket {
            return Err(TandemError::UnsupportedTransport(kind.to_string()));
        }
        if max_conn == 0 {
            return Err(TandemError::ConfigError(
                "listener queue capacity must be at least 1".into(),
            ));
        }

        let listener = WsListener::bind(self_id, self.config.handshake_timeout).await?;
        let (tx, rx) = mpsc::channel(max_conn);
        Ok((rx, spawn_accept_loop(Box::new(listener), tx)))
    }

    /// Starts a session: listener, handshake dispatcher and loopback self-test.
    ///
    /// Fails with `loopback test error` if this node cannot reach itself; the
    /// listener is shut down before returning in that case.
    #[instrument(skip(self), fields(self_id = %self_id))]
    pub async fn new_session(
        &self,
        self_id: &OffChainId,
        kind: TransportKind,
        max_pending: usize,
    ) -> Result<Session> {
        if max_pending == 0 {
            return Err(TandemError::ConfigError(
                "max pending connections must be at least 1".into(),
            ));
        }

        let (conns, listener) = self.start_listener(self_id, max_pending, kind).await?;
        let (verified_tx, mut verified_rx) = mpsc::channel(max_pending);
        tokio::spawn(dispatch(self.clone(), self_id.clone(), conns, verified_tx));

        let early = match self.loopback(self_id, kind, &mut verified_rx).await {
            Ok(early) => early,
            Err(e) => {
                warn!(error = %e, "loopback test failed, stopping listener");
                listener.close().await;
                return Err(TandemError::LoopbackFailed(Box::new(e)));
            }
        };

        info!(addr = ?listener.local_addr(), "session started");
        Ok(Session {
            self_id: self_id.clone(),
            early,
            verified: verified_rx,
            listener,
        })
    }

    /// Dials ourselves and waits for the inbound half to be verified.
    ///
    /// Returns the channels of other peers that were verified meanwhile.
    async fn loopback(
        &self,
        self_id: &OffChainId,
        kind: TransportKind,
        verified: &mut mpsc::Receiver<Instance>,
    ) -> Result<VecDeque<Instance>> {
        let mut outbound = self.new_channel(self_id, self_id, kind).await?;
        outbound.close().await?;

        let mut early = VecDeque::new();
        let wait = async {
            while let Some(mut inst) = verified.recv().await {
                if inst.peer_id() == Some(self_id) {
                    if let Err(e) = inst.close().await {
                        debug!(error = %e, "error closing loopback channel");
                    }
                    return Ok(());
                }
                debug!(peer = ?inst.peer_id(), "channel verified during loopback test");
                early.push_back(inst);
            }
            Err(TandemError::ConnectionClosed)
        };

        tokio::time::timeout(self.config.handshake_timeout, wait)
            .await
            .map_err(|_| TandemError::DeadlineExceeded("loopback"))??;
        Ok(early)
    }

    /// Opens a channel to `peer_id` and verifies the peer's identity.
    ///
    /// With [`TransportKind::Mock`] nothing is dialed and no handshake runs:
    /// the instance is never connected but carries both identities with
    /// this node as `Sender`.
    #[instrument(skip(self), fields(self_id = %self_id, peer = %peer_id))]
    pub async fn new_channel(
        &self,
        self_id: &OffChainId,
        peer_id: &OffChainId,
        kind: TransportKind,
    ) -> Result<Instance> {
        match kind {
            TransportKind::Mock => {
                let mut inst = self.instance(None);
                inst.set_role_channel(Role::Sender);
                inst.bind_identities(self_id.clone(), peer_id.clone());
                Ok(inst)
            }
            TransportKind::WebSocket => {
                let transport = websocket::dial(peer_id).await?;
                let inst = self.instance(Some(Box::new(transport)));
                verify_outbound(inst, self_id, peer_id, self.config.handshake_timeout).await
            }
        }
    }
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Spawns one handshake task per raw connection.
async fn dispatch(
    manager: ChannelManager,
    self_id: OffChainId,
    mut conns: mpsc::Receiver<Box<dyn Transport>>,
    verified: mpsc::Sender<Instance>,
) {
    while let Some(conn) = conns.recv().await {
        let manager = manager.clone();
        let self_id = self_id.clone();
        let verified = verified.clone();

        tokio::spawn(async move {
            let peer = conn.peer_addr();
            let inst = manager.instance(Some(conn));
            match verify_inbound(inst, &self_id, manager.config.handshake_timeout).await {
                Ok(inst) => {
                    if verified.send(inst).await.is_err() {
                        debug!(?peer, "session closed, dropping verified channel");
                    }
                }
                Err(e) => debug!(?peer, error = %e, "inbound connection rejected"),
            }
        });
    }
    debug!("dispatcher stopped");
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// A running listener handing out identity-verified inbound channels.
#[derive(Debug)]
pub struct Session {
    self_id: OffChainId,
    early: VecDeque<Instance>,
    verified: mpsc::Receiver<Instance>,
    listener: ListenerHandle,
}

/// Pieces of a [`Session`], for callers that drive the queue themselves.
#[derive(Debug)]
pub struct SessionParts {
    /// Channels verified during startup, oldest first.
    pub pending: VecDeque<Instance>,
    /// Queue of channels verified afterwards.
    pub verified: mpsc::Receiver<Instance>,
    /// Shutdown handle of the listener.
    pub listener: ListenerHandle,
}

impl Session {
    /// Waits for the next verified inbound channel.
    ///
    /// Returns `None` once the listener is closed and every channel in
    /// flight has been handed out.
    pub async fn next_channel(&mut self) -> Option<Instance> {
        if let Some(inst) = self.early.pop_front() {
            return Some(inst);
        }
        self.verified.recv().await
    }

    /// Returns a verified channel if one is ready.
    pub fn try_next_channel(&mut self) -> Option<Instance> {
        self.early
            .pop_front()
            .or_else(|| self.verified.try_recv().ok())
    }

    /// Identity the session listens under.
    pub fn self_id(&self) -> &OffChainId {
        &self.self_id
    }

    /// Bound listener address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Stops the listener and waits for the address to be released.
    ///
    /// Handshakes already in progress are left to finish on their own.
    pub async fn close(self) {
        self.listener.close().await;
        info!(self_id = %self.self_id, "session closed");
    }

    /// Splits the session into its queue and listener handle.
    pub fn into_parts(self) -> SessionParts {
        SessionParts {
            pending: self.early,
            verified: self.verified,
            listener: self.listener,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tandem_core::types::Address;
    use tandem_crypto::{EcdsaVerifier, SessionIdChecker};
    use tokio_test::{assert_err, assert_ok};

    use crate::message::MessageBody;

    fn manager() -> ChannelManager {
        let config = ChannelConfig::default().with_handshake_timeout(Duration::from_secs(5));
        ChannelManager::new(
            config,
            Arc::new(EcdsaVerifier),
            Arc::new(SessionIdChecker),
        )
        .unwrap()
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn local_id(byte: u8) -> OffChainId {
        OffChainId::new(
            Address::from_array([byte; 20]),
            format!("127.0.0.1:{}", free_port()),
            "/tandem",
        )
    }

    #[tokio::test]
    async fn test_session_passes_loopback() {
        let alice = local_id(0xa1);
        let mut session = manager()
            .new_session(&alice, TransportKind::WebSocket, 4)
            .await
            .unwrap();

        assert_eq!(session.self_id(), &alice);
        assert!(session.local_addr().is_some());
        // The loopback channel is consumed during startup.
        assert!(session.try_next_channel().is_none());

        session.close().await;
    }

    #[tokio::test]
    async fn test_peer_channel_end_to_end() {
        let alice = local_id(0xa1);
        let bob = local_id(0xb2);
        let mgr = manager();

        let mut session = mgr
            .new_session(&alice, TransportKind::WebSocket, 4)
            .await
            .unwrap();

        let mut outbound = mgr
            .new_channel(&bob, &alice, TransportKind::WebSocket)
            .await
            .unwrap();
        assert_eq!(outbound.role_channel(), Role::Sender);
        assert_eq!(outbound.sender_id(), Some(&bob));
        assert_eq!(outbound.receiver_id(), Some(&alice));

        let mut inbound = tokio::time::timeout(Duration::from_secs(5), session.next_channel())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inbound.role_channel(), Role::Receiver);
        assert_eq!(inbound.peer_id(), Some(&bob));
        assert_eq!(inbound.sender_id(), Some(&bob));

        outbound
            .write(MessageBody::IdentityRequest(bob.clone()).into())
            .await
            .unwrap();
        let message = inbound.read().await.unwrap();
        assert_eq!(message.body, MessageBody::IdentityRequest(bob));
        assert!(message.timestamp.is_some());

        outbound.close().await.unwrap();
        session.close().await;
    }

    #[tokio::test]
    async fn test_silent_connection_does_not_block_peers() {
        let alice = local_id(0xa1);
        let bob = local_id(0xb2);
        let mgr = manager();

        let mut session = mgr
            .new_session(&alice, TransportKind::WebSocket, 4)
            .await
            .unwrap();
        let addr = session.local_addr().unwrap();
        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();

        let outbound = tokio::time::timeout(
            Duration::from_secs(2),
            mgr.new_channel(&bob, &alice, TransportKind::WebSocket),
        )
        .await
        .expect("peer stuck behind a silent connection");
        assert_ok!(outbound);

        let inbound = tokio::time::timeout(Duration::from_secs(2), session.next_channel())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inbound.peer_id(), Some(&bob));

        session.close().await;
    }

    #[tokio::test]
    async fn test_unexpected_peer_rejected() {
        let alice = local_id(0xa1);
        let bob = local_id(0xb2);
        let mgr = manager();

        let session = mgr
            .new_session(&alice, TransportKind::WebSocket, 4)
            .await
            .unwrap();

        let mut impostor = alice.clone();
        impostor.on_chain_id = Address::from_array([0xcc; 20]);

        let err = mgr
            .new_channel(&bob, &impostor, TransportKind::WebSocket)
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::PeerIdentityMismatch { .. }));
        assert!(err.is_protocol_violation());

        session.close().await;
    }

    #[tokio::test]
    async fn test_close_releases_address() {
        let alice = local_id(0xa1);
        let session = manager()
            .new_session(&alice, TransportKind::WebSocket, 1)
            .await
            .unwrap();

        assert_err!(WsListener::bind(&alice, Duration::from_secs(1)).await);
        session.close().await;
        assert_ok!(WsListener::bind(&alice, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_into_parts_keeps_queue() {
        let alice = local_id(0xa1);
        let bob = local_id(0xb2);
        let mgr = manager();

        let parts = mgr
            .new_session(&alice, TransportKind::WebSocket, 2)
            .await
            .unwrap()
            .into_parts();
        let SessionParts {
            pending,
            mut verified,
            listener,
        } = parts;
        assert!(pending.is_empty());

        let _outbound = mgr
            .new_channel(&bob, &alice, TransportKind::WebSocket)
            .await
            .unwrap();
        let inbound = verified.recv().await.unwrap();
        assert_eq!(inbound.peer_id(), Some(&bob));

        listener.close().await;
    }

    #[tokio::test]
    async fn test_session_rejects_bad_setup() {
        let mgr = manager();
        let alice = local_id(0xa1);

        let err = mgr
            .new_session(&alice, TransportKind::Mock, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::UnsupportedTransport(ref kind) if kind == "mock"));

        let err = mgr
            .new_session(&alice, TransportKind::WebSocket, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::ConfigError(_)));

        let mut portless = alice.clone();
        portless.listener_ip_addr = "127.0.0.1".into();
        let err = mgr
            .new_session(&portless, TransportKind::WebSocket, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::AddressResolution(_)));
        assert!(err.is_startup_error());
    }

    #[tokio::test]
    async fn test_unreachable_self_fails_loopback() {
        let port = free_port();
        let alice = OffChainId::new(
            Address::from_array([0xa1; 20]),
            format!("unreachable.invalid:{}", port),
            "/tandem",
        );

        let err = manager()
            .new_session(&alice, TransportKind::WebSocket, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::LoopbackFailed(_)));

        // The listener was shut down before returning.
        assert_ok!(tokio::net::TcpListener::bind(("0.0.0.0", port)).await);
    }

    #[tokio::test]
    async fn test_mock_channel() {
        let alice = local_id(0xa1);
        let bob = local_id(0xb2);

        let mut inst = manager()
            .new_channel(&alice, &bob, TransportKind::Mock)
            .await
            .unwrap();
        assert!(!inst.connected());
        assert_eq!(inst.role_channel(), Role::Sender);
        assert_eq!(inst.receiver_id(), Some(&bob));
        assert!(matches!(inst.close().await, Err(TandemError::NotConnected)));
    }

    #[test]
    fn test_manager_rejects_bad_config() {
        let config = ChannelConfig::default().with_time_zone("Mars/Olympus");
        let result = ChannelManager::new(
            config,
            Arc::new(EcdsaVerifier),
            Arc::new(SessionIdChecker),
        );
        assert!(matches!(result, Err(TandemError::ConfigError(_))));
    }
}
