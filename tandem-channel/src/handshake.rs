//! Identity handshake.
//!
//! ```text
//!   outbound (sender)                      inbound (receiver)
//!   ─────────────────                      ──────────────────
//!   identity_request(self_id)   ───────▶   identity_read()
//!   compare with expected peer  ◀───────   identity_respond(self_id)
//! ```
//!
//! A connection is only promoted to a usable [`Instance`] once the exchange
//! succeeds. Any failure closes the transport.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use tandem_core::error::{Result, TandemError};
use tandem_core::types::{same_identity, OffChainId, Role};

use crate::instance::Instance;
use crate::message::MessageBody;

impl Instance {
    /// Sends this node's identity and waits for the peer's answer.
    pub async fn identity_request(&mut self, self_id: &OffChainId) -> Result<OffChainId> {
        self.write(MessageBody::IdentityRequest(self_id.clone()).into())
            .await?;

        let message = self.read().await?;
        match message.body {
            MessageBody::IdentityResponse(peer) => Ok(peer),
            other => Err(TandemError::UnexpectedMessage {
                expected: "identity_response",
                actual: other.id().into(),
            }),
        }
    }

    /// Waits for the peer's identity request.
    pub async fn identity_read(&mut self) -> Result<OffChainId> {
        let message = self.read().await?;
        match message.body {
            MessageBody::IdentityRequest(peer) => Ok(peer),
            other => Err(TandemError::UnexpectedMessage {
                expected: "identity_request",
                actual: other.id().into(),
            }),
        }
    }

    /// Answers an identity request with this node's identity.
    pub async fn identity_respond(&mut self, self_id: &OffChainId) -> Result<()> {
        self.write(MessageBody::IdentityResponse(self_id.clone()).into())
            .await
    }

    fn arm_deadlines(&mut self, deadline: Option<Instant>) {
        if let Err(e) = self
            .set_read_deadline(deadline)
            .and_then(|_| self.set_write_deadline(deadline))
        {
            debug!(error = %e, "could not set handshake deadline");
        }
    }
}

fn close_outcome(result: &Result<()>) -> String {
    match result {
        Ok(()) => "closed".into(),
        Err(e) => format!("close failed - {}", e),
    }
}

/// Runs the receiving side of the handshake on a fresh inbound connection.
///
/// On success the instance is the channel `Receiver` with both identities
/// bound. On failure the transport is closed and the error returned.
#[instrument(skip_all, fields(self_id = %self_id))]
pub async fn verify_inbound(
    mut inst: Instance,
    self_id: &OffChainId,
    timeout: Duration,
) -> Result<Instance> {
    inst.arm_deadlines(Some(Instant::now() + timeout));

    let peer_id = match inst.identity_read().await {
        Ok(peer) => peer,
        Err(e) => {
            let close = inst.close().await;
            warn!(error = %e, close = %close_outcome(&close), "identity read failed");
            return Err(TandemError::Handshake {
                step: "identity read",
                source: Box::new(e),
            });
        }
    };

    if let Err(e) = inst.identity_respond(self_id).await {
        let close = inst.close().await;
        warn!(peer = %peer_id, error = %e, close = %close_outcome(&close), "identity response failed");
        return Err(TandemError::Handshake {
            step: "identity response",
            source: Box::new(e),
        });
    }

    inst.arm_deadlines(None);
    inst.set_role_channel(Role::Receiver);
    inst.bind_identities(self_id.clone(), peer_id);
    debug!(peer = ?inst.peer_id(), "inbound identity verified");
    Ok(inst)
}

/// Runs the opening side of the handshake and checks the peer is `expected_peer`.
///
/// On success the instance is the channel `Sender` with both identities
/// bound. A wrong peer identity closes the connection and reports the
/// mismatch, together with the close error if closing failed too.
#[instrument(skip_all, fields(self_id = %self_id, peer = %expected_peer))]
pub async fn verify_outbound(
    mut inst: Instance,
    self_id: &OffChainId,
    expected_peer: &OffChainId,
    timeout: Duration,
) -> Result<Instance> {
    inst.arm_deadlines(Some(Instant::now() + timeout));

    let got = match inst.identity_request(self_id).await {
        Ok(peer) => peer,
        Err(e) => {
            let close = inst.close().await;
            warn!(error = %e, close = %close_outcome(&close), "identity request failed");
            return Err(TandemError::Handshake {
                step: "identity request",
                source: Box::new(e),
            });
        }
    };

    if !same_identity(expected_peer, &got) {
        let close_error = inst.close().await.err().map(|e| e.to_string());
        warn!(got = %got, "peer identity mismatch");
        return Err(TandemError::PeerIdentityMismatch {
            expected: expected_peer.to_string(),
            actual: got.to_string(),
            close_error,
        });
    }

    inst.arm_deadlines(None);
    inst.set_role_channel(Role::Sender);
    inst.bind_identities(self_id.clone(), expected_peer.clone());
    debug!("outbound identity verified");
    Ok(inst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::transport::memory::{pipe, MemoryTransport};
    use crate::transport::Transport;
    use tandem_core::types::Address;
    use tandem_crypto::{EcdsaVerifier, SessionIdChecker};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn id(byte: u8, port: u16) -> OffChainId {
        OffChainId::new(Address::from_array([byte; 20]), format!("127.0.0.1:{}", port), "/")
    }

    fn instance(transport: MemoryTransport) -> Instance {
        Instance::new(
            Some(Box::new(transport)),
            Arc::new(EcdsaVerifier),
            Arc::new(SessionIdChecker),
        )
    }

    #[tokio::test]
    async fn test_handshake_binds_roles_and_identities() {
        let (a, b) = pipe();
        let alice = id(1, 9001);
        let bob = id(2, 9002);

        let bob_side = {
            let bob = bob.clone();
            tokio::spawn(async move { verify_inbound(instance(b), &bob, TIMEOUT).await })
        };
        let out = verify_outbound(instance(a), &alice, &bob, TIMEOUT).await.unwrap();
        let inc = bob_side.await.unwrap().unwrap();

        assert_eq!(out.role_channel(), Role::Sender);
        assert_eq!(out.self_id(), Some(&alice));
        assert_eq!(out.peer_id(), Some(&bob));
        assert_eq!(out.sender_id(), inc.sender_id());

        assert_eq!(inc.role_channel(), Role::Receiver);
        assert_eq!(inc.self_id(), Some(&bob));
        assert_eq!(inc.peer_id(), Some(&alice));
        assert!(out.connected() && inc.connected());
    }

    #[tokio::test]
    async fn test_mismatch_closes_connection() {
        let (a, b) = pipe();
        let probe = a.probe();
        let mallory = id(3, 9003);

        let responder = {
            let mallory = mallory.clone();
            tokio::spawn(async move { verify_inbound(instance(b), &mallory, TIMEOUT).await })
        };
        let err = verify_outbound(instance(a), &id(1, 9001), &id(2, 9002), TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TandemError::PeerIdentityMismatch { close_error: None, .. }
        ));
        assert!(err.is_protocol_violation());
        assert!(probe.is_closed());
        assert!(responder.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_mismatch_reports_close_failure() {
        let (a, b) = pipe();
        a.probe().fail_next_close();

        tokio::spawn(async move { verify_inbound(instance(b), &id(3, 9003), TIMEOUT).await });
        let err = verify_outbound(instance(a), &id(1, 9001), &id(2, 9002), TIMEOUT)
            .await
            .unwrap_err();

        let text = err.to_string();
        assert!(text.starts_with("peer identity mismatch"), "{}", text);
        assert!(text.contains("; error closing connection - "), "{}", text);
    }

    #[tokio::test]
    async fn test_endpoint_difference_is_a_mismatch() {
        let (a, b) = pipe();
        let bob = id(2, 9002);
        let mut bob_other_endpoint = bob.clone();
        bob_other_endpoint.listener_endpoint = "/other".into();

        tokio::spawn(async move { verify_inbound(instance(b), &bob_other_endpoint, TIMEOUT).await });
        assert!(matches!(
            verify_outbound(instance(a), &id(1, 9001), &bob, TIMEOUT).await,
            Err(TandemError::PeerIdentityMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_inbound_garbage_closes() {
        let (a, mut raw) = pipe();
        let probe = a.probe();
        raw.write(b"{}").await.unwrap();

        let err = verify_inbound(instance(a), &id(2, 9002), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::Handshake { step: "identity read", .. }));
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_inbound_rejects_wrong_first_message() {
        let (a, b) = pipe();
        let mut peer = instance(b);
        peer.identity_respond(&id(1, 9001)).await.unwrap();

        match verify_inbound(instance(a), &id(2, 9002), TIMEOUT).await {
            Err(TandemError::Handshake { source, .. }) => assert!(matches!(
                *source,
                TandemError::UnexpectedMessage { expected: "identity_request", .. }
            )),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_inbound_times_out() {
        let (a, _silent) = pipe();
        let probe = a.probe();

        let err = verify_inbound(instance(a), &id(2, 9002), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("read deadline exceeded"), "{}", err);
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_outbound_peer_hangs_up() {
        let (a, mut b) = pipe();
        let probe = a.probe();
        b.close().await.unwrap();

        let err = verify_outbound(instance(a), &id(1, 9001), &id(2, 9002), TIMEOUT)
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("handshake failed at identity request - "));
        assert!(probe.is_closed());
    }
}
