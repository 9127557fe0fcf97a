//! Websocket transport.
//!
//! Outbound channels dial `ws://<listener_ip_addr><listener_endpoint>` of the
//! peer. Inbound connections are upgraded only on the listener's own
//! endpoint path; any other path is answered with HTTP 404. The upgrade of
//! an inbound connection runs when it is first used, not inside `accept`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_hdr_async, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use tandem_core::error::{Result, TandemError};
use tandem_core::types::OffChainId;

use super::{Listener, Transport};

/// Websocket transport over any async byte stream.
#[derive(Debug)]
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
    peer: Option<String>,
    connected: bool,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established websocket stream.
    pub fn new(stream: WebSocketStream<S>, peer: Option<String>) -> Self {
        Self {
            stream,
            peer,
            connected: true,
            read_deadline: None,
            write_deadline: None,
        }
    }
}

fn map_ws_error(err: WsError) -> TandemError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TandemError::ConnectionClosed,
        other => TandemError::Transport(other.to_string()),
    }
}

#[async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    async fn read(&mut self) -> Result<Vec<u8>> {
        if !self.connected {
            return Err(TandemError::ConnectionClosed);
        }

        let deadline = self.read_deadline;
        let stream = &mut self.stream;
        let next = async {
            loop {
                match stream.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(data),
                    Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                    Some(Ok(Message::Close(_))) | None => return Err(TandemError::ConnectionClosed),
                    // Control frames are answered by tungstenite itself.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(map_ws_error(e)),
                }
            }
        };

        let result = match deadline {
            Some(at) => tokio::time::timeout_at(at, next)
                .await
                .map_err(|_| TandemError::DeadlineExceeded("read"))?,
            None => next.await,
        };

        if matches!(result, Err(TandemError::ConnectionClosed)) {
            self.connected = false;
        }
        result
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(TandemError::ConnectionClosed);
        }

        let deadline = self.write_deadline;
        let send = self.stream.send(Message::Binary(data.to_vec()));
        let result = match deadline {
            Some(at) => tokio::time::timeout_at(at, send)
                .await
                .map_err(|_| TandemError::DeadlineExceeded("write"))?,
            None => send.await,
        };

        result.map_err(|e| {
            let err = map_ws_error(e);
            if matches!(err, TandemError::ConnectionClosed) {
                self.connected = false;
            }
            err
        })
    }

    async fn close(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;

        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TandemError::Transport(format!("error closing websocket - {}", e))),
        }
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.read_deadline = deadline;
        Ok(())
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.write_deadline = deadline;
        Ok(())
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer.clone()
    }
}

/// Transport produced by [`dial`].
pub type WsClientTransport = WsTransport<MaybeTlsStream<TcpStream>>;

/// Dials the websocket listener of `peer`.
pub async fn dial(peer: &OffChainId) -> Result<WsClientTransport> {
    let url = peer.ws_url();
    debug!(%url, "dialing peer");

    let (stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| TandemError::Transport(format!("websocket dial {} - {}", url, e)))?;

    Ok(WsTransport::new(stream, Some(peer.listener_ip_addr.clone())))
}

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER
// ═══════════════════════════════════════════════════════════════════════════════

/// TCP listener upgrading inbound connections to websockets.
#[derive(Debug)]
pub struct WsListener {
    inner: Option<TcpListener>,
    local_addr: SocketAddr,
    endpoint: String,
    upgrade_timeout: Duration,
}

impl WsListener {
    /// Binds the listener address of `self_id`.
    ///
    /// Upgrades that take longer than `upgrade_timeout` are dropped.
    pub async fn bind(self_id: &OffChainId, upgrade_timeout: Duration) -> Result<Self> {
        let addr = self_id.listener_local_addr()?;
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|e| TandemError::Transport(format!("error binding {} - {}", addr, e)))?;
        let local_addr = inner.local_addr()?;

        Ok(Self {
            inner: Some(inner),
            local_addr,
            endpoint: self_id.listener_endpoint.clone(),
            upgrade_timeout,
        })
    }
}

#[async_trait]
impl Listener for WsListener {
    async fn accept(&mut self) -> Result<Box<dyn Transport>> {
        let inner = self.inner.as_ref().ok_or(TandemError::ConnectionClosed)?;
        let (stream, peer) = inner.accept().await?;
        debug!(%peer, "connection accepted");

        Ok(Box::new(WsInboundTransport {
            state: Inbound::Pending(stream),
            peer,
            endpoint: self.endpoint.clone(),
            upgrade_timeout: self.upgrade_timeout,
            read_deadline: None,
            write_deadline: None,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner = None;
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INBOUND CONNECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Inbound {
    Pending(TcpStream),
    Open(WsTransport<TcpStream>),
    Closed,
}

/// Inbound connection produced by [`WsListener`].
///
/// The websocket upgrade runs on first read or write, so it happens on the
/// task that owns the connection rather than on the accept loop.
#[derive(Debug)]
pub struct WsInboundTransport {
    state: Inbound,
    peer: SocketAddr,
    endpoint: String,
    upgrade_timeout: Duration,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl WsInboundTransport {
    async fn upgraded(&mut self) -> Result<&mut WsTransport<TcpStream>> {
        match std::mem::replace(&mut self.state, Inbound::Closed) {
            Inbound::Pending(stream) => {
                let mut ws =
                    upgrade(stream, &self.endpoint, self.peer, self.upgrade_timeout).await?;
                ws.set_read_deadline(self.read_deadline)?;
                ws.set_write_deadline(self.write_deadline)?;
                self.state = Inbound::Open(ws);
            }
            other => self.state = other,
        }

        match &mut self.state {
            Inbound::Open(ws) => Ok(ws),
            _ => Err(TandemError::ConnectionClosed),
        }
    }
}

async fn upgrade(
    stream: TcpStream,
    endpoint: &str,
    peer: SocketAddr,
    upgrade_timeout: Duration,
) -> Result<WsTransport<TcpStream>> {
    let endpoint = endpoint.to_string();
    let check_path = move |req: &Request, resp: Response| {
        if req.uri().path() == endpoint {
            return Ok(resp);
        }
        let mut err = ErrorResponse::new(Some(format!(
            "no channel endpoint at {}",
            req.uri().path()
        )));
        *err.status_mut() = StatusCode::NOT_FOUND;
        Err(err)
    };

    let ws = tokio::time::timeout(upgrade_timeout, accept_hdr_async(stream, check_path))
        .await
        .map_err(|_| TandemError::DeadlineExceeded("websocket upgrade"))?
        .map_err(|e| TandemError::Transport(format!("websocket upgrade from {} - {}", peer, e)))?;

    debug!(%peer, "websocket upgraded");
    Ok(WsTransport::new(ws, Some(peer.to_string())))
}

#[async_trait]
impl Transport for WsInboundTransport {
    async fn read(&mut self) -> Result<Vec<u8>> {
        self.upgraded().await?.read().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.upgraded().await?.write(data).await
    }

    async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, Inbound::Closed) {
            Inbound::Open(mut ws) => ws.close().await,
            Inbound::Pending(_) | Inbound::Closed => Ok(()),
        }
    }

    fn connected(&self) -> bool {
        match &self.state {
            Inbound::Pending(_) => true,
            Inbound::Open(ws) => ws.connected(),
            Inbound::Closed => false,
        }
    }

    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.read_deadline = deadline;
        match &mut self.state {
            Inbound::Open(ws) => ws.set_read_deadline(deadline),
            _ => Ok(()),
        }
    }

    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.write_deadline = deadline;
        match &mut self.state {
            Inbound::Open(ws) => ws.set_write_deadline(deadline),
            _ => Ok(()),
        }
    }

    fn peer_addr(&self) -> Option<String> {
        Some(self.peer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::types::Address;

    async fn listener() -> (WsListener, OffChainId) {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let id = OffChainId::new(Address::zero(), format!("127.0.0.1:{}", port), "/channel");
        let listener = WsListener::bind(&id, Duration::from_secs(5)).await.unwrap();
        (listener, id)
    }

    #[tokio::test]
    async fn test_dial_and_exchange() {
        let (mut listener, id) = listener().await;

        let server = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            let msg = conn.read().await.unwrap();
            conn.write(&msg).await.unwrap();
            conn
        });

        let mut client = dial(&id).await.unwrap();
        client.write(b"hello").await.unwrap();
        assert_eq!(client.read().await.unwrap(), b"hello");

        client.close().await.unwrap();
        assert!(!client.connected());

        let mut conn = server.await.unwrap();
        assert!(matches!(conn.read().await, Err(TandemError::ConnectionClosed)));
        assert!(!conn.connected());
    }

    #[tokio::test]
    async fn test_wrong_path_is_refused() {
        let (mut listener, id) = listener().await;
        let server = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            conn.read().await.map(|_| ())
        });

        let mut wrong = id.clone();
        wrong.listener_endpoint = "/elsewhere".into();
        assert!(dial(&wrong).await.is_err());

        assert!(matches!(server.await.unwrap(), Err(TandemError::Transport(_))));
    }

    #[tokio::test]
    async fn test_silent_client_does_not_hold_up_accept() {
        let (mut listener, id) = listener().await;
        let addr = listener.local_addr().unwrap();

        let _silent = TcpStream::connect(addr).await.unwrap();
        let mut stalled = listener.accept().await.unwrap();
        assert!(stalled.connected());

        let server = tokio::spawn(async move {
            let mut conn = listener.accept().await.unwrap();
            let msg = conn.read().await.unwrap();
            conn.write(&msg).await.unwrap();
            conn
        });

        let mut client = tokio::time::timeout(Duration::from_secs(2), dial(&id))
            .await
            .unwrap()
            .unwrap();
        client.write(b"ping").await.unwrap();
        assert_eq!(client.read().await.unwrap(), b"ping");

        server.await.unwrap();
        stalled.close().await.unwrap();
        assert!(!stalled.connected());
    }

    #[tokio::test]
    async fn test_upgrade_times_out_on_first_read() {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);
        let id = OffChainId::new(Address::zero(), format!("127.0.0.1:{}", port), "/channel");
        let mut listener = WsListener::bind(&id, Duration::from_millis(50)).await.unwrap();

        let _silent = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let mut conn = listener.accept().await.unwrap();
        assert!(matches!(
            conn.read().await,
            Err(TandemError::DeadlineExceeded("websocket upgrade"))
        ));
        assert!(!conn.connected());
    }

    #[tokio::test]
    async fn test_closed_listener_refuses_accept() {
        let (mut listener, _id) = listener().await;
        listener.close().await.unwrap();
        assert!(matches!(
            listener.accept().await,
            Err(TandemError::ConnectionClosed)
        ));
    }
}
