//! Byte-message transports.
//!
//! A [`Transport`] carries whole messages between two endpoints; a
//! [`Listener`] produces transports for inbound connections. Two
//! implementations ship with the crate:
//!
//! - [`websocket`]: websocket over TCP, the transport used between nodes
//! - [`memory`]: an in-process pipe for tests

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tandem_core::error::{Result, TandemError};

pub mod memory;
pub mod websocket;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// A connected, message-oriented byte stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads the next whole message.
    async fn read(&mut self) -> Result<Vec<u8>>;

    /// Writes one whole message.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Closes the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;

    /// Returns true while the connection is usable.
    fn connected(&self) -> bool;

    /// Sets the instant after which pending and future reads fail. `None` clears it.
    fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()>;

    /// Sets the instant after which pending and future writes fail. `None` clears it.
    fn set_write_deadline(&mut self, deadline: Option<Instant>) -> Result<()>;

    /// Remote address, if the transport has one.
    fn peer_addr(&self) -> Option<String> {
        None
    }
}

/// Source of inbound transports.
#[async_trait]
pub trait Listener: Send {
    /// Waits for the next inbound connection.
    ///
    /// Returns [`TandemError::ConnectionClosed`] once the listener is closed.
    async fn accept(&mut self) -> Result<Box<dyn Transport>>;

    /// Stops accepting and releases the bound address.
    async fn close(&mut self) -> Result<()>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> Result<SocketAddr>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCEPT LOOP
// ═══════════════════════════════════════════════════════════════════════════════

/// Shutdown handle of a running accept loop.
///
/// Dropping the handle stops the loop as well; [`ListenerHandle::close`]
/// additionally waits until the bound address has been released.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: Option<SocketAddr>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns true once the accept loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stops the accept loop and waits for the listener to be released.
    pub async fn close(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "accept loop ended abnormally");
            }
        }
    }
}

/// Runs `listener` on a background task, forwarding every accepted
/// transport to `conns`.
///
/// The loop ends when the handle is closed or dropped, when the listener
/// reports it is closed, or when the receiving side of `conns` is gone.
pub fn spawn_accept_loop(
    mut listener: Box<dyn Listener>,
    conns: mpsc::Sender<Box<dyn Transport>>,
) -> ListenerHandle {
    let local_addr = listener.local_addr().ok();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        info!(addr = ?local_addr, "listener started");

        loop {
            let accepted = tokio::select! {
                _ = &mut stop_rx => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(conn) => {
                    debug!(peer = ?conn.peer_addr(), "accepted connection");
                    if conns.send(conn).await.is_err() {
                        debug!("connection receiver dropped");
                        break;
                    }
                }
                Err(TandemError::ConnectionClosed) => break,
                Err(e) => {
                    warn!(error = %e, "error accepting connection");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }

        if let Err(e) = listener.close().await {
            warn!(error = %e, "error closing listener");
        }
        info!(addr = ?local_addr, "listener stopped");
    });

    ListenerHandle {
        local_addr,
        stop: Some(stop_tx),
        task: Some(task),
    }
}
