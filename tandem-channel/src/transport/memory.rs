//! In-process transport for tests.
//!
//! [`pipe`] returns two connected ends; whatever one end writes the other
//! reads. Each end exposes a [`PipeProbe`] to observe how often it was
//! closed and to make the next close fail.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use tandem_core::error::{Result, TandemError};

use super::{Listener, Transport};

/// Messages buffered per direction.
const PIPE_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct ProbeState {
    close_calls: AtomicUsize,
    closed: AtomicBool,
    fail_next_close: AtomicBool,
}

/// Observes one end of a [`pipe`].
#[derive(Clone, Debug)]
pub struct PipeProbe {
    state: Arc<ProbeState>,
}

impl PipeProbe {
    /// Number of times `close` was called on the end.
    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    /// Returns true once the end has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Makes the next `close` on the end report an error.
    pub fn fail_next_close(&self) {
        self.state.fail_next_close.store(true, Ordering::SeqCst);
    }
}

/// One end of an in-process pipe.
#[derive(Debug)]
pub struct MemoryTransport {
    name: String,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: Option<mpsc::Receiver<Vec<u8>>>,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
    probe: Arc<ProbeState>,
}

/// Creates two connected in-process transports.
pub fn pipe() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = mpsc::channel(PIPE_CAPACITY);
    let (b_tx, a_rx) = mpsc::channel(PIPE_CAPACITY);

    (
        MemoryTransport::new("pipe-a", a_tx, a_rx),
        MemoryTransport::new("pipe-b", b_tx, b_rx),
    )
}

impl MemoryTransport {
    fn new(name: &str, tx: mpsc::Sender<Vec<u8>>, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            tx: Some(tx),
            rx: Some(rx),
            read_deadline: None,
            write_deadline: None,
            probe: Arc::default(),
        }
    }

    /// Probe observing this end.
    pub fn probe(&self) -> PipeProbe {
        PipeProbe {
            state: Arc::clone(&self.probe),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read(&mut self) -> Result<Vec<u8>> {
        let deadline = self.read_deadline;
        let rx = self.rx.as_mut().ok_or(TandemError::ConnectionClosed)?;

        let received = match deadline {
            Some(at) => tokio::time::timeout_at(at, rx.recv())
                .await
                .map_err(|_| TandemError::DeadlineExceeded("read"))?,
            None => rx.recv().await,
        };

        received.ok_or(TandemError::ConnectionClosed)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let deadline = self.write_deadline;
        let tx = self.tx.as_ref().ok_or(TandemError::ConnectionClosed)?;

        let sent = match deadline {
            Some(at) => tokio::time::timeout_at(at, tx.send(data.to_vec()))
                .await
                .map_err(|_| TandemError::DeadlineExceeded("write"))?,
            None => tx.send(data.to_vec()).await,
        };

        sent.map_err(|_| TandemError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.closed.store(true, Ordering::SeqCst);
        self.tx = None;
        self.rx = None;

        if self.probe.fail_next_close.swap(false, Ordering::SeqCst) {
            return Err(TandemError::Transport(format!("{}: injected close failure", self.name)));
        }
        Ok(())
    }

    fn connected(&self) -> bool {
        self.tx.as_ref().map_or(false, |tx| !tx.is_closed())
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
        Some(self.name.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER
// ═══════════════════════════════════════════════════════════════════════════════

/// Listener fed by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryListener {
    rx: Option<mpsc::Receiver<Box<dyn Transport>>>,
}

/// Hands transports to a [`MemoryListener`] as if they had connected.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    tx: mpsc::Sender<Box<dyn Transport>>,
}

impl MemoryListener {
    /// Creates a listener and the connector that feeds it.
    pub fn pair() -> (MemoryListener, MemoryConnector) {
        let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
        (MemoryListener { rx: Some(rx) }, MemoryConnector { tx })
    }
}

impl MemoryConnector {
    /// Delivers `conn` to the listener's next `accept`.
    pub async fn connect(&self, conn: Box<dyn Transport>) -> Result<()> {
        self.tx
            .send(conn)
            .await
            .map_err(|_| TandemError::ConnectionClosed)
    }
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&mut self) -> Result<Box<dyn Transport>> {
        let rx = self.rx.as_mut().ok_or(TandemError::ConnectionClosed)?;
        rx.recv().await.ok_or(TandemError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.rx = None;
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Err(TandemError::Transport(
            "in-memory listener has no socket address".into(),
        ))
    }
}
