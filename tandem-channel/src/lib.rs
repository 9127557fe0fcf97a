//! # Tandem Channel
//!
//! Channel instances and the session layer that produces them.
//!
//! ## Flow
//!
//! 1. [`ChannelManager::new_session`] binds a listener under this node's
//!    identity and proves it reachable by dialing itself.
//! 2. Every inbound connection runs the identity handshake; verified
//!    channels come out of [`Session::next_channel`] with this node as
//!    `Receiver`.
//! 3. [`ChannelManager::new_channel`] dials a peer and checks that the
//!    identity it presents is the one expected; this node is `Sender`.
//! 4. On an [`Instance`], status moves follow the lifecycle table and every
//!    signed state is checked against both parties before it is kept.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tandem_channel::{ChannelConfig, ChannelManager};
//! use tandem_core::TransportKind;
//! use tandem_crypto::{EcdsaVerifier, SessionIdChecker};
//!
//! let manager = ChannelManager::new(
//!     ChannelConfig::from_env()?,
//!     Arc::new(EcdsaVerifier),
//!     Arc::new(SessionIdChecker),
//! )?;
//!
//! let mut session = manager.new_session(&alice, TransportKind::WebSocket, 16).await?;
//! while let Some(channel) = session.next_channel().await {
//!     tokio::spawn(serve(channel));
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod config;
pub mod handshake;
pub mod instance;
pub mod message;
pub mod session;
pub mod transport;

pub use config::ChannelConfig;
pub use handshake::{verify_inbound, verify_outbound};
pub use instance::Instance;
pub use message::{ChannelMessage, MessageBody};
pub use session::{ChannelManager, Session, SessionParts};
pub use transport::{spawn_accept_loop, Listener, ListenerHandle, Transport};
