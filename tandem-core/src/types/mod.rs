//! Domain types for Tandem.
//!
//! - [`Address`], [`OffChainId`]: participant identities
//! - [`Role`], [`ClosingMode`], [`TransportKind`]: per-channel configuration values
//! - [`ChannelStatus`]: channel lifecycle and its transition table
//! - [`Signed`], [`MscBaseState`], [`VpcState`]: dual-signed channel states
//! - [`SessionId`], [`ContractStore`], [`ContactRecord`]: negotiated and external data

mod identity;
mod role;
mod status;
mod state;
mod session;
mod contract;
mod contact;

pub use identity::*;
pub use role::*;
pub use status::*;
pub use state::*;
pub use session::*;
pub use contract::*;
pub use contact::*;
