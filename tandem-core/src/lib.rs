//! # Tandem Core
//!
//! Core types, errors, and traits for the Tandem bilateral channel protocol.
//!
//! This crate provides the foundational building blocks used by all other Tandem crates:
//!
//! - **Types**: identities, roles, channel status, signed states, session ids
//! - **Errors**: a single error hierarchy with context
//! - **Validation**: boolean-with-reason results for speculative checks
//! - **Traits**: the seams where signature verification, session-id
//!   validation and time are injected
//! - **Clock**: system and fixed clocks
//!
//! ## Example
//!
//! ```rust
//! use tandem_core::{ChannelStatus, Version};
//!
//! assert!(ChannelStatus::Init.can_transition_to(ChannelStatus::Open));
//! assert!(Version::from(2u64) > Version::from(1u64));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod clock;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export commonly used items at crate root
pub use clock::{FixedClock, SystemClock};
pub use constants::*;
pub use error::{Result, TandemError};
pub use traits::*;
pub use types::*;
pub use validation::Validation;
