//! # Tandem Contacts
//!
//! Alias-keyed contact book used to look up the identity of channel peers.
//!
//! - **Memory**: concurrent in-process book
//! - **File**: JSON persistence of the same book
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_contacts::ContactBook;
//!
//! let book = ContactBook::load("contacts.json").await?;
//! let bob = book.off_chain_id("bob").ok_or("unknown contact")?;
//! let channel = manager.new_channel(&alice, &bob, TransportKind::WebSocket).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod file;
mod memory;

pub use memory::ContactBook;
