//! # Tandem Cryptography
//!
//! Concrete cryptographic collaborators for the Tandem channel core.
//!
//! This crate provides:
//!
//! - **Hash**: Keccak256
//! - **Signer**: secp256k1 keypairs producing recoverable `r || s || v` signatures
//! - **Verify**: a [`SignatureVerifier`](tandem_core::SignatureVerifier) that
//!   recovers the signer address and compares it to the expected one
//! - **Session**: session-id assembly and validation
//!
//! ## Security Properties
//!
//! - Secret keys are zeroized on drop
//! - Signer addresses are compared in constant time
//! - State signatures are domain separated per state flavor
//!
//! ## Example
//!
//! ```rust
//! use tandem_core::{SignableState, SignatureVerifier, VpcState};
//! use tandem_crypto::{sign_state, EcdsaVerifier, Keypair};
//!
//! let keypair = Keypair::generate();
//! let state = VpcState {
//!     id: [1u8; 32],
//!     version: 1u64.into(),
//!     blocked_sender: 10u64.into(),
//!     blocked_receiver: 0u64.into(),
//! };
//!
//! let signature = sign_state(&keypair, &state).unwrap();
//! let ok = EcdsaVerifier
//!     .verify(&state.signing_bytes(), &signature, &keypair.address())
//!     .unwrap();
//! assert!(ok);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod hash;
pub mod session;
pub mod signer;
pub mod verify;

// Re-export main items at crate root
pub use hash::keccak256;
pub use session::SessionIdChecker;
pub use signer::{sign_both, sign_state, Keypair};
pub use verify::{recover_address, EcdsaVerifier};
