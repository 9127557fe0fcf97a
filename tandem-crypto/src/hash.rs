//! Hashing utilities.
//!
//! Everything in Tandem that needs a digest uses Keccak256: signer
//! addresses, the prehash of state signatures and the binding of the two
//! session-id parts.

use sha3::{Digest, Keccak256};

/// Computes Keccak256 hash.
///
/// Note: Keccak256 is NOT SHA3-256. They use different padding.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Computes Keccak256 over the concatenation of `inputs`.
pub fn keccak256_concat(inputs: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize().into()
}
