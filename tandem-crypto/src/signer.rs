//! secp256k1 keypairs and state signing.
//!
//! Signatures are 65 bytes: `r || s || v`, produced over the Keccak256
//! digest of the message. `v` is the recovery id (0 or 1), so verifiers can
//! recover the signer address instead of needing the public key.

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use tandem_core::constants::{ADDRESS_SIZE, SIGNATURE_SIZE};
use tandem_core::error::{Result, TandemError};
use tandem_core::types::{Address, SignableState, Signature, Signed};

use crate::hash::keccak256;

/// Size of a secp256k1 secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// A secp256k1 signing key and the ledger address it controls.
#[derive(Clone)]
pub struct Keypair {
    secret: SigningKey,
    address: Address,
}

impl Keypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generates a keypair from the given RNG.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_signing_key(SigningKey::random(rng))
    }

    /// Loads a keypair from a 32-byte secret scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(TandemError::InvalidKeySize {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let secret = SigningKey::from_slice(bytes)
            .map_err(|e| TandemError::InvalidKey(format!("secp256k1 secret key: {}", e)))?;
        Ok(Self::from_signing_key(secret))
    }

    /// Loads a keypair from a hex-encoded secret (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = hex::decode(s)?;
        let keypair = Self::from_bytes(&bytes);
        bytes.zeroize();
        keypair
    }

    fn from_signing_key(secret: SigningKey) -> Self {
        let address = address_of(secret.verifying_key());
        Self { secret, address }
    }

    /// Ledger address controlled by this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Hex-encoded secret key. Cleared from memory when dropped.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        let mut bytes: [u8; SECRET_KEY_SIZE] = self.secret.to_bytes().into();
        let encoded = Zeroizing::new(hex::encode(bytes));
        bytes.zeroize();
        encoded
    }

    /// Signs `keccak256(message)`, returning `r || s || v`.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let digest = keccak256(message);
        let (signature, recovery_id) = self
            .secret
            .sign_prehash_recoverable(&digest)
            .map_err(|e| TandemError::SigningError(e.to_string()))?;

        let mut out = Vec::with_capacity(SIGNATURE_SIZE);
        out.extend_from_slice(&signature.to_bytes());
        out.push(recovery_id.to_byte());
        Ok(Signature::from_bytes(out))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Derives the ledger address of a public key.
///
/// address = keccak256(uncompressed_pubkey[1..])[12..32]
pub(crate) fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut address = [0u8; ADDRESS_SIZE];
    address.copy_from_slice(&hash[32 - ADDRESS_SIZE..]);
    Address::from_array(address)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE SIGNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Signs the signing bytes of `state`.
pub fn sign_state<S: SignableState>(keypair: &Keypair, state: &S) -> Result<Signature> {
    keypair.sign(&state.signing_bytes())
}

/// Produces a state signed by both parties.
pub fn sign_both<S: SignableState>(state: S, sender: &Keypair, receiver: &Keypair) -> Result<Signed<S>> {
    let sign_sender = sign_state(sender, &state)?;
    let sign_receiver = sign_state(receiver, &state)?;
    Ok(Signed::new(state, sign_sender, sign_receiver))
}
