//! Recovering signature verification.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use subtle::ConstantTimeEq;

use tandem_core::constants::SIGNATURE_SIZE;
use tandem_core::error::{Result, TandemError};
use tandem_core::traits::SignatureVerifier;
use tandem_core::types::{Address, Signature};

use crate::hash::keccak256;
use crate::signer::address_of;

/// Verifies `r || s || v` signatures by recovering the signer address.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn verify(&self, message: &[u8], signature: &Signature, signer: &Address) -> Result<bool> {
        let recovered = match recover_address(message, signature) {
            Ok(address) => address,
            Err(TandemError::MalformedSignature(reason)) => {
                return Err(TandemError::MalformedSignature(reason))
            }
            // Well-formed but unrecoverable: signed by no key at all.
            Err(_) => return Ok(false),
        };

        Ok(recovered.as_bytes().ct_eq(signer.as_bytes()).into())
    }
}

/// Recovers the address that signed `keccak256(message)`.
///
/// Accepts recovery ids 0/1 and their legacy 27/28 forms.
pub fn recover_address(message: &[u8], signature: &Signature) -> Result<Address> {
    let bytes = signature.as_bytes();
    if bytes.len() != SIGNATURE_SIZE {
        return Err(TandemError::MalformedSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_SIZE,
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(TandemError::MalformedSignature(format!(
                "invalid recovery id {}",
                other
            )))
        }
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| TandemError::MalformedSignature(format!("invalid recovery id {}", v)))?;

    let sig = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| TandemError::MalformedSignature(e.to_string()))?;

    let digest = keccak256(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| TandemError::InvalidKey(format!("public key recovery failed: {}", e)))?;

    Ok(address_of(&key))
}
