//! Signed channel states.
//!
//! Two state flavors are exchanged between the parties:
//!
//! - [`MscBaseState`]: the base state of the ledger contract backing the channel
//! - [`VpcState`]: an off-chain payment state, versioned monotonically
//!
//! Both are wrapped in [`Signed`], which carries one signature per role. The
//! bytes each party signs come from [`SignableState::signing_bytes`]: a
//! domain tag followed by every field, integers length-prefixed big-endian.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::constants::{DOMAIN_MSC_BASE_STATE, DOMAIN_VPC_STATE, VPC_STATE_ID_SIZE};
use crate::error::{Result, TandemError};
use crate::traits::SignatureVerifier;
use crate::types::{Address, OffChainId, Role};

// ═══════════════════════════════════════════════════════════════════════════════
// ARBITRARY PRECISION INTEGERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Unsigned integer of arbitrary precision, serialized as a decimal string.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint(BigUint);

/// State version number. Accepted versions on a channel strictly increase.
pub type Version = Uint;

impl Uint {
    /// Zero.
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    /// Builds from big-endian bytes.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// Minimal big-endian encoding (`[0]` for zero).
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    /// Returns the inner big integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Uint {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for Uint {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl FromStr for Uint {
    type Err = TandemError;

    fn from_str(s: &str) -> Result<Self> {
        BigUint::from_str(s.trim())
            .map(Self)
            .map_err(|e| TandemError::ValidationError(format!("invalid integer '{}': {}", s, e)))
    }
}

impl fmt::Display for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Uint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_str_radix(10))
    }
}

impl<'de> Deserialize<'de> for Uint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw signature bytes. Structure is checked by the verifier, not here.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex")] Vec<u8>);

impl Signature {
    /// Wraps raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no signature bytes are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(&self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE FLAVORS
// ═══════════════════════════════════════════════════════════════════════════════

/// A state both parties sign.
pub trait SignableState {
    /// Deterministic, domain-separated bytes covered by the signatures.
    fn signing_bytes(&self) -> Vec<u8>;

    /// Version of this state.
    fn version(&self) -> &Version;
}

/// Base state of the multi-session contract backing the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MscBaseState {
    /// Address of the virtual payment channel contract.
    pub vpc_address: Address,
    /// Complete session id.
    pub sid: Uint,
    /// Amount blocked by the sender.
    pub blocked_sender: Uint,
    /// Amount blocked by the receiver.
    pub blocked_receiver: Uint,
    /// State version.
    pub version: Version,
}

impl SignableState for MscBaseState {
    fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DOMAIN_MSC_BASE_STATE.len() + 128);
        out.extend_from_slice(DOMAIN_MSC_BASE_STATE);
        out.extend_from_slice(self.vpc_address.as_bytes());
        put_uint(&mut out, &self.sid);
        put_uint(&mut out, &self.blocked_sender);
        put_uint(&mut out, &self.blocked_receiver);
        put_uint(&mut out, &self.version);
        out
    }

    fn version(&self) -> &Version {
        &self.version
    }
}

/// Off-chain payment state of a virtual payment channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcState {
    /// Identifier of the virtual payment channel.
    #[serde(with = "hex")]
    pub id: [u8; VPC_STATE_ID_SIZE],
    /// State version.
    pub version: Version,
    /// Amount currently owed by the sender.
    pub blocked_sender: Uint,
    /// Amount currently owed to the receiver.
    pub blocked_receiver: Uint,
}

impl SignableState for VpcState {
    fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DOMAIN_VPC_STATE.len() + 128);
        out.extend_from_slice(DOMAIN_VPC_STATE);
        out.extend_from_slice(&self.id);
        put_uint(&mut out, &self.version);
        put_uint(&mut out, &self.blocked_sender);
        put_uint(&mut out, &self.blocked_receiver);
        out
    }

    fn version(&self) -> &Version {
        &self.version
    }
}

fn put_uint(out: &mut Vec<u8>, value: &Uint) {
    let bytes = value.to_bytes_be();
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&bytes);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNED WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// A state together with the signatures of both parties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signed<S> {
    /// The signed state.
    pub state: S,
    /// Signature of the sender.
    pub sign_sender: Signature,
    /// Signature of the receiver.
    pub sign_receiver: Signature,
}

/// Dual-signed MSC base state.
pub type MscBaseStateSigned = Signed<MscBaseState>;

/// Dual-signed VPC state.
pub type VpcStateSigned = Signed<VpcState>;

impl<S: SignableState> Signed<S> {
    /// Wraps a state with both signatures.
    pub fn new(state: S, sign_sender: Signature, sign_receiver: Signature) -> Self {
        Self {
            state,
            sign_sender,
            sign_receiver,
        }
    }

    /// Version of the wrapped state.
    pub fn version(&self) -> &Version {
        self.state.version()
    }

    /// Signature of the given role.
    pub fn signature(&self, role: Role) -> Result<&Signature> {
        match role {
            Role::Sender => Ok(&self.sign_sender),
            Role::Receiver => Ok(&self.sign_receiver),
            Role::Unset => Err(TandemError::InvalidRole(
                "signature role must be sender or receiver".into(),
            )),
        }
    }

    /// Checks the `role` signature against `signer`'s on-chain address.
    pub fn verify_sign(
        &self,
        verifier: &dyn SignatureVerifier,
        signer: &OffChainId,
        role: Role,
    ) -> Result<bool> {
        let signature = self.signature(role)?;
        verifier.verify(&self.state.signing_bytes(), signature, &signer.on_chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ADDRESS_SIZE;

    /// Accepts a signature iff it equals the signer's address bytes.
    struct AddressEcho;

    impl SignatureVerifier for AddressEcho {
        fn verify(&self, _message: &[u8], signature: &Signature, signer: &Address) -> Result<bool> {
            if signature.is_empty() {
                return Err(TandemError::MalformedSignature("empty".into()));
            }
            Ok(signature.as_bytes() == signer.as_bytes())
        }
    }

    fn vpc(version: u64) -> VpcState {
        VpcState {
            id: [7u8; VPC_STATE_ID_SIZE],
            version: version.into(),
            blocked_sender: 10u64.into(),
            blocked_receiver: 0u64.into(),
        }
    }

    #[test]
    fn test_uint_ordering_and_text() {
        let big: Uint = "340282366920938463463374607431768211456".parse().unwrap();
        assert!(big > Uint::from(u64::MAX));
        assert_eq!(big.to_string(), "340282366920938463463374607431768211456");
        assert!("-1".parse::<Uint>().is_err());
    }

    #[test]
    fn test_uint_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Uint::from(42u64)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Uint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Uint::from(42u64));
    }

    #[test]
    fn test_signing_bytes_are_domain_separated() {
        let state = vpc(1);
        let bytes = state.signing_bytes();
        assert!(bytes.starts_with(DOMAIN_VPC_STATE));

        let base = MscBaseState {
            vpc_address: Address::zero(),
            sid: 1u64.into(),
            blocked_sender: 0u64.into(),
            blocked_receiver: 0u64.into(),
            version: 1u64.into(),
        };
        assert!(base.signing_bytes().starts_with(DOMAIN_MSC_BASE_STATE));
    }

    #[test]
    fn test_signing_bytes_cover_every_field() {
        let a = vpc(1);
        let mut b = vpc(1);
        b.blocked_receiver = 1u64.into();
        assert_ne!(a.signing_bytes(), b.signing_bytes());

        let mut c = vpc(1);
        c.id[0] = 0;
        assert_ne!(a.signing_bytes(), c.signing_bytes());
        assert_ne!(vpc(1).signing_bytes(), vpc(2).signing_bytes());
    }

    #[test]
    fn test_verify_sign_uses_role_signature() {
        let alice = OffChainId::new(Address::from_array([1; ADDRESS_SIZE]), "a:1", "/");
        let bob = OffChainId::new(Address::from_array([2; ADDRESS_SIZE]), "b:1", "/");
        let signed = Signed::new(
            vpc(1),
            Signature::from_bytes(alice.on_chain_id.as_bytes()),
            Signature::from_bytes(bob.on_chain_id.as_bytes()),
        );

        assert!(signed.verify_sign(&AddressEcho, &alice, Role::Sender).unwrap());
        assert!(signed.verify_sign(&AddressEcho, &bob, Role::Receiver).unwrap());
        assert!(!signed.verify_sign(&AddressEcho, &bob, Role::Sender).unwrap());
        assert!(matches!(
            signed.verify_sign(&AddressEcho, &alice, Role::Unset),
            Err(TandemError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_signed_state_json_shape() {
        let signed = Signed::new(vpc(3), Signature::from_bytes(vec![0xAA]), Signature::default());
        let value = serde_json::to_value(&signed).unwrap();
        assert_eq!(value["sign_sender"], "aa");
        assert_eq!(value["state"]["version"], "3");
        let back: VpcStateSigned = serde_json::from_value(value).unwrap();
        assert_eq!(back, signed);
    }
}
