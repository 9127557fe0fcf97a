//! Protocol constants for Tandem.

// ═══════════════════════════════════════════════════════════════════════════════
// SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a ledger address in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Size of a recoverable ECDSA signature (`r || s || v`) in bytes.
pub const SIGNATURE_SIZE: usize = 65;

/// Size of each party's contribution to a session id.
pub const SESSION_ID_PART_SIZE: usize = 32;

/// Size of a VPC state identifier.
pub const VPC_STATE_ID_SIZE: usize = 32;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN SEPARATORS
// ═══════════════════════════════════════════════════════════════════════════════
// Signing bytes of every state flavor start with a distinct tag so a signature
// over one flavor can never be replayed as another.

/// Domain separator for MSC base state signatures.
pub const DOMAIN_MSC_BASE_STATE: &[u8] = b"TANDEM_MSC_BASE_STATE_V1";

/// Domain separator for VPC state signatures.
pub const DOMAIN_VPC_STATE: &[u8] = b"TANDEM_VPC_STATE_V1";

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL VERSIONING
// ═══════════════════════════════════════════════════════════════════════════════

/// Version string carried by every channel message.
/// Increment when making breaking changes to the message format.
pub const PROTOCOL_VERSION: &str = "1";

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default listener endpoint path.
pub const DEFAULT_LISTENER_ENDPOINT: &str = "/";

/// Default time zone used for message timestamps.
pub const DEFAULT_TIME_ZONE: &str = "Local";
