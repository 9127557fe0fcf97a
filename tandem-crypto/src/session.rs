//! Session id assembly and validation.
//!
//! ```text
//! sender_part, receiver_part : 32 random non-zero bytes each
//! sid_complete = uint(keccak256(sender_part || receiver_part))
//! ```

use rand::rngs::OsRng;
use rand::RngCore;

use tandem_core::constants::SESSION_ID_PART_SIZE;
use tandem_core::error::{Result, TandemError};
use tandem_core::traits::SessionIdValidator;
use tandem_core::types::{SessionId, Uint};
use tandem_core::validation::Validation;

use crate::hash::keccak256_concat;

/// Draws one party's random contribution to a session id.
pub fn random_part() -> Vec<u8> {
    let mut part = vec![0u8; SESSION_ID_PART_SIZE];
    loop {
        OsRng.fill_bytes(&mut part);
        if part.iter().any(|&b| b != 0) {
            return part;
        }
    }
}

/// Combines both parts into a complete session id.
pub fn assemble(sender_part: Vec<u8>, receiver_part: Vec<u8>) -> Result<SessionId> {
    if let Some(reason) =
        check_part("sender", &sender_part).or_else(|| check_part("receiver", &receiver_part))
    {
        return Err(TandemError::SessionIdInvalid(reason));
    }

    let sid_complete = complete(&sender_part, &receiver_part);
    Ok(SessionId {
        sender_part,
        receiver_part,
        sid_complete,
    })
}

fn complete(sender_part: &[u8], receiver_part: &[u8]) -> Uint {
    Uint::from_bytes_be(&keccak256_concat(&[sender_part, receiver_part]))
}

fn check_part(role: &str, part: &[u8]) -> Option<String> {
    if part.len() != SESSION_ID_PART_SIZE {
        return Some(format!(
            "{} part must be {} bytes, got {}",
            role,
            SESSION_ID_PART_SIZE,
            part.len()
        ));
    }
    if part.iter().all(|&b| b == 0) {
        return Some(format!("{} part is all zero", role));
    }
    None
}

/// Accepts session ids whose complete value binds both parts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionIdChecker;

impl SessionIdValidator for SessionIdChecker {
    fn validate(&self, session_id: &SessionId) -> Validation {
        if let Some(reason) = check_part("sender", &session_id.sender_part)
            .or_else(|| check_part("receiver", &session_id.receiver_part))
        {
            return Validation::Invalid(reason);
        }

        if complete(&session_id.sender_part, &session_id.receiver_part) != session_id.sid_complete {
            return Validation::invalid("sid_complete does not match parts");
        }

        Validation::Valid
    }
}
