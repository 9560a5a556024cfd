//! Hash-chain predicate shared by every sharing-ledger stream (§4.3, §8.3).
//!
//! The server never recomputes a stream's content hash — callers supply their
//! own `ref`/`hash` bytes and the server only enforces that consecutive links
//! connect. These helpers are the enforcement, kept free of any storage code
//! so both the server and client-side test fixtures can share them.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("genesis record (seq=1) must have prevHash=null")]
    GenesisMustHaveNullPrevHash,
    #[error("non-genesis record must carry a prevHash")]
    MissingPrevHash,
    #[error("prevHash does not match the current head ref")]
    PrevHashMismatch,
}

/// Validates the hash-chain predicate for a record about to be appended at
/// `expected_head + 1`.
///
/// * `expected_head == 0` (genesis): `candidate_prev_hash` must be `None`.
/// * otherwise: `candidate_prev_hash` must equal `current_head_ref`.
pub fn check_chain(
    expected_head: i64,
    current_head_ref: Option<&str>,
    candidate_prev_hash: Option<&str>,
) -> Result<(), ChainError> {
    if expected_head == 0 {
        return match candidate_prev_hash {
            None => Ok(()),
            Some(_) => Err(ChainError::GenesisMustHaveNullPrevHash),
        };
    }

    match candidate_prev_hash {
        None => Err(ChainError::MissingPrevHash),
        Some(prev) => {
            if Some(prev) == current_head_ref {
                Ok(())
            } else {
                Err(ChainError::PrevHashMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_requires_null_prev_hash() {
        assert!(check_chain(0, None, None).is_ok());
        assert_eq!(
            check_chain(0, None, Some("aabb")),
            Err(ChainError::GenesisMustHaveNullPrevHash)
        );
    }

    #[test]
    fn non_genesis_requires_matching_prev_hash() {
        assert!(check_chain(1, Some("aabb"), Some("aabb")).is_ok());
        assert_eq!(
            check_chain(1, Some("aabb"), Some("ddee")),
            Err(ChainError::PrevHashMismatch)
        );
        assert_eq!(
            check_chain(1, Some("aabb"), None),
            Err(ChainError::MissingPrevHash)
        );
    }

    #[test]
    fn scenario_s4_hash_chain() {
        // Genesis succeeds.
        assert!(check_chain(0, None, None).is_ok());
        // Wrong prevHash on the second record fails, head stays at (1, 0xAABB).
        assert!(check_chain(1, Some("aabb"), Some("ddee")).is_err());
        // Correct prevHash on the second record succeeds.
        assert!(check_chain(1, Some("aabb"), Some("aabb")).is_ok());
    }
}
