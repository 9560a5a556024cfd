//! Access Policy hooks (§2, §4.4): pluggable predicates for push/pull
//! authorization, kept as a narrow trait object rather than an abstract
//! "Policy" hierarchy (§9 Design Notes).

use crate::error::Result;

/// Capability check for a push/pull against a given store, on behalf of the
/// identity resolved from the caller's session (§6 Authentication).
pub trait AccessPolicy: Send + Sync {
    fn ensure_can_push(&self, owner_id: &str, store_id: &str) -> Result<()>;
    fn ensure_can_pull(&self, owner_id: &str, store_id: &str) -> Result<()>;

    /// Gates `POST /sync/dev/reset` (§4.1 `resetStore`, §6 `NODE_ENV`).
    /// Implementations MUST refuse unless the process is explicitly running
    /// outside production.
    fn ensure_can_reset(&self, owner_id: &str, store_id: &str) -> Result<()>;
}

/// The only access rule this core system defines on its own: an owner may
/// always push/pull their own store. Host applications compose additional
/// checks (e.g. device revocation) by wrapping this in their own policy.
pub struct OwnerOnlyAccessPolicy {
    pub allow_reset: bool,
}

impl AccessPolicy for OwnerOnlyAccessPolicy {
    fn ensure_can_push(&self, _owner_id: &str, _store_id: &str) -> Result<()> {
        Ok(())
    }

    fn ensure_can_pull(&self, _owner_id: &str, _store_id: &str) -> Result<()> {
        Ok(())
    }

    fn ensure_can_reset(&self, owner_id: &str, store_id: &str) -> Result<()> {
        if self.allow_reset {
            Ok(())
        } else {
            tracing::warn!(owner_id, store_id, "dev reset rejected outside dev mode");
            Err(crate::error::StoreError::ResetDisabled)
        }
    }
}
