//! Rebase hook (§4.5, §9): application-provided renumbering of pending local
//! events when remote events claim the same `(aggregateType, aggregateId,
//! version)` slot. The shift arithmetic itself lives in
//! `eventsync_core::rebase`; this hook is just the callback contract the
//! pull/push loops invoke it through.

use async_trait::async_trait;
use eventsync_core::rebase::RebaseRequest;

use crate::error::Result;

#[async_trait]
pub trait RebaseHook: Send + Sync {
    /// Invoked with `{aggregateType, aggregateId, fromVersionInclusive}` once
    /// per aggregate touched by newly-applied remote events, while pending
    /// local events still exist for it (§4.5 pull loop step 7).
    async fn on_rebase_required(&self, request: RebaseRequest) -> Result<()>;
}

/// A no-op hook for hosts/tests that never have local-local version
/// collisions to resolve (e.g. single-writer fixtures).
pub struct NoopRebaseHook;

#[async_trait]
impl RebaseHook for NoopRebaseHook {
    async fn on_rebase_required(&self, _request: RebaseRequest) -> Result<()> {
        Ok(())
    }
}
