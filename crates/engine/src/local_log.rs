//! `LocalLog`: the engine's narrow interface onto the host's local durable
//! log (§4.5 "Local tables (abstract)"). A concrete implementation (e.g.
//! `eventsync-storage`'s SQLite log) owns the actual schema; the engine only
//! ever calls through this trait, which is the "capability interface, not
//! inheritance" shape called for in §9.

use async_trait::async_trait;
use eventsync_core::model::{Assigned, PulledEvent};

use crate::error::Result;

/// One row the push loop reads off the local `events` table, already decoded
/// enough to build a wire record and know whether it has been acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub id: String,
    pub record_json: String,
    pub commit_sequence: i64,
}

/// Outcome of inserting one remote event into the local log (§4.5 pull loop
/// step 4): whether the row was newly created or a collision left the
/// existing row untouched (the case the rebase rule covers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApplyOutcome {
    Inserted,
    AlreadyPresent,
    /// `(aggregateType, aggregateId, version)` collided with a different
    /// `id` — the existing pending row survives; the host's rebase hook is
    /// responsible for moving it out of the way.
    VersionCollision,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncMeta {
    pub last_pulled_global_seq: i64,
}

/// The client-side local durable log, keyed by `(aggregateType, aggregateId,
/// version)` with a separate ack table (`sync_event_map`) recording which
/// rows the server has admitted (§4.5 "Local tables (abstract)").
#[async_trait]
pub trait LocalLog: Send + Sync {
    /// Pending (unmapped) local events ordered by `commitSequence` ascending,
    /// capped at `limit` (§4.5 push loop step 1).
    async fn load_pending(&self, store_id: &str, limit: u32) -> Result<Vec<PendingEvent>>;

    /// True iff at least one local event has no row in `sync_event_map`.
    async fn has_pending(&self, store_id: &str) -> Result<bool>;

    /// Inserts a remote event with INSERT-OR-IGNORE semantics on `id`, and
    /// INSERT-OR-IGNORE into `sync_event_map` (§4.5 pull loop step 4). The
    /// caller has already parsed and validated `record_json`.
    ///
    /// On `VersionCollision`, the implementation MUST leave both `events`
    /// and `sync_event_map` untouched for this event — it is neither
    /// inserted nor acknowledged. The caller (`remote_apply`) re-invokes
    /// this same call once the rebase hook has vacated the slot, so the
    /// event is applied exactly once it actually has somewhere to land.
    async fn apply_remote_event(
        &self,
        store_id: &str,
        event: &PulledEvent,
        aggregate_type: &str,
        aggregate_id: &str,
        version: i64,
    ) -> Result<RemoteApplyOutcome>;

    /// Records a server-assigned sequence for a locally-originated event that
    /// was just admitted by a push (§4.5 push loop step 4, §8 property 5).
    async fn record_assignment(&self, assigned: &Assigned) -> Result<()>;

    /// Records assignments (and touches `sync_event_map`) for a batch of
    /// remote events applied while resolving a `server_ahead` conflict
    /// (§4.5 push loop step 5) — distinct from `apply_remote_event`, which is
    /// for events arriving through the *pull* loop's own cursor.
    async fn sync_meta(&self, store_id: &str) -> Result<SyncMeta>;

    /// Advances `lastPulledGlobalSeq`, tolerating concurrent writers by
    /// taking the max (§5 "the engine tolerates monotonic ... moves but
    /// never decreases it").
    async fn advance_last_pulled(&self, store_id: &str, seq: i64) -> Result<()>;

    /// Pending (unmapped) local versions for one aggregate, used to compute
    /// a rebase shift (§4.5 "Rebase hook").
    async fn pending_versions_for_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<i64>>;
}
