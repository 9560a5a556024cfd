//! In-memory fakes of `LocalLog`, `SyncTransport`, and `RebaseHook` used by
//! this crate's own tests. Not compiled outside `cfg(test)`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use eventsync_core::model::{Assigned, PullResponseBody, PulledEvent, PushEventInput, PushResult};
use eventsync_core::rebase::RebaseRequest;

use crate::error::{Result, SyncError};
use crate::local_log::{LocalLog, PendingEvent, RemoteApplyOutcome, SyncMeta};
use crate::rebase_hook::RebaseHook;
use crate::transport::SyncTransport;

#[derive(Debug, Clone)]
struct FakeRow {
    id: String,
    record_json: String,
    commit_sequence: i64,
    aggregate_type: String,
    aggregate_id: String,
    version: i64,
}

#[derive(Default)]
struct FakeLocalLogState {
    rows: Vec<FakeRow>,
    mapped: HashMap<String, i64>,
    last_pulled_global_seq: i64,
    next_commit_seq: i64,
}

/// A single-store in-memory stand-in for the `events`/`sync_event_map`/
/// `sync_meta` tables described in §4.5.
pub struct FakeLocalLog {
    state: Mutex<FakeLocalLogState>,
}

impl FakeLocalLog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeLocalLogState::default()),
        }
    }

    /// Seeds a pending (unmapped) local event directly, bypassing the wire codec.
    pub fn seed_pending(&self, id: &str, record_json: &str, aggregate_type: &str, aggregate_id: &str, version: i64) {
        let mut guard = self.state.lock().unwrap();
        let seq = guard.next_commit_seq;
        guard.next_commit_seq += 1;
        guard.rows.push(FakeRow {
            id: id.to_string(),
            record_json: record_json.to_string(),
            commit_sequence: seq,
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            version,
        });
    }

    pub fn is_mapped(&self, id: &str) -> bool {
        self.state.lock().unwrap().mapped.contains_key(id)
    }

    pub fn last_pulled(&self) -> i64 {
        self.state.lock().unwrap().last_pulled_global_seq
    }

    pub fn version_for(&self, id: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.version)
    }
}

impl Default for FakeLocalLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalLog for FakeLocalLog {
    async fn load_pending(&self, _store_id: &str, limit: u32) -> Result<Vec<PendingEvent>> {
        let guard = self.state.lock().unwrap();
        let mut pending: Vec<&FakeRow> = guard.rows.iter().filter(|r| !guard.mapped.contains_key(&r.id)).collect();
        pending.sort_by_key(|r| r.commit_sequence);
        Ok(pending
            .into_iter()
            .take(limit as usize)
            .map(|r| PendingEvent {
                id: r.id.clone(),
                record_json: r.record_json.clone(),
                commit_sequence: r.commit_sequence,
            })
            .collect())
    }

    async fn has_pending(&self, _store_id: &str) -> Result<bool> {
        let guard = self.state.lock().unwrap();
        Ok(guard.rows.iter().any(|r| !guard.mapped.contains_key(&r.id)))
    }

    async fn apply_remote_event(
        &self,
        _store_id: &str,
        event: &PulledEvent,
        aggregate_type: &str,
        aggregate_id: &str,
        version: i64,
    ) -> Result<RemoteApplyOutcome> {
        let mut guard = self.state.lock().unwrap();
        if guard.rows.iter().any(|r| r.id == event.event_id) {
            return Ok(RemoteApplyOutcome::AlreadyPresent);
        }
        let collision = guard
            .rows
            .iter()
            .any(|r| r.aggregate_type == aggregate_type && r.aggregate_id == aggregate_id && r.version == version);

        if collision {
            // Left un-inserted and unmapped, same as `SqliteLocalLog`: the
            // caller retries after the rebase hook vacates the slot.
            return Ok(RemoteApplyOutcome::VersionCollision);
        }

        let seq = guard.next_commit_seq;
        guard.next_commit_seq += 1;
        guard.rows.push(FakeRow {
            id: event.event_id.clone(),
            record_json: event.record_json.clone(),
            commit_sequence: seq,
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            version,
        });
        guard.mapped.insert(event.event_id.clone(), event.global_sequence);
        Ok(RemoteApplyOutcome::Inserted)
    }

    async fn record_assignment(&self, assigned: &Assigned) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        guard.mapped.insert(assigned.event_id.clone(), assigned.global_sequence);
        Ok(())
    }

    async fn sync_meta(&self, _store_id: &str) -> Result<SyncMeta> {
        Ok(SyncMeta {
            last_pulled_global_seq: self.state.lock().unwrap().last_pulled_global_seq,
        })
    }

    async fn advance_last_pulled(&self, _store_id: &str, seq: i64) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        guard.last_pulled_global_seq = guard.last_pulled_global_seq.max(seq);
        Ok(())
    }

    async fn pending_versions_for_aggregate(&self, aggregate_type: &str, aggregate_id: &str) -> Result<Vec<i64>> {
        let guard = self.state.lock().unwrap();
        Ok(guard
            .rows
            .iter()
            .filter(|r| {
                r.aggregate_type == aggregate_type && r.aggregate_id == aggregate_id && !guard.mapped.contains_key(&r.id)
            })
            .map(|r| r.version)
            .collect())
    }
}

/// `FakeLocalLog` also plays the role of its own rebase hook — it shifts
/// pending rows the same way `SqliteRebaseHook` shifts the backing SQLite
/// tables, so tests exercising a real collision-then-rebase round trip don't
/// need a second fake that duplicates `compute_rebase_shifts` wiring.
#[async_trait]
impl RebaseHook for FakeLocalLog {
    async fn on_rebase_required(&self, request: RebaseRequest) -> Result<()> {
        let mut guard = self.state.lock().unwrap();

        let pending_versions: Vec<i64> = {
            let rows = &guard.rows;
            let mapped = &guard.mapped;
            rows.iter()
                .filter(|r| {
                    r.aggregate_type == request.aggregate_type
                        && r.aggregate_id == request.aggregate_id
                        && !mapped.contains_key(&r.id)
                })
                .map(|r| r.version)
                .collect()
        };

        let shifts = eventsync_core::rebase::compute_rebase_shifts(
            &pending_versions,
            request.from_version_inclusive,
            request.applied_count,
        );

        for shift in shifts {
            if let Some(row) = guard.rows.iter_mut().find(|r| {
                r.aggregate_type == request.aggregate_type
                    && r.aggregate_id == request.aggregate_id
                    && r.version == shift.old_version
            }) {
                row.version = shift.new_version;
            }
        }

        Ok(())
    }
}

/// Records every `{aggregateType, aggregateId, fromVersionInclusive}` it was
/// invoked with, without performing any renumbering itself — tests assert on
/// the recorded calls directly.
#[derive(Default)]
pub struct RecordingRebaseHook {
    calls: Mutex<Vec<RebaseRequest>>,
}

impl RecordingRebaseHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RebaseRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RebaseHook for RecordingRebaseHook {
    async fn on_rebase_required(&self, request: RebaseRequest) -> Result<()> {
        self.calls.lock().unwrap().push(request);
        Ok(())
    }
}

/// A scripted `SyncTransport`: queues of responses (or errors) returned in
/// FIFO order, one per call, so a test can script an exact exchange.
#[derive(Default)]
pub struct ScriptedTransport {
    push_responses: Mutex<VecDeque<Result<PushResult>>>,
    pull_responses: Mutex<VecDeque<Result<PullResponseBody>>>,
    push_calls: Mutex<Vec<(String, i64, Vec<PushEventInput>)>>,
    pull_calls: Mutex<Vec<(String, i64, u32, u64)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_call_count(&self) -> usize {
        self.push_calls.lock().unwrap().len()
    }

    pub fn pull_call_count(&self) -> usize {
        self.pull_calls.lock().unwrap().len()
    }

    pub fn queue_push(&self, result: PushResult) {
        self.push_responses.lock().unwrap().push_back(Ok(result));
    }

    pub fn queue_push_err(&self, err: SyncError) {
        self.push_responses.lock().unwrap().push_back(Err(err));
    }

    pub fn queue_pull(&self, result: PullResponseBody) {
        self.pull_responses.lock().unwrap().push_back(Ok(result));
    }
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
    async fn push(&self, store_id: &str, expected_head: i64, events: Vec<PushEventInput>) -> Result<PushResult> {
        self.push_calls
            .lock()
            .unwrap()
            .push((store_id.to_string(), expected_head, events));
        self.push_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport("ScriptedTransport: no push response queued")))
    }

    async fn pull(&self, store_id: &str, since: i64, limit: u32, wait_ms: u64) -> Result<PullResponseBody> {
        self.pull_calls
            .lock()
            .unwrap()
            .push((store_id.to_string(), since, limit, wait_ms));
        self.pull_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport("ScriptedTransport: no pull response queued")))
    }
}
