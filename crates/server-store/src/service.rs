//! Sync Service (§4.4): composes the Ownership Enforcer, Access Policy,
//! Sharing Ledger (read-only), and Sync Event Store into `push`/`pull`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eventsync_core::config::{MAX_CONFLICT_MISSING_EVENTS, SERVER_LONG_POLL_MAX_MS, SERVER_POLL_INTERVAL_MIN_MS};
use eventsync_core::model::{AppendOutcome, ConflictReason, PullResponseBody, PushEventInput, PushResult};

use crate::access::AccessPolicy;
use crate::db::PgPool;
use crate::error::{Result, StoreError};
use crate::event_store::{self, AppendEventInput};
use crate::ledger;
use crate::ownership;

pub struct SyncService {
    pool: PgPool,
    access: Arc<dyn AccessPolicy>,
}

impl SyncService {
    pub fn new(pool: PgPool, access: Arc<dyn AccessPolicy>) -> Self {
        Self { pool, access }
    }

    /// `push(ownerId, storeId, expectedHead, events[]) -> PushResult` (§4.4).
    pub async fn push(
        &self,
        owner_id: String,
        store_id: String,
        expected_head: i64,
        events: Vec<PushEventInput>,
    ) -> Result<PushResult> {
        self.access.ensure_can_push(&owner_id, &store_id)?;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(StoreError::from)?;

            ownership::ensure_store_owner(&mut conn, &store_id, &owner_id)?;

            if let Some(rejection) = Self::validate_dependencies(&mut conn, &events)? {
                let head = event_store::get_head(&mut conn, &owner_id, &store_id)?;
                return Ok(PushResult::conflict(head, rejection, None));
            }

            let append_inputs: Vec<AppendEventInput> = events
                .iter()
                .map(|e| AppendEventInput {
                    event_id: e.event_id.clone(),
                    record_json: e.record_json.clone(),
                })
                .collect();

            match event_store::append(&mut conn, &owner_id, &store_id, expected_head, &append_inputs)? {
                AppendOutcome::Ok { head, assigned } => Ok(PushResult::ok(head, assigned)),
                AppendOutcome::HeadMismatch {
                    current_head,
                    expected_head,
                } => {
                    if current_head > expected_head {
                        let missing = event_store::load_since(
                            &mut conn,
                            &owner_id,
                            &store_id,
                            expected_head,
                            MAX_CONFLICT_MISSING_EVENTS.max(events.len()) as i64,
                        )?;
                        Ok(PushResult::conflict(
                            current_head,
                            ConflictReason::ServerAhead,
                            Some(missing),
                        ))
                    } else {
                        Ok(PushResult::conflict(current_head, ConflictReason::ServerBehind, None))
                    }
                }
            }
        })
        .await
        .expect("push blocking task panicked")
    }

    /// Validates each incoming event's sharing-ledger dependencies (§4.4 step 2).
    /// Returns `Some(reason)` for the first rejected event, `None` if all pass.
    fn validate_dependencies(
        conn: &mut diesel::pg::PgConnection,
        events: &[PushEventInput],
    ) -> Result<Option<ConflictReason>> {
        for event in events {
            if !event.has_sharing_dependency() {
                continue;
            }

            let Some(scope_id) = &event.scope_id else {
                return Ok(Some(ConflictReason::MissingDeps));
            };
            let Some(scope_state_ref) = &event.scope_state_ref else {
                return Ok(Some(ConflictReason::MissingDeps));
            };

            let head = ledger::get_scope_state_head(conn, scope_id)?;
            let Some((_, head_ref)) = head else {
                return Ok(Some(ConflictReason::MissingDeps));
            };
            if &head_ref != scope_state_ref {
                return Ok(Some(ConflictReason::StaleScopeState));
            }

            if let (Some(resource_id), Some(grant_id)) = (&event.resource_id, &event.grant_id) {
                let active = ledger::get_active_grant(conn, scope_id, resource_id)?;
                match active {
                    None => return Ok(Some(ConflictReason::MissingDeps)),
                    Some(grant) if &grant.grant_id != grant_id => {
                        return Ok(Some(ConflictReason::StaleGrant))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(None)
    }

    /// `pull(ownerId, storeId, since, limit, waitMs) -> {events, head}` (§4.4).
    ///
    /// Long-polls in `pollIntervalMs` ticks (clamped to `[50ms, ..]`) until
    /// either events are available or `waitMs` (clamped to `[0, 25s]`)
    /// elapses. `cancelled` is polled each tick so the caller's dropped
    /// connection breaks the loop promptly (§9 Open Question on cancellation).
    pub async fn pull(
        &self,
        owner_id: String,
        store_id: String,
        since: i64,
        limit: i64,
        wait_ms: u64,
        mut cancelled: impl FnMut() -> bool,
    ) -> Result<PullResponseBody> {
        self.access.ensure_can_pull(&owner_id, &store_id)?;

        {
            let pool = self.pool.clone();
            let owner_id_c = owner_id.clone();
            let store_id_c = store_id.clone();
            tokio::task::spawn_blocking(move || -> Result<()> {
                let mut conn = pool.get().map_err(StoreError::from)?;
                ownership::ensure_store_owner(&mut conn, &store_id_c, &owner_id_c)
            })
            .await
            .expect("pull blocking task panicked")?;
        }

        let clamped_wait = Duration::from_millis(wait_ms.min(SERVER_LONG_POLL_MAX_MS));
        let deadline = Instant::now() + clamped_wait;
        let tick = Duration::from_millis(SERVER_POLL_INTERVAL_MIN_MS);

        loop {
            let pool = self.pool.clone();
            let owner_id_c = owner_id.clone();
            let store_id_c = store_id.clone();
            let (events, head) = tokio::task::spawn_blocking(move || -> Result<_> {
                let mut conn = pool.get().map_err(StoreError::from)?;
                let events = event_store::load_since(&mut conn, &owner_id_c, &store_id_c, since, limit)?;
                let head = event_store::get_head(&mut conn, &owner_id_c, &store_id_c)?;
                Ok((events, head))
            })
            .await
            .expect("pull blocking task panicked")?;

            if !events.is_empty() || Instant::now() >= deadline || cancelled() {
                return Ok(PullResponseBody::build(events, head, limit as usize));
            }

            tokio::time::sleep(tick.min(deadline.saturating_duration_since(Instant::now()).max(Duration::from_millis(1))))
                .await;
        }
    }

    /// `resetStore` (§4.1), gated by both the access policy and the
    /// process-wide dev flag the policy itself enforces.
    pub async fn reset_store(&self, owner_id: String, store_id: String) -> Result<()> {
        self.access.ensure_can_reset(&owner_id, &store_id)?;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(StoreError::from)?;
            event_store::reset_store(&mut conn, &owner_id, &store_id)
        })
        .await
        .expect("reset blocking task panicked")
    }
}
