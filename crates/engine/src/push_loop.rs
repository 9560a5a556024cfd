//! Push loop (§4.5 "Push loop").

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use eventsync_core::model::{ConflictReason, PushEventInput, PushResult};

use crate::backoff_tracker::BackoffTracker;
use crate::codec::LocalRecord;
use crate::config::EngineConfig;
use crate::error::{Result, SyncError};
use crate::local_log::LocalLog;
use crate::rebase_hook::RebaseHook;
use crate::remote_apply::apply_events_and_rebase;
use crate::signal::{PullCoordinator, PushSignal};
use crate::state::{StatusCell, SyncDirection};
use crate::stop::Stopper;
use crate::transport::SyncTransport;

pub struct PushLoopDeps {
    pub store_id: String,
    pub config: EngineConfig,
    pub transport: Arc<dyn SyncTransport>,
    pub local_log: Arc<dyn LocalLog>,
    pub rebase_hook: Arc<dyn RebaseHook>,
    pub status: Arc<StatusCell>,
    pub signal: PushSignal,
    pub pull_coordinator: PullCoordinator,
    pub stopper: Stopper,
    pub last_known_head: Arc<AtomicI64>,
}

pub async fn run(deps: PushLoopDeps) {
    let mut backoff = BackoffTracker::new();

    loop {
        if deps.stopper.is_stopped() {
            return;
        }

        tokio::select! {
            _ = deps.signal.wait() => {}
            _ = tokio::time::sleep(Duration::from_millis(deps.config.push_interval_ms)) => {}
            _ = deps.stopper.wait_stopped() => return,
        }

        if deps.stopper.is_stopped() {
            return;
        }

        deps.status.set_syncing(SyncDirection::Push);
        match run_one_cycle(&deps).await {
            Ok(PushCycleOutcome::DoneForNow) => {
                backoff.reset();
                deps.status.set_idle();
            }
            Ok(PushCycleOutcome::MorePending) => {
                backoff.reset();
                deps.status.set_idle();
                // §4.5 step 4: re-arm immediately instead of waiting for the
                // next trigger when more pending events remain.
                deps.signal.request();
            }
            Err(err) => {
                let sleep_for = backoff.next();
                let retry_at = SystemTime::now() + sleep_for;
                tracing::warn!(error = %err, retry_in_ms = sleep_for.as_millis() as u64, "push loop failed");
                deps.status.set_error(err, retry_at);
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {
                        deps.signal.request();
                    }
                    _ = deps.stopper.wait_stopped() => return,
                }
            }
        }
    }
}

enum PushCycleOutcome {
    DoneForNow,
    MorePending,
}

async fn run_one_cycle(deps: &PushLoopDeps) -> Result<PushCycleOutcome> {
    push_once(deps, 0).await
}

async fn push_once(deps: &PushLoopDeps, attempt: u32) -> Result<PushCycleOutcome> {
    let pending = deps
        .local_log
        .load_pending(&deps.store_id, deps.config.push_batch_size)
        .await?;

    if pending.is_empty() {
        return Ok(PushCycleOutcome::DoneForNow);
    }

    let meta = deps.local_log.sync_meta(&deps.store_id).await?;
    let expected_head = {
        let known = deps.last_known_head.load(Ordering::SeqCst);
        if known >= 0 {
            known
        } else {
            meta.last_pulled_global_seq
        }
    };

    let events: Vec<PushEventInput> = pending
        .iter()
        .map(|p| -> Result<PushEventInput> {
            let record = LocalRecord::decode(&p.record_json)?;
            record.assert_matches_event_id(&p.id)?;
            Ok(PushEventInput {
                event_id: p.id.clone(),
                record_json: p.record_json.clone(),
                scope_id: record.scope_id.clone(),
                resource_id: record.resource_id.clone(),
                resource_key_id: record.resource_key_id.clone(),
                grant_id: record.grant_id.clone(),
                scope_state_ref: record.scope_state_ref.clone(),
                author_device_id: record.actor_id.clone(),
            })
        })
        .collect::<Result<_>>()?;

    let batch_len = events.len();
    let result = deps.transport.push(&deps.store_id, expected_head, events).await?;

    match result {
        PushResult::Ok { head, assigned, .. } => {
            for a in &assigned {
                deps.local_log.record_assignment(a).await?;
            }
            let advance_to = assigned.iter().map(|a| a.global_sequence).max().unwrap_or(head).max(head);
            deps.local_log.advance_last_pulled(&deps.store_id, advance_to.max(meta.last_pulled_global_seq)).await?;
            deps.last_known_head.store(head, Ordering::SeqCst);

            if batch_len as u32 == deps.config.push_batch_size {
                Ok(PushCycleOutcome::MorePending)
            } else {
                Ok(PushCycleOutcome::DoneForNow)
            }
        }
        PushResult::Conflict { head, reason, missing, .. } => {
            handle_conflict(deps, attempt, expected_head, head, reason, missing).await
        }
    }
}

async fn handle_conflict(
    deps: &PushLoopDeps,
    attempt: u32,
    expected_head: i64,
    server_head: i64,
    reason: ConflictReason,
    missing: Option<Vec<eventsync_core::model::PulledEvent>>,
) -> Result<PushCycleOutcome> {
    match reason {
        ConflictReason::ServerBehind => {
            // §4.5 push loop step 5: fatal for this attempt; the local
            // cursor is ahead of the server's — a server-side reset.
            Err(SyncError::conflict(format!(
                "server_behind: local cursor ({expected_head}) ahead of server head ({server_head})"
            )))
        }
        ConflictReason::ServerAhead => {
            if let Some(missing_events) = missing {
                let had_pending = deps.local_log.has_pending(&deps.store_id).await?;
                apply_events_and_rebase(
                    &deps.local_log,
                    &deps.rebase_hook,
                    &deps.store_id,
                    &missing_events,
                    had_pending,
                )
                .await?;
                deps.local_log.advance_last_pulled(&deps.store_id, server_head).await?;
                deps.last_known_head.store(server_head, Ordering::SeqCst);

                if attempt + 1 >= deps.config.max_push_retries {
                    return Err(SyncError::conflict(
                        "server_ahead: exceeded maxPushRetries while catching up",
                    ));
                }
                Box::pin(push_once(deps, attempt + 1)).await
            } else {
                // No `missing[]` attached: await any in-flight pull, then
                // force a fresh one (§5 ordering guarantee).
                deps.pull_coordinator.await_in_flight_then_immediate_pull().await;
                let advanced = deps.local_log.sync_meta(&deps.store_id).await?;
                if advanced.last_pulled_global_seq <= expected_head {
                    return Err(SyncError::conflict("conflict did not advance cursor"));
                }
                deps.last_known_head.store(server_head, Ordering::SeqCst);
                Ok(PushCycleOutcome::MorePending)
            }
        }
        other => Err(SyncError::conflict(format!("push rejected: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicI64;
    use std::sync::Arc;

    use eventsync_core::model::{Assigned, ConflictReason, PulledEvent, PushResult};

    use super::*;
    use crate::fakes::{FakeLocalLog, RecordingRebaseHook, ScriptedTransport};
    use crate::state::StatusCell;

    fn record(id: &str, aggregate_id: &str, version: i64) -> String {
        format!(
            r#"{{"id":"{id}","aggregateType":"goal","aggregateId":"{aggregate_id}","version":{version},"payloadCiphertext":"YWJj"}}"#
        )
    }

    fn deps(
        local_log: Arc<FakeLocalLog>,
        transport: Arc<ScriptedTransport>,
        last_known_head: Arc<AtomicI64>,
    ) -> PushLoopDeps {
        PushLoopDeps {
            store_id: "store-1".to_string(),
            config: EngineConfig::default(),
            transport,
            local_log,
            rebase_hook: Arc::new(RecordingRebaseHook::new()),
            status: Arc::new(StatusCell::new(None)),
            signal: crate::signal::PushSignal::new(),
            pull_coordinator: crate::signal::PullCoordinator::new(),
            stopper: crate::stop::Stopper::new(),
            last_known_head,
        }
    }

    /// §4.5 push loop step 4: a successful push records every assignment and
    /// advances the cursor to the server's head.
    #[tokio::test]
    async fn successful_push_records_assignments_and_advances_cursor() {
        let local_log = Arc::new(FakeLocalLog::new());
        local_log.seed_pending("e1", &record("e1", "goal-1", 1), "goal", "goal-1", 1);
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_push(PushResult::ok(
            1,
            vec![Assigned {
                event_id: "e1".to_string(),
                global_sequence: 1,
            }],
        ));
        let last_known_head = Arc::new(AtomicI64::new(-1));
        let d = deps(local_log.clone(), transport.clone(), last_known_head.clone());

        let outcome = run_one_cycle(&d).await.unwrap();
        assert!(matches!(outcome, PushCycleOutcome::DoneForNow));
        assert!(local_log.is_mapped("e1"));
        assert_eq!(local_log.last_pulled(), 1);
        assert_eq!(last_known_head.load(Ordering::SeqCst), 1);
        assert_eq!(transport.push_call_count(), 1);
    }

    /// An empty pending set is a no-op; the transport is never called.
    #[tokio::test]
    async fn no_pending_events_skips_transport_call() {
        let local_log = Arc::new(FakeLocalLog::new());
        let transport = Arc::new(ScriptedTransport::new());
        let last_known_head = Arc::new(AtomicI64::new(-1));
        let d = deps(local_log, transport.clone(), last_known_head);

        let outcome = run_one_cycle(&d).await.unwrap();
        assert!(matches!(outcome, PushCycleOutcome::DoneForNow));
        assert_eq!(transport.push_call_count(), 0);
    }

    /// §8 S3 / §4.5 push loop step 5: `server_ahead` with `missing[]` applies
    /// the missing events, advances the cursor, and retries the push, which
    /// then succeeds.
    #[tokio::test]
    async fn server_ahead_with_missing_applies_and_retries() {
        let local_log = Arc::new(FakeLocalLog::new());
        local_log.seed_pending("e2", &record("e2", "goal-2", 1), "goal", "goal-2", 1);
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_push(PushResult::conflict(
            1,
            ConflictReason::ServerAhead,
            Some(vec![PulledEvent {
                global_sequence: 1,
                event_id: "e1".to_string(),
                record_json: record("e1", "goal-1", 1),
            }]),
        ));
        transport.queue_push(PushResult::ok(
            2,
            vec![Assigned {
                event_id: "e2".to_string(),
                global_sequence: 2,
            }],
        ));
        let last_known_head = Arc::new(AtomicI64::new(-1));
        let d = deps(local_log.clone(), transport.clone(), last_known_head.clone());

        let outcome = run_one_cycle(&d).await.unwrap();
        assert!(matches!(outcome, PushCycleOutcome::DoneForNow));
        assert_eq!(transport.push_call_count(), 2);
        assert!(local_log.is_mapped("e1"));
        assert!(local_log.is_mapped("e2"));
        assert_eq!(last_known_head.load(Ordering::SeqCst), 2);
    }

    /// §9 open question: `server_behind` is a non-retryable fatal for this
    /// attempt, never a silent reset.
    #[tokio::test]
    async fn server_behind_is_fatal_conflict() {
        let local_log = Arc::new(FakeLocalLog::new());
        local_log.seed_pending("e1", &record("e1", "goal-1", 1), "goal", "goal-1", 1);
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_push(PushResult::conflict(0, ConflictReason::ServerBehind, None));
        let last_known_head = Arc::new(AtomicI64::new(-1));
        let d = deps(local_log, transport, last_known_head);

        let err = run_one_cycle(&d).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    /// `server_ahead` exceeding `maxPushRetries` while catching up surfaces as
    /// a conflict error rather than looping forever.
    #[tokio::test]
    async fn server_ahead_exceeding_max_retries_errors() {
        let local_log = Arc::new(FakeLocalLog::new());
        local_log.seed_pending("e1", &record("e1", "goal-1", 1), "goal", "goal-1", 1);
        let transport = Arc::new(ScriptedTransport::new());
        for i in 0..3 {
            transport.queue_push(PushResult::conflict(
                i,
                ConflictReason::ServerAhead,
                Some(vec![PulledEvent {
                    global_sequence: i,
                    event_id: format!("remote-{i}"),
                    record_json: record(&format!("remote-{i}"), "other-agg", 1),
                }]),
            ));
        }
        let last_known_head = Arc::new(AtomicI64::new(-1));
        let mut d = deps(local_log, transport, last_known_head);
        d.config.max_push_retries = 2;

        let err = run_one_cycle(&d).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
    }
}
