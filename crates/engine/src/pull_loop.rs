//! Pull loop (§4.5 "Pull loop").

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::backoff_tracker::BackoffTracker;
use crate::config::EngineConfig;
use crate::error::{Result, SyncError};
use crate::local_log::LocalLog;
use crate::rebase_hook::RebaseHook;
use crate::remote_apply::apply_events_and_rebase;
use crate::signal::PullCoordinator;
use crate::state::{StatusCell, SyncDirection};
use crate::stop::Stopper;
use crate::transport::SyncTransport;

pub struct PullLoopDeps {
    pub store_id: String,
    pub config: EngineConfig,
    pub transport: Arc<dyn SyncTransport>,
    pub local_log: Arc<dyn LocalLog>,
    pub rebase_hook: Arc<dyn RebaseHook>,
    pub status: Arc<StatusCell>,
    pub coordinator: PullCoordinator,
    pub stopper: Stopper,
    pub last_known_head: Arc<AtomicI64>,
}

pub async fn run(deps: PullLoopDeps) {
    let mut backoff = BackoffTracker::new();

    loop {
        if deps.stopper.is_stopped() {
            return;
        }

        deps.coordinator.mark_in_flight();
        deps.status.set_syncing(SyncDirection::Pull);
        let outcome = run_one_cycle(&deps).await;
        deps.coordinator.mark_completed();

        match outcome {
            Ok(()) => {
                backoff.reset();
                deps.status.set_idle();
                deps.coordinator
                    .wait_for_immediate_or(std::time::Duration::from_millis(deps.config.pull_interval_ms))
                    .await;
            }
            Err(err) => {
                // §4.5: 401/403 are surfaced verbatim but retried forever, not
                // abandoned — only the host clearing the session stops them.
                let sleep_for = backoff.next();
                let retry_at = SystemTime::now() + sleep_for;
                tracing::warn!(error = %err, retry_in_ms = sleep_for.as_millis() as u64, "pull loop failed");
                deps.status.set_error(err, retry_at);
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => {}
                    _ = deps.stopper.wait_stopped() => return,
                }
            }
        }

        if deps.stopper.is_stopped() {
            return;
        }
    }
}

async fn run_one_cycle(deps: &PullLoopDeps) -> Result<()> {
    let meta = deps.local_log.sync_meta(&deps.store_id).await?;
    let since = meta.last_pulled_global_seq;
    let had_pending = deps.local_log.has_pending(&deps.store_id).await?;

    let response = deps
        .transport
        .pull(
            &deps.store_id,
            since,
            deps.config.pull_limit,
            deps.config.pull_wait_ms,
        )
        .await?;

    // §4.5 step 5: `hasMore && nextSince==null` is a fatal protocol error.
    if response.has_more && response.next_since.is_none() {
        return Err(SyncError::protocol("hasMore=true but nextSince=null"));
    }

    apply_events_and_rebase(
        &deps.local_log,
        &deps.rebase_hook,
        &deps.store_id,
        &response.events,
        had_pending,
    )
    .await?;

    if let Some(next_since) = response.next_since {
        deps.local_log.advance_last_pulled(&deps.store_id, next_since).await?;
    }

    deps.last_known_head.store(response.head, Ordering::SeqCst);

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicI64;
    use std::sync::Arc;

    use eventsync_core::model::{PullResponseBody, PulledEvent};

    use super::*;
    use crate::fakes::{FakeLocalLog, RecordingRebaseHook, ScriptedTransport};
    use crate::state::StatusCell;

    fn record(id: &str, aggregate_id: &str, version: i64) -> String {
        format!(
            r#"{{"id":"{id}","aggregateType":"goal","aggregateId":"{aggregate_id}","version":{version},"payloadCiphertext":"YWJj"}}"#
        )
    }

    fn deps(local_log: Arc<FakeLocalLog>, transport: Arc<ScriptedTransport>) -> PullLoopDeps {
        PullLoopDeps {
            store_id: "store-1".to_string(),
            config: EngineConfig::default(),
            transport,
            local_log,
            rebase_hook: Arc::new(RecordingRebaseHook::new()),
            status: Arc::new(StatusCell::new(None)),
            coordinator: crate::signal::PullCoordinator::new(),
            stopper: crate::stop::Stopper::new(),
            last_known_head: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// §8 S1: pulling a single new event applies it to the local log and
    /// advances the cursor to its global sequence.
    #[tokio::test]
    async fn applies_events_and_advances_cursor() {
        let local_log = Arc::new(FakeLocalLog::new());
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_pull(PullResponseBody {
            events: vec![PulledEvent {
                global_sequence: 1,
                event_id: "e1".to_string(),
                record_json: record("e1", "goal-1", 1),
            }],
            head: 1,
            has_more: false,
            next_since: Some(1),
        });
        let d = deps(local_log.clone(), transport);

        run_one_cycle(&d).await.unwrap();
        assert!(local_log.is_mapped("e1"));
        assert_eq!(local_log.last_pulled(), 1);
        assert_eq!(d.last_known_head.load(Ordering::SeqCst), 1);
    }

    /// Empty pull response leaves the cursor untouched and is not an error
    /// (§8 boundary: "Pull with since >= head returns empty events").
    #[tokio::test]
    async fn empty_pull_is_a_no_op() {
        let local_log = Arc::new(FakeLocalLog::new());
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_pull(PullResponseBody {
            events: vec![],
            head: 0,
            has_more: false,
            next_since: None,
        });
        let d = deps(local_log.clone(), transport);

        run_one_cycle(&d).await.unwrap();
        assert_eq!(local_log.last_pulled(), 0);
    }

    /// §7 Protocol taxonomy: `hasMore=true, nextSince=null` is a fatal,
    /// non-retryable-with-same-input protocol error.
    #[tokio::test]
    async fn has_more_with_null_next_since_is_a_protocol_error() {
        let local_log = Arc::new(FakeLocalLog::new());
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_pull(PullResponseBody {
            events: vec![],
            head: 5,
            has_more: true,
            next_since: None,
        });
        let d = deps(local_log, transport);

        let err = run_one_cycle(&d).await.unwrap_err();
        assert_eq!(err.code(), "protocol");
    }

    /// §4.5 pull loop step 7 / §8 S6: a remote event colliding with a
    /// pending local row shifts the pending row out of the way and then
    /// actually lands the remote event at its own version.
    #[tokio::test]
    async fn remote_collision_invokes_rebase_hook() {
        let local_log = Arc::new(FakeLocalLog::new());
        local_log.seed_pending("local-1", &record("local-1", "goal-1", 1), "goal", "goal-1", 1);
        let transport = Arc::new(ScriptedTransport::new());
        transport.queue_pull(PullResponseBody {
            events: vec![PulledEvent {
                global_sequence: 9,
                event_id: "remote-1".to_string(),
                record_json: record("remote-1", "goal-1", 1),
            }],
            head: 9,
            has_more: false,
            next_since: Some(9),
        });
        let mut d = deps(local_log.clone(), transport);
        // The fake log also implements `RebaseHook`, so a real shift happens
        // here instead of a no-op recording.
        d.rebase_hook = local_log.clone();

        run_one_cycle(&d).await.unwrap();
        assert!(local_log.is_mapped("remote-1"));
        assert_eq!(local_log.version_for("remote-1"), Some(1));
        assert_eq!(local_log.version_for("local-1"), Some(2));
    }
}
