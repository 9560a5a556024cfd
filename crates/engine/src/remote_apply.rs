//! Shared "apply a batch of remote events, maybe rebase" logic used by both
//! the pull loop (§4.5 pull loop step 4-7) and the push loop's
//! `server_ahead`-with-`missing[]` recovery path (§4.5 push loop step 5),
//! so the two don't duplicate collision detection.

use std::collections::HashMap;
use std::sync::Arc;

use eventsync_core::model::PulledEvent;
use eventsync_core::rebase::RebaseRequest;

use crate::codec::LocalRecord;
use crate::error::{Result, SyncError};
use crate::local_log::{LocalLog, RemoteApplyOutcome};
use crate::rebase_hook::RebaseHook;

/// Applies `events` to the local log in order, then for every aggregate that
/// collided with a pending local row: invokes the rebase hook to shift the
/// pending row(s) out of the way, then re-applies each collided remote event
/// so it actually lands at its version instead of being dropped (§8 S6,
/// invariant 7 — a pulled event's `recordJson` must end up in the local log,
/// not just get acknowledged).
pub async fn apply_events_and_rebase(
    local_log: &Arc<dyn LocalLog>,
    rebase_hook: &Arc<dyn RebaseHook>,
    store_id: &str,
    events: &[PulledEvent],
    had_pending: bool,
) -> Result<bool> {
    // Keyed by aggregate; each entry holds every event that collided on that
    // aggregate in this batch, together with the version it collided at.
    let mut collisions: HashMap<(String, String), Vec<(PulledEvent, i64)>> = HashMap::new();
    let mut applied_any = false;

    for event in events {
        let record = LocalRecord::decode(&event.record_json)?;
        record.assert_matches_event_id(&event.event_id)?;

        let outcome = local_log
            .apply_remote_event(
                store_id,
                event,
                &record.aggregate_type,
                &record.aggregate_id,
                record.version,
            )
            .await?;

        match outcome {
            RemoteApplyOutcome::Inserted => applied_any = true,
            RemoteApplyOutcome::AlreadyPresent => {}
            RemoteApplyOutcome::VersionCollision => {
                applied_any = true;
                let key = (record.aggregate_type.clone(), record.aggregate_id.clone());
                collisions.entry(key).or_default().push((event.clone(), record.version));
            }
        }
    }

    // A collision can only occur against a pending (unmapped) local row, so
    // `had_pending`/"still pending" always hold here in practice; kept as an
    // explicit gate to match §4.5 pull loop step 7's literal wording.
    if applied_any && had_pending && !collisions.is_empty() {
        let still_has_pending = local_log.has_pending(store_id).await?;
        if still_has_pending {
            for ((aggregate_type, aggregate_id), mut colliding) in collisions {
                colliding.sort_by_key(|(_, version)| *version);
                let from_version_inclusive = colliding[0].1;
                let applied_count = colliding.len() as i64;

                rebase_hook
                    .on_rebase_required(RebaseRequest {
                        aggregate_type: aggregate_type.clone(),
                        aggregate_id: aggregate_id.clone(),
                        from_version_inclusive,
                        applied_count,
                    })
                    .await?;

                for (event, version) in colliding {
                    let retry = local_log
                        .apply_remote_event(store_id, &event, &aggregate_type, &aggregate_id, version)
                        .await?;
                    if matches!(retry, RemoteApplyOutcome::VersionCollision) {
                        return Err(SyncError::protocol(format!(
                            "rebase hook left ({aggregate_type}, {aggregate_id}) v{version} occupied for remote event {}",
                            event.event_id
                        )));
                    }
                }
            }
        }
    }

    Ok(applied_any)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eventsync_core::model::PulledEvent;

    use super::apply_events_and_rebase;
    use crate::fakes::{FakeLocalLog, RecordingRebaseHook};
    use crate::local_log::LocalLog;
    use crate::rebase_hook::RebaseHook;

    fn record(id: &str, aggregate_id: &str, version: i64) -> String {
        format!(
            r#"{{"id":"{id}","aggregateType":"goal","aggregateId":"{aggregate_id}","version":{version},"payloadCiphertext":"YWJj"}}"#
        )
    }

    /// §8 S6: a pending local event at `(goal, goal-1, v=1)` collides with an
    /// incoming remote event at the same slot. The hook shifts the pending
    /// row out of the way, and the remote event is then re-applied and
    /// actually lands at its own version — it is not just acknowledged.
    #[tokio::test]
    async fn collision_triggers_rebase_then_inserts_remote_at_its_version() {
        let fake_log = Arc::new(FakeLocalLog::new());
        fake_log.seed_pending("local-1", &record("local-1", "goal-1", 1), "goal", "goal-1", 1);

        let local_log: Arc<dyn LocalLog> = fake_log.clone();
        // The fake log also implements `RebaseHook`, shifting its own pending
        // rows the same way `SqliteRebaseHook` shifts its backing tables.
        let hook: Arc<dyn RebaseHook> = fake_log.clone();

        let remote = PulledEvent {
            global_sequence: 7,
            event_id: "remote-1".to_string(),
            record_json: record("remote-1", "goal-1", 1),
        };

        let applied = apply_events_and_rebase(&local_log, &hook, "store-1", &[remote], true)
            .await
            .unwrap();
        assert!(applied);

        // The remote event now actually occupies v=1, mapped as acknowledged.
        assert!(fake_log.is_mapped("remote-1"));
        assert_eq!(fake_log.version_for("remote-1"), Some(1));
        // The pending local row was shifted out of the way rather than lost.
        assert_eq!(fake_log.version_for("local-1"), Some(2));
        assert!(!fake_log.is_mapped("local-1"));
    }

    /// No collision, no pending events beforehand: applying a remote event
    /// inserts it and never calls the rebase hook.
    #[tokio::test]
    async fn no_collision_skips_rebase_hook() {
        let fake_log = Arc::new(FakeLocalLog::new());
        let fake_hook = Arc::new(RecordingRebaseHook::new());
        let local_log: Arc<dyn LocalLog> = fake_log.clone();
        let hook: Arc<dyn RebaseHook> = fake_hook.clone();

        let remote = PulledEvent {
            global_sequence: 1,
            event_id: "remote-1".to_string(),
            record_json: record("remote-1", "goal-1", 1),
        };

        let applied = apply_events_and_rebase(&local_log, &hook, "store-1", &[remote], false)
            .await
            .unwrap();
        assert!(applied);
        assert!(fake_hook.calls().is_empty());
    }
}
