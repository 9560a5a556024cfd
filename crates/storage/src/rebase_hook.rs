//! `SqliteRebaseHook`: the application-provided rebase callback (§4.5
//! "Rebase hook"), implemented against the same SQLite log `SqliteLocalLog`
//! owns. A real host application may instead implement `RebaseHook` itself
//! (e.g. to rewrite higher-level aggregate caches in lockstep); this
//! implementation is the reference behavior for a host with no extra
//! bookkeeping beyond the local log's own tables.

use async_trait::async_trait;
use diesel::prelude::*;

use eventsync_core::rebase::compute_rebase_shifts;
use eventsync_engine::{RebaseHook, Result as EngineResult};

use crate::db::SqlitePool;
use crate::error::StorageError;
use crate::schema::{events, sync_event_map};

// Note: this hook only renumbers pending local rows out of the way; it never
// touches `sync_event_map` or inserts the colliding remote rows itself. The
// remote events stay un-inserted (and unmapped) until the apply path
// (`eventsync_engine::remote_apply`) re-attempts `apply_remote_event` for
// them immediately after this hook returns, now that their slots are free.

pub struct SqliteRebaseHook {
    pool: SqlitePool,
}

impl SqliteRebaseHook {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RebaseHook for SqliteRebaseHook {
    async fn on_rebase_required(&self, request: eventsync_core::rebase::RebaseRequest) -> EngineResult<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> EngineResult<()> {
            let mut conn = pool.get().map_err(StorageError::from)?;

            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                if request.applied_count == 0 {
                    return Ok(());
                }

                let mapped = sync_event_map::table.select(sync_event_map::event_id);
                let pending_versions: Vec<i64> = events::table
                    .filter(events::aggregate_type.eq(&request.aggregate_type))
                    .filter(events::aggregate_id.eq(&request.aggregate_id))
                    .filter(events::id.ne_all(mapped))
                    .select(events::version)
                    .load(conn)?;

                let shifts = compute_rebase_shifts(
                    &pending_versions,
                    request.from_version_inclusive,
                    request.applied_count,
                );

                // Descending `old_version` order (as `compute_rebase_shifts`
                // returns them) so a write never collides with a
                // not-yet-shifted row still occupying the target slot.
                for shift in shifts {
                    diesel::update(
                        events::table
                            .filter(events::aggregate_type.eq(&request.aggregate_type))
                            .filter(events::aggregate_id.eq(&request.aggregate_id))
                            .filter(events::version.eq(shift.old_version)),
                    )
                    .set(events::version.eq(shift.new_version))
                    .execute(conn)?;
                }

                Ok(())
            })
            .map_err(StorageError::from)?;

            Ok(())
        })
        .await
        .expect("rebase hook blocking task panicked")
    }
}

#[cfg(test)]
mod tests {
    use diesel::prelude::*;
    use tempfile::tempdir;

    use super::*;
    use crate::db;
    use crate::local_log::SqliteLocalLog;
    use crate::models::NewEventRow;
    use crate::schema::events;
    use eventsync_core::model::PulledEvent;
    use eventsync_core::rebase::RebaseRequest;
    use eventsync_engine::LocalLog;

    fn test_pool() -> SqlitePool {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.keep().join("local.sqlite3");
        db::open(db_path.to_str().expect("utf8 path")).expect("open db")
    }

    fn seed_pending_row(pool: &SqlitePool, id: &str, aggregate_id: &str, version: i64) {
        let mut conn = pool.get().expect("conn");
        diesel::insert_into(events::table)
            .values(NewEventRow {
                id: id.to_string(),
                store_id: "store-1".to_string(),
                aggregate_type: "goal".to_string(),
                aggregate_id: aggregate_id.to_string(),
                version,
                record_json: format!(r#"{{"id":"{id}"}}"#),
                occurred_at: "2026-01-01T00:00:00Z".to_string(),
            })
            .execute(&mut conn)
            .expect("seed pending row");
    }

    /// §8 S6 end-to-end against real SQLite: a pending local event at
    /// `(goal, g1, v=1)` collides with an applied remote event at the same
    /// slot; the rebase hook shifts the pending row to v=2, and re-applying
    /// the collided remote event now succeeds at its original version v=1.
    #[tokio::test]
    async fn shifts_colliding_pending_row_past_applied_remote_versions() {
        let pool = test_pool();
        seed_pending_row(&pool, "local-1", "g1", 1);

        let log = SqliteLocalLog::new(pool.clone());
        let remote = PulledEvent {
            global_sequence: 9,
            event_id: "remote-1".to_string(),
            record_json: r#"{"id":"remote-1"}"#.to_string(),
        };
        let outcome = log
            .apply_remote_event("store-1", &remote, "goal", "g1", 1)
            .await
            .unwrap();
        assert!(matches!(outcome, eventsync_engine::RemoteApplyOutcome::VersionCollision));

        let hook = SqliteRebaseHook::new(pool.clone());
        hook.on_rebase_required(RebaseRequest {
            aggregate_type: "goal".to_string(),
            aggregate_id: "g1".to_string(),
            from_version_inclusive: 1,
            applied_count: 1,
        })
        .await
        .unwrap();

        let mut conn = pool.get().unwrap();
        let new_version: i64 = events::table
            .filter(events::id.eq("local-1"))
            .select(events::version)
            .first(&mut conn)
            .unwrap();
        assert_eq!(new_version, 2);

        // The slot is now free; re-applying the collided remote event lands
        // it at its original version instead of leaving it un-inserted.
        let retry = log
            .apply_remote_event("store-1", &remote, "goal", "g1", 1)
            .await
            .unwrap();
        assert!(matches!(retry, eventsync_engine::RemoteApplyOutcome::Inserted));
        let remote_version: i64 = events::table
            .filter(events::id.eq("remote-1"))
            .select(events::version)
            .first(&mut conn)
            .unwrap();
        assert_eq!(remote_version, 1);
    }

    /// No remote events have actually landed on the aggregate yet (a stale
    /// or duplicate invocation with `applied_count: 0`) — the hook is a no-op.
    #[tokio::test]
    async fn no_applied_remote_events_is_a_no_op() {
        let pool = test_pool();
        seed_pending_row(&pool, "local-1", "g1", 1);

        let hook = SqliteRebaseHook::new(pool.clone());
        hook.on_rebase_required(RebaseRequest {
            aggregate_type: "goal".to_string(),
            aggregate_id: "g1".to_string(),
            from_version_inclusive: 1,
            applied_count: 0,
        })
        .await
        .unwrap();

        let mut conn = pool.get().unwrap();
        let version: i64 = events::table
            .filter(events::id.eq("local-1"))
            .select(events::version)
            .first(&mut conn)
            .unwrap();
        assert_eq!(version, 1);
    }
}
