//! `SqliteLocalLog`: the client's local durable log (§4.5 "Local tables
//! (abstract)") backed by SQLite via Diesel, implementing
//! `eventsync_engine::LocalLog`.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use eventsync_core::model::{Assigned, PulledEvent};
use eventsync_engine::{LocalLog, PendingEvent, RemoteApplyOutcome, Result as EngineResult, SyncMeta};

use crate::db::SqlitePool;
use crate::error::StorageError;
use crate::models::{NewEventRow, SyncEventMapRow, SyncMetaRow};
use crate::schema::{events, sync_event_map, sync_meta};

pub struct SqliteLocalLog {
    pool: SqlitePool,
}

impl SqliteLocalLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn load_pending_sync(conn: &mut SqliteConnection, store_id: &str, limit: i64) -> diesel::QueryResult<Vec<PendingEvent>> {
    let mapped = sync_event_map::table.select(sync_event_map::event_id);
    let rows: Vec<(i64, String, String)> = events::table
        .filter(events::store_id.eq(store_id))
        .filter(events::id.ne_all(mapped))
        .order(events::commit_sequence.asc())
        .limit(limit)
        .select((events::commit_sequence, events::id, events::record_json))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(commit_sequence, id, record_json)| PendingEvent {
            id,
            record_json,
            commit_sequence,
        })
        .collect())
}

#[async_trait]
impl LocalLog for SqliteLocalLog {
    async fn load_pending(&self, store_id: &str, limit: u32) -> EngineResult<Vec<PendingEvent>> {
        let pool = self.pool.clone();
        let store_id = store_id.to_string();
        tokio::task::spawn_blocking(move || -> EngineResult<Vec<PendingEvent>> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            Ok(load_pending_sync(&mut conn, &store_id, limit as i64).map_err(StorageError::from)?)
        })
        .await
        .expect("load_pending blocking task panicked")
    }

    async fn has_pending(&self, store_id: &str) -> EngineResult<bool> {
        let pool = self.pool.clone();
        let store_id = store_id.to_string();
        tokio::task::spawn_blocking(move || -> EngineResult<bool> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            let pending = load_pending_sync(&mut conn, &store_id, 1).map_err(StorageError::from)?;
            Ok(!pending.is_empty())
        })
        .await
        .expect("has_pending blocking task panicked")
    }

    async fn apply_remote_event(
        &self,
        store_id: &str,
        event: &PulledEvent,
        aggregate_type: &str,
        aggregate_id: &str,
        version: i64,
    ) -> EngineResult<RemoteApplyOutcome> {
        let pool = self.pool.clone();
        let store_id = store_id.to_string();
        let event = event.clone();
        let aggregate_type = aggregate_type.to_string();
        let aggregate_id = aggregate_id.to_string();

        tokio::task::spawn_blocking(move || -> EngineResult<RemoteApplyOutcome> {
            let mut conn = pool.get().map_err(StorageError::from)?;

            let outcome = conn
                .transaction::<_, diesel::result::Error, _>(|conn| {
                    let already_by_id: Option<i64> = events::table
                        .filter(events::id.eq(&event.event_id))
                        .select(events::commit_sequence)
                        .first(conn)
                        .optional()?;

                    if already_by_id.is_some() {
                        upsert_sync_event_map(conn, &event)?;
                        return Ok(RemoteApplyOutcome::AlreadyPresent);
                    }

                    let version_occupied: bool = diesel::dsl::select(diesel::dsl::exists(
                        events::table
                            .filter(events::aggregate_type.eq(&aggregate_type))
                            .filter(events::aggregate_id.eq(&aggregate_id))
                            .filter(events::version.eq(version)),
                    ))
                    .get_result(conn)?;

                    if version_occupied {
                        // §4.5 pull loop step 4: INSERT-OR-IGNORE leaves the
                        // existing (pending, unmapped) row untouched. The
                        // colliding remote event is left un-inserted *and*
                        // unmapped here — the apply path must re-attempt this
                        // same call after the rebase hook vacates the slot,
                        // so the event actually lands instead of being
                        // silently acknowledged and dropped.
                        return Ok(RemoteApplyOutcome::VersionCollision);
                    }

                    diesel::insert_into(events::table)
                        .values(NewEventRow {
                            id: event.event_id.clone(),
                            store_id: store_id.clone(),
                            aggregate_type: aggregate_type.clone(),
                            aggregate_id: aggregate_id.clone(),
                            version,
                            record_json: event.record_json.clone(),
                            occurred_at: now_rfc3339(),
                        })
                        .execute(conn)?;

                    upsert_sync_event_map(conn, &event)?;

                    Ok(RemoteApplyOutcome::Inserted)
                })
                .map_err(StorageError::from)?;

            Ok(outcome)
        })
        .await
        .expect("apply_remote_event blocking task panicked")
    }

    async fn record_assignment(&self, assigned: &Assigned) -> EngineResult<()> {
        let pool = self.pool.clone();
        let assigned = assigned.clone();
        tokio::task::spawn_blocking(move || -> EngineResult<()> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            diesel::insert_into(sync_event_map::table)
                .values(SyncEventMapRow {
                    event_id: assigned.event_id.clone(),
                    global_sequence: assigned.global_sequence,
                    inserted_at: now_rfc3339(),
                })
                .on_conflict(sync_event_map::event_id)
                .do_nothing()
                .execute(&mut conn)
                .map_err(StorageError::from)?;
            Ok(())
        })
        .await
        .expect("record_assignment blocking task panicked")
    }

    async fn sync_meta(&self, store_id: &str) -> EngineResult<SyncMeta> {
        let pool = self.pool.clone();
        let store_id = store_id.to_string();
        tokio::task::spawn_blocking(move || -> EngineResult<SyncMeta> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            let seq: Option<i64> = sync_meta::table
                .filter(sync_meta::store_id.eq(&store_id))
                .select(sync_meta::last_pulled_global_seq)
                .first(&mut conn)
                .optional()
                .map_err(StorageError::from)?;
            Ok(SyncMeta {
                last_pulled_global_seq: seq.unwrap_or(0),
            })
        })
        .await
        .expect("sync_meta blocking task panicked")
    }

    async fn advance_last_pulled(&self, store_id: &str, seq: i64) -> EngineResult<()> {
        let pool = self.pool.clone();
        let store_id = store_id.to_string();
        tokio::task::spawn_blocking(move || -> EngineResult<()> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let current: Option<i64> = sync_meta::table
                    .filter(sync_meta::store_id.eq(&store_id))
                    .select(sync_meta::last_pulled_global_seq)
                    .first(conn)
                    .optional()?;

                // §5: "the engine tolerates monotonic last_pulled_global_seq
                // moves but never decreases it" — take the max.
                let next = current.map(|c| c.max(seq)).unwrap_or(seq);

                diesel::insert_into(sync_meta::table)
                    .values(SyncMetaRow {
                        store_id: store_id.clone(),
                        last_pulled_global_seq: next,
                        updated_at: now_rfc3339(),
                    })
                    .on_conflict(sync_meta::store_id)
                    .do_update()
                    .set((
                        sync_meta::last_pulled_global_seq.eq(next),
                        sync_meta::updated_at.eq(now_rfc3339()),
                    ))
                    .execute(conn)?;

                Ok(())
            })
            .map_err(StorageError::from)?;
            Ok(())
        })
        .await
        .expect("advance_last_pulled blocking task panicked")
    }

    async fn pending_versions_for_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> EngineResult<Vec<i64>> {
        let pool = self.pool.clone();
        let aggregate_type = aggregate_type.to_string();
        let aggregate_id = aggregate_id.to_string();
        tokio::task::spawn_blocking(move || -> EngineResult<Vec<i64>> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            let mapped = sync_event_map::table.select(sync_event_map::event_id);
            let versions: Vec<i64> = events::table
                .filter(events::aggregate_type.eq(&aggregate_type))
                .filter(events::aggregate_id.eq(&aggregate_id))
                .filter(events::id.ne_all(mapped))
                .select(events::version)
                .load(&mut conn)
                .map_err(StorageError::from)?;
            Ok(versions)
        })
        .await
        .expect("pending_versions_for_aggregate blocking task panicked")
    }
}

fn upsert_sync_event_map(conn: &mut SqliteConnection, event: &PulledEvent) -> diesel::QueryResult<()> {
    diesel::insert_into(sync_event_map::table)
        .values(SyncEventMapRow {
            event_id: event.event_id.clone(),
            global_sequence: event.global_sequence,
            inserted_at: now_rfc3339(),
        })
        .on_conflict(sync_event_map::event_id)
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use diesel::prelude::*;
    use tempfile::tempdir;

    use super::*;
    use crate::db;
    use crate::models::NewEventRow;
    use crate::schema::events;

    fn test_log() -> (SqliteLocalLog, SqlitePool) {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.keep().join("local.sqlite3");
        let pool = db::open(db_path.to_str().expect("utf8 path")).expect("open db");
        (SqliteLocalLog::new(pool.clone()), pool)
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
                occurred_at: now_rfc3339(),
            })
            .execute(&mut conn)
            .expect("seed pending row");
    }

    fn pulled(global_sequence: i64, event_id: &str) -> PulledEvent {
        PulledEvent {
            global_sequence,
            event_id: event_id.to_string(),
            record_json: format!(r#"{{"id":"{event_id}"}}"#),
        }
    }

    #[tokio::test]
    async fn apply_remote_event_inserts_and_maps_new_row() {
        let (log, _pool) = test_log();
        let outcome = log
            .apply_remote_event("store-1", &pulled(1, "e1"), "goal", "g1", 1)
            .await
            .unwrap();
        assert!(matches!(outcome, RemoteApplyOutcome::Inserted));
        assert!(!log.has_pending("store-1").await.unwrap());
    }

    #[tokio::test]
    async fn apply_remote_event_is_idempotent_on_event_id() {
        let (log, _pool) = test_log();
        log.apply_remote_event("store-1", &pulled(1, "e1"), "goal", "g1", 1)
            .await
            .unwrap();
        let second = log
            .apply_remote_event("store-1", &pulled(1, "e1"), "goal", "g1", 1)
            .await
            .unwrap();
        assert!(matches!(second, RemoteApplyOutcome::AlreadyPresent));
    }

    /// §8 S6: a pending local row at `(goal, g1, v=1)` blocks the remote
    /// insert; the remote event is still recorded as seen (mapped) so it is
    /// never re-applied once the host's rebase hook frees the slot.
    #[tokio::test]
    async fn apply_remote_event_detects_version_collision_without_touching_pending_row() {
        let (log, pool) = test_log();
        seed_pending_row(&pool, "local-1", "g1", 1);
        assert!(log.has_pending("store-1").await.unwrap());

        let outcome = log
            .apply_remote_event("store-1", &pulled(5, "remote-1"), "goal", "g1", 1)
            .await
            .unwrap();
        assert!(matches!(outcome, RemoteApplyOutcome::VersionCollision));

        // The pending local row is untouched; it is still the only pending event.
        let pending = log.load_pending("store-1", 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "local-1");
    }

    #[tokio::test]
    async fn record_assignment_is_idempotent() {
        let (log, pool) = test_log();
        seed_pending_row(&pool, "local-1", "g1", 1);
        assert!(log.has_pending("store-1").await.unwrap());

        log.record_assignment(&Assigned {
            event_id: "local-1".to_string(),
            global_sequence: 3,
        })
        .await
        .unwrap();
        assert!(!log.has_pending("store-1").await.unwrap());

        // Re-recording the same assignment does not error (on-conflict do-nothing).
        log.record_assignment(&Assigned {
            event_id: "local-1".to_string(),
            global_sequence: 3,
        })
        .await
        .unwrap();
    }

    /// §5 "the engine tolerates monotonic last_pulled_global_seq moves but
    /// never decreases it" — advancing to a lower sequence is a no-op.
    #[tokio::test]
    async fn advance_last_pulled_never_decreases() {
        let (log, _pool) = test_log();
        log.advance_last_pulled("store-1", 10).await.unwrap();
        log.advance_last_pulled("store-1", 3).await.unwrap();
        let meta = log.sync_meta("store-1").await.unwrap();
        assert_eq!(meta.last_pulled_global_seq, 10);
    }

    #[tokio::test]
    async fn pending_versions_for_aggregate_excludes_mapped_rows() {
        let (log, pool) = test_log();
        seed_pending_row(&pool, "local-1", "g1", 1);
        seed_pending_row(&pool, "local-2", "g1", 2);
        log.record_assignment(&Assigned {
            event_id: "local-1".to_string(),
            global_sequence: 1,
        })
        .await
        .unwrap();

        let versions = log.pending_versions_for_aggregate("goal", "g1").await.unwrap();
        assert_eq!(versions, vec![2]);
    }
}
