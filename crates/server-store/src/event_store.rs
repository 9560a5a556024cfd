//! Sync Event Store (§4.1): per-`(owner,store)` append log with monotonic
//! global sequence numbers, idempotent append, and plain-read pull.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use eventsync_core::model::{Assigned, AppendOutcome, PulledEvent};

use crate::error::{Result, StoreError};
use crate::models::NewSyncEventRow;
use crate::schema::{sync_events, sync_stores};

/// One event as handed to `append`, preserving caller-supplied order.
#[derive(Debug, Clone)]
pub struct AppendEventInput {
    pub event_id: String,
    pub record_json: String,
}

/// `getHead(ownerId, storeId)` (§4.1). Absent store reads as `0`.
pub fn get_head(conn: &mut PgConnection, owner_id: &str, store_id: &str) -> Result<i64> {
    let head: Option<i64> = sync_stores::table
        .filter(sync_stores::store_id.eq(store_id))
        .filter(sync_stores::owner_id.eq(owner_id))
        .select(sync_stores::head)
        .first(conn)
        .optional()?;
    Ok(head.unwrap_or(0))
}

/// `append(ownerId, storeId, expectedHead, events[])` (§4.1).
///
/// Runs inside one serializable transaction, locking the store row first so
/// concurrent pushes against the same `(ownerId, storeId)` serialize on it.
/// Idempotent per `eventId`: a previously admitted event contributes its
/// existing sequence to `assigned` rather than a new row.
pub fn append(
    conn: &mut PgConnection,
    owner_id: &str,
    store_id: &str,
    expected_head: i64,
    events: &[AppendEventInput],
) -> Result<AppendOutcome> {
    conn.transaction::<_, StoreError, _>(|conn| {
        let current_head: i64 = sync_stores::table
            .filter(sync_stores::store_id.eq(store_id))
            .filter(sync_stores::owner_id.eq(owner_id))
            .select(sync_stores::head)
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(|| StoreError::StoreNotProvisioned(store_id.to_string()))?;

        if current_head != expected_head {
            return Ok(AppendOutcome::HeadMismatch {
                current_head,
                expected_head,
            });
        }

        if events.is_empty() {
            return Ok(AppendOutcome::Ok {
                head: current_head,
                assigned: Vec::new(),
            });
        }

        let mut head = current_head;
        let mut assigned = Vec::with_capacity(events.len());

        for ev in events {
            let existing: Option<i64> = sync_events::table
                .filter(sync_events::owner_id.eq(owner_id))
                .filter(sync_events::store_id.eq(store_id))
                .filter(sync_events::event_id.eq(&ev.event_id))
                .select(sync_events::global_sequence)
                .first(conn)
                .optional()?;

            let global_sequence = match existing {
                Some(seq) => seq,
                None => {
                    head += 1;
                    diesel::insert_into(sync_events::table)
                        .values(NewSyncEventRow {
                            owner_id: owner_id.to_string(),
                            store_id: store_id.to_string(),
                            global_sequence: head,
                            event_id: ev.event_id.clone(),
                            record_json: ev.record_json.clone(),
                        })
                        .execute(conn)?;
                    head
                }
            };

            assigned.push(Assigned {
                event_id: ev.event_id.clone(),
                global_sequence,
            });
        }

        diesel::update(
            sync_stores::table
                .filter(sync_stores::store_id.eq(store_id))
                .filter(sync_stores::owner_id.eq(owner_id)),
        )
        .set(sync_stores::head.eq(head))
        .execute(conn)?;

        Ok(AppendOutcome::Ok { head, assigned })
    })
}

/// `loadSince(ownerId, storeId, since, limit)` (§4.1). Plain read, no locking.
pub fn load_since(
    conn: &mut PgConnection,
    owner_id: &str,
    store_id: &str,
    since: i64,
    limit: i64,
) -> Result<Vec<PulledEvent>> {
    let rows: Vec<(i64, String, String)> = sync_events::table
        .filter(sync_events::owner_id.eq(owner_id))
        .filter(sync_events::store_id.eq(store_id))
        .filter(sync_events::global_sequence.gt(since))
        .order(sync_events::global_sequence.asc())
        .limit(limit)
        .select((
            sync_events::global_sequence,
            sync_events::event_id,
            sync_events::record_json,
        ))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(global_sequence, event_id, record_json)| PulledEvent {
            global_sequence,
            event_id,
            record_json,
        })
        .collect())
}

/// `resetStore(ownerId, storeId)` (§4.1). Callers must independently gate this
/// with the access policy and the process-wide dev-mode flag (§6 `NODE_ENV`).
pub fn reset_store(conn: &mut PgConnection, owner_id: &str, store_id: &str) -> Result<()> {
    conn.transaction::<_, StoreError, _>(|conn| {
        diesel::delete(
            sync_events::table
                .filter(sync_events::owner_id.eq(owner_id))
                .filter(sync_events::store_id.eq(store_id)),
        )
        .execute(conn)?;

        diesel::update(
            sync_stores::table
                .filter(sync_stores::store_id.eq(store_id))
                .filter(sync_stores::owner_id.eq(owner_id)),
        )
        .set(sync_stores::head.eq(0_i64))
        .execute(conn)?;

        Ok(())
    })
}
