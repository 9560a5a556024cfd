//! Diesel row models for the client's local SQLite log.

use diesel::prelude::*;

use crate::schema::{events, sync_event_map, sync_meta};

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(primary_key(commit_sequence))]
#[diesel(table_name = events)]
pub struct EventRow {
    pub commit_sequence: i64,
    pub id: String,
    pub store_id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub record_json: String,
    pub occurred_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = events)]
pub struct NewEventRow {
    pub id: String,
    pub store_id: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub record_json: String,
    pub occurred_at: String,
}

#[derive(Queryable, Identifiable, Insertable, Debug, Clone)]
#[diesel(primary_key(event_id))]
#[diesel(table_name = sync_event_map)]
pub struct SyncEventMapRow {
    pub event_id: String,
    pub global_sequence: i64,
    pub inserted_at: String,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(primary_key(store_id))]
#[diesel(table_name = sync_meta)]
pub struct SyncMetaRow {
    pub store_id: String,
    pub last_pulled_global_seq: i64,
    pub updated_at: String,
}
