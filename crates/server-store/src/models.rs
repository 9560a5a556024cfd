//! Diesel row models for the sync server's Postgres tables.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::schema::{
    key_envelope, key_vault_head, key_vault_record, resource_grant, resource_grant_head,
    scope_state, scope_state_head, sync_events, sync_stores,
};

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(primary_key(store_id))]
#[diesel(table_name = sync_stores)]
pub struct SyncStoreRow {
    pub store_id: String,
    pub owner_id: String,
    pub head: i64,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = sync_events)]
pub struct SyncEventRow {
    pub id: i64,
    pub owner_id: String,
    pub store_id: String,
    pub global_sequence: i64,
    pub event_id: String,
    pub record_json: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = sync_events)]
pub struct NewSyncEventRow {
    pub owner_id: String,
    pub store_id: String,
    pub global_sequence: i64,
    pub event_id: String,
    pub record_json: String,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(primary_key(scope_id, seq))]
#[diesel(table_name = scope_state)]
pub struct ScopeStateRow {
    pub scope_id: String,
    pub seq: i64,
    pub prev_hash: Option<String>,
    pub ref_hash: String,
    pub owner_user_id: String,
    pub scope_epoch: i64,
    pub signed_record_cbor: String,
    /// JSON-encoded `Vec<String>`; kept as opaque text to avoid an array-type
    /// dependency for a field the server never filters on.
    pub members: String,
    pub signers: String,
    pub sig_suite: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = scope_state)]
pub struct NewScopeStateRow {
    pub scope_id: String,
    pub seq: i64,
    pub prev_hash: Option<String>,
    pub ref_hash: String,
    pub owner_user_id: String,
    pub scope_epoch: i64,
    pub signed_record_cbor: String,
    pub members: String,
    pub signers: String,
    pub sig_suite: String,
    pub signature: String,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(primary_key(scope_id))]
#[diesel(table_name = scope_state_head)]
pub struct ScopeStateHeadRow {
    pub scope_id: String,
    pub owner_user_id: String,
    pub head_seq: i64,
    pub head_ref: String,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(primary_key(grant_id))]
#[diesel(table_name = resource_grant)]
pub struct ResourceGrantRow {
    pub grant_id: String,
    pub scope_id: String,
    pub resource_id: String,
    pub seq: i64,
    pub prev_hash: Option<String>,
    pub grant_hash: String,
    pub scope_state_ref: String,
    pub scope_epoch: i64,
    pub resource_key_id: String,
    pub wrapped_key: String,
    pub policy: Option<String>,
    pub status: String,
    pub signed_grant_cbor: String,
    pub sig_suite: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = resource_grant)]
pub struct NewResourceGrantRow {
    pub grant_id: String,
    pub scope_id: String,
    pub resource_id: String,
    pub seq: i64,
    pub prev_hash: Option<String>,
    pub grant_hash: String,
    pub scope_state_ref: String,
    pub scope_epoch: i64,
    pub resource_key_id: String,
    pub wrapped_key: String,
    pub policy: Option<String>,
    pub status: String,
    pub signed_grant_cbor: String,
    pub sig_suite: String,
    pub signature: String,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(primary_key(scope_id, resource_id))]
#[diesel(table_name = resource_grant_head)]
pub struct ResourceGrantHeadRow {
    pub scope_id: String,
    pub resource_id: String,
    pub active_grant_id: String,
    pub head_seq: i64,
    pub head_hash: String,
}

#[derive(Queryable, Identifiable, Insertable, Debug, Clone)]
#[diesel(primary_key(envelope_id))]
#[diesel(table_name = key_envelope)]
pub struct KeyEnvelopeRow {
    pub envelope_id: String,
    pub scope_id: String,
    pub recipient_user_id: String,
    pub scope_epoch: i64,
    pub recipient_uk_pub_fingerprint: String,
    pub ciphersuite: String,
    pub ciphertext: String,
    pub metadata: Option<String>,
}

#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(primary_key(user_id, record_seq))]
#[diesel(table_name = key_vault_record)]
pub struct KeyVaultRecordRow {
    pub user_id: String,
    pub record_seq: i64,
    pub prev_hash: Option<String>,
    pub record_hash: String,
    pub ciphertext: String,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = key_vault_record)]
pub struct NewKeyVaultRecordRow {
    pub user_id: String,
    pub record_seq: i64,
    pub prev_hash: Option<String>,
    pub record_hash: String,
    pub ciphertext: String,
    pub metadata: Option<String>,
}

#[derive(Queryable, Identifiable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(primary_key(user_id))]
#[diesel(table_name = key_vault_head)]
pub struct KeyVaultHeadRow {
    pub user_id: String,
    pub head_seq: i64,
    pub head_hash: String,
}
