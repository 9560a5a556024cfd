//! Sharing Ledger appenders (§4.3): hash-chained, optimistically-concurrent
//! append for `ScopeState`, `ResourceGrant`, and `KeyVaultRecord`.
//!
//! All three streams share one protocol (lock head row, check expected head,
//! check the hash-chain predicate, insert, upsert head); only the column and
//! head-table names differ, so each stream gets its own small function rather
//! than one generic pushed through a trait object.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use eventsync_core::hash_chain::check_chain;
use eventsync_core::model::LedgerAppendOutcome;

use crate::error::{Result, StoreError};
use crate::models::{
    KeyVaultHeadRow, KeyVaultRecordRow, NewKeyVaultRecordRow, NewResourceGrantRow, NewScopeStateRow,
    ResourceGrantHeadRow, ResourceGrantRow, ScopeStateHeadRow, ScopeStateRow,
};
use crate::schema::{
    key_vault_head, key_vault_record, resource_grant, resource_grant_head, scope_state,
    scope_state_head,
};

fn outcome_from_chain_error(
    err: eventsync_core::hash_chain::ChainError,
) -> LedgerAppendOutcome {
    LedgerAppendOutcome::ChainViolation {
        reason: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// ScopeState
// ---------------------------------------------------------------------------

/// A fully-formed `ScopeState` row, hash and signature already computed by
/// the caller — the server never recomputes or verifies either (§4.3).
pub struct NewScopeState {
    pub scope_id: String,
    pub prev_hash: Option<String>,
    pub ref_hash: String,
    pub owner_user_id: String,
    pub scope_epoch: i64,
    pub signed_record_cbor: String,
    pub members: Vec<String>,
    pub signers: Vec<String>,
    pub sig_suite: String,
    pub signature: String,
}

pub fn append_scope_state(
    conn: &mut PgConnection,
    expected_head: i64,
    record: NewScopeState,
) -> Result<LedgerAppendOutcome> {
    conn.transaction::<_, StoreError, _>(|conn| {
        let head_row: Option<(i64, String)> = scope_state_head::table
            .filter(scope_state_head::scope_id.eq(&record.scope_id))
            .select((scope_state_head::head_seq, scope_state_head::head_ref))
            .for_update()
            .first(conn)
            .optional()?;

        let (current_head, current_ref) = match &head_row {
            Some((seq, r)) => (*seq, Some(r.as_str())),
            None => (0, None),
        };

        if current_head != expected_head {
            return Ok(LedgerAppendOutcome::HeadMismatch {
                current_head,
                expected_head,
            });
        }

        if let Err(e) = check_chain(expected_head, current_ref, record.prev_hash.as_deref()) {
            return Ok(outcome_from_chain_error(e));
        }

        let seq = expected_head + 1;
        diesel::insert_into(scope_state::table)
            .values(NewScopeStateRow {
                scope_id: record.scope_id.clone(),
                seq,
                prev_hash: record.prev_hash.clone(),
                ref_hash: record.ref_hash.clone(),
                owner_user_id: record.owner_user_id.clone(),
                scope_epoch: record.scope_epoch,
                signed_record_cbor: record.signed_record_cbor,
                members: serde_json::to_string(&record.members)?,
                signers: serde_json::to_string(&record.signers)?,
                sig_suite: record.sig_suite,
                signature: record.signature,
            })
            .execute(conn)?;

        diesel::insert_into(scope_state_head::table)
            .values(ScopeStateHeadRow {
                scope_id: record.scope_id.clone(),
                owner_user_id: record.owner_user_id.clone(),
                head_seq: seq,
                head_ref: record.ref_hash.clone(),
            })
            .on_conflict(scope_state_head::scope_id)
            .do_update()
            .set((
                scope_state_head::head_seq.eq(seq),
                scope_state_head::head_ref.eq(record.ref_hash.clone()),
            ))
            .execute(conn)?;

        Ok(LedgerAppendOutcome::Ok {
            seq,
            hash: record.ref_hash,
        })
    })
}

pub fn load_scope_state_since(
    conn: &mut PgConnection,
    scope_id: &str,
    since: i64,
    limit: i64,
) -> Result<Vec<ScopeStateRow>> {
    Ok(scope_state::table
        .filter(scope_state::scope_id.eq(scope_id))
        .filter(scope_state::seq.gt(since))
        .order(scope_state::seq.asc())
        .limit(limit)
        .load(conn)?)
}

/// `loadByRef(ref) -> ScopeState?` (§4.3). Content-addressed point lookup;
/// `ref_hash` is not unique across scopes in the schema, so this returns the
/// first match, which in practice is the only one (callers only dereference
/// hashes they have already seen for a specific scope).
pub fn load_scope_state_by_ref(conn: &mut PgConnection, ref_hash: &str) -> Result<Option<ScopeStateRow>> {
    Ok(scope_state::table
        .filter(scope_state::ref_hash.eq(ref_hash))
        .first(conn)
        .optional()?)
}

pub fn get_scope_state_head(conn: &mut PgConnection, scope_id: &str) -> Result<Option<(i64, String)>> {
    Ok(scope_state_head::table
        .filter(scope_state_head::scope_id.eq(scope_id))
        .select((scope_state_head::head_seq, scope_state_head::head_ref))
        .first(conn)
        .optional()?)
}

// ---------------------------------------------------------------------------
// ResourceGrant
// ---------------------------------------------------------------------------

pub struct NewResourceGrant {
    pub grant_id: String,
    pub scope_id: String,
    pub resource_id: String,
    pub prev_hash: Option<String>,
    pub grant_hash: String,
    pub scope_state_ref: String,
    pub scope_epoch: i64,
    pub resource_key_id: String,
    pub wrapped_key: String,
    pub policy: Option<String>,
    pub active: bool,
    pub signed_grant_cbor: String,
    pub sig_suite: String,
    pub signature: String,
}

pub fn append_resource_grant(
    conn: &mut PgConnection,
    expected_head: i64,
    record: NewResourceGrant,
) -> Result<LedgerAppendOutcome> {
    conn.transaction::<_, StoreError, _>(|conn| {
        let head_row: Option<(i64, String)> = resource_grant_head::table
            .filter(resource_grant_head::scope_id.eq(&record.scope_id))
            .filter(resource_grant_head::resource_id.eq(&record.resource_id))
            .select((
                resource_grant_head::head_seq,
                resource_grant_head::head_hash,
            ))
            .for_update()
            .first(conn)
            .optional()?;

        let (current_head, current_ref) = match &head_row {
            Some((seq, r)) => (*seq, Some(r.as_str())),
            None => (0, None),
        };

        if current_head != expected_head {
            return Ok(LedgerAppendOutcome::HeadMismatch {
                current_head,
                expected_head,
            });
        }

        if let Err(e) = check_chain(expected_head, current_ref, record.prev_hash.as_deref()) {
            return Ok(outcome_from_chain_error(e));
        }

        let seq = expected_head + 1;
        let status = if record.active { "active" } else { "revoked" };

        diesel::insert_into(resource_grant::table)
            .values(NewResourceGrantRow {
                grant_id: record.grant_id.clone(),
                scope_id: record.scope_id.clone(),
                resource_id: record.resource_id.clone(),
                seq,
                prev_hash: record.prev_hash.clone(),
                grant_hash: record.grant_hash.clone(),
                scope_state_ref: record.scope_state_ref,
                scope_epoch: record.scope_epoch,
                resource_key_id: record.resource_key_id,
                wrapped_key: record.wrapped_key,
                policy: record.policy,
                status: status.to_string(),
                signed_grant_cbor: record.signed_grant_cbor,
                sig_suite: record.sig_suite,
                signature: record.signature,
            })
            .execute(conn)?;

        // Head only advances for active grants (§4.3 step 6).
        if record.active {
            diesel::insert_into(resource_grant_head::table)
                .values(ResourceGrantHeadRow {
                    scope_id: record.scope_id.clone(),
                    resource_id: record.resource_id.clone(),
                    active_grant_id: record.grant_id.clone(),
                    head_seq: seq,
                    head_hash: record.grant_hash.clone(),
                })
                .on_conflict((resource_grant_head::scope_id, resource_grant_head::resource_id))
                .do_update()
                .set((
                    resource_grant_head::active_grant_id.eq(record.grant_id.clone()),
                    resource_grant_head::head_seq.eq(seq),
                    resource_grant_head::head_hash.eq(record.grant_hash.clone()),
                ))
                .execute(conn)?;
        }

        Ok(LedgerAppendOutcome::Ok {
            seq,
            hash: record.grant_hash,
        })
    })
}

/// `getActiveGrant(scopeId, resourceId) -> ResourceGrant?` (§4.3).
pub fn get_active_grant(
    conn: &mut PgConnection,
    scope_id: &str,
    resource_id: &str,
) -> Result<Option<ResourceGrantRow>> {
    let active_grant_id: Option<String> = resource_grant_head::table
        .filter(resource_grant_head::scope_id.eq(scope_id))
        .filter(resource_grant_head::resource_id.eq(resource_id))
        .select(resource_grant_head::active_grant_id)
        .first(conn)
        .optional()?;

    let Some(grant_id) = active_grant_id else {
        return Ok(None);
    };

    Ok(resource_grant::table
        .filter(resource_grant::grant_id.eq(grant_id))
        .first(conn)
        .optional()?)
}

pub fn load_resource_grants_since(
    conn: &mut PgConnection,
    scope_id: &str,
    resource_id: &str,
    since: i64,
    limit: i64,
) -> Result<Vec<ResourceGrantRow>> {
    Ok(resource_grant::table
        .filter(resource_grant::scope_id.eq(scope_id))
        .filter(resource_grant::resource_id.eq(resource_id))
        .filter(resource_grant::seq.gt(since))
        .order(resource_grant::seq.asc())
        .limit(limit)
        .load(conn)?)
}

// ---------------------------------------------------------------------------
// KeyVaultRecord
// ---------------------------------------------------------------------------

pub struct NewKeyVaultRecord {
    pub user_id: String,
    pub prev_hash: Option<String>,
    pub record_hash: String,
    pub ciphertext: String,
    pub metadata: Option<String>,
}

pub fn append_key_vault_record(
    conn: &mut PgConnection,
    expected_head: i64,
    record: NewKeyVaultRecord,
) -> Result<LedgerAppendOutcome> {
    conn.transaction::<_, StoreError, _>(|conn| {
        let head_row: Option<(i64, String)> = key_vault_head::table
            .filter(key_vault_head::user_id.eq(&record.user_id))
            .select((key_vault_head::head_seq, key_vault_head::head_hash))
            .for_update()
            .first(conn)
            .optional()?;

        let (current_head, current_ref) = match &head_row {
            Some((seq, r)) => (*seq, Some(r.as_str())),
            None => (0, None),
        };

        if current_head != expected_head {
            return Ok(LedgerAppendOutcome::HeadMismatch {
                current_head,
                expected_head,
            });
        }

        if let Err(e) = check_chain(expected_head, current_ref, record.prev_hash.as_deref()) {
            return Ok(outcome_from_chain_error(e));
        }

        let seq = expected_head + 1;
        diesel::insert_into(key_vault_record::table)
            .values(NewKeyVaultRecordRow {
                user_id: record.user_id.clone(),
                record_seq: seq,
                prev_hash: record.prev_hash.clone(),
                record_hash: record.record_hash.clone(),
                ciphertext: record.ciphertext,
                metadata: record.metadata,
            })
            .execute(conn)?;

        diesel::insert_into(key_vault_head::table)
            .values(KeyVaultHeadRow {
                user_id: record.user_id.clone(),
                head_seq: seq,
                head_hash: record.record_hash.clone(),
            })
            .on_conflict(key_vault_head::user_id)
            .do_update()
            .set((
                key_vault_head::head_seq.eq(seq),
                key_vault_head::head_hash.eq(record.record_hash.clone()),
            ))
            .execute(conn)?;

        Ok(LedgerAppendOutcome::Ok {
            seq,
            hash: record.record_hash,
        })
    })
}

pub fn load_key_vault_since(
    conn: &mut PgConnection,
    user_id: &str,
    since: i64,
    limit: i64,
) -> Result<Vec<KeyVaultRecordRow>> {
    Ok(key_vault_record::table
        .filter(key_vault_record::user_id.eq(user_id))
        .filter(key_vault_record::record_seq.gt(since))
        .order(key_vault_record::record_seq.asc())
        .limit(limit)
        .load(conn)?)
}
