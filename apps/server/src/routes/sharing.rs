//! Sharing endpoints (§6: "consumed by clients but their detailed shape is
//! not core"). Thin, paginated wrappers over the already-complete Sharing
//! Ledger appenders/readers in `eventsync-server-store::ledger` — no new
//! ledger semantics are introduced here.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use eventsync_core::model::{GrantStatus, KeyVaultRecord, ResourceGrant};
use eventsync_server_store::ledger;
use eventsync_server_store::models::{KeyVaultRecordRow, ResourceGrantRow, ScopeStateRow};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SinceLimitQuery {
    #[serde(default)]
    pub since: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    200
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopeStateWire {
    scope_id: String,
    seq: i64,
    prev_hash: Option<String>,
    #[serde(rename = "ref")]
    ref_hash: String,
    owner_user_id: String,
    scope_epoch: String,
    signed_record_cbor: String,
    members: Vec<String>,
    signers: Vec<String>,
    sig_suite: String,
    signature: String,
}

impl TryFrom<ScopeStateRow> for ScopeStateWire {
    type Error = ApiError;

    fn try_from(row: ScopeStateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            scope_id: row.scope_id,
            seq: row.seq,
            prev_hash: row.prev_hash,
            ref_hash: row.ref_hash,
            owner_user_id: row.owner_user_id,
            scope_epoch: row.scope_epoch.to_string(),
            signed_record_cbor: row.signed_record_cbor,
            members: serde_json::from_str(&row.members)
                .map_err(|e| ApiError::Internal(format!("corrupt members column: {e}")))?,
            signers: serde_json::from_str(&row.signers)
                .map_err(|e| ApiError::Internal(format!("corrupt signers column: {e}")))?,
            sig_suite: row.sig_suite,
            signature: row.signature,
        })
    }
}

/// `GET /scopes/:scopeId/membership`: the scope's `ScopeState` stream since `since`.
pub async fn membership(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scope_id): Path<String>,
    Query(query): Query<SinceLimitQuery>,
) -> ApiResult<Json<Vec<ScopeStateWire>>> {
    state.sessions.resolve(&headers).await?;

    let pool = state.pool.clone();
    let mut conn = eventsync_server_store::get_connection(&pool).map_err(ApiError::from)?;
    let rows = ledger::load_scope_state_since(&mut conn, &scope_id, query.since, query.limit)
        .map_err(ApiError::from)?;

    rows.into_iter()
        .map(ScopeStateWire::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

/// `GET /scopes/:scopeId/key`: the scope's current head `ScopeState` — the
/// record a newly-joined device dereferences to learn the active epoch and
/// member set before requesting individual resource grants.
pub async fn key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scope_id): Path<String>,
) -> ApiResult<Json<Option<ScopeStateWire>>> {
    state.sessions.resolve(&headers).await?;

    let pool = state.pool.clone();
    let mut conn = eventsync_server_store::get_connection(&pool).map_err(ApiError::from)?;
    let head = ledger::get_scope_state_head(&mut conn, &scope_id).map_err(ApiError::from)?;

    let Some((_, head_ref)) = head else {
        return Ok(Json(None));
    };

    let row = ledger::load_scope_state_by_ref(&mut conn, &head_ref).map_err(ApiError::from)?;
    row.map(ScopeStateWire::try_from).transpose().map(Json)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequestBody {
    pub expected_head: i64,
    pub prev_hash: Option<String>,
    #[serde(rename = "ref")]
    pub ref_hash: String,
    pub scope_epoch: i64,
    pub signed_record_cbor: String,
    pub members: Vec<String>,
    pub signers: Vec<String>,
    pub sig_suite: String,
    pub signature: String,
}

/// `POST /scopes/:scopeId/invites`: appends a new `ScopeState` record adding
/// the invited member. The server never computes or verifies the signed
/// record or its hash (§4.3) — membership and key distribution are entirely
/// the inviter's responsibility; this endpoint only admits the append.
pub async fn invite(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scope_id): Path<String>,
    Json(body): Json<InviteRequestBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let identity = state.sessions.resolve(&headers).await?;

    let pool = state.pool.clone();
    let mut conn = eventsync_server_store::get_connection(&pool).map_err(ApiError::from)?;

    let outcome = ledger::append_scope_state(
        &mut conn,
        body.expected_head,
        ledger::NewScopeState {
            scope_id,
            prev_hash: body.prev_hash,
            ref_hash: body.ref_hash,
            owner_user_id: identity.identity_id,
            scope_epoch: body.scope_epoch,
            signed_record_cbor: body.signed_record_cbor,
            members: body.members,
            signers: body.signers,
            sig_suite: body.sig_suite,
            signature: body.signature,
        },
    )
    .map_err(ApiError::from)?;

    Ok(Json(ledger_outcome_json(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantsQuery {
    pub resource_id: String,
    #[serde(default)]
    pub since: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// `GET /scopes/:scopeId/grants?resourceId=...`: a `(scope,resource)`'s grant
/// stream since `since`. `resourceId` is required since the ledger keys the
/// grant stream per resource, not per scope as a whole.
pub async fn grants(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(scope_id): Path<String>,
    Query(query): Query<GrantsQuery>,
) -> ApiResult<Json<Vec<ResourceGrant>>> {
    state.sessions.resolve(&headers).await?;

    let pool = state.pool.clone();
    let mut conn = eventsync_server_store::get_connection(&pool).map_err(ApiError::from)?;
    let rows = ledger::load_resource_grants_since(
        &mut conn,
        &scope_id,
        &query.resource_id,
        query.since,
        query.limit,
    )
    .map_err(ApiError::from)?;

    rows.into_iter()
        .map(resource_grant_wire)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

/// `GET /keyvault/updates`: the caller's own key-vault stream since `since`.
pub async fn keyvault_updates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SinceLimitQuery>,
) -> ApiResult<Json<Vec<KeyVaultRecord>>> {
    let identity = state.sessions.resolve(&headers).await?;

    let pool = state.pool.clone();
    let mut conn = eventsync_server_store::get_connection(&pool).map_err(ApiError::from)?;
    let rows = ledger::load_key_vault_since(&mut conn, &identity.identity_id, query.since, query.limit)
        .map_err(ApiError::from)?;

    Ok(Json(rows.into_iter().map(key_vault_record_wire).collect()))
}

fn resource_grant_wire(row: ResourceGrantRow) -> ApiResult<ResourceGrant> {
    let status = match row.status.as_str() {
        "active" => GrantStatus::Active,
        "revoked" => GrantStatus::Revoked,
        other => return Err(ApiError::Internal(format!("unrecognized grant status: {other}"))),
    };
    Ok(ResourceGrant {
        grant_id: row.grant_id,
        scope_id: row.scope_id,
        resource_id: row.resource_id,
        seq: row.seq,
        prev_hash: row.prev_hash,
        grant_hash: row.grant_hash,
        scope_state_ref: row.scope_state_ref,
        scope_epoch: row.scope_epoch,
        resource_key_id: row.resource_key_id,
        wrapped_key: row.wrapped_key,
        policy: row.policy,
        status,
        signed_grant_cbor: row.signed_grant_cbor,
        sig_suite: row.sig_suite,
        signature: row.signature,
    })
}

fn key_vault_record_wire(row: KeyVaultRecordRow) -> KeyVaultRecord {
    KeyVaultRecord {
        user_id: row.user_id,
        record_seq: row.record_seq,
        prev_hash: row.prev_hash,
        record_hash: row.record_hash,
        ciphertext: row.ciphertext,
        metadata: row.metadata,
    }
}

fn ledger_outcome_json(outcome: eventsync_core::model::LedgerAppendOutcome) -> serde_json::Value {
    use eventsync_core::model::LedgerAppendOutcome;
    match outcome {
        LedgerAppendOutcome::Ok { seq, hash } => serde_json::json!({ "ok": true, "seq": seq, "hash": hash }),
        LedgerAppendOutcome::HeadMismatch { current_head, expected_head } => serde_json::json!({
            "ok": false,
            "reason": "head_mismatch",
            "currentHead": current_head,
            "expectedHead": expected_head,
        }),
        LedgerAppendOutcome::ChainViolation { reason } => {
            serde_json::json!({ "ok": false, "reason": "chain_violation", "message": reason })
        }
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/scopes/:scopeId/membership", axum::routing::get(membership))
        .route("/scopes/:scopeId/key", axum::routing::get(key))
        .route("/scopes/:scopeId/invites", axum::routing::post(invite))
        .route("/scopes/:scopeId/grants", axum::routing::get(grants))
        .route("/keyvault/updates", axum::routing::get(keyvault_updates))
}
