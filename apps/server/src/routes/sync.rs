//! `POST /sync/push` and `GET /sync/pull` (§6).

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use eventsync_core::ids::StoreId;
use eventsync_core::model::{PushEventInput, PushResult};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequestBody {
    pub store_id: String,
    pub expected_head: i64,
    pub events: Vec<PushEventInput>,
}

pub async fn push(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PushRequestBody>,
) -> ApiResult<Response> {
    let identity = state.sessions.resolve(&headers).await?;
    let store_id = StoreId::new(body.store_id.clone())
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    tracing::info!(
        owner_id = %identity.identity_id,
        store_id = %store_id,
        expected_head = body.expected_head,
        event_count = body.events.len(),
        "sync push received"
    );

    let result = state
        .sync
        .push(
            identity.identity_id.clone(),
            store_id.to_string(),
            body.expected_head,
            body.events,
        )
        .await?;

    Ok(push_response(result))
}

fn push_response(result: PushResult) -> Response {
    match &result {
        PushResult::Ok { head, .. } => {
            tracing::info!(head, "sync push accepted");
            (StatusCode::CREATED, Json(result)).into_response()
        }
        PushResult::Conflict { head, reason, .. } => {
            tracing::warn!(head, ?reason, "sync push rejected");
            (StatusCode::CONFLICT, Json(result)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullQuery {
    pub store_id: String,
    #[serde(default)]
    pub since: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub wait_ms: u64,
}

fn default_limit() -> i64 {
    200
}

pub async fn pull(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PullQuery>,
) -> ApiResult<Response> {
    let identity = state.sessions.resolve(&headers).await?;
    let store_id = StoreId::new(query.store_id.clone())
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    tracing::debug!(
        owner_id = %identity.identity_id,
        store_id = %store_id,
        since = query.since,
        "sync pull received"
    );

    // `|| false` means the `cancelled` callback itself never fires early —
    // axum doesn't expose a cheap mid-handler disconnect check to wire it up
    // to. Cancellation still happens on client disconnect: hyper drops this
    // whole handler future (sleep/re-check loop included) the moment the
    // connection goes away, the same as any other in-flight axum handler. The
    // `waitMs` clamp bounds worst-case latency for the case the connection
    // stays open.
    let body = state
        .sync
        .pull(
            identity.identity_id,
            store_id.to_string(),
            query.since,
            query.limit,
            query.wait_ms,
            || false,
        )
        .await?;

    Ok((StatusCode::OK, Json(body)).into_response())
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/sync/push", axum::routing::post(push))
        .route("/sync/pull", axum::routing::get(pull))
}
