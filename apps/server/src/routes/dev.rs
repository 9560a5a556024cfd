//! `POST /sync/dev/reset` (§11 "Explicit resetStore dev endpoint wiring"):
//! gated by `NODE_ENV` at the route layer and again by the access policy
//! inside `SyncService::reset_store` — the route check is the fast no-op
//! path, the service check is the one that can never be bypassed by wiring
//! a different router.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequestBody {
    pub store_id: String,
}

pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ResetRequestBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.config.dev_reset_allowed() {
        return Err(ApiError::Forbidden(
            "dev reset is disabled outside development".to_string(),
        ));
    }

    let identity = state.sessions.resolve(&headers).await?;
    tracing::warn!(owner_id = %identity.identity_id, store_id = %body.store_id, "dev store reset");

    state.sync.reset_store(identity.identity_id, body.store_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/sync/dev/reset", axum::routing::post(reset))
}
