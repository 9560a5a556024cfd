//! `ApiError`/`ApiResult` (§10.2): one variant per §7 taxonomy class, each
//! mapping to a stable status code and JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eventsync_core::SyncErrorKind;
use eventsync_server_store::StoreError;
use serde::Serialize;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "auth"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "auth"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
        }
        (
            status,
            Json(ErrorBody {
                code,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Maps a `StoreError` to an `ApiError` for the non-conflict paths (push/pull
/// conflicts are shaped into their own 409 body by the route handler, since
/// they carry `head`/`missing` fields `ApiError` has no room for).
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err.kind() {
            SyncErrorKind::Validation => ApiError::Validation(err.to_string()),
            SyncErrorKind::Auth => ApiError::Forbidden(err.to_string()),
            SyncErrorKind::Conflict => ApiError::Internal(err.to_string()),
            SyncErrorKind::Protocol | SyncErrorKind::Transport | SyncErrorKind::Internal => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
