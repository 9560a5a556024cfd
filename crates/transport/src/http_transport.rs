//! `HttpSyncTransport` (§6): the wire client implementing
//! `eventsync_engine::SyncTransport` against the Sync Log Server's
//! `/sync/push` and `/sync/pull` endpoints.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use eventsync_core::model::{PullResponseBody, PushEventInput, PushResult};
use eventsync_engine::{Result as EngineResult, SyncError, SyncTransport};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::http_error::HttpTransportError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SESSION_TOKEN_HEADER: &str = "x-session-token";
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Derives a client-side idempotency key from the sorted `eventId` set of a
/// push batch (§11 "Idempotent request fingerprinting at the transport
/// edge"): a retried push after a dropped response carries the same key
/// without the server needing to re-derive idempotency purely from row
/// content.
fn push_idempotency_key(store_id: &str, expected_head: i64, events: &[PushEventInput]) -> String {
    let mut ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    ids.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(store_id.as_bytes());
    hasher.update(expected_head.to_le_bytes());
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Talks to one Sync Log Server over HTTP/JSON. One instance per session
/// token; callers construct a fresh one when the host rotates the token.
pub struct HttpSyncTransport {
    client: reqwest::Client,
    base_url: String,
    session_token: String,
    /// Guards against two concurrent `push()` calls for the same store
    /// reaching the transport at once (§11 "In-flight request dedupe guard
    /// on the client"; §5 notes the engine itself never overlaps two pushes,
    /// but a host embedding multiple engine instances against one store
    /// could still race it).
    push_in_flight: Arc<Mutex<HashSet<String>>>,
}

impl HttpSyncTransport {
    pub fn new(base_url: &str, session_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: session_token.into(),
            push_in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.session_token) {
            headers.insert(SESSION_TOKEN_HEADER, value);
        }
        headers
    }

    fn log_response_body(status: reqwest::StatusCode, body: &str) {
        let mut preview: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        tracing::debug!(%status, body = %preview, "sync transport response");
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, HttpTransportError> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response_body(status, &body);

        if !status.is_success() && status.as_u16() != 409 {
            if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(HttpTransportError::api(
                    status.as_u16(),
                    format!("{}: {}", err.code, err.message),
                ));
            }
            return Err(HttpTransportError::api(
                status.as_u16(),
                format!("request failed: {body}"),
            ));
        }

        serde_json::from_str(&body).map_err(HttpTransportError::from)
    }

    fn map_err(err: HttpTransportError) -> SyncError {
        match err {
            HttpTransportError::Http(e) => SyncError::transport(e.to_string()),
            HttpTransportError::Json(e) => SyncError::protocol(format!("malformed response body: {e}")),
            HttpTransportError::Auth => SyncError::auth("invalid session token"),
            HttpTransportError::Api { status: 401, message } | HttpTransportError::Api { status: 403, message } => {
                SyncError::auth(message)
            }
            HttpTransportError::Api { status: 400, message } => {
                SyncError::new(eventsync_core::SyncErrorKind::Validation, message)
            }
            HttpTransportError::Api { status, message } => {
                SyncError::internal(format!("unexpected status {status}: {message}"))
            }
        }
    }
}

/// Removes `key` from the in-flight set on drop, so a failed or cancelled
/// push doesn't permanently wedge retries of the same batch.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let set = self.set.clone();
        let key = std::mem::take(&mut self.key);
        tokio::spawn(async move {
            set.lock().await.remove(&key);
        });
    }
}

#[async_trait::async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn push(
        &self,
        store_id: &str,
        expected_head: i64,
        events: Vec<PushEventInput>,
    ) -> EngineResult<PushResult> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PushRequestBody {
            store_id: String,
            expected_head: i64,
            events: Vec<PushEventInput>,
        }

        let idempotency_key = push_idempotency_key(store_id, expected_head, &events);

        if !self.push_in_flight.lock().await.insert(idempotency_key.clone()) {
            return Err(SyncError::internal(
                "a push for this exact batch is already in flight",
            ));
        }
        let _guard = InFlightGuard {
            set: self.push_in_flight.clone(),
            key: idempotency_key.clone(),
        };

        let url = format!("{}/sync/push", self.base_url);
        let body = PushRequestBody {
            store_id: store_id.to_string(),
            expected_head,
            events,
        };

        let mut headers = self.headers();
        if let Ok(value) = HeaderValue::from_str(&idempotency_key) {
            headers.insert(IDEMPOTENCY_KEY_HEADER, value);
        }

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::map_err(HttpTransportError::Http(e)))?;

        Self::parse_json(response).await.map_err(Self::map_err)
    }

    async fn pull(
        &self,
        store_id: &str,
        since: i64,
        limit: u32,
        wait_ms: u64,
    ) -> EngineResult<PullResponseBody> {
        let url = format!(
            "{}/sync/pull?storeId={}&since={}&limit={}&waitMs={}",
            self.base_url, store_id, since, limit, wait_ms
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| Self::map_err(HttpTransportError::Http(e)))?;

        Self::parse_json(response).await.map_err(Self::map_err)
    }
}
