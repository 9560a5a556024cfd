//! Session resolution (§6 Authentication, §9 "global mutable state"):
//! extracts the opaque session token from `x-session-token` or the
//! `mo_session` cookie, resolves it against the Kratos-equivalent
//! introspection endpoint, and caches the result in-process with a TTL.
//!
//! The cache is its own component with explicit `read`/`write`/`invalidate`
//! operations rather than a bare process-global, so the eviction policy and
//! the lock are owned in one place.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::error::ApiError;

const SESSION_TOKEN_HEADER: &str = "x-session-token";
const SESSION_COOKIE_NAME: &str = "mo_session";

#[derive(Debug, Clone)]
pub struct Identity {
    pub identity_id: String,
    pub traits: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    identity: WhoamiIdentity,
}

#[derive(Debug, Deserialize)]
struct WhoamiIdentity {
    id: String,
    #[serde(default)]
    traits: serde_json::Value,
}

struct CacheEntry {
    identity: Identity,
    expires_at: Instant,
}

pub struct SessionCache {
    http: reqwest::Client,
    introspection_url: String,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SessionCache {
    pub fn new(kratos_public_url: &str, ttl_ms: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            introspection_url: format!("{}/sessions/whoami", kratos_public_url.trim_end_matches('/')),
            ttl: Duration::from_millis(ttl_ms),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `headers` to an `Identity`, hitting the introspection
    /// endpoint only on a cache miss or expiry.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let token = extract_session_token(headers).ok_or(ApiError::Unauthorized)?;

        if let Some(identity) = self.read(&token) {
            return Ok(identity);
        }

        let identity = self.introspect(&token).await?;
        self.write(token, identity.clone());
        Ok(identity)
    }

    fn read(&self, token: &str) -> Option<Identity> {
        let entries = self.entries.lock().expect("session cache poisoned");
        entries.get(token).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.identity.clone())
            } else {
                None
            }
        })
    }

    fn write(&self, token: String, identity: Identity) {
        let mut entries = self.entries.lock().expect("session cache poisoned");
        entries.insert(
            token,
            CacheEntry {
                identity,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drops a cached entry immediately, e.g. on a `401` from a downstream
    /// call that relied on it (the cached session outlived the real one).
    pub fn invalidate(&self, token: &str) {
        self.entries.lock().expect("session cache poisoned").remove(token);
    }

    async fn introspect(&self, token: &str) -> Result<Identity, ApiError> {
        let response = self
            .http
            .get(&self.introspection_url)
            .header(SESSION_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("session introspection request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthorized);
        }

        let body: WhoamiResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("malformed session introspection response: {e}")))?;

        Ok(Identity {
            identity_id: body.identity.id,
            traits: body.identity.traits,
        })
    }
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(SESSION_TOKEN_HEADER) {
        if let Ok(s) = value.to_str() {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }

    let cookie_header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE_NAME && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                axum::http::HeaderValue::from_str(v).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn prefers_header_token_over_cookie() {
        let headers = headers_with(&[
            (SESSION_TOKEN_HEADER, "header-token"),
            ("cookie", "mo_session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let headers = headers_with(&[("cookie", "other=1; mo_session=cookie-token; more=2")]);
        assert_eq!(extract_session_token(&headers).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn missing_token_is_none() {
        let headers = headers_with(&[]);
        assert!(extract_session_token(&headers).is_none());
    }
}
