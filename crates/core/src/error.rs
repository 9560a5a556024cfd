//! Shared error taxonomy (§7). Each concrete error type in the transport,
//! engine, and server crates maps into one of these kinds via a `kind()`
//! accessor, so the client's `SyncError` and the server's `ApiError` agree on
//! the same stable vocabulary without sharing a single error enum.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    Validation,
    Auth,
    Conflict,
    Protocol,
    Transport,
    Internal,
}

impl SyncErrorKind {
    /// The stable code attached to the client-facing `SyncError` (§7: "a
    /// stable code (`server`, `network`, `conflict`, `protocol`, `auth`)").
    /// `Validation` and `Internal` both surface as `server` to the client,
    /// since neither is actionable by retrying with different input.
    pub fn client_code(&self) -> &'static str {
        match self {
            SyncErrorKind::Validation | SyncErrorKind::Internal => "server",
            SyncErrorKind::Auth => "auth",
            SyncErrorKind::Conflict => "conflict",
            SyncErrorKind::Protocol => "protocol",
            SyncErrorKind::Transport => "network",
        }
    }

    /// Whether the client engine should retry this class of failure with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncErrorKind::Transport | SyncErrorKind::Internal)
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.client_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_codes_match_spec_vocabulary() {
        assert_eq!(SyncErrorKind::Conflict.client_code(), "conflict");
        assert_eq!(SyncErrorKind::Protocol.client_code(), "protocol");
        assert_eq!(SyncErrorKind::Transport.client_code(), "network");
        assert_eq!(SyncErrorKind::Auth.client_code(), "auth");
        assert_eq!(SyncErrorKind::Validation.client_code(), "server");
    }

    #[test]
    fn only_transport_and_internal_are_retryable() {
        assert!(SyncErrorKind::Transport.is_retryable());
        assert!(SyncErrorKind::Internal.is_retryable());
        assert!(!SyncErrorKind::Conflict.is_retryable());
        assert!(!SyncErrorKind::Protocol.is_retryable());
        assert!(!SyncErrorKind::Auth.is_retryable());
    }
}
