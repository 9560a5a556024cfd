//! `SyncError` (§7): the single error type that crosses the engine's public
//! API. No exception escapes the two loops — every failure is mapped here
//! and surfaced through the status observer instead.

use eventsync_core::SyncErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Protocol, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Transport, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Conflict, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Auth, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Internal, message)
    }

    /// The stable code attached for host applications (§7): `server`,
    /// `network`, `conflict`, `protocol`, `auth`.
    pub fn code(&self) -> &'static str {
        self.kind.client_code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
