//! Error types for the Postgres-backed event store and sharing ledger.

use eventsync_core::SyncErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("store {store_id} already has owner {existing_owner}, not {requested_owner}")]
    AccessDenied {
        store_id: String,
        existing_owner: String,
        requested_owner: String,
    },

    #[error("head mismatch: current={current}, expected={expected}")]
    HeadMismatch { current: i64, expected: i64 },

    #[error("hash-chain violation: {0}")]
    ChainViolation(#[from] eventsync_core::hash_chain::ChainError),

    #[error("store has not been provisioned: {0}")]
    StoreNotProvisioned(String),

    #[error("dev reset is disabled in this environment")]
    ResetDisabled,

    #[error("failed to encode ledger payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            StoreError::Database(_) | StoreError::Pool(_) => SyncErrorKind::Internal,
            StoreError::AccessDenied { .. } => SyncErrorKind::Auth,
            StoreError::HeadMismatch { .. } | StoreError::ChainViolation(_) => SyncErrorKind::Conflict,
            StoreError::StoreNotProvisioned(_) => SyncErrorKind::Validation,
            StoreError::ResetDisabled => SyncErrorKind::Auth,
            StoreError::Encoding(_) => SyncErrorKind::Validation,
        }
    }

    /// True for errors a caller can usefully retry (transient Postgres errors,
    /// pool exhaustion) as opposed to ones that require rebuilding the request
    /// (conflicts, access denial).
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(diesel::result::Error::DatabaseError(kind, _)) => matches!(
                kind,
                diesel::result::DatabaseErrorKind::SerializationFailure
                    | diesel::result::DatabaseErrorKind::ReadOnlyTransaction
            ),
            StoreError::Pool(_) => true,
            _ => false,
        }
    }
}
