//! Error type for the client's local SQLite log.

use eventsync_core::SyncErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("migration error: {0}")]
    Migration(String),
}

impl StorageError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            StorageError::Database(_) | StorageError::Pool(_) | StorageError::Migration(_) => {
                SyncErrorKind::Internal
            }
        }
    }
}

/// Maps a storage failure onto the engine's error type, so `LocalLog`
/// implementations can use `?` against `eventsync_engine::Result`.
impl From<StorageError> for eventsync_engine::SyncError {
    fn from(err: StorageError) -> Self {
        eventsync_engine::SyncError::new(err.kind(), err.to_string())
    }
}
