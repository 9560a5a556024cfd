//! SQLite-backed implementation of the client's local durable log (§4.5
//! "Local tables (abstract)") for `eventsync-engine`.

pub mod db;
pub mod error;
pub mod local_log;
pub mod models;
pub mod rebase_hook;
pub mod schema;

pub use db::{open, SqlitePool, SqlitePooledConnection};
pub use error::{Result, StorageError};
pub use local_log::SqliteLocalLog;
pub use rebase_hook::SqliteRebaseHook;
