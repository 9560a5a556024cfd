//! Postgres-backed persistence for the Sync Event Store and Sharing Ledger
//! (§4.1-§4.4), plus the `SyncService` that composes them with the
//! Ownership Enforcer and an injected `AccessPolicy`.

pub mod access;
pub mod db;
pub mod error;
pub mod event_store;
pub mod ledger;
pub mod models;
pub mod ownership;
pub mod schema;
pub mod service;

pub use access::{AccessPolicy, OwnerOnlyAccessPolicy};
pub use db::{create_pool, get_connection, PgPool, PgPooledConnection};
pub use error::{Result, StoreError};
pub use service::SyncService;

const MIGRATIONS: diesel_migrations::EmbeddedMigrations = diesel_migrations::embed_migrations!("migrations");

/// Runs pending migrations against `conn`. Intended for process startup and
/// for the integration-test harness (not for the client's local SQLite log,
/// which lives in `eventsync-storage`).
pub fn run_pending_migrations(
    conn: &mut diesel::pg::PgConnection,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use diesel_migrations::MigrationHarness;
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}
