//! Connection pool setup for the client's local SQLite log.

use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;

use crate::error::{Result, StorageError};

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type SqlitePooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const MIGRATIONS: diesel_migrations::EmbeddedMigrations = diesel_migrations::embed_migrations!("migrations");

/// Opens (creating if absent) the local log database at `database_url` and
/// runs pending migrations. A single connection in the pool is sufficient:
/// the engine never issues two concurrent pulls or two concurrent pushes
/// (§5 "Client"), and SQLite serializes writers regardless.
pub fn open(database_url: &str) -> Result<SqlitePool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder().max_size(4).build(manager).map_err(StorageError::from)?;

    {
        use diesel_migrations::MigrationHarness;
        let mut conn = pool.get().map_err(StorageError::from)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StorageError::Migration(e.to_string()))?;
    }

    Ok(pool)
}

pub fn get_connection(pool: &SqlitePool) -> Result<SqlitePooledConnection> {
    pool.get().map_err(StorageError::from)
}
