//! Connection pool setup for the Postgres-backed sync server.

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use crate::error::{Result, StoreError};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Builds the r2d2-backed connection pool. `max_size` mirrors the HTTP
/// server's worker-pool size (§5: "each HTTP request is handled on a worker
/// from a shared pool").
pub fn create_pool(database_url: &str, max_size: u32) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(StoreError::from)
}

pub fn get_connection(pool: &PgPool) -> Result<PgPooledConnection> {
    pool.get().map_err(StoreError::from)
}
