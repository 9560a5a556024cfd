//! Shared process state handed to every handler via `axum::extract::State`.

use std::sync::Arc;

use eventsync_server_store::{create_pool, OwnerOnlyAccessPolicy, PgPool, SyncService};

use crate::config::ServerConfig;
use crate::session::SessionCache;

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncService>,
    /// The same pool `sync` was built from. The Sharing Ledger read/append
    /// functions in `eventsync_server_store::ledger` take a connection
    /// directly rather than going through `SyncService`, so handlers for the
    /// sharing endpoints (§6) borrow the pool here instead.
    pub pool: PgPool,
    pub sessions: Arc<SessionCache>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let pool = create_pool(&config.database_url, 10)?;
        let access = Arc::new(OwnerOnlyAccessPolicy {
            allow_reset: config.dev_reset_allowed(),
        });
        let sessions = Arc::new(SessionCache::new(&config.kratos_public_url, config.session_cache_ttl_ms));

        Ok(Self {
            sync: Arc::new(SyncService::new(pool.clone(), access)),
            pool,
            sessions,
            config: Arc::new(config),
        })
    }
}
