//! Tauri-managed application state: the local SQLite log pool and the
//! (optionally running) `SyncEngine` instance.

use std::sync::Arc;

use eventsync_engine::{SyncEngine, SyncEngineDeps};
use eventsync_storage::{SqliteLocalLog, SqlitePool, SqliteRebaseHook};
use eventsync_transport::HttpSyncTransport;
use tokio::sync::Mutex;

pub struct AppState {
    pub storage_pool: SqlitePool,
    pub server_base_url: String,
    pub store_id: String,
    session_token: Mutex<Option<String>>,
    engine: Mutex<Option<SyncEngine>>,
}

impl AppState {
    pub fn new(storage_pool: SqlitePool, server_base_url: String, store_id: String) -> Self {
        Self {
            storage_pool,
            server_base_url,
            store_id,
            session_token: Mutex::new(None),
            engine: Mutex::new(None),
        }
    }

    pub async fn set_session_token(&self, token: String) {
        *self.session_token.lock().await = Some(token);
    }

    pub async fn start_engine(&self) -> Result<(), String> {
        let token = self
            .session_token
            .lock()
            .await
            .clone()
            .ok_or("no session token set; call sync_set_session_token first")?;

        let mut guard = self.engine.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let transport = Arc::new(HttpSyncTransport::new(&self.server_base_url, token));
        let local_log = Arc::new(SqliteLocalLog::new(self.storage_pool.clone()));
        let rebase_hook = Arc::new(SqliteRebaseHook::new(self.storage_pool.clone()));

        let deps = SyncEngineDeps {
            store_id: self.store_id.clone(),
            config: eventsync_core::config::SyncEngineConfig::default(),
            transport,
            local_log,
            rebase_hook,
            status_observer: None,
        };

        *guard = Some(SyncEngine::start(deps));
        tracing::info!(store_id = %self.store_id, "sync engine started");
        Ok(())
    }

    pub async fn stop_engine(&self) -> Result<(), String> {
        let engine = self.engine.lock().await.take();
        if let Some(engine) = engine {
            engine.stop().await;
            tracing::info!(store_id = %self.store_id, "sync engine stopped");
        }
        Ok(())
    }

    pub async fn request_push(&self) -> Result<(), String> {
        let guard = self.engine.lock().await;
        match guard.as_ref() {
            Some(engine) => {
                engine.request_push();
                Ok(())
            }
            None => Err("sync engine is not running".to_string()),
        }
    }

    pub async fn status(&self) -> Result<eventsync_engine::EngineStatus, String> {
        let guard = self.engine.lock().await;
        match guard.as_ref() {
            Some(engine) => Ok(engine.status()),
            None => Err("sync engine is not running".to_string()),
        }
    }
}
