mod commands;
mod state;

use state::AppState;

/// Reads `EVENTSYNC_SERVER_URL`/`EVENTSYNC_STORE_ID`/`EVENTSYNC_DB_PATH` at
/// startup the same way the server binary reads its own env (§10.3), rather
/// than hardcoding a dev default into the bundled app.
fn app_state_from_env() -> anyhow::Result<AppState> {
    let server_base_url = std::env::var("EVENTSYNC_SERVER_URL")
        .map_err(|_| anyhow::anyhow!("EVENTSYNC_SERVER_URL must be set"))?;
    let store_id = std::env::var("EVENTSYNC_STORE_ID")
        .map_err(|_| anyhow::anyhow!("EVENTSYNC_STORE_ID must be set"))?;
    let db_path = std::env::var("EVENTSYNC_DB_PATH").unwrap_or_else(|_| "eventsync.sqlite3".to_string());

    let pool = eventsync_storage::open(&db_path)?;
    Ok(AppState::new(pool, server_base_url, store_id))
}

pub fn run() {
    let state = app_state_from_env().expect("failed to initialize sync state");

    tauri::Builder::default()
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            commands::sync_set_session_token,
            commands::sync_start,
            commands::sync_stop,
            commands::sync_request_push,
            commands::sync_status,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
