//! Tauri command surface wrapping `SyncEngine` (§11 "Engine status/
//! introspection surface"), in this codebase's existing
//! `#[tauri::command] async fn(...) -> Result<T, String>` idiom.

use tauri::State;

use crate::state::AppState;
use eventsync_engine::{EngineStatus, SyncDirection};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatusDto {
    Idle,
    Syncing { direction: &'static str },
    Error { message: String, retryable: bool },
}

impl From<EngineStatus> for EngineStatusDto {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::Idle => EngineStatusDto::Idle,
            EngineStatus::Syncing { direction } => EngineStatusDto::Syncing {
                direction: match direction {
                    SyncDirection::Pull => "pull",
                    SyncDirection::Push => "push",
                },
            },
            EngineStatus::Error { error, .. } => EngineStatusDto::Error {
                message: error.to_string(),
                retryable: error.is_retryable(),
            },
        }
    }
}

#[tauri::command]
pub async fn sync_set_session_token(state: State<'_, AppState>, token: String) -> Result<(), String> {
    state.set_session_token(token).await;
    Ok(())
}

#[tauri::command]
pub async fn sync_start(state: State<'_, AppState>) -> Result<(), String> {
    state.start_engine().await
}

#[tauri::command]
pub async fn sync_stop(state: State<'_, AppState>) -> Result<(), String> {
    state.stop_engine().await
}

#[tauri::command]
pub async fn sync_request_push(state: State<'_, AppState>) -> Result<(), String> {
    state.request_push().await
}

#[tauri::command]
pub async fn sync_status(state: State<'_, AppState>) -> Result<EngineStatusDto, String> {
    state.status().await.map(EngineStatusDto::from)
}
