//! Re-exports the shared timing defaults (§4.5) so engine modules can refer
//! to `crate::config::EngineConfig` without every call site needing to know
//! the type lives in `eventsync-core`.

pub type EngineConfig = eventsync_core::config::SyncEngineConfig;
