//! Timing parameters for the client sync engine (§4.5 "Timing parameters (defaults)").
//!
//! Kept as a plain config struct, separate from the engine itself, so a host
//! application can override cadence without reaching into engine internals —
//! mirroring how this codebase's device-sync scheduler exposes its cadence as
//! named constants rather than hardcoding them in the loop.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEngineConfig {
    pub pull_limit: u32,
    pub pull_wait_ms: u64,
    pub pull_interval_ms: u64,
    pub push_batch_size: u32,
    pub push_interval_ms: u64,
    pub push_fallback_interval_ms: u64,
    pub push_debounce_ms: u64,
    pub max_push_retries: u32,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            pull_limit: 200,
            pull_wait_ms: 20_000,
            pull_interval_ms: 1_000,
            push_batch_size: 100,
            push_interval_ms: 2_000,
            push_fallback_interval_ms: 50,
            push_debounce_ms: 100,
            max_push_retries: 2,
        }
    }
}

/// Server-side long-poll clamp: `waitMs` is clamped into `[0, 25s]`, and the
/// poll loop itself ticks no faster than 50ms (§4.1 `pull`).
pub const SERVER_LONG_POLL_MAX_MS: u64 = 25_000;
pub const SERVER_POLL_INTERVAL_MIN_MS: u64 = 50;

/// Cap on `missing[]` attached to a `server_ahead` conflict response (§4.4).
pub const MAX_CONFLICT_MISSING_EVENTS: usize = 1_000;
