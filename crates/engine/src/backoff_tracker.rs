//! Per-loop backoff bookkeeping (§4.5): wraps the pure functions in
//! `eventsync_core::backoff` with the "current value" state each loop needs
//! to carry between failures, and resets on success.

use eventsync_core::backoff::{next_backoff_ms, with_jitter};
use rand::thread_rng;

#[derive(Debug, Default)]
pub struct BackoffTracker {
    current_ms: u64,
}

impl BackoffTracker {
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Advances the backoff and returns the jittered sleep duration for this
    /// failure.
    pub fn next(&mut self) -> std::time::Duration {
        self.current_ms = next_backoff_ms(self.current_ms);
        let jittered = with_jitter(self.current_ms, &mut thread_rng());
        std::time::Duration::from_millis(jittered)
    }

    /// §4.5 "Reset \[pull|push\] backoff on success."
    pub fn reset(&mut self) {
        self.current_ms = 0;
    }
}
