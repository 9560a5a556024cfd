//! `stop()` (§4.5, §5 "Cancellation"): signals both loops to exit at their
//! next suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone)]
pub struct Stopper {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Stopper {
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves immediately if already stopped, otherwise waits for `stop()`.
    pub async fn wait_stopped(&self) {
        if self.is_stopped() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for Stopper {
    fn default() -> Self {
        Self::new()
    }
}
