//! Cross-loop signaling (§4.5, §9 "use channels/condition variables for
//! `requestPush()` and `requestImmediatePull()` signals").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// Wakes the push loop: `requestPush()`, the debounce timer, and the
/// post-success "more pending remain" re-arm all go through this.
#[derive(Clone)]
pub struct PushSignal {
    notify: Arc<Notify>,
}

impl PushSignal {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn request(&self) {
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Default for PushSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinates `requestImmediatePull()` and "await any in-flight pull"
/// (§4.5 push loop step 5, §5 ordering guarantees) without the push loop
/// reaching into the pull loop's internals.
#[derive(Clone)]
pub struct PullCoordinator {
    immediate: Arc<Notify>,
    completed: watch::Sender<u64>,
    in_flight: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl PullCoordinator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            immediate: Arc::new(Notify::new()),
            completed: tx,
            in_flight: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.completed.subscribe()
    }

    /// Called by the pull loop around one full cycle.
    pub fn mark_in_flight(&self) {
        self.in_flight.store(true, Ordering::SeqCst);
    }

    pub fn mark_completed(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.completed.send(gen);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The pull loop awaits this between ticks so `requestImmediatePull()`
    /// short-circuits its normal `pullIntervalMs` cadence.
    pub async fn wait_for_immediate_or(&self, timeout: std::time::Duration) {
        tokio::select! {
            _ = self.immediate.notified() => {}
            _ = tokio::time::sleep(timeout) => {}
        }
    }

    pub fn request_immediate_pull(&self) {
        self.immediate.notify_one();
    }

    /// §4.5 push loop step 5 (`server_ahead` without `missing[]`): await any
    /// currently in-flight pull, then request and await one fresh cycle.
    pub async fn await_in_flight_then_immediate_pull(&self) {
        let mut rx = self.subscribe();
        if self.is_in_flight() {
            let _ = rx.changed().await;
        }
        let before = *rx.borrow();
        self.request_immediate_pull();
        loop {
            if rx.changed().await.is_err() {
                return;
            }
            if *rx.borrow() != before {
                return;
            }
        }
    }
}

impl Default for PullCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
