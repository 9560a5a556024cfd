//! Engine state machine (§4.5 "Engine state machine").

use std::sync::Arc;
use std::time::SystemTime;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    Pull,
    Push,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    Idle,
    Syncing {
        direction: SyncDirection,
    },
    Error {
        error: SyncError,
        retry_at: SystemTime,
        /// Preserved across error transitions so a host UI can show
        /// staleness even while retries are failing (§4.5).
        last_success_at: Option<SystemTime>,
    },
}

/// Observer callback fired on every status transition (§4.5).
pub trait StatusObserver: Send + Sync {
    fn on_status_changed(&self, status: &EngineStatus);
}

impl<F: Fn(&EngineStatus) + Send + Sync> StatusObserver for F {
    fn on_status_changed(&self, status: &EngineStatus) {
        self(status)
    }
}

/// Shared, lock-protected status cell the two loops report into. Kept tiny
/// and synchronous (a `std::sync::Mutex`) since transitions are infrequent
/// and never held across an await point.
pub struct StatusCell {
    inner: std::sync::Mutex<(EngineStatus, Option<SystemTime>)>,
    observer: Option<Arc<dyn StatusObserver>>,
}

impl StatusCell {
    pub fn new(observer: Option<Arc<dyn StatusObserver>>) -> Self {
        Self {
            inner: std::sync::Mutex::new((EngineStatus::Idle, None)),
            observer,
        }
    }

    pub fn current(&self) -> EngineStatus {
        self.inner.lock().expect("status mutex poisoned").0.clone()
    }

    pub fn set_syncing(&self, direction: SyncDirection) {
        self.transition(EngineStatus::Syncing { direction });
    }

    pub fn set_idle(&self) {
        let now = SystemTime::now();
        {
            let mut guard = self.inner.lock().expect("status mutex poisoned");
            guard.1 = Some(now);
        }
        self.transition(EngineStatus::Idle);
    }

    pub fn set_error(&self, error: SyncError, retry_at: SystemTime) {
        let last_success_at = self.inner.lock().expect("status mutex poisoned").1;
        self.transition(EngineStatus::Error {
            error,
            retry_at,
            last_success_at,
        });
    }

    fn transition(&self, status: EngineStatus) {
        {
            let mut guard = self.inner.lock().expect("status mutex poisoned");
            guard.0 = status.clone();
        }
        if let Some(observer) = &self.observer {
            observer.on_status_changed(&status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn last_success_at_survives_error_transition() {
        let cell = StatusCell::new(None);
        cell.set_idle();
        let EngineStatus::Idle = cell.current() else {
            panic!("expected idle");
        };

        cell.set_error(SyncError::transport("boom"), SystemTime::now());
        match cell.current() {
            EngineStatus::Error { last_success_at, .. } => assert!(last_success_at.is_some()),
            _ => panic!("expected error status"),
        }
    }

    #[test]
    fn observer_fires_on_every_transition() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let cell = StatusCell::new(Some(Arc::new(move |_: &EngineStatus| {
            count2.fetch_add(1, Ordering::SeqCst);
        })));
        cell.set_syncing(SyncDirection::Pull);
        cell.set_idle();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
