//! `SyncEngine` (§4.5): wires the pull loop and push loop together behind a
//! single `start()`/`stop()`/`request_push()`/`status()` surface, plus the
//! local-DB-change debounce timer (§4.5 "Trigger sources").

use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::local_log::LocalLog;
use crate::pull_loop::{self, PullLoopDeps};
use crate::push_loop::{self, PushLoopDeps};
use crate::rebase_hook::RebaseHook;
use crate::signal::{PullCoordinator, PushSignal};
use crate::state::{EngineStatus, StatusCell, StatusObserver};
use crate::stop::Stopper;
use crate::transport::SyncTransport;

pub struct SyncEngineDeps {
    pub store_id: String,
    pub config: EngineConfig,
    pub transport: Arc<dyn SyncTransport>,
    pub local_log: Arc<dyn LocalLog>,
    pub rebase_hook: Arc<dyn RebaseHook>,
    pub status_observer: Option<Arc<dyn StatusObserver>>,
}

/// A running engine instance: two cooperative tasks (pull, push) and one
/// debounce timer, all stoppable through a single `Stopper` (§5 "Client").
pub struct SyncEngine {
    status: Arc<StatusCell>,
    signal: PushSignal,
    stopper: Stopper,
    handles: Vec<JoinHandle<()>>,
    debounce_handle: Option<JoinHandle<()>>,
}

impl SyncEngine {
    /// Builds and immediately starts the engine (§4.5 "initial kick at
    /// `start()`" — the push signal is armed once up front).
    pub fn start(deps: SyncEngineDeps) -> Self {
        let status = Arc::new(StatusCell::new(deps.status_observer));
        let signal = PushSignal::new();
        let pull_coordinator = PullCoordinator::new();
        let stopper = Stopper::new();
        let last_known_head = Arc::new(AtomicI64::new(-1));

        let pull_deps = PullLoopDeps {
            store_id: deps.store_id.clone(),
            config: deps.config,
            transport: deps.transport.clone(),
            local_log: deps.local_log.clone(),
            rebase_hook: deps.rebase_hook.clone(),
            status: status.clone(),
            coordinator: pull_coordinator.clone(),
            stopper: stopper.clone(),
            last_known_head: last_known_head.clone(),
        };
        let push_deps = PushLoopDeps {
            store_id: deps.store_id,
            config: deps.config,
            transport: deps.transport,
            local_log: deps.local_log,
            rebase_hook: deps.rebase_hook,
            status: status.clone(),
            signal: signal.clone(),
            pull_coordinator,
            stopper: stopper.clone(),
            last_known_head,
        };

        let pull_handle = tokio::spawn(pull_loop::run(pull_deps));
        let push_handle = tokio::spawn(push_loop::run(push_deps));

        // Initial kick: the push loop's first wait-select resolves
        // immediately rather than waiting out a full `pushIntervalMs`.
        signal.request();

        Self {
            status,
            signal,
            stopper,
            handles: vec![pull_handle, push_handle],
            debounce_handle: None,
        }
    }

    /// §4.5 trigger source (b): a local-DB-change subscription debounced by
    /// `pushDebounceMs`. Call this from the host's change-notification
    /// callback; repeated calls within the debounce window collapse to a
    /// single signal.
    pub fn notify_local_change(&mut self, debounce: Duration) {
        if let Some(handle) = self.debounce_handle.take() {
            handle.abort();
        }
        let signal = self.signal.clone();
        self.debounce_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            signal.request();
        }));
    }

    /// §4.5 trigger source (c): `requestPush()`.
    pub fn request_push(&self) {
        self.signal.request();
    }

    pub fn status(&self) -> EngineStatus {
        self.status.current()
    }

    /// §5 "Cancellation": signals both loops to exit at their next
    /// suspension point and awaits their completion.
    pub async fn stop(mut self) {
        self.stopper.stop();
        if let Some(handle) = self.debounce_handle.take() {
            handle.abort();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}
