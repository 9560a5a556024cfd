//! `SyncTransport`: the engine's narrow interface onto the wire (§4.5,
//! §9 "dynamic dispatch... implement as trait/interface objects"). A concrete
//! implementation (e.g. `eventsync-transport`'s HTTP client) owns framing,
//! auth headers, and cancellation; the engine only calls through this trait.

use async_trait::async_trait;
use eventsync_core::model::{PullResponseBody, PushEventInput, PushResult};

use crate::error::Result;

#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(
        &self,
        store_id: &str,
        expected_head: i64,
        events: Vec<PushEventInput>,
    ) -> Result<PushResult>;

    async fn pull(
        &self,
        store_id: &str,
        since: i64,
        limit: u32,
        wait_ms: u64,
    ) -> Result<PullResponseBody>;
}
