//! crates/tutor_core/src/resilience/fetch.rs
//!
//! Wraps the raw `Transport` so that a request which fails, or which comes back
//! unsuccessful while offline, is queued for replay instead of being lost.
//! The failure is still returned to the caller.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::connectivity::Connectivity;
use super::offline_queue::OfflineQueue;
use crate::domain::{HttpRequest, HttpResponse, OfflineActionKind};
use crate::ports::{PortError, PortResult, Transport};

pub struct ResilientFetch {
    transport: Arc<dyn Transport>,
    queue: Arc<OfflineQueue>,
    connectivity: Connectivity,
}

impl ResilientFetch {
    pub fn new(transport: Arc<dyn Transport>, queue: Arc<OfflineQueue>, connectivity: Connectivity) -> Self {
        Self {
            transport,
            queue,
            connectivity,
        }
    }

    pub async fn fetch(&self, request: HttpRequest) -> PortResult<HttpResponse> {
        match self.transport.send(&request).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => {
                if !self.connectivity.is_online() {
                    self.defer(request).await;
                }
                Err(PortError::Http {
                    status: response.status,
                    body: response.body,
                })
            }
            Err(e) => {
                self.defer(request).await;
                Err(e)
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: String) -> PortResult<T> {
        let response = self.fetch(HttpRequest::get(url)).await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, url: String, body: &B) -> PortResult<T> {
        let request = HttpRequest::post_json(url, serde_json::to_string(body)?);
        let response = self.fetch(request).await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    async fn defer(&self, request: HttpRequest) {
        warn!(method = ?request.method, url = %request.url, "Request failed; queued for replay.");
        self.queue.enqueue(OfflineActionKind::ApiReplay(request)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MemorySlotStore, ScriptedTransport};

    async fn setup(online: bool) -> (ResilientFetch, Arc<OfflineQueue>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let queue = Arc::new(
            OfflineQueue::load(
                "queue:u1".into(),
                Arc::new(MemorySlotStore::default()),
                Arc::new(ManualClock::epoch()),
            )
            .await,
        );
        let fetch = ResilientFetch::new(transport.clone(), queue.clone(), Connectivity::new(online));
        (fetch, queue, transport)
    }

    #[tokio::test]
    async fn success_passes_through_without_queueing() {
        let (fetch, queue, transport) = setup(true).await;
        transport.respond("http://api/ok", 200, "{\"n\":1}");

        let value: serde_json::Value = fetch.get_json("http://api/ok".into()).await.expect("ok");
        assert_eq!(value["n"], 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn transport_failure_is_queued_and_still_returned() {
        let (fetch, queue, transport) = setup(true).await;
        transport.fail("http://api/down");

        let request = HttpRequest::post_json("http://api/down", "{\"a\":1}".into());
        let err = fetch.fetch(request.clone()).await.expect_err("should fail");
        assert!(err.is_connectivity());

        let pending = queue.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, OfflineActionKind::ApiReplay(request));
    }

    #[tokio::test]
    async fn non_success_is_queued_only_while_offline() {
        let (fetch, queue, transport) = setup(true).await;
        transport.respond("http://api/teapot", 503, "busy");

        let err = fetch.fetch(HttpRequest::get("http://api/teapot")).await.expect_err("503");
        assert_eq!(err, PortError::Http { status: 503, body: "busy".into() });
        assert!(queue.is_empty().await);

        fetch.connectivity.set_online(false);
        let _ = fetch.fetch(HttpRequest::get("http://api/teapot")).await;
        assert_eq!(queue.len().await, 1);
    }
}
