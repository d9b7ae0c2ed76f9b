//! crates/tutor_core/src/resilience/offline_queue.rs
//!
//! The persisted queue of side-effects that could not be delivered.
//!
//! An action leaves the queue only after a successful replay. A sync pass
//! takes the whole queue, replays it strictly in order, and appends every
//! failed action back onto the live queue, so one pass touches each
//! pre-sync action exactly once and failures wait for the next pass.
//! There is no retry cap.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{OfflineAction, OfflineActionKind};
use crate::ports::{Clock, PortResult, SlotStore};

/// Delivers one queued action.
#[async_trait]
pub trait ActionReplayer: Send + Sync {
    async fn replay(&self, action: &OfflineAction) -> PortResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub replayed: usize,
    pub deferred: usize,
    /// Set when the pass did not run (offline, or another pass in progress).
    pub skipped: bool,
}

impl SyncReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

pub struct OfflineQueue {
    slot_key: String,
    slots: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
    live: Mutex<Vec<OfflineAction>>,
    sync_gate: Mutex<()>,
}

impl OfflineQueue {
    /// Opens the queue stored under `slot_key`, restoring whatever a previous
    /// run left behind. A corrupt slot starts an empty queue.
    pub async fn load(slot_key: String, slots: Arc<dyn SlotStore>, clock: Arc<dyn Clock>) -> Self {
        let restored = match slots.get(&slot_key).await {
            Ok(Some(raw)) => serde_json::from_str::<Vec<OfflineAction>>(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable offline queue {}: {}", slot_key, e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read offline queue {}: {}", slot_key, e);
                Vec::new()
            }
        };
        if !restored.is_empty() {
            info!("Restored {} offline action(s) from {}", restored.len(), slot_key);
        }
        Self {
            slot_key,
            slots,
            clock,
            live: Mutex::new(restored),
            sync_gate: Mutex::new(()),
        }
    }

    pub async fn enqueue(&self, kind: OfflineActionKind) -> OfflineAction {
        let action = OfflineAction {
            id: Uuid::new_v4(),
            kind,
            queued_at: self.clock.now(),
        };
        let mut live = self.live.lock().await;
        live.push(action.clone());
        self.persist(&live).await;
        debug!(action_id = %action.id, queued = live.len(), "Offline action queued.");
        action
    }

    pub async fn len(&self) -> usize {
        self.live.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.live.lock().await.is_empty()
    }

    /// A copy of the live queue, in order.
    pub async fn pending(&self) -> Vec<OfflineAction> {
        self.live.lock().await.clone()
    }

    /// Replays the queue once. Connectivity is the caller's concern.
    pub async fn sync(&self, replayer: &dyn ActionReplayer) -> SyncReport {
        let Ok(_gate) = self.sync_gate.try_lock() else {
            debug!("Sync already in progress; skipping.");
            return SyncReport::skipped();
        };

        let pending = {
            let mut live = self.live.lock().await;
            let pending = std::mem::take(&mut *live);
            self.persist(&live).await;
            pending
        };

        let mut report = SyncReport {
            attempted: pending.len(),
            ..SyncReport::default()
        };
        for action in pending {
            match replayer.replay(&action).await {
                Ok(()) => report.replayed += 1,
                Err(e) => {
                    warn!(action_id = %action.id, "Replay failed, deferring: {}", e);
                    report.deferred += 1;
                    let mut live = self.live.lock().await;
                    live.push(action);
                    self.persist(&live).await;
                }
            }
        }
        info!(
            attempted = report.attempted,
            replayed = report.replayed,
            deferred = report.deferred,
            "Offline queue sync finished."
        );
        report
    }

    async fn persist(&self, live: &[OfflineAction]) {
        let result = match serde_json::to_string(live) {
            Ok(raw) => self.slots.put(&self.slot_key, &raw).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            // The in-memory queue stays authoritative until the next write succeeds.
            warn!("Failed to persist offline queue {}: {}", self.slot_key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HttpRequest;
    use crate::ports::PortError;
    use crate::testing::{ManualClock, MemorySlotStore};
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    /// Records replay order and fails the urls it was told to.
    #[derive(Default)]
    struct ScriptedReplayer {
        failing: HashSet<String>,
        seen: StdMutex<Vec<String>>,
    }

    impl ScriptedReplayer {
        fn failing(urls: &[&str]) -> Self {
            Self {
                failing: urls.iter().map(|u| u.to_string()).collect(),
                seen: StdMutex::default(),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ActionReplayer for ScriptedReplayer {
        async fn replay(&self, action: &OfflineAction) -> PortResult<()> {
            let OfflineActionKind::ApiReplay(request) = &action.kind else {
                return Ok(());
            };
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.url.clone());
            }
            if self.failing.contains(&request.url) {
                Err(PortError::Network("still down".into()))
            } else {
                Ok(())
            }
        }
    }

    fn replay(url: &str) -> OfflineActionKind {
        OfflineActionKind::ApiReplay(HttpRequest::get(url))
    }

    fn urls(actions: &[OfflineAction]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match &a.kind {
                OfflineActionKind::ApiReplay(r) => Some(r.url.clone()),
                OfflineActionKind::ErrorReport(_) => None,
            })
            .collect()
    }

    async fn queue(slots: Arc<MemorySlotStore>) -> OfflineQueue {
        OfflineQueue::load("queue:u1".into(), slots, Arc::new(ManualClock::epoch())).await
    }

    #[tokio::test]
    async fn sync_replays_in_order_and_keeps_failures_exactly_once() {
        let slots = Arc::new(MemorySlotStore::default());
        let queue = queue(slots.clone()).await;
        for url in ["a", "b", "c", "d"] {
            queue.enqueue(replay(url)).await;
        }

        let replayer = ScriptedReplayer::failing(&["b", "d"]);
        let report = queue.sync(&replayer).await;

        assert_eq!(replayer.seen(), vec!["a", "b", "c", "d"]);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.replayed, 2);
        assert_eq!(report.deferred, 2);
        assert_eq!(urls(&queue.pending().await), vec!["b", "d"]);
    }

    #[tokio::test]
    async fn failing_action_survives_repeated_syncs_without_cap() {
        let slots = Arc::new(MemorySlotStore::default());
        let queue = queue(slots).await;
        queue.enqueue(replay("stubborn")).await;

        let replayer = ScriptedReplayer::failing(&["stubborn"]);
        for _ in 0..10 {
            let report = queue.sync(&replayer).await;
            assert_eq!(report.attempted, 1);
        }
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn queue_is_persisted_and_restored() {
        let slots = Arc::new(MemorySlotStore::default());
        {
            let queue = queue(slots.clone()).await;
            queue.enqueue(replay("a")).await;
            queue.enqueue(replay("b")).await;
        }
        let reopened = queue(slots.clone()).await;
        assert_eq!(urls(&reopened.pending().await), vec!["a", "b"]);

        reopened.sync(&ScriptedReplayer::default()).await;
        let raw = slots.get("queue:u1").await.expect("read").expect("present");
        assert_eq!(raw, "[]");
    }

    #[tokio::test]
    async fn corrupt_slot_starts_empty() {
        let slots = Arc::new(MemorySlotStore::default());
        slots.put("queue:u1", "not json").await.expect("write");
        assert!(queue(slots).await.is_empty().await);
    }
}
