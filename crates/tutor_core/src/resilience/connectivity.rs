//! crates/tutor_core/src/resilience/connectivity.rs

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared online/offline flag. The presentation layer feeds it from the
/// browser's connectivity events; the core only reads and watches it.
#[derive(Clone, Debug)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns true when the flag actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed.");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_transitions_only() {
        let connectivity = Connectivity::new(true);
        let mut rx = connectivity.subscribe();

        assert!(!connectivity.set_online(true));
        assert!(connectivity.set_online(false));
        rx.changed().await.expect("sender alive");
        assert!(!*rx.borrow_and_update());
        assert!(!connectivity.is_online());
    }
}
