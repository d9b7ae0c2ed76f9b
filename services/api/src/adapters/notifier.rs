//! services/api/src/adapters/notifier.rs
//!
//! Fans notifications out to every WebSocket a learner has open.

use tokio::sync::broadcast;
use tracing::debug;
use tutor_core::domain::Notification;
use tutor_core::ports::Notifier;

/// A notification addressed to one learner.
#[derive(Debug, Clone)]
pub struct LearnerNotice {
    pub user_id: String,
    pub notification: Notification,
}

/// The `Notifier` for one learner. All learners share one channel and each
/// socket filters on its own user id.
#[derive(Clone)]
pub struct BroadcastNotifier {
    user_id: String,
    tx: broadcast::Sender<LearnerNotice>,
}

impl BroadcastNotifier {
    pub fn new(user_id: &str, tx: broadcast::Sender<LearnerNotice>) -> Self {
        Self {
            user_id: user_id.to_string(),
            tx,
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        let notice = LearnerNotice {
            user_id: self.user_id.clone(),
            notification,
        };
        // No open socket is not an error; the entry is still in the error log.
        if self.tx.send(notice).is_err() {
            debug!(user = %self.user_id, "No listeners for notification.");
        }
    }
}
