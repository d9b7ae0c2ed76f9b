//! crates/tutor_core/src/resilience/mod.rs
//!
//! The resilience layer: every component-boundary failure in the core ends up
//! in `ResilienceLayer::handle`, which logs it locally, reports it (or queues
//! the report while offline), notifies the presentation layer and kicks off
//! the category's automatic recovery.

pub mod connectivity;
pub mod error_log;
pub mod fetch;
pub mod offline_queue;
pub mod taxonomy;

pub use connectivity::Connectivity;
pub use error_log::{ErrorLog, ErrorLogEntry};
pub use fetch::ResilientFetch;
pub use offline_queue::{ActionReplayer, OfflineQueue, SyncReport};
pub use taxonomy::{render_message, AutoRecovery, CategorySpec};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    ErrorCategory, ErrorReport, Notification, OfflineAction, OfflineActionKind, Severity,
};
use crate::keys;
use crate::ports::{Clock, ErrorReporter, Notifier, PortError, PortResult, SlotStore, Transport};

//=========================================================================================
// Configuration
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// How long low/medium notifications stay on screen.
    pub auto_dismiss: Duration,
    /// The category silenced right after the user starts the related action.
    pub grace_category: ErrorCategory,
    pub grace_window: chrono::Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            auto_dismiss: Duration::from_secs(5),
            grace_category: ErrorCategory::TransientInput,
            grace_window: chrono::Duration::milliseconds(5000),
        }
    }
}

//=========================================================================================
// Handle Context and Outcome
//=========================================================================================

/// Re-runs the operation that failed.
pub type RetryHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// What the caller knows about a failure.
#[derive(Clone, Default)]
pub struct ErrorContext {
    /// Template placeholders and report context, e.g. `phrase`, `lesson_id`.
    pub fields: BTreeMap<String, String>,
    /// The payload that could not be delivered; cached locally when the
    /// category asks for it.
    pub payload: Option<serde_json::Value>,
    pub retry: Option<RetryHook>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn retry(mut self, hook: RetryHook) -> Self {
        self.retry = Some(hook);
        self
    }
}

impl std::fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorContext")
            .field("fields", &self.fields)
            .field("payload", &self.payload)
            .field("retry", &self.retry.is_some())
            .finish()
    }
}

/// A failure raised outside the core (speech recognition, audio playback,
/// microphone permission, script errors) and handed over as text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ReportedError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDelivery {
    Reported,
    Queued,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Inside the grace window; nothing was logged, reported or shown.
    Suppressed,
    Handled {
        entry: ErrorLogEntry,
        notification: Notification,
        delivery: ReportDelivery,
    },
}

impl HandleOutcome {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, HandleOutcome::Suppressed)
    }
}

//=========================================================================================
// The Layer
//=========================================================================================

pub struct ResilienceLayer {
    user_id: String,
    reporter: Arc<dyn ErrorReporter>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    slots: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
    connectivity: Connectivity,
    queue: Arc<OfflineQueue>,
    log: Mutex<ErrorLog>,
    action_started_at: Mutex<Option<DateTime<Utc>>>,
    config: ResilienceConfig,
}

impl ResilienceLayer {
    /// Builds the layer for one learner, restoring the persisted error log and
    /// offline queue.
    pub async fn load(
        user_id: &str,
        reporter: Arc<dyn ErrorReporter>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        slots: Arc<dyn SlotStore>,
        clock: Arc<dyn Clock>,
        connectivity: Connectivity,
        config: ResilienceConfig,
    ) -> Self {
        let queue = Arc::new(
            OfflineQueue::load(keys::offline_queue(user_id), slots.clone(), clock.clone()).await,
        );
        let log = match slots.get(&keys::error_log(user_id)).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ErrorLogEntry>>(&raw) {
                Ok(entries) => ErrorLog::restore(entries),
                Err(e) => {
                    warn!("Discarding unreadable error log: {}", e);
                    ErrorLog::default()
                }
            },
            Ok(None) => ErrorLog::default(),
            Err(e) => {
                warn!("Failed to read error log: {}", e);
                ErrorLog::default()
            }
        };

        Self {
            user_id: user_id.to_string(),
            reporter,
            transport,
            notifier,
            slots,
            clock,
            connectivity,
            queue,
            log: Mutex::new(log),
            action_started_at: Mutex::new(None),
            config,
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn queue(&self) -> Arc<OfflineQueue> {
        self.queue.clone()
    }

    /// A fetch wrapper sharing this layer's queue and connectivity flag.
    pub fn fetcher(&self) -> ResilientFetch {
        ResilientFetch::new(self.transport.clone(), self.queue.clone(), self.connectivity.clone())
    }

    /// Records that the user just started the action whose errors are
    /// subject to the grace period (e.g. pressed the microphone button).
    pub async fn mark_action_start(&self) {
        *self.action_started_at.lock().await = Some(self.clock.now());
    }

    pub async fn recent_errors(&self) -> Vec<ErrorLogEntry> {
        self.log.lock().await.entries()
    }

    async fn in_grace_period(&self, category: ErrorCategory) -> bool {
        if category != self.config.grace_category {
            return false;
        }
        match *self.action_started_at.lock().await {
            Some(started) => self.clock.now() - started < self.config.grace_window,
            None => false,
        }
    }

    pub async fn handle(
        &self,
        category: ErrorCategory,
        error: &(dyn std::error::Error + Send + Sync),
        context: ErrorContext,
    ) -> HandleOutcome {
        if self.in_grace_period(category).await {
            debug!(category = category.name(), "Suppressed inside grace period: {}", error);
            return HandleOutcome::Suppressed;
        }

        let spec = category.spec();
        let now = self.clock.now();
        let message = render_message(spec.message_template, &context.fields);

        // --- 1. Log first, so the record exists even fully offline ---
        let entry = ErrorLogEntry {
            id: Uuid::new_v4(),
            category,
            severity: spec.severity,
            message: message.clone(),
            error: error.to_string(),
            context: context.fields.clone(),
            timestamp: now,
        };
        match spec.severity {
            Severity::High => error!(category = spec.name, "{}: {}", message, error),
            _ => warn!(category = spec.name, "{}: {}", message, error),
        }
        self.append_log(entry.clone()).await;

        // --- 2. Report, or queue the report ---
        let report = ErrorReport {
            category: spec.name.to_string(),
            message: error.to_string(),
            stack: error.source().map(|s| s.to_string()),
            context: context.fields.clone(),
            timestamp: now,
        };
        let delivery = self.deliver_report(report).await;

        // --- 3. Notify ---
        let notification = Notification {
            id: Uuid::new_v4(),
            category,
            message,
            actions: spec.actions.to_vec(),
            severity: spec.severity,
            auto_dismiss_ms: match spec.severity {
                Severity::High => None,
                _ => Some(self.config.auto_dismiss.as_millis() as u64),
            },
        };
        self.notifier.notify(notification.clone());

        // --- 4. Automatic recovery ---
        for auto in spec.auto {
            match auto {
                AutoRecovery::RetryAfter(delay) => {
                    if let Some(hook) = context.retry.clone() {
                        let delay = *delay;
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            hook().await;
                        });
                    }
                }
                AutoRecovery::CacheTemporarily => {
                    if let Some(payload) = &context.payload {
                        self.cache_temporarily(payload).await;
                    }
                }
            }
        }

        HandleOutcome::Handled {
            entry,
            notification,
            delivery,
        }
    }

    /// The catch-all for failures nobody anticipated.
    pub async fn handle_uncaught(&self, error: &(dyn std::error::Error + Send + Sync)) -> HandleOutcome {
        self.handle(ErrorCategory::Uncaught, error, ErrorContext::new()).await
    }

    /// Runs a failure reported by the presentation layer through `handle`,
    /// grace period included.
    pub async fn handle_reported(
        &self,
        category: ErrorCategory,
        message: &str,
        fields: BTreeMap<String, String>,
    ) -> HandleOutcome {
        let context = ErrorContext {
            fields,
            ..ErrorContext::default()
        };
        self.handle(category, &ReportedError(message.to_string()), context)
            .await
    }

    /// Replays the offline queue, but only while online.
    pub async fn sync(&self) -> SyncReport {
        if !self.connectivity.is_online() {
            debug!("Offline; sync postponed.");
            return SyncReport::skipped();
        }
        let replayer = Replayer {
            reporter: self.reporter.clone(),
            transport: self.transport.clone(),
        };
        self.queue.sync(&replayer).await
    }

    /// Runs `sync` on every offline-to-online transition until cancelled.
    pub fn spawn_sync_on_reconnect(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let layer = self.clone();
        let mut rx = self.connectivity.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *rx.borrow_and_update();
                        if online {
                            info!("Connection restored; syncing offline queue.");
                            layer.sync().await;
                        }
                    }
                }
            }
        })
    }

    async fn append_log(&self, entry: ErrorLogEntry) {
        let tail = {
            let mut log = self.log.lock().await;
            log.push(entry);
            log.persisted_tail()
        };
        let result = match serde_json::to_string(&tail) {
            Ok(raw) => self.slots.put(&keys::error_log(&self.user_id), &raw).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Failed to persist error log: {}", e);
        }
    }

    async fn deliver_report(&self, report: ErrorReport) -> ReportDelivery {
        if self.connectivity.is_online() {
            match self.reporter.report(&report).await {
                Ok(()) => return ReportDelivery::Reported,
                Err(e) => warn!("Error report failed, queueing: {}", e),
            }
        }
        self.queue.enqueue(OfflineActionKind::ErrorReport(report)).await;
        ReportDelivery::Queued
    }

    async fn cache_temporarily(&self, payload: &serde_json::Value) {
        let key = keys::temp_cache(&self.user_id, self.clock.now().timestamp_millis());
        let result = match serde_json::to_string(payload) {
            Ok(raw) => self.slots.put(&key, &raw).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => info!("Cached failed payload under {}", key),
            Err(e) => warn!("Temporary cache write failed: {}", e),
        }
    }
}

/// Sends queued actions to where they were originally headed.
struct Replayer {
    reporter: Arc<dyn ErrorReporter>,
    transport: Arc<dyn Transport>,
}

#[async_trait]
impl ActionReplayer for Replayer {
    async fn replay(&self, action: &OfflineAction) -> PortResult<()> {
        match &action.kind {
            OfflineActionKind::ErrorReport(report) => self.reporter.report(report).await,
            OfflineActionKind::ApiReplay(request) => {
                let response = self.transport.send(request).await?;
                if response.is_success() {
                    Ok(())
                } else {
                    Err(PortError::Http {
                        status: response.status,
                        body: response.body,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HttpRequest, RecoveryAction};
    use crate::testing::{
        ManualClock, MemorySlotStore, RecordingNotifier, RecordingReporter, ScriptedTransport,
    };
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        layer: Arc<ResilienceLayer>,
        clock: Arc<ManualClock>,
        reporter: Arc<RecordingReporter>,
        notifier: Arc<RecordingNotifier>,
        transport: Arc<ScriptedTransport>,
        slots: Arc<MemorySlotStore>,
    }

    async fn harness(online: bool) -> Harness {
        let clock = Arc::new(ManualClock::epoch());
        let reporter = Arc::new(RecordingReporter::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let transport = Arc::new(ScriptedTransport::default());
        let slots = Arc::new(MemorySlotStore::default());
        let layer = ResilienceLayer::load(
            "u1",
            reporter.clone(),
            transport.clone(),
            notifier.clone(),
            slots.clone(),
            clock.clone(),
            Connectivity::new(online),
            ResilienceConfig::default(),
        )
        .await;
        Harness {
            layer: Arc::new(layer),
            clock,
            reporter,
            notifier,
            transport,
            slots,
        }
    }

    fn err(msg: &str) -> PortError {
        PortError::Unexpected(msg.to_string())
    }

    #[tokio::test]
    async fn handle_logs_reports_and_notifies_when_online() {
        let h = harness(true).await;
        let outcome = h
            .layer
            .handle(
                ErrorCategory::AudioUnavailable,
                &err("decode"),
                ErrorContext::new().with("phrase", "hola"),
            )
            .await;

        let HandleOutcome::Handled { entry, notification, delivery } = outcome else {
            panic!("expected handled");
        };
        assert_eq!(delivery, ReportDelivery::Reported);
        assert_eq!(entry.message, "Audio for \"hola\" is not available right now.");
        assert_eq!(notification.actions, vec![RecoveryAction::Retry, RecoveryAction::Continue]);
        assert_eq!(notification.auto_dismiss_ms, Some(5000));
        assert_eq!(h.reporter.reports().len(), 1);
        assert_eq!(h.reporter.reports()[0].category, "audio-unavailable");
        assert_eq!(h.notifier.notifications().len(), 1);
        assert_eq!(h.layer.recent_errors().await.len(), 1);
        assert!(h.slots.get("errors:u1").await.expect("read").is_some());
    }

    #[tokio::test]
    async fn offline_report_is_queued_after_logging() {
        let h = harness(false).await;
        let outcome = h
            .layer
            .handle(ErrorCategory::ConnectivityLost, &err("offline"), ErrorContext::new())
            .await;

        let HandleOutcome::Handled { delivery, .. } = outcome else {
            panic!("expected handled");
        };
        assert_eq!(delivery, ReportDelivery::Queued);
        assert!(h.reporter.reports().is_empty());
        assert_eq!(h.layer.recent_errors().await.len(), 1);
        let pending = h.layer.queue().pending().await;
        assert!(matches!(pending[0].kind, OfflineActionKind::ErrorReport(_)));
    }

    #[tokio::test]
    async fn failed_report_while_online_is_queued() {
        let h = harness(true).await;
        h.reporter.set_failing(true);
        let outcome = h
            .layer
            .handle(ErrorCategory::RecognitionTimeout, &err("timeout"), ErrorContext::new())
            .await;
        assert!(matches!(
            outcome,
            HandleOutcome::Handled { delivery: ReportDelivery::Queued, .. }
        ));
        assert_eq!(h.layer.queue().len().await, 1);
    }

    #[tokio::test]
    async fn high_severity_notification_does_not_auto_dismiss() {
        let h = harness(true).await;
        h.layer.handle_uncaught(&err("boom")).await;
        let notification = &h.notifier.notifications()[0];
        assert_eq!(notification.severity, Severity::High);
        assert_eq!(notification.auto_dismiss_ms, None);
        assert_eq!(notification.actions, vec![RecoveryAction::Reload]);
    }

    #[tokio::test]
    async fn grace_period_suppresses_just_inside_the_window() {
        let h = harness(true).await;
        h.layer.mark_action_start().await;
        h.clock.advance_ms(4999);

        let outcome = h
            .layer
            .handle(ErrorCategory::TransientInput, &err("no speech"), ErrorContext::new())
            .await;

        assert!(outcome.is_suppressed());
        assert!(h.notifier.notifications().is_empty());
        assert!(h.reporter.reports().is_empty());
        assert!(h.layer.recent_errors().await.is_empty());
    }

    #[tokio::test]
    async fn grace_period_lets_errors_through_just_outside_the_window() {
        let h = harness(true).await;
        h.layer.mark_action_start().await;
        h.clock.advance_ms(5001);

        let outcome = h
            .layer
            .handle(ErrorCategory::TransientInput, &err("no speech"), ErrorContext::new())
            .await;

        assert!(!outcome.is_suppressed());
        assert_eq!(h.notifier.notifications().len(), 1);
        assert_eq!(h.layer.recent_errors().await.len(), 1);
    }

    #[tokio::test]
    async fn grace_period_only_covers_its_category() {
        let h = harness(true).await;
        h.layer.mark_action_start().await;
        h.clock.advance_ms(10);
        let outcome = h
            .layer
            .handle(ErrorCategory::PermissionDenied, &err("denied"), ErrorContext::new())
            .await;
        assert!(!outcome.is_suppressed());
    }

    #[tokio::test]
    async fn reported_speech_failure_uses_its_fields_and_the_grace_period() {
        let h = harness(true).await;
        let fields = BTreeMap::from([("phrase".to_string(), "un café".to_string())]);

        h.layer.mark_action_start().await;
        h.clock.advance_ms(1000);
        let early = h
            .layer
            .handle_reported(ErrorCategory::TransientInput, "no speech", fields.clone())
            .await;
        assert!(early.is_suppressed());

        h.clock.advance_ms(5000);
        let late = h
            .layer
            .handle_reported(ErrorCategory::TransientInput, "no speech", fields)
            .await;
        let HandleOutcome::Handled { entry, .. } = late else {
            panic!("expected handled");
        };
        assert_eq!(entry.error, "no speech");
        assert_eq!(
            entry.message,
            "We didn't quite catch that. Try saying \"un café\" again."
        );
        assert_eq!(h.reporter.reports()[0].category, "transient-input");
    }

    #[tokio::test]
    async fn persistence_failure_caches_payload_temporarily() {
        let h = harness(true).await;
        h.clock.advance_ms(1234);
        h.layer
            .handle(
                ErrorCategory::PersistenceFailure,
                &PortError::Storage("quota".into()),
                ErrorContext::new().payload(serde_json::json!({"lesson_id": "l1"})),
            )
            .await;
        let cached = h.slots.get("temp:u1:1234").await.expect("read").expect("cached");
        assert_eq!(cached, "{\"lesson_id\":\"l1\"}");
    }

    #[tokio::test(start_paused = true)]
    async fn content_missing_retries_after_delay() {
        let h = harness(true).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook: RetryHook = Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });

        h.layer
            .handle(
                ErrorCategory::ContentMissing,
                &err("404"),
                ErrorContext::new().retry(hook),
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(taxonomy::AUTO_RETRY_DELAY + Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sync_is_skipped_while_offline() {
        let h = harness(false).await;
        h.layer.queue().enqueue(OfflineActionKind::ApiReplay(HttpRequest::get("http://a"))).await;
        assert!(h.layer.sync().await.skipped);
        assert_eq!(h.layer.queue().len().await, 1);
    }

    #[tokio::test]
    async fn sync_replays_reports_and_requests_after_reconnect() {
        let h = harness(false).await;
        h.layer.handle(ErrorCategory::ConnectivityLost, &err("x"), ErrorContext::new()).await;
        h.layer
            .queue()
            .enqueue(OfflineActionKind::ApiReplay(HttpRequest::get("http://api/a")))
            .await;
        h.layer
            .queue()
            .enqueue(OfflineActionKind::ApiReplay(HttpRequest::get("http://api/b")))
            .await;
        h.transport.respond("http://api/a", 200, "{}");
        h.transport.fail("http://api/b");

        h.layer.connectivity().set_online(true);
        let report = h.layer.sync().await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.replayed, 2);
        assert_eq!(h.reporter.reports().len(), 1);
        let urls: Vec<_> = h.transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["http://api/a", "http://api/b"]);
        let pending = h.layer.queue().pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].kind,
            OfflineActionKind::ApiReplay(HttpRequest::get("http://api/b"))
        );
    }

    #[tokio::test]
    async fn reconnect_task_syncs_on_transition() {
        let h = harness(false).await;
        h.transport.respond("http://api/a", 200, "{}");
        h.layer
            .queue()
            .enqueue(OfflineActionKind::ApiReplay(HttpRequest::get("http://api/a")))
            .await;

        let cancel = CancellationToken::new();
        let task = h.layer.spawn_sync_on_reconnect(cancel.clone());
        h.layer.connectivity().set_online(true);

        for _ in 0..50 {
            if h.layer.queue().is_empty().await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(h.layer.queue().is_empty().await);
        cancel.cancel();
        task.await.expect("task joins");
    }

    #[tokio::test]
    async fn error_log_survives_reload() {
        let h = harness(true).await;
        h.layer.handle(ErrorCategory::AudioUnavailable, &err("a"), ErrorContext::new()).await;
        let reloaded = ResilienceLayer::load(
            "u1",
            h.reporter.clone(),
            h.transport.clone(),
            h.notifier.clone(),
            h.slots.clone(),
            h.clock.clone(),
            Connectivity::new(true),
            ResilienceConfig::default(),
        )
        .await;
        assert_eq!(reloaded.recent_errors().await.len(), 1);
    }
}
