//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-learner context that
//! wires the core components together.
//!
//! Contexts are built on first use and evicted once a learner has neither
//! made a request nor held a WebSocket open for `learner_idle_ttl`.

use crate::adapters::{BroadcastNotifier, LearnerNotice, PushedUiState};
use crate::config::Config;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tutor_core::ports::{Clock, SlotStore, Transport};
use tutor_core::remote::{RemoteErrorReporter, RemoteLessonProvider, RemoteReviewStore};
use tutor_core::resilience::{Connectivity, ResilienceConfig, ResilienceLayer};
use tutor_core::{DialogueRuntime, ReviewScheduler, SaveTrigger, SessionPersistence};

const NOTICE_CAPACITY: usize = 256;
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub slots: Arc<dyn SlotStore>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub notices: broadcast::Sender<LearnerNotice>,
    /// Cancelled on shutdown; every learner's timers hang off a child token.
    pub shutdown: CancellationToken,
    learners: Mutex<HashMap<String, Arc<LearnerContext>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        slots: Arc<dyn SlotStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            config,
            slots,
            transport,
            clock,
            notices,
            shutdown: CancellationToken::new(),
            learners: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the learner's context, building it on first use. The build
    /// runs without the map lock; when two first requests race, the loser's
    /// context is discarded before any of its tasks start.
    pub async fn learner(&self, user_id: &str) -> Arc<LearnerContext> {
        if let Some(existing) = self.learners.lock().await.get(user_id) {
            existing.touch();
            return existing.clone();
        }

        let built = Arc::new(LearnerContext::build(self, user_id).await);
        let context = match self.learners.lock().await.entry(user_id.to_string()) {
            Entry::Occupied(entry) => {
                debug!(user = %user_id, "Learner context built concurrently; keeping the first.");
                return entry.get().clone();
            }
            Entry::Vacant(entry) => entry.insert(built).clone(),
        };
        context.spawn_background();
        info!(user = %user_id, "Learner context created.");
        context
    }

    pub async fn learner_count(&self) -> usize {
        self.learners.lock().await.len()
    }

    /// Saves and stops every context idle for longer than `ttl`. Returns how
    /// many were evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let evicted: Vec<Arc<LearnerContext>> = {
            let mut learners = self.learners.lock().await;
            let idle: Vec<String> = learners
                .iter()
                .filter(|(_, context)| context.is_idle(ttl))
                .map(|(user_id, _)| user_id.clone())
                .collect();
            idle.iter().filter_map(|user_id| learners.remove(user_id)).collect()
        };
        for context in &evicted {
            if let Err(e) = context.persistence.save(SaveTrigger::Teardown).await {
                warn!("Save before eviction failed for {}: {}", context.user_id, e);
            }
            context.cancel.cancel();
            info!(user = %context.user_id, "Idle learner context evicted.");
        }
        evicted.len()
    }

    /// Runs `evict_idle` with the configured TTL until shutdown.
    pub fn spawn_idle_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let app_state = self.clone();
        let ttl = self.config.learner_idle_ttl;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL.min(ttl));
            loop {
                tokio::select! {
                    _ = app_state.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        app_state.evict_idle(ttl).await;
                    }
                }
            }
        })
    }
}

//=========================================================================================
// LearnerContext (Specific to One Learner)
//=========================================================================================

/// The core components for one learner, sharing one resilience layer.
pub struct LearnerContext {
    pub user_id: String,
    pub resilience: Arc<ResilienceLayer>,
    pub runtime: Arc<DialogueRuntime>,
    pub review: Arc<ReviewScheduler>,
    pub persistence: Arc<SessionPersistence>,
    pub ui: Arc<PushedUiState>,
    pub cancel: CancellationToken,
    last_seen: std::sync::Mutex<Instant>,
    open_sockets: AtomicUsize,
}

impl LearnerContext {
    async fn build(app: &AppState, user_id: &str) -> Self {
        let config = &app.config;
        let notifier = Arc::new(BroadcastNotifier::new(user_id, app.notices.clone()));
        let reporter = Arc::new(RemoteErrorReporter::new(
            app.transport.clone(),
            config.error_report_url.clone(),
        ));
        let resilience = Arc::new(
            ResilienceLayer::load(
                user_id,
                reporter,
                app.transport.clone(),
                notifier,
                app.slots.clone(),
                app.clock.clone(),
                Connectivity::default(),
                ResilienceConfig::default(),
            )
            .await,
        );

        let fetch = Arc::new(resilience.fetcher());
        let lessons = Arc::new(RemoteLessonProvider::new(
            fetch.clone(),
            config.content_base_url.clone(),
        ));
        let reviews = Arc::new(RemoteReviewStore::new(fetch, config.review_base_url.clone()));

        let runtime = DialogueRuntime::new(lessons, resilience.clone(), app.clock.clone());
        let review = ReviewScheduler::load(
            user_id,
            reviews,
            resilience.clone(),
            app.slots.clone(),
            app.clock.clone(),
            config.review_config(),
        )
        .await;
        let ui = Arc::new(PushedUiState::default());
        let persistence = Arc::new(SessionPersistence::new(
            user_id,
            runtime.clone(),
            ui.clone(),
            app.slots.clone(),
            resilience.clone(),
            app.clock.clone(),
            config.persistence_config(),
        ));

        Self {
            user_id: user_id.to_string(),
            resilience,
            runtime,
            review,
            persistence,
            ui,
            cancel: app.shutdown.child_token(),
            last_seen: std::sync::Mutex::new(Instant::now()),
            open_sockets: AtomicUsize::new(0),
        }
    }

    /// Starts the reconnect sync and the review and persistence timers.
    fn spawn_background(&self) {
        self.resilience.spawn_sync_on_reconnect(self.cancel.clone());
        self.review.spawn_timers(self.cancel.clone());
        self.persistence.spawn_timers(self.cancel.clone());
    }

    pub fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    pub fn socket_opened(&self) {
        self.open_sockets.fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    pub fn socket_closed(&self) {
        self.open_sockets.fetch_sub(1, Ordering::SeqCst);
        self.touch();
    }

    fn is_idle(&self, ttl: Duration) -> bool {
        if self.open_sockets.load(Ordering::SeqCst) > 0 {
            return false;
        }
        self.last_seen
            .lock()
            .map(|last_seen| last_seen.elapsed() >= ttl)
            .unwrap_or(false)
    }
}
