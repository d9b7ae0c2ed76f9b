//! crates/tutor_core/src/review.rs
//!
//! Client side of spaced-repetition review. Interval math belongs to the
//! review store; this module keeps the due queue fresh, iterates it FIFO
//! inside a time-boxed session and tracks locally forgotten phrases.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use futures::FutureExt;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ErrorCategory, ReviewItem};
use crate::keys;
use crate::ports::{Clock, PortError, ReviewStore, SlotStore};
use crate::resilience::{ErrorContext, ResilienceLayer, RetryHook};

/// Quality grade that marks a phrase as forgotten.
pub const LOWEST_QUALITY: u8 = 0;

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub poll_interval: Duration,
    /// Local hour (0..24) at which the daily refresh fires.
    pub anchor_hour: u32,
    pub session_ceiling: chrono::Duration,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30 * 60),
            anchor_hour: 9,
            session_ceiling: chrono::Duration::minutes(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Due reviews could not be refreshed: {0}")]
    Refresh(#[source] PortError),
    #[error("No review session is open")]
    NoSession,
    #[error("The review queue is empty")]
    QueueEmpty,
    #[error("Invalid grade: quality {quality} (0..=5), confidence {confidence} (1..=5)")]
    InvalidGrade { quality: u8, confidence: u8 },
}

/// What the presentation layer should render next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewStep {
    Item { item: ReviewItem, remaining: usize },
    Finished { reviewed: usize },
    /// The time-box ran out; the session has been closed.
    TimeUp { reviewed: usize, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub phrase_id: String,
    /// The server's next review date, when the call went through.
    pub next_review: Option<DateTime<Utc>>,
    /// The failure shown to the user, when it did not. Never blocks `next`.
    pub error: Option<String>,
    pub next: ReviewStep,
}

#[derive(Debug)]
struct ReviewSession {
    started_at: DateTime<Utc>,
    reviewed: usize,
}

#[derive(Debug, Default)]
struct ReviewState {
    queue: VecDeque<ReviewItem>,
    forgotten: BTreeSet<String>,
    session: Option<ReviewSession>,
}

pub struct ReviewScheduler {
    user_id: String,
    store: Arc<dyn ReviewStore>,
    resilience: Arc<ResilienceLayer>,
    slots: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
    config: ReviewConfig,
    state: Mutex<ReviewState>,
    me: Weak<ReviewScheduler>,
}

impl ReviewScheduler {
    /// Builds the scheduler, restoring the persisted forgotten set.
    pub async fn load(
        user_id: &str,
        store: Arc<dyn ReviewStore>,
        resilience: Arc<ResilienceLayer>,
        slots: Arc<dyn SlotStore>,
        clock: Arc<dyn Clock>,
        config: ReviewConfig,
    ) -> Arc<Self> {
        let forgotten = match slots.get(&keys::forgotten_phrases(user_id)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable forgotten set: {}", e);
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                warn!("Failed to read forgotten set: {}", e);
                BTreeSet::new()
            }
        };
        Arc::new_cyclic(|me| Self {
            user_id: user_id.to_string(),
            store,
            resilience,
            slots,
            clock,
            config,
            state: Mutex::new(ReviewState {
                forgotten,
                ..ReviewState::default()
            }),
            me: me.clone(),
        })
    }

    //=====================================================================================
    // Due Set
    //=====================================================================================

    /// Pulls the due set. Items already queued keep their position (so skips
    /// stay at the tail); new ones are appended; items no longer due drop out.
    pub async fn refresh_due(&self) -> Result<usize, ReviewError> {
        self.refresh(true).await
    }

    async fn refresh(&self, allow_retry: bool) -> Result<usize, ReviewError> {
        let due = match self.store.due(&self.user_id).await {
            Ok(due) => due,
            Err(e) => {
                let category = ErrorCategory::for_port_error(&e, ErrorCategory::ContentMissing);
                let mut context = ErrorContext::new().with("detail", "review queue");
                if allow_retry {
                    context = context.retry(self.retry_refresh());
                }
                self.resilience.handle(category, &e, context).await;
                return Err(ReviewError::Refresh(e));
            }
        };

        let mut state = self.state.lock().await;
        let fresh: HashSet<&str> = due.iter().map(|i| i.phrase_id.as_str()).collect();
        let mut queue: VecDeque<ReviewItem> = state
            .queue
            .drain(..)
            .filter(|i| fresh.contains(i.phrase_id.as_str()))
            .collect();
        let queued: HashSet<String> = queue.iter().map(|i| i.phrase_id.clone()).collect();
        for mut item in due.iter().cloned() {
            if !queued.contains(&item.phrase_id) {
                item.forgotten = state.forgotten.contains(&item.phrase_id);
                queue.push_back(item);
            }
        }
        state.queue = queue;
        debug!(due = state.queue.len(), "Due reviews refreshed.");
        Ok(state.queue.len())
    }

    /// One more refresh after the category's delay; a second failure is
    /// reported but not retried again.
    fn retry_refresh(&self) -> RetryHook {
        let me = self.me.clone();
        Arc::new(move || {
            let me = me.clone();
            async move {
                if let Some(scheduler) = me.upgrade() {
                    debug!("Retrying due review refresh.");
                    let _ = scheduler.refresh(false).await;
                }
            }
            .boxed()
        })
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    //=====================================================================================
    // Session
    //=====================================================================================

    /// Opens a time-boxed session. A failed refresh is reported but the
    /// session still opens over whatever is already queued.
    pub async fn open_session(&self) -> ReviewStep {
        if let Err(e) = self.refresh_due().await {
            info!("Opening review session on the cached queue: {}", e);
        }
        {
            let mut state = self.state.lock().await;
            state.session = Some(ReviewSession {
                started_at: self.clock.now(),
                reviewed: 0,
            });
        }
        info!("Review session opened.");
        match self.next_item().await {
            Ok(step) => step,
            Err(_) => ReviewStep::Finished { reviewed: 0 },
        }
    }

    pub async fn is_session_open(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// The item to render next, or the reason the session ended.
    pub async fn next_item(&self) -> Result<ReviewStep, ReviewError> {
        let mut state = self.state.lock().await;
        let session = state.session.as_ref().ok_or(ReviewError::NoSession)?;
        let reviewed = session.reviewed;

        if self.clock.now() - session.started_at > self.config.session_ceiling {
            state.session = None;
            info!(reviewed, "Review session time-boxed.");
            return Ok(ReviewStep::TimeUp {
                reviewed,
                message: format!("Time's up! You reviewed {reviewed} phrase(s) this session."),
            });
        }

        if let Some(item) = state.queue.front().cloned() {
            return Ok(ReviewStep::Item {
                item,
                remaining: state.queue.len(),
            });
        }
        state.session = None;
        info!(reviewed, "Review queue finished.");
        Ok(ReviewStep::Finished { reviewed })
    }

    /// Moves the current item to the back of the queue without grading it.
    pub async fn skip(&self) -> Result<ReviewStep, ReviewError> {
        {
            let mut state = self.state.lock().await;
            if state.session.is_none() {
                return Err(ReviewError::NoSession);
            }
            let item = state.queue.pop_front().ok_or(ReviewError::QueueEmpty)?;
            debug!(phrase = %item.phrase_id, "Skipped.");
            state.queue.push_back(item);
        }
        self.next_item().await
    }

    /// Grades the current item and moves on whatever the network says.
    pub async fn submit(&self, quality: u8, confidence: u8) -> Result<SubmitOutcome, ReviewError> {
        if quality > 5 || !(1..=5).contains(&confidence) {
            return Err(ReviewError::InvalidGrade { quality, confidence });
        }

        let (item, forgotten) = {
            let mut state = self.state.lock().await;
            if state.session.is_none() {
                return Err(ReviewError::NoSession);
            }
            let item = state.queue.pop_front().ok_or(ReviewError::QueueEmpty)?;
            if let Some(session) = state.session.as_mut() {
                session.reviewed += 1;
            }
            let forgotten = if quality == LOWEST_QUALITY {
                state.forgotten.insert(item.phrase_id.clone());
                Some(state.forgotten.clone())
            } else {
                None
            };
            (item, forgotten)
        };

        // Recorded locally before the round-trip, so it holds even if the call fails.
        if let Some(forgotten) = forgotten {
            self.persist_forgotten(&forgotten).await;
        }

        let (next_review, error) = match self
            .store
            .update(&self.user_id, &item.phrase_id, quality, confidence)
            .await
        {
            Ok(update) => (Some(update.next_review), None),
            Err(e) => {
                let category = ErrorCategory::for_port_error(&e, ErrorCategory::PersistenceFailure);
                self.resilience
                    .handle(
                        category,
                        &e,
                        ErrorContext::new()
                            .with("phrase", item.phrase_id.clone())
                            .payload(serde_json::json!({
                                "phrase_id": item.phrase_id,
                                "quality": quality,
                                "confidence": confidence,
                            })),
                    )
                    .await;
                (None, Some(e.to_string()))
            }
        };

        let next = match self.next_item().await {
            Ok(step) => step,
            Err(_) => ReviewStep::Finished { reviewed: 0 },
        };
        Ok(SubmitOutcome {
            phrase_id: item.phrase_id,
            next_review,
            error,
            next,
        })
    }

    pub async fn close_session(&self) {
        if self.state.lock().await.session.take().is_some() {
            info!("Review session closed.");
        }
    }

    //=====================================================================================
    // Forgotten Phrases
    //=====================================================================================

    pub async fn forgotten(&self) -> BTreeSet<String> {
        self.state.lock().await.forgotten.clone()
    }

    /// Hands the forgotten set over for re-injection into lessons and clears it.
    pub async fn take_forgotten(&self) -> BTreeSet<String> {
        let taken = std::mem::take(&mut self.state.lock().await.forgotten);
        self.persist_forgotten(&BTreeSet::new()).await;
        taken
    }

    async fn persist_forgotten(&self, forgotten: &BTreeSet<String>) {
        let result = match serde_json::to_string(forgotten) {
            Ok(raw) => self.slots.put(&keys::forgotten_phrases(&self.user_id), &raw).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Failed to persist forgotten phrases: {}", e);
        }
    }

    //=====================================================================================
    // Timers
    //=====================================================================================

    /// Starts the short poll and the daily anchor refresh. Both stop when
    /// `cancel` fires.
    pub fn spawn_timers(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let poll = {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            let period = self.config.poll_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            debug!("Review poll fired.");
                            let _ = scheduler.refresh_due().await;
                        }
                    }
                }
            })
        };

        let anchor = {
            let scheduler = self.clone();
            let now = self.clock.now().with_timezone(&Local);
            let first = delay_until_anchor(&now, self.config.anchor_hour);
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(first) => {}
                }
                let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            info!("Daily review refresh fired.");
                            let _ = scheduler.refresh_due().await;
                        }
                    }
                }
            })
        };

        vec![poll, anchor]
    }
}

/// The next occurrence of `hour:00` strictly after `now`.
pub fn next_anchor<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive().and_hms_opt(hour, 0, 0)?;
    let candidate = tz.from_local_datetime(&today).earliest()?;
    if candidate > *now {
        return Some(candidate);
    }
    let tomorrow = today.checked_add_signed(chrono::Duration::days(1))?;
    tz.from_local_datetime(&tomorrow).earliest()
}

/// How long to sleep until the next anchor; a day when the hour does not exist.
pub fn delay_until_anchor<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Duration {
    next_anchor(now, hour)
        .and_then(|at| (at - now.clone()).to_std().ok())
        .unwrap_or(Duration::from_secs(24 * 60 * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::taxonomy::AUTO_RETRY_DELAY;
    use crate::resilience::{Connectivity, ResilienceConfig};
    use crate::testing::{
        review_item, ManualClock, MemorySlotStore, MockReviewStore, RecordingNotifier,
        RecordingReporter, ScriptedTransport,
    };

    struct Harness {
        scheduler: Arc<ReviewScheduler>,
        store: Arc<MockReviewStore>,
        clock: Arc<ManualClock>,
        slots: Arc<MemorySlotStore>,
        notifier: Arc<RecordingNotifier>,
    }

    async fn harness(items: &[&str]) -> Harness {
        let clock = Arc::new(ManualClock::epoch());
        let slots = Arc::new(MemorySlotStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let resilience = Arc::new(
            ResilienceLayer::load(
                "u1",
                Arc::new(RecordingReporter::default()),
                Arc::new(ScriptedTransport::default()),
                notifier.clone(),
                slots.clone(),
                clock.clone(),
                Connectivity::new(true),
                ResilienceConfig::default(),
            )
            .await,
        );
        let store = Arc::new(MockReviewStore::with_due(
            items.iter().map(|p| review_item(p)).collect(),
        ));
        let scheduler = ReviewScheduler::load(
            "u1",
            store.clone(),
            resilience,
            slots.clone(),
            clock.clone(),
            ReviewConfig::default(),
        )
        .await;
        Harness {
            scheduler,
            store,
            clock,
            slots,
            notifier,
        }
    }

    fn phrase(step: &ReviewStep) -> Option<&str> {
        match step {
            ReviewStep::Item { item, .. } => Some(item.phrase_id.as_str()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn iteration_is_fifo_and_skip_requeues_at_tail() {
        let h = harness(&["p1", "p2", "p3"]).await;
        let first = h.scheduler.open_session().await;
        assert_eq!(phrase(&first), Some("p1"));

        let after_skip = h.scheduler.skip().await.expect("skip");
        assert_eq!(phrase(&after_skip), Some("p2"));

        let outcome = h.scheduler.submit(4, 3).await.expect("submit");
        assert_eq!(outcome.phrase_id, "p2");
        assert!(outcome.next_review.is_some());
        assert_eq!(phrase(&outcome.next), Some("p3"));

        let outcome = h.scheduler.submit(5, 5).await.expect("submit");
        assert_eq!(phrase(&outcome.next), Some("p1"));
        assert!(h.store.grades().iter().all(|g| g.phrase_id != "p1"));
    }

    #[tokio::test]
    async fn finishing_the_queue_closes_the_session() {
        let h = harness(&["p1"]).await;
        h.scheduler.open_session().await;
        let outcome = h.scheduler.submit(3, 3).await.expect("submit");
        assert_eq!(outcome.next, ReviewStep::Finished { reviewed: 1 });
        assert!(!h.scheduler.is_session_open().await);
    }

    #[tokio::test]
    async fn lowest_quality_marks_forgotten_even_when_the_server_fails() {
        let h = harness(&["p1", "p2"]).await;
        h.scheduler.open_session().await;
        h.store.set_failing(true);

        let outcome = h.scheduler.submit(0, 2).await.expect("submit advances");

        assert_eq!(outcome.phrase_id, "p1");
        assert!(outcome.next_review.is_none());
        assert!(outcome.error.is_some());
        assert_eq!(phrase(&outcome.next), Some("p2"));
        assert!(h.scheduler.forgotten().await.contains("p1"));
        let persisted = h.slots.get("review:u1:forgotten").await.expect("read").expect("stored");
        assert_eq!(persisted, "[\"p1\"]");
        assert_eq!(h.notifier.notifications().len(), 1);
        assert_eq!(h.store.grades().len(), 1);
    }

    #[tokio::test]
    async fn higher_quality_does_not_mark_forgotten() {
        let h = harness(&["p1"]).await;
        h.scheduler.open_session().await;
        h.scheduler.submit(1, 2).await.expect("submit");
        assert!(h.scheduler.forgotten().await.is_empty());
    }

    #[tokio::test]
    async fn forgotten_set_survives_reload_and_can_be_taken() {
        let h = harness(&["p1"]).await;
        h.scheduler.open_session().await;
        h.scheduler.submit(0, 1).await.expect("submit");

        let reloaded = ReviewScheduler::load(
            "u1",
            h.store.clone(),
            h.scheduler.resilience.clone(),
            h.slots.clone(),
            h.clock.clone(),
            ReviewConfig::default(),
        )
        .await;
        assert_eq!(reloaded.take_forgotten().await, BTreeSet::from(["p1".to_string()]));
        assert!(reloaded.forgotten().await.is_empty());
    }

    #[tokio::test]
    async fn session_is_force_closed_past_the_ceiling() {
        let h = harness(&["p1", "p2", "p3"]).await;
        h.scheduler.open_session().await;
        h.scheduler.submit(4, 4).await.expect("submit");

        h.clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));
        let step = h.scheduler.next_item().await.expect("step");

        match step {
            ReviewStep::TimeUp { reviewed, message } => {
                assert_eq!(reviewed, 1);
                assert!(message.contains("Time's up"));
            }
            other => panic!("expected time up, got {other:?}"),
        }
        assert!(!h.scheduler.is_session_open().await);
        assert!(matches!(h.scheduler.skip().await, Err(ReviewError::NoSession)));
    }

    #[tokio::test]
    async fn session_continues_just_under_the_ceiling() {
        let h = harness(&["p1"]).await;
        h.scheduler.open_session().await;
        h.clock.advance(chrono::Duration::minutes(5));
        assert_eq!(phrase(&h.scheduler.next_item().await.expect("step")), Some("p1"));
    }

    #[tokio::test]
    async fn invalid_grades_are_rejected_without_advancing() {
        let h = harness(&["p1"]).await;
        h.scheduler.open_session().await;
        assert!(matches!(
            h.scheduler.submit(6, 3).await,
            Err(ReviewError::InvalidGrade { .. })
        ));
        assert!(matches!(
            h.scheduler.submit(3, 0).await,
            Err(ReviewError::InvalidGrade { .. })
        ));
        assert_eq!(h.scheduler.queue_len().await, 1);
    }

    #[tokio::test]
    async fn refresh_keeps_existing_order_and_appends_new_items() {
        let h = harness(&["p1", "p2"]).await;
        h.scheduler.open_session().await;
        h.scheduler.skip().await.expect("skip");

        h.store.set_due(vec![review_item("p1"), review_item("p2"), review_item("p3")]);
        assert_eq!(h.scheduler.refresh_due().await.expect("refresh"), 3);
        assert_eq!(phrase(&h.scheduler.next_item().await.expect("step")), Some("p2"));
        h.scheduler.submit(3, 3).await.expect("submit");
        assert_eq!(phrase(&h.scheduler.next_item().await.expect("step")), Some("p1"));
    }

    #[tokio::test]
    async fn failed_refresh_still_opens_on_cached_queue() {
        let h = harness(&["p1"]).await;
        h.scheduler.refresh_due().await.expect("refresh");
        h.store.set_failing(true);

        let step = h.scheduler.open_session().await;
        assert_eq!(phrase(&step), Some("p1"));
        assert_eq!(h.notifier.notifications()[0].category, ErrorCategory::ConnectivityLost);
    }

    #[tokio::test]
    async fn submit_without_session_is_an_error() {
        let h = harness(&["p1"]).await;
        assert!(matches!(h.scheduler.submit(3, 3).await, Err(ReviewError::NoSession)));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_timer_refreshes_until_cancelled() {
        let h = harness(&["p1"]).await;
        let cancel = CancellationToken::new();
        let handles = h.scheduler.spawn_timers(cancel.clone());

        tokio::time::sleep(Duration::from_secs(30 * 60 * 2 + 1)).await;
        let polled = h.store.due_calls();
        assert!(polled >= 2, "polled {polled} times");

        cancel.cancel();
        for handle in handles {
            handle.await.expect("timer joins");
        }
        let after_cancel = h.store.due_calls();
        tokio::time::sleep(Duration::from_secs(3 * 60 * 60)).await;
        assert_eq!(h.store.due_calls(), after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_failure_refresh_is_retried_once() {
        let h = harness(&["p1", "p2"]).await;
        h.store.set_failing(true);
        assert!(h.scheduler.refresh_due().await.is_err());
        assert_eq!(h.scheduler.queue_len().await, 0);

        h.store.set_failing(false);
        tokio::time::sleep(AUTO_RETRY_DELAY + Duration::from_millis(10)).await;
        assert_eq!(h.store.due_calls(), 2);
        assert_eq!(h.scheduler.queue_len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retried_refresh_that_fails_again_stops() {
        let h = harness(&["p1"]).await;
        h.store.set_failing(true);
        let _ = h.scheduler.refresh_due().await;

        tokio::time::sleep(AUTO_RETRY_DELAY * 5).await;
        assert_eq!(h.store.due_calls(), 2);
        assert_eq!(h.notifier.notifications().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn daily_anchor_fires_at_the_hour_and_a_day_later() {
        let h = harness(&["p1"]).await;
        let config = ReviewConfig {
            poll_interval: Duration::from_secs(365 * 24 * 60 * 60),
            ..ReviewConfig::default()
        };
        let scheduler = ReviewScheduler::load(
            "u1",
            h.store.clone(),
            h.scheduler.resilience.clone(),
            h.slots.clone(),
            h.clock.clone(),
            config.clone(),
        )
        .await;
        let now = h.clock.now().with_timezone(&Local);
        let first = delay_until_anchor(&now, config.anchor_hour);
        let day = Duration::from_secs(24 * 60 * 60);

        let cancel = CancellationToken::new();
        let handles = scheduler.spawn_timers(cancel.clone());

        tokio::time::sleep(first - Duration::from_secs(1)).await;
        assert_eq!(h.store.due_calls(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.store.due_calls(), 1);

        tokio::time::sleep(day - Duration::from_secs(2)).await;
        assert_eq!(h.store.due_calls(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.store.due_calls(), 2);

        cancel.cancel();
        for handle in handles {
            handle.await.expect("timer joins");
        }
    }

    #[test]
    fn anchor_is_later_today_or_tomorrow() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).single().expect("valid");
        let evening = Utc.with_ymd_and_hms(2024, 3, 10, 21, 0, 0).single().expect("valid");
        let on_the_hour = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).single().expect("valid");

        assert_eq!(
            next_anchor(&morning, 9),
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).single()
        );
        assert_eq!(
            next_anchor(&evening, 9),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).single()
        );
        assert_eq!(
            next_anchor(&on_the_hour, 9),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).single()
        );
        assert_eq!(
            delay_until_anchor(&morning, 9),
            Duration::from_secs(90 * 60)
        );
    }
}
