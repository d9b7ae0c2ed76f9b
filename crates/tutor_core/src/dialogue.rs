//! crates/tutor_core/src/dialogue.rs
//!
//! The dialogue-graph runtime: loads a lesson, tracks the active node and the
//! visit history, records attempts and answers completion/summary queries.
//!
//! `Idle → Loading → Active → Complete`, with `reset` returning to `Idle`
//! from anywhere. Every `start` and `reset` bumps an epoch; a lesson that
//! arrives after the epoch moved on is dropped instead of being applied.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use futures::FutureExt;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    Attempt, CatalogEntry, DialogueNode, ErrorCategory, FeedbackKind, LessonDefinition,
    LessonSummary,
};
use crate::ports::{Clock, LessonContentProvider, PortError};
use crate::resilience::{ErrorContext, ResilienceLayer, RetryHook};

#[derive(Debug, thiserror::Error)]
pub enum DialogueError {
    #[error("Lesson {lesson_id} could not be loaded: {source}")]
    LessonData {
        lesson_id: String,
        #[source]
        source: PortError,
    },
    #[error("Lesson {0} has no nodes")]
    EmptyLesson(String),
    #[error("Loading lesson {0} was superseded by a newer request")]
    Superseded(String),
    #[error("No lesson is active")]
    NotActive,
    #[error("Node {0} is not part of the active lesson")]
    UnknownNode(String),
    #[error("Catalog could not be loaded: {0}")]
    Catalog(#[source] PortError),
    #[error("Stored history does not start at the lesson entry node {0}")]
    HistoryMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    Idle,
    Loading,
    Active,
    Complete,
}

/// What `start` hands back.
#[derive(Debug, Clone)]
pub struct LessonStart {
    pub lesson: Arc<LessonDefinition>,
    pub first_node: DialogueNode,
}

/// The progress fields session persistence is allowed to see.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeCapture {
    pub lesson_id: String,
    pub node_id: String,
    pub history: Vec<String>,
    pub attempts: Vec<Attempt>,
}

//=========================================================================================
// Session State
//=========================================================================================

/// A loaded lesson with its node index.
#[derive(Debug)]
struct LoadedLesson {
    definition: Arc<LessonDefinition>,
    index: HashMap<String, usize>,
}

impl LoadedLesson {
    fn new(definition: LessonDefinition) -> Self {
        let index = definition
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self {
            definition: Arc::new(definition),
            index,
        }
    }

    fn node(&self, node_id: &str) -> Option<&DialogueNode> {
        self.index.get(node_id).map(|&i| &self.definition.nodes[i])
    }
}

#[derive(Debug)]
struct LessonSession {
    lesson: LoadedLesson,
    current_node_id: String,
    history: Vec<String>,
    attempts: Vec<Attempt>,
}

impl LessonSession {
    fn current_node(&self) -> Option<&DialogueNode> {
        self.lesson.node(&self.current_node_id)
    }

    fn is_complete(&self) -> bool {
        self.current_node().map(DialogueNode::is_terminal).unwrap_or(false)
    }
}

#[derive(Debug)]
struct Inner {
    state: RuntimeState,
    session: Option<LessonSession>,
    epoch: u64,
}

//=========================================================================================
// The Runtime
//=========================================================================================

pub struct DialogueRuntime {
    provider: Arc<dyn LessonContentProvider>,
    resilience: Arc<ResilienceLayer>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    me: Weak<DialogueRuntime>,
}

impl DialogueRuntime {
    pub fn new(
        provider: Arc<dyn LessonContentProvider>,
        resilience: Arc<ResilienceLayer>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            provider,
            resilience,
            clock,
            inner: Mutex::new(Inner {
                state: RuntimeState::Idle,
                session: None,
                epoch: 0,
            }),
            me: me.clone(),
        })
    }

    pub async fn state(&self) -> RuntimeState {
        self.inner.lock().await.state
    }

    pub async fn start(&self, lesson_id: &str) -> Result<LessonStart, DialogueError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.epoch += 1;
            inner.state = RuntimeState::Loading;
            inner.session = None;
            inner.epoch
        };
        info!("Loading lesson {}", lesson_id);
        self.load(lesson_id, epoch, true).await
    }

    async fn load(
        &self,
        lesson_id: &str,
        epoch: u64,
        allow_retry: bool,
    ) -> Result<LessonStart, DialogueError> {
        let fetched = self.provider.lesson(lesson_id).await;

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            debug!("Dropping stale response for lesson {}", lesson_id);
            return Err(DialogueError::Superseded(lesson_id.to_string()));
        }

        let definition = match fetched {
            Ok(definition) => definition,
            Err(source) => {
                inner.state = RuntimeState::Idle;
                drop(inner);
                let category = ErrorCategory::for_port_error(&source, ErrorCategory::ContentMissing);
                let mut context = ErrorContext::new()
                    .with("lesson_id", lesson_id)
                    .with("detail", source.to_string());
                if allow_retry {
                    context = context.retry(self.retry_start(lesson_id, epoch));
                }
                self.resilience.handle(category, &source, context).await;
                return Err(DialogueError::LessonData {
                    lesson_id: lesson_id.to_string(),
                    source,
                });
            }
        };

        let Some(first_node) = definition.first_node().cloned() else {
            inner.state = RuntimeState::Idle;
            drop(inner);
            let error = DialogueError::EmptyLesson(lesson_id.to_string());
            let mut context = ErrorContext::new().with("lesson_id", lesson_id);
            if allow_retry {
                context = context.retry(self.retry_start(lesson_id, epoch));
            }
            self.resilience
                .handle(ErrorCategory::ContentMissing, &error, context)
                .await;
            return Err(error);
        };

        let lesson = LoadedLesson::new(definition);
        let start = LessonStart {
            lesson: lesson.definition.clone(),
            first_node: first_node.clone(),
        };
        inner.session = Some(LessonSession {
            lesson,
            current_node_id: first_node.id.clone(),
            history: vec![first_node.id],
            attempts: Vec::new(),
        });
        inner.state = RuntimeState::Active;
        info!("Lesson {} active at node {}", lesson_id, start.first_node.id);
        Ok(start)
    }

    /// Loads `lesson_id` again, once, provided no `start` or `reset` happened
    /// since the load that failed under `epoch`.
    fn retry_start(&self, lesson_id: &str, epoch: u64) -> RetryHook {
        let me = self.me.clone();
        let lesson_id = lesson_id.to_string();
        Arc::new(move || {
            let me = me.clone();
            let lesson_id = lesson_id.clone();
            async move {
                let Some(runtime) = me.upgrade() else {
                    return;
                };
                let epoch = {
                    let mut inner = runtime.inner.lock().await;
                    if inner.epoch != epoch || inner.state != RuntimeState::Idle {
                        debug!("Lesson {} moved on; retry dropped.", lesson_id);
                        return;
                    }
                    inner.epoch += 1;
                    inner.state = RuntimeState::Loading;
                    inner.epoch
                };
                info!("Retrying lesson {}", lesson_id);
                if let Err(e) = runtime.load(&lesson_id, epoch, false).await {
                    debug!("Lesson retry failed: {}", e);
                }
            }
            .boxed()
        })
    }

    /// Moves to `next_node_id` if it belongs to the active lesson. A miss
    /// returns `None` and changes nothing; the caller decides whether it was a
    /// jump into another lesson. A completed lesson does not move any more.
    pub async fn advance(&self, next_node_id: &str) -> Option<DialogueNode> {
        let mut inner = self.inner.lock().await;
        if inner.state != RuntimeState::Active {
            return None;
        }
        let session = inner.session.as_mut()?;
        let node = session.lesson.node(next_node_id)?.clone();
        session.current_node_id = node.id.clone();
        session.history.push(node.id.clone());
        let complete = session.is_complete();
        if complete {
            inner.state = RuntimeState::Complete;
        }
        debug!(node = %node.id, complete, "Advanced.");
        Some(node)
    }

    /// Evaluated on demand from the current node.
    pub async fn is_complete(&self) -> bool {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(LessonSession::is_complete)
            .unwrap_or(false)
    }

    pub async fn current_node(&self) -> Option<DialogueNode> {
        self.inner.lock().await.session.as_ref()?.current_node().cloned()
    }

    pub async fn lesson(&self) -> Option<Arc<LessonDefinition>> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.lesson.definition.clone())
    }

    /// Appends an attempt as given. Scores are not range-checked.
    pub async fn record_attempt(
        &self,
        node_id: &str,
        user_text: &str,
        score: Option<f64>,
        feedback_kind: FeedbackKind,
    ) -> Result<Attempt, DialogueError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut().ok_or(DialogueError::NotActive)?;
        let attempt = Attempt {
            node_id: node_id.to_string(),
            user_text: user_text.to_string(),
            score,
            feedback_kind,
            timestamp: self.clock.now(),
        };
        session.attempts.push(attempt.clone());
        Ok(attempt)
    }

    pub async fn summary(&self) -> Result<LessonSummary, DialogueError> {
        let inner = self.inner.lock().await;
        let session = inner.session.as_ref().ok_or(DialogueError::NotActive)?;
        let scores: Vec<f64> = session.attempts.iter().filter_map(|a| a.score).collect();
        let average_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        Ok(LessonSummary {
            total_nodes: session.lesson.definition.nodes.len(),
            unique_visited: session.history.iter().collect::<HashSet<_>>().len(),
            total_attempts: session.attempts.len(),
            average_score,
        })
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        inner.state = RuntimeState::Idle;
        inner.session = None;
        info!("Dialogue runtime reset.");
    }

    pub async fn catalog(&self) -> Result<Vec<CatalogEntry>, DialogueError> {
        self.fetch_catalog(true).await
    }

    async fn fetch_catalog(&self, allow_retry: bool) -> Result<Vec<CatalogEntry>, DialogueError> {
        match self.provider.catalog().await {
            Ok(entries) => Ok(entries),
            Err(e) => {
                let mut context = ErrorContext::new();
                if allow_retry {
                    context = context.retry(self.retry_catalog());
                }
                self.resilience
                    .handle(ErrorCategory::ConnectivityLost, &e, context)
                    .await;
                Err(DialogueError::Catalog(e))
            }
        }
    }

    fn retry_catalog(&self) -> RetryHook {
        let me = self.me.clone();
        Arc::new(move || {
            let me = me.clone();
            async move {
                if let Some(runtime) = me.upgrade() {
                    match runtime.fetch_catalog(false).await {
                        Ok(entries) => info!("Catalog retry returned {} lessons", entries.len()),
                        Err(e) => debug!("Catalog retry failed: {}", e),
                    }
                }
            }
            .boxed()
        })
    }

    pub async fn capture(&self) -> Option<RuntimeCapture> {
        let inner = self.inner.lock().await;
        let session = inner.session.as_ref()?;
        Some(RuntimeCapture {
            lesson_id: session.lesson.definition.id.clone(),
            node_id: session.current_node_id.clone(),
            history: session.history.clone(),
            attempts: session.attempts.clone(),
        })
    }

    /// Overlays stored progress on the freshly started lesson. Everything is
    /// validated before anything is written.
    pub async fn restore(
        &self,
        node_id: &str,
        history: Vec<String>,
        attempts: Vec<Attempt>,
    ) -> Result<(), DialogueError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session.as_mut().ok_or(DialogueError::NotActive)?;
        if session.lesson.node(node_id).is_none() {
            return Err(DialogueError::UnknownNode(node_id.to_string()));
        }
        if let Some(unknown) = history.iter().find(|id| session.lesson.node(id).is_none()) {
            return Err(DialogueError::UnknownNode(unknown.clone()));
        }
        let first = session.history[0].clone();
        if history.first() != Some(&first) {
            warn!("Stored history does not start at {}; not restoring.", first);
            return Err(DialogueError::HistoryMismatch(first));
        }
        session.current_node_id = node_id.to_string();
        session.history = history;
        session.attempts = attempts;
        let complete = session.is_complete();
        inner.state = if complete {
            RuntimeState::Complete
        } else {
            RuntimeState::Active
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LessonDefinition;
    use crate::resilience::taxonomy::AUTO_RETRY_DELAY;
    use crate::resilience::{Connectivity, ResilienceConfig};
    use crate::testing::{
        cafe_lesson, node, ManualClock, MemorySlotStore, MockLessonProvider, RecordingNotifier,
        RecordingReporter, ScriptedTransport,
    };

    struct Harness {
        runtime: Arc<DialogueRuntime>,
        provider: Arc<MockLessonProvider>,
        notifier: Arc<RecordingNotifier>,
    }

    async fn harness(lessons: Vec<LessonDefinition>) -> Harness {
        let clock = Arc::new(ManualClock::epoch());
        let notifier = Arc::new(RecordingNotifier::default());
        let resilience = ResilienceLayer::load(
            "u1",
            Arc::new(RecordingReporter::default()),
            Arc::new(ScriptedTransport::default()),
            notifier.clone(),
            Arc::new(MemorySlotStore::default()),
            clock.clone(),
            Connectivity::new(true),
            ResilienceConfig::default(),
        )
        .await;
        let provider = Arc::new(MockLessonProvider::with_lessons(lessons));
        let runtime = DialogueRuntime::new(provider.clone(), Arc::new(resilience), clock);
        Harness {
            runtime,
            provider,
            notifier,
        }
    }

    fn two_node_lesson() -> LessonDefinition {
        LessonDefinition {
            id: "ab".into(),
            title: "A to B".into(),
            level: "A1".into(),
            goal: String::new(),
            nodes: vec![node("A", "a", &["B"]), node("B", "b", &["B"])],
        }
    }

    #[tokio::test]
    async fn start_puts_the_first_node_in_history() {
        let h = harness(vec![cafe_lesson()]).await;
        let start = h.runtime.start("cafe").await.expect("start");

        assert_eq!(start.first_node.id, "greet");
        assert_eq!(start.lesson.title, "At the café");
        assert_eq!(h.runtime.state().await, RuntimeState::Active);
        let capture = h.runtime.capture().await.expect("active");
        assert_eq!(capture.history, vec!["greet"]);
        assert_eq!(capture.node_id, "greet");
        assert!(capture.attempts.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_a_lesson_data_error_and_is_reported() {
        let h = harness(vec![]).await;
        let err = h.runtime.start("missing").await.expect_err("no such lesson");

        assert!(matches!(err, DialogueError::LessonData { .. }));
        assert_eq!(h.runtime.state().await, RuntimeState::Idle);
        let notifications = h.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].category, ErrorCategory::ContentMissing);
    }

    #[tokio::test]
    async fn network_failure_while_loading_is_categorized_as_connectivity() {
        let h = harness(vec![cafe_lesson()]).await;
        h.provider.fail_with(Some(PortError::Network("offline".into())));
        let _ = h.runtime.start("cafe").await;
        assert_eq!(h.notifier.notifications()[0].category, ErrorCategory::ConnectivityLost);
    }

    #[tokio::test]
    async fn empty_lesson_is_rejected() {
        let empty = LessonDefinition {
            id: "empty".into(),
            title: "Nothing".into(),
            level: String::new(),
            goal: String::new(),
            nodes: vec![],
        };
        let h = harness(vec![empty]).await;
        let err = h.runtime.start("empty").await.expect_err("empty");
        assert!(matches!(err, DialogueError::EmptyLesson(_)));
        assert_eq!(h.runtime.state().await, RuntimeState::Idle);
    }

    #[tokio::test]
    async fn advance_outside_the_lesson_returns_none_without_mutation() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");

        assert!(h.runtime.advance("other-lesson:intro").await.is_none());
        let capture = h.runtime.capture().await.expect("active");
        assert_eq!(capture.history, vec!["greet"]);
        assert_eq!(capture.node_id, "greet");
    }

    #[tokio::test]
    async fn advance_appends_history_and_completes_on_self_loop() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");

        let order = h.runtime.advance("order").await.expect("order exists");
        assert_eq!(order.id, "order");
        assert!(!h.runtime.is_complete().await);

        h.runtime.advance("bye").await.expect("bye exists");
        assert!(h.runtime.is_complete().await);
        assert_eq!(h.runtime.state().await, RuntimeState::Complete);
        assert_eq!(
            h.runtime.capture().await.expect("active").history,
            vec!["greet", "order", "bye"]
        );
    }

    #[tokio::test]
    async fn completion_is_false_at_a_and_true_at_self_looping_b() {
        let h = harness(vec![two_node_lesson()]).await;
        h.runtime.start("ab").await.expect("start");
        assert!(!h.runtime.is_complete().await);
        h.runtime.advance("B").await.expect("B");
        assert!(h.runtime.is_complete().await);
    }

    #[tokio::test]
    async fn completed_lesson_does_not_move() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");
        h.runtime.advance("bye").await.expect("bye");
        assert_eq!(h.runtime.state().await, RuntimeState::Complete);

        assert!(h.runtime.advance("greet").await.is_none());
        assert!(h.runtime.advance("bye").await.is_none());
        assert_eq!(h.runtime.state().await, RuntimeState::Complete);
        assert!(h.runtime.is_complete().await);
        assert_eq!(
            h.runtime.capture().await.expect("active").history,
            vec!["greet", "bye"]
        );
    }

    #[tokio::test]
    async fn advance_before_start_returns_none() {
        let h = harness(vec![cafe_lesson()]).await;
        assert!(h.runtime.advance("greet").await.is_none());
    }

    #[tokio::test]
    async fn summary_counts_unique_visits_and_averages_defined_scores() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");
        h.runtime.advance("smalltalk").await.expect("smalltalk");
        h.runtime.advance("order").await.expect("order");
        h.runtime.advance("bye").await.expect("bye");

        h.runtime
            .record_attempt("greet", "hola", Some(80.0), FeedbackKind::Correct)
            .await
            .expect("recorded");
        h.runtime
            .record_attempt("order", "un cafe", Some(60.0), FeedbackKind::Close)
            .await
            .expect("recorded");
        h.runtime
            .record_attempt("bye", "", None, FeedbackKind::Unscored)
            .await
            .expect("recorded");

        let summary = h.runtime.summary().await.expect("summary");
        assert_eq!(summary.total_nodes, 4);
        assert_eq!(summary.unique_visited, 4);
        assert_eq!(summary.total_attempts, 3);
        assert_eq!(summary.average_score, Some(70.0));
    }

    #[tokio::test]
    async fn attempts_accept_out_of_range_scores() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");
        let attempt = h
            .runtime
            .record_attempt("greet", "???", Some(-12.5), FeedbackKind::Incorrect)
            .await
            .expect("recorded");
        assert_eq!(attempt.score, Some(-12.5));
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");
        h.runtime.reset().await;
        assert_eq!(h.runtime.state().await, RuntimeState::Idle);
        assert!(h.runtime.capture().await.is_none());
        assert!(matches!(h.runtime.summary().await, Err(DialogueError::NotActive)));
    }

    #[tokio::test(start_paused = true)]
    async fn response_arriving_after_reset_is_dropped() {
        let h = harness(vec![cafe_lesson()]).await;
        h.provider.set_delay(Some(std::time::Duration::from_secs(2)));

        let runtime = h.runtime.clone();
        let pending = tokio::spawn(async move { runtime.start("cafe").await });
        while h.runtime.state().await != RuntimeState::Loading {
            tokio::task::yield_now().await;
        }
        h.runtime.reset().await;

        let result = pending.await.expect("task joins");
        assert!(matches!(result, Err(DialogueError::Superseded(_))));
        assert_eq!(h.runtime.state().await, RuntimeState::Idle);
        assert!(h.runtime.capture().await.is_none());
    }

    #[tokio::test]
    async fn restore_overlays_progress_and_rejects_foreign_nodes() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");

        let err = h
            .runtime
            .restore("nowhere", vec!["greet".into()], vec![])
            .await
            .expect_err("unknown node");
        assert!(matches!(err, DialogueError::UnknownNode(_)));

        h.runtime
            .restore("bye", vec!["greet".into(), "order".into(), "bye".into()], vec![])
            .await
            .expect("restored");
        assert_eq!(h.runtime.state().await, RuntimeState::Complete);
        assert_eq!(h.runtime.current_node().await.expect("node").id, "bye");
    }

    #[tokio::test]
    async fn restore_rejects_history_from_another_entry_node() {
        let h = harness(vec![cafe_lesson()]).await;
        h.runtime.start("cafe").await.expect("start");

        let err = h
            .runtime
            .restore("bye", vec!["order".into(), "bye".into()], vec![])
            .await
            .expect_err("history must start at greet");
        assert!(matches!(err, DialogueError::HistoryMismatch(ref first) if first == "greet"));
        let capture = h.runtime.capture().await.expect("active");
        assert_eq!(capture.node_id, "greet");
        assert_eq!(capture.history, vec!["greet"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_is_retried_after_the_delay() {
        let h = harness(vec![cafe_lesson()]).await;
        h.provider.fail_with(Some(PortError::Network("offline".into())));
        h.runtime.start("cafe").await.expect_err("offline");
        assert_eq!(h.runtime.state().await, RuntimeState::Idle);

        h.provider.fail_with(None);
        tokio::time::sleep(AUTO_RETRY_DELAY + std::time::Duration::from_millis(10)).await;

        assert_eq!(h.runtime.state().await, RuntimeState::Active);
        assert_eq!(h.runtime.current_node().await.expect("node").id, "greet");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_is_dropped_after_reset() {
        let h = harness(vec![cafe_lesson()]).await;
        h.provider.fail_with(Some(PortError::Network("offline".into())));
        h.runtime.start("cafe").await.expect_err("offline");
        h.runtime.reset().await;

        h.provider.fail_with(None);
        tokio::time::sleep(AUTO_RETRY_DELAY * 2).await;

        assert_eq!(h.runtime.state().await, RuntimeState::Idle);
        assert!(h.runtime.capture().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_retry_does_not_schedule_another() {
        let h = harness(vec![]).await;
        h.runtime.start("missing").await.expect_err("no such lesson");
        tokio::time::sleep(AUTO_RETRY_DELAY * 4).await;

        assert_eq!(h.notifier.notifications().len(), 2);
        assert_eq!(h.runtime.state().await, RuntimeState::Idle);
    }

    #[tokio::test]
    async fn catalog_passes_through() {
        let h = harness(vec![cafe_lesson(), two_node_lesson()]).await;
        let catalog = h.runtime.catalog().await.expect("catalog");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].id, "cafe");
    }
}
