//! crates/tutor_core/src/testing.rs
//!
//! In-memory implementations of every port, for tests and for running the
//! core without a network or a database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::domain::{
    CatalogEntry, DialogueNode, ErrorReport, HttpRequest, HttpResponse, LessonDefinition,
    NodeOption, Notification, ReviewItem, ReviewUpdate, UiFields,
};
use crate::ports::{
    Clock, ErrorReporter, LessonContentProvider, Notifier, PortError, PortResult, ReviewStore,
    SlotStore, Transport, UiStateAccessor,
};

/// Poisoning only happens after a panic in another test thread; the data is
/// still usable for assertions.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Clock
// ============================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(time.timestamp_millis()),
        }
    }

    /// 2024-01-01T00:00:00Z, a fixed and readable origin.
    pub fn epoch() -> Self {
        Self {
            millis: AtomicI64::new(1_704_067_200_000),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.advance_ms(by.num_milliseconds());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

// ============================================================================
// Slot Store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<BTreeMap<String, String>>,
    failing: Mutex<bool>,
    unreadable: Mutex<bool>,
}

impl MemorySlotStore {
    /// Makes every write fail, as a full or blocked browser storage would.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// Makes every read and listing fail.
    pub fn set_unreadable(&self, unreadable: bool) {
        *lock(&self.unreadable) = unreadable;
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.slots).keys().cloned().collect()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        if *lock(&self.unreadable) {
            return Err(PortError::Storage(format!("read of {key} rejected")));
        }
        Ok(lock(&self.slots).get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> PortResult<()> {
        if *lock(&self.failing) {
            return Err(PortError::Storage(format!("write to {key} rejected")));
        }
        lock(&self.slots).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        lock(&self.slots).remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> PortResult<Vec<String>> {
        if *lock(&self.unreadable) {
            return Err(PortError::Storage(format!("listing {prefix} rejected")));
        }
        Ok(lock(&self.slots)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Lesson Content
// ============================================================================

/// Serves lessons from memory, optionally after a delay.
#[derive(Debug, Default)]
pub struct MockLessonProvider {
    lessons: Mutex<HashMap<String, LessonDefinition>>,
    catalog: Mutex<Vec<CatalogEntry>>,
    failing: Mutex<Option<PortError>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl MockLessonProvider {
    pub fn with_lessons(lessons: impl IntoIterator<Item = LessonDefinition>) -> Self {
        let provider = Self::default();
        for lesson in lessons {
            provider.insert(lesson);
        }
        provider
    }

    pub fn insert(&self, lesson: LessonDefinition) {
        let mut catalog = lock(&self.catalog);
        let part = catalog.len() as u32 + 1;
        catalog.push(CatalogEntry {
            id: lesson.id.clone(),
            title_localized: lesson.title.clone(),
            title_source: lesson.title.clone(),
            level: lesson.level.clone(),
            module: 1,
            part,
        });
        drop(catalog);
        lock(&self.lessons).insert(lesson.id.clone(), lesson);
    }

    pub fn fail_with(&self, error: Option<PortError>) {
        *lock(&self.failing) = error;
    }

    pub fn set_delay(&self, delay: Option<std::time::Duration>) {
        *lock(&self.delay) = delay;
    }
}

#[async_trait]
impl LessonContentProvider for MockLessonProvider {
    async fn lesson(&self, lesson_id: &str) -> PortResult<LessonDefinition> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = lock(&self.failing).clone() {
            return Err(error);
        }
        lock(&self.lessons)
            .get(lesson_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Lesson {lesson_id} not found")))
    }

    async fn catalog(&self) -> PortResult<Vec<CatalogEntry>> {
        if let Some(error) = lock(&self.failing).clone() {
            return Err(error);
        }
        Ok(lock(&self.catalog).clone())
    }
}

// ============================================================================
// Review Store
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedGrade {
    pub user_id: String,
    pub phrase_id: String,
    pub quality: u8,
    pub confidence: u8,
}

#[derive(Debug, Default)]
pub struct MockReviewStore {
    due: Mutex<Vec<ReviewItem>>,
    grades: Mutex<Vec<RecordedGrade>>,
    due_calls: Mutex<usize>,
    failing: Mutex<bool>,
}

impl MockReviewStore {
    pub fn with_due(items: Vec<ReviewItem>) -> Self {
        Self {
            due: Mutex::new(items),
            ..Self::default()
        }
    }

    pub fn set_due(&self, items: Vec<ReviewItem>) {
        *lock(&self.due) = items;
    }

    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn grades(&self) -> Vec<RecordedGrade> {
        lock(&self.grades).clone()
    }

    pub fn due_calls(&self) -> usize {
        *lock(&self.due_calls)
    }
}

#[async_trait]
impl ReviewStore for MockReviewStore {
    async fn due(&self, _user_id: &str) -> PortResult<Vec<ReviewItem>> {
        *lock(&self.due_calls) += 1;
        if *lock(&self.failing) {
            return Err(PortError::Network("review store unreachable".into()));
        }
        Ok(lock(&self.due).clone())
    }

    async fn update(
        &self,
        user_id: &str,
        phrase_id: &str,
        quality: u8,
        confidence: u8,
    ) -> PortResult<ReviewUpdate> {
        lock(&self.grades).push(RecordedGrade {
            user_id: user_id.to_string(),
            phrase_id: phrase_id.to_string(),
            quality,
            confidence,
        });
        if *lock(&self.failing) {
            return Err(PortError::Network("review store unreachable".into()));
        }
        Ok(ReviewUpdate {
            next_review: Utc::now() + Duration::days(i64::from(quality) + 1),
        })
    }
}

// ============================================================================
// Error Reporter, Notifier, Transport
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<ErrorReport>>,
    failing: Mutex<bool>,
}

impl RecordingReporter {
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        lock(&self.reports).clone()
    }
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, report: &ErrorReport) -> PortResult<()> {
        if *lock(&self.failing) {
            return Err(PortError::Network("reporting endpoint unreachable".into()));
        }
        lock(&self.reports).push(report.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }
}

/// Answers requests by url; unknown urls get a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, HttpResponse>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        lock(&self.failing).remove(url);
        lock(&self.responses).insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Makes requests to `url` fail as if the network were down.
    pub fn fail(&self, url: &str) {
        lock(&self.failing).insert(url.to_string());
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> PortResult<HttpResponse> {
        lock(&self.requests).push(request.clone());
        if lock(&self.failing).contains(&request.url) {
            return Err(PortError::Network(format!("{} unreachable", request.url)));
        }
        Ok(lock(&self.responses)
            .get(&request.url)
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: String::new(),
            }))
    }
}

// ============================================================================
// UI State
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryUiState {
    fields: Mutex<UiFields>,
}

impl MemoryUiState {
    pub fn set(&self, fields: UiFields) {
        *lock(&self.fields) = fields;
    }
}

impl UiStateAccessor for MemoryUiState {
    fn ui_fields(&self) -> UiFields {
        lock(&self.fields).clone()
    }

    fn restore_ui_fields(&self, fields: UiFields) {
        self.set(fields);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn node(id: &str, tutor_text: &str, next: &[&str]) -> DialogueNode {
    DialogueNode {
        id: id.to_string(),
        tutor_text: tutor_text.to_string(),
        translation: format!("({tutor_text})"),
        audio: None,
        options: next
            .iter()
            .map(|n| NodeOption {
                label: format!("go to {n}"),
                next_node_id: n.to_string(),
            })
            .collect(),
    }
}

/// greet → (order | smalltalk) → bye, where `bye` self-loops.
pub fn cafe_lesson() -> LessonDefinition {
    LessonDefinition {
        id: "cafe".to_string(),
        title: "At the café".to_string(),
        level: "A1".to_string(),
        goal: "Order a drink".to_string(),
        nodes: vec![
            node("greet", "¡Hola! ¿Qué desea?", &["order", "smalltalk"]),
            node("order", "Un café, por favor.", &["bye"]),
            node("smalltalk", "¿Qué tal el día?", &["order", "other-lesson:intro"]),
            node("bye", "¡Hasta luego!", &["bye"]),
        ],
    }
}

pub fn review_item(phrase_id: &str) -> ReviewItem {
    ReviewItem {
        phrase_id: phrase_id.to_string(),
        lesson_id: "cafe".to_string(),
        next_review: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        forgotten: false,
    }
}
