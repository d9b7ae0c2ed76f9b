//! crates/tutor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the lesson client.
//! These structs carry serde derives because every one of them either crosses
//! the network boundary or is written to a persisted local slot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

//=========================================================================================
// Lesson Content
//=========================================================================================

/// A branch out of a dialogue node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOption {
    pub label: String,
    pub next_node_id: String,
}

/// One turn of a lesson graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: String,
    pub tutor_text: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub options: Vec<NodeOption>,
}

impl DialogueNode {
    /// A node terminates the lesson when it has no way out, or when every way
    /// out leads straight back to itself.
    pub fn is_terminal(&self) -> bool {
        self.options.iter().all(|o| o.next_node_id == self.id)
    }
}

/// A complete lesson as served by the content provider. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub goal: String,
    pub nodes: Vec<DialogueNode>,
}

impl LessonDefinition {
    /// The entry point is always the first node in the sequence.
    pub fn first_node(&self) -> Option<&DialogueNode> {
        self.nodes.first()
    }

    pub fn node(&self, node_id: &str) -> Option<&DialogueNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }
}

/// A row of the lesson catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title_localized: String,
    pub title_source: String,
    pub level: String,
    pub module: u32,
    pub part: u32,
}

//=========================================================================================
// Lesson Progress
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Correct,
    Close,
    Incorrect,
    Unscored,
}

/// A single learner response to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub node_id: String,
    pub user_text: String,
    pub score: Option<f64>,
    pub feedback_kind: FeedbackKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSummary {
    pub total_nodes: usize,
    pub unique_visited: usize,
    pub total_attempts: usize,
    /// Mean over the attempts that carry a score; `None` when none do.
    pub average_score: Option<f64>,
}

/// The per-lesson progress record kept in its own slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub lesson_id: String,
    pub completed: bool,
    pub visited_nodes: usize,
    pub attempts: usize,
    pub average_score: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Review
//=========================================================================================

/// A phrase due for review. `next_review` belongs to the server and is never
/// rewritten on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub phrase_id: String,
    pub lesson_id: String,
    pub next_review: DateTime<Utc>,
    #[serde(default)]
    pub forgotten: bool,
}

/// What the review store answers to a grade submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub next_review: DateTime<Utc>,
}

//=========================================================================================
// Network Requests and Offline Actions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// A network call described as data so that it can be replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The body posted to the error reporting endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub category: String,
    pub message: String,
    pub stack: Option<String>,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum OfflineActionKind {
    ErrorReport(ErrorReport),
    ApiReplay(HttpRequest),
}

/// A queued, replayable side-effect captured while it could not be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: OfflineActionKind,
    pub queued_at: DateTime<Utc>,
}

//=========================================================================================
// Session Snapshots
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Tutor,
    Learner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Presentation-only state the core stores but never interprets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiFields {
    /// Ids of the nodes whose translation is currently revealed.
    #[serde(default)]
    pub translation_visible: BTreeSet<String>,
    #[serde(default)]
    pub transcript: Option<Vec<TranscriptEntry>>,
}

/// A point-in-time capture of a lesson session, used for resume and crash recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: String,
    pub lesson_id: String,
    pub node_id: String,
    pub history: Vec<String>,
    pub attempts: Vec<Attempt>,
    pub ui_fields: UiFields,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
}

impl SessionSnapshot {
    pub const SCHEMA_VERSION: u32 = 1;
}

//=========================================================================================
// Error Taxonomy
//=========================================================================================

/// The fixed set of error categories. The per-category table lives in
/// `resilience::taxonomy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    TransientInput,
    AudioUnavailable,
    PersistenceFailure,
    ContentMissing,
    ConnectivityLost,
    RecognitionTimeout,
    PermissionDenied,
    Uncaught,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A button offered on an error notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    SwitchInputMode,
    Continue,
    CacheTemporarily,
    Reload,
}

/// A user-facing notice produced by the resilience layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub category: ErrorCategory,
    pub message: String,
    pub actions: Vec<RecoveryAction>,
    pub severity: Severity,
    /// `None` means the notice stays until acknowledged.
    pub auto_dismiss_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, next: &[&str]) -> DialogueNode {
        DialogueNode {
            id: id.to_string(),
            tutor_text: String::new(),
            translation: String::new(),
            audio: None,
            options: next
                .iter()
                .map(|n| NodeOption {
                    label: n.to_string(),
                    next_node_id: n.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn terminal_nodes_have_no_exit_or_only_self_loops() {
        assert!(node("end", &[]).is_terminal());
        assert!(node("end", &["end", "end"]).is_terminal());
        assert!(!node("a", &["b"]).is_terminal());
        assert!(!node("a", &["a", "b"]).is_terminal());
    }

    #[test]
    fn offline_action_serializes_with_kind_and_payload() {
        let action = OfflineAction {
            id: Uuid::nil(),
            kind: OfflineActionKind::ApiReplay(HttpRequest::get("http://x/lessons")),
            queued_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default(),
        };
        let json = serde_json::to_value(&action).expect("serialize");
        assert_eq!(json["kind"], "api-replay");
        assert_eq!(json["payload"]["method"], "GET");
        let back: OfflineAction = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, action);
    }
}
