//! crates/tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core talks to.
//! Every collaborator is handed to a component at construction as an
//! `Arc<dyn Port>`; nothing is looked up from shared global state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CatalogEntry, ErrorReport, HttpRequest, HttpResponse, LessonDefinition, Notification,
    ReviewItem, ReviewUpdate, UiFields,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., storage, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Network failure: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Malformed data: {0}")]
    Decode(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// True when the failure says nothing about the request itself, only that
    /// it never reached the other side.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PortError::Network(_))
    }
}

impl From<serde_json::Error> for PortError {
    fn from(e: serde_json::Error) -> Self {
        PortError::Decode(e.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Remote Service Ports
//=========================================================================================

#[async_trait]
pub trait LessonContentProvider: Send + Sync {
    /// Fetches one lesson. Node ids are unique within it and the first node is the entry.
    async fn lesson(&self, lesson_id: &str) -> PortResult<LessonDefinition>;

    async fn catalog(&self) -> PortResult<Vec<CatalogEntry>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn due(&self, user_id: &str) -> PortResult<Vec<ReviewItem>>;

    /// Records a grade. `quality` is 0..=5, `confidence` is 1..=5.
    async fn update(
        &self,
        user_id: &str,
        phrase_id: &str,
        quality: u8,
        confidence: u8,
    ) -> PortResult<ReviewUpdate>;
}

#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, report: &ErrorReport) -> PortResult<()>;
}

/// Raw network access. Callers in the core go through `ResilientFetch`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> PortResult<HttpResponse>;
}

//=========================================================================================
// Local Ports
//=========================================================================================

/// Persisted key/value slots (active session, archives, queues, logs, progress).
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;

    async fn keys_with_prefix(&self, prefix: &str) -> PortResult<Vec<String>>;
}

/// The presentation side that renders notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Narrow accessor the presentation layer implements so the core can read and
/// restore UI-only fields without reaching into presentation internals.
pub trait UiStateAccessor: Send + Sync {
    fn ui_fields(&self) -> UiFields;

    fn restore_ui_fields(&self, fields: UiFields);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
