//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant maps onto an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;
use tutor_core::ports::PortError;
use tutor_core::{DialogueError, PersistenceError, ReviewError};

/// Attached to responses for failures nobody anticipated, so the learner's
/// catch-all handler can pick them up.
#[derive(Debug, Clone)]
pub struct UncaughtFailure(pub String);

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    #[error("{0}")]
    Dialogue(#[from] DialogueError),

    #[error("{0}")]
    Review(#[from] ReviewError),

    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

fn port_status(error: &PortError) -> StatusCode {
    match error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Network(_) | PortError::Http { .. } => StatusCode::BAD_GATEWAY,
        PortError::Decode(_) => StatusCode::BAD_GATEWAY,
        PortError::Storage(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn dialogue_status(error: &DialogueError) -> StatusCode {
    match error {
        DialogueError::LessonData { source, .. } => port_status(source),
        DialogueError::EmptyLesson(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DialogueError::Superseded(_) | DialogueError::NotActive => StatusCode::CONFLICT,
        DialogueError::UnknownNode(_) => StatusCode::BAD_REQUEST,
        DialogueError::Catalog(source) => port_status(source),
    }
}

impl ApiError {
    /// Errors outside the categorized core failures.
    pub fn is_uncaught(&self) -> bool {
        matches!(
            self,
            ApiError::Config(_) | ApiError::Database(_) | ApiError::Io(_) | ApiError::Internal(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Port(e) => port_status(e),
            ApiError::Dialogue(e) => dialogue_status(e),
            ApiError::Review(e) => match e {
                ReviewError::Refresh(source) => port_status(source),
                ReviewError::NoSession | ReviewError::QueueEmpty => StatusCode::CONFLICT,
                ReviewError::InvalidGrade { .. } => StatusCode::BAD_REQUEST,
            },
            ApiError::Persistence(e) => match e {
                PersistenceError::NoSnapshot => StatusCode::NOT_FOUND,
                PersistenceError::SchemaMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PersistenceError::Replay(inner) => dialogue_status(inner),
                PersistenceError::Storage(source) => port_status(source),
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        let message = self.to_string();
        let mut response = (status, Json(json!({ "error": message.clone() }))).into_response();
        if self.is_uncaught() {
            response.extensions_mut().insert(UncaughtFailure(message));
        }
        response
    }
}
