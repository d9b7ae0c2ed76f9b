//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every route except the docs needs an `x-user-id` header naming the learner.

use crate::error::ApiError;
use crate::web::state::{AppState, LearnerContext};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use tutor_core::domain::{
    DialogueNode, ErrorCategory, FeedbackKind, Notification, SessionSnapshot, UiFields,
};
use tutor_core::persistence::RecoveryHint;
use tutor_core::ports::UiStateAccessor;
use tutor_core::{HandleOutcome, SaveOutcome, SaveTrigger};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        catalog_handler,
        start_lesson_handler,
        advance_handler,
        record_attempt_handler,
        summary_handler,
        reset_lesson_handler,
        open_review_handler,
        next_review_handler,
        skip_review_handler,
        submit_review_handler,
        close_review_handler,
        update_ui_handler,
        save_session_handler,
        resume_session_handler,
        recovery_handler,
        history_handler,
        connectivity_handler,
        action_start_handler,
        report_error_handler,
        recent_errors_handler,
    ),
    components(
        schemas(
            StartLessonResponse,
            AdvanceRequest,
            AdvanceResponse,
            AttemptRequest,
            GradeRequest,
            SaveRequest,
            SaveResponse,
            ResumeResponse,
            ConnectivityRequest,
            ReportErrorRequest,
            ReportErrorResponse,
        )
    ),
    tags(
        (name = "Dialogue Tutor API", description = "Lesson dialogue, spaced review and session recovery for one learner.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct StartLessonResponse {
    lesson_id: String,
    title: String,
    level: String,
    goal: String,
    #[schema(value_type = Object)]
    first_node: DialogueNode,
}

#[derive(Deserialize, ToSchema)]
pub struct AdvanceRequest {
    next_node_id: String,
}

/// `node` is null when the option leads outside the lesson.
#[derive(Serialize, ToSchema)]
pub struct AdvanceResponse {
    #[schema(value_type = Option<Object>)]
    node: Option<DialogueNode>,
    complete: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AttemptRequest {
    node_id: String,
    user_text: String,
    score: Option<f64>,
    #[schema(value_type = String, example = "correct")]
    feedback_kind: FeedbackKind,
}

#[derive(Deserialize, ToSchema)]
pub struct GradeRequest {
    quality: u8,
    confidence: u8,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveRequest {
    #[schema(value_type = String, example = "interaction")]
    trigger: SaveTrigger,
}

#[derive(Serialize, ToSchema)]
pub struct SaveResponse {
    status: String,
    #[schema(value_type = Option<Object>)]
    snapshot: Option<SessionSnapshot>,
}

#[derive(Serialize, ToSchema)]
pub struct ResumeResponse {
    #[schema(value_type = Object)]
    snapshot: SessionSnapshot,
    #[schema(value_type = Object)]
    node: DialogueNode,
}

#[derive(Deserialize, ToSchema)]
pub struct ConnectivityRequest {
    online: bool,
}

/// A failure raised in the browser: speech, audio, permissions or script errors.
#[derive(Deserialize, ToSchema)]
pub struct ReportErrorRequest {
    #[schema(value_type = String, example = "transient-input")]
    category: ErrorCategory,
    message: String,
    /// Template placeholders such as `phrase`.
    #[serde(default)]
    context: BTreeMap<String, String>,
}

/// `notification` is null when the report fell inside the grace period.
#[derive(Serialize, ToSchema)]
pub struct ReportErrorResponse {
    suppressed: bool,
    #[schema(value_type = Option<Object>)]
    notification: Option<Notification>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// The learner named by the `x-user-id` header, if any.
pub fn learner_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn learner(app_state: &AppState, headers: &HeaderMap) -> Result<Arc<LearnerContext>, ApiError> {
    let user_id = learner_id(headers)
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))?;
    Ok(app_state.learner(user_id).await)
}

/// Saves after an interaction; failures are already reported by the core.
async fn save_after_interaction(learner: &LearnerContext) {
    if let Err(e) = learner.persistence.save(SaveTrigger::Interaction).await {
        warn!("Save after interaction failed for {}: {}", learner.user_id, e);
    }
}

//=========================================================================================
// Lesson Handlers
//=========================================================================================

/// List the lesson catalog.
#[utoipa::path(
    get,
    path = "/catalog",
    responses(
        (status = 200, description = "Catalog entries"),
        (status = 502, description = "Content server unavailable")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn catalog_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.runtime.catalog().await?))
}

/// Load a lesson and return its first node.
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/start",
    responses(
        (status = 200, description = "Lesson started", body = StartLessonResponse),
        (status = 404, description = "No such lesson"),
        (status = 409, description = "Superseded by a newer start or a reset")
    ),
    params(
        ("lesson_id" = String, Path, description = "The lesson to start."),
        ("x-user-id" = String, Header, description = "The learner's id.")
    )
)]
pub async fn start_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let start = learner.runtime.start(&lesson_id).await?;
    info!(user = %learner.user_id, lesson = %lesson_id, "Lesson started.");
    save_after_interaction(&learner).await;
    Ok(Json(StartLessonResponse {
        lesson_id: start.lesson.id.clone(),
        title: start.lesson.title.clone(),
        level: start.lesson.level.clone(),
        goal: start.lesson.goal.clone(),
        first_node: start.first_node,
    }))
}

/// Follow an option of the current node.
#[utoipa::path(
    post,
    path = "/lesson/advance",
    request_body = AdvanceRequest,
    responses(
        (status = 200, description = "The new node, or null when the target is outside the lesson", body = AdvanceResponse)
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn advance_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AdvanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let node = learner.runtime.advance(&payload.next_node_id).await;
    let complete = learner.runtime.is_complete().await;
    save_after_interaction(&learner).await;
    Ok(Json(AdvanceResponse { node, complete }))
}

/// Record a scored utterance for a node.
#[utoipa::path(
    post,
    path = "/lesson/attempts",
    request_body = AttemptRequest,
    responses(
        (status = 201, description = "Attempt recorded"),
        (status = 400, description = "Node is not part of the lesson"),
        (status = 409, description = "No lesson is active")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn record_attempt_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AttemptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let attempt = learner
        .runtime
        .record_attempt(
            &payload.node_id,
            &payload.user_text,
            payload.score,
            payload.feedback_kind,
        )
        .await?;
    save_after_interaction(&learner).await;
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// Summarize the active lesson.
#[utoipa::path(
    get,
    path = "/lesson/summary",
    responses(
        (status = 200, description = "Lesson summary"),
        (status = 409, description = "No lesson is active")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn summary_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.runtime.summary().await?))
}

/// Drop the active lesson.
#[utoipa::path(
    post,
    path = "/lesson/reset",
    responses((status = 204, description = "Runtime is idle")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn reset_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    learner.runtime.reset().await;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Review Handlers
//=========================================================================================

/// Open a time-boxed review session.
#[utoipa::path(
    post,
    path = "/review/open",
    responses((status = 200, description = "First review step")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn open_review_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.review.open_session().await))
}

/// The current review step.
#[utoipa::path(
    get,
    path = "/review/next",
    responses(
        (status = 200, description = "Current review step"),
        (status = 409, description = "No review session is open")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn next_review_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.review.next_item().await?))
}

/// Move the current item to the back of the queue.
#[utoipa::path(
    post,
    path = "/review/skip",
    responses(
        (status = 200, description = "Next review step"),
        (status = 409, description = "No review session is open")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn skip_review_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.review.skip().await?))
}

/// Grade the current item.
#[utoipa::path(
    post,
    path = "/review/submit",
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Grade outcome and the next step"),
        (status = 400, description = "Grade out of range"),
        (status = 409, description = "No review session is open")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn submit_review_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<GradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(
        learner
            .review
            .submit(payload.quality, payload.confidence)
            .await?,
    ))
}

/// End the review session.
#[utoipa::path(
    post,
    path = "/review/close",
    responses((status = 204, description = "Session closed")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn close_review_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    learner.review.close_session().await;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Push the UI-only fields that snapshots carry.
#[utoipa::path(
    put,
    path = "/session/ui",
    request_body(content_type = "application/json", description = "Visible translations and the optional transcript."),
    responses((status = 204, description = "Fields stored")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn update_ui_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(fields): Json<UiFields>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    learner.ui.restore_ui_fields(fields);
    Ok(StatusCode::NO_CONTENT)
}

/// Save a snapshot now.
#[utoipa::path(
    post,
    path = "/session/save",
    request_body = SaveRequest,
    responses(
        (status = 200, description = "Save outcome", body = SaveResponse),
        (status = 500, description = "Storage rejected the snapshot")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn save_session_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let response = match learner.persistence.save(payload.trigger).await? {
        SaveOutcome::Saved(snapshot) => SaveResponse {
            status: "saved".to_string(),
            snapshot: Some(snapshot),
        },
        SaveOutcome::Debounced => SaveResponse {
            status: "debounced".to_string(),
            snapshot: None,
        },
        SaveOutcome::NothingToSave => SaveResponse {
            status: "nothing_to_save".to_string(),
            snapshot: None,
        },
    };
    Ok(Json(response))
}

/// Resume the last saved session.
#[utoipa::path(
    post,
    path = "/session/resume",
    responses(
        (status = 200, description = "Session resumed", body = ResumeResponse),
        (status = 404, description = "Nothing to resume"),
        (status = 422, description = "Snapshot schema not supported")
    ),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn resume_session_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let resumed = learner.persistence.resume(None).await?;
    Ok(Json(ResumeResponse {
        snapshot: resumed.snapshot,
        node: resumed.node,
    }))
}

/// Offer recovery when the last snapshot looks like a crash.
#[utoipa::path(
    get,
    path = "/session/recovery",
    responses((status = 200, description = "Recovery hint, or null")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn recovery_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let hint: Option<RecoveryHint> = learner.persistence.recovery_hint().await?;
    Ok(Json(hint))
}

/// Archived sessions, newest first.
#[utoipa::path(
    get,
    path = "/session/history",
    responses((status = 200, description = "Archived snapshots")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.persistence.list_history().await?))
}

//=========================================================================================
// Resilience Handlers
//=========================================================================================

/// Report the browser's connectivity. Going online replays the offline queue.
#[utoipa::path(
    post,
    path = "/connectivity",
    request_body = ConnectivityRequest,
    responses((status = 204, description = "Connectivity recorded")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn connectivity_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ConnectivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    if learner.resilience.connectivity().set_online(payload.online) {
        info!(user = %learner.user_id, online = payload.online, "Connectivity changed.");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Mark the start of a user interaction, opening the input grace period.
#[utoipa::path(
    post,
    path = "/errors/action-start",
    responses((status = 204, description = "Marker recorded")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn action_start_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    learner.resilience.mark_action_start().await;
    Ok(StatusCode::NO_CONTENT)
}

/// Report a failure the browser ran into. Subject to the input grace period.
#[utoipa::path(
    post,
    path = "/errors",
    request_body = ReportErrorRequest,
    responses((status = 200, description = "Whether the report was suppressed, and the notification shown otherwise", body = ReportErrorResponse)),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn report_error_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<ReportErrorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    let outcome = learner
        .resilience
        .handle_reported(payload.category, &payload.message, payload.context)
        .await;
    let response = match outcome {
        HandleOutcome::Suppressed => ReportErrorResponse {
            suppressed: true,
            notification: None,
        },
        HandleOutcome::Handled { notification, .. } => ReportErrorResponse {
            suppressed: false,
            notification: Some(notification),
        },
    };
    Ok(Json(response))
}

/// The learner's recent error log.
#[utoipa::path(
    get,
    path = "/errors/recent",
    responses((status = 200, description = "Error log entries, oldest first")),
    params(("x-user-id" = String, Header, description = "The learner's id."))
)]
pub async fn recent_errors_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let learner = learner(&app_state, &headers).await?;
    Ok(Json(learner.resilience.recent_errors().await))
}
