pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tutor_core::ReportedError;

use crate::error::{ApiError, UncaughtFailure};
use rest::*;
use state::AppState;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use ws_handler::ws_handler;

/// All API routes, bound to the shared state. Docs and CORS are layered on
/// by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    with_catch_all(routes(), app_state)
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/catalog", get(catalog_handler))
        .route("/lessons/{lesson_id}/start", post(start_lesson_handler))
        .route("/lesson/advance", post(advance_handler))
        .route("/lesson/attempts", post(record_attempt_handler))
        .route("/lesson/summary", get(summary_handler))
        .route("/lesson/reset", post(reset_lesson_handler))
        .route("/review/open", post(open_review_handler))
        .route("/review/next", get(next_review_handler))
        .route("/review/skip", post(skip_review_handler))
        .route("/review/submit", post(submit_review_handler))
        .route("/review/close", post(close_review_handler))
        .route("/session/ui", put(update_ui_handler))
        .route("/session/save", post(save_session_handler))
        .route("/session/resume", post(resume_session_handler))
        .route("/session/recovery", get(recovery_handler))
        .route("/session/history", get(history_handler))
        .route("/connectivity", post(connectivity_handler))
        .route("/errors", post(report_error_handler))
        .route("/errors/action-start", post(action_start_handler))
        .route("/errors/recent", get(recent_errors_handler))
        .route("/ws", get(ws_handler))
}

/// Panics become 500s, and every unanticipated failure is handed to the
/// learner's catch-all handler.
fn with_catch_all(routes: Router<Arc<AppState>>, app_state: Arc<AppState>) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(app_state.clone(), report_uncaught))
        .with_state(app_state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "no panic message".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}

async fn report_uncaught(
    State(app_state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let user_id = learner_id(request.headers()).map(str::to_string);
    let response = next.run(request).await;
    let failure = response
        .extensions()
        .get::<UncaughtFailure>()
        .map(|failure| failure.0.clone());
    if let (Some(user_id), Some(failure)) = (user_id, failure) {
        let learner = app_state.learner(&user_id).await;
        learner
            .resilience
            .handle_uncaught(&ReportedError(failure))
            .await;
    }
    response
}
