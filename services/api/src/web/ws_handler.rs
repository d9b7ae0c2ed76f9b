//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket side of a learner's session: notifications flow out,
//! page lifecycle events flow in. Closing the socket counts as a teardown.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, LearnerContext},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use tutor_core::SaveTrigger;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: String,
}

/// The handler for upgrading HTTP requests to WebSocket connections.
/// Browsers cannot set headers on a WebSocket, so the learner comes from the query.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, params.user_id))
}

async fn send(ws_sender: &WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode server message: {}", e);
            return false;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: String) {
    info!("New WebSocket connection established for user: {}", user_id);
    let learner = app_state.learner(&user_id).await;
    learner.socket_opened();

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    if !send(&ws_sender, &ServerMessage::Connected { user_id: user_id.clone() }).await {
        error!("Failed to send connected message.");
        learner.socket_closed();
        return;
    }

    // --- 1. Notification forwarding ---
    let forward_task = {
        let ws_sender = ws_sender.clone();
        let mut notices = app_state.notices.subscribe();
        let user_id = user_id.clone();
        tokio::spawn(async move {
            loop {
                match notices.recv().await {
                    Ok(notice) if notice.user_id == user_id => {
                        let message = ServerMessage::Notification {
                            notification: notice.notification,
                        };
                        if !send(&ws_sender, &message).await {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Notification stream lagged; {} dropped.", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => handle_text_message(text.as_str(), &learner, &ws_sender).await,
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    forward_task.abort();
    if let Err(e) = learner.persistence.save(SaveTrigger::Teardown).await {
        warn!("Teardown save failed for {}: {}", user_id, e);
    }
    learner.socket_closed();
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(text: &str, learner: &LearnerContext, ws_sender: &WsSender) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::VisibilityHidden) => {
            if let Err(e) = learner.persistence.save(SaveTrigger::Hidden).await {
                warn!("Save on hide failed: {}", e);
            }
        }
        Ok(ClientMessage::Teardown) => {
            if let Err(e) = learner.persistence.save(SaveTrigger::Teardown).await {
                warn!("Teardown save failed: {}", e);
            }
        }
        Ok(ClientMessage::ActionStarted) => learner.resilience.mark_action_start().await,
        Ok(ClientMessage::Connectivity { online }) => {
            learner.resilience.connectivity().set_online(online);
        }
        Ok(ClientMessage::Error {
            category,
            message,
            context,
        }) => {
            learner
                .resilience
                .handle_reported(category, &message, context)
                .await;
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let message = ServerMessage::Error {
                message: format!("Unrecognized message: {}", e),
            };
            send(ws_sender, &message).await;
        }
    }
}
