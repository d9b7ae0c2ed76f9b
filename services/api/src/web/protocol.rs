//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tutor_core::domain::{ErrorCategory, Notification};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Page lifecycle and interaction events the browser reports.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The tab was hidden; the session is saved immediately.
    VisibilityHidden,

    /// The page is being unloaded; the session is saved immediately.
    Teardown,

    /// The learner started an interaction, which opens the input grace period.
    ActionStarted,

    /// The browser's own online/offline signal.
    Connectivity { online: bool },

    /// A failure the browser ran into itself: speech recognition, audio
    /// playback, microphone permission or an unhandled script error.
    Error {
        category: ErrorCategory,
        message: String,
        #[serde(default)]
        context: BTreeMap<String, String>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the socket is bound to a learner.
    Connected { user_id: String },

    /// A categorized error for the learner to see.
    Notification { notification: Notification },

    /// Reports a problem with a client message.
    Error { message: String },
}
