//! crates/tutor_core/src/keys.rs
//!
//! Names of the persisted local slots. All slots are scoped to one learner.

pub fn active_session(user_id: &str) -> String {
    format!("session:{user_id}:active")
}

pub fn session_history_prefix(user_id: &str) -> String {
    format!("session:{user_id}:history:")
}

/// Archived snapshots are keyed by their original timestamp.
pub fn session_history(user_id: &str, timestamp_ms: i64) -> String {
    format!("{}{timestamp_ms}", session_history_prefix(user_id))
}

pub fn offline_queue(user_id: &str) -> String {
    format!("queue:{user_id}")
}

pub fn error_log(user_id: &str) -> String {
    format!("errors:{user_id}")
}

pub fn lesson_progress(user_id: &str, lesson_id: &str) -> String {
    format!("progress:{user_id}:{lesson_id}")
}

pub fn forgotten_phrases(user_id: &str) -> String {
    format!("review:{user_id}:forgotten")
}

/// Short-lived cache for payloads whose write failed.
pub fn temp_cache(user_id: &str, timestamp_ms: i64) -> String {
    format!("temp:{user_id}:{timestamp_ms}")
}
