//! crates/tutor_core/src/persistence.rs
//!
//! Session snapshots: periodic, debounced saves of the dialogue runtime plus
//! UI-only fields, resume, a crash-recovery hint, and weekly archival.
//!
//! Writes are last-write-wins; nothing here merges concurrent snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dialogue::{DialogueError, DialogueRuntime};
use crate::domain::{DialogueNode, ErrorCategory, LessonProgress, SessionSnapshot};
use crate::keys;
use crate::ports::{Clock, PortError, PortResult, SlotStore, UiStateAccessor};
use crate::resilience::{ErrorContext, ResilienceLayer};

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub debounce: chrono::Duration,
    pub recovery_window: chrono::Duration,
    pub archive_after: chrono::Duration,
    pub archive_interval: Duration,
    pub autosave_interval: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce: chrono::Duration::seconds(1),
            recovery_window: chrono::Duration::minutes(5),
            archive_after: chrono::Duration::days(7),
            archive_interval: Duration::from_secs(24 * 60 * 60),
            autosave_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage failure: {0}")]
    Storage(#[from] PortError),
    #[error("No saved session to resume")]
    NoSnapshot,
    #[error("Snapshot schema {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("Snapshot could not be replayed: {0}")]
    Replay(#[from] DialogueError),
}

/// Why a save was requested. Hidden and teardown bypass the debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTrigger {
    Periodic,
    Interaction,
    Hidden,
    Teardown,
}

impl SaveTrigger {
    pub fn is_forced(self) -> bool {
        matches!(self, SaveTrigger::Hidden | SaveTrigger::Teardown)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(SessionSnapshot),
    Debounced,
    NothingToSave,
}

#[derive(Debug, Clone)]
pub struct ResumeOutcome {
    pub snapshot: SessionSnapshot,
    pub node: DialogueNode,
}

/// Offered to the user after a crash; never acted on automatically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryHint {
    pub lesson_id: String,
    pub node_id: String,
    pub saved_at: DateTime<Utc>,
}

pub struct SessionPersistence {
    user_id: String,
    runtime: Arc<DialogueRuntime>,
    ui: Arc<dyn UiStateAccessor>,
    slots: Arc<dyn SlotStore>,
    resilience: Arc<ResilienceLayer>,
    clock: Arc<dyn Clock>,
    config: PersistenceConfig,
    last_save: Mutex<Option<DateTime<Utc>>>,
}

impl SessionPersistence {
    pub fn new(
        user_id: &str,
        runtime: Arc<DialogueRuntime>,
        ui: Arc<dyn UiStateAccessor>,
        slots: Arc<dyn SlotStore>,
        resilience: Arc<ResilienceLayer>,
        clock: Arc<dyn Clock>,
        config: PersistenceConfig,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            runtime,
            ui,
            slots,
            resilience,
            clock,
            config,
            last_save: Mutex::new(None),
        }
    }

    /// Captures the current session, or `None` when no lesson is loaded.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let capture = self.runtime.capture().await?;
        Some(SessionSnapshot {
            user_id: self.user_id.clone(),
            lesson_id: capture.lesson_id,
            node_id: capture.node_id,
            history: capture.history,
            attempts: capture.attempts,
            ui_fields: self.ui.ui_fields(),
            timestamp: self.clock.now(),
            schema_version: SessionSnapshot::SCHEMA_VERSION,
        })
    }

    pub async fn save(&self, trigger: SaveTrigger) -> Result<SaveOutcome, PersistenceError> {
        let now = self.clock.now();
        if !trigger.is_forced() {
            if let Some(last) = *self.last_save.lock().await {
                if now - last < self.config.debounce {
                    debug!(?trigger, "Save debounced.");
                    return Ok(SaveOutcome::Debounced);
                }
            }
        }

        let Some(snapshot) = self.snapshot().await else {
            return Ok(SaveOutcome::NothingToSave);
        };

        let raw = serde_json::to_string(&snapshot).map_err(PortError::from)?;
        if let Err(e) = self.slots.put(&keys::active_session(&self.user_id), &raw).await {
            let payload = serde_json::to_value(&snapshot).unwrap_or_default();
            self.resilience
                .handle(
                    ErrorCategory::PersistenceFailure,
                    &e,
                    ErrorContext::new()
                        .with("lesson_id", snapshot.lesson_id.clone())
                        .payload(payload),
                )
                .await;
            return Err(e.into());
        }
        *self.last_save.lock().await = Some(now);
        self.save_progress(&snapshot.lesson_id, now).await;
        debug!(?trigger, lesson = %snapshot.lesson_id, node = %snapshot.node_id, "Session saved.");
        Ok(SaveOutcome::Saved(snapshot))
    }

    async fn save_progress(&self, lesson_id: &str, now: DateTime<Utc>) {
        let Ok(summary) = self.runtime.summary().await else {
            return;
        };
        let progress = LessonProgress {
            lesson_id: lesson_id.to_string(),
            completed: self.runtime.is_complete().await,
            visited_nodes: summary.unique_visited,
            attempts: summary.total_attempts,
            average_score: summary.average_score,
            updated_at: now,
        };
        let result = match serde_json::to_string(&progress) {
            Ok(raw) => {
                self.slots
                    .put(&keys::lesson_progress(&self.user_id, lesson_id), &raw)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = self.storage("save progress", result).await {
            warn!("Failed to save progress for {}: {}", lesson_id, e);
        }
    }

    /// Turns a slot-store failure into a persistence-failure record before
    /// handing it back.
    async fn storage<T>(&self, operation: &str, result: PortResult<T>) -> Result<T, PersistenceError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                self.resilience
                    .handle(
                        ErrorCategory::PersistenceFailure,
                        &e,
                        ErrorContext::new().with("operation", operation),
                    )
                    .await;
                Err(e.into())
            }
        }
    }

    async fn read_slot<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        key: &str,
    ) -> Result<Option<T>, PersistenceError> {
        let result = match self.slots.get(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).map(Some).map_err(PortError::from),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.storage(operation, result).await
    }

    pub async fn lesson_progress(&self, lesson_id: &str) -> Result<Option<LessonProgress>, PersistenceError> {
        self.read_slot("read progress", &keys::lesson_progress(&self.user_id, lesson_id))
            .await
    }

    pub async fn load_active(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        self.read_slot("read session", &keys::active_session(&self.user_id))
            .await
    }

    /// Restarts the snapshot's lesson and overlays the stored progress and UI
    /// fields. Transcript replay is left to the presentation layer.
    pub async fn resume(&self, snapshot: Option<SessionSnapshot>) -> Result<ResumeOutcome, PersistenceError> {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => self.load_active().await?.ok_or(PersistenceError::NoSnapshot)?,
        };
        if snapshot.schema_version != SessionSnapshot::SCHEMA_VERSION {
            let error = PersistenceError::SchemaMismatch {
                found: snapshot.schema_version,
                expected: SessionSnapshot::SCHEMA_VERSION,
            };
            self.resilience
                .handle(
                    ErrorCategory::PersistenceFailure,
                    &error,
                    ErrorContext::new().with("lesson_id", snapshot.lesson_id.clone()),
                )
                .await;
            return Err(error);
        }

        info!(lesson = %snapshot.lesson_id, node = %snapshot.node_id, "Resuming session.");
        self.runtime.start(&snapshot.lesson_id).await?;
        self.runtime
            .restore(&snapshot.node_id, snapshot.history.clone(), snapshot.attempts.clone())
            .await?;
        self.ui.restore_ui_fields(snapshot.ui_fields.clone());
        let node = self
            .runtime
            .current_node()
            .await
            .ok_or(PersistenceError::Replay(DialogueError::NotActive))?;
        Ok(ResumeOutcome { snapshot, node })
    }

    /// A hint when the last snapshot is recent enough to look like a crash.
    pub async fn recovery_hint(&self) -> Result<Option<RecoveryHint>, PersistenceError> {
        let Some(snapshot) = self.load_active().await? else {
            return Ok(None);
        };
        let age = self.clock.now() - snapshot.timestamp;
        if age > self.config.recovery_window {
            return Ok(None);
        }
        info!(lesson = %snapshot.lesson_id, "Recent session found; offering recovery.");
        Ok(Some(RecoveryHint {
            lesson_id: snapshot.lesson_id,
            node_id: snapshot.node_id,
            saved_at: snapshot.timestamp,
        }))
    }

    /// Moves an active snapshot older than the archive threshold into a
    /// history slot keyed by its timestamp. Returns how many were moved.
    pub async fn archive_old_sessions(&self) -> Result<usize, PersistenceError> {
        let Some(snapshot) = self.load_active().await? else {
            return Ok(0);
        };
        if self.clock.now() - snapshot.timestamp <= self.config.archive_after {
            return Ok(0);
        }
        let key = keys::session_history(&self.user_id, snapshot.timestamp.timestamp_millis());
        let result = match serde_json::to_string(&snapshot) {
            Ok(raw) => self.slots.put(&key, &raw).await,
            Err(e) => Err(e.into()),
        };
        self.storage("archive session", result).await?;
        let removed = self.slots.remove(&keys::active_session(&self.user_id)).await;
        self.storage("archive session", removed).await?;
        info!("Archived session for {} under {}", snapshot.lesson_id, key);
        Ok(1)
    }

    /// Archived snapshots, newest first. Unreadable entries are skipped.
    pub async fn list_history(&self) -> Result<Vec<SessionSnapshot>, PersistenceError> {
        let listed = self
            .slots
            .keys_with_prefix(&keys::session_history_prefix(&self.user_id))
            .await;
        let mut keys = self.storage("list history", listed).await?;
        keys.sort_by_key(|k| {
            k.rsplit(':')
                .next()
                .and_then(|ts| ts.parse::<i64>().ok())
                .unwrap_or_default()
        });
        let mut snapshots = Vec::with_capacity(keys.len());
        for key in keys.iter().rev() {
            let read = self.slots.get(key).await;
            if let Some(raw) = self.storage("list history", read).await? {
                match serde_json::from_str(&raw) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(e) => warn!("Skipping unreadable archive {}: {}", key, e),
                }
            }
        }
        Ok(snapshots)
    }

    /// Starts the auto-save timer and the archival timer. Archival runs once
    /// right away and then every `archive_interval`.
    pub fn spawn_timers(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let autosave = {
            let persistence = self.clone();
            let cancel = cancel.clone();
            let period = self.config.autosave_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = persistence.save(SaveTrigger::Periodic).await {
                                warn!("Periodic save failed: {}", e);
                            }
                        }
                    }
                }
            })
        };

        let archive = {
            let persistence = self.clone();
            let period = self.config.archive_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = persistence.archive_old_sessions().await {
                                warn!("Archiving old sessions failed: {}", e);
                            }
                        }
                    }
                }
            })
        };

        vec![autosave, archive]
    }
}
