//! crates/tutor_core/src/resilience/error_log.rs
//!
//! Bounded local error log. The in-memory ring keeps the latest
//! `MEMORY_CAPACITY` entries; only the newest `PERSISTED_CAPACITY` are written out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

use crate::domain::{ErrorCategory, Severity};

pub const MEMORY_CAPACITY: usize = 100;
pub const PERSISTED_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub id: Uuid,
    pub category: ErrorCategory,
    pub severity: Severity,
    /// The rendered user-facing message.
    pub message: String,
    /// The underlying error as text.
    pub error: String,
    pub context: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    entries: VecDeque<ErrorLogEntry>,
    capacity: usize,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::with_capacity(MEMORY_CAPACITY)
    }
}

impl ErrorLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds a log from persisted entries, oldest first.
    pub fn restore(entries: Vec<ErrorLogEntry>) -> Self {
        let mut log = Self::default();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    pub fn push(&mut self, entry: ErrorLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<ErrorLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The slice that goes to the persisted slot: the newest entries, oldest first.
    pub fn persisted_tail(&self) -> Vec<ErrorLogEntry> {
        let skip = self.entries.len().saturating_sub(PERSISTED_CAPACITY);
        self.entries.iter().skip(skip).cloned().collect()
    }
}
