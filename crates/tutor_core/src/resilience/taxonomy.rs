//! crates/tutor_core/src/resilience/taxonomy.rs
//!
//! The fixed error taxonomy: message template, recovery buttons, automatic
//! recovery and severity for every `ErrorCategory`.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use crate::domain::{ErrorCategory, RecoveryAction, Severity};
use crate::ports::PortError;

/// Delay before an automatic retry fires.
pub const AUTO_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Recovery the resilience layer performs on its own, without a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRecovery {
    RetryAfter(Duration),
    CacheTemporarily,
}

/// One row of the taxonomy table.
#[derive(Debug)]
pub struct CategorySpec {
    pub name: &'static str,
    pub message_template: &'static str,
    pub actions: &'static [RecoveryAction],
    pub auto: &'static [AutoRecovery],
    pub severity: Severity,
}

static TRANSIENT_INPUT: CategorySpec = CategorySpec {
    name: "transient-input",
    message_template: "We didn't quite catch that. Try saying \"[phrase]\" again.",
    actions: &[RecoveryAction::Retry, RecoveryAction::SwitchInputMode],
    auto: &[],
    severity: Severity::Low,
};

static AUDIO_UNAVAILABLE: CategorySpec = CategorySpec {
    name: "audio-unavailable",
    message_template: "Audio for \"[phrase]\" is not available right now.",
    actions: &[RecoveryAction::Retry, RecoveryAction::Continue],
    auto: &[],
    severity: Severity::Low,
};

static PERSISTENCE_FAILURE: CategorySpec = CategorySpec {
    name: "persistence-failure",
    message_template: "Your progress could not be saved. It is kept on this device for now.",
    actions: &[RecoveryAction::Retry, RecoveryAction::CacheTemporarily],
    auto: &[AutoRecovery::CacheTemporarily],
    severity: Severity::Medium,
};

static CONTENT_MISSING: CategorySpec = CategorySpec {
    name: "content-missing",
    message_template: "This lesson could not be loaded. [detail]",
    actions: &[RecoveryAction::Retry, RecoveryAction::Continue],
    auto: &[AutoRecovery::RetryAfter(AUTO_RETRY_DELAY)],
    severity: Severity::Medium,
};

static CONNECTIVITY_LOST: CategorySpec = CategorySpec {
    name: "connectivity-lost",
    message_template: "You appear to be offline. Your changes will sync when the connection returns.",
    actions: &[RecoveryAction::Continue],
    auto: &[AutoRecovery::RetryAfter(AUTO_RETRY_DELAY)],
    severity: Severity::Medium,
};

static RECOGNITION_TIMEOUT: CategorySpec = CategorySpec {
    name: "recognition-timeout",
    message_template: "Listening timed out. Tap the microphone and try again.",
    actions: &[RecoveryAction::Retry, RecoveryAction::SwitchInputMode],
    auto: &[],
    severity: Severity::Low,
};

static PERMISSION_DENIED: CategorySpec = CategorySpec {
    name: "permission-denied",
    message_template: "Microphone access was denied. Switch to typing to keep going.",
    actions: &[RecoveryAction::SwitchInputMode],
    auto: &[],
    severity: Severity::Medium,
};

static UNCAUGHT: CategorySpec = CategorySpec {
    name: "uncaught",
    message_template: "Something went wrong. Please reload the page; your progress has been saved.",
    actions: &[RecoveryAction::Reload],
    auto: &[],
    severity: Severity::High,
};

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::TransientInput,
        ErrorCategory::AudioUnavailable,
        ErrorCategory::PersistenceFailure,
        ErrorCategory::ContentMissing,
        ErrorCategory::ConnectivityLost,
        ErrorCategory::RecognitionTimeout,
        ErrorCategory::PermissionDenied,
        ErrorCategory::Uncaught,
    ];

    pub fn spec(self) -> &'static CategorySpec {
        match self {
            ErrorCategory::TransientInput => &TRANSIENT_INPUT,
            ErrorCategory::AudioUnavailable => &AUDIO_UNAVAILABLE,
            ErrorCategory::PersistenceFailure => &PERSISTENCE_FAILURE,
            ErrorCategory::ContentMissing => &CONTENT_MISSING,
            ErrorCategory::ConnectivityLost => &CONNECTIVITY_LOST,
            ErrorCategory::RecognitionTimeout => &RECOGNITION_TIMEOUT,
            ErrorCategory::PermissionDenied => &PERMISSION_DENIED,
            ErrorCategory::Uncaught => &UNCAUGHT,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn severity(self) -> Severity {
        self.spec().severity
    }

    /// Picks the category for a failed port call: anything that never reached
    /// the other side is a connectivity loss, the rest falls back to `otherwise`.
    pub fn for_port_error(error: &PortError, otherwise: ErrorCategory) -> ErrorCategory {
        if error.is_connectivity() {
            ErrorCategory::ConnectivityLost
        } else {
            otherwise
        }
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([a-z_]+)\]").expect("placeholder pattern is valid"))
}

/// Substitutes `[name]` placeholders from `fields`. Unknown placeholders are
/// dropped and the result is trimmed.
pub fn render_message(template: &str, fields: &BTreeMap<String, String>) -> String {
    let rendered = placeholder_pattern().replace_all(template, |caps: &Captures| {
        fields.get(&caps[1]).cloned().unwrap_or_default()
    });
    rendered.trim().to_string()
}
