//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use tutor_core::{PersistenceConfig, ReviewConfig};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub content_base_url: String,
    pub review_base_url: String,
    pub error_report_url: String,
    pub review_poll_interval: Duration,
    pub review_anchor_hour: u32,
    pub review_session_ceiling: Duration,
    pub autosave_interval: Duration,
    pub http_timeout: Duration,
    /// How long a learner's context lives without requests or open sockets.
    pub learner_idle_ttl: Duration,
}

/// Reads an optional variable, falling back to `default` and rejecting
/// values that do not parse.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and storage ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = require_var("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote services ---
        let content_base_url = require_var("CONTENT_BASE_URL")?;
        let review_base_url =
            std::env::var("REVIEW_BASE_URL").unwrap_or_else(|_| content_base_url.clone());
        let error_report_url = std::env::var("ERROR_REPORT_URL")
            .unwrap_or_else(|_| format!("{}/errors", content_base_url.trim_end_matches('/')));

        // --- Scheduling ---
        let poll_minutes = parse_var("REVIEW_POLL_MINUTES", 30u64)?;
        let review_anchor_hour = parse_var("REVIEW_ANCHOR_HOUR", 9u32)?;
        if review_anchor_hour > 23 {
            return Err(ConfigError::InvalidValue(
                "REVIEW_ANCHOR_HOUR".to_string(),
                format!("{} is not an hour of the day", review_anchor_hour),
            ));
        }
        let session_minutes = parse_var("REVIEW_SESSION_MINUTES", 5u64)?;
        let autosave_seconds = parse_var("AUTOSAVE_SECONDS", 30u64)?;
        let http_timeout_seconds = parse_var("HTTP_TIMEOUT_SECONDS", 15u64)?;
        let idle_minutes = parse_var("LEARNER_IDLE_MINUTES", 30u64)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            content_base_url,
            review_base_url,
            error_report_url,
            review_poll_interval: Duration::from_secs(poll_minutes * 60),
            review_anchor_hour,
            review_session_ceiling: Duration::from_secs(session_minutes * 60),
            autosave_interval: Duration::from_secs(autosave_seconds),
            http_timeout: Duration::from_secs(http_timeout_seconds),
            learner_idle_ttl: Duration::from_secs(idle_minutes * 60),
        })
    }

    pub fn review_config(&self) -> ReviewConfig {
        ReviewConfig {
            poll_interval: self.review_poll_interval,
            anchor_hour: self.review_anchor_hour,
            session_ceiling: chrono::Duration::from_std(self.review_session_ceiling)
                .unwrap_or_else(|_| ReviewConfig::default().session_ceiling),
        }
    }

    pub fn persistence_config(&self) -> PersistenceConfig {
        PersistenceConfig {
            autosave_interval: self.autosave_interval,
            ..PersistenceConfig::default()
        }
    }

    /// Settings for tests and local runs against the given content server.
    pub fn for_content(content_base_url: &str) -> Self {
        let base = content_base_url.trim_end_matches('/').to_string();
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: "sqlite::memory:".to_string(),
            log_level: Level::INFO,
            content_base_url: base.clone(),
            review_base_url: base.clone(),
            error_report_url: format!("{}/errors", base),
            review_poll_interval: ReviewConfig::default().poll_interval,
            review_anchor_hour: ReviewConfig::default().anchor_hour,
            review_session_ceiling: Duration::from_secs(5 * 60),
            autosave_interval: PersistenceConfig::default().autosave_interval,
            http_timeout: Duration::from_secs(15),
            learner_idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}
