//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::Duration as ChronoDuration;
use edwin_core::settings::ClientSettings;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

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
    pub backend_url: Url,
    pub store_path: PathBuf,
    pub log_level: Level,
    pub settle_delay: Duration,
    pub sync_cooldown: ChronoDuration,
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
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Backend ---
        let backend_url_str =
            var("EDWIN_BACKEND_URL").unwrap_or_else(|| "http://localhost:5000".to_string());
        let backend_url = Url::parse(&backend_url_str)
            .map_err(|e| ConfigError::InvalidValue("EDWIN_BACKEND_URL".to_string(), e.to_string()))?;

        // --- Local storage ---
        let store_path = match var("EDWIN_STORE_PATH") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = var("HOME").ok_or_else(|| ConfigError::MissingVar("HOME".to_string()))?;
                PathBuf::from(home).join(".edwin").join("storage.json")
            }
        };

        // --- Logging ---
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Auto-sync timing ---
        let settle_delay_ms = parse_number(&var, "EDWIN_SETTLE_DELAY_MS", 2000)?;
        let cooldown_hours = parse_number(&var, "EDWIN_SYNC_COOLDOWN_HOURS", 12)?;

        Ok(Self {
            backend_url,
            store_path,
            log_level,
            settle_delay: Duration::from_millis(settle_delay_ms),
            sync_cooldown: ChronoDuration::hours(cooldown_hours as i64),
        })
    }

    /// The core settings with this configuration's overrides applied.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            settle_delay: self.settle_delay,
            sync_cooldown: self.sync_cooldown,
            ..ClientSettings::default()
        }
    }
}

fn parse_number(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}' is not a whole number", raw))
        }),
    }
}
