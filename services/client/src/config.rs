//! services/client/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use tracing::Level;

/// 50 MiB cap on any single uploaded file unless overridden.
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;

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
    pub api_base_url: String,
    pub database_path: PathBuf,
    pub max_file_size_bytes: u64,
    pub request_timeout_secs: u64,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Backend and Store Settings ---
        let api_base_url =
            std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("flashnotes.db"));

        // --- Upload Limits and Timeouts ---
        let max_file_size_bytes = match std::env::var("MAX_FILE_SIZE_BYTES") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("MAX_FILE_SIZE_BYTES".to_string(), e.to_string())
            })?,
            Err(_) => DEFAULT_MAX_FILE_SIZE_BYTES,
        };

        let request_timeout_secs = match std::env::var("REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            Err(_) => 30,
        };

        // --- Logging ---
        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base_url,
            database_path,
            max_file_size_bytes,
            request_timeout_secs,
            log_level,
        })
    }

    /// A fixed configuration for tests, independent of the environment.
    #[cfg(test)]
    pub fn default_for_tests() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            database_path: PathBuf::from(":memory:"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            request_timeout_secs: 30,
            log_level: Level::INFO,
        }
    }
}
