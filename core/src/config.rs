//! Configuration management for audioscribe.
//!
//! Handles loading and providing defaults for the workflow configuration.
//! The configuration is read-only at runtime; nothing here writes to disk.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `api.api_key`.
pub const API_KEY_ENV_VAR: &str = "ASSEMBLYAI_API_KEY";

/// Default AssemblyAI REST API root.
pub const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com/v2";

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the transcription service.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API root, without a trailing slash.
    pub base_url: String,
    /// API key. `ASSEMBLYAI_API_KEY` takes precedence when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Timeout for submission and status calls, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for the file upload, in seconds. 0 leaves uploads unbounded.
    pub upload_timeout_secs: u64,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .finish()
    }
}

/// Status polling cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay before the second status check, in milliseconds.
    pub interval_ms: u64,
    /// Growth factor applied to the delay after each check. 1.0 keeps it fixed.
    pub backoff_multiplier: f64,
    /// Upper bound for the delay between checks, in milliseconds.
    pub max_interval_ms: u64,
    /// Give up after this many seconds of polling. 0 polls without limit.
    pub max_wait_secs: u64,
}

/// Retry budget for transient failures while polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive transient failures tolerated before giving up.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each following one.
    pub base_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: LogLevel,
    /// Also write logs to this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing filter covering the library and the `scribe` binary.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "audioscribe_core=error,scribe=error",
            LogLevel::Warn => "audioscribe_core=warn,scribe=warn",
            LogLevel::Info => "audioscribe_core=info,scribe=info",
            LogLevel::Debug => "audioscribe_core=debug,scribe=debug",
            LogLevel::Trace => "audioscribe_core=trace,scribe=trace",
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: 60,
            upload_timeout_secs: 0,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            backoff_multiplier: 1.0,
            max_interval_ms: 30_000,
            max_wait_secs: 3600,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl ApiConfig {
    /// Resolve the API key, preferring `ASSEMBLYAI_API_KEY` over the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_with_override(std::env::var(API_KEY_ENV_VAR).ok())
    }

    fn api_key_with_override(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone().filter(|key| !key.trim().is_empty()))
    }
}

impl Config {
    /// Returns the default config file path.
    /// `~/.config/audioscribe/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        crate::dirs::config_path()
    }

    /// Load configuration from the default path.
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config file as TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let polling = &self.polling;
        ensure!(polling.interval_ms > 0, "polling.interval_ms must be positive");
        ensure!(
            polling.backoff_multiplier.is_finite() && polling.backoff_multiplier >= 1.0,
            "polling.backoff_multiplier must be at least 1.0"
        );
        ensure!(
            polling.max_interval_ms >= polling.interval_ms,
            "polling.max_interval_ms must not be below polling.interval_ms"
        );
        ensure!(
            self.api.request_timeout_secs > 0,
            "api.request_timeout_secs must be positive"
        );
        ensure!(!self.api.base_url.trim().is_empty(), "api.base_url must not be empty");
        Ok(())
    }

    /// Render the configuration as TOML with the API key masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.api.api_key.is_some() {
            shown.api.api_key = Some("[REDACTED]".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize config to TOML")
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
