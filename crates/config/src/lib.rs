//! Configuration loading, validation, and management for Branchloom.
//!
//! Loads configuration from `~/.branchloom/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use branchloom_core::message::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.branchloom/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Session storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Context assembly
    #[serde(default)]
    pub context: ContextConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "file", "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Directory (file) or database file (sqlite). Derived from the config
    /// directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "file".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Effective storage location for the configured backend.
    pub fn resolved_path(&self, config_dir: &Path) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None if self.backend == "sqlite" => config_dir.join("sessions.sqlite"),
            None => config_dir.join("sessions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// History compression
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Default `{{user}}` macro value
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// Default `{{char}}` macro value
    #[serde(default = "default_char_name")]
    pub char_name: String,
}

fn default_user_name() -> String {
    "User".into()
}
fn default_char_name() -> String {
    "Assistant".into()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            limiter: LimiterConfig::default(),
            user_name: default_user_name(),
            char_name: default_char_name(),
        }
    }
}

/// Which thresholds trigger history compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Tokens,
    Messages,
    /// Either threshold alone is enough
    #[default]
    Both,
}

/// What happens to the messages selected for compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Drop them
    #[default]
    Truncate,
    /// Replace them with a summary from the summarizer collaborator
    Summarize,
}

/// History compression policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub mode: TriggerMode,

    /// Estimated history tokens that trigger compression
    #[serde(default = "default_token_threshold")]
    pub token_threshold: usize,

    /// History message count that triggers compression
    #[serde(default = "default_message_threshold")]
    pub message_threshold: usize,

    /// Newest messages that are always kept verbatim
    #[serde(default = "default_protect_recent")]
    pub protect_recent_count: usize,

    /// Upper bound of messages removed per invocation
    #[serde(default = "default_compress_count")]
    pub compress_count: usize,

    /// Below this history length the limiter never acts
    #[serde(default = "default_min_history")]
    pub min_history_count: usize,

    #[serde(default)]
    pub strategy: CompressionStrategy,

    /// Prompt handed to the summarizer
    #[serde(default = "default_summary_prompt")]
    pub summary_prompt: String,

    /// Role of the synthetic summary message
    #[serde(default = "default_summary_role")]
    pub summary_role: Role,
}

fn default_token_threshold() -> usize {
    8000
}
fn default_message_threshold() -> usize {
    60
}
fn default_protect_recent() -> usize {
    8
}
fn default_compress_count() -> usize {
    20
}
fn default_min_history() -> usize {
    12
}
fn default_summary_prompt() -> String {
    "Summarize the earlier part of this conversation. Keep names, decisions, \
     open questions and any facts the assistant will need later."
        .into()
}
fn default_summary_role() -> Role {
    Role::System
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TriggerMode::default(),
            token_threshold: default_token_threshold(),
            message_threshold: default_message_threshold(),
            protect_recent_count: default_protect_recent(),
            compress_count: default_compress_count(),
            min_history_count: default_min_history(),
            strategy: CompressionStrategy::default(),
            summary_prompt: default_summary_prompt(),
            summary_role: default_summary_role(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const STORE_BACKENDS: &[&str] = &["file", "sqlite", "memory"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Load configuration from the default path (~/.branchloom/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `BRANCHLOOM_DATA_DIR`: config/data directory
    /// - `BRANCHLOOM_STORE`: store backend
    /// - `BRANCHLOOM_LOG`: log level
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(backend) = std::env::var("BRANCHLOOM_STORE") {
            config.store.backend = backend;
        }
        if let Ok(level) = std::env::var("BRANCHLOOM_LOG") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        match std::env::var("BRANCHLOOM_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs_home().join(".branchloom"),
        }
    }

    /// Effective session store location.
    pub fn store_path(&self) -> PathBuf {
        self.store.resolved_path(&Self::config_dir())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !STORE_BACKENDS.contains(&self.store.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be one of {STORE_BACKENDS:?}, got '{}'",
                self.store.backend
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {LOG_LEVELS:?}, got '{}'",
                self.logging.level
            )));
        }

        let limiter = &self.context.limiter;
        if limiter.enabled {
            let needs_tokens = matches!(limiter.mode, TriggerMode::Tokens | TriggerMode::Both);
            let needs_messages = matches!(limiter.mode, TriggerMode::Messages | TriggerMode::Both);
            if needs_tokens && limiter.token_threshold == 0 {
                return Err(ConfigError::ValidationError(
                    "context.limiter.token_threshold must be > 0".into(),
                ));
            }
            if needs_messages && limiter.message_threshold == 0 {
                return Err(ConfigError::ValidationError(
                    "context.limiter.message_threshold must be > 0".into(),
                ));
            }
            if limiter.compress_count == 0 {
                return Err(ConfigError::ValidationError(
                    "context.limiter.compress_count must be > 0".into(),
                ));
            }
            if limiter.strategy == CompressionStrategy::Summarize
                && limiter.summary_prompt.trim().is_empty()
            {
                return Err(ConfigError::ValidationError(
                    "context.limiter.summary_prompt must not be empty when summarizing".into(),
                ));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for branchloom_core::Error {
    fn from(err: ConfigError) -> Self {
        branchloom_core::Error::Config {
            message: err.to_string(),
        }
    }
}
