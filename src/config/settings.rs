//! Configuration settings structures for moto-repo
//!
//! All structures can be loaded from TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "moto-repo".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_driver() -> String {
    "sqlite".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/moto.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// Store connection configuration handed to the connection provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Store address: `sqlite://<path>`, `sqlite:<path>` or a bare file path
    #[serde(default)]
    pub url: String,

    /// Driver identity; only `sqlite` is available
    #[serde(default = "default_driver")]
    pub driver: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// How long a statement waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Whether the provider applies pending migrations when asked to migrate
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            driver: default_driver(),
            username: None,
            password: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            auto_migrate: false,
        }
    }
}

impl DatabaseConfig {
    /// Builds a config from a flat key-value property set.
    ///
    /// Recognised keys: `url` (required), `driver`, `username`, `password`,
    /// `busy_timeout_ms`, `auto_migrate`. Unknown keys are ignored.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let url = props
            .get("url")
            .cloned()
            .ok_or_else(|| ConfigError::MissingProperty("url".to_string()))?;

        let busy_timeout_ms = match props.get("busy_timeout_ms") {
            Some(raw) => raw.parse().map_err(|_| {
                ConfigError::validation(
                    "database.busy_timeout_ms".to_string(),
                    format!("'{}' is not a number of milliseconds", raw),
                )
            })?,
            None => default_busy_timeout_ms(),
        };

        let auto_migrate = props
            .get("auto_migrate")
            .map(|raw| matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let config = Self {
            url,
            driver: props.get("driver").cloned().unwrap_or_else(default_driver),
            username: props.get("username").cloned(),
            password: props.get("password").cloned(),
            busy_timeout_ms,
            auto_migrate,
        };
        config.validate()?;
        Ok(config)
    }

    /// The path SQLite should open, with any URL scheme stripped.
    pub fn database_path(&self) -> &str {
        self.url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url)
    }
}

// ============================================================================
// Repository Configuration
// ============================================================================

/// How a repository fills its in-memory mirror of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStrategy {
    /// Load every row when the repository is constructed
    Eager,
    /// Load a row the first time it is asked for
    #[default]
    Lazy,
    /// Never cache; every read goes to the store
    Passthrough,
}

impl LoadingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingStrategy::Eager => "eager",
            LoadingStrategy::Lazy => "lazy",
            LoadingStrategy::Passthrough => "passthrough",
        }
    }

    pub fn caches(&self) -> bool {
        !matches!(self, LoadingStrategy::Passthrough)
    }
}

impl std::str::FromStr for LoadingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eager" => Ok(LoadingStrategy::Eager),
            "lazy" => Ok(LoadingStrategy::Lazy),
            "passthrough" | "pass-through" => Ok(LoadingStrategy::Passthrough),
            _ => Err(ConfigError::validation(
                "repository.loading".to_string(),
                format!(
                    "Invalid loading strategy '{}'. Valid values are: eager, lazy, passthrough",
                    s
                ),
            )),
        }
    }
}

impl std::fmt::Display for LoadingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub loading: LoadingStrategy,
}

// ============================================================================
// Logger Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level or `EnvFilter` directive, e.g. "info" or "moto_repo=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime `LoggerConfig`.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let format: LogFormat = self
            .file
            .format
            .parse()
            .map_err(|e: anyhow::Error| ConfigError::validation("logger.file.format".to_string(), e.to_string()))?;

        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = FileConfig {
            enabled: self.file.enabled,
            path: PathBuf::from(self.file.path),
            append: self.file.append,
            format,
        };

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub logger: LoggerSettings,
}
