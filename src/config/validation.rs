//! Configuration validation logic

use crate::config::error::ConfigError;
use crate::config::settings::{DatabaseConfig, LoggerSettings, Settings};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Driver identities the connection provider can serve
const SUPPORTED_DRIVERS: &[&str] = &["sqlite"];

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty
    /// - Driver must be a supported driver identity
    /// - A `sqlite` URL scheme must name a path
    /// - The path must name a file, not an in-memory database
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Please specify a SQLite file path or sqlite:// URL.",
            ));
        }

        if !SUPPORTED_DRIVERS.contains(&self.driver.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "database.driver".to_string(),
                message: format!(
                    "Unsupported driver '{}'. Supported drivers: {}",
                    self.driver,
                    SUPPORTED_DRIVERS.join(", ")
                ),
            });
        }

        if self.database_path().trim().is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL has a scheme but no path.",
            ));
        }

        // Every connection would open its own empty database
        let path = self.database_path().trim();
        if path == ":memory:" || path.contains("mode=memory") {
            return Err(ConfigError::validation(
                "database.url",
                "In-memory databases are not supported. Please specify a SQLite file path.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// Validate logger settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Plain levels are checked; anything with a directive is left to EnvFilter
        let level = self.level.to_lowercase();
        if !level.contains('=') && !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        if self.file.enabled {
            if self.file.path.trim().is_empty() {
                return Err(ConfigError::validation(
                    "logger.file.path",
                    "File path is required when file logging is enabled.",
                ));
            }

            if !VALID_LOG_FORMATS.contains(&self.file.format.to_lowercase().as_str()) {
                return Err(ConfigError::ValidationError {
                    field: "logger.file.format".to_string(),
                    message: format!(
                        "Invalid log format '{}'. Valid formats are: {}",
                        self.file.format,
                        VALID_LOG_FORMATS.join(", ")
                    ),
                });
            }
        }

        Ok(())
    }
}

impl Settings {
    /// Validate the complete settings tree
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logger.validate()?;
        Ok(())
    }
}
