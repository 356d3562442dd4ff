use crate::config::error::ConfigError;
use crate::error::DatabaseErrorConverter;
use thiserror::Error;

/// Crate-wide error type for every repository and store operation.
///
/// A missing row is never an error at the repository contract level (it is
/// `Ok(None)`); `NotFound` is only produced when a lower layer demands a row
/// that must exist.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Uniqueness conflict reported by the store
    #[error("Duplicate entry: {entity}.{field} already exists")]
    Duplicate { entity: String, field: String },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Store rejected or failed a statement
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// The connection provider could not hand out a usable connection
    #[error("Connection failed: {target}")]
    Connection {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn database(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Database {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Whether the store refused the write because the row already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Duplicate { .. })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(error: diesel::result::Error) -> Self {
        DatabaseErrorConverter::convert_diesel_error(error, "database operation")
    }
}

impl From<diesel::ConnectionError> for AppError {
    fn from(error: diesel::ConnectionError) -> Self {
        AppError::Connection {
            target: "sqlite".to_string(),
            source: anyhow::Error::from(error),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|key| key.to_string())
            .unwrap_or_else(|| "entity".to_string());
        AppError::Validation {
            field,
            reason: errors.to_string(),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let key = match &error {
            ConfigError::ValidationError { field, .. } => field.clone(),
            _ => "settings".to_string(),
        };
        AppError::Configuration {
            key,
            source: anyhow::Error::from(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
