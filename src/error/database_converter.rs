use crate::error::{AppError, ConstraintParser};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Utility for converting diesel errors into structured `AppError` variants.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    /// Converts a Diesel error to an appropriate AppError variant.
    ///
    /// # Arguments
    /// * `error` - The Diesel error to convert
    /// * `operation` - Description of the database operation that failed
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info, operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        info: Box<dyn diesel::result::DatabaseErrorInformation + Send + Sync>,
        operation: &str,
    ) -> AppError {
        let message = info.message();

        match kind {
            DatabaseErrorKind::UniqueViolation => {
                match ConstraintParser::parse_unique_violation(message) {
                    Some((entity, field)) => AppError::Duplicate { entity, field },
                    None => AppError::Database {
                        operation: operation.to_string(),
                        source: anyhow::anyhow!("Unique constraint violation: {}", message),
                    },
                }
            }
            DatabaseErrorKind::NotNullViolation => {
                match ConstraintParser::parse_not_null_violation(message) {
                    Some((entity, field)) => AppError::Validation {
                        field,
                        reason: format!("Field is required for {}", entity),
                    },
                    None => AppError::Database {
                        operation: operation.to_string(),
                        source: anyhow::anyhow!("Not null constraint violation: {}", message),
                    },
                }
            }
            DatabaseErrorKind::CheckViolation => {
                let constraint = ConstraintParser::parse_check_violation(message)
                    .unwrap_or_else(|| "check".to_string());
                AppError::Validation {
                    field: constraint,
                    reason: format!("Check constraint failed: {}", message),
                }
            }
            _ => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::anyhow!("Database error: {}", message),
            },
        }
    }
}
