//! Connection provider handing out one ready SQLite connection per call.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// Capability the repositories depend on to reach the store.
///
/// Implementations own timeouts and retry; repositories neither pool nor
/// retry connections.
pub trait ConnectionProvider: Send + Sync {
    /// Opens a usable connection or fails with `AppError::Connection`.
    fn connect(&self) -> AppResult<SqliteConnection>;

    /// Human-readable target for logs and errors.
    fn describe(&self) -> String;
}

/// Opens a fresh SQLite connection for every `connect()` call.
#[derive(Debug, Clone)]
pub struct SqliteConnectionProvider {
    config: DatabaseConfig,
}

impl SqliteConnectionProvider {
    pub fn new(config: DatabaseConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Builds a provider from a flat key-value property set (`url`, `driver`,
    /// `username`, `password`, `busy_timeout_ms`).
    ///
    /// SQLite has no authentication, so credentials are accepted and ignored.
    pub fn from_properties(props: &HashMap<String, String>) -> AppResult<Self> {
        let config = DatabaseConfig::from_properties(props)?;
        Self::new(config)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Applies pending migrations on a new connection.
    pub fn migrate(&self) -> AppResult<Vec<String>> {
        let mut conn = self.connect()?;
        super::run_migrations(&mut conn)
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    fn connect(&self) -> AppResult<SqliteConnection> {
        let path = self.config.database_path();
        let mut conn = SqliteConnection::establish(path).map_err(|e| AppError::Connection {
            target: self.describe(),
            source: anyhow::Error::from(e),
        })?;

        diesel::sql_query(format!("PRAGMA busy_timeout = {}", self.config.busy_timeout_ms))
            .execute(&mut conn)
            .map_err(|e| AppError::Connection {
                target: self.describe(),
                source: anyhow::Error::from(e),
            })?;

        tracing::trace!(target_db = %path, "Opened store connection");
        Ok(conn)
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.config.driver, self.config.database_path())
    }
}
