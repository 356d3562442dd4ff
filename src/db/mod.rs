//! Store access module.
//!
//! Provides synchronous SQLite connections through diesel, the embedded schema
//! migrations, and the unit of work used for multi-statement writes.

mod provider;
mod unit_of_work;

pub use provider::{ConnectionProvider, SqliteConnectionProvider};
pub use unit_of_work::{UnitOfWork, UnitOfWorkState};

use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::error::{AppError, AppResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies every pending migration and returns the versions that ran.
pub fn run_migrations(conn: &mut SqliteConnection) -> AppResult<Vec<String>> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| AppError::database("run migrations", anyhow::anyhow!(e)))?;

    let versions: Vec<String> = applied.iter().map(|v| v.to_string()).collect();
    if !versions.is_empty() {
        tracing::info!(count = versions.len(), versions = ?versions, "Applied database migrations");
    }
    Ok(versions)
}
