//! Unit of work over a single SQLite connection.
//!
//! Opening a transaction suspends SQLite autocommit for every statement the
//! closure runs. COMMIT or ROLLBACK hands the connection back in autocommit
//! mode, whichever way the work ends.

use diesel::connection::{Connection, TransactionManager};
use diesel::sqlite::SqliteConnection;

use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::events::{EventSink, RepositoryEvent};

type SqliteTransactionManager = <SqliteConnection as Connection>::TransactionManager;

/// Lifecycle of one unit of work.
///
/// Success runs `Started -> Committing -> Committed`; any failure runs
/// `Started -> RollingBack -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    Started,
    Committing,
    Committed,
    RollingBack,
    Failed,
}

impl UnitOfWorkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfWorkState::Started => "started",
            UnitOfWorkState::Committing => "committing",
            UnitOfWorkState::Committed => "committed",
            UnitOfWorkState::RollingBack => "rolling_back",
            UnitOfWorkState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitOfWorkState::Committed | UnitOfWorkState::Failed)
    }
}

impl std::fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs a closure as one all-or-nothing span of statements.
pub struct UnitOfWork;

impl UnitOfWork {
    /// Execute `work` inside a transaction on `conn`.
    ///
    /// Commits when `work` returns `Ok`, rolls back when it returns `Err` or
    /// when the commit itself fails. The original error is always the one
    /// returned; a failed rollback is only logged. Units of work do not nest.
    pub fn run<T, F>(
        conn: &mut SqliteConnection,
        operation: &str,
        sink: &dyn EventSink,
        work: F,
    ) -> AppResult<T>
    where
        F: FnOnce(&mut SqliteConnection) -> AppResult<T>,
    {
        let depth = SqliteTransactionManager::transaction_manager_status_mut(conn)
            .transaction_depth()
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, operation))?;
        if depth.is_some() {
            return Err(AppError::Internal {
                source: anyhow::anyhow!("nested unit of work '{}' is not supported", operation),
            });
        }

        SqliteTransactionManager::begin_transaction(conn)
            .map_err(|e| DatabaseErrorConverter::convert_diesel_error(e, operation))?;
        Self::emit(sink, operation, UnitOfWorkState::Started);

        let error = match work(conn) {
            Ok(value) => {
                Self::emit(sink, operation, UnitOfWorkState::Committing);
                match SqliteTransactionManager::commit_transaction(conn) {
                    Ok(()) => {
                        Self::emit(sink, operation, UnitOfWorkState::Committed);
                        return Ok(value);
                    }
                    Err(e) => DatabaseErrorConverter::convert_diesel_error(e, operation),
                }
            }
            Err(e) => e,
        };

        Self::roll_back(conn, operation, sink);
        tracing::warn!(operation, error = %error, "Unit of work rolled back");
        Err(error)
    }

    fn roll_back(conn: &mut SqliteConnection, operation: &str, sink: &dyn EventSink) {
        Self::emit(sink, operation, UnitOfWorkState::RollingBack);

        // A failed COMMIT may already have closed the transaction
        let open = SqliteTransactionManager::transaction_manager_status_mut(conn)
            .transaction_depth()
            .map(|depth| depth.is_some())
            .unwrap_or(true);
        if open {
            if let Err(rollback_error) = SqliteTransactionManager::rollback_transaction(conn) {
                tracing::error!(operation, error = %rollback_error, "Failed to roll back unit of work");
            }
        }

        Self::emit(sink, operation, UnitOfWorkState::Failed);
    }

    fn emit(sink: &dyn EventSink, operation: &str, state: UnitOfWorkState) {
        sink.record(&RepositoryEvent::UnitOfWork {
            operation: operation.to_string(),
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use crate::events::MemoryEventSink;
    use diesel::prelude::*;

    fn migrated() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    fn team_count(conn: &mut SqliteConnection) -> i64 {
        use crate::schema::teams::dsl::*;
        teams.count().get_result(conn).unwrap()
    }

    fn insert_team(conn: &mut SqliteConnection, team_name: &str) -> AppResult<usize> {
        use crate::schema::teams::dsl::*;
        diesel::insert_into(teams)
            .values(name.eq(team_name))
            .execute(conn)
            .map_err(AppError::from)
    }

    fn states(sink: &MemoryEventSink) -> Vec<UnitOfWorkState> {
        sink.events()
            .into_iter()
            .filter_map(|event| match event {
                RepositoryEvent::UnitOfWork { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_commit_transitions() {
        let mut conn = migrated();
        let sink = MemoryEventSink::new();

        let inserted = UnitOfWork::run(&mut conn, "teams.insert", &sink, |conn| {
            insert_team(conn, "Ferrari")?;
            insert_team(conn, "McLaren")
        })
        .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(team_count(&mut conn), 2);
        assert_eq!(
            states(&sink),
            vec![
                UnitOfWorkState::Started,
                UnitOfWorkState::Committing,
                UnitOfWorkState::Committed
            ]
        );
    }

    #[test]
    fn test_failure_rolls_back_every_statement() {
        let mut conn = migrated();
        let sink = MemoryEventSink::new();

        let result = UnitOfWork::run(&mut conn, "teams.insert", &sink, |conn| {
            insert_team(conn, "Ferrari")?;
            // Unique name violation
            insert_team(conn, "Ferrari")
        });

        assert!(matches!(result, Err(AppError::Duplicate { .. })));
        assert_eq!(team_count(&mut conn), 0);
        assert_eq!(
            states(&sink),
            vec![
                UnitOfWorkState::Started,
                UnitOfWorkState::RollingBack,
                UnitOfWorkState::Failed
            ]
        );
    }

    #[test]
    fn test_connection_returns_to_autocommit() {
        let mut conn = migrated();
        let sink = MemoryEventSink::new();

        let _ = UnitOfWork::run(&mut conn, "noop", &sink, |_| -> AppResult<()> {
            Err(AppError::validation("race", "rejected"))
        });

        let depth = SqliteTransactionManager::transaction_manager_status_mut(&mut conn)
            .transaction_depth()
            .unwrap();
        assert!(depth.is_none());

        // Autocommit: this write survives without an explicit commit
        insert_team(&mut conn, "Williams").unwrap();
        assert_eq!(team_count(&mut conn), 1);
    }

    #[test]
    fn test_nested_unit_of_work_rejected() {
        let mut conn = migrated();
        let sink = MemoryEventSink::new();

        let result = UnitOfWork::run(&mut conn, "outer", &sink, |conn| {
            insert_team(conn, "Ferrari")?;
            UnitOfWork::run(conn, "inner", &MemoryEventSink::new(), |conn| {
                insert_team(conn, "McLaren")
            })
        });

        assert!(matches!(result, Err(AppError::Internal { .. })));
        assert_eq!(team_count(&mut conn), 0);
    }
}
