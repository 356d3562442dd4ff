//! Temp-file SQLite stores shared by repository tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tempfile::TempDir;

use crate::config::DatabaseConfig;
use crate::db::{ConnectionProvider, SqliteConnectionProvider};
use crate::error::{AppError, AppResult};

/// Provider that counts connections and can be switched off.
pub(crate) struct CountingProvider {
    inner: SqliteConnectionProvider,
    connects: AtomicUsize,
    broken: AtomicBool,
}

impl ConnectionProvider for CountingProvider {
    fn connect(&self) -> AppResult<SqliteConnection> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(AppError::Connection {
                target: self.describe(),
                source: anyhow::anyhow!("provider switched off"),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// A migrated database file that lives as long as the value.
pub(crate) struct TestStore {
    provider: Arc<CountingProvider>,
    _dir: TempDir,
}

impl TestStore {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("moto.db").display()),
            ..DatabaseConfig::default()
        };
        let inner = SqliteConnectionProvider::new(config).expect("provider");
        inner.migrate().expect("migrations");

        Self {
            provider: Arc::new(CountingProvider {
                inner,
                connects: AtomicUsize::new(0),
                broken: AtomicBool::new(false),
            }),
            _dir: dir,
        }
    }

    pub(crate) fn provider(&self) -> Arc<dyn ConnectionProvider> {
        self.provider.clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.provider.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn break_connections(&self) {
        self.provider.broken.store(true, Ordering::SeqCst);
    }

    /// Runs raw SQL on a side connection that is not counted.
    pub(crate) fn execute(&self, sql: &str) {
        let mut conn = self.provider.inner.connect().expect("connection");
        diesel::sql_query(sql).execute(&mut conn).expect(sql);
    }

    pub(crate) fn count(&self, sql: &str) -> i64 {
        #[derive(QueryableByName)]
        struct Count {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            n: i64,
        }

        let mut conn = self.provider.inner.connect().expect("connection");
        diesel::sql_query(sql)
            .get_result::<Count>(&mut conn)
            .expect(sql)
            .n
    }
}
