//! # Connection Pool
//!
//! Opens the SQLite store that backs scan resolution.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path)          file store, WAL, 4 connections           │
//! │  DbConfig::in_memory()        one pinned connection (tests)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Database::new(config) ──► SqlitePool ──► migrations                    │
//! │           │                                                             │
//! │           ├── products()        ProductRepository                       │
//! │           └── internal_codes()  InternalCodeRepository                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two scans of the same unknown barcode may insert at the same moment; the
//! loser waits up to `busy_timeout` for the write lock and then fails on the
//! UNIQUE(barcode) constraint, which the lookup layer reads back.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::internal_code::InternalCodeRepository;
use crate::repository::product::ProductRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the store lives and how many connections it may hold.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Default: 4
    pub max_connections: u32,

    /// How long a writer waits for SQLite's write lock.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed store. The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Private in-memory store.
    ///
    /// Every SQLite in-memory connection is a separate database, so the pool
    /// holds exactly one connection for its whole life.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        Ok(options
            .busy_timeout(self.busy_timeout)
            .foreign_keys(true))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(1);

        if self.is_in_memory() {
            // Dropping the only connection would drop the data with it.
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Duration::from_secs(600))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the product store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store and applies pending migrations.
    ///
    /// ## Errors
    /// * `DbError::ConnectionFailed` - The file cannot be opened or created
    /// * `DbError::MigrationFailed` - The schema could not be brought up to date
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening product store");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "SQLite pool ready");

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }

        Ok(db)
    }

    /// Fresh, migrated in-memory store.
    pub async fn in_memory() -> DbResult<Self> {
        Database::new(DbConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn internal_codes(&self) -> InternalCodeRepository {
        InternalCodeRepository::new(self.pool.clone())
    }

    /// Waits for in-flight queries and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Product store closed");
    }

    /// True when the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::in_memory().await.unwrap();

        assert!(db.health_check().await);
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_store_keeps_data_between_queries() {
        let db = Database::in_memory().await.unwrap();
        db.products()
            .insert(&larder_core::Product::template("4601234567890"))
            .await
            .unwrap();

        assert_eq!(db.products().count().await.unwrap(), 1);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let file = DbConfig::new("/tmp/larder-test.db").max_connections(0);
        assert_eq!(file.max_connections, 1);
        assert!(file.run_migrations);
        assert!(!file.is_in_memory());

        let memory = DbConfig::in_memory().run_migrations(false);
        assert!(memory.is_in_memory());
        assert_eq!(memory.max_connections, 1);
        assert!(!memory.run_migrations);
    }
}
