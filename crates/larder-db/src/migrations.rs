//! Embedded schema migrations.
//!
//! Files in `crates/larder-db/migrations/` are compiled into the binary and
//! applied in filename order; sqlx records each one in `_sqlx_migrations`.
//! Add a new `NNN_description.sql` for every schema change instead of
//! editing an applied file.

use sqlx::migrate::Migrator;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies every pending migration.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

/// Number of embedded migrations not yet recorded as applied.
pub async fn pending_migrations(pool: &SqlitePool) -> DbResult<usize> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;

    Ok(MIGRATOR.migrations.len().saturating_sub(applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_nothing_pending_after_open() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(pending_migrations(db.pool()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migrations_can_be_deferred() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        run_migrations(db.pool()).await.unwrap();

        assert_eq!(pending_migrations(db.pool()).await.unwrap(), 0);
        assert!(db.products().count().await.is_ok());
    }
}
