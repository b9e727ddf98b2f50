//! Database migration management.
//!
//! SQL migrations are embedded at compile time and applied through `SQLx`'s
//! migration system, which tracks state in a `_sqlx_migrations` table.

use crate::error::{DatabaseError, Result};
use sqlx::{Pool, Sqlite};

/// Run all pending database migrations.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::info!("running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("database migrations completed");
    Ok(())
}

/// Get the current schema version.
///
/// Returns 0 when no migrations have been applied yet.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let table_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?
        > 0;

    if !table_exists {
        return Ok(0);
    }

    let version =
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_run_migrations_creates_tables() {
        let db = Database::open_in_memory().await.expect("open database");
        run_migrations(db.pool()).await.expect("run migrations");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name"
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");

        assert_eq!(
            tables,
            vec![
                "fee_overrides",
                "inventory_items",
                "opportunities",
                "price_quotes",
                "search_jobs",
                "stores",
            ]
        );
    }

    #[tokio::test]
    async fn test_get_schema_version() {
        let db = Database::open_in_memory().await.expect("open database");

        let version = get_schema_version(db.pool()).await.expect("get version");
        assert_eq!(version, 0);

        run_migrations(db.pool()).await.expect("run migrations");

        let version = get_schema_version(db.pool()).await.expect("get version");
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let db = Database::open_in_memory().await.expect("open database");

        run_migrations(db.pool()).await.expect("first migration run");
        run_migrations(db.pool())
            .await
            .expect("second migration run should be idempotent");

        let version = get_schema_version(db.pool()).await.expect("get version");
        assert_eq!(version, 1);
    }
}
