//! Scout Database Layer
//!
//! `SQLite` persistence for scraped inventory, marketplace quotes, ranked
//! opportunities, and search-job history. Uses `SQLx` with embedded,
//! versioned migrations.
//!
//! # Example
//!
//! ```ignore
//! use scout_db::Database;
//!
//! let db = Database::open("scout.db").await?;
//! db.run_migrations().await?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod fee_schedule;
pub mod inventory;
pub mod migrations;
pub mod opportunities;
pub mod quotes;
pub mod search_jobs;
pub mod stores;

pub use error::{DatabaseError, Result};
pub use search_jobs::{JobCounters, JobStatus, SearchJobRecord};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;

/// High-level database handle that owns the connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Sqlite>,
}

impl Database {
    /// Open (creating if necessary) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Open(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database.
    ///
    /// Pinned to a single pooled connection that never retires: each SQLite
    /// in-memory connection is its own database, so a second connection
    /// would see an empty schema.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Open(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Number of applied migrations.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Direct access to the `SQLx` pool for the table modules.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }

    /// Close the pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Parse an RFC 3339 timestamp column, falling back to now on corrupt data.
pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

/// Rebuild a product identity from its stored `upc:`/`sku:` key.
///
/// SKU identities re-derive the normalized name from the stored display
/// name; the key carries only the retailer SKU.
pub(crate) fn ident_from_key(
    key: &str,
    display_name: &str,
) -> Result<scout_core::ProductIdent> {
    if let Some(code) = key.strip_prefix("upc:") {
        scout_core::ProductIdent::upc(code).map_err(|e| DatabaseError::Decode(e.to_string()))
    } else if let Some(sku) = key.strip_prefix("sku:") {
        Ok(scout_core::ProductIdent::sku(sku, display_name))
    } else {
        Err(DatabaseError::Decode(format!(
            "unrecognized product key '{key}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_and_migrate() {
        let db = Database::open_in_memory().await.expect("open database");

        let before = db.get_schema_version().await.expect("get version");
        assert_eq!(before, 0);

        db.run_migrations().await.expect("run migrations");

        let after = db.get_schema_version().await.expect("get version");
        assert_eq!(after, 1);
    }

    #[tokio::test]
    async fn test_opportunities_natural_key_is_unique() {
        let db = Database::open_in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('opportunities') ORDER BY cid")
                .fetch_all(db.pool())
                .await
                .expect("query columns");

        assert!(columns.contains(&"is_valid".to_string()));
        assert!(columns.contains(&"invalidated_at".to_string()));
    }

    #[tokio::test]
    async fn test_close() {
        let db = Database::open_in_memory().await.expect("open database");
        db.close().await;
    }
}
