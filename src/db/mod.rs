//! Database module for pinboard.
//!
//! This module provides the connection pool and migration management. SQLite
//! is the default backend; the `postgres` feature swaps in PostgreSQL, whose
//! row locks let moves in disjoint containers proceed side by side.
//! The store is the authority for every board, list, card and membership row;
//! the cache only ever holds copies of it.

mod schema;
mod user;

pub use schema::MIGRATIONS;
pub use user::{NewUser, User, UserRepository};

#[cfg(feature = "sqlite")]
use std::path::Path;
#[cfg(feature = "sqlite")]
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "postgres")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::Transaction;
use tracing::{debug, info};

use crate::{PinboardError, Result};

#[cfg(all(feature = "sqlite", feature = "postgres"))]
compile_error!("the `sqlite` and `postgres` features are mutually exclusive");

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable one of the `sqlite` or `postgres` features");

/// Database backend selected at build time.
#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

/// Database backend selected at build time.
#[cfg(feature = "postgres")]
pub type Db = sqlx::Postgres;

/// Connection pool type used by every repository.
pub type DbPool = sqlx::Pool<Db>;

/// A single connection, as borrowed from a transaction.
pub type DbConnection = <Db as sqlx::Database>::Connection;

/// Transaction type handed to multi-statement operations.
pub type DbTransaction = Transaction<'static, Db>;

/// Current UTC time as stored in the TEXT timestamp columns.
#[cfg(feature = "sqlite")]
pub(crate) const SQL_NOW: &str = "datetime('now')";

/// Current UTC time as stored in the TEXT timestamp columns.
#[cfg(feature = "postgres")]
pub(crate) const SQL_NOW: &str =
    "to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')";

/// Busy timeout applied to every connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database wrapper owning the connection pool.
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open a database at the specified path.
    ///
    /// The file is created if missing and migrations are applied.
    #[cfg(feature = "sqlite")]
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| PinboardError::DatabaseConnection(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| PinboardError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to a PostgreSQL database by URL and apply migrations.
    #[cfg(feature = "postgres")]
    pub async fn open(url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(BUSY_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| PinboardError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// A single long-lived connection backs the pool; every pooled connection
    /// to `:memory:` would otherwise see its own empty database.
    #[cfg(feature = "sqlite")]
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| PinboardError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Begin a new transaction.
    pub async fn begin(&self) -> Result<DbTransaction> {
        self.pool
            .begin()
            .await
            .map_err(|e| PinboardError::Transaction(e.to_string()))
    }

    /// Begin a read-only transaction whose statements all see one snapshot.
    ///
    /// SQLite pins the snapshot at the first read of a deferred transaction;
    /// PostgreSQL needs REPEATABLE READ for the same guarantee.
    pub async fn begin_snapshot(&self) -> Result<DbTransaction> {
        #[allow(unused_mut)]
        let mut tx = self.begin().await?;
        #[cfg(feature = "postgres")]
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| PinboardError::Transaction(e.to_string()))?;
        Ok(tx)
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        if !self.table_exists("schema_version").await? {
            return Ok(0);
        }

        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;

        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        let create = format!(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     BIGINT PRIMARY KEY,
                applied_at  TEXT NOT NULL DEFAULT ({SQL_NOW})
            )"
        );
        sqlx::query(&create).execute(&self.pool).await?;

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            debug!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        info!(
            "Database migration complete (now at version {})",
            MIGRATIONS.len()
        );
        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        #[cfg(feature = "sqlite")]
        let sql = "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = $1)";
        #[cfg(feature = "postgres")]
        let sql = "SELECT EXISTS(SELECT 1 FROM information_schema.tables
                     WHERE table_schema = current_schema() AND table_name = $1)";

        let exists: bool = sqlx::query_scalar(sql)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_tables_exist() {
        let db = Database::open_in_memory().await.unwrap();
        for table in ["users", "boards", "board_members", "lists", "cards"] {
            assert!(db.table_exists(table).await.unwrap(), "missing {table}");
        }
        assert!(!db.table_exists("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().await.unwrap();
        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let db = Database::open_in_memory().await.unwrap();
        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query("INSERT INTO users (name, email) VALUES ('a', 'a@example.com')")
                .execute(&mut *tx)
                .await
                .unwrap();
            // dropped without commit
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pinboard.db");

        {
            let db = Database::open(&path, 2).await.unwrap();
            assert!(db.table_exists("cards").await.unwrap());
            db.pool().close().await;
        }

        let db = Database::open(&path, 2).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
    }

    async fn count_users(conn: &mut DbConnection) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_ignores_later_commits() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("snap.db"), 2).await.unwrap();
        sqlx::query("INSERT INTO users (name, email) VALUES ('a', 'a@example.com')")
            .execute(db.pool())
            .await
            .unwrap();

        let mut snapshot = db.begin_snapshot().await.unwrap();
        assert_eq!(count_users(&mut snapshot).await, 1);

        // A writer commits on the other connection while the snapshot is open.
        sqlx::query("INSERT INTO users (name, email) VALUES ('b', 'b@example.com')")
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(count_users(&mut snapshot).await, 1);
        snapshot.commit().await.unwrap();

        let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(after, 2);
    }
}
