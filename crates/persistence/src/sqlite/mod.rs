//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod fund_repos;
pub mod repos;
pub mod schema;

pub use fund_repos::{DepositRepo, WithdrawalRepo};
pub use repos::{AccountRepo, BalanceRepo, InvestorRepo, LedgerFilter, LedgerRepo, Page};
pub use schema::{
    parse_decimal, AccountRow, AuditRow, BalanceRow, DepositRow, InvestorRow, LedgerEntryRow,
    LedgerLineRow, WithdrawalRow,
};

use crate::error::PersistenceResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// How long a writer waits on another connection's lock before giving up
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Run embedded migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Open (creating if missing) a database file and run migrations
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Start a transaction that takes the database write lock up front.
///
/// A deferred transaction that reads and then writes cannot wait for the lock
/// held by a concurrent writer; SQLite fails it with SQLITE_BUSY immediately.
/// Every read-modify-write workflow opens its transaction here instead.
pub async fn begin_write(pool: &SqlitePool) -> PersistenceResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Fresh in-memory database with the schema applied.
///
/// A single connection, since every SQLite in-memory connection is its own
/// database.
pub async fn memory_pool() -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_transactions_serialize() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("navfund.db").display());
        let pool = init_database(&url).await.unwrap();

        // A second handle on the same file that refuses to wait for locks
        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .busy_timeout(Duration::ZERO);
        let impatient = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        let holder = begin_write(&pool).await.unwrap();
        let err = match begin_write(&impatient).await {
            Ok(_) => panic!("second writer acquired the lock"),
            Err(err) => err,
        };
        assert!(err.is_busy(), "unexpected {err:?}");
        assert!(!err.is_unique_violation());

        holder.rollback().await.unwrap();
        let tx = begin_write(&impatient).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_begin_write_on_memory_pool() {
        let pool = memory_pool().await.unwrap();
        let mut tx = begin_write(&pool).await.unwrap();
        let entries = crate::LedgerRepo::count_entries(&mut tx).await.unwrap();
        assert_eq!(entries, 0);
        tx.commit().await.unwrap();
        assert!(!PersistenceError::not_found("Deposit", "d").is_busy());
    }
}
