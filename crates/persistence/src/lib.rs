//! # NavFund Persistence
//!
//! Persistence layer for NavFund - a single SQLite database is the sole
//! authority for accounts, ledger, fund records and the audit log.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use navfund_persistence::{begin_write, Database, DepositRepo};
//!
//! let db = Database::open("sqlite:navfund.db").await?;
//!
//! let mut tx = begin_write(db.pool()).await?;
//! let deposit = DepositRepo::get(&mut tx, "dep-1").await?;
//! tx.commit().await?;
//! ```

pub mod audit;
pub mod error;
pub mod sqlite;

pub use audit::{
    compute_audit_hash, verify_audit_chain, AuditChainError, AuditRepo, NewAuditEntry,
    GENESIS_HASH,
};
pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::{
    begin_write, init_database, memory_pool, run_migrations, AccountRepo, BalanceRepo,
    DepositRepo, InvestorRepo, LedgerFilter, LedgerRepo, Page, WithdrawalRepo, BUSY_TIMEOUT,
};
pub use sqlite::schema::{parse_decimal, BalanceRow, LedgerEntryRow, LedgerLineRow};

use sqlx::SqlitePool;

/// Database facade
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a database URL (e.g. "sqlite:navfund.db") and run migrations
    pub async fn open(db_url: &str) -> PersistenceResult<Self> {
        let pool = init_database(db_url).await?;
        tracing::info!(url = %db_url, "Database opened");
        Ok(Self { pool })
    }

    /// In-memory database, used by tests and dry runs
    pub async fn in_memory() -> PersistenceResult<Self> {
        Ok(Self {
            pool: memory_pool().await?,
        })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("navfund.db");
        let url = format!("sqlite:{}", path.display());

        let db = Database::open(&url).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(LedgerRepo::count_entries(&mut conn).await.unwrap(), 0);
        drop(conn);
        db.pool().close().await;

        // Reopening re-runs migrations idempotently
        let db = Database::open(&url).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(AccountRepo::get_all(&mut conn).await.unwrap().is_empty());
    }
}
