//! Pool-level ledger facade
//!
//! Wraps the posting engine so standalone callers get one transaction per
//! call. Workflows that need to combine ledger writes with their own updates
//! use the functions in [`crate::engine`] on their transaction instead.

use crate::engine::{self, AccountBalance, BalanceSheet, IntegrityReport};
use crate::entry::{LedgerEntry, NewEntry};
use crate::error::LedgerResult;
use crate::registry::AccountRegistry;
use navfund_core::{Account, AccountType, Clock, SystemClock};
use navfund_persistence::{begin_write, LedgerFilter, Page};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct LedgerService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl LedgerService {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn get_or_create_account(
        &self,
        code: &str,
        name: &str,
        account_type: AccountType,
    ) -> LedgerResult<Account> {
        let mut conn = self.pool.acquire().await?;
        AccountRegistry::get_or_create(&mut conn, code, name, account_type, self.clock.now()).await
    }

    pub async fn create_entry(&self, entry: NewEntry) -> LedgerResult<LedgerEntry> {
        let mut tx = begin_write(&self.pool).await?;
        let posted = engine::post_entry(&mut tx, entry, self.clock.now()).await?;
        tx.commit().await?;
        Ok(posted)
    }

    pub async fn create_reversal(
        &self,
        entry_id: &str,
        reason: &str,
        actor_id: &str,
    ) -> LedgerResult<LedgerEntry> {
        let mut tx = begin_write(&self.pool).await?;
        let posted =
            engine::reverse_entry(&mut tx, entry_id, reason, actor_id, self.clock.now()).await?;
        tx.commit().await?;
        Ok(posted)
    }

    pub async fn get_entry(&self, entry_id: &str) -> LedgerResult<LedgerEntry> {
        let mut conn = self.pool.acquire().await?;
        engine::get_entry(&mut conn, entry_id).await
    }

    pub async fn get_account_balance(
        &self,
        account_id: &str,
        user_id: Option<&str>,
    ) -> LedgerResult<AccountBalance> {
        let mut conn = self.pool.acquire().await?;
        engine::account_balance(&mut conn, account_id, user_id).await
    }

    pub async fn verify_integrity(&self) -> LedgerResult<IntegrityReport> {
        let mut conn = self.pool.acquire().await?;
        engine::verify_integrity(&mut conn).await
    }

    pub async fn list_entries(
        &self,
        filter: &LedgerFilter,
        page: Page,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        engine::list_entries(&mut conn, filter, page).await
    }

    pub async fn balance_sheet(&self) -> LedgerResult<BalanceSheet> {
        let mut conn = self.pool.acquire().await?;
        engine::balance_sheet(&mut conn, self.clock.now()).await
    }
}
