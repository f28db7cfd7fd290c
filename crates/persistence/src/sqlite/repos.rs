//! Repository implementations for SQLite
//!
//! Every function takes `&mut SqliteConnection`, so callers can run them on a
//! pooled connection (`&mut *pool.acquire().await?`) or inside an open
//! transaction (`&mut *tx`).

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use navfund_core::{Account, Investor};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

// ============================================================================
// Account Repository
// ============================================================================

/// Repository for the chart of accounts
pub struct AccountRepo;

impl AccountRepo {
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Account> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Account", id))?
            .try_into()
    }

    pub async fn find_by_code(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> PersistenceResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE code = ?")
            .bind(code)
            .fetch_optional(conn)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO accounts (id, code, name, account_type, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_ref())
        .bind(account.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts ORDER BY code")
            .fetch_all(conn)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }
}

// ============================================================================
// Ledger Repository
// ============================================================================

/// Filter for listing ledger entries. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: Option<String>,
    /// Entries with at least one line on this account
    pub account_id: Option<String>,
    /// Entries with at least one line attributed to this investor
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Offset pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: offset.max(0),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 50)
    }
}

/// Repository for ledger entries and lines (append-only)
pub struct LedgerRepo;

impl LedgerRepo {
    pub async fn insert_entry(
        conn: &mut SqliteConnection,
        entry: &LedgerEntryRow,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, description, reference_type, reference_id, created_by, created_at, reversal_of_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.description)
        .bind(&entry.reference_type)
        .bind(&entry.reference_id)
        .bind(&entry.created_by)
        .bind(entry.created_at)
        .bind(&entry.reversal_of_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn insert_line(
        conn: &mut SqliteConnection,
        line: &LedgerLineRow,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_lines
                (entry_id, line_no, account_id, side, amount, user_id, description)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&line.entry_id)
        .bind(line.line_no)
        .bind(&line.account_id)
        .bind(&line.side)
        .bind(&line.amount)
        .bind(&line.user_id)
        .bind(&line.description)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get_entry(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<LedgerEntryRow> {
        sqlx::query_as::<_, LedgerEntryRow>("SELECT * FROM ledger_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("LedgerEntry", id))
    }

    pub async fn get_lines(
        conn: &mut SqliteConnection,
        entry_id: &str,
    ) -> PersistenceResult<Vec<LedgerLineRow>> {
        let rows = sqlx::query_as::<_, LedgerLineRow>(
            r#"
            SELECT entry_id, line_no, account_id, side, amount, user_id, description
            FROM ledger_lines WHERE entry_id = ? ORDER BY line_no
            "#,
        )
        .bind(entry_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// The entry reversing `original_id`, if one exists
    pub async fn find_reversal(
        conn: &mut SqliteConnection,
        original_id: &str,
    ) -> PersistenceResult<Option<LedgerEntryRow>> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries WHERE reversal_of_id = ?",
        )
        .bind(original_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn list_entries(
        conn: &mut SqliteConnection,
        filter: &LedgerFilter,
        page: Page,
    ) -> PersistenceResult<Vec<LedgerEntryRow>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT e.* FROM ledger_entries e WHERE 1 = 1");

        if let Some(reference_type) = &filter.reference_type {
            qb.push(" AND e.reference_type = ").push_bind(reference_type.clone());
        }
        if let Some(reference_id) = &filter.reference_id {
            qb.push(" AND e.reference_id = ").push_bind(reference_id.clone());
        }
        if let Some(created_by) = &filter.created_by {
            qb.push(" AND e.created_by = ").push_bind(created_by.clone());
        }
        if let Some(from) = filter.from {
            qb.push(" AND e.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND e.created_at < ").push_bind(to);
        }
        if filter.account_id.is_some() || filter.user_id.is_some() {
            qb.push(" AND EXISTS (SELECT 1 FROM ledger_lines l WHERE l.entry_id = e.id");
            if let Some(account_id) = &filter.account_id {
                qb.push(" AND l.account_id = ").push_bind(account_id.clone());
            }
            if let Some(user_id) = &filter.user_id {
                qb.push(" AND l.user_id = ").push_bind(user_id.clone());
            }
            qb.push(")");
        }

        qb.push(" ORDER BY e.created_at, e.rowid LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = qb
            .build_query_as::<LedgerEntryRow>()
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Every line touching an account, optionally only those tagged to an investor
    pub async fn lines_for_account(
        conn: &mut SqliteConnection,
        account_id: &str,
        user_id: Option<&str>,
    ) -> PersistenceResult<Vec<LedgerLineRow>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, LedgerLineRow>(
                    r#"
                    SELECT entry_id, line_no, account_id, side, amount, user_id, description
                    FROM ledger_lines WHERE account_id = ? AND user_id = ?
                    "#,
                )
                .bind(account_id)
                .bind(user_id)
                .fetch_all(conn)
                .await?
            }
            None => {
                sqlx::query_as::<_, LedgerLineRow>(
                    r#"
                    SELECT entry_id, line_no, account_id, side, amount, user_id, description
                    FROM ledger_lines WHERE account_id = ?
                    "#,
                )
                .bind(account_id)
                .fetch_all(conn)
                .await?
            }
        };
        Ok(rows)
    }

    pub async fn all_entries(
        conn: &mut SqliteConnection,
    ) -> PersistenceResult<Vec<LedgerEntryRow>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries ORDER BY created_at, rowid",
        )
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn all_lines(conn: &mut SqliteConnection) -> PersistenceResult<Vec<LedgerLineRow>> {
        let rows = sqlx::query_as::<_, LedgerLineRow>(
            r#"
            SELECT entry_id, line_no, account_id, side, amount, user_id, description
            FROM ledger_lines ORDER BY entry_id, line_no
            "#,
        )
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    pub async fn count_entries(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Balance Repository (materialized view)
// ============================================================================

/// Repository for the per-account materialized totals
pub struct BalanceRepo;

impl BalanceRepo {
    pub async fn get(
        conn: &mut SqliteConnection,
        account_id: &str,
    ) -> PersistenceResult<Option<BalanceRow>> {
        let row = sqlx::query_as::<_, BalanceRow>(
            "SELECT * FROM account_balances WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<BalanceRow>> {
        let rows = sqlx::query_as::<_, BalanceRow>("SELECT * FROM account_balances")
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Add debit/credit deltas to an account's totals.
    ///
    /// Must run inside the transaction that posts the lines.
    pub async fn apply(
        conn: &mut SqliteConnection,
        account_id: &str,
        debit: Decimal,
        credit: Decimal,
        at: DateTime<Utc>,
    ) -> PersistenceResult<(Decimal, Decimal)> {
        let (current_debits, current_credits) = match Self::get(&mut *conn, account_id).await? {
            Some(row) => (
                parse_decimal("total_debits", &row.total_debits)?,
                parse_decimal("total_credits", &row.total_credits)?,
            ),
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let total_debits = current_debits + debit;
        let total_credits = current_credits + credit;

        sqlx::query(
            r#"
            INSERT INTO account_balances (account_id, total_debits, total_credits, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                total_debits = excluded.total_debits,
                total_credits = excluded.total_credits,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account_id)
        .bind(total_debits.to_string())
        .bind(total_credits.to_string())
        .bind(at)
        .execute(conn)
        .await?;

        Ok((total_debits, total_credits))
    }
}

// ============================================================================
// Investor Repository
// ============================================================================

/// Repository for registered investors
pub struct InvestorRepo;

impl InvestorRepo {
    pub async fn find(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> PersistenceResult<Option<Investor>> {
        let row = sqlx::query_as::<_, InvestorRow>("SELECT * FROM investors WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
        Ok(row.map(Investor::from))
    }

    pub async fn insert(conn: &mut SqliteConnection, investor: &Investor) -> PersistenceResult<()> {
        let result = sqlx::query(
            "INSERT INTO investors (user_id, display_name, active, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&investor.user_id)
        .bind(&investor.display_name)
        .bind(investor.active)
        .bind(investor.created_at)
        .execute(conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = PersistenceError::from(e);
                if err.is_unique_violation() {
                    Err(PersistenceError::already_exists("Investor", &investor.user_id))
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn set_active(
        conn: &mut SqliteConnection,
        user_id: &str,
        active: bool,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE investors SET active = ? WHERE user_id = ?")
            .bind(active)
            .bind(user_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Investor", user_id));
        }
        Ok(())
    }

    pub async fn count_active(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM investors WHERE active = 1")
            .fetch_one(conn)
            .await?;
        Ok(row.0)
    }

    pub async fn get_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<Investor>> {
        let rows = sqlx::query_as::<_, InvestorRow>("SELECT * FROM investors ORDER BY user_id")
            .fetch_all(conn)
            .await?;
        Ok(rows.into_iter().map(Investor::from).collect())
    }
}
