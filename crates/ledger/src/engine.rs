//! Posting engine
//!
//! Connection-level ledger operations. Each function takes a
//! `&mut SqliteConnection` so callers compose them inside their own
//! transaction together with workflow updates and audit records.

use crate::entry::{EntryBuilder, LedgerEntry, LedgerLine, NewEntry, REVERSAL_REFERENCE};
use crate::error::{LedgerError, LedgerResult};
use crate::registry::AccountRegistry;
use crate::validation::side_totals;
use chrono::{DateTime, Utc};
use navfund_core::{AccountType, Side};
use navfund_persistence::{
    parse_decimal, BalanceRepo, LedgerEntryRow, LedgerFilter, LedgerLineRow, LedgerRepo, Page,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::collections::BTreeMap;

/// Balance of one account, optionally restricted to one investor's lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: String,
    pub account_type: AccountType,
    pub user_id: Option<String>,
    /// Signed by the account's normal side: positive means the account holds value
    pub balance: Decimal,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

/// Balance of an account given its type and side totals
pub fn normal_balance(account_type: AccountType, debits: Decimal, credits: Decimal) -> Decimal {
    match account_type.normal_balance() {
        Side::Debit => debits - credits,
        Side::Credit => credits - debits,
    }
}

/// Validate and commit an entry, updating materialized balances.
///
/// Call inside a transaction: the entry, its lines and the balance deltas
/// must commit together.
pub async fn post_entry(
    conn: &mut SqliteConnection,
    entry: NewEntry,
    at: DateTime<Utc>,
) -> LedgerResult<LedgerEntry> {
    entry.validate()?;

    // Resolve every account before the first write
    for line in &entry.lines {
        AccountRegistry::get(&mut *conn, &line.account_id).await?;
    }

    let entry_row = LedgerEntryRow {
        id: uuid::Uuid::new_v4().to_string(),
        description: entry.description,
        reference_type: entry.reference_type,
        reference_id: entry.reference_id,
        created_by: entry.created_by,
        created_at: at,
        reversal_of_id: entry.reversal_of_id,
    };

    match LedgerRepo::insert_entry(&mut *conn, &entry_row).await {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() && entry_row.reversal_of_id.is_some() => {
            let original = entry_row.reversal_of_id.clone().unwrap_or_default();
            let existing = LedgerRepo::find_reversal(&mut *conn, &original).await?;
            return Err(LedgerError::AlreadyReversed {
                entry_id: original,
                reversal_id: existing.map(|r| r.id).unwrap_or_default(),
            });
        }
        Err(e) => return Err(e.into()),
    }

    let mut deltas: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    let mut lines = Vec::with_capacity(entry.lines.len());

    for (idx, posting) in entry.lines.into_iter().enumerate() {
        let line_row = LedgerLineRow {
            entry_id: entry_row.id.clone(),
            line_no: idx as i64 + 1,
            account_id: posting.account_id,
            side: posting.side.as_ref().to_string(),
            amount: posting.amount.to_string(),
            user_id: posting.user_id,
            description: posting.description,
        };
        LedgerRepo::insert_line(&mut *conn, &line_row).await?;

        let delta = deltas.entry(line_row.account_id.clone()).or_default();
        match posting.side {
            Side::Debit => delta.0 += posting.amount,
            Side::Credit => delta.1 += posting.amount,
        }

        lines.push(LedgerLine {
            line_no: line_row.line_no,
            account_id: line_row.account_id,
            side: posting.side,
            amount: posting.amount,
            user_id: line_row.user_id,
            description: line_row.description,
        });
    }

    for (account_id, (debit, credit)) in &deltas {
        BalanceRepo::apply(&mut *conn, account_id, *debit, *credit, at).await?;
    }

    let committed = LedgerEntry {
        id: entry_row.id,
        description: entry_row.description,
        reference_type: entry_row.reference_type,
        reference_id: entry_row.reference_id,
        created_by: entry_row.created_by,
        created_at: entry_row.created_at,
        reversal_of_id: entry_row.reversal_of_id,
        lines,
    };

    tracing::debug!(
        entry_id = %committed.id,
        reference_type = %committed.reference_type,
        reference_id = %committed.reference_id,
        lines = committed.lines.len(),
        amount = %committed.total_debits(),
        "Ledger entry posted"
    );

    Ok(committed)
}

pub async fn get_entry(conn: &mut SqliteConnection, entry_id: &str) -> LedgerResult<LedgerEntry> {
    let row = LedgerRepo::get_entry(&mut *conn, entry_id)
        .await
        .map_err(|e| match e {
            e if e.is_not_found() => LedgerError::EntryNotFound(entry_id.to_string()),
            e => e.into(),
        })?;
    let lines = LedgerRepo::get_lines(&mut *conn, entry_id).await?;
    LedgerEntry::from_rows(row, lines)
}

/// Balance of an account.
///
/// Without `user_id` this reads the materialized totals; with it, the
/// investor-tagged lines are aggregated directly.
pub async fn account_balance(
    conn: &mut SqliteConnection,
    account_id: &str,
    user_id: Option<&str>,
) -> LedgerResult<AccountBalance> {
    let account = AccountRegistry::get(&mut *conn, account_id).await?;

    let (total_debits, total_credits) = match user_id {
        None => match BalanceRepo::get(&mut *conn, account_id).await? {
            Some(row) => (
                parse_decimal("total_debits", &row.total_debits)?,
                parse_decimal("total_credits", &row.total_credits)?,
            ),
            None => (Decimal::ZERO, Decimal::ZERO),
        },
        Some(user_id) => {
            let rows = LedgerRepo::lines_for_account(&mut *conn, account_id, Some(user_id)).await?;
            aggregate_rows(&rows)?
        }
    };

    Ok(AccountBalance {
        account_id: account.id,
        account_type: account.account_type,
        user_id: user_id.map(str::to_string),
        balance: normal_balance(account.account_type, total_debits, total_credits),
        total_debits,
        total_credits,
    })
}

/// Post the compensating entry for `entry_id`.
///
/// The original is left untouched; an entry can be reversed at most once.
pub async fn reverse_entry(
    conn: &mut SqliteConnection,
    entry_id: &str,
    reason: &str,
    actor_id: &str,
    at: DateTime<Utc>,
) -> LedgerResult<LedgerEntry> {
    let original = get_entry(&mut *conn, entry_id).await?;

    if let Some(existing) = LedgerRepo::find_reversal(&mut *conn, entry_id).await? {
        return Err(LedgerError::AlreadyReversed {
            entry_id: entry_id.to_string(),
            reversal_id: existing.id,
        });
    }

    let reversal = original
        .reversed_postings()
        .into_iter()
        .fold(
            EntryBuilder::new(format!("Reversal of {}: {}", original.id, reason))
                .reference(REVERSAL_REFERENCE, &original.id)
                .created_by(actor_id)
                .reversal_of(&original.id),
            |builder, posting| builder.line(posting),
        )
        .build()?;

    let posted = post_entry(conn, reversal, at).await?;
    tracing::info!(
        original = %entry_id,
        reversal = %posted.id,
        actor = %actor_id,
        "Ledger entry reversed"
    );
    Ok(posted)
}

/// Entries matching a filter, oldest first, with their lines
pub async fn list_entries(
    conn: &mut SqliteConnection,
    filter: &LedgerFilter,
    page: Page,
) -> LedgerResult<Vec<LedgerEntry>> {
    let rows = LedgerRepo::list_entries(&mut *conn, filter, page).await?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let lines = LedgerRepo::get_lines(&mut *conn, &row.id).await?;
        entries.push(LedgerEntry::from_rows(row, lines)?);
    }
    Ok(entries)
}

fn aggregate_rows(rows: &[LedgerLineRow]) -> LedgerResult<(Decimal, Decimal)> {
    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        let line = LedgerLine::try_from(row.clone())?;
        parsed.push((line.side, line.amount));
    }
    Ok(side_totals(parsed))
}

// ============================================================================
// Integrity audit
// ============================================================================

/// An entry whose lines do not balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryImbalance {
    pub entry_id: String,
    pub line_count: usize,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

/// An account whose materialized totals differ from its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub account_id: String,
    pub materialized_debits: Decimal,
    pub materialized_credits: Decimal,
    pub computed_debits: Decimal,
    pub computed_credits: Decimal,
}

/// Result of a read-only consistency scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub entries_checked: usize,
    pub lines_checked: usize,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
    pub unbalanced_entries: Vec<EntryImbalance>,
    pub drifted_accounts: Vec<BalanceDrift>,
}

impl IntegrityReport {
    pub fn globally_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }

    pub fn is_consistent(&self) -> bool {
        self.globally_balanced()
            && self.unbalanced_entries.is_empty()
            && self.drifted_accounts.is_empty()
    }
}

/// Scan every entry and account. Reports problems, never repairs them.
pub async fn verify_integrity(conn: &mut SqliteConnection) -> LedgerResult<IntegrityReport> {
    let entries = LedgerRepo::all_entries(&mut *conn).await?;
    let rows = LedgerRepo::all_lines(&mut *conn).await?;

    let mut by_entry: BTreeMap<String, Vec<(Side, Decimal)>> = entries
        .iter()
        .map(|e| (e.id.clone(), Vec::new()))
        .collect();
    let mut by_account: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();

    for row in &rows {
        let line = LedgerLine::try_from(row.clone())?;
        by_entry
            .entry(row.entry_id.clone())
            .or_default()
            .push((line.side, line.amount));

        let totals = by_account.entry(line.account_id).or_default();
        match line.side {
            Side::Debit => totals.0 += line.amount,
            Side::Credit => totals.1 += line.amount,
        }
    }

    let mut unbalanced_entries = Vec::new();
    for (entry_id, lines) in &by_entry {
        let (debits, credits) = side_totals(lines.iter().copied());
        if lines.len() < 2 || debits != credits {
            unbalanced_entries.push(EntryImbalance {
                entry_id: entry_id.clone(),
                line_count: lines.len(),
                total_debits: debits,
                total_credits: credits,
            });
        }
    }

    let mut materialized: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for row in BalanceRepo::get_all(&mut *conn).await? {
        materialized.insert(
            row.account_id.clone(),
            (
                parse_decimal("total_debits", &row.total_debits)?,
                parse_decimal("total_credits", &row.total_credits)?,
            ),
        );
    }

    let mut drifted_accounts = Vec::new();
    let account_ids: std::collections::BTreeSet<&String> =
        materialized.keys().chain(by_account.keys()).collect();
    for account_id in account_ids {
        let (m_dr, m_cr) = materialized.get(account_id).copied().unwrap_or_default();
        let (c_dr, c_cr) = by_account.get(account_id).copied().unwrap_or_default();
        if m_dr != c_dr || m_cr != c_cr {
            drifted_accounts.push(BalanceDrift {
                account_id: account_id.clone(),
                materialized_debits: m_dr,
                materialized_credits: m_cr,
                computed_debits: c_dr,
                computed_credits: c_cr,
            });
        }
    }

    let (total_debits, total_credits) = by_account
        .values()
        .fold((Decimal::ZERO, Decimal::ZERO), |(dr, cr), (d, c)| (dr + d, cr + c));

    let report = IntegrityReport {
        entries_checked: entries.len(),
        lines_checked: rows.len(),
        total_debits,
        total_credits,
        unbalanced_entries,
        drifted_accounts,
    };

    if report.is_consistent() {
        tracing::debug!(entries = report.entries_checked, "Ledger integrity verified");
    } else {
        tracing::error!(
            unbalanced = report.unbalanced_entries.len(),
            drifted = report.drifted_accounts.len(),
            total_debits = %report.total_debits,
            total_credits = %report.total_credits,
            "Ledger integrity violation"
        );
    }

    Ok(report)
}

// ============================================================================
// Balance sheet
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetLine {
    pub account_id: String,
    pub code: String,
    pub name: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetSection {
    pub account_type: AccountType,
    pub accounts: Vec<BalanceSheetLine>,
    pub total: Decimal,
}

/// Balances grouped by account type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: DateTime<Utc>,
    pub sections: Vec<BalanceSheetSection>,
}

impl BalanceSheet {
    pub fn total(&self, account_type: AccountType) -> Decimal {
        self.sections
            .iter()
            .find(|s| s.account_type == account_type)
            .map(|s| s.total)
            .unwrap_or_default()
    }

    /// Assets = Equity + Revenue
    pub fn is_balanced(&self) -> bool {
        self.total(AccountType::Asset)
            == self.total(AccountType::Equity) + self.total(AccountType::Revenue)
    }
}

pub async fn balance_sheet(
    conn: &mut SqliteConnection,
    as_of: DateTime<Utc>,
) -> LedgerResult<BalanceSheet> {
    let accounts = AccountRegistry::list(&mut *conn).await?;
    let mut materialized: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for row in BalanceRepo::get_all(&mut *conn).await? {
        materialized.insert(
            row.account_id.clone(),
            (
                parse_decimal("total_debits", &row.total_debits)?,
                parse_decimal("total_credits", &row.total_credits)?,
            ),
        );
    }

    let sections = [AccountType::Asset, AccountType::Equity, AccountType::Revenue]
        .into_iter()
        .map(|account_type| {
            let accounts: Vec<BalanceSheetLine> = accounts
                .iter()
                .filter(|a| a.account_type == account_type)
                .map(|a| {
                    let (dr, cr) = materialized.get(&a.id).copied().unwrap_or_default();
                    BalanceSheetLine {
                        account_id: a.id.clone(),
                        code: a.code.clone(),
                        name: a.name.clone(),
                        balance: normal_balance(account_type, dr, cr),
                    }
                })
                .collect();
            let total = accounts.iter().map(|a| a.balance).sum();
            BalanceSheetSection {
                account_type,
                accounts,
                total,
            }
        })
        .collect();

    Ok(BalanceSheet { as_of, sections })
}
