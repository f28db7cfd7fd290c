//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables.
//! Schema is defined in migrations/20261019_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, Utc};
use navfund_core::{
    Account, AccountType, AuditLogEntry, Deposit, DepositStatus, FeeMode, Investor, Origin,
    Withdrawal, WithdrawalStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row type for table `accounts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `ledger_entries`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LedgerEntryRow {
    pub id: String,
    pub description: String,
    pub reference_type: String,
    pub reference_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub reversal_of_id: Option<String>,
}

/// Row type for table `ledger_lines`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LedgerLineRow {
    pub entry_id: String,
    pub line_no: i64,
    pub account_id: String,
    pub side: String,
    pub amount: String, // Decimal stored as TEXT
    pub user_id: Option<String>,
    pub description: Option<String>,
}

/// Row type for table `account_balances`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct BalanceRow {
    pub account_id: String,
    pub total_debits: String,
    pub total_credits: String,
    pub updated_at: DateTime<Utc>,
}

/// Row type for table `investors`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct InvestorRow {
    pub user_id: String,
    pub display_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `deposits`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct DepositRow {
    pub id: String,
    pub user_id: String,
    pub amount: String,
    pub status: String,
    pub proof_url: Option<String>,
    pub units_issued: Option<String>,
    pub nav_at_issue: Option<String>,
    pub ledger_entry_id: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `withdrawals`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WithdrawalRow {
    pub id: String,
    pub user_id: String,
    pub amount_requested: String,
    pub fee_mode: String,
    pub fee_fixed_pct: String,
    pub fee_surge_pct: String,
    pub fee_fixed_amount: String,
    pub fee_surge_amount: String,
    pub fee_flat_amount: String,
    pub fee_total_amount: String,
    pub amount_payout: String,
    pub surge_reasons: String,
    pub surge_snapshot: String,
    pub nav_at_request: String,
    pub cooldown_until: DateTime<Utc>,
    pub status: String,
    pub units_burned: Option<String>,
    pub nav_at_burn: Option<String>,
    pub ledger_entry_id: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payout_reference: Option<String>,
    pub payout_claimed_by: Option<String>,
    pub payout_claimed_at: Option<DateTime<Utc>>,
    pub payout_failure_reason: Option<String>,
    pub payout_attempts: i64,
    pub rejection_reason: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row type for table `audit_log`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuditRow {
    pub sequence: i64,
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub metadata: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

// === Decoding helpers ===

/// Parse a TEXT decimal column
pub fn parse_decimal(field: &str, raw: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(raw).map_err(|_| PersistenceError::InvalidDecimal {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn parse_opt_decimal(field: &str, raw: Option<&str>) -> PersistenceResult<Option<Decimal>> {
    raw.map(|value| parse_decimal(field, value)).transpose()
}

fn parse_enum<T: FromStr>(field: &str, raw: &str) -> PersistenceResult<T> {
    T::from_str(raw).map_err(|_| PersistenceError::invalid_enum(field, raw))
}

// === Conversion implementations ===

impl TryFrom<AccountRow> for Account {
    type Error = PersistenceError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            account_type: parse_enum::<AccountType>("account_type", &row.account_type)?,
            id: row.id,
            code: row.code,
            name: row.name,
            created_at: row.created_at,
        })
    }
}

impl From<InvestorRow> for Investor {
    fn from(row: InvestorRow) -> Self {
        Self {
            user_id: row.user_id,
            display_name: row.display_name,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<DepositRow> for Deposit {
    type Error = PersistenceError;

    fn try_from(row: DepositRow) -> Result<Self, Self::Error> {
        Ok(Self {
            amount: parse_decimal("amount", &row.amount)?,
            status: parse_enum::<DepositStatus>("status", &row.status)?,
            units_issued: parse_opt_decimal("units_issued", row.units_issued.as_deref())?,
            nav_at_issue: parse_opt_decimal("nav_at_issue", row.nav_at_issue.as_deref())?,
            id: row.id,
            user_id: row.user_id,
            proof_url: row.proof_url,
            ledger_entry_id: row.ledger_entry_id,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = PersistenceError;

    fn try_from(row: WithdrawalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            amount_requested: parse_decimal("amount_requested", &row.amount_requested)?,
            fee_mode: parse_enum::<FeeMode>("fee_mode", &row.fee_mode)?,
            fee_fixed_pct: parse_decimal("fee_fixed_pct", &row.fee_fixed_pct)?,
            fee_surge_pct: parse_decimal("fee_surge_pct", &row.fee_surge_pct)?,
            fee_fixed_amount: parse_decimal("fee_fixed_amount", &row.fee_fixed_amount)?,
            fee_surge_amount: parse_decimal("fee_surge_amount", &row.fee_surge_amount)?,
            fee_flat_amount: parse_decimal("fee_flat_amount", &row.fee_flat_amount)?,
            fee_total_amount: parse_decimal("fee_total_amount", &row.fee_total_amount)?,
            amount_payout: parse_decimal("amount_payout", &row.amount_payout)?,
            surge_reasons: serde_json::from_str(&row.surge_reasons)?,
            surge_snapshot: serde_json::from_str(&row.surge_snapshot)?,
            nav_at_request: parse_decimal("nav_at_request", &row.nav_at_request)?,
            status: parse_enum::<WithdrawalStatus>("status", &row.status)?,
            units_burned: parse_opt_decimal("units_burned", row.units_burned.as_deref())?,
            nav_at_burn: parse_opt_decimal("nav_at_burn", row.nav_at_burn.as_deref())?,
            id: row.id,
            user_id: row.user_id,
            cooldown_until: row.cooldown_until,
            ledger_entry_id: row.ledger_entry_id,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            paid_at: row.paid_at,
            payout_reference: row.payout_reference,
            payout_claimed_by: row.payout_claimed_by,
            payout_claimed_at: row.payout_claimed_at,
            payout_failure_reason: row.payout_failure_reason,
            payout_attempts: row.payout_attempts,
            rejection_reason: row.rejection_reason,
            rejected_by: row.rejected_by,
            rejected_at: row.rejected_at,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = PersistenceError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            metadata: serde_json::from_str(&row.metadata)?,
            origin: Origin {
                ip: row.ip,
                user_agent: row.user_agent,
            },
            sequence: row.sequence,
            actor_id: row.actor_id,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            created_at: row.created_at,
            prev_hash: row.prev_hash,
            hash: row.hash,
        })
    }
}
