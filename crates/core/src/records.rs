//! Persisted fund records
//!
//! Plain data: the workflows decide transitions, the persistence layer
//! stores them. Monetary fields use `Decimal` at their documented scale.

use crate::types::{AccountType, DepositStatus, FeeMode, Origin, WithdrawalStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Chart-of-accounts entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

/// Registered investor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investor {
    pub user_id: String,
    pub display_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub status: DepositStatus,
    pub proof_url: Option<String>,
    /// Set once at approval
    pub units_issued: Option<Decimal>,
    /// Set once at approval
    pub nav_at_issue: Option<Decimal>,
    pub ledger_entry_id: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub amount_requested: Decimal,

    // === Fee quote, locked at creation ===
    pub fee_mode: FeeMode,
    pub fee_fixed_pct: Decimal,
    pub fee_surge_pct: Decimal,
    pub fee_fixed_amount: Decimal,
    pub fee_surge_amount: Decimal,
    pub fee_flat_amount: Decimal,
    pub fee_total_amount: Decimal,
    pub amount_payout: Decimal,
    pub surge_reasons: Vec<String>,
    pub surge_snapshot: serde_json::Value,
    pub nav_at_request: Decimal,
    pub cooldown_until: DateTime<Utc>,

    pub status: WithdrawalStatus,
    pub units_burned: Option<Decimal>,
    pub nav_at_burn: Option<Decimal>,
    pub ledger_entry_id: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payout_reference: Option<String>,

    // === Payout attempt bookkeeping ===
    pub payout_claimed_by: Option<String>,
    pub payout_claimed_at: Option<DateTime<Utc>>,
    pub payout_failure_reason: Option<String>,
    pub payout_attempts: i64,

    pub rejection_reason: Option<String>,
    pub rejected_by: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Total taken from the investor's position: the requested amount, plus
    /// the fee when it is billed on top.
    pub fn gross_debit(&self) -> Decimal {
        match self.fee_mode {
            FeeMode::Deducted => self.amount_requested,
            FeeMode::OnTop => self.amount_requested + self.fee_total_amount,
        }
    }
}

/// Append-only audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub sequence: i64,
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub metadata: serde_json::Value,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}
