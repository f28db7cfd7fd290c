//! Validated inbound commands
//!
//! Commands arrive already authenticated and authorized. They are parsed
//! into these structs (unknown fields rejected) and validated before any
//! workflow touches the store.

use crate::error::{WorkflowError, WorkflowResult};
use navfund_core::{Amount, FeeMode, FundConfig, Side, CASH_SCALE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn require_non_empty(field: &str, value: &str) -> WorkflowResult<()> {
    if value.trim().is_empty() {
        return Err(WorkflowError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Positive amount with at most cash precision
fn require_cash_amount(field: &str, amount: Decimal) -> WorkflowResult<()> {
    let amount = Amount::positive(amount)
        .map_err(|e| WorkflowError::Validation(format!("{}: {}", field, e)))?;
    if amount.value().normalize().scale() > CASH_SCALE {
        return Err(WorkflowError::Validation(format!(
            "{} has more than {} decimal places: {}",
            field, CASH_SCALE, amount
        )));
    }
    Ok(())
}

fn require_reason(reason: &str, config: &FundConfig) -> WorkflowResult<()> {
    let len = reason.trim().chars().count();
    if len < config.min_reason_len {
        return Err(WorkflowError::Validation(format!(
            "reason must be at least {} characters, got {}",
            config.min_reason_len, len
        )));
    }
    Ok(())
}

// ============================================================================
// Investors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterInvestor {
    pub user_id: String,
    pub display_name: String,
    pub actor_id: String,
}

impl RegisterInvestor {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("user_id", &self.user_id)?;
        require_non_empty("display_name", &self.display_name)?;
        require_non_empty("actor_id", &self.actor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetInvestorActive {
    pub user_id: String,
    pub active: bool,
    pub actor_id: String,
}

impl SetInvestorActive {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("user_id", &self.user_id)?;
        require_non_empty("actor_id", &self.actor_id)
    }
}

// ============================================================================
// Deposits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDeposit {
    pub user_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub proof_url: Option<String>,
}

impl CreateDeposit {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("user_id", &self.user_id)?;
        require_cash_amount("amount", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApproveDeposit {
    pub deposit_id: String,
    pub actor_id: String,
}

impl ApproveDeposit {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("deposit_id", &self.deposit_id)?;
        require_non_empty("actor_id", &self.actor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectDeposit {
    pub deposit_id: String,
    pub reason: String,
    pub actor_id: String,
}

impl RejectDeposit {
    pub fn validate(&self, config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("deposit_id", &self.deposit_id)?;
        require_non_empty("actor_id", &self.actor_id)?;
        require_reason(&self.reason, config)
    }
}

// ============================================================================
// Withdrawals
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWithdrawal {
    pub user_id: String,
    pub amount: Decimal,
    /// Falls back to the fund's default fee mode
    #[serde(default)]
    pub fee_mode: Option<FeeMode>,
}

impl CreateWithdrawal {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("user_id", &self.user_id)?;
        require_cash_amount("amount", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApproveWithdrawal {
    pub withdrawal_id: String,
    pub actor_id: String,
}

impl ApproveWithdrawal {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("withdrawal_id", &self.withdrawal_id)?;
        require_non_empty("actor_id", &self.actor_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectWithdrawal {
    pub withdrawal_id: String,
    pub reason: String,
    pub actor_id: String,
}

impl RejectWithdrawal {
    pub fn validate(&self, config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("withdrawal_id", &self.withdrawal_id)?;
        require_non_empty("actor_id", &self.actor_id)?;
        require_reason(&self.reason, config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkWithdrawalPaid {
    pub withdrawal_id: String,
    pub actor_id: String,
    /// Settlement reference from the payment provider, if it differs from
    /// the one recorded at approval
    #[serde(default)]
    pub reference: Option<String>,
}

impl MarkWithdrawalPaid {
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("withdrawal_id", &self.withdrawal_id)?;
        require_non_empty("actor_id", &self.actor_id)
    }
}

// ============================================================================
// Manual ledger corrections
// ============================================================================

/// One line of a manual entry, addressed by account code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualLine {
    pub account_code: String,
    pub side: Side,
    pub amount: Decimal,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualEntry {
    pub description: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub actor_id: String,
    pub lines: Vec<ManualLine>,
}

impl ManualEntry {
    /// Shape checks only; balance is enforced by the ledger at post time
    pub fn validate(&self, _config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("description", &self.description)?;
        require_non_empty("actor_id", &self.actor_id)?;
        if self.lines.len() < 2 {
            return Err(WorkflowError::Validation(format!(
                "entry needs at least 2 lines, got {}",
                self.lines.len()
            )));
        }
        for (i, line) in self.lines.iter().enumerate() {
            require_non_empty(&format!("lines[{}].account_code", i), &line.account_code)?;
            require_cash_amount(&format!("lines[{}].amount", i), line.amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReverseEntry {
    pub entry_id: String,
    pub reason: String,
    pub actor_id: String,
}

impl ReverseEntry {
    pub fn validate(&self, config: &FundConfig) -> WorkflowResult<()> {
        require_non_empty("entry_id", &self.entry_id)?;
        require_non_empty("actor_id", &self.actor_id)?;
        require_reason(&self.reason, config)
    }
}
