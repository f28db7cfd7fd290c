//! Status and classification enums shared across crates
//!
//! All enums round-trip through their SCREAMING_SNAKE_CASE string form, which
//! is also the value stored in the database.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Chart-of-accounts type
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources held by the fund (bank/cash)
    Asset,
    /// Investors' claim on the fund
    Equity,
    /// Income retained by the platform (withdrawal fees)
    Revenue,
}

impl AccountType {
    /// Side on which the account balance grows.
    ///
    /// - Assets increase on Debit
    /// - Equity and Revenue increase on Credit
    pub fn normal_balance(&self) -> Side {
        match self {
            AccountType::Asset => Side::Debit,
            AccountType::Equity | AccountType::Revenue => Side::Credit,
        }
    }
}

/// Debit or credit side of a ledger line
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// Deposit lifecycle: PENDING -> APPROVED | REJECTED
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

/// Withdrawal lifecycle: PENDING -> APPROVED -> PAID, PENDING -> REJECTED
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl WithdrawalStatus {
    /// Statuses whose burned units count against the outstanding total.
    pub fn has_burned_units(&self) -> bool {
        matches!(self, WithdrawalStatus::Approved | WithdrawalStatus::Paid)
    }
}

/// How the withdrawal fee is charged
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
    AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// payout = requested - fee
    #[default]
    Deducted,
    /// payout = requested, fee debited from the investor's position on top
    OnTop,
}

/// Where a command originated (for the audit trail)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Origin {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            user_agent: Some(user_agent.into()),
        }
    }

    /// Origin for commands issued by the system itself (CLI, jobs)
    pub fn system() -> Self {
        Self {
            ip: None,
            user_agent: Some("navfund-system".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_account_type_roundtrip() {
        assert_eq!(AccountType::Asset.to_string(), "ASSET");
        assert_eq!(AccountType::from_str("REVENUE").unwrap(), AccountType::Revenue);
        assert!(AccountType::from_str("LIABILITY").is_err());
    }

    #[test]
    fn test_normal_balance() {
        assert_eq!(AccountType::Asset.normal_balance(), Side::Debit);
        assert_eq!(AccountType::Equity.normal_balance(), Side::Credit);
        assert_eq!(AccountType::Revenue.normal_balance(), Side::Credit);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(DepositStatus::Pending.as_ref(), "PENDING");
        assert_eq!(WithdrawalStatus::from_str("PAID").unwrap(), WithdrawalStatus::Paid);
        assert!(WithdrawalStatus::Paid.has_burned_units());
        assert!(!WithdrawalStatus::Rejected.has_burned_units());
        assert!(DepositStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_fee_mode_strings() {
        assert_eq!(FeeMode::OnTop.as_ref(), "on_top");
        assert_eq!(FeeMode::from_str("deducted").unwrap(), FeeMode::Deducted);
        assert_eq!(FeeMode::default(), FeeMode::Deducted);
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Debit.opposite(), Side::Credit);
        assert_eq!(Side::Credit.opposite(), Side::Debit);
    }
}
