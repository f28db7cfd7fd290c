//! Ledger errors

use navfund_core::AccountType;
use navfund_persistence::PersistenceError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Entry must have at least 2 lines for double-entry, got {0}")]
    InsufficientLines(usize),

    #[error("Line {line_no} amount must be positive: {amount}")]
    NonPositiveAmount { line_no: usize, amount: Decimal },

    #[error("Entry must have at least one debit line and one credit line")]
    MissingSide,

    #[error("Entry unbalanced: debits {debits} != credits {credits}")]
    Unbalanced { debits: Decimal, credits: Decimal },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account {code} already exists as {existing}, requested {requested}")]
    AccountTypeConflict {
        code: String,
        existing: AccountType,
        requested: AccountType,
    },

    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    #[error("Ledger entry {entry_id} already reversed by {reversal_id}")]
    AlreadyReversed {
        entry_id: String,
        reversal_id: String,
    },

    #[error("Description cannot be empty")]
    EmptyDescription,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Persistence(PersistenceError::from(err))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
