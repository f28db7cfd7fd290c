//! Units errors

use navfund_ledger::LedgerError;
use navfund_persistence::PersistenceError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnitsError {
    #[error("Deposit not found: {0}")]
    DepositNotFound(String),

    #[error("Deposit {id} is {status}, expected PENDING")]
    InvalidState { id: String, status: String },

    #[error("Insufficient units for {user_id}: required {required}, available {available}")]
    InsufficientUnits {
        user_id: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Amount {amount} buys no units at NAV {nav}")]
    ZeroUnits { amount: Decimal, nav: Decimal },

    #[error("NAV {nav} is not positive with {units_outstanding} units outstanding")]
    NonPositiveNav {
        nav: Decimal,
        units_outstanding: Decimal,
    },

    #[error("Concurrent update on {0}")]
    ConcurrencyConflict(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<sqlx::Error> for UnitsError {
    fn from(err: sqlx::Error) -> Self {
        UnitsError::Persistence(PersistenceError::from(err))
    }
}

pub type UnitsResult<T> = Result<T, UnitsError>;
