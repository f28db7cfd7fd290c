//! Workflow errors
//!
//! The error surface seen by callers of the fund core. Lower-layer errors are
//! folded into the matching variant so callers only match on one enum.

use chrono::{DateTime, Utc};
use navfund_ledger::LedgerError;
use navfund_persistence::PersistenceError;
use navfund_pricing::PricingError;
use navfund_units::UnitsError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    // === Rejected before any mutation ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cannot {action} {resource} {id}: status is {status}")]
    InvalidState {
        resource: String,
        id: String,
        status: String,
        action: String,
    },

    #[error("Withdrawal {id} is in cooldown until {until}")]
    CooldownActive { id: String, until: DateTime<Utc> },

    #[error("Insufficient funds for {user_id}: required {required}, available {available}")]
    InsufficientFunds {
        user_id: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient units for {user_id}: required {required}, available {available}")]
    InsufficientUnits {
        user_id: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // === Retryable ===
    #[error("Payout failed for withdrawal {id}: {reason}")]
    PayoutFailure { id: String, reason: String },

    #[error("Concurrent update lost on {resource} {id}")]
    ConcurrencyConflict { resource: String, id: String },

    // === Invariant violations ===
    #[error("Ledger imbalance: {0}")]
    LedgerImbalance(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // === Wrapped errors ===
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn invalid_state(
        resource: &str,
        id: &str,
        status: impl ToString,
        action: &str,
    ) -> Self {
        Self::InvalidState {
            resource: resource.to_string(),
            id: id.to_string(),
            status: status.to_string(),
            action: action.to_string(),
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(resource: &str, id: &str) -> Self {
        Self::ConcurrencyConflict {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    /// Errors that may succeed when the caller re-fetches state and retries
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PayoutFailure { .. } | Self::ConcurrencyConflict { .. }
        )
    }
}

impl From<PersistenceError> for WorkflowError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity, id } => Self::NotFound { entity, id },
            busy if busy.is_busy() => Self::conflict("store", "database"),
            other => Self::Persistence(other),
        }
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::from(err).into()
    }
}

impl From<LedgerError> for WorkflowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unbalanced { .. } => Self::LedgerImbalance(err.to_string()),
            LedgerError::InsufficientLines(_)
            | LedgerError::NonPositiveAmount { .. }
            | LedgerError::MissingSide
            | LedgerError::EmptyDescription => Self::Validation(err.to_string()),
            LedgerError::AccountNotFound(id) => Self::not_found("Account", &id),
            LedgerError::EntryNotFound(id) => Self::not_found("LedgerEntry", &id),
            LedgerError::AccountTypeConflict { .. } => Self::Configuration(err.to_string()),
            LedgerError::AlreadyReversed {
                entry_id,
                reversal_id,
            } => Self::InvalidState {
                resource: "ledger entry".to_string(),
                id: entry_id,
                status: format!("reversed by {}", reversal_id),
                action: "reverse".to_string(),
            },
            LedgerError::Persistence(p) => p.into(),
        }
    }
}

impl From<UnitsError> for WorkflowError {
    fn from(err: UnitsError) -> Self {
        match err {
            UnitsError::DepositNotFound(id) => Self::not_found("Deposit", &id),
            UnitsError::InvalidState { id, status } => {
                Self::invalid_state("deposit", &id, status, "approve")
            }
            UnitsError::InsufficientUnits {
                user_id,
                required,
                available,
            } => Self::InsufficientUnits {
                user_id,
                required,
                available,
            },
            UnitsError::ZeroUnits { .. } => Self::Validation(err.to_string()),
            UnitsError::NonPositiveNav { nav, .. } => {
                Self::invalid_state("fund", "nav", format!("NAV {}", nav), "price units")
            }
            UnitsError::ConcurrencyConflict(id) => Self::conflict("deposit", &id),
            UnitsError::Ledger(l) => l.into(),
            UnitsError::Persistence(p) => p.into(),
        }
    }
}

impl From<PricingError> for WorkflowError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidAmount(_) | PricingError::FeeExceedsAmount { .. } => {
                Self::Validation(err.to_string())
            }
            PricingError::InvalidMetrics(_) | PricingError::InvalidConfig(_) => {
                Self::Configuration(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unbalanced_maps_to_imbalance() {
        let err: WorkflowError = LedgerError::Unbalanced {
            debits: dec!(10),
            credits: dec!(9),
        }
        .into();
        assert!(matches!(err, WorkflowError::LedgerImbalance(_)));
    }

    #[test]
    fn test_not_found_passes_through_layers() {
        let err: WorkflowError =
            UnitsError::Persistence(PersistenceError::not_found("Deposit", "dep-9")).into();
        match err {
            WorkflowError::NotFound { entity, id } => {
                assert_eq!(entity, "Deposit");
                assert_eq!(id, "dep-9");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_units_shortfall_keeps_figures() {
        let err: WorkflowError = UnitsError::InsufficientUnits {
            user_id: "alice".to_string(),
            required: dec!(20),
            available: dec!(5),
        }
        .into();
        assert!(matches!(
            err,
            WorkflowError::InsufficientUnits { required, .. } if required == dec!(20)
        ));
    }

    #[test]
    fn test_pricing_errors() {
        let err: WorkflowError = PricingError::InvalidAmount(dec!(0)).into();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err: WorkflowError = PricingError::InvalidMetrics("bad".to_string()).into();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(WorkflowError::conflict("withdrawal", "w-1").is_retryable());
        assert!(!WorkflowError::Validation("x".to_string()).is_retryable());
    }
}
