//! Payout gateway contract
//!
//! The external payment collaborator that moves cash to the investor.
//! Withdrawal approval posts to the ledger only after the gateway confirms.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Instruction to pay an investor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Idempotency key: a retried attempt for the same withdrawal must not
    /// pay twice
    pub withdrawal_id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub attempt: i64,
}

/// Confirmation returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub reference: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayoutError {
    #[error("payout rejected by provider: {0}")]
    Rejected(String),

    #[error("payout provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    async fn execute(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError>;
}

/// Accepts every payout; the operator settles it out of band and later
/// marks the withdrawal paid.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualPayout;

#[async_trait]
impl PayoutGateway for ManualPayout {
    fn name(&self) -> &str {
        "manual"
    }

    async fn execute(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        tracing::info!(
            withdrawal_id = %request.withdrawal_id,
            user_id = %request.user_id,
            amount = %request.amount,
            "Manual payout queued"
        );
        Ok(PayoutReceipt {
            reference: format!("manual-{}", request.withdrawal_id),
        })
    }
}

/// Outcome played back by [`ScriptedPayout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Succeed,
    Reject(String),
    Unavailable(String),
    /// Sleep before succeeding, to exercise the caller's timeout
    Delay(Duration),
}

/// Gateway that plays back queued outcomes, then succeeds.
///
/// Useful for tests and dry runs of the failure paths.
#[derive(Debug, Default)]
pub struct ScriptedPayout {
    outcomes: Mutex<VecDeque<ScriptedOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedPayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, outcome: ScriptedOutcome) -> Self {
        self.push(outcome);
        self
    }

    pub fn push(&self, outcome: ScriptedOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    /// Number of `execute` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(ScriptedOutcome::Succeed)
    }
}

#[async_trait]
impl PayoutGateway for ScriptedPayout {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let receipt = PayoutReceipt {
            reference: format!("scripted-{}-{}", request.withdrawal_id, request.attempt),
        };

        match self.next_outcome() {
            ScriptedOutcome::Succeed => Ok(receipt),
            ScriptedOutcome::Reject(reason) => Err(PayoutError::Rejected(reason)),
            ScriptedOutcome::Unavailable(reason) => Err(PayoutError::Unavailable(reason)),
            ScriptedOutcome::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(receipt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> PayoutRequest {
        PayoutRequest {
            withdrawal_id: "w-1".to_string(),
            user_id: "alice".to_string(),
            amount: dec!(192.02),
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_manual_payout_accepts() {
        let receipt = ManualPayout.execute(&request()).await.unwrap();
        assert_eq!(receipt.reference, "manual-w-1");
    }

    #[tokio::test]
    async fn test_scripted_plays_back_then_succeeds() {
        let gateway = ScriptedPayout::new()
            .then(ScriptedOutcome::Reject("account closed".to_string()))
            .then(ScriptedOutcome::Unavailable("503".to_string()));

        assert_eq!(
            gateway.execute(&request()).await,
            Err(PayoutError::Rejected("account closed".to_string()))
        );
        assert!(matches!(
            gateway.execute(&request()).await,
            Err(PayoutError::Unavailable(_))
        ));
        assert!(gateway.execute(&request()).await.is_ok());
        assert_eq!(gateway.calls(), 3);
    }
}
