//! Platform metrics snapshot used to price the surge component

use crate::error::PricingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time view of platform load and liquidity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub active_investors: i64,
    pub pending_withdrawals: i64,
    /// Cash on hand divided by investor equity; 1 when equity is zero
    pub liquidity_ratio: Decimal,
}

impl PlatformMetrics {
    /// Metrics of a quiet platform: nothing that would trigger a surge
    pub fn calm() -> Self {
        Self {
            active_investors: 0,
            pending_withdrawals: 0,
            liquidity_ratio: Decimal::ONE,
        }
    }

    /// Derive the liquidity ratio from the cash and equity balances
    pub fn liquidity_ratio(cash: Decimal, equity: Decimal) -> Decimal {
        if equity <= Decimal::ZERO {
            return Decimal::ONE;
        }
        (cash / equity).max(Decimal::ZERO)
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        if self.active_investors < 0 || self.pending_withdrawals < 0 {
            return Err(PricingError::InvalidMetrics(format!(
                "counts cannot be negative: investors={}, pending={}",
                self.active_investors, self.pending_withdrawals
            )));
        }
        if self.liquidity_ratio < Decimal::ZERO {
            return Err(PricingError::InvalidMetrics(format!(
                "liquidity_ratio cannot be negative: {}",
                self.liquidity_ratio
            )));
        }
        Ok(())
    }
}
