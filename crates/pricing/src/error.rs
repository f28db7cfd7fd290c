//! Pricing errors

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("Withdrawal amount must be positive: {0}")]
    InvalidAmount(Decimal),

    #[error("Fee {fee} leaves nothing to pay out of {amount}")]
    FeeExceedsAmount { amount: Decimal, fee: Decimal },

    #[error("Invalid platform metrics: {0}")]
    InvalidMetrics(String),

    #[error("Invalid fee configuration: {0}")]
    InvalidConfig(String),
}
