//! NavFund Pricing - withdrawal fee engine
//!
//! Quotes are pure functions of the amount, a [`PlatformMetrics`] snapshot
//! and the [`FeeConfig`]. The caller persists the quote with the request so
//! later metric changes never alter it.

pub mod config;
pub mod error;
pub mod fees;
pub mod metrics;

pub use config::FeeConfig;
pub use error::PricingError;
pub use fees::{calculate_withdrawal_fees, FeeCalculator, FeeQuote, SurgeBreakdown};
pub use metrics::PlatformMetrics;
