//! Fund configuration
//!
//! Every tunable has a serde default so partial JSON files work; missing
//! fields fall back to the values below.

use crate::types::FeeMode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Fund-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundConfig {
    /// NAV used while no units are outstanding
    #[serde(default = "default_baseline_nav")]
    pub baseline_nav: Decimal,

    /// Hours between a withdrawal request and its earliest approval
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,

    /// Minimum length of a rejection reason
    #[serde(default = "default_min_reason_len")]
    pub min_reason_len: usize,

    /// Timeout for the external payout call
    #[serde(default = "default_payout_timeout_ms")]
    pub payout_timeout_ms: u64,

    /// Fee mode recorded on new withdrawals unless the command overrides it
    #[serde(default)]
    pub default_fee_mode: FeeMode,

    // === Chart of accounts ===
    #[serde(default = "default_cash_account")]
    pub cash_account: String,

    #[serde(default = "default_equity_account")]
    pub equity_account: String,

    #[serde(default = "default_fee_account")]
    pub fee_account: String,
}

fn default_baseline_nav() -> Decimal {
    Decimal::new(10, 0)
}

fn default_cooldown_hours() -> i64 {
    24
}

fn default_min_reason_len() -> usize {
    10
}

fn default_payout_timeout_ms() -> u64 {
    5_000
}

fn default_cash_account() -> String {
    "BANK".to_string()
}

fn default_equity_account() -> String {
    "INVESTOR_EQUITY".to_string()
}

fn default_fee_account() -> String {
    "FEE_REVENUE".to_string()
}

impl Default for FundConfig {
    fn default() -> Self {
        Self {
            baseline_nav: default_baseline_nav(),
            cooldown_hours: default_cooldown_hours(),
            min_reason_len: default_min_reason_len(),
            payout_timeout_ms: default_payout_timeout_ms(),
            default_fee_mode: FeeMode::default(),
            cash_account: default_cash_account(),
            equity_account: default_equity_account(),
            fee_account: default_fee_account(),
        }
    }
}

impl FundConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_nav <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "baseline_nav must be positive, got {}",
                self.baseline_nav
            )));
        }
        if self.cooldown_hours < 0 {
            return Err(ConfigError::Invalid(format!(
                "cooldown_hours cannot be negative, got {}",
                self.cooldown_hours
            )));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cooldown_hours)
    }

    pub fn payout_timeout(&self) -> Duration {
        Duration::from_millis(self.payout_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = FundConfig::default();

        assert_eq!(config.baseline_nav, dec!(10));
        assert_eq!(config.cooldown_hours, 24);
        assert_eq!(config.min_reason_len, 10);
        assert_eq!(config.payout_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.default_fee_mode, FeeMode::Deducted);
        assert_eq!(config.cash_account, "BANK");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "baseline_nav": "1.00", "cooldown_hours": 48 }"#;
        let config: FundConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.baseline_nav, dec!(1.00));
        assert_eq!(config.cooldown(), chrono::Duration::hours(48));
        assert_eq!(config.equity_account, "INVESTOR_EQUITY");
    }

    #[test]
    fn test_validate_rejects_zero_baseline() {
        let config = FundConfig {
            baseline_nav: Decimal::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
