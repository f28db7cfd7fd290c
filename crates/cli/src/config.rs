//! Combined configuration file
//!
//! ```json
//! {
//!   "fund": { "cooldown_hours": 48 },
//!   "fees": { "fixed_pct": "0.0399", "surge_enabled": false }
//! }
//! ```
//!
//! Both sections are optional; missing fields take their defaults.

use anyhow::{Context, Result};
use navfund_core::FundConfig;
use navfund_pricing::FeeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fund: FundConfig,
    #[serde(default)]
    pub fees: FeeConfig,
}

impl AppConfig {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str::<Self>(&content)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.fund.validate().context("Invalid fund configuration")?;
        config.fees.validate().context("Invalid fee configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.fund.baseline_nav, dec!(10));
        assert_eq!(config.fees.fixed_pct, dec!(0.0399));
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "fund": {{ "cooldown_hours": 48 }}, "fees": {{ "surge_enabled": false }} }}"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.fund.cooldown_hours, 48);
        assert_eq!(config.fund.min_reason_len, 10);
        assert!(!config.fees.surge_enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "fund": {{ "baseline_nav": "0" }} }}"#).unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());
    }
}
