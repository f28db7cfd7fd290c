//! Fee configuration
//!
//! Rates are fractions (0.0399 = 3.99%). Missing JSON fields fall back to
//! the defaults below.

use navfund_core::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Base rate, the floor of the fee band
    #[serde(default = "default_fixed_pct")]
    pub fixed_pct: Decimal,

    /// Flat amount added to every withdrawal fee
    #[serde(default)]
    pub flat_surcharge: Decimal,

    #[serde(default = "default_true")]
    pub surge_enabled: bool,

    // === Investor-count logistic ===
    /// Rate the investor term approaches as the platform grows
    #[serde(default = "default_investor_surge_cap")]
    pub investor_surge_cap: Decimal,

    /// Investor count at the curve's inflection point
    #[serde(default = "default_investor_midpoint")]
    pub investor_midpoint: Decimal,

    #[serde(default = "default_investor_steepness")]
    pub investor_steepness: Decimal,

    // === Pending-request load ===
    /// Pending requests tolerated before the load term kicks in
    #[serde(default = "default_pending_free_count")]
    pub pending_free_count: i64,

    /// Rate added per pending request above the free count
    #[serde(default = "default_pending_step_pct")]
    pub pending_step_pct: Decimal,

    #[serde(default = "default_pending_surge_cap")]
    pub pending_surge_cap: Decimal,

    // === Liquidity shortfall ===
    /// Bank-to-equity ratio below which the liquidity term kicks in
    #[serde(default = "default_liquidity_target_ratio")]
    pub liquidity_target_ratio: Decimal,

    /// Rate added per unit of ratio shortfall
    #[serde(default = "default_liquidity_slope")]
    pub liquidity_slope: Decimal,

    #[serde(default = "default_liquidity_surge_cap")]
    pub liquidity_surge_cap: Decimal,

    // === Global surge band ===
    #[serde(default)]
    pub surge_min_pct: Decimal,

    #[serde(default = "default_surge_max_pct")]
    pub surge_max_pct: Decimal,
}

fn default_fixed_pct() -> Decimal {
    Decimal::new(399, 4)
}

fn default_true() -> bool {
    true
}

fn default_investor_surge_cap() -> Decimal {
    Decimal::new(1, 2)
}

fn default_investor_midpoint() -> Decimal {
    Decimal::new(500, 0)
}

fn default_investor_steepness() -> Decimal {
    Decimal::new(1, 2)
}

fn default_pending_free_count() -> i64 {
    10
}

fn default_pending_step_pct() -> Decimal {
    Decimal::new(5, 4)
}

fn default_pending_surge_cap() -> Decimal {
    Decimal::new(1, 2)
}

fn default_liquidity_target_ratio() -> Decimal {
    Decimal::new(5, 1)
}

fn default_liquidity_slope() -> Decimal {
    Decimal::new(2, 2)
}

fn default_liquidity_surge_cap() -> Decimal {
    Decimal::new(1, 2)
}

fn default_surge_max_pct() -> Decimal {
    Decimal::new(2, 2)
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fixed_pct: default_fixed_pct(),
            flat_surcharge: Decimal::ZERO,
            surge_enabled: true,
            investor_surge_cap: default_investor_surge_cap(),
            investor_midpoint: default_investor_midpoint(),
            investor_steepness: default_investor_steepness(),
            pending_free_count: default_pending_free_count(),
            pending_step_pct: default_pending_step_pct(),
            pending_surge_cap: default_pending_surge_cap(),
            liquidity_target_ratio: default_liquidity_target_ratio(),
            liquidity_slope: default_liquidity_slope(),
            liquidity_surge_cap: default_liquidity_surge_cap(),
            surge_min_pct: Decimal::ZERO,
            surge_max_pct: default_surge_max_pct(),
        }
    }
}

impl FeeConfig {
    /// Base rate only, no surge
    pub fn flat(fixed_pct: Decimal) -> Self {
        Self {
            fixed_pct,
            surge_enabled: false,
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("fixed_pct", self.fixed_pct),
            ("investor_surge_cap", self.investor_surge_cap),
            ("pending_step_pct", self.pending_step_pct),
            ("pending_surge_cap", self.pending_surge_cap),
            ("liquidity_surge_cap", self.liquidity_surge_cap),
            ("surge_min_pct", self.surge_min_pct),
            ("surge_max_pct", self.surge_max_pct),
        ];
        for (name, rate) in rates {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in [0, 1), got {}",
                    name, rate
                )));
            }
        }

        if self.surge_min_pct > self.surge_max_pct {
            return Err(ConfigError::Invalid(format!(
                "surge_min_pct {} exceeds surge_max_pct {}",
                self.surge_min_pct, self.surge_max_pct
            )));
        }
        if self.fixed_pct + self.surge_max_pct >= Decimal::ONE {
            return Err(ConfigError::Invalid(
                "fixed_pct + surge_max_pct must stay below 100%".to_string(),
            ));
        }
        if self.flat_surcharge < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "flat_surcharge cannot be negative, got {}",
                self.flat_surcharge
            )));
        }
        if self.investor_steepness <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "investor_steepness must be positive".to_string(),
            ));
        }
        if self.pending_free_count < 0 || self.liquidity_slope < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "pending_free_count and liquidity_slope cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}
