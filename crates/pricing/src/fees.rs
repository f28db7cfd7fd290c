//! Withdrawal fee calculation
//!
//! fee = amount x (fixed_pct + surge_pct) + flat_surcharge, where the surge
//! is the sum of three saturating terms clamped to the configured band:
//!
//! - investor load: logistic over the active investor count, shifted so an
//!   empty platform contributes nothing
//! - pending load: linear above a free allowance, capped
//! - liquidity: linear in the shortfall below a target cash/equity ratio, capped

use crate::config::FeeConfig;
use crate::error::PricingError;
use crate::metrics::PlatformMetrics;
use navfund_core::{round_cash, round_pct, FeeMode};
use rust_decimal::prelude::MathematicalOps;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Fee breakdown locked onto a withdrawal at request time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub amount_requested: Decimal,
    pub fee_mode: FeeMode,
    pub fee_fixed_pct: Decimal,
    pub fee_surge_pct: Decimal,
    pub fee_fixed_amount: Decimal,
    pub fee_surge_amount: Decimal,
    pub fee_flat_amount: Decimal,
    pub fee_total_amount: Decimal,
    pub amount_payout: Decimal,
    /// Amount taken out of the investor's position
    pub gross_debit: Decimal,
    pub surge_reasons: Vec<String>,
    pub surge_snapshot: serde_json::Value,
}

/// Per-term surge contributions before the band is applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurgeBreakdown {
    pub investor_pct: Decimal,
    pub pending_pct: Decimal,
    pub liquidity_pct: Decimal,
    /// Sum of the terms, clamped to the band and rounded
    pub total_pct: Decimal,
    pub reasons: Vec<String>,
}

impl SurgeBreakdown {
    fn none() -> Self {
        Self {
            investor_pct: Decimal::ZERO,
            pending_pct: Decimal::ZERO,
            liquidity_pct: Decimal::ZERO,
            total_pct: Decimal::ZERO,
            reasons: Vec::new(),
        }
    }
}

/// Fee calculator bound to one configuration
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    config: FeeConfig,
}

impl FeeCalculator {
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeeConfig {
        &self.config
    }

    /// Surge rate for a metrics snapshot
    pub fn surge(&self, metrics: &PlatformMetrics) -> SurgeBreakdown {
        let cfg = &self.config;
        if !cfg.surge_enabled {
            return SurgeBreakdown::none();
        }

        let mut reasons = Vec::new();

        let investor_pct = cfg.investor_surge_cap
            * normalized_logistic(
                Decimal::from(metrics.active_investors),
                cfg.investor_midpoint,
                cfg.investor_steepness,
            );
        if round_pct(investor_pct) > Decimal::ZERO {
            reasons.push(format!(
                "investor_load: {} active investors (+{})",
                metrics.active_investors,
                round_pct(investor_pct)
            ));
        }

        let excess_pending = (metrics.pending_withdrawals - cfg.pending_free_count).max(0);
        let pending_pct =
            (Decimal::from(excess_pending) * cfg.pending_step_pct).min(cfg.pending_surge_cap);
        if pending_pct > Decimal::ZERO {
            reasons.push(format!(
                "pending_load: {} pending withdrawals (+{})",
                metrics.pending_withdrawals,
                round_pct(pending_pct)
            ));
        }

        let shortfall = (cfg.liquidity_target_ratio - metrics.liquidity_ratio).max(Decimal::ZERO);
        let liquidity_pct = (shortfall * cfg.liquidity_slope).min(cfg.liquidity_surge_cap);
        if round_pct(liquidity_pct) > Decimal::ZERO {
            reasons.push(format!(
                "liquidity: ratio {} below target {} (+{})",
                metrics.liquidity_ratio.round_dp(4),
                cfg.liquidity_target_ratio,
                round_pct(liquidity_pct)
            ));
        }

        let raw = investor_pct + pending_pct + liquidity_pct;
        let clamped = raw.max(cfg.surge_min_pct).min(cfg.surge_max_pct);
        if raw > cfg.surge_max_pct {
            reasons.push(format!("surge capped at {}", cfg.surge_max_pct));
        }

        SurgeBreakdown {
            investor_pct,
            pending_pct,
            liquidity_pct,
            total_pct: round_pct(clamped),
            reasons,
        }
    }

    /// Price a withdrawal of `amount` under `metrics`
    pub fn quote(
        &self,
        amount: Decimal,
        metrics: &PlatformMetrics,
        mode: FeeMode,
    ) -> Result<FeeQuote, PricingError> {
        if amount <= Decimal::ZERO {
            return Err(PricingError::InvalidAmount(amount));
        }
        metrics.validate()?;

        let cfg = &self.config;
        let surge = self.surge(metrics);

        let fee_fixed_pct = round_pct(cfg.fixed_pct);
        let fee_surge_pct = surge.total_pct;
        let fee_fixed_amount = round_cash(amount * fee_fixed_pct);
        let fee_surge_amount = round_cash(amount * fee_surge_pct);
        let fee_flat_amount = round_cash(cfg.flat_surcharge);
        let fee_total_amount = fee_fixed_amount + fee_surge_amount + fee_flat_amount;

        let (amount_payout, gross_debit) = match mode {
            FeeMode::Deducted => (amount - fee_total_amount, amount),
            FeeMode::OnTop => (amount, amount + fee_total_amount),
        };
        if amount_payout <= Decimal::ZERO {
            return Err(PricingError::FeeExceedsAmount {
                amount,
                fee: fee_total_amount,
            });
        }

        let surge_snapshot = json!({
            "metrics": metrics,
            "terms": {
                "investor_pct": round_pct(surge.investor_pct),
                "pending_pct": round_pct(surge.pending_pct),
                "liquidity_pct": round_pct(surge.liquidity_pct),
            },
            "surge_enabled": cfg.surge_enabled,
            "band": [cfg.surge_min_pct, cfg.surge_max_pct],
        });

        tracing::debug!(
            amount = %amount,
            fee_fixed_pct = %fee_fixed_pct,
            fee_surge_pct = %fee_surge_pct,
            fee_total = %fee_total_amount,
            mode = %mode,
            "Withdrawal fee quoted"
        );

        Ok(FeeQuote {
            amount_requested: amount,
            fee_mode: mode,
            fee_fixed_pct,
            fee_surge_pct,
            fee_fixed_amount,
            fee_surge_amount,
            fee_flat_amount,
            fee_total_amount,
            amount_payout,
            gross_debit,
            surge_reasons: surge.reasons,
            surge_snapshot,
        })
    }
}

/// Price a withdrawal with a one-off calculator
pub fn calculate_withdrawal_fees(
    config: &FeeConfig,
    amount: Decimal,
    metrics: &PlatformMetrics,
    mode: FeeMode,
) -> Result<FeeQuote, PricingError> {
    FeeCalculator::new(config.clone()).quote(amount, metrics, mode)
}

/// 1 / (1 + e^(-k(x - mid)))
fn logistic(x: Decimal, midpoint: Decimal, steepness: Decimal) -> Decimal {
    let exponent = -steepness * (x - midpoint);
    match exponent.checked_exp() {
        Some(e) => Decimal::ONE / (Decimal::ONE + e),
        // e^exponent overflowed: the curve is flat at one end
        None if exponent > Decimal::ZERO => Decimal::ZERO,
        None => Decimal::ONE,
    }
}

/// Logistic rescaled to run from 0 at x = 0 up to 1
fn normalized_logistic(x: Decimal, midpoint: Decimal, steepness: Decimal) -> Decimal {
    let at_zero = logistic(Decimal::ZERO, midpoint, steepness);
    if at_zero >= Decimal::ONE {
        return Decimal::ZERO;
    }
    ((logistic(x, midpoint, steepness) - at_zero) / (Decimal::ONE - at_zero)).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn calculator() -> FeeCalculator {
        FeeCalculator::new(FeeConfig::default())
    }

    #[test]
    fn test_base_fee_without_surge() {
        let metrics = PlatformMetrics {
            active_investors: 1,
            pending_withdrawals: 0,
            liquidity_ratio: Decimal::ONE,
        };
        let quote = calculator()
            .quote(dec!(200.00), &metrics, FeeMode::Deducted)
            .unwrap();

        assert_eq!(quote.fee_fixed_pct, dec!(0.0399));
        assert_eq!(quote.fee_surge_pct, dec!(0));
        assert_eq!(quote.fee_fixed_amount, dec!(7.98));
        assert_eq!(quote.fee_total_amount, dec!(7.98));
        assert_eq!(quote.amount_payout, dec!(192.02));
        assert_eq!(quote.gross_debit, dec!(200.00));
        assert!(quote.surge_reasons.is_empty());
    }

    #[test]
    fn test_flat_surcharge_added() {
        let config = FeeConfig {
            flat_surcharge: dec!(1.50),
            ..FeeConfig::default()
        };
        let calm = PlatformMetrics::calm();
        let quote =
            calculate_withdrawal_fees(&config, dec!(200.00), &calm, FeeMode::Deducted).unwrap();
        assert_eq!(quote.fee_flat_amount, dec!(1.50));
        assert_eq!(quote.fee_total_amount, dec!(9.48));
        assert_eq!(quote.amount_payout, dec!(190.52));
    }

    #[test]
    fn test_on_top_mode() {
        let quote = calculator()
            .quote(dec!(200.00), &PlatformMetrics::calm(), FeeMode::OnTop)
            .unwrap();
        assert_eq!(quote.amount_payout, dec!(200.00));
        assert_eq!(quote.gross_debit, dec!(207.98));
        assert_eq!(quote.fee_mode, FeeMode::OnTop);
    }

    #[test]
    fn test_pending_load_surge() {
        let metrics = PlatformMetrics {
            pending_withdrawals: 20,
            ..PlatformMetrics::calm()
        };
        let quote = calculator()
            .quote(dec!(200.00), &metrics, FeeMode::Deducted)
            .unwrap();

        // (20 - 10) * 0.0005
        assert_eq!(quote.fee_surge_pct, dec!(0.0050));
        assert_eq!(quote.fee_surge_amount, dec!(1.00));
        assert_eq!(quote.fee_total_amount, dec!(8.98));
        assert_eq!(quote.surge_reasons.len(), 1);
        assert!(quote.surge_reasons[0].starts_with("pending_load"));
    }

    #[test]
    fn test_liquidity_shortfall_surge() {
        let metrics = PlatformMetrics {
            liquidity_ratio: dec!(0.25),
            ..PlatformMetrics::calm()
        };
        let surge = calculator().surge(&metrics);
        // (0.5 - 0.25) * 0.02
        assert_eq!(surge.total_pct, dec!(0.0050));
        assert!(surge.reasons[0].starts_with("liquidity"));
    }

    #[test]
    fn test_surge_clamped_to_band() {
        let metrics = PlatformMetrics {
            active_investors: 5_000,
            pending_withdrawals: 500,
            liquidity_ratio: Decimal::ZERO,
        };
        let surge = calculator().surge(&metrics);
        assert_eq!(surge.total_pct, dec!(0.02));
        assert!(surge.reasons.iter().any(|r| r.starts_with("surge capped")));
    }

    #[test]
    fn test_investor_term_saturates_monotonically() {
        let calc = calculator();
        let at = |n: i64| {
            calc.surge(&PlatformMetrics {
                active_investors: n,
                ..PlatformMetrics::calm()
            })
            .investor_pct
        };

        assert_eq!(at(0), Decimal::ZERO);
        assert!(at(100) < at(500));
        assert!(at(500) < at(1_000));
        assert!(at(100_000) <= FeeConfig::default().investor_surge_cap);
        assert!(at(100_000) > dec!(0.0099));
    }

    #[test]
    fn test_disabled_surge_ignores_load() {
        let calc = FeeCalculator::new(FeeConfig::flat(dec!(0.0399)));
        let metrics = PlatformMetrics {
            active_investors: 5_000,
            pending_withdrawals: 500,
            liquidity_ratio: Decimal::ZERO,
        };
        let quote = calc.quote(dec!(200.00), &metrics, FeeMode::Deducted).unwrap();
        assert_eq!(quote.fee_surge_pct, Decimal::ZERO);
        assert_eq!(quote.fee_total_amount, dec!(7.98));
    }

    #[test]
    fn test_fee_exceeding_amount_rejected() {
        let config = FeeConfig {
            flat_surcharge: dec!(5.00),
            ..FeeConfig::default()
        };
        let calm = PlatformMetrics::calm();
        let result = calculate_withdrawal_fees(&config, dec!(4.00), &calm, FeeMode::Deducted);
        assert!(matches!(result, Err(PricingError::FeeExceedsAmount { .. })));

        // The same request is payable when the fee is billed on top
        assert!(
            calculate_withdrawal_fees(&config, dec!(4.00), &PlatformMetrics::calm(), FeeMode::OnTop)
                .is_ok()
        );
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let result = calculator().quote(dec!(0), &PlatformMetrics::calm(), FeeMode::Deducted);
        assert_eq!(result, Err(PricingError::InvalidAmount(dec!(0))));
    }

    #[test]
    fn test_snapshot_records_metrics() {
        let metrics = PlatformMetrics {
            active_investors: 3,
            pending_withdrawals: 2,
            liquidity_ratio: dec!(0.9),
        };
        let quote = calculator()
            .quote(dec!(50), &metrics, FeeMode::Deducted)
            .unwrap();
        assert_eq!(quote.surge_snapshot["metrics"]["active_investors"], 3);
        assert_eq!(quote.surge_snapshot["metrics"]["pending_withdrawals"], 2);
    }
}
