//! Platform metrics sources for fee pricing

use crate::error::WorkflowResult;
use async_trait::async_trait;
use navfund_core::FundConfig;
use navfund_ledger::{account_balance, AccountRegistry};
use navfund_persistence::{InvestorRepo, WithdrawalRepo};
use navfund_pricing::PlatformMetrics;
use navfund_units::equity_balance;
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::RwLock;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> WorkflowResult<PlatformMetrics>;
}

/// Read the metrics from committed fund state
pub async fn read_platform_metrics(
    conn: &mut SqliteConnection,
    config: &FundConfig,
) -> WorkflowResult<PlatformMetrics> {
    let active_investors = InvestorRepo::count_active(&mut *conn).await?;
    let pending_withdrawals = WithdrawalRepo::count_pending(&mut *conn).await?;

    let cash = match AccountRegistry::find_by_code(&mut *conn, &config.cash_account).await? {
        Some(account) => account_balance(&mut *conn, &account.id, None).await?.balance,
        None => Decimal::ZERO,
    };
    let equity = equity_balance(&mut *conn, config).await?;

    Ok(PlatformMetrics {
        active_investors,
        pending_withdrawals,
        liquidity_ratio: PlatformMetrics::liquidity_ratio(cash, equity),
    })
}

/// Metrics derived from the fund database
#[derive(Clone)]
pub struct StoreMetrics {
    pool: SqlitePool,
    config: FundConfig,
}

impl StoreMetrics {
    pub fn new(pool: SqlitePool, config: FundConfig) -> Self {
        Self { pool, config }
    }
}

#[async_trait]
impl MetricsSource for StoreMetrics {
    async fn snapshot(&self) -> WorkflowResult<PlatformMetrics> {
        let mut conn = self.pool.acquire().await?;
        read_platform_metrics(&mut conn, &self.config).await
    }
}

/// Metrics set by hand, for tests and what-if pricing
#[derive(Debug)]
pub struct FixedMetrics {
    metrics: RwLock<PlatformMetrics>,
}

impl FixedMetrics {
    pub fn new(metrics: PlatformMetrics) -> Self {
        Self {
            metrics: RwLock::new(metrics),
        }
    }

    pub fn set(&self, metrics: PlatformMetrics) {
        *self.metrics.write().unwrap_or_else(|e| e.into_inner()) = metrics;
    }
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self::new(PlatformMetrics::calm())
    }
}

#[async_trait]
impl MetricsSource for FixedMetrics {
    async fn snapshot(&self) -> WorkflowResult<PlatformMetrics> {
        Ok(self
            .metrics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use navfund_core::Investor;
    use navfund_persistence::memory_pool;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_store_metrics_empty_fund() {
        let pool = memory_pool().await.unwrap();
        let source = StoreMetrics::new(pool, FundConfig::default());

        let metrics = source.snapshot().await.unwrap();
        assert_eq!(metrics, PlatformMetrics::calm());
    }

    #[tokio::test]
    async fn test_store_metrics_counts_active_investors() {
        let pool = memory_pool().await.unwrap();
        {
            let mut conn = pool.acquire().await.unwrap();
            for (user, active) in [("alice", true), ("bob", true), ("carol", false)] {
                InvestorRepo::insert(
                    &mut conn,
                    &Investor {
                        user_id: user.to_string(),
                        display_name: user.to_string(),
                        active,
                        created_at: Utc::now(),
                    },
                )
                .await
                .unwrap();
            }
        }

        let metrics = StoreMetrics::new(pool, FundConfig::default())
            .snapshot()
            .await
            .unwrap();
        assert_eq!(metrics.active_investors, 2);
        assert_eq!(metrics.pending_withdrawals, 0);
    }

    #[tokio::test]
    async fn test_fixed_metrics_set() {
        let source = FixedMetrics::default();
        source.set(PlatformMetrics {
            active_investors: 3,
            pending_withdrawals: 20,
            liquidity_ratio: dec!(0.25),
        });
        assert_eq!(source.snapshot().await.unwrap().pending_withdrawals, 20);
    }
}
