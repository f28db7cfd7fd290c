//! Shared wiring for the workflows

use crate::corrections::CorrectionService;
use crate::deposits::DepositWorkflow;
use crate::gateway::{ManualPayout, PayoutGateway};
use crate::investors::InvestorService;
use crate::metrics::{MetricsSource, StoreMetrics};
use crate::queries::FundQueries;
use crate::withdrawals::WithdrawalWorkflow;
use chrono::{DateTime, Utc};
use navfund_core::{Clock, FundConfig, SystemClock};
use navfund_persistence::Database;
use navfund_pricing::{FeeCalculator, FeeConfig};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Everything a workflow needs: the store, configuration and collaborators
pub struct FundContext {
    pool: SqlitePool,
    config: FundConfig,
    fees: FeeCalculator,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn PayoutGateway>,
    metrics: Arc<dyn MetricsSource>,
}

impl FundContext {
    /// Context with the system clock, a manual payout gateway and metrics
    /// read from the store
    pub fn new(db: &Database, config: FundConfig, fees: FeeConfig) -> Self {
        let pool = db.pool().clone();
        Self {
            metrics: Arc::new(StoreMetrics::new(pool.clone(), config.clone())),
            pool,
            config,
            fees: FeeCalculator::new(fees),
            clock: Arc::new(SystemClock),
            gateway: Arc::new(ManualPayout),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PayoutGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSource>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &FundConfig {
        &self.config
    }

    pub fn fees(&self) -> &FeeCalculator {
        &self.fees
    }

    pub fn gateway(&self) -> &dyn PayoutGateway {
        self.gateway.as_ref()
    }

    pub fn metrics(&self) -> &dyn MetricsSource {
        self.metrics.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // === Services ===

    pub fn investors(&self) -> InvestorService<'_> {
        InvestorService::new(self)
    }

    pub fn deposits(&self) -> DepositWorkflow<'_> {
        DepositWorkflow::new(self)
    }

    pub fn withdrawals(&self) -> WithdrawalWorkflow<'_> {
        WithdrawalWorkflow::new(self)
    }

    pub fn corrections(&self) -> CorrectionService<'_> {
        CorrectionService::new(self)
    }

    pub fn queries(&self) -> FundQueries<'_> {
        FundQueries::new(self)
    }
}
