//! Pool-level units facade

use crate::error::UnitsResult;
use crate::issuance::{self, Issuance};
use crate::nav::{self, InvestorUnits, NavSnapshot};
use navfund_core::{Clock, FundConfig, Origin};
use navfund_persistence::begin_write;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct UnitsService {
    pool: SqlitePool,
    config: FundConfig,
    clock: Arc<dyn Clock>,
}

impl UnitsService {
    pub fn new(pool: SqlitePool, config: FundConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            config,
            clock,
        }
    }

    pub async fn calculate_nav(&self) -> UnitsResult<NavSnapshot> {
        let mut conn = self.pool.acquire().await?;
        nav::calculate_nav(&mut conn, &self.config).await
    }

    pub async fn get_investor_units(&self, user_id: &str) -> UnitsResult<InvestorUnits> {
        let mut conn = self.pool.acquire().await?;
        nav::get_investor_units(&mut conn, &self.config, user_id).await
    }

    /// Issue units for a deposit in a transaction of its own
    pub async fn issue_units(
        &self,
        deposit_id: &str,
        actor_id: &str,
        origin: &Origin,
    ) -> UnitsResult<Issuance> {
        let mut tx = begin_write(&self.pool).await?;
        let issued = issuance::issue_units(
            &mut tx,
            &self.config,
            deposit_id,
            actor_id,
            origin,
            self.clock.now(),
        )
        .await?;
        tx.commit().await?;
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use navfund_core::{Deposit, DepositStatus, Investor, ManualClock};
    use navfund_persistence::{memory_pool, DepositRepo, InvestorRepo};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_issue_through_facade() {
        let pool = memory_pool().await.unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let service = UnitsService::new(
            pool.clone(),
            FundConfig::default(),
            Arc::new(ManualClock::new(at)),
        );

        {
            let mut conn = pool.acquire().await.unwrap();
            InvestorRepo::insert(
                &mut conn,
                &Investor {
                    user_id: "alice".to_string(),
                    display_name: "Alice".to_string(),
                    active: true,
                    created_at: at,
                },
            )
            .await
            .unwrap();
            DepositRepo::insert(
                &mut conn,
                &Deposit {
                    id: "dep-1".to_string(),
                    user_id: "alice".to_string(),
                    amount: dec!(250.00),
                    status: DepositStatus::Pending,
                    proof_url: None,
                    units_issued: None,
                    nav_at_issue: None,
                    ledger_entry_id: None,
                    approved_by: None,
                    approved_at: None,
                    rejection_reason: None,
                    rejected_by: None,
                    rejected_at: None,
                    created_at: at,
                },
            )
            .await
            .unwrap();
        }

        let issued = service
            .issue_units("dep-1", "admin", &Origin::system())
            .await
            .unwrap();
        assert_eq!(issued.units, dec!(25));
        assert!(!issued.already_applied);

        let holding = service.get_investor_units("alice").await.unwrap();
        assert_eq!(holding.units_balance, dec!(25));
        assert_eq!(holding.value, dec!(250));

        let snapshot = service.calculate_nav().await.unwrap();
        assert_eq!(snapshot.nav, dec!(10));
        assert!(!snapshot.is_baseline);
    }
}
