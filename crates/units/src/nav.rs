//! Net asset value
//!
//! NAV = investor equity balance / units outstanding over active investors.
//! With nothing outstanding the configured baseline applies.

use crate::error::{UnitsError, UnitsResult};
use navfund_core::{round_cash, round_nav, FundConfig};
use navfund_ledger::{account_balance, AccountRegistry};
use navfund_persistence::{DepositRepo, WithdrawalRepo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

/// NAV together with the figures it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSnapshot {
    pub nav: Decimal,
    pub equity_balance: Decimal,
    pub units_outstanding: Decimal,
    /// True when no units are outstanding and the baseline was used
    pub is_baseline: bool,
}

impl NavSnapshot {
    /// NAV usable as a unit price. Units cannot be priced once equity is zero
    /// or negative while units are outstanding (e.g. after a reversal).
    pub fn unit_price(&self) -> UnitsResult<Decimal> {
        if self.nav <= Decimal::ZERO {
            return Err(UnitsError::NonPositiveNav {
                nav: self.nav,
                units_outstanding: self.units_outstanding,
            });
        }
        Ok(self.nav)
    }
}

/// An investor's holding valued at the current NAV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorUnits {
    pub user_id: String,
    pub units_balance: Decimal,
    pub nav: Decimal,
    pub value: Decimal,
}

/// Units issued minus units burned, over active investors
pub async fn total_units_outstanding(conn: &mut SqliteConnection) -> UnitsResult<Decimal> {
    let issued = DepositRepo::units_issued_active(&mut *conn).await?;
    let burned = WithdrawalRepo::units_burned_active(&mut *conn).await?;
    Ok(issued - burned)
}

/// Balance of the investor equity account, zero before it exists
pub async fn equity_balance(
    conn: &mut SqliteConnection,
    config: &FundConfig,
) -> UnitsResult<Decimal> {
    match AccountRegistry::find_by_code(&mut *conn, &config.equity_account).await? {
        Some(account) => Ok(account_balance(&mut *conn, &account.id, None).await?.balance),
        None => Ok(Decimal::ZERO),
    }
}

pub async fn calculate_nav(
    conn: &mut SqliteConnection,
    config: &FundConfig,
) -> UnitsResult<NavSnapshot> {
    let equity = equity_balance(&mut *conn, config).await?;
    let units = total_units_outstanding(&mut *conn).await?;

    if units <= Decimal::ZERO {
        return Ok(NavSnapshot {
            nav: config.baseline_nav,
            equity_balance: equity,
            units_outstanding: units,
            is_baseline: true,
        });
    }

    Ok(NavSnapshot {
        nav: round_nav(equity / units),
        equity_balance: equity,
        units_outstanding: units,
        is_baseline: false,
    })
}

/// Units held by one investor (approved deposits minus approved/paid withdrawals)
pub async fn investor_units_balance(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> UnitsResult<Decimal> {
    let issued = DepositRepo::units_issued_for_user(&mut *conn, user_id).await?;
    let burned = WithdrawalRepo::units_burned_for_user(&mut *conn, user_id).await?;
    Ok(issued - burned)
}

pub async fn get_investor_units(
    conn: &mut SqliteConnection,
    config: &FundConfig,
    user_id: &str,
) -> UnitsResult<InvestorUnits> {
    let units_balance = investor_units_balance(&mut *conn, user_id).await?;
    let nav = calculate_nav(&mut *conn, config).await?.nav;

    Ok(InvestorUnits {
        user_id: user_id.to_string(),
        units_balance,
        nav,
        value: round_cash(units_balance * nav),
    })
}
