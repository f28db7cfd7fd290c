//! Unit issuance and burning
//!
//! Both operations take the caller's connection so they run inside the
//! caller's transaction. Issuance owns the whole deposit approval: NAV
//! snapshot, guarded status update, ledger post and audit record.

use crate::error::{UnitsError, UnitsResult};
use crate::nav::{calculate_nav, investor_units_balance};
use chrono::{DateTime, Utc};
use navfund_core::{round_units, AccountType, DepositStatus, FundConfig, Origin, UNIT_SCALE};
use navfund_ledger::{post_entry, AccountRegistry, EntryBuilder, Posting};
use navfund_persistence::{AuditRepo, DepositRepo, NewAuditEntry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;

/// Reference type of ledger entries posted for deposits
pub const DEPOSIT_REFERENCE: &str = "DEPOSIT";

/// Outcome of issuing units for a deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub deposit_id: String,
    pub units: Decimal,
    pub nav: Decimal,
    pub ledger_entry_id: Option<String>,
    /// True when the deposit was already approved and nothing changed
    pub already_applied: bool,
}

/// Units to burn for a withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burn {
    pub user_id: String,
    pub units: Decimal,
    pub nav: Decimal,
}

/// Approve a pending deposit by issuing units at the current NAV.
///
/// Repeating the call on an approved deposit returns the recorded result.
pub async fn issue_units(
    conn: &mut SqliteConnection,
    config: &FundConfig,
    deposit_id: &str,
    actor_id: &str,
    origin: &Origin,
    at: DateTime<Utc>,
) -> UnitsResult<Issuance> {
    let deposit = DepositRepo::get(&mut *conn, deposit_id).await.map_err(|e| {
        if e.is_not_found() {
            UnitsError::DepositNotFound(deposit_id.to_string())
        } else {
            e.into()
        }
    })?;

    match deposit.status {
        DepositStatus::Pending => {}
        DepositStatus::Approved => {
            tracing::debug!(deposit_id = %deposit_id, "Deposit already approved");
            return Ok(Issuance {
                deposit_id: deposit.id,
                units: deposit.units_issued.unwrap_or_default(),
                nav: deposit.nav_at_issue.unwrap_or_default(),
                ledger_entry_id: deposit.ledger_entry_id,
                already_applied: true,
            });
        }
        DepositStatus::Rejected => {
            return Err(UnitsError::InvalidState {
                id: deposit.id,
                status: deposit.status.to_string(),
            });
        }
    }

    let nav = calculate_nav(&mut *conn, config).await?.unit_price()?;
    let units = round_units(deposit.amount / nav);
    if units <= Decimal::ZERO {
        return Err(UnitsError::ZeroUnits {
            amount: deposit.amount,
            nav,
        });
    }

    let cash = AccountRegistry::get_or_create(
        &mut *conn,
        &config.cash_account,
        "Bank",
        AccountType::Asset,
        at,
    )
    .await?;
    let equity = AccountRegistry::get_or_create(
        &mut *conn,
        &config.equity_account,
        "Investor Equity",
        AccountType::Equity,
        at,
    )
    .await?;

    let entry = EntryBuilder::new(format!("Deposit {} approved", deposit.id))
        .reference(DEPOSIT_REFERENCE, &deposit.id)
        .created_by(actor_id)
        .line(Posting::debit(&cash.id, deposit.amount).for_user(&deposit.user_id))
        .line(Posting::credit(&equity.id, deposit.amount).for_user(&deposit.user_id))
        .build()?;
    let posted = post_entry(&mut *conn, entry, at).await?;

    let won =
        DepositRepo::mark_approved(&mut *conn, &deposit.id, units, nav, &posted.id, actor_id, at)
            .await?;
    if !won {
        tracing::warn!(deposit_id = %deposit.id, "Deposit approval lost a concurrent update");
        return Err(UnitsError::ConcurrencyConflict(deposit.id));
    }

    AuditRepo::append(
        &mut *conn,
        NewAuditEntry::new(actor_id, "deposit.approve", "deposit", &deposit.id)
            .metadata(json!({
                "user_id": deposit.user_id,
                "amount": deposit.amount,
                "units_issued": units,
                "nav_at_issue": nav,
                "ledger_entry_id": posted.id,
                "status": { "before": "PENDING", "after": "APPROVED" },
            }))
            .origin(origin)
            .at(at),
    )
    .await?;

    tracing::info!(
        deposit_id = %deposit.id,
        user_id = %deposit.user_id,
        amount = %deposit.amount,
        units = %units,
        nav = %nav,
        "Units issued"
    );

    Ok(Issuance {
        deposit_id: deposit.id,
        units,
        nav,
        ledger_entry_id: Some(posted.id),
        already_applied: false,
    })
}

/// Compute and check the units burned for withdrawing `amount`.
///
/// Units are priced at the NAV at call time. The burn itself is persisted by
/// the caller on the withdrawal record, in the same transaction.
pub async fn burn_units(
    conn: &mut SqliteConnection,
    config: &FundConfig,
    user_id: &str,
    amount: Decimal,
    actor_id: &str,
    origin: &Origin,
    at: DateTime<Utc>,
) -> UnitsResult<Burn> {
    let nav = calculate_nav(&mut *conn, config).await?.unit_price()?;
    let available = investor_units_balance(&mut *conn, user_id).await?;

    let mut units = round_units(amount / nav);
    // A full exit can overshoot the holding by one rounding step
    let tolerance = Decimal::new(1, UNIT_SCALE);
    if units > available && units - available <= tolerance {
        units = available;
    }

    if units <= Decimal::ZERO {
        return Err(UnitsError::ZeroUnits { amount, nav });
    }
    if units > available {
        return Err(UnitsError::InsufficientUnits {
            user_id: user_id.to_string(),
            required: units,
            available,
        });
    }

    AuditRepo::append(
        &mut *conn,
        NewAuditEntry::new(actor_id, "units.burn", "investor", user_id)
            .metadata(json!({
                "amount": amount,
                "units": units,
                "nav": nav,
                "units_before": available,
                "units_after": available - units,
            }))
            .origin(origin)
            .at(at),
    )
    .await?;

    tracing::info!(
        user_id = %user_id,
        amount = %amount,
        units = %units,
        nav = %nav,
        "Units burned"
    );

    Ok(Burn {
        user_id: user_id.to_string(),
        units,
        nav,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{calculate_nav, get_investor_units, total_units_outstanding};
    use navfund_core::{Deposit, Investor};
    use navfund_ledger::{reverse_entry, verify_integrity};
    use navfund_persistence::{memory_pool, InvestorRepo, LedgerRepo};
    use rust_decimal_macros::dec;

    async fn add_investor(conn: &mut SqliteConnection, user_id: &str) {
        InvestorRepo::insert(
            conn,
            &Investor {
                user_id: user_id.to_string(),
                display_name: user_id.to_uppercase(),
                active: true,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    async fn add_deposit(conn: &mut SqliteConnection, user_id: &str, amount: Decimal) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        DepositRepo::insert(
            conn,
            &Deposit {
                id: id.clone(),
                user_id: user_id.to_string(),
                amount,
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
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        id
    }

    async fn approve(conn: &mut SqliteConnection, config: &FundConfig, id: &str) -> Issuance {
        issue_units(conn, config, id, "admin", &Origin::system(), Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_baseline_nav_when_empty() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();

        let snapshot = calculate_nav(&mut conn, &config).await.unwrap();
        assert_eq!(snapshot.nav, dec!(10));
        assert!(snapshot.is_baseline);
        assert_eq!(snapshot.units_outstanding, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_issue_units_scenario() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;
        add_investor(&mut conn, "bob").await;

        let first = add_deposit(&mut conn, "alice", dec!(1000.00)).await;
        let issued = approve(&mut conn, &config, &first).await;
        assert_eq!(issued.units, dec!(100.000000));
        assert_eq!(issued.nav, dec!(10));
        assert!(!issued.already_applied);

        let snapshot = calculate_nav(&mut conn, &config).await.unwrap();
        assert_eq!(snapshot.equity_balance, dec!(1000.00));
        assert_eq!(snapshot.nav, dec!(10.0000));
        assert!(!snapshot.is_baseline);

        let second = add_deposit(&mut conn, "bob", dec!(500.00)).await;
        let issued = approve(&mut conn, &config, &second).await;
        assert_eq!(issued.units, dec!(50.000000));

        let snapshot = calculate_nav(&mut conn, &config).await.unwrap();
        assert_eq!(snapshot.equity_balance, dec!(1500.00));
        assert_eq!(snapshot.units_outstanding, dec!(150));
        assert_eq!(snapshot.nav, dec!(10));

        let alice = get_investor_units(&mut conn, &config, "alice").await.unwrap();
        assert_eq!(alice.units_balance, dec!(100));
        assert_eq!(alice.value, dec!(1000.00));

        assert!(verify_integrity(&mut conn).await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_issue_units_idempotent() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;

        let id = add_deposit(&mut conn, "alice", dec!(250.00)).await;
        let first = approve(&mut conn, &config, &id).await;
        let second = approve(&mut conn, &config, &id).await;

        assert!(second.already_applied);
        assert_eq!(second.units, first.units);
        assert_eq!(second.nav, first.nav);
        assert_eq!(second.ledger_entry_id, first.ledger_entry_id);
        assert_eq!(LedgerRepo::count_entries(&mut conn).await.unwrap(), 1);
        assert_eq!(total_units_outstanding(&mut conn).await.unwrap(), dec!(25));
    }

    #[tokio::test]
    async fn test_issue_units_on_rejected_or_missing() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;

        let id = add_deposit(&mut conn, "alice", dec!(100)).await;
        DepositRepo::mark_rejected(&mut conn, &id, "unreadable proof", "admin", Utc::now())
            .await
            .unwrap();

        let result =
            issue_units(&mut conn, &config, &id, "admin", &Origin::system(), Utc::now()).await;
        assert!(matches!(result, Err(UnitsError::InvalidState { .. })));

        let system = Origin::system();
        let result =
            issue_units(&mut conn, &config, "missing", "admin", &system, Utc::now()).await;
        assert!(matches!(result, Err(UnitsError::DepositNotFound(_))));
        assert_eq!(LedgerRepo::count_entries(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nav_reflects_equity_gain() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;
        add_investor(&mut conn, "bob").await;

        let id = add_deposit(&mut conn, "alice", dec!(1000.00)).await;
        approve(&mut conn, &config, &id).await;

        // Fund gains 100.00 without issuing units
        let bank = AccountRegistry::find_by_code(&mut conn, &config.cash_account)
            .await
            .unwrap()
            .unwrap();
        let equity = AccountRegistry::find_by_code(&mut conn, &config.equity_account)
            .await
            .unwrap()
            .unwrap();
        let gain = EntryBuilder::new("Investment gain")
            .reference("MANUAL", "gain-1")
            .created_by("admin")
            .debit(&bank.id, dec!(100.00))
            .credit(&equity.id, dec!(100.00))
            .build()
            .unwrap();
        post_entry(&mut conn, gain, Utc::now()).await.unwrap();

        assert_eq!(calculate_nav(&mut conn, &config).await.unwrap().nav, dec!(11));

        let id = add_deposit(&mut conn, "bob", dec!(550.00)).await;
        let issued = approve(&mut conn, &config, &id).await;
        assert_eq!(issued.nav, dec!(11));
        assert_eq!(issued.units, dec!(50));
    }

    #[tokio::test]
    async fn test_suspended_investor_excluded_from_nav() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;

        let id = add_deposit(&mut conn, "alice", dec!(1000.00)).await;
        approve(&mut conn, &config, &id).await;
        InvestorRepo::set_active(&mut conn, "alice", false).await.unwrap();

        let snapshot = calculate_nav(&mut conn, &config).await.unwrap();
        assert!(snapshot.is_baseline);
        assert_eq!(snapshot.nav, config.baseline_nav);
    }

    #[tokio::test]
    async fn test_burn_units_checks_holding() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;

        let id = add_deposit(&mut conn, "alice", dec!(1000.00)).await;
        let issued = approve(&mut conn, &config, &id).await;

        let system = Origin::system();
        let burn =
            burn_units(&mut conn, &config, "alice", dec!(200.00), "admin", &system, Utc::now())
                .await
                .unwrap();
        assert_eq!(burn.units, dec!(20.000000));
        assert_eq!(burn.nav, dec!(10));

        // Burning the full deposit amount at unchanged NAV takes back exactly what was issued
        let full =
            burn_units(&mut conn, &config, "alice", dec!(1000.00), "admin", &system, Utc::now())
                .await
                .unwrap();
        assert_eq!(full.units, issued.units);

        let result =
            burn_units(&mut conn, &config, "alice", dec!(1000.01), "admin", &system, Utc::now())
                .await;
        assert!(matches!(result, Err(UnitsError::InsufficientUnits { .. })));
    }

    #[tokio::test]
    async fn test_issue_writes_audit_entry() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;

        let id = add_deposit(&mut conn, "alice", dec!(40.00)).await;
        approve(&mut conn, &config, &id).await;

        let audit = AuditRepo::list_for_resource(&mut conn, "deposit", &id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "deposit.approve");
        assert_eq!(audit[0].metadata["units_issued"], "4.000000");
        assert_eq!(audit[0].metadata["status"]["after"], "APPROVED");
    }

    #[tokio::test]
    async fn test_reversed_deposit_blocks_pricing() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let config = FundConfig::default();
        add_investor(&mut conn, "alice").await;
        add_investor(&mut conn, "bob").await;

        let id = add_deposit(&mut conn, "alice", dec!(1000.00)).await;
        let issued = approve(&mut conn, &config, &id).await;
        let entry_id = issued.ledger_entry_id.unwrap();
        let reason = "bank transfer bounced";
        reverse_entry(&mut conn, &entry_id, reason, "admin", Utc::now())
            .await
            .unwrap();

        // Units stay outstanding while the equity behind them is gone
        let snapshot = calculate_nav(&mut conn, &config).await.unwrap();
        assert_eq!(snapshot.units_outstanding, dec!(100));
        assert_eq!(snapshot.nav, Decimal::ZERO);
        assert!(matches!(snapshot.unit_price(), Err(UnitsError::NonPositiveNav { .. })));

        let pending = add_deposit(&mut conn, "bob", dec!(100.00)).await;
        let result =
            issue_units(&mut conn, &config, &pending, "admin", &Origin::system(), Utc::now()).await;
        assert!(matches!(result, Err(UnitsError::NonPositiveNav { .. })));
        let deposit = DepositRepo::get(&mut conn, &pending).await.unwrap();
        assert_eq!(deposit.status, DepositStatus::Pending);

        let system = Origin::system();
        let result =
            burn_units(&mut conn, &config, "alice", dec!(10.00), "admin", &system, Utc::now())
                .await;
        assert!(matches!(result, Err(UnitsError::NonPositiveNav { .. })));
        assert_eq!(total_units_outstanding(&mut conn).await.unwrap(), dec!(100));
    }
}
