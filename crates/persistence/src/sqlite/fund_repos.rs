//! Deposit and withdrawal repositories
//!
//! Status transitions are guarded updates: the `WHERE status = ...` clause is
//! the precondition, and the returned `bool` tells the caller whether this
//! call won the transition. A `false` means the row moved under us.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::repos::Page;
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use navfund_core::{Deposit, DepositStatus, Withdrawal, WithdrawalStatus};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

/// Sum TEXT decimal values fetched as single-column rows
fn sum_decimals(field: &str, rows: Vec<(String,)>) -> PersistenceResult<Decimal> {
    rows.iter().try_fold(Decimal::ZERO, |acc, (raw,)| {
        Ok(acc + parse_decimal(field, raw)?)
    })
}

// ============================================================================
// Deposit Repository
// ============================================================================

pub struct DepositRepo;

impl DepositRepo {
    pub async fn insert(conn: &mut SqliteConnection, deposit: &Deposit) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deposits (id, user_id, amount, status, proof_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&deposit.id)
        .bind(&deposit.user_id)
        .bind(deposit.amount.to_string())
        .bind(deposit.status.as_ref())
        .bind(&deposit.proof_url)
        .bind(deposit.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Deposit> {
        sqlx::query_as::<_, DepositRow>("SELECT * FROM deposits WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Deposit", id))?
            .try_into()
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        status: Option<DepositStatus>,
        user_id: Option<&str>,
        page: Page,
    ) -> PersistenceResult<Vec<Deposit>> {
        sqlx::query_as::<_, DepositRow>(
            r#"
            SELECT * FROM deposits
            WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)
            ORDER BY created_at, rowid
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(status.map(|s| s.as_ref().to_string()))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(Deposit::try_from)
        .collect()
    }

    /// PENDING -> APPROVED, writing the unit snapshot exactly once
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_approved(
        conn: &mut SqliteConnection,
        id: &str,
        units_issued: Decimal,
        nav_at_issue: Decimal,
        ledger_entry_id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deposits
            SET status = 'APPROVED', units_issued = ?, nav_at_issue = ?, ledger_entry_id = ?,
                approved_by = ?, approved_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(units_issued.to_string())
        .bind(nav_at_issue.to_string())
        .bind(ledger_entry_id)
        .bind(actor_id)
        .bind(at)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// PENDING -> REJECTED
    pub async fn mark_rejected(
        conn: &mut SqliteConnection,
        id: &str,
        reason: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deposits
            SET status = 'REJECTED', rejection_reason = ?, rejected_by = ?, rejected_at = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(reason)
        .bind(actor_id)
        .bind(at)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Units issued to one investor over approved deposits
    pub async fn units_issued_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> PersistenceResult<Decimal> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT units_issued FROM deposits
            WHERE user_id = ? AND status = 'APPROVED' AND units_issued IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;
        sum_decimals("units_issued", rows)
    }

    /// Units issued over approved deposits of active investors
    pub async fn units_issued_active(conn: &mut SqliteConnection) -> PersistenceResult<Decimal> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT d.units_issued FROM deposits d
            JOIN investors i ON i.user_id = d.user_id
            WHERE d.status = 'APPROVED' AND d.units_issued IS NOT NULL AND i.active = 1
            "#,
        )
        .fetch_all(conn)
        .await?;
        sum_decimals("units_issued", rows)
    }
}

// ============================================================================
// Withdrawal Repository
// ============================================================================

pub struct WithdrawalRepo;

impl WithdrawalRepo {
    pub async fn insert(
        conn: &mut SqliteConnection,
        withdrawal: &Withdrawal,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdrawals (
                id, user_id, amount_requested, fee_mode, fee_fixed_pct, fee_surge_pct,
                fee_fixed_amount, fee_surge_amount, fee_flat_amount, fee_total_amount,
                amount_payout, surge_reasons, surge_snapshot, nav_at_request, cooldown_until,
                status, payout_attempts, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&withdrawal.id)
        .bind(&withdrawal.user_id)
        .bind(withdrawal.amount_requested.to_string())
        .bind(withdrawal.fee_mode.as_ref())
        .bind(withdrawal.fee_fixed_pct.to_string())
        .bind(withdrawal.fee_surge_pct.to_string())
        .bind(withdrawal.fee_fixed_amount.to_string())
        .bind(withdrawal.fee_surge_amount.to_string())
        .bind(withdrawal.fee_flat_amount.to_string())
        .bind(withdrawal.fee_total_amount.to_string())
        .bind(withdrawal.amount_payout.to_string())
        .bind(serde_json::to_string(&withdrawal.surge_reasons)?)
        .bind(serde_json::to_string(&withdrawal.surge_snapshot)?)
        .bind(withdrawal.nav_at_request.to_string())
        .bind(withdrawal.cooldown_until)
        .bind(withdrawal.status.as_ref())
        .bind(withdrawal.payout_attempts)
        .bind(withdrawal.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Withdrawal> {
        sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Withdrawal", id))?
            .try_into()
    }

    pub async fn list(
        conn: &mut SqliteConnection,
        status: Option<WithdrawalStatus>,
        user_id: Option<&str>,
        page: Page,
    ) -> PersistenceResult<Vec<Withdrawal>> {
        sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT * FROM withdrawals
            WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user_id = ?2)
            ORDER BY created_at, rowid
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(status.map(|s| s.as_ref().to_string()))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(Withdrawal::try_from)
        .collect()
    }

    /// Every pending request of one investor, oldest first
    pub async fn pending_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> PersistenceResult<Vec<Withdrawal>> {
        sqlx::query_as::<_, WithdrawalRow>(
            "SELECT * FROM withdrawals WHERE user_id = ? AND status = 'PENDING' ORDER BY created_at, rowid",
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(Withdrawal::try_from)
        .collect()
    }

    pub async fn count_pending(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM withdrawals WHERE status = 'PENDING'")
                .fetch_one(conn)
                .await?;
        Ok(row.0)
    }

    /// Claim a pending withdrawal for a payout attempt.
    ///
    /// Succeeds when nobody holds the claim, or the existing claim was taken
    /// before `stale_before`.
    pub async fn claim_payout(
        conn: &mut SqliteConnection,
        id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET payout_claimed_by = ?, payout_claimed_at = ?, payout_attempts = payout_attempts + 1
            WHERE id = ? AND status = 'PENDING'
              AND (payout_claimed_by IS NULL OR payout_claimed_at < ?)
            "#,
        )
        .bind(actor_id)
        .bind(at)
        .bind(id)
        .bind(stale_before)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Drop a claim after a failed payout, recording why
    pub async fn release_claim(
        conn: &mut SqliteConnection,
        id: &str,
        actor_id: &str,
        failure_reason: &str,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET payout_claimed_by = NULL, payout_claimed_at = NULL, payout_failure_reason = ?
            WHERE id = ? AND status = 'PENDING' AND payout_claimed_by = ?
            "#,
        )
        .bind(failure_reason)
        .bind(id)
        .bind(actor_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// PENDING -> APPROVED for the holder of the payout claim
    #[allow(clippy::too_many_arguments)]
    pub async fn mark_approved(
        conn: &mut SqliteConnection,
        id: &str,
        actor_id: &str,
        units_burned: Decimal,
        nav_at_burn: Decimal,
        ledger_entry_id: &str,
        payout_reference: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'APPROVED', units_burned = ?, nav_at_burn = ?, ledger_entry_id = ?,
                payout_reference = ?, approved_by = ?, approved_at = ?,
                payout_claimed_by = NULL, payout_claimed_at = NULL, payout_failure_reason = NULL
            WHERE id = ? AND status = 'PENDING' AND payout_claimed_by = ?
            "#,
        )
        .bind(units_burned.to_string())
        .bind(nav_at_burn.to_string())
        .bind(ledger_entry_id)
        .bind(payout_reference)
        .bind(actor_id)
        .bind(at)
        .bind(id)
        .bind(actor_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// PENDING -> REJECTED, only while no payout attempt is in flight
    pub async fn mark_rejected(
        conn: &mut SqliteConnection,
        id: &str,
        reason: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'REJECTED', rejection_reason = ?, rejected_by = ?, rejected_at = ?
            WHERE id = ? AND status = 'PENDING' AND payout_claimed_by IS NULL
            "#,
        )
        .bind(reason)
        .bind(actor_id)
        .bind(at)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// APPROVED -> PAID
    pub async fn mark_paid(
        conn: &mut SqliteConnection,
        id: &str,
        settlement_reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'PAID', paid_at = ?,
                payout_reference = COALESCE(?, payout_reference)
            WHERE id = ? AND status = 'APPROVED'
            "#,
        )
        .bind(at)
        .bind(settlement_reference)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Units burned by one investor over approved/paid withdrawals
    pub async fn units_burned_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> PersistenceResult<Decimal> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT units_burned FROM withdrawals
            WHERE user_id = ? AND status IN ('APPROVED', 'PAID') AND units_burned IS NOT NULL
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;
        sum_decimals("units_burned", rows)
    }

    /// Units burned over approved/paid withdrawals of active investors
    pub async fn units_burned_active(conn: &mut SqliteConnection) -> PersistenceResult<Decimal> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT w.units_burned FROM withdrawals w
            JOIN investors i ON i.user_id = w.user_id
            WHERE w.status IN ('APPROVED', 'PAID') AND w.units_burned IS NOT NULL AND i.active = 1
            "#,
        )
        .fetch_all(conn)
        .await?;
        sum_decimals("units_burned", rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::{memory_pool, InvestorRepo};
    use chrono::Duration;
    use navfund_core::{FeeMode, Investor};
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn seed_investor(conn: &mut SqliteConnection, user_id: &str) {
        InvestorRepo::insert(
            conn,
            &Investor {
                user_id: user_id.to_string(),
                display_name: user_id.to_string(),
                active: true,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    fn pending_deposit(id: &str, user_id: &str, amount: Decimal) -> Deposit {
        Deposit {
            id: id.to_string(),
            user_id: user_id.to_string(),
            amount,
            status: DepositStatus::Pending,
            proof_url: Some("https://proofs.example/1.png".to_string()),
            units_issued: None,
            nav_at_issue: None,
            ledger_entry_id: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            rejected_by: None,
            rejected_at: None,
            created_at: Utc::now(),
        }
    }

    fn pending_withdrawal(id: &str, user_id: &str) -> Withdrawal {
        Withdrawal {
            id: id.to_string(),
            user_id: user_id.to_string(),
            amount_requested: dec!(200.00),
            fee_mode: FeeMode::Deducted,
            fee_fixed_pct: dec!(0.0399),
            fee_surge_pct: dec!(0),
            fee_fixed_amount: dec!(7.98),
            fee_surge_amount: dec!(0.00),
            fee_flat_amount: dec!(0.00),
            fee_total_amount: dec!(7.98),
            amount_payout: dec!(192.02),
            surge_reasons: vec![],
            surge_snapshot: json!({ "active_investors": 1 }),
            nav_at_request: dec!(10),
            cooldown_until: Utc::now() + Duration::hours(24),
            status: WithdrawalStatus::Pending,
            units_burned: None,
            nav_at_burn: None,
            ledger_entry_id: None,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            payout_reference: None,
            payout_claimed_by: None,
            payout_claimed_at: None,
            payout_failure_reason: None,
            payout_attempts: 0,
            rejection_reason: None,
            rejected_by: None,
            rejected_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_deposit_guarded_transitions() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed_investor(&mut conn, "alice").await;

        DepositRepo::insert(&mut conn, &pending_deposit("dep-1", "alice", dec!(1000.00)))
            .await
            .unwrap();

        // First transition wins, the replay loses
        let won =
            DepositRepo::mark_rejected(&mut conn, "dep-1", "blurry proof", "admin", Utc::now())
                .await
                .unwrap();
        let lost = DepositRepo::mark_rejected(&mut conn, "dep-1", "again", "admin", Utc::now())
            .await
            .unwrap();
        assert!(won);
        assert!(!lost);

        let deposit = DepositRepo::get(&mut conn, "dep-1").await.unwrap();
        assert_eq!(deposit.status, DepositStatus::Rejected);
        assert_eq!(deposit.rejection_reason.as_deref(), Some("blurry proof"));
    }

    #[tokio::test]
    async fn test_deposit_list_filters() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed_investor(&mut conn, "alice").await;
        seed_investor(&mut conn, "bob").await;

        DepositRepo::insert(&mut conn, &pending_deposit("dep-1", "alice", dec!(10)))
            .await
            .unwrap();
        DepositRepo::insert(&mut conn, &pending_deposit("dep-2", "bob", dec!(20)))
            .await
            .unwrap();

        let all = DepositRepo::list(&mut conn, None, None, Page::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let pending = Some(DepositStatus::Pending);
        let bobs = DepositRepo::list(&mut conn, pending, Some("bob"), Page::default())
            .await
            .unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].amount, dec!(20));
    }

    #[tokio::test]
    async fn test_withdrawal_roundtrip_and_claim() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed_investor(&mut conn, "alice").await;

        let original = pending_withdrawal("wd-1", "alice");
        WithdrawalRepo::insert(&mut conn, &original).await.unwrap();

        let stored = WithdrawalRepo::get(&mut conn, "wd-1").await.unwrap();
        assert_eq!(stored.fee_total_amount, dec!(7.98));
        assert_eq!(stored.amount_payout, dec!(192.02));
        assert_eq!(stored.surge_snapshot, json!({ "active_investors": 1 }));
        assert_eq!(WithdrawalRepo::count_pending(&mut conn).await.unwrap(), 1);

        let now = Utc::now();
        let stale_before = now - Duration::minutes(5);
        assert!(WithdrawalRepo::claim_payout(&mut conn, "wd-1", "admin-1", now, stale_before)
            .await
            .unwrap());
        // Second claimer loses while the first claim is fresh
        assert!(!WithdrawalRepo::claim_payout(&mut conn, "wd-1", "admin-2", now, stale_before)
            .await
            .unwrap());
        // Rejection is blocked while a payout is in flight
        assert!(!WithdrawalRepo::mark_rejected(&mut conn, "wd-1", "too late", "admin-2", now)
            .await
            .unwrap());

        assert!(WithdrawalRepo::release_claim(&mut conn, "wd-1", "admin-1", "bank timeout")
            .await
            .unwrap());
        let stored = WithdrawalRepo::get(&mut conn, "wd-1").await.unwrap();
        assert_eq!(stored.status, WithdrawalStatus::Pending);
        assert_eq!(stored.payout_attempts, 1);
        assert_eq!(stored.payout_failure_reason.as_deref(), Some("bank timeout"));
        assert!(stored.payout_claimed_by.is_none());
    }

    #[tokio::test]
    async fn test_stale_claim_can_be_taken_over() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        seed_investor(&mut conn, "alice").await;
        WithdrawalRepo::insert(&mut conn, &pending_withdrawal("wd-1", "alice"))
            .await
            .unwrap();

        let then = Utc::now() - Duration::hours(1);
        assert!(WithdrawalRepo::claim_payout(&mut conn, "wd-1", "admin-1", then, then)
            .await
            .unwrap());

        let now = Utc::now();
        let stale_before = now - Duration::minutes(1);
        assert!(WithdrawalRepo::claim_payout(&mut conn, "wd-1", "admin-2", now, stale_before)
            .await
            .unwrap());
        let stored = WithdrawalRepo::get(&mut conn, "wd-1").await.unwrap();
        assert_eq!(stored.payout_claimed_by.as_deref(), Some("admin-2"));
        assert_eq!(stored.payout_attempts, 2);
    }

    #[tokio::test]
    async fn test_units_sums_empty() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert_eq!(DepositRepo::units_issued_active(&mut conn).await.unwrap(), Decimal::ZERO);
        assert_eq!(
            WithdrawalRepo::units_burned_for_user(&mut conn, "nobody").await.unwrap(),
            Decimal::ZERO
        );
    }
}
