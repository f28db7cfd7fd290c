//! Concurrent approvals against a file database
//!
//! Several tasks approve the same records at once through a shared context
//! backed by the multi-connection file pool. Every approval either succeeds,
//! replays as already applied, or fails with a retryable error; each record
//! is applied exactly once.

use chrono::{Duration, TimeZone, Utc};
use navfund_core::{FundConfig, ManualClock, Origin};
use navfund_persistence::{Database, LedgerFilter, Page};
use navfund_pricing::FeeConfig;
use navfund_workflow::{
    ApproveDeposit, ApproveWithdrawal, CreateDeposit, CreateWithdrawal, FundContext,
    RegisterInvestor, WorkflowResult,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

const APPROVERS: usize = 3;

struct FileHarness {
    // Keeps the database file alive for the test
    _dir: TempDir,
    ctx: Arc<FundContext>,
    clock: Arc<ManualClock>,
    origin: Origin,
}

async fn file_harness() -> FileHarness {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("navfund.db").display());
    let db = Database::open(&url).await.unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
    ));
    let ctx = FundContext::new(&db, FundConfig::default(), FeeConfig::flat(dec!(0.0399)))
        .with_clock(clock.clone());

    FileHarness {
        _dir: dir,
        ctx: Arc::new(ctx),
        clock,
        origin: Origin::new("10.0.0.2", "concurrency-test"),
    }
}

impl FileHarness {
    async fn register(&self, user_id: &str) {
        self.ctx
            .investors()
            .register(
                RegisterInvestor {
                    user_id: user_id.to_string(),
                    display_name: user_id.to_uppercase(),
                    actor_id: "admin".to_string(),
                },
                &self.origin,
            )
            .await
            .unwrap();
    }

    async fn entry_count(&self) -> usize {
        self.ctx
            .queries()
            .list_ledger_entries(&LedgerFilter::default(), Page::new(0, 500))
            .await
            .unwrap()
            .len()
    }
}

/// Count the approvals that actually applied; every other outcome must be a
/// replay or a retryable failure
fn count_applied<T>(results: Vec<WorkflowResult<T>>, applied: impl Fn(&T) -> bool) -> usize {
    results
        .into_iter()
        .filter(|result| match result {
            Ok(value) => applied(value),
            Err(e) => {
                assert!(e.is_retryable(), "approval failed with {e:?}");
                false
            }
        })
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deposit_approvals() {
    let h = file_harness().await;
    h.register("alice").await;

    let mut deposit_ids = Vec::new();
    for _ in 0..20 {
        let deposit = h
            .ctx
            .deposits()
            .create(
                CreateDeposit {
                    user_id: "alice".to_string(),
                    amount: dec!(100.00),
                    proof_url: None,
                },
                &h.origin,
            )
            .await
            .unwrap();
        deposit_ids.push(deposit.id);
    }

    let mut handles = Vec::new();
    for id in &deposit_ids {
        for approver in 0..APPROVERS {
            let ctx = h.ctx.clone();
            let origin = h.origin.clone();
            let cmd = ApproveDeposit {
                deposit_id: id.clone(),
                actor_id: format!("admin-{approver}"),
            };
            handles.push(tokio::spawn(async move {
                ctx.deposits().approve(cmd, &origin).await
            }));
        }
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    let applied = count_applied(results, |approval| !approval.issuance.already_applied);
    assert!(applied <= deposit_ids.len());

    // Approvers that lost on a retryable error try again until settled
    for id in &deposit_ids {
        let cmd = ApproveDeposit {
            deposit_id: id.clone(),
            actor_id: "admin-0".to_string(),
        };
        h.ctx.deposits().approve(cmd, &h.origin).await.unwrap();
    }

    assert_eq!(h.entry_count().await, deposit_ids.len());
    let nav = h.ctx.queries().calculate_nav().await.unwrap();
    assert_eq!(nav.units_outstanding, dec!(200));
    assert_eq!(nav.nav, dec!(10));
    assert!(h.ctx.queries().verify_integrity().await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawal_approvals() {
    let h = file_harness().await;
    h.register("alice").await;

    let deposit = h
        .ctx
        .deposits()
        .create(
            CreateDeposit {
                user_id: "alice".to_string(),
                amount: dec!(2000.00),
                proof_url: None,
            },
            &h.origin,
        )
        .await
        .unwrap();
    let cmd = ApproveDeposit {
        deposit_id: deposit.id,
        actor_id: "admin".to_string(),
    };
    h.ctx.deposits().approve(cmd, &h.origin).await.unwrap();

    let mut withdrawal_ids = Vec::new();
    for _ in 0..5 {
        let withdrawal = h
            .ctx
            .withdrawals()
            .create(
                CreateWithdrawal {
                    user_id: "alice".to_string(),
                    amount: dec!(100.00),
                    fee_mode: None,
                },
                &h.origin,
            )
            .await
            .unwrap();
        withdrawal_ids.push(withdrawal.id);
    }
    h.clock.advance(Duration::hours(24));

    let mut handles = Vec::new();
    for id in &withdrawal_ids {
        for approver in 0..APPROVERS {
            let ctx = h.ctx.clone();
            let origin = h.origin.clone();
            let cmd = ApproveWithdrawal {
                withdrawal_id: id.clone(),
                actor_id: format!("admin-{approver}"),
            };
            handles.push(tokio::spawn(async move {
                ctx.withdrawals().approve(cmd, &origin).await
            }));
        }
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    let applied = count_applied(results, |approval| !approval.already_applied);
    assert!(applied <= withdrawal_ids.len());

    for id in &withdrawal_ids {
        let cmd = ApproveWithdrawal {
            withdrawal_id: id.clone(),
            actor_id: "admin-0".to_string(),
        };
        let approval = h.ctx.withdrawals().approve(cmd, &h.origin).await.unwrap();
        assert!(approval.withdrawal.units_burned.is_some());
    }

    // One deposit entry plus exactly one entry per withdrawal
    assert_eq!(h.entry_count().await, 1 + withdrawal_ids.len());
    assert!(h.ctx.queries().verify_integrity().await.unwrap().is_consistent());
}
