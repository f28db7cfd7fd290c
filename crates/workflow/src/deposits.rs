//! Deposit workflow
//!
//! PENDING -> APPROVED (issues units, posts cash to equity)
//! PENDING -> REJECTED (no monetary effect)
//!
//! Both transitions are idempotent: repeating the action already applied
//! returns the current record untouched.

use crate::commands::{ApproveDeposit, CreateDeposit, RejectDeposit};
use crate::context::FundContext;
use crate::error::{WorkflowError, WorkflowResult};
use crate::investors::require_active_investor;
use navfund_core::{round_cash, Deposit, DepositStatus, Origin};
use navfund_persistence::{begin_write, AuditRepo, DepositRepo, NewAuditEntry, Page};
use navfund_units::{issue_units, Issuance};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Result of an approval call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositApproval {
    pub deposit: Deposit,
    pub issuance: Issuance,
}

pub struct DepositWorkflow<'a> {
    ctx: &'a FundContext,
}

impl<'a> DepositWorkflow<'a> {
    pub fn new(ctx: &'a FundContext) -> Self {
        Self { ctx }
    }

    /// Record a pending deposit for an active investor
    pub async fn create(&self, cmd: CreateDeposit, origin: &Origin) -> WorkflowResult<Deposit> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();

        let mut tx = begin_write(self.ctx.pool()).await?;
        require_active_investor(&mut tx, &cmd.user_id).await?;

        let deposit = Deposit {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: cmd.user_id,
            amount: round_cash(cmd.amount),
            status: DepositStatus::Pending,
            proof_url: cmd.proof_url,
            units_issued: None,
            nav_at_issue: None,
            ledger_entry_id: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            rejected_by: None,
            rejected_at: None,
            created_at: now,
        };
        DepositRepo::insert(&mut tx, &deposit).await?;
        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&deposit.user_id, "deposit.create", "deposit", &deposit.id)
                .metadata(json!({
                    "amount": deposit.amount,
                    "proof_url": deposit.proof_url,
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            deposit_id = %deposit.id,
            user_id = %deposit.user_id,
            amount = %deposit.amount,
            "Deposit requested"
        );
        Ok(deposit)
    }

    /// Approve and issue units at the current NAV, in one transaction
    pub async fn approve(
        &self,
        cmd: ApproveDeposit,
        origin: &Origin,
    ) -> WorkflowResult<DepositApproval> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let issuance = issue_units(
            &mut tx,
            self.ctx.config(),
            &cmd.deposit_id,
            &cmd.actor_id,
            origin,
            now,
        )
        .await?;
        let deposit = DepositRepo::get(&mut tx, &cmd.deposit_id).await?;
        tx.commit().await?;

        Ok(DepositApproval { deposit, issuance })
    }

    pub async fn reject(&self, cmd: RejectDeposit, origin: &Origin) -> WorkflowResult<Deposit> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();
        let reason = cmd.reason.trim();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let deposit = DepositRepo::get(&mut tx, &cmd.deposit_id).await?;
        match deposit.status {
            DepositStatus::Pending => {}
            DepositStatus::Rejected => {
                tracing::debug!(deposit_id = %deposit.id, "Deposit already rejected");
                return Ok(deposit);
            }
            DepositStatus::Approved => {
                return Err(WorkflowError::invalid_state(
                    "deposit",
                    &deposit.id,
                    deposit.status,
                    "reject",
                ));
            }
        }

        let won = DepositRepo::mark_rejected(&mut tx, &deposit.id, reason, &cmd.actor_id, now)
            .await?;
        if !won {
            tracing::warn!(deposit_id = %deposit.id, "Deposit rejection lost a concurrent update");
            return Err(WorkflowError::conflict("deposit", &deposit.id));
        }

        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, "deposit.reject", "deposit", &deposit.id)
                .metadata(json!({
                    "user_id": deposit.user_id,
                    "amount": deposit.amount,
                    "reason": reason,
                    "status": { "before": "PENDING", "after": "REJECTED" },
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        let rejected = DepositRepo::get(&mut tx, &deposit.id).await?;
        tx.commit().await?;

        tracing::info!(deposit_id = %rejected.id, reason = %reason, "Deposit rejected");
        Ok(rejected)
    }

    pub async fn get(&self, deposit_id: &str) -> WorkflowResult<Deposit> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(DepositRepo::get(&mut conn, deposit_id).await?)
    }

    pub async fn list(
        &self,
        status: Option<DepositStatus>,
        user_id: Option<&str>,
        page: Page,
    ) -> WorkflowResult<Vec<Deposit>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(DepositRepo::list(&mut conn, status, user_id, page).await?)
    }
}
