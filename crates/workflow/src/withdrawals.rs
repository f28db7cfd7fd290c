//! Withdrawal workflow
//!
//! PENDING -> APPROVED -> PAID, PENDING -> REJECTED.
//!
//! Creation locks the fee quote, the NAV and the cooldown window. Nothing
//! is reserved in the ledger, so rejection needs no compensating entry.
//!
//! Approval is two-phase:
//! 1. claim the pending row (guarded update) so only one approver pays out
//! 2. call the payout gateway under a timeout
//! 3. on success burn units, post the payout/fee entry and mark APPROVED in
//!    one transaction; on failure release the claim and record the reason

use crate::commands::{ApproveWithdrawal, CreateWithdrawal, MarkWithdrawalPaid, RejectWithdrawal};
use crate::context::FundContext;
use crate::error::{WorkflowError, WorkflowResult};
use crate::gateway::{PayoutReceipt, PayoutRequest};
use crate::investors::require_active_investor;
use navfund_core::{
    round_cash, round_units, AccountType, FeeMode, Origin, Withdrawal, WithdrawalStatus,
    UNIT_SCALE,
};
use navfund_ledger::{post_entry, AccountRegistry, EntryBuilder, Posting};
use navfund_persistence::{begin_write, AuditRepo, NewAuditEntry, Page, WithdrawalRepo};
use navfund_pricing::FeeQuote;
use navfund_units::{burn_units, calculate_nav, get_investor_units, investor_units_balance};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;

/// Reference type of ledger entries posted for withdrawals
pub const WITHDRAWAL_REFERENCE: &str = "WITHDRAWAL";

/// Result of an approval call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalApproval {
    pub withdrawal: Withdrawal,
    /// True when the withdrawal was already approved or paid
    pub already_applied: bool,
}

pub struct WithdrawalWorkflow<'a> {
    ctx: &'a FundContext,
}

impl<'a> WithdrawalWorkflow<'a> {
    pub fn new(ctx: &'a FundContext) -> Self {
        Self { ctx }
    }

    /// Price a withdrawal against current metrics without recording it
    pub async fn quote(
        &self,
        amount: Decimal,
        fee_mode: Option<FeeMode>,
    ) -> WorkflowResult<FeeQuote> {
        let metrics = self.ctx.metrics().snapshot().await?;
        let mode = fee_mode.unwrap_or(self.ctx.config().default_fee_mode);
        Ok(self.ctx.fees().quote(round_cash(amount), &metrics, mode)?)
    }

    /// Record a pending withdrawal with its fee quote locked in
    pub async fn create(
        &self,
        cmd: CreateWithdrawal,
        origin: &Origin,
    ) -> WorkflowResult<Withdrawal> {
        let config = self.ctx.config();
        cmd.validate(config)?;
        let quote = self.quote(cmd.amount, cmd.fee_mode).await?;
        let now = self.ctx.now();

        let mut tx = begin_write(self.ctx.pool()).await?;
        require_active_investor(&mut tx, &cmd.user_id).await?;

        // Other pending requests already spoken for
        let position = get_investor_units(&mut tx, config, &cmd.user_id).await?;
        let committed: Decimal = WithdrawalRepo::pending_for_user(&mut tx, &cmd.user_id)
            .await?
            .iter()
            .map(Withdrawal::gross_debit)
            .sum();
        let available = (position.value - committed).max(Decimal::ZERO);
        if quote.gross_debit > available {
            return Err(WorkflowError::InsufficientFunds {
                user_id: cmd.user_id,
                required: quote.gross_debit,
                available,
            });
        }

        let withdrawal = Withdrawal {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: cmd.user_id,
            amount_requested: quote.amount_requested,
            fee_mode: quote.fee_mode,
            fee_fixed_pct: quote.fee_fixed_pct,
            fee_surge_pct: quote.fee_surge_pct,
            fee_fixed_amount: quote.fee_fixed_amount,
            fee_surge_amount: quote.fee_surge_amount,
            fee_flat_amount: quote.fee_flat_amount,
            fee_total_amount: quote.fee_total_amount,
            amount_payout: quote.amount_payout,
            surge_reasons: quote.surge_reasons,
            surge_snapshot: quote.surge_snapshot,
            nav_at_request: position.nav,
            cooldown_until: now + config.cooldown(),
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
            created_at: now,
        };
        WithdrawalRepo::insert(&mut tx, &withdrawal).await?;

        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(
                &withdrawal.user_id,
                "withdrawal.create",
                "withdrawal",
                &withdrawal.id,
            )
                .metadata(json!({
                    "amount_requested": withdrawal.amount_requested,
                    "fee_mode": withdrawal.fee_mode,
                    "fee_fixed_pct": withdrawal.fee_fixed_pct,
                    "fee_surge_pct": withdrawal.fee_surge_pct,
                    "fee_total_amount": withdrawal.fee_total_amount,
                    "amount_payout": withdrawal.amount_payout,
                    "gross_debit": withdrawal.gross_debit(),
                    "nav_at_request": withdrawal.nav_at_request,
                    "cooldown_until": withdrawal.cooldown_until,
                    "surge_reasons": withdrawal.surge_reasons,
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            user_id = %withdrawal.user_id,
            amount = %withdrawal.amount_requested,
            fee = %withdrawal.fee_total_amount,
            cooldown_until = %withdrawal.cooldown_until,
            "Withdrawal requested"
        );
        Ok(withdrawal)
    }

    pub async fn approve(
        &self,
        cmd: ApproveWithdrawal,
        origin: &Origin,
    ) -> WorkflowResult<WithdrawalApproval> {
        let config = self.ctx.config();
        cmd.validate(config)?;
        let now = self.ctx.now();

        // Phase 1: preconditions and claim
        let claimed = {
            let mut conn = self.ctx.pool().acquire().await?;
            let withdrawal = WithdrawalRepo::get(&mut conn, &cmd.withdrawal_id).await?;
            if let Some(done) = settled(withdrawal.clone())? {
                tracing::debug!(withdrawal_id = %done.withdrawal.id, "Withdrawal already approved");
                return Ok(done);
            }
            if now < withdrawal.cooldown_until {
                return Err(WorkflowError::CooldownActive {
                    id: withdrawal.id,
                    until: withdrawal.cooldown_until,
                });
            }
            self.precheck_units(&mut conn, &withdrawal).await?;

            let stale_before = now - claim_ttl(config.payout_timeout_ms);
            let won = WithdrawalRepo::claim_payout(
                &mut conn,
                &withdrawal.id,
                &cmd.actor_id,
                now,
                stale_before,
            )
            .await?;
            if !won {
                let current = WithdrawalRepo::get(&mut conn, &withdrawal.id).await?;
                if let Some(done) = settled(current)? {
                    return Ok(done);
                }
                tracing::warn!(
                    withdrawal_id = %withdrawal.id,
                    actor_id = %cmd.actor_id,
                    "Payout claim held by another approver"
                );
                return Err(WorkflowError::conflict("withdrawal", &withdrawal.id));
            }
            WithdrawalRepo::get(&mut conn, &withdrawal.id).await?
        };

        // Phase 2: external payout
        let request = PayoutRequest {
            withdrawal_id: claimed.id.clone(),
            user_id: claimed.user_id.clone(),
            amount: claimed.amount_payout,
            attempt: claimed.payout_attempts,
        };
        let outcome =
            tokio::time::timeout(config.payout_timeout(), self.ctx.gateway().execute(&request))
                .await;
        let receipt = match outcome {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                return Err(self
                    .payout_failed(&claimed, &cmd.actor_id, e.to_string(), origin)
                    .await)
            }
            Err(_) => {
                let reason = format!("payout timed out after {}ms", config.payout_timeout_ms);
                return Err(self
                    .payout_failed(&claimed, &cmd.actor_id, reason, origin)
                    .await);
            }
        };

        // Phase 3: record the approval
        match self
            .commit_approval(&claimed, &cmd.actor_id, &receipt, origin)
            .await
        {
            Ok(withdrawal) => Ok(WithdrawalApproval {
                withdrawal,
                already_applied: false,
            }),
            Err(e) => {
                tracing::error!(
                    withdrawal_id = %claimed.id,
                    payout_reference = %receipt.reference,
                    error = %e,
                    "Payout confirmed but approval could not be recorded"
                );
                let reason = format!(
                    "payout {} confirmed but approval failed: {}",
                    receipt.reference, e
                );
                if let Err(release_err) = self
                    .release_claim(&claimed, &cmd.actor_id, &reason, origin)
                    .await
                {
                    tracing::error!(
                        withdrawal_id = %claimed.id,
                        error = %release_err,
                        "Failed to release payout claim"
                    );
                }
                Err(e)
            }
        }
    }

    /// Units the request would burn must still be held; checked before any
    /// money leaves the fund
    async fn precheck_units(
        &self,
        conn: &mut SqliteConnection,
        withdrawal: &Withdrawal,
    ) -> WorkflowResult<()> {
        let nav = calculate_nav(&mut *conn, self.ctx.config())
            .await?
            .unit_price()?;
        let available = investor_units_balance(&mut *conn, &withdrawal.user_id).await?;
        let required = round_units(withdrawal.gross_debit() / nav);
        if required - available > Decimal::new(1, UNIT_SCALE) {
            return Err(WorkflowError::InsufficientUnits {
                user_id: withdrawal.user_id.clone(),
                required,
                available,
            });
        }
        Ok(())
    }

    async fn commit_approval(
        &self,
        withdrawal: &Withdrawal,
        actor_id: &str,
        receipt: &PayoutReceipt,
        origin: &Origin,
    ) -> WorkflowResult<Withdrawal> {
        let config = self.ctx.config();
        let now = self.ctx.now();
        let user = withdrawal.user_id.as_str();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let units_before = investor_units_balance(&mut tx, user).await?;
        let burn = burn_units(
            &mut tx,
            config,
            user,
            withdrawal.gross_debit(),
            actor_id,
            origin,
            now,
        )
        .await?;

        let cash = AccountRegistry::get_or_create(
            &mut tx,
            &config.cash_account,
            "Bank",
            AccountType::Asset,
            now,
        )
        .await?;
        let equity = AccountRegistry::get_or_create(
            &mut tx,
            &config.equity_account,
            "Investor Equity",
            AccountType::Equity,
            now,
        )
        .await?;
        let fee_revenue = AccountRegistry::get_or_create(
            &mut tx,
            &config.fee_account,
            "Fee Revenue",
            AccountType::Revenue,
            now,
        )
        .await?;

        let payout = withdrawal.amount_payout;
        let fee = withdrawal.fee_total_amount;
        let mut entry = EntryBuilder::new(format!("Withdrawal {} approved", withdrawal.id))
            .reference(WITHDRAWAL_REFERENCE, &withdrawal.id)
            .created_by(actor_id)
            .line(
                Posting::debit(&equity.id, payout)
                    .for_user(user)
                    .with_description("Payout"),
            )
            .line(
                Posting::credit(&cash.id, payout)
                    .for_user(user)
                    .with_description("Payout"),
            );
        if fee > Decimal::ZERO {
            entry = entry
                .line(
                    Posting::debit(&equity.id, fee)
                        .for_user(user)
                        .with_description("Withdrawal fee"),
                )
                .line(
                    Posting::credit(&fee_revenue.id, fee)
                        .for_user(user)
                        .with_description("Withdrawal fee"),
                );
        }
        let posted = post_entry(&mut tx, entry.build()?, now).await?;

        let won = WithdrawalRepo::mark_approved(
            &mut tx,
            &withdrawal.id,
            actor_id,
            burn.units,
            burn.nav,
            &posted.id,
            &receipt.reference,
            now,
        )
        .await?;
        if !won {
            tracing::warn!(withdrawal_id = %withdrawal.id, "Withdrawal approval lost its claim");
            return Err(WorkflowError::conflict("withdrawal", &withdrawal.id));
        }

        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(actor_id, "withdrawal.approve", "withdrawal", &withdrawal.id)
                .metadata(json!({
                    "user_id": user,
                    "amount_requested": withdrawal.amount_requested,
                    "fee_total_amount": fee,
                    "amount_payout": payout,
                    "gross_debit": withdrawal.gross_debit(),
                    "units_burned": burn.units,
                    "nav_at_burn": burn.nav,
                    "units": { "before": units_before, "after": units_before - burn.units },
                    "ledger_entry_id": posted.id,
                    "payout_reference": receipt.reference,
                    "status": { "before": "PENDING", "after": "APPROVED" },
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        let approved = WithdrawalRepo::get(&mut tx, &withdrawal.id).await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %approved.id,
            user_id = %user,
            payout = %payout,
            fee = %fee,
            units_burned = %burn.units,
            nav = %burn.nav,
            "Withdrawal approved"
        );
        Ok(approved)
    }

    /// Release the claim after a failed payout and report the failure
    async fn payout_failed(
        &self,
        withdrawal: &Withdrawal,
        actor_id: &str,
        reason: String,
        origin: &Origin,
    ) -> WorkflowError {
        tracing::warn!(
            withdrawal_id = %withdrawal.id,
            gateway = %self.ctx.gateway().name(),
            attempt = withdrawal.payout_attempts,
            reason = %reason,
            "Payout failed"
        );
        match self
            .release_claim(withdrawal, actor_id, &reason, origin)
            .await
        {
            Ok(()) => WorkflowError::PayoutFailure {
                id: withdrawal.id.clone(),
                reason,
            },
            Err(e) => e,
        }
    }

    async fn release_claim(
        &self,
        withdrawal: &Withdrawal,
        actor_id: &str,
        reason: &str,
        origin: &Origin,
    ) -> WorkflowResult<()> {
        let now = self.ctx.now();
        let mut tx = begin_write(self.ctx.pool()).await?;
        let released = WithdrawalRepo::release_claim(&mut tx, &withdrawal.id, actor_id, reason)
            .await?;
        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(actor_id, "withdrawal.payout_failed", "withdrawal", &withdrawal.id)
                .metadata(json!({
                    "reason": reason,
                    "attempt": withdrawal.payout_attempts,
                    "claim_released": released,
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn reject(
        &self,
        cmd: RejectWithdrawal,
        origin: &Origin,
    ) -> WorkflowResult<Withdrawal> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();
        let reason = cmd.reason.trim();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let withdrawal = WithdrawalRepo::get(&mut tx, &cmd.withdrawal_id).await?;
        match withdrawal.status {
            WithdrawalStatus::Pending => {}
            WithdrawalStatus::Rejected => {
                tracing::debug!(withdrawal_id = %withdrawal.id, "Withdrawal already rejected");
                return Ok(withdrawal);
            }
            WithdrawalStatus::Approved | WithdrawalStatus::Paid => {
                return Err(WorkflowError::invalid_state(
                    "withdrawal",
                    &withdrawal.id,
                    withdrawal.status,
                    "reject",
                ));
            }
        }

        let won =
            WithdrawalRepo::mark_rejected(&mut tx, &withdrawal.id, reason, &cmd.actor_id, now)
                .await?;
        if !won {
            tracing::warn!(
                withdrawal_id = %withdrawal.id,
                claimed_by = ?withdrawal.payout_claimed_by,
                "Withdrawal rejection blocked by a payout in progress"
            );
            return Err(WorkflowError::conflict("withdrawal", &withdrawal.id));
        }

        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, "withdrawal.reject", "withdrawal", &withdrawal.id)
                .metadata(json!({
                    "user_id": withdrawal.user_id,
                    "amount_requested": withdrawal.amount_requested,
                    "fee_total_amount": withdrawal.fee_total_amount,
                    "reason": reason,
                    "status": { "before": "PENDING", "after": "REJECTED" },
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        let rejected = WithdrawalRepo::get(&mut tx, &withdrawal.id).await?;
        tx.commit().await?;

        tracing::info!(withdrawal_id = %rejected.id, reason = %reason, "Withdrawal rejected");
        Ok(rejected)
    }

    /// Confirm external settlement: APPROVED -> PAID
    pub async fn mark_paid(
        &self,
        cmd: MarkWithdrawalPaid,
        origin: &Origin,
    ) -> WorkflowResult<Withdrawal> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let withdrawal = WithdrawalRepo::get(&mut tx, &cmd.withdrawal_id).await?;
        match withdrawal.status {
            WithdrawalStatus::Approved => {}
            WithdrawalStatus::Paid => return Ok(withdrawal),
            WithdrawalStatus::Pending | WithdrawalStatus::Rejected => {
                return Err(WorkflowError::invalid_state(
                    "withdrawal",
                    &withdrawal.id,
                    withdrawal.status,
                    "mark paid",
                ));
            }
        }

        let won =
            WithdrawalRepo::mark_paid(&mut tx, &withdrawal.id, cmd.reference.as_deref(), now)
                .await?;
        if !won {
            return Err(WorkflowError::conflict("withdrawal", &withdrawal.id));
        }

        let paid = WithdrawalRepo::get(&mut tx, &withdrawal.id).await?;
        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, "withdrawal.paid", "withdrawal", &withdrawal.id)
                .metadata(json!({
                    "payout_reference": paid.payout_reference,
                    "status": { "before": "APPROVED", "after": "PAID" },
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(withdrawal_id = %paid.id, "Withdrawal paid");
        Ok(paid)
    }

    pub async fn get(&self, withdrawal_id: &str) -> WorkflowResult<Withdrawal> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(WithdrawalRepo::get(&mut conn, withdrawal_id).await?)
    }

    pub async fn list(
        &self,
        status: Option<WithdrawalStatus>,
        user_id: Option<&str>,
        page: Page,
    ) -> WorkflowResult<Vec<Withdrawal>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(WithdrawalRepo::list(&mut conn, status, user_id, page).await?)
    }
}

/// Terminal outcome of an approval attempt, if the row is past PENDING
fn settled(withdrawal: Withdrawal) -> WorkflowResult<Option<WithdrawalApproval>> {
    match withdrawal.status {
        WithdrawalStatus::Pending => Ok(None),
        WithdrawalStatus::Approved | WithdrawalStatus::Paid => Ok(Some(WithdrawalApproval {
            withdrawal,
            already_applied: true,
        })),
        WithdrawalStatus::Rejected => Err(WorkflowError::invalid_state(
            "withdrawal",
            &withdrawal.id,
            withdrawal.status,
            "approve",
        )),
    }
}

const MAX_CLAIM_TIMEOUT_MS: u64 = 86_400_000;

/// A claim older than this belongs to an approver that never finished
fn claim_ttl(payout_timeout_ms: u64) -> chrono::Duration {
    let millis = payout_timeout_ms.min(MAX_CLAIM_TIMEOUT_MS) as i64;
    chrono::Duration::milliseconds(millis * 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_ttl_is_twice_the_timeout() {
        assert_eq!(claim_ttl(5_000), chrono::Duration::seconds(10));
        assert_eq!(claim_ttl(0), chrono::Duration::zero());
        assert_eq!(claim_ttl(u64::MAX), chrono::Duration::days(2));
    }
}
