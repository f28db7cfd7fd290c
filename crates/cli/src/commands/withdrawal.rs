//! Withdrawal commands
//!
//! Approvals go through the manual payout gateway: the operator settles the
//! transfer out of band and confirms it with `withdrawal paid`.

use anyhow::Result;
use navfund_core::{FeeMode, Origin};
use navfund_workflow::{
    ApproveWithdrawal, CreateWithdrawal, FundContext, MarkWithdrawalPaid, RejectWithdrawal,
};

use super::{page, short, Output};
use crate::WithdrawalAction;

fn fee_mode(on_top: bool) -> Option<FeeMode> {
    on_top.then_some(FeeMode::OnTop)
}

pub async fn handle(
    ctx: &FundContext,
    actor: &str,
    action: WithdrawalAction,
    out: &Output,
) -> Result<()> {
    let origin = Origin::system();
    let withdrawals = ctx.withdrawals();

    match action {
        WithdrawalAction::Create {
            user_id,
            amount,
            on_top,
        } => {
            let w = withdrawals
                .create(
                    CreateWithdrawal {
                        user_id,
                        amount,
                        fee_mode: fee_mode(on_top),
                    },
                    &origin,
                )
                .await?;
            out.emit(&w, || {
                println!("Withdrawal {} recorded for {}", w.id, w.user_id);
                println!("  requested  {}", w.amount_requested);
                println!("  fee        {} ({})", w.fee_total_amount, w.fee_mode);
                println!("  payout     {}", w.amount_payout);
                println!("  approvable {}", w.cooldown_until.format("%Y-%m-%d %H:%M UTC"));
            })
        }
        WithdrawalAction::Quote { amount, on_top } => {
            let quote = withdrawals.quote(amount, fee_mode(on_top)).await?;
            out.emit(&quote, || {
                println!("requested  {}", quote.amount_requested);
                println!(
                    "fee        {} (fixed {} + surge {} + flat {})",
                    quote.fee_total_amount,
                    quote.fee_fixed_amount,
                    quote.fee_surge_amount,
                    quote.fee_flat_amount
                );
                println!("payout     {}", quote.amount_payout);
                println!("debit      {}", quote.gross_debit);
                for reason in &quote.surge_reasons {
                    println!("  surge: {}", reason);
                }
            })
        }
        WithdrawalAction::Approve { withdrawal_id } => {
            let approval = withdrawals
                .approve(
                    ApproveWithdrawal {
                        withdrawal_id,
                        actor_id: actor.to_string(),
                    },
                    &origin,
                )
                .await?;
            out.emit(&approval, || {
                let w = &approval.withdrawal;
                if approval.already_applied {
                    println!("Withdrawal {} was already {}", w.id, w.status);
                } else {
                    println!(
                        "Withdrawal {} approved: {} units burned at NAV {}, payout ref {}",
                        w.id,
                        w.units_burned.unwrap_or_default(),
                        w.nav_at_burn.unwrap_or_default(),
                        w.payout_reference.as_deref().unwrap_or("-")
                    );
                }
            })
        }
        WithdrawalAction::Reject {
            withdrawal_id,
            reason,
        } => {
            let w = withdrawals
                .reject(
                    RejectWithdrawal {
                        withdrawal_id,
                        reason,
                        actor_id: actor.to_string(),
                    },
                    &origin,
                )
                .await?;
            out.emit(&w, || println!("Withdrawal {} rejected", w.id))
        }
        WithdrawalAction::Paid {
            withdrawal_id,
            reference,
        } => {
            let w = withdrawals
                .mark_paid(
                    MarkWithdrawalPaid {
                        withdrawal_id,
                        actor_id: actor.to_string(),
                        reference,
                    },
                    &origin,
                )
                .await?;
            out.emit(&w, || println!("Withdrawal {} marked paid", w.id))
        }
        WithdrawalAction::List {
            status,
            user,
            offset,
            limit,
        } => {
            let status = status.map(|s| s.to_core_type());
            let rows = withdrawals
                .list(status, user.as_deref(), page(offset, limit))
                .await?;
            out.emit(&rows, || {
                println!(
                    "{:<10} {:<16} {:>14} {:>10} {:>14} {:<9} COOLDOWN",
                    "ID", "USER", "REQUESTED", "FEE", "PAYOUT", "STATUS"
                );
                for w in &rows {
                    println!(
                        "{:<10} {:<16} {:>14} {:>10} {:>14} {:<9} {}",
                        short(&w.id),
                        w.user_id,
                        w.amount_requested,
                        w.fee_total_amount,
                        w.amount_payout,
                        w.status,
                        w.cooldown_until.format("%Y-%m-%d %H:%M")
                    );
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_mode_flag() {
        assert_eq!(fee_mode(true), Some(FeeMode::OnTop));
        assert_eq!(fee_mode(false), None);
    }
}
