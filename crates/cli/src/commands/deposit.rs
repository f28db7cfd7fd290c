//! Deposit commands

use anyhow::Result;
use navfund_core::Origin;
use navfund_workflow::{ApproveDeposit, CreateDeposit, FundContext, RejectDeposit};

use super::{page, short, Output};
use crate::DepositAction;

pub async fn handle(
    ctx: &FundContext,
    actor: &str,
    action: DepositAction,
    out: &Output,
) -> Result<()> {
    let origin = Origin::system();
    let deposits = ctx.deposits();

    match action {
        DepositAction::Create {
            user_id,
            amount,
            proof_url,
        } => {
            let deposit = deposits
                .create(
                    CreateDeposit {
                        user_id,
                        amount,
                        proof_url,
                    },
                    &origin,
                )
                .await?;
            out.emit(&deposit, || {
                println!(
                    "Deposit {} recorded: {} for {} (PENDING)",
                    deposit.id, deposit.amount, deposit.user_id
                )
            })
        }
        DepositAction::Approve { deposit_id } => {
            let approval = deposits
                .approve(
                    ApproveDeposit {
                        deposit_id,
                        actor_id: actor.to_string(),
                    },
                    &origin,
                )
                .await?;
            out.emit(&approval, || {
                let issuance = &approval.issuance;
                if issuance.already_applied {
                    println!("Deposit {} was already approved", issuance.deposit_id);
                } else {
                    println!(
                        "Deposit {} approved: {} units at NAV {}",
                        issuance.deposit_id, issuance.units, issuance.nav
                    );
                }
            })
        }
        DepositAction::Reject { deposit_id, reason } => {
            let deposit = deposits
                .reject(
                    RejectDeposit {
                        deposit_id,
                        reason,
                        actor_id: actor.to_string(),
                    },
                    &origin,
                )
                .await?;
            out.emit(&deposit, || println!("Deposit {} rejected", deposit.id))
        }
        DepositAction::List {
            status,
            user,
            offset,
            limit,
        } => {
            let status = status.map(|s| s.to_core_type());
            let rows = deposits
                .list(status, user.as_deref(), page(offset, limit))
                .await?;
            out.emit(&rows, || {
                println!(
                    "{:<10} {:<16} {:>14} {:<9} {:>14} {:>12}",
                    "ID", "USER", "AMOUNT", "STATUS", "UNITS", "NAV"
                );
                for d in &rows {
                    println!(
                        "{:<10} {:<16} {:>14} {:<9} {:>14} {:>12}",
                        short(&d.id),
                        d.user_id,
                        d.amount,
                        d.status,
                        d.units_issued.map(|u| u.to_string()).unwrap_or_default(),
                        d.nav_at_issue.map(|n| n.to_string()).unwrap_or_default()
                    );
                }
            })
        }
    }
}
