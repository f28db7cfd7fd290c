//! Investor registry commands

use anyhow::Result;
use navfund_core::Origin;
use navfund_workflow::{FundContext, RegisterInvestor, SetInvestorActive};

use super::Output;
use crate::InvestorAction;

pub async fn handle(
    ctx: &FundContext,
    actor: &str,
    action: InvestorAction,
    out: &Output,
) -> Result<()> {
    let origin = Origin::system();
    let investors = ctx.investors();

    match action {
        InvestorAction::Add {
            user_id,
            display_name,
        } => {
            let investor = investors
                .register(
                    RegisterInvestor {
                        user_id,
                        display_name,
                        actor_id: actor.to_string(),
                    },
                    &origin,
                )
                .await?;
            out.emit(&investor, || {
                println!("Registered {} ({})", investor.user_id, investor.display_name)
            })
        }
        InvestorAction::Suspend { user_id } => {
            set_active(ctx, actor, user_id, false, &origin, out).await
        }
        InvestorAction::Activate { user_id } => {
            set_active(ctx, actor, user_id, true, &origin, out).await
        }
        InvestorAction::List => {
            let all = investors.list().await?;
            out.emit(&all, || {
                println!("{:<20} {:<30} {:<9} CREATED", "USER", "NAME", "STATUS");
                for investor in &all {
                    let status = if investor.active { "active" } else { "suspended" };
                    println!(
                        "{:<20} {:<30} {:<9} {}",
                        investor.user_id,
                        investor.display_name,
                        status,
                        investor.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!("{} investor(s)", all.len());
            })
        }
    }
}

async fn set_active(
    ctx: &FundContext,
    actor: &str,
    user_id: String,
    active: bool,
    origin: &Origin,
    out: &Output,
) -> Result<()> {
    let investor = ctx
        .investors()
        .set_active(
            SetInvestorActive {
                user_id,
                active,
                actor_id: actor.to_string(),
            },
            origin,
        )
        .await?;
    out.emit(&investor, || {
        let state = if investor.active { "active" } else { "suspended" };
        println!("Investor {} is now {}", investor.user_id, state);
    })
}
