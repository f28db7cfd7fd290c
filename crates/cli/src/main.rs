//! NavFund CLI - operate the fund from the command line
//!
//! Usage:
//! ```bash
//! navfund init
//! navfund investor add alice "Alice Nguyen"
//! navfund deposit create alice 1000
//! navfund deposit approve <deposit-id>
//! navfund withdrawal create alice 200
//! navfund withdrawal approve <withdrawal-id>
//! navfund nav
//! navfund balance BANK
//! navfund verify
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod db;

use commands::{deposit, investor, ledger, withdrawal, Output};
use config::AppConfig;

/// NavFund - admin console for a unitized investment fund
#[derive(Parser)]
#[command(name = "navfund")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, env = "NAVFUND_DB", default_value = "navfund.db", global = true)]
    pub db: PathBuf,

    /// JSON configuration file with `fund` and `fees` sections
    #[arg(long, env = "NAVFUND_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Operator recorded as the actor of every command
    #[arg(long, env = "NAVFUND_ACTOR", default_value = "admin", global = true)]
    pub actor: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and open the standard accounts
    Init,

    /// Investor registry
    Investor {
        #[command(subcommand)]
        action: InvestorAction,
    },

    /// Deposit requests
    Deposit {
        #[command(subcommand)]
        action: DepositAction,
    },

    /// Withdrawal requests
    Withdrawal {
        #[command(subcommand)]
        action: WithdrawalAction,
    },

    /// Current NAV per unit
    Nav,

    /// Units and value held by an investor
    Units {
        user_id: String,
    },

    /// Balance of an account (code or id)
    Balance {
        account: String,
        /// Restrict to lines attributed to this investor
        #[arg(long)]
        user: Option<String>,
    },

    /// Balances grouped by account type
    BalanceSheet,

    /// List ledger entries
    Entries {
        #[arg(long)]
        reference_type: Option<String>,
        #[arg(long)]
        reference_id: Option<String>,
        /// Account code or id
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Post a manual entry read from a JSON file
    Entry {
        file: PathBuf,
    },

    /// Reverse a posted entry
    Reverse {
        entry_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Verify ledger balances and the audit chain
    Verify,

    /// Show the audit log
    Audit {
        #[arg(long, requires = "resource_id")]
        resource_type: Option<String>,
        #[arg(long, requires = "resource_type")]
        resource_id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum InvestorAction {
    /// Register an investor
    Add {
        user_id: String,
        display_name: String,
    },
    /// Suspend an investor
    Suspend { user_id: String },
    /// Reactivate a suspended investor
    Activate { user_id: String },
    /// List investors
    List,
}

#[derive(Subcommand)]
pub enum DepositAction {
    /// Record a pending deposit
    Create {
        user_id: String,
        amount: Decimal,
        #[arg(long)]
        proof_url: Option<String>,
    },
    /// Approve and issue units
    Approve { deposit_id: String },
    /// Reject with a reason
    Reject {
        deposit_id: String,
        #[arg(long)]
        reason: String,
    },
    /// List deposits
    List {
        #[arg(long)]
        status: Option<DepositStatusArg>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum WithdrawalAction {
    /// Record a pending withdrawal with its fee locked in
    Create {
        user_id: String,
        amount: Decimal,
        /// Charge the fee on top of the requested amount
        #[arg(long)]
        on_top: bool,
    },
    /// Price a withdrawal without recording it
    Quote {
        amount: Decimal,
        #[arg(long)]
        on_top: bool,
    },
    /// Approve: pay out, burn units and post the entry
    Approve { withdrawal_id: String },
    /// Reject with a reason
    Reject {
        withdrawal_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Confirm settlement of an approved withdrawal
    Paid {
        withdrawal_id: String,
        #[arg(long)]
        reference: Option<String>,
    },
    /// List withdrawals
    List {
        #[arg(long)]
        status: Option<WithdrawalStatusArg>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DepositStatusArg {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatusArg {
    pub fn to_core_type(&self) -> navfund_core::DepositStatus {
        match self {
            DepositStatusArg::Pending => navfund_core::DepositStatus::Pending,
            DepositStatusArg::Approved => navfund_core::DepositStatus::Approved,
            DepositStatusArg::Rejected => navfund_core::DepositStatus::Rejected,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum WithdrawalStatusArg {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl WithdrawalStatusArg {
    pub fn to_core_type(&self) -> navfund_core::WithdrawalStatus {
        match self {
            WithdrawalStatusArg::Pending => navfund_core::WithdrawalStatus::Pending,
            WithdrawalStatusArg::Approved => navfund_core::WithdrawalStatus::Approved,
            WithdrawalStatusArg::Paid => navfund_core::WithdrawalStatus::Paid,
            WithdrawalStatusArg::Rejected => navfund_core::WithdrawalStatus::Rejected,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(db = %cli.db.display(), actor = %cli.actor, "navfund starting");
    let app_config = AppConfig::load(cli.config.as_deref())?;
    let ctx = db::context(&cli.db, &app_config).await?;
    let out = Output::new(cli.json);
    let actor = cli.actor.as_str();

    match cli.command {
        Commands::Init => {
            db::init(&ctx, actor, &out).await?;
        }
        Commands::Investor { action } => investor::handle(&ctx, actor, action, &out).await?,
        Commands::Deposit { action } => deposit::handle(&ctx, actor, action, &out).await?,
        Commands::Withdrawal { action } => withdrawal::handle(&ctx, actor, action, &out).await?,
        Commands::Nav => ledger::nav(&ctx, &out).await?,
        Commands::Units { user_id } => ledger::units(&ctx, &user_id, &out).await?,
        Commands::Balance { account, user } => {
            ledger::balance(&ctx, &account, user.as_deref(), &out).await?
        }
        Commands::BalanceSheet => ledger::balance_sheet(&ctx, &out).await?,
        Commands::Entries {
            reference_type,
            reference_id,
            account,
            user,
            offset,
            limit,
        } => {
            let filter = ledger::EntryFilterArgs {
                reference_type,
                reference_id,
                account,
                user,
            };
            ledger::entries(&ctx, filter, offset, limit, &out).await?
        }
        Commands::Entry { file } => ledger::post_entry(&ctx, actor, &file, &out).await?,
        Commands::Reverse { entry_id, reason } => {
            ledger::reverse(&ctx, actor, &entry_id, &reason, &out).await?
        }
        Commands::Verify => ledger::verify(&ctx, &out).await?,
        Commands::Audit {
            resource_type,
            resource_id,
        } => {
            let resource = resource_type.as_deref().zip(resource_id.as_deref());
            ledger::audit(&ctx, resource, &out).await?
        }
    }

    ctx.pool().close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_withdrawal_create() {
        let cli = Cli::try_parse_from([
            "navfund", "--json", "withdrawal", "create", "alice", "200", "--on-top",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Withdrawal {
                action:
                    WithdrawalAction::Create {
                        user_id,
                        amount,
                        on_top,
                    },
            } => {
                assert_eq!(user_id, "alice");
                assert_eq!(amount, Decimal::new(200, 0));
                assert!(on_top);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_audit_filter_requires_both_parts() {
        assert!(Cli::try_parse_from(["navfund", "audit", "--resource-type", "deposit"]).is_err());
    }
}
