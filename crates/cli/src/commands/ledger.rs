//! Ledger, NAV and integrity commands

use anyhow::{bail, Context, Result};
use navfund_core::Origin;
use navfund_persistence::LedgerFilter;
use navfund_workflow::{FundContext, ManualEntry, ManualLine, ReverseEntry};
use serde::Deserialize;
use std::path::Path;

use super::{page, short, Output};

/// Manual entry file; the actor comes from the command line
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryFile {
    description: String,
    #[serde(default)]
    reference_id: Option<String>,
    lines: Vec<ManualLine>,
}

pub struct EntryFilterArgs {
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub account: Option<String>,
    pub user: Option<String>,
}

pub async fn nav(ctx: &FundContext, out: &Output) -> Result<()> {
    let snapshot = ctx.queries().calculate_nav().await?;
    out.emit(&snapshot, || {
        println!("NAV per unit      {}", snapshot.nav);
        println!("Investor equity   {}", snapshot.equity_balance);
        println!("Units outstanding {}", snapshot.units_outstanding);
        if snapshot.is_baseline {
            println!("(baseline NAV: no units outstanding)");
        }
    })
}

pub async fn units(ctx: &FundContext, user_id: &str, out: &Output) -> Result<()> {
    let holding = ctx.queries().investor_units(user_id).await?;
    out.emit(&holding, || {
        println!(
            "{}: {} units x NAV {} = {}",
            holding.user_id, holding.units_balance, holding.nav, holding.value
        )
    })
}

pub async fn balance(
    ctx: &FundContext,
    account: &str,
    user: Option<&str>,
    out: &Output,
) -> Result<()> {
    let balance = ctx.queries().account_balance(account, user).await?;
    out.emit(&balance, || {
        let scope = balance.user_id.as_deref().unwrap_or("all investors");
        println!("{} ({}, {})", account, balance.account_type, scope);
        println!("  debits  {}", balance.total_debits);
        println!("  credits {}", balance.total_credits);
        println!("  balance {}", balance.balance);
    })
}

pub async fn balance_sheet(ctx: &FundContext, out: &Output) -> Result<()> {
    let sheet = ctx.queries().balance_sheet().await?;
    out.emit(&sheet, || {
        println!("Balance sheet as of {}", sheet.as_of.format("%Y-%m-%d %H:%M UTC"));
        for section in &sheet.sections {
            println!("{}", section.account_type);
            for line in &section.accounts {
                println!("  {:<20} {:<24} {:>16}", line.code, line.name, line.balance);
            }
            println!("  {:<45} {:>16}", "total", section.total);
        }
        if sheet.is_balanced() {
            println!("Assets = Equity + Revenue");
        } else {
            println!("WARNING: balance sheet does not balance");
        }
    })
}

pub async fn entries(
    ctx: &FundContext,
    args: EntryFilterArgs,
    offset: i64,
    limit: i64,
    out: &Output,
) -> Result<()> {
    let queries = ctx.queries();
    let account_id = match args.account {
        Some(account) => {
            let accounts = queries.accounts().await?;
            let found = accounts
                .into_iter()
                .find(|a| a.code == account || a.id == account)
                .with_context(|| format!("Unknown account {}", account))?;
            Some(found.id)
        }
        None => None,
    };
    let filter = LedgerFilter {
        reference_type: args.reference_type,
        reference_id: args.reference_id,
        account_id,
        user_id: args.user,
        ..LedgerFilter::default()
    };

    let rows = queries
        .list_ledger_entries(&filter, page(offset, limit))
        .await?;
    out.emit(&rows, || {
        for entry in &rows {
            println!(
                "{} {} {}:{} {}",
                short(&entry.id),
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.reference_type,
                short(&entry.reference_id),
                entry.description
            );
            if let Some(original) = &entry.reversal_of_id {
                println!("    reverses {}", original);
            }
            for line in &entry.lines {
                println!(
                    "    {:<6} {:<10} {:>16} {}",
                    line.side,
                    short(&line.account_id),
                    line.amount,
                    line.user_id.as_deref().unwrap_or("")
                );
            }
        }
        println!("{} entr{}", rows.len(), if rows.len() == 1 { "y" } else { "ies" });
    })
}

pub async fn post_entry(ctx: &FundContext, actor: &str, file: &Path, out: &Output) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let entry_file: EntryFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let cmd = ManualEntry {
        description: entry_file.description,
        reference_id: entry_file.reference_id,
        actor_id: actor.to_string(),
        lines: entry_file.lines,
    };
    let entry = ctx
        .corrections()
        .create_ledger_entry(cmd, &Origin::system())
        .await?;
    out.emit(&entry, || {
        println!("Posted entry {} ({} lines)", entry.id, entry.lines.len())
    })
}

pub async fn reverse(
    ctx: &FundContext,
    actor: &str,
    entry_id: &str,
    reason: &str,
    out: &Output,
) -> Result<()> {
    let entry = ctx
        .corrections()
        .reverse_ledger_entry(
            ReverseEntry {
                entry_id: entry_id.to_string(),
                reason: reason.to_string(),
                actor_id: actor.to_string(),
            },
            &Origin::system(),
        )
        .await?;
    out.emit(&entry, || println!("Entry {} reversed by {}", entry_id, entry.id))
}

pub async fn verify(ctx: &FundContext, out: &Output) -> Result<()> {
    let report = ctx.queries().verify_integrity().await?;
    out.emit(&report, || {
        let ledger = &report.ledger;
        println!(
            "Ledger: {} entries, {} lines, debits {} / credits {}",
            ledger.entries_checked, ledger.lines_checked, ledger.total_debits, ledger.total_credits
        );
        for bad in &ledger.unbalanced_entries {
            println!(
                "  unbalanced entry {}: debits {} credits {}",
                bad.entry_id, bad.total_debits, bad.total_credits
            );
        }
        for drift in &ledger.drifted_accounts {
            println!(
                "  balance drift on {}: stored {}/{} computed {}/{}",
                drift.account_id,
                drift.materialized_debits,
                drift.materialized_credits,
                drift.computed_debits,
                drift.computed_credits
            );
        }
        match &report.audit_chain_error {
            None => println!("Audit chain: {} records intact", report.audit_records),
            Some(err) => println!("Audit chain broken: {}", err),
        }
    })?;

    if !report.is_consistent() {
        bail!("integrity check failed");
    }
    Ok(())
}

pub async fn audit(
    ctx: &FundContext,
    resource: Option<(&str, &str)>,
    out: &Output,
) -> Result<()> {
    let records = ctx.queries().audit_log(resource).await?;
    out.emit(&records, || {
        for record in &records {
            println!(
                "#{:<6} {} {:<12} {:<26} {}:{}",
                record.sequence,
                record.created_at.format("%Y-%m-%d %H:%M:%S"),
                record.actor_id,
                record.action,
                record.resource_type,
                short(&record.resource_id)
            );
        }
    })
}
