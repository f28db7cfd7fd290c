//! Manual ledger corrections
//!
//! Corrections are additive: a manual entry or a reversal of an existing
//! entry. Nothing already committed is edited.

use crate::commands::{ManualEntry, ReverseEntry};
use crate::context::FundContext;
use crate::error::{WorkflowError, WorkflowResult};
use navfund_core::{Account, AccountType, Origin, Side};
use navfund_ledger::{
    post_entry, reverse_entry, AccountRegistry, EntryBuilder, LedgerEntry, Posting,
};
use navfund_persistence::{begin_write, AuditRepo, NewAuditEntry};
use serde_json::json;

/// Reference type of operator-entered entries
pub const MANUAL_REFERENCE: &str = "MANUAL";

pub struct CorrectionService<'a> {
    ctx: &'a FundContext,
}

impl<'a> CorrectionService<'a> {
    pub fn new(ctx: &'a FundContext) -> Self {
        Self { ctx }
    }

    /// Get or create an account by code. Creation is audited.
    pub async fn open_account(
        &self,
        code: &str,
        name: &str,
        account_type: AccountType,
        actor_id: &str,
        origin: &Origin,
    ) -> WorkflowResult<Account> {
        if code.trim().is_empty() || name.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "account code and name cannot be empty".to_string(),
            ));
        }
        let now = self.ctx.now();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let existed = AccountRegistry::find_by_code(&mut tx, code).await?.is_some();
        let account = AccountRegistry::get_or_create(&mut tx, code, name, account_type, now).await?;
        if !existed {
            AuditRepo::append(
                &mut tx,
                NewAuditEntry::new(actor_id, "account.open", "account", &account.id)
                    .metadata(json!({
                        "code": account.code,
                        "name": account.name,
                        "account_type": account.account_type,
                    }))
                    .origin(origin)
                    .at(now),
            )
            .await?;
        }
        tx.commit().await?;
        Ok(account)
    }

    /// Open the bank, investor equity and fee revenue accounts
    pub async fn open_standard_accounts(
        &self,
        actor_id: &str,
        origin: &Origin,
    ) -> WorkflowResult<Vec<Account>> {
        let config = self.ctx.config();
        let chart = [
            (config.cash_account.as_str(), "Bank", AccountType::Asset),
            (config.equity_account.as_str(), "Investor Equity", AccountType::Equity),
            (config.fee_account.as_str(), "Fee Revenue", AccountType::Revenue),
        ];

        let mut accounts = Vec::with_capacity(chart.len());
        for (code, name, account_type) in chart {
            accounts.push(
                self.open_account(code, name, account_type, actor_id, origin)
                    .await?,
            );
        }
        Ok(accounts)
    }

    /// Post an operator entry. Accounts must already exist.
    pub async fn create_ledger_entry(
        &self,
        cmd: ManualEntry,
        origin: &Origin,
    ) -> WorkflowResult<LedgerEntry> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();
        let reference_id = cmd
            .reference_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut tx = begin_write(self.ctx.pool()).await?;
        let mut builder = EntryBuilder::new(cmd.description.trim())
            .reference(MANUAL_REFERENCE, &reference_id)
            .created_by(&cmd.actor_id);
        for line in &cmd.lines {
            let account = AccountRegistry::find_by_code(&mut tx, &line.account_code)
                .await?
                .ok_or_else(|| WorkflowError::not_found("Account", &line.account_code))?;
            let mut posting = match line.side {
                Side::Debit => Posting::debit(&account.id, line.amount),
                Side::Credit => Posting::credit(&account.id, line.amount),
            };
            if let Some(user) = &line.user_id {
                posting = posting.for_user(user);
            }
            if let Some(description) = &line.description {
                posting = posting.with_description(description);
            }
            builder = builder.line(posting);
        }
        let posted = post_entry(&mut tx, builder.build()?, now).await?;

        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, "ledger.manual_entry", "ledger_entry", &posted.id)
                .metadata(json!({
                    "description": posted.description,
                    "reference_id": reference_id,
                    "total": posted.total_debits(),
                    "lines": cmd.lines,
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            entry_id = %posted.id,
            actor = %cmd.actor_id,
            total = %posted.total_debits(),
            "Manual ledger entry posted"
        );
        Ok(posted)
    }

    /// Post the compensating entry for an existing one
    pub async fn reverse_ledger_entry(
        &self,
        cmd: ReverseEntry,
        origin: &Origin,
    ) -> WorkflowResult<LedgerEntry> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();
        let reason = cmd.reason.trim();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let reversal = reverse_entry(&mut tx, &cmd.entry_id, reason, &cmd.actor_id, now).await?;
        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, "ledger.reverse", "ledger_entry", &cmd.entry_id)
                .metadata(json!({
                    "reversal_id": reversal.id,
                    "reason": reason,
                    "total": reversal.total_debits(),
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;
        Ok(reversal)
    }
}
