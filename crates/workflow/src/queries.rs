//! Read-only queries for reporting collaborators
//!
//! Multi-read queries run inside a read transaction so they see a single
//! committed snapshot.

use crate::context::FundContext;
use crate::error::{WorkflowError, WorkflowResult};
use navfund_core::{Account, AuditLogEntry};
use navfund_ledger::{
    account_balance, balance_sheet, list_entries, verify_integrity, AccountBalance,
    AccountRegistry, BalanceSheet, IntegrityReport, LedgerEntry,
};
use navfund_persistence::{AuditRepo, InvestorRepo, LedgerFilter, Page};
use navfund_units::{calculate_nav, get_investor_units, InvestorUnits, NavSnapshot};
use serde::{Deserialize, Serialize};

/// Ledger consistency plus audit chain verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundIntegrityReport {
    pub ledger: IntegrityReport,
    pub audit_records: usize,
    /// First break in the audit hash chain, if any
    pub audit_chain_error: Option<String>,
}

impl FundIntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.ledger.is_consistent() && self.audit_chain_error.is_none()
    }
}

pub struct FundQueries<'a> {
    ctx: &'a FundContext,
}

impl<'a> FundQueries<'a> {
    pub fn new(ctx: &'a FundContext) -> Self {
        Self { ctx }
    }

    /// Balance of an account given by code or id, optionally for one investor
    pub async fn account_balance(
        &self,
        account: &str,
        user_id: Option<&str>,
    ) -> WorkflowResult<AccountBalance> {
        let mut conn = self.ctx.pool().acquire().await?;
        let account_id = match AccountRegistry::find_by_code(&mut conn, account).await? {
            Some(found) => found.id,
            None => account.to_string(),
        };
        Ok(account_balance(&mut conn, &account_id, user_id).await?)
    }

    pub async fn investor_units(&self, user_id: &str) -> WorkflowResult<InvestorUnits> {
        let mut tx = self.ctx.pool().begin().await?;
        if InvestorRepo::find(&mut tx, user_id).await?.is_none() {
            return Err(WorkflowError::not_found("Investor", user_id));
        }
        let units = get_investor_units(&mut tx, self.ctx.config(), user_id).await?;
        tx.commit().await?;
        Ok(units)
    }

    pub async fn calculate_nav(&self) -> WorkflowResult<NavSnapshot> {
        let mut tx = self.ctx.pool().begin().await?;
        let snapshot = calculate_nav(&mut tx, self.ctx.config()).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    pub async fn verify_integrity(&self) -> WorkflowResult<FundIntegrityReport> {
        let mut tx = self.ctx.pool().begin().await?;
        let ledger = verify_integrity(&mut tx).await?;
        let audit = AuditRepo::verify(&mut tx).await?;
        tx.commit().await?;

        let (audit_records, audit_chain_error) = match audit {
            Ok(count) => (count, None),
            Err(broken) => {
                tracing::error!(error = ?broken, "Audit chain verification failed");
                (0, Some(format!("{:?}", broken)))
            }
        };
        Ok(FundIntegrityReport {
            ledger,
            audit_records,
            audit_chain_error,
        })
    }

    pub async fn list_ledger_entries(
        &self,
        filter: &LedgerFilter,
        page: Page,
    ) -> WorkflowResult<Vec<LedgerEntry>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(list_entries(&mut conn, filter, page).await?)
    }

    /// Balances grouped by account type
    pub async fn balance_sheet(&self) -> WorkflowResult<BalanceSheet> {
        let mut tx = self.ctx.pool().begin().await?;
        let sheet = balance_sheet(&mut tx, self.ctx.now()).await?;
        tx.commit().await?;
        Ok(sheet)
    }

    pub async fn accounts(&self) -> WorkflowResult<Vec<Account>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(AccountRegistry::list(&mut conn).await?)
    }

    /// Audit records for one resource, or the whole log
    pub async fn audit_log(
        &self,
        resource: Option<(&str, &str)>,
    ) -> WorkflowResult<Vec<AuditLogEntry>> {
        let mut conn = self.ctx.pool().acquire().await?;
        let entries = match resource {
            Some((resource_type, resource_id)) => {
                AuditRepo::list_for_resource(&mut conn, resource_type, resource_id).await?
            }
            None => AuditRepo::list_all(&mut conn).await?,
        };
        Ok(entries)
    }
}
