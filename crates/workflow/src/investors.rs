//! Investor registry operations

use crate::commands::{RegisterInvestor, SetInvestorActive};
use crate::context::FundContext;
use crate::error::{WorkflowError, WorkflowResult};
use navfund_core::{Investor, Origin};
use navfund_persistence::{begin_write, AuditRepo, InvestorRepo, NewAuditEntry, PersistenceError};
use serde_json::json;
use sqlx::SqliteConnection;

/// Load an investor who may open new requests
pub(crate) async fn require_active_investor(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> WorkflowResult<Investor> {
    let investor = InvestorRepo::find(conn, user_id)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Investor", user_id))?;
    if !investor.active {
        return Err(WorkflowError::Validation(format!(
            "investor {} is suspended",
            user_id
        )));
    }
    Ok(investor)
}

pub struct InvestorService<'a> {
    ctx: &'a FundContext,
}

impl<'a> InvestorService<'a> {
    pub fn new(ctx: &'a FundContext) -> Self {
        Self { ctx }
    }

    pub async fn register(
        &self,
        cmd: RegisterInvestor,
        origin: &Origin,
    ) -> WorkflowResult<Investor> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();

        let investor = Investor {
            user_id: cmd.user_id.trim().to_string(),
            display_name: cmd.display_name.trim().to_string(),
            active: true,
            created_at: now,
        };

        let mut tx = begin_write(self.ctx.pool()).await?;
        InvestorRepo::insert(&mut tx, &investor)
            .await
            .map_err(|e| match e {
                PersistenceError::AlreadyExists { id, .. } => {
                    WorkflowError::Validation(format!("investor {} is already registered", id))
                }
                other => other.into(),
            })?;
        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, "investor.register", "investor", &investor.user_id)
                .metadata(json!({ "display_name": investor.display_name }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(user_id = %investor.user_id, "Investor registered");
        Ok(investor)
    }

    /// Suspend or reactivate. Suspended investors drop out of NAV and cannot
    /// open new requests. Setting the current state again is a no-op.
    pub async fn set_active(
        &self,
        cmd: SetInvestorActive,
        origin: &Origin,
    ) -> WorkflowResult<Investor> {
        cmd.validate(self.ctx.config())?;
        let now = self.ctx.now();

        let mut tx = begin_write(self.ctx.pool()).await?;
        let mut investor = InvestorRepo::find(&mut tx, &cmd.user_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Investor", &cmd.user_id))?;
        if investor.active == cmd.active {
            return Ok(investor);
        }

        InvestorRepo::set_active(&mut tx, &cmd.user_id, cmd.active).await?;
        let action = if cmd.active {
            "investor.activate"
        } else {
            "investor.suspend"
        };
        AuditRepo::append(
            &mut tx,
            NewAuditEntry::new(&cmd.actor_id, action, "investor", &cmd.user_id)
                .metadata(json!({
                    "active": { "before": investor.active, "after": cmd.active },
                }))
                .origin(origin)
                .at(now),
        )
        .await?;
        tx.commit().await?;

        investor.active = cmd.active;
        tracing::info!(
            user_id = %investor.user_id,
            active = investor.active,
            "Investor status changed"
        );
        Ok(investor)
    }

    pub async fn get(&self, user_id: &str) -> WorkflowResult<Investor> {
        let mut conn = self.ctx.pool().acquire().await?;
        InvestorRepo::find(&mut conn, user_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Investor", user_id))
    }

    pub async fn list(&self) -> WorkflowResult<Vec<Investor>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(InvestorRepo::get_all(&mut conn).await?)
    }
}
