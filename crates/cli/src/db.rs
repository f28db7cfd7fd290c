//! Database opening and wiring

use crate::commands::Output;
use crate::config::AppConfig;
use anyhow::{Context, Result};
use navfund_core::Origin;
use navfund_persistence::Database;
use navfund_workflow::FundContext;
use std::path::Path;

/// Open (creating if needed) the database file and run migrations
pub async fn open(db_path: &Path) -> Result<Database> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let url = format!("sqlite:{}", db_path.display());
    Database::open(&url)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// Workflow context with the manual payout gateway and store metrics
pub async fn context(db_path: &Path, config: &AppConfig) -> Result<FundContext> {
    let db = open(db_path).await?;
    Ok(FundContext::new(&db, config.fund.clone(), config.fees.clone()))
}

/// Open the standard chart of accounts
pub async fn init(ctx: &FundContext, actor: &str, out: &Output) -> Result<()> {
    let accounts = ctx
        .corrections()
        .open_standard_accounts(actor, &Origin::system())
        .await?;
    out.emit(&accounts, || {
        println!("Database ready. Accounts:");
        for account in &accounts {
            println!("  {:<20} {:<8} {}", account.code, account.account_type, account.name);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_parent_dir_and_accounts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("navfund.db");

        let ctx = context(&path, &AppConfig::default()).await.unwrap();
        assert!(path.exists());

        init(&ctx, "admin", &Output::new(true)).await.unwrap();
        // Running init twice does not duplicate accounts
        init(&ctx, "admin", &Output::new(true)).await.unwrap();
        let accounts = ctx.queries().accounts().await.unwrap();
        assert_eq!(accounts.len(), 3);
        ctx.pool().close().await;
    }
}
