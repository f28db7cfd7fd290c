//! Chart of accounts

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use navfund_core::{Account, AccountType};
use navfund_persistence::AccountRepo;
use sqlx::SqliteConnection;

/// Get-or-create access to the chart of accounts
pub struct AccountRegistry;

impl AccountRegistry {
    /// Return the account with `code`, creating it when missing.
    ///
    /// An existing code registered under a different type is a
    /// configuration error, never silently reused.
    pub async fn get_or_create(
        conn: &mut SqliteConnection,
        code: &str,
        name: &str,
        account_type: AccountType,
        at: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        if let Some(existing) = AccountRepo::find_by_code(&mut *conn, code).await? {
            return Self::check_type(existing, account_type);
        }

        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            created_at: at,
        };

        match AccountRepo::insert(&mut *conn, &account).await {
            Ok(()) => {
                tracing::info!(code = %code, account_type = %account_type, "Account created");
                Ok(account)
            }
            // Lost a creation race: the winner's row is the account
            Err(e) if e.is_unique_violation() => {
                let existing = AccountRepo::find_by_code(&mut *conn, code)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))?;
                Self::check_type(existing, account_type)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(conn: &mut SqliteConnection, account_id: &str) -> LedgerResult<Account> {
        AccountRepo::get_by_id(conn, account_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => LedgerError::AccountNotFound(account_id.to_string()),
                e => e.into(),
            })
    }

    pub async fn find_by_code(
        conn: &mut SqliteConnection,
        code: &str,
    ) -> LedgerResult<Option<Account>> {
        Ok(AccountRepo::find_by_code(conn, code).await?)
    }

    pub async fn list(conn: &mut SqliteConnection) -> LedgerResult<Vec<Account>> {
        Ok(AccountRepo::get_all(conn).await?)
    }

    fn check_type(existing: Account, requested: AccountType) -> LedgerResult<Account> {
        if existing.account_type != requested {
            return Err(LedgerError::AccountTypeConflict {
                code: existing.code,
                existing: existing.account_type,
                requested,
            });
        }
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navfund_persistence::memory_pool;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let now = Utc::now();
        let first =
            AccountRegistry::get_or_create(&mut conn, "BANK", "Bank", AccountType::Asset, now)
                .await
                .unwrap();
        let second = AccountRegistry::get_or_create(
            &mut conn,
            "BANK",
            "Bank (again)",
            AccountType::Asset,
            now,
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Bank");
        assert_eq!(AccountRegistry::list(&mut conn).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_type_rejected() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let now = Utc::now();
        AccountRegistry::get_or_create(&mut conn, "FEE_REVENUE", "Fees", AccountType::Revenue, now)
            .await
            .unwrap();
        let result = AccountRegistry::get_or_create(
            &mut conn,
            "FEE_REVENUE",
            "Fees",
            AccountType::Equity,
            now,
        )
        .await;

        assert!(matches!(
            result,
            Err(LedgerError::AccountTypeConflict {
                existing: AccountType::Revenue,
                requested: AccountType::Equity,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_get_unknown_account() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let result = AccountRegistry::get(&mut conn, "missing").await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(id)) if id == "missing"));
    }
}
