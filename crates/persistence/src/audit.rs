//! Append-only audit log with a SHA-256 hash chain
//!
//! Each record hashes its own content together with the previous record's
//! hash, so any edit or deletion breaks the chain from that point on.

use crate::error::PersistenceResult;
use crate::sqlite::schema::AuditRow;
use chrono::{DateTime, SecondsFormat, Utc};
use navfund_core::{AuditLogEntry, Origin};
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;

/// prev_hash of the first record
pub const GENESIS_HASH: &str = "GENESIS";

/// Audit record to be appended
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub metadata: serde_json::Value,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn new(
        actor_id: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            metadata: serde_json::Value::Null,
            origin: Origin::default(),
            created_at: Utc::now(),
        }
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn origin(mut self, origin: &Origin) -> Self {
        self.origin = origin.clone();
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SHA-256 over every field except `hash`
pub fn compute_audit_hash(entry: &AuditLogEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.actor_id.as_bytes());
    hasher.update(entry.action.as_bytes());
    hasher.update(entry.resource_type.as_bytes());
    hasher.update(entry.resource_id.as_bytes());
    hasher.update(entry.metadata.to_string().as_bytes());
    hasher.update(entry.origin.ip.as_deref().unwrap_or("").as_bytes());
    hasher.update(entry.origin.user_agent.as_deref().unwrap_or("").as_bytes());
    hasher.update(timestamp(&entry.created_at).as_bytes());

    hex::encode(hasher.finalize())
}

/// Errors in audit chain verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditChainError {
    BrokenLink {
        sequence: i64,
        expected: String,
        actual: String,
    },
    InvalidHash {
        sequence: i64,
        expected: String,
        actual: String,
    },
    InvalidSequence {
        expected: i64,
        actual: i64,
    },
}

/// Verify hash chain integrity of records ordered by sequence
pub fn verify_audit_chain(entries: &[AuditLogEntry]) -> Result<(), AuditChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();
    let mut expected_sequence = 1;

    for entry in entries {
        if entry.sequence != expected_sequence {
            return Err(AuditChainError::InvalidSequence {
                expected: expected_sequence,
                actual: entry.sequence,
            });
        }

        if entry.prev_hash != prev_hash {
            return Err(AuditChainError::BrokenLink {
                sequence: entry.sequence,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = compute_audit_hash(entry);
        if entry.hash != calculated {
            return Err(AuditChainError::InvalidHash {
                sequence: entry.sequence,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        prev_hash = entry.hash.clone();
        expected_sequence += 1;
    }

    Ok(())
}

/// Repository for the audit log
pub struct AuditRepo;

impl AuditRepo {
    /// Append a record, linking it to the current chain head.
    ///
    /// Call inside the transaction of the mutation being audited.
    pub async fn append(
        conn: &mut SqliteConnection,
        new: NewAuditEntry,
    ) -> PersistenceResult<AuditLogEntry> {
        let head: Option<(i64, String)> =
            sqlx::query_as("SELECT sequence, hash FROM audit_log ORDER BY sequence DESC LIMIT 1")
                .fetch_optional(&mut *conn)
                .await?;

        let (sequence, prev_hash) = match head {
            Some((sequence, hash)) => (sequence + 1, hash),
            None => (1, GENESIS_HASH.to_string()),
        };

        let mut entry = AuditLogEntry {
            sequence,
            actor_id: new.actor_id,
            action: new.action,
            resource_type: new.resource_type,
            resource_id: new.resource_id,
            metadata: new.metadata,
            origin: new.origin,
            created_at: new.created_at,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = compute_audit_hash(&entry);

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                sequence, actor_id, action, resource_type, resource_id, metadata,
                ip, user_agent, created_at, prev_hash, hash
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.sequence)
        .bind(&entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(entry.metadata.to_string())
        .bind(&entry.origin.ip)
        .bind(&entry.origin.user_agent)
        .bind(timestamp(&entry.created_at))
        .bind(&entry.prev_hash)
        .bind(&entry.hash)
        .execute(conn)
        .await?;

        tracing::debug!(
            sequence = entry.sequence,
            action = %entry.action,
            resource = %entry.resource_id,
            "Audit entry appended"
        );

        Ok(entry)
    }

    pub async fn list_for_resource(
        conn: &mut SqliteConnection,
        resource_type: &str,
        resource_id: &str,
    ) -> PersistenceResult<Vec<AuditLogEntry>> {
        sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM audit_log WHERE resource_type = ? AND resource_id = ? ORDER BY sequence",
        )
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(AuditLogEntry::try_from)
        .collect()
    }

    pub async fn list_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<AuditLogEntry>> {
        sqlx::query_as::<_, AuditRow>("SELECT * FROM audit_log ORDER BY sequence")
            .fetch_all(conn)
            .await?
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect()
    }

    /// Load the whole log and verify its chain
    pub async fn verify(
        conn: &mut SqliteConnection,
    ) -> PersistenceResult<Result<usize, AuditChainError>> {
        let entries = Self::list_all(conn).await?;
        Ok(verify_audit_chain(&entries).map(|_| entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::memory_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_links_chain() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = AuditRepo::append(
            &mut conn,
            NewAuditEntry::new("admin", "deposit.approve", "deposit", "dep-1")
                .metadata(json!({ "units": "100.000000" })),
        )
        .await
        .unwrap();
        let second = AuditRepo::append(
            &mut conn,
            NewAuditEntry::new("admin", "deposit.reject", "deposit", "dep-2"),
        )
        .await
        .unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(first.prev_hash, GENESIS_HASH);
        assert_eq!(second.prev_hash, first.hash);

        let verified = AuditRepo::verify(&mut conn).await.unwrap();
        assert_eq!(verified, Ok(2));
    }

    #[tokio::test]
    async fn test_tampering_detected() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        for i in 0..3 {
            AuditRepo::append(
                &mut conn,
                NewAuditEntry::new("admin", "deposit.create", "deposit", format!("dep-{}", i)),
            )
            .await
            .unwrap();
        }

        sqlx::query("UPDATE audit_log SET actor_id = 'mallory' WHERE sequence = 2")
            .execute(&mut *conn)
            .await
            .unwrap();

        let verified = AuditRepo::verify(&mut conn).await.unwrap();
        assert!(matches!(
            verified,
            Err(AuditChainError::InvalidHash { sequence: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_for_resource() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        AuditRepo::append(&mut conn, NewAuditEntry::new("a", "x", "withdrawal", "w-1"))
            .await
            .unwrap();
        AuditRepo::append(&mut conn, NewAuditEntry::new("a", "y", "withdrawal", "w-2"))
            .await
            .unwrap();
        AuditRepo::append(&mut conn, NewAuditEntry::new("a", "z", "withdrawal", "w-1"))
            .await
            .unwrap();

        let entries = AuditRepo::list_for_resource(&mut conn, "withdrawal", "w-1")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, "z");
    }

    #[test]
    fn test_verify_empty_chain() {
        assert_eq!(verify_audit_chain(&[]), Ok(()));
    }
}
