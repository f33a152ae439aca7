//! Audit trail rows in Postgres

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::warn;

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::error::Result;
use crate::models::WorkflowState;

pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lexicon.audit_log (action, word, location_ref, snapshot, logged_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.action.as_str())
        .bind(&entry.word)
        .bind(&entry.location_ref)
        .bind(Json(&entry.snapshot))
        .bind(entry.logged_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of rows logged for a word
    pub async fn count_for(&self, word: &str) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM lexicon.audit_log WHERE word = $1")
                .bind(word)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn log(&self, action: AuditAction, state: &WorkflowState) {
        let entry = AuditEntry::capture(action, state);
        if let Err(e) = self.insert(&entry).await {
            warn!(action = action.as_str(), word = %state.word, error = %e, "Failed to write audit row");
        }
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM lexicon.audit_log")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
