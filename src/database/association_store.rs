//! Association records as one JSONB row per word-form

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

use crate::cache::AssociationStore;
use crate::error::Result;
use crate::models::{AssociationCandidate, WordAssociationRecord};

pub struct PgAssociationStore {
    pool: PgPool,
}

impl PgAssociationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssociationStore for PgAssociationStore {
    async fn load(&self, word: &str) -> Result<Option<WordAssociationRecord>> {
        let row = sqlx::query_as::<_, (Json<Vec<AssociationCandidate>>,)>(
            r#"
            SELECT candidates
            FROM lexicon.word_associations
            WHERE word = $1
            "#,
        )
        .bind(word)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(candidates),)| WordAssociationRecord {
            word: word.to_string(),
            candidates,
        }))
    }

    async fn save(&self, record: &WordAssociationRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lexicon.word_associations (word, candidates, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (word) DO UPDATE
            SET candidates = EXCLUDED.candidates,
                updated_at = now()
            "#,
        )
        .bind(&record.word)
        .bind(Json(&record.candidates))
        .execute(&self.pool)
        .await?;

        debug!(word = %record.word, candidates = record.candidates.len(), "Saved association record");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM lexicon.word_associations")
            .execute(&self.pool)
            .await?;
        debug!(rows = result.rows_affected(), "Cleared association records");
        Ok(())
    }
}
