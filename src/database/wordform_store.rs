//! Word-form records in Postgres
//!
//! One row per (form, lookup set, reasoning); the unique index makes each
//! record call a single idempotent upsert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{LexiconReference, LexrefSet};
use crate::wordform::{consonantal_form, WordFormRecord, WordFormStore};

pub struct PgWordFormStore {
    pool: PgPool,
}

type WordFormRow = (
    String,
    Json<Vec<LexiconReference>>,
    Vec<String>,
    String,
    Option<String>,
    DateTime<Utc>,
);

impl PgWordFormStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn records_for(&self, form: &str) -> Result<Vec<WordFormRecord>> {
        let rows = sqlx::query_as::<_, WordFormRow>(
            r#"
            SELECT form, lookups, refs, consonantal_form, reasoning, updated_at
            FROM lexicon.word_forms
            WHERE form = $1
            ORDER BY id
            "#,
        )
        .bind(form)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(form, Json(lookups), refs, consonantal_form, reasoning, updated_at)| WordFormRecord {
                    form,
                    lookups,
                    refs,
                    consonantal_form,
                    reasoning,
                    updated_at,
                },
            )
            .collect())
    }

    async fn upsert(
        &self,
        form: &str,
        lookups: &LexrefSet,
        reasoning: Option<&str>,
        location_ref: &str,
    ) -> Result<()> {
        // BTreeSet order keeps the JSONB array canonical for the unique index
        let lookups: Vec<&LexiconReference> = lookups.iter().collect();
        sqlx::query(
            r#"
            INSERT INTO lexicon.word_forms (form, consonantal_form, lookups, reasoning, refs)
            VALUES ($1, $2, $3, $4, ARRAY[$5::text])
            ON CONFLICT (form, lookups, (COALESCE(reasoning, ''))) DO UPDATE
            SET refs = CASE
                    WHEN $5::text = ANY(word_forms.refs) THEN word_forms.refs
                    ELSE array_append(word_forms.refs, $5::text)
                END,
                updated_at = CASE
                    WHEN $5::text = ANY(word_forms.refs) THEN word_forms.updated_at
                    ELSE now()
                END
            "#,
        )
        .bind(form)
        .bind(consonantal_form(form))
        .bind(Json(lookups))
        .bind(reasoning)
        .bind(location_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl WordFormStore for PgWordFormStore {
    async fn record_determination(
        &self,
        word: &str,
        entries: &LexrefSet,
        location_ref: &str,
    ) -> Result<()> {
        self.upsert(word, entries, None, location_ref).await
    }

    async fn record_empty_determination(
        &self,
        word: &str,
        reasoning: &str,
        location_ref: &str,
    ) -> Result<()> {
        self.upsert(word, &LexrefSet::new(), Some(reasoning), location_ref)
            .await
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM lexicon.word_forms")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
