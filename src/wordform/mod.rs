//! Persistent word-form store
//!
//! The annotation database the resolver writes its decisions into. One
//! `WordFormRecord` per (form, exact lookup set), listing every location the
//! form was resolved to that set. Recording is idempotent per
//! (form, location).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{LexiconReference, LexrefSet};

/// Hebrew points and cantillation marks (U+0591..=U+05C7), excluding the
/// punctuation maqaf, paseq and sof pasuq
fn is_niqqud(c: char) -> bool {
    matches!(c, '\u{0591}'..='\u{05C7}') && !matches!(c, '\u{05BE}' | '\u{05C0}' | '\u{05C3}' | '\u{05C6}')
}

/// Consonantal skeleton of a word form
pub fn consonantal_form(form: &str) -> String {
    form.chars().filter(|c| !is_niqqud(*c)).collect()
}

/// One stored word form with its dictionary lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFormRecord {
    pub form: String,
    pub lookups: Vec<LexiconReference>,
    pub refs: Vec<String>,
    pub consonantal_form: String,
    /// Why no entry applies; set only when `lookups` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl WordFormRecord {
    pub fn new(form: &str, lookups: &LexrefSet, reasoning: Option<&str>, location_ref: &str) -> Self {
        Self {
            form: form.to_string(),
            lookups: lookups.iter().cloned().collect(),
            refs: vec![location_ref.to_string()],
            consonantal_form: consonantal_form(form),
            reasoning: reasoning.map(str::to_string),
            updated_at: Utc::now(),
        }
    }

    /// Same form and exactly the same lookup set (and reasoning)
    pub fn matches(&self, lookups: &LexrefSet, reasoning: Option<&str>) -> bool {
        let own: LexrefSet = self.lookups.iter().cloned().collect();
        own.len() == self.lookups.len() && &own == lookups && self.reasoning.as_deref() == reasoning
    }

    /// Returns false if the location was already present
    pub fn add_ref(&mut self, location_ref: &str) -> bool {
        if self.refs.iter().any(|r| r == location_ref) {
            return false;
        }
        self.refs.push(location_ref.to_string());
        self.updated_at = Utc::now();
        true
    }
}

#[async_trait]
pub trait WordFormStore: Send + Sync {
    async fn record_determination(
        &self,
        word: &str,
        entries: &LexrefSet,
        location_ref: &str,
    ) -> Result<()>;

    async fn record_empty_determination(
        &self,
        word: &str,
        reasoning: &str,
        location_ref: &str,
    ) -> Result<()>;

    /// Drop every record (administrative reset)
    async fn clear(&self) -> Result<()>;
}

/// Process-local word-form store
#[derive(Debug, Default)]
pub struct MemoryWordFormStore {
    records: RwLock<HashMap<String, Vec<WordFormRecord>>>,
}

impl MemoryWordFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records stored for a form
    pub async fn records_for(&self, form: &str) -> Vec<WordFormRecord> {
        self.records
            .read()
            .await
            .get(form)
            .cloned()
            .unwrap_or_default()
    }

    async fn upsert(&self, form: &str, lookups: &LexrefSet, reasoning: Option<&str>, location_ref: &str) {
        let mut records = self.records.write().await;
        let forms = records.entry(form.to_string()).or_default();
        match forms.iter_mut().find(|r| r.matches(lookups, reasoning)) {
            Some(existing) => {
                existing.add_ref(location_ref);
            }
            None => forms.push(WordFormRecord::new(form, lookups, reasoning, location_ref)),
        }
    }
}

#[async_trait]
impl WordFormStore for MemoryWordFormStore {
    async fn record_determination(
        &self,
        word: &str,
        entries: &LexrefSet,
        location_ref: &str,
    ) -> Result<()> {
        self.upsert(word, entries, None, location_ref).await;
        Ok(())
    }

    async fn record_empty_determination(
        &self,
        word: &str,
        reasoning: &str,
        location_ref: &str,
    ) -> Result<()> {
        self.upsert(word, &LexrefSet::new(), Some(reasoning), location_ref)
            .await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consonantal_form_strips_points() {
        assert_eq!(consonantal_form("שָׁלוֹם"), "שלום");
        assert_eq!(consonantal_form("בֵּית־דִּין"), "בית־דין");
        assert_eq!(consonantal_form("peace"), "peace");
    }

    #[tokio::test]
    async fn test_record_determination_is_idempotent() {
        let store = MemoryWordFormStore::new();
        let entries: LexrefSet = [LexiconReference::new("שלום", "Klein Dictionary")]
            .into_iter()
            .collect();
        store.record_determination("שָׁלוֹם", &entries, "r1").await.unwrap();
        store.record_determination("שָׁלוֹם", &entries, "r1").await.unwrap();
        store.record_determination("שָׁלוֹם", &entries, "r2").await.unwrap();

        let records = store.records_for("שָׁלוֹם").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].refs, vec!["r1", "r2"]);
        assert_eq!(records[0].consonantal_form, "שלום");
    }

    #[tokio::test]
    async fn test_different_lookup_sets_are_separate_records() {
        let store = MemoryWordFormStore::new();
        let a: LexrefSet = [LexiconReference::new("a", "L")].into_iter().collect();
        let ab: LexrefSet = [LexiconReference::new("a", "L"), LexiconReference::new("b", "L")]
            .into_iter()
            .collect();
        store.record_determination("w", &a, "r1").await.unwrap();
        store.record_determination("w", &ab, "r2").await.unwrap();
        store.record_empty_determination("w", "idiom", "r3").await.unwrap();
        assert_eq!(store.records_for("w").await.len(), 3);
    }
}
