//! Association store backends
//!
//! Durable storage of one `WordAssociationRecord` per word-form. The cache
//! layer owns merge semantics and per-key ordering; a store only loads and
//! saves whole records.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::WordAssociationRecord;

#[async_trait]
pub trait AssociationStore: Send + Sync {
    async fn load(&self, word: &str) -> Result<Option<WordAssociationRecord>>;

    /// Insert or replace the record for `record.word`
    async fn save(&self, record: &WordAssociationRecord) -> Result<()>;

    /// Drop every record
    async fn clear(&self) -> Result<()>;
}

/// Process-local store, used by tests and by the CLI without a database
#[derive(Debug, Default)]
pub struct MemoryAssociationStore {
    records: RwLock<HashMap<String, WordAssociationRecord>>,
}

impl MemoryAssociationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssociationStore for MemoryAssociationStore {
    async fn load(&self, word: &str) -> Result<Option<WordAssociationRecord>> {
        Ok(self.records.read().await.get(word).cloned())
    }

    async fn save(&self, record: &WordAssociationRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.word.clone(), record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}
