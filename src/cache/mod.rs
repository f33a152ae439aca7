//! Association cache
//!
//! Accumulates word-form → entry-set evidence across segments. Every record
//! operation is a read-modify-write of one word's record, serialized per
//! word-form; different word-forms never wait on each other.
//!
//! ## Merge semantics
//!
//! - `record_confirmed`: match on set equality of `lexrefs`
//! - `record_empty`: match on empty `lexrefs` AND equal reasoning
//! - a match gains the location as evidence (once); no match appends a new
//!   candidate

pub mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ResolverError, Result};
use crate::models::{AssociationCandidate, LexrefSet, MergeOutcome, WordAssociationRecord};

pub use store::{AssociationStore, MemoryAssociationStore};

/// Key-partitioned cache of word-form associations
pub struct AssociationCache {
    store: Arc<dyn AssociationStore>,
    /// One async lock per word-form with a write in flight
    key_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssociationCache {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self {
            store,
            key_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Cache backed by a process-local store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryAssociationStore::new()))
    }

    /// Candidates for a word-form, most recent first; empty when unknown
    pub async fn lookup(&self, word: &str) -> Result<Vec<AssociationCandidate>> {
        Ok(self
            .store
            .load(word)
            .await?
            .map(|record| record.newest_first())
            .unwrap_or_default())
    }

    /// Record that `lexrefs` was confirmed for `word` at `location_ref`
    pub async fn record_confirmed(
        &self,
        word: &str,
        lexrefs: &LexrefSet,
        location_ref: &str,
    ) -> Result<MergeOutcome> {
        if lexrefs.is_empty() {
            return Err(ResolverError::EmptyAssociation {
                word: word.to_string(),
            });
        }
        self.merge(word, |record| record.merge_confirmed(lexrefs, location_ref))
            .await
    }

    /// Record that no entry applies to `word` at `location_ref`, for `reasoning`
    pub async fn record_empty(
        &self,
        word: &str,
        location_ref: &str,
        reasoning: &str,
    ) -> Result<MergeOutcome> {
        self.merge(word, |record| record.merge_empty(location_ref, reasoning))
            .await
    }

    /// Drop every record (administrative reset)
    pub async fn clear(&self) -> Result<()> {
        warn!("Clearing association cache");
        self.store.clear().await
    }

    async fn merge<F>(&self, word: &str, apply: F) -> Result<MergeOutcome>
    where
        F: FnOnce(&mut WordAssociationRecord) -> Result<MergeOutcome> + Send,
    {
        let lease = self.lease(word);
        let _guard = lease.mutex().lock().await;
        let mut record = self
            .store
            .load(word)
            .await?
            .unwrap_or_else(|| WordAssociationRecord::new(word));
        let outcome = apply(&mut record)?;
        if outcome != MergeOutcome::Unchanged {
            self.store.save(&record).await?;
        }
        debug!(word = %word, ?outcome, candidates = record.candidates.len(), "Merged association");
        Ok(outcome)
    }

    fn lease<'a>(&'a self, word: &'a str) -> KeyLease<'a> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks
            .entry(word.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyLease {
            cache: self,
            word,
            lock,
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.key_locks.lock().unwrap().len()
    }
}

/// Holds a word's lock entry; dropping it releases the entry, including when
/// the merge future is cancelled mid-await
struct KeyLease<'a> {
    cache: &'a AssociationCache,
    word: &'a str,
    lock: Arc<Mutex<()>>,
}

impl KeyLease<'_> {
    fn mutex(&self) -> &Mutex<()> {
        &self.lock
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.cache.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        // held only by the map and this lease
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(self.word);
        }
    }
}
