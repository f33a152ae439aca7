//! Lexicon collaborators
//!
//! Interfaces to the remote dictionary service: lookup by word form, lookup by
//! reference, and full-text search across dictionary entries. All of them are
//! restricted to the same allow-list of lexicons.
//!
//! ## Architecture
//!
//! ```text
//! CandidateValidator ──► Lexicon::resolve          (stale-reference check)
//! DeterminationAgent ──► Lexicon::lookup_form      (initial context, search_word_forms)
//!                    ├─► DictionarySearch::search  (search_dictionaries)
//!                    └─► Lexicon::resolve          (validating proposed entries)
//! ```

pub mod prune;
pub mod sefaria;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::LexiconReference;

pub use sefaria::SefariaClient;

/// Search-index path → lexicon name for every lexicon the resolver may use
pub const LEXICON_ALLOW_LIST: &[(&str, &str)] = &[
    ("Reference/Dictionary/Jastrow", "Jastrow Dictionary"),
    ("Reference/Dictionary/Klein Dictionary", "Klein Dictionary"),
    ("Reference/Dictionary/BDB", "BDB Dictionary"),
    ("Reference/Dictionary/BDB Aramaic", "BDB Aramaic Dictionary"),
    (
        "Reference/Encyclopedic Works/Kovetz Yesodot VaChakirot",
        "Kovetz Yesodot VaChakirot",
    ),
];

/// Whether entries of this lexicon may be proposed or shown
pub fn is_allowed_lexicon(name: &str) -> bool {
    LEXICON_ALLOW_LIST.iter().any(|(_, n)| *n == name)
}

/// Lexicon name for a search-index path
pub fn lexicon_for_path(path: &str) -> Option<&'static str> {
    LEXICON_ALLOW_LIST
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, n)| *n)
}

/// One dictionary entry as returned by the lexicon service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub headword: String,
    #[serde(rename = "parent_lexicon")]
    pub lexicon_name: String,
    /// Locations this entry is already linked to
    #[serde(default)]
    pub refs: Vec<String>,
    /// Remaining fields (content, senses, morphology, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LexiconEntry {
    pub fn reference(&self) -> LexiconReference {
        LexiconReference::new(&self.headword, &self.lexicon_name)
    }

    /// Descriptive fields only, markup stripped; the form shown to the oracle
    pub fn pruned(&self) -> Value {
        let mut raw = self.fields.clone();
        raw.insert("headword".to_string(), Value::String(self.headword.clone()));
        raw.insert(
            "parent_lexicon".to_string(),
            Value::String(self.lexicon_name.clone()),
        );
        prune::prune_entry(&raw)
    }
}

/// Entries found for one word form at one location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordLookup {
    /// Candidates not yet linked to the location
    pub possible: Vec<LexiconEntry>,
    /// Entries already linked to the location
    pub associated: Vec<LexiconEntry>,
}

/// One full-text search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryHit {
    #[serde(rename = "ref")]
    pub location_ref: String,
    pub headword: String,
    pub lexicon_name: String,
    pub text: String,
}

/// Remote lexicon lookup by form and by reference
#[async_trait]
pub trait Lexicon: Send + Sync {
    /// Entries matching a word form; with a location, split into possible
    /// and already-associated entries
    async fn lookup_form(&self, form: &str, location_ref: Option<&str>) -> Result<WordLookup>;

    /// The entry a reference points at, or `None` when it no longer exists
    async fn resolve(&self, reference: &LexiconReference) -> Result<Option<LexiconEntry>>;
}

/// Full-text search over dictionary entry text
#[async_trait]
pub trait DictionarySearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<DictionaryHit>>;
}
