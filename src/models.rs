//! Core data model
//!
//! Dictionary references, cached association candidates, determinations and
//! the per-word workflow state.

use std::collections::BTreeSet;
use std::fmt;

use resolver_agentic::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};

/// Identifies one dictionary entry
///
/// Equality and hashing are by value, so two references with the same
/// headword and lexicon are the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LexiconReference {
    /// The exact headword as recorded in the entry's headword field
    pub headword: String,
    /// The lexicon name, as recorded in the entry's parent lexicon field
    pub lexicon_name: String,
}

impl LexiconReference {
    pub fn new(headword: impl Into<String>, lexicon_name: impl Into<String>) -> Self {
        Self {
            headword: headword.into(),
            lexicon_name: lexicon_name.into(),
        }
    }
}

impl fmt::Display for LexiconReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.headword, self.lexicon_name)
    }
}

/// Set of entries associated with one word-form
pub type LexrefSet = BTreeSet<LexiconReference>;

/// A previously observed entry-set for a word-form, or a recorded
/// "no entries apply" decision when `lexrefs` is empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationCandidate {
    pub lexrefs: LexrefSet,
    /// Distinct text locations where this exact candidate was confirmed
    pub evidence_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl AssociationCandidate {
    pub fn confirmed(lexrefs: LexrefSet, location_ref: impl Into<String>) -> Self {
        Self {
            lexrefs,
            evidence_refs: vec![location_ref.into()],
            reasoning: None,
        }
    }

    pub fn empty(location_ref: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            lexrefs: LexrefSet::new(),
            evidence_refs: vec![location_ref.into()],
            reasoning: Some(reasoning.into()),
        }
    }

    pub fn is_empty_decision(&self) -> bool {
        self.lexrefs.is_empty()
    }

    /// Add a location; returns false when it was already recorded
    fn add_evidence(&mut self, location_ref: &str) -> bool {
        if self.evidence_refs.iter().any(|r| r == location_ref) {
            return false;
        }
        self.evidence_refs.push(location_ref.to_string());
        true
    }
}

/// What a cache merge did to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new candidate was appended
    CandidateAdded,
    /// The location was appended to an existing candidate
    EvidenceAdded,
    /// The candidate already carried this location
    Unchanged,
}

/// All candidates recorded for one exact word-form, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordAssociationRecord {
    pub word: String,
    pub candidates: Vec<AssociationCandidate>,
}

impl WordAssociationRecord {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            candidates: Vec::new(),
        }
    }

    /// Candidates newest-first, the order vetting consumes them in
    pub fn newest_first(&self) -> Vec<AssociationCandidate> {
        self.candidates.iter().rev().cloned().collect()
    }

    /// Merge a confirmed entry-set observed at `location_ref`
    pub fn merge_confirmed(
        &mut self,
        lexrefs: &LexrefSet,
        location_ref: &str,
    ) -> Result<MergeOutcome> {
        if lexrefs.is_empty() {
            return Err(ResolverError::EmptyAssociation {
                word: self.word.clone(),
            });
        }
        self.merge_where(location_ref, |c| &c.lexrefs == lexrefs, || {
            AssociationCandidate::confirmed(lexrefs.clone(), location_ref)
        })
    }

    /// Merge a "no entries apply" decision; distinct reasonings stay distinct
    pub fn merge_empty(&mut self, location_ref: &str, reasoning: &str) -> Result<MergeOutcome> {
        self.merge_where(
            location_ref,
            |c| c.lexrefs.is_empty() && c.reasoning.as_deref() == Some(reasoning),
            || AssociationCandidate::empty(location_ref, reasoning),
        )
    }

    fn merge_where(
        &mut self,
        location_ref: &str,
        matches: impl Fn(&AssociationCandidate) -> bool,
        create: impl FnOnce() -> AssociationCandidate,
    ) -> Result<MergeOutcome> {
        if location_ref.trim().is_empty() {
            return Err(ResolverError::MissingLocation {
                word: self.word.clone(),
            });
        }

        let mut found = self
            .candidates
            .iter_mut()
            .enumerate()
            .filter(|(_, c)| matches(c));
        let first = found.next();
        if let Some((second, _)) = found.next() {
            return Err(ResolverError::CacheInvariant {
                word: self.word.clone(),
                message: format!("duplicate candidate at position {}", second),
            });
        }

        match first {
            Some((_, candidate)) => {
                if candidate.add_evidence(location_ref) {
                    Ok(MergeOutcome::EvidenceAdded)
                } else {
                    Ok(MergeOutcome::Unchanged)
                }
            }
            None => {
                self.candidates.push(create());
                Ok(MergeOutcome::CandidateAdded)
            }
        }
    }
}

/// Final decision for one word occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Determination {
    pub word: String,
    pub reasoning: String,
    #[serde(default)]
    pub entries_to_keep: LexrefSet,
    #[serde(default)]
    pub entries_to_remove: LexrefSet,
    #[serde(default)]
    pub entries_to_add: LexrefSet,
}

impl Determination {
    /// A "no entries apply" determination carrying only reasoning
    pub fn empty(word: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            reasoning: reasoning.into(),
            entries_to_keep: LexrefSet::new(),
            entries_to_remove: LexrefSet::new(),
            entries_to_add: LexrefSet::new(),
        }
    }

    /// keep ∪ add
    pub fn selected_association(&self) -> LexrefSet {
        self.entries_to_keep
            .union(&self.entries_to_add)
            .cloned()
            .collect()
    }
}

/// Per-word workflow state, owned by exactly one task
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub word: String,
    pub segment: String,
    pub location_ref: String,
    /// Cached candidates, newest-first
    pub cached_candidates: Vec<AssociationCandidate>,
    pub selected_association: Option<LexrefSet>,
    pub determination: Option<Determination>,
    /// Append-only dialogue with the oracle
    pub conversation: Vec<ChatMessage>,
}

impl WorkflowState {
    pub fn new(
        word: impl Into<String>,
        segment: impl Into<String>,
        location_ref: impl Into<String>,
        cached_candidates: Vec<AssociationCandidate>,
    ) -> Self {
        Self {
            word: word.into(),
            segment: segment.into(),
            location_ref: location_ref.into(),
            cached_candidates,
            selected_association: None,
            determination: None,
            conversation: Vec::new(),
        }
    }

    pub fn is_phrase(&self) -> bool {
        self.word.chars().any(char::is_whitespace)
    }

    pub fn is_resolved(&self) -> bool {
        self.selected_association.is_some()
    }

    /// Reasoning recorded for an empty resolution
    pub fn empty_reasoning(&self) -> Option<&str> {
        match &self.selected_association {
            Some(set) if set.is_empty() => self.determination.as_ref().map(|d| d.reasoning.as_str()),
            _ => None,
        }
    }
}
