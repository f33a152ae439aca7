//! Lexicon resolver
//!
//! Decides, for each word or phrase of a passage of classical Hebrew and
//! Aramaic text, which existing dictionary entries define that occurrence, and
//! remembers the decision so later occurrences of the same form are vetted
//! instead of re-researched.
//!
//! ## Architecture
//!
//! ```text
//! ResolutionOrchestrator
//!     ├── Segmenter               (words + phrases)
//!     ├── AssociationCache        (word-form → entry sets, per-key merges)
//!     ├── CandidateValidator      (yes/no vetting of cached sets)
//!     ├── DeterminationAgent      (bounded tool-use state machine)
//!     ├── WordFormStore           (persistent annotations)
//!     └── AuditLog                (per-step workflow snapshots)
//! ```
//!
//! The oracle lives in the `resolver-agentic` crate; the lexicon service is
//! reached through the `Lexicon` and `DictionarySearch` traits.

pub mod audit;
pub mod cache;
pub mod config;
pub mod determination;
pub mod error;
pub mod lexicon;
pub mod models;
pub mod orchestrator;
pub mod segment;
pub mod validator;
pub mod wordform;

#[cfg(feature = "database")]
pub mod database;

pub use audit::{AuditAction, AuditEntry, AuditLog, MemoryAuditLog, TracingAuditLog};
pub use cache::{AssociationCache, AssociationStore, MemoryAssociationStore};
pub use config::ResolverConfig;
pub use determination::{DeterminationAgent, DeterminationPhase, DeterminationReport, TurnOutcome};
pub use error::{ResolverError, Result};
pub use lexicon::{DictionaryHit, DictionarySearch, Lexicon, LexiconEntry, SefariaClient, WordLookup};
pub use models::{
    AssociationCandidate, Determination, LexiconReference, LexrefSet, MergeOutcome,
    WordAssociationRecord, WorkflowState,
};
pub use orchestrator::{ResolutionOrchestrator, SegmentResolution, Stores, WordOutcome, WordResolution};
pub use segment::{split_words, PhraseSegmenter, Segmenter, WordSegmenter};
pub use validator::{CandidateValidator, VettedAssociation};
pub use wordform::{MemoryWordFormStore, WordFormRecord, WordFormStore};

#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager, PgAssociationStore, PgAuditLog, PgWordFormStore};
