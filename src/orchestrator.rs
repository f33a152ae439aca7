//! Resolution orchestrator
//!
//! Resolves every word of a segment. Each stage fans out one task per
//! eligible word and completes when all of them have:
//!
//! ```text
//! split ─► cache lookup ─► Stage A: vet cached candidates
//!                          Stage B: determination (words Stage A left open)
//!                          write-back: association cache + word-form store
//! ```
//!
//! A word whose task fails is reported as failed and writes nothing; its
//! siblings are unaffected.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use resolver_agentic::create_llm_client;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::audit::{AuditAction, AuditLog, TracingAuditLog};
use crate::cache::{AssociationCache, AssociationStore, MemoryAssociationStore};
use crate::config::ResolverConfig;
use crate::determination::DeterminationAgent;
use crate::error::{ResolverError, Result};
use crate::lexicon::SefariaClient;
use crate::models::{LexrefSet, WorkflowState};
use crate::segment::{PhraseSegmenter, Segmenter};
use crate::validator::CandidateValidator;
use crate::wordform::{MemoryWordFormStore, WordFormStore};

/// Storage collaborators shared by every word task
#[derive(Clone)]
pub struct Stores {
    pub associations: Arc<dyn AssociationStore>,
    pub wordforms: Arc<dyn WordFormStore>,
    pub audit: Arc<dyn AuditLog>,
}

impl Stores {
    /// Process-local stores with tracing-only auditing
    pub fn in_memory() -> Self {
        Self {
            associations: Arc::new(MemoryAssociationStore::new()),
            wordforms: Arc::new(MemoryWordFormStore::new()),
            audit: Arc::new(TracingAuditLog),
        }
    }
}

/// What happened to one word
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WordOutcome {
    Resolved { entries: LexrefSet },
    /// Successfully decided that no entry applies
    NoEntries { reasoning: String },
    Failed { kind: String, message: String },
}

impl WordOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, WordOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WordResolution {
    pub word: String,
    pub outcome: WordOutcome,
    pub state: WorkflowState,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentResolution {
    pub location_ref: String,
    pub words: Vec<WordResolution>,
}

impl SegmentResolution {
    pub fn word(&self, word: &str) -> Option<&WordResolution> {
        self.words.iter().find(|w| w.word == word)
    }

    pub fn failures(&self) -> impl Iterator<Item = &WordResolution> {
        self.words.iter().filter(|w| w.outcome.is_failed())
    }
}

/// One word in flight between stages
struct WordTask {
    state: WorkflowState,
    error: Option<ResolverError>,
}

impl WordTask {
    fn open(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ResolutionOrchestrator {
    segmenter: Arc<dyn Segmenter>,
    cache: Arc<AssociationCache>,
    validator: Arc<CandidateValidator>,
    agent: Arc<DeterminationAgent>,
    wordforms: Arc<dyn WordFormStore>,
    audit: Arc<dyn AuditLog>,
}

impl ResolutionOrchestrator {
    pub fn new(
        segmenter: Arc<dyn Segmenter>,
        cache: Arc<AssociationCache>,
        validator: Arc<CandidateValidator>,
        agent: Arc<DeterminationAgent>,
        wordforms: Arc<dyn WordFormStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            segmenter,
            cache,
            validator,
            agent,
            wordforms,
            audit,
        }
    }

    /// Wire the Anthropic oracle and the Sefaria lexicon over the given stores
    pub fn from_config(config: &ResolverConfig, stores: Stores) -> Result<Self> {
        config.validate()?;
        let llm = create_llm_client(&config.client_settings())?;
        let sefaria = Arc::new(SefariaClient::new(&config.lexicon_api_base)?);

        info!(
            model = llm.model_name(),
            lexicon = %config.lexicon_api_base,
            max_turns = config.max_turns,
            "Resolution orchestrator configured"
        );

        Ok(Self::new(
            Arc::new(PhraseSegmenter::new(llm.clone())),
            Arc::new(AssociationCache::new(stores.associations)),
            Arc::new(CandidateValidator::new(llm.clone(), sefaria.clone())),
            Arc::new(DeterminationAgent::new(
                llm,
                sefaria.clone(),
                sefaria,
                config.max_turns,
            )),
            stores.wordforms,
            stores.audit,
        ))
    }

    /// Replace the segmenter, e.g. with `WordSegmenter` to skip phrase detection
    pub fn with_segmenter(mut self, segmenter: Arc<dyn Segmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn cache(&self) -> &AssociationCache {
        &self.cache
    }

    /// Resolve every word and phrase of one segment
    ///
    /// Only a segmentation failure fails the whole call; per-word failures
    /// are reported in the returned outcomes.
    pub async fn resolve_segment(&self, location_ref: &str, text: &str) -> Result<SegmentResolution> {
        let words = self.segmenter.split(text).await?;
        info!(location_ref = %location_ref, words = words.len(), "Resolving segment");

        let lookups = join_all(words.iter().map(|word| self.cache.lookup(word))).await;
        let mut tasks = Vec::with_capacity(words.len());
        for (word, lookup) in words.into_iter().zip(lookups) {
            let (candidates, error) = match lookup {
                Ok(candidates) => (candidates, None),
                Err(e) => (Vec::new(), Some(e)),
            };
            let state = WorkflowState::new(word, text, location_ref, candidates);
            self.audit.log(AuditAction::Begin, &state).await;
            tasks.push(WordTask { state, error });
        }

        let tasks = run_stage(
            "vet",
            tasks,
            |t| t.open() && !t.state.cached_candidates.is_empty(),
            {
                let validator = self.validator.clone();
                let audit = self.audit.clone();
                move |state| vet_word(validator.clone(), audit.clone(), state)
            },
        )
        .await;

        let tasks = run_stage(
            "determine",
            tasks,
            |t| t.open() && !t.state.is_resolved(),
            {
                let agent = self.agent.clone();
                let audit = self.audit.clone();
                move |state| determine_word(agent.clone(), audit.clone(), state)
            },
        )
        .await;

        let tasks = run_stage(
            "write-back",
            tasks,
            |t| t.open() && t.state.is_resolved(),
            {
                let cache = self.cache.clone();
                let wordforms = self.wordforms.clone();
                let audit = self.audit.clone();
                move |state| write_back(cache.clone(), wordforms.clone(), audit.clone(), state)
            },
        )
        .await;

        let words: Vec<WordResolution> = tasks.into_iter().map(finish).collect();
        let failed = words.iter().filter(|w| w.outcome.is_failed()).count();
        info!(
            location_ref = %location_ref,
            words = words.len(),
            failed,
            "Segment resolved"
        );
        Ok(SegmentResolution {
            location_ref: location_ref.to_string(),
            words,
        })
    }

    /// Clear the association cache, the word-form store and the audit log
    pub async fn reset(&self) -> Result<()> {
        warn!("Resetting association cache");
        self.cache.clear().await?;
        warn!("Resetting word-form store");
        self.wordforms.clear().await?;
        warn!("Resetting audit log");
        self.audit.clear().await?;
        Ok(())
    }
}

/// Spawn `work` for every eligible task, wait for all, keep input order
async fn run_stage<F, Fut>(
    stage: &'static str,
    tasks: Vec<WordTask>,
    eligible: impl Fn(&WordTask) -> bool,
    work: F,
) -> Vec<WordTask>
where
    F: Fn(WorkflowState) -> Fut,
    Fut: Future<Output = (WorkflowState, Result<()>)> + Send + 'static,
{
    let mut slots: Vec<Option<WordTask>> = Vec::with_capacity(tasks.len());
    let mut pending = Vec::new();
    let mut handles = Vec::new();

    for (index, task) in tasks.into_iter().enumerate() {
        if eligible(&task) {
            pending.push((index, task.state.clone()));
            handles.push(tokio::spawn(work(task.state)));
            slots.push(None);
        } else {
            slots.push(Some(task));
        }
    }

    let joined = join_all(handles).await;
    for ((index, snapshot), result) in pending.into_iter().zip(joined) {
        let task = match result {
            Ok((state, Ok(()))) => WordTask { state, error: None },
            Ok((state, Err(e))) => {
                warn!(stage, word = %state.word, error = %e, "Word task failed");
                WordTask {
                    state,
                    error: Some(e),
                }
            }
            Err(join_error) => {
                error!(stage, word = %snapshot.word, error = %join_error, "Word task aborted");
                let error = ResolverError::TaskAborted {
                    word: snapshot.word.clone(),
                    message: join_error.to_string(),
                };
                WordTask {
                    state: snapshot,
                    error: Some(error),
                }
            }
        };
        slots[index] = Some(task);
    }

    slots.into_iter().flatten().collect()
}

async fn vet_word(
    validator: Arc<CandidateValidator>,
    audit: Arc<dyn AuditLog>,
    mut state: WorkflowState,
) -> (WorkflowState, Result<()>) {
    audit.log(AuditAction::BeginVetting, &state).await;
    let vetted = validator
        .vet(&state.word, &state.segment, &state.cached_candidates)
        .await;
    match vetted {
        Ok(Some(vetted)) => {
            state.selected_association = Some(vetted.selected);
            state.determination = vetted.determination;
            audit.log(AuditAction::MatchedCandidate, &state).await;
            if state.empty_reasoning().is_some() {
                audit.log(AuditAction::NoAssociationFound, &state).await;
            }
            (state, Ok(()))
        }
        Ok(None) => {
            audit.log(AuditAction::NoCandidateMatched, &state).await;
            (state, Ok(()))
        }
        Err(e) => (state, Err(e)),
    }
}

async fn determine_word(
    agent: Arc<DeterminationAgent>,
    audit: Arc<dyn AuditLog>,
    mut state: WorkflowState,
) -> (WorkflowState, Result<()>) {
    audit.log(AuditAction::BeginDetermination, &state).await;
    match agent.run(&mut state).await {
        Ok(report) => {
            audit.log(AuditAction::DeterminationAccepted, &state).await;
            if state.empty_reasoning().is_some() {
                audit.log(AuditAction::NoAssociationFound, &state).await;
            }
            info!(
                word = %state.word,
                turns = report.turns,
                protocol_errors = report.protocol_errors,
                "Determination complete"
            );
            (state, Ok(()))
        }
        Err(e) => {
            audit.log(AuditAction::DeterminationFailed, &state).await;
            (state, Err(e))
        }
    }
}

/// Record the selected association for one resolved word
///
/// The selected set (keep ∪ add) is written as one candidate; entries the
/// determination removed are never deleted from other candidates.
async fn write_back(
    cache: Arc<AssociationCache>,
    wordforms: Arc<dyn WordFormStore>,
    audit: Arc<dyn AuditLog>,
    state: WorkflowState,
) -> (WorkflowState, Result<()>) {
    let result = record(&cache, wordforms.as_ref(), &state).await;
    if result.is_ok() {
        audit.log(AuditAction::RecordedAssociation, &state).await;
    }
    (state, result)
}

async fn record(
    cache: &AssociationCache,
    wordforms: &dyn WordFormStore,
    state: &WorkflowState,
) -> Result<()> {
    let selected = match &state.selected_association {
        Some(selected) => selected,
        None => return Ok(()),
    };

    // store before cache: a failed store write must leave no cache write
    if !selected.is_empty() {
        wordforms
            .record_determination(&state.word, selected, &state.location_ref)
            .await?;
        cache
            .record_confirmed(&state.word, selected, &state.location_ref)
            .await?;
        return Ok(());
    }

    let reasoning = state
        .empty_reasoning()
        .ok_or_else(|| ResolverError::CacheInvariant {
            word: state.word.clone(),
            message: "empty association without reasoning".to_string(),
        })?;
    wordforms
        .record_empty_determination(&state.word, reasoning, &state.location_ref)
        .await?;
    cache
        .record_empty(&state.word, &state.location_ref, reasoning)
        .await?;
    Ok(())
}

fn finish(task: WordTask) -> WordResolution {
    let outcome = match (&task.error, &task.state.selected_association) {
        (Some(e), _) => WordOutcome::Failed {
            kind: e.kind().to_string(),
            message: e.to_string(),
        },
        (None, Some(entries)) if !entries.is_empty() => WordOutcome::Resolved {
            entries: entries.clone(),
        },
        (None, Some(_)) => WordOutcome::NoEntries {
            reasoning: task.state.empty_reasoning().unwrap_or_default().to_string(),
        },
        (None, None) => WordOutcome::Failed {
            kind: "unresolved".to_string(),
            message: "no stage produced an association".to_string(),
        },
    };
    WordResolution {
        word: task.state.word.clone(),
        outcome,
        state: task.state,
    }
}
