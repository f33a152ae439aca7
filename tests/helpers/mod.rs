//! Scripted collaborators for resolution tests
//!
//! The oracle answers per word, so concurrently running word tasks stay
//! deterministic: determination turns are keyed by the word named in the
//! opening message, yes/no answers by the word named in the question.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lexicon_resolver::lexicon::sefaria::split_by_location;
use lexicon_resolver::{
    AssociationCache, AuditLog, CandidateValidator, DeterminationAgent, DictionaryHit,
    DictionarySearch, Lexicon, LexiconEntry, LexiconReference, LexrefSet, MemoryAuditLog,
    MemoryWordFormStore, ResolutionOrchestrator, ResolverError, WordFormStore, WordLookup,
    WordSegmenter,
};
use resolver_agentic::{
    AssistantTurn, ChatMessage, ContentBlock, LlmClient, ToolCallResult, ToolDefinition, ToolUse,
};

// ============================================================================
// Oracle
// ============================================================================

#[derive(Default)]
pub struct ScriptedOracle {
    turns: Mutex<HashMap<String, VecDeque<AssistantTurn>>>,
    answers: Mutex<HashMap<String, VecDeque<bool>>>,
    panic_for: Mutex<HashSet<String>>,
    questions: Mutex<Vec<String>>,
    converse_calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue determination turns for a word
    pub fn script(&self, word: &str, turns: Vec<AssistantTurn>) {
        self.turns
            .lock()
            .unwrap()
            .entry(word.to_string())
            .or_default()
            .extend(turns);
    }

    /// Queue yes/no vetting answers for a word
    pub fn answer(&self, word: &str, answers: &[bool]) {
        self.answers
            .lock()
            .unwrap()
            .entry(word.to_string())
            .or_default()
            .extend(answers.iter().copied());
    }

    pub fn panic_on(&self, word: &str) {
        self.panic_for.lock().unwrap().insert(word.to_string());
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn converse_calls(&self, word: &str) -> usize {
        self.converse_calls
            .lock()
            .unwrap()
            .get(word)
            .copied()
            .unwrap_or(0)
    }
}

fn word_in_question(prompt: &str) -> Option<String> {
    let rest = prompt.strip_prefix("For the word ")?;
    let end = rest.find(" in the text ")?;
    Some(rest[..end].to_string())
}

fn word_in_conversation(messages: &[ChatMessage]) -> Option<String> {
    let opening = messages.first()?.content.iter().find_map(|block| match block {
        ContentBlock::Text { text } => Some(text.as_str()),
        _ => None,
    })?;
    opening.lines().find_map(|line| {
        line.strip_prefix("Word to define: ")
            .or_else(|| line.strip_prefix("Phrase to define: "))
            .map(str::to_string)
    })
}

#[async_trait]
impl LlmClient for ScriptedOracle {
    async fn chat_with_tool(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> anyhow::Result<ToolCallResult> {
        self.questions.lock().unwrap().push(user_prompt.to_string());
        let word = word_in_question(user_prompt)
            .ok_or_else(|| anyhow::anyhow!("unexpected question: {}", user_prompt))?;
        let value = self
            .answers
            .lock()
            .unwrap()
            .get_mut(&word)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| anyhow::anyhow!("no answer scripted for {}", word))?;
        Ok(ToolCallResult {
            tool_name: tool.name.clone(),
            arguments: serde_json::json!({ "value": value }),
        })
    }

    async fn converse(
        &self,
        _system_prompt: &str,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<AssistantTurn> {
        let word = word_in_conversation(messages)
            .ok_or_else(|| anyhow::anyhow!("conversation does not name a word"))?;
        if self.panic_for.lock().unwrap().contains(&word) {
            panic!("oracle crashed on {}", word);
        }
        *self
            .converse_calls
            .lock()
            .unwrap()
            .entry(word.clone())
            .or_default() += 1;
        self.turns
            .lock()
            .unwrap()
            .get_mut(&word)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| anyhow::anyhow!("script exhausted for {}", word))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "test"
    }
}

pub fn turn(calls: Vec<ToolUse>) -> AssistantTurn {
    AssistantTurn {
        text: String::new(),
        tool_uses: calls,
    }
}

fn call(id: &str, name: &str, input: serde_json::Value) -> ToolUse {
    ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}

pub fn search_word_forms(id: &str, query: &str) -> ToolUse {
    call(id, "search_word_forms", serde_json::json!({ "query": query }))
}

pub fn search_dictionaries(id: &str, query: &str) -> ToolUse {
    call(id, "search_dictionaries", serde_json::json!({ "query": query }))
}

fn lexrefs_json(refs: &[(&str, &str)]) -> serde_json::Value {
    refs.iter()
        .map(|(h, l)| serde_json::json!({ "headword": h, "lexicon_name": l }))
        .collect()
}

pub fn determine(
    id: &str,
    word: &str,
    reasoning: &str,
    keep: &[(&str, &str)],
    remove: &[(&str, &str)],
    add: &[(&str, &str)],
) -> ToolUse {
    call(
        id,
        "WordDetermination",
        serde_json::json!({
            "word": word,
            "reasoning": reasoning,
            "entries_to_keep": lexrefs_json(keep),
            "entries_to_remove": lexrefs_json(remove),
            "entries_to_add": lexrefs_json(add),
        }),
    )
}

// ============================================================================
// Lexicon
// ============================================================================

#[derive(Default)]
pub struct StaticLexicon {
    entries: Mutex<Vec<LexiconEntry>>,
    unreachable_forms: Mutex<HashSet<String>>,
}

impl StaticLexicon {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_entries(entries: &[(&str, &str)]) -> Arc<Self> {
        let lexicon = Self::new();
        for (headword, lexicon_name) in entries {
            lexicon.add(headword, lexicon_name);
        }
        lexicon
    }

    pub fn add(&self, headword: &str, lexicon_name: &str) {
        self.entries.lock().unwrap().push(entry(headword, lexicon_name));
    }

    /// Drop an entry, making cached references to it stale
    pub fn remove(&self, headword: &str, lexicon_name: &str) {
        self.entries
            .lock()
            .unwrap()
            .retain(|e| !(e.headword == headword && e.lexicon_name == lexicon_name));
    }

    /// Lookups of this form fail as if the service were down
    pub fn make_unreachable(&self, form: &str) {
        self.unreachable_forms.lock().unwrap().insert(form.to_string());
    }
}

pub fn entry(headword: &str, lexicon_name: &str) -> LexiconEntry {
    serde_json::from_value(serde_json::json!({
        "headword": headword,
        "parent_lexicon": lexicon_name,
        "refs": [],
        "content": {"senses": [{"definition": format!("<b>{}</b> as defined in {}", headword, lexicon_name)}]}
    }))
    .unwrap()
}

pub fn lexref(headword: &str, lexicon_name: &str) -> LexiconReference {
    LexiconReference::new(headword, lexicon_name)
}

#[async_trait]
impl Lexicon for StaticLexicon {
    async fn lookup_form(
        &self,
        form: &str,
        location_ref: Option<&str>,
    ) -> lexicon_resolver::Result<WordLookup> {
        if self.unreachable_forms.lock().unwrap().contains(form) {
            return Err(ResolverError::upstream("www.sefaria.org", "503 Service Unavailable"));
        }
        let matching: Vec<LexiconEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.headword == form)
            .cloned()
            .collect();
        Ok(split_by_location(matching, location_ref))
    }

    async fn resolve(
        &self,
        reference: &LexiconReference,
    ) -> lexicon_resolver::Result<Option<LexiconEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| &e.reference() == reference)
            .cloned())
    }
}

#[async_trait]
impl DictionarySearch for StaticLexicon {
    async fn search(&self, query: &str) -> lexicon_resolver::Result<Vec<DictionaryHit>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.headword.contains(query))
            .map(|e| DictionaryHit {
                location_ref: format!("{}, {} 1", e.lexicon_name, e.headword),
                headword: e.headword.clone(),
                lexicon_name: e.lexicon_name.clone(),
                text: format!("{} as defined in {}", e.headword, e.lexicon_name),
            })
            .collect())
    }
}

// ============================================================================
// Word-form store
// ============================================================================

/// Word-form store whose database is down
#[derive(Default)]
pub struct UnavailableWordFormStore;

#[async_trait]
impl WordFormStore for UnavailableWordFormStore {
    async fn record_determination(
        &self,
        _word: &str,
        _entries: &LexrefSet,
        _location_ref: &str,
    ) -> lexicon_resolver::Result<()> {
        Err(ResolverError::upstream("postgres", "connection refused"))
    }

    async fn record_empty_determination(
        &self,
        _word: &str,
        _reasoning: &str,
        _location_ref: &str,
    ) -> lexicon_resolver::Result<()> {
        Err(ResolverError::upstream("postgres", "connection refused"))
    }

    async fn clear(&self) -> lexicon_resolver::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub oracle: Arc<ScriptedOracle>,
    pub lexicon: Arc<StaticLexicon>,
    pub wordforms: Arc<MemoryWordFormStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub orchestrator: ResolutionOrchestrator,
}

/// Orchestrator over scripted collaborators and the given stores
pub fn orchestrator(
    oracle: &Arc<ScriptedOracle>,
    lexicon: &Arc<StaticLexicon>,
    max_turns: usize,
    wordforms: Arc<dyn WordFormStore>,
    audit: Arc<dyn AuditLog>,
) -> ResolutionOrchestrator {
    ResolutionOrchestrator::new(
        Arc::new(WordSegmenter),
        Arc::new(AssociationCache::in_memory()),
        Arc::new(CandidateValidator::new(oracle.clone(), lexicon.clone())),
        Arc::new(DeterminationAgent::new(
            oracle.clone(),
            lexicon.clone(),
            lexicon.clone(),
            max_turns,
        )),
        wordforms,
        audit,
    )
}

pub fn harness(lexicon: Arc<StaticLexicon>, max_turns: usize) -> Harness {
    let oracle = ScriptedOracle::new();
    let wordforms = Arc::new(MemoryWordFormStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let orchestrator = orchestrator(&oracle, &lexicon, max_turns, wordforms.clone(), audit.clone());

    Harness {
        oracle,
        lexicon,
        wordforms,
        audit,
        orchestrator,
    }
}
