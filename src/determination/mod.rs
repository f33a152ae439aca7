//! Determination state machine
//!
//! Drives a bounded tool-use conversation with the oracle until it emits one
//! valid `WordDetermination` on its own.
//!
//! # States
//!
//! ```text
//! Init ──► ModelTurn ──┬─► ToolSearchForms ────────┐
//!             ▲        ├─► ToolSearchDictionaries ─┤
//!             │        ├─► RefuseMultipleCalls ────┤
//!             │        ├─► RefuseInvalidEntries ───┤
//!             └────────┴───────────────────────────┘
//!                      └─► Accept (terminal)
//! ```
//!
//! Refusals are ordinary transitions: the rejection is appended to the
//! conversation and the model gets another turn. Only the turn ceiling ends
//! the loop without a determination.

pub mod prompts;
pub mod tools;

use std::sync::Arc;

use resolver_agentic::{AssistantTurn, ChatMessage, ContentBlock, LlmClient, ToolDefinition};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ResolverError, Result};
use crate::lexicon::{DictionarySearch, Lexicon, LexiconEntry};
use crate::models::{Determination, LexiconReference, WorkflowState};

pub use tools::ToolInvocation;

/// States the machine passes through, recorded in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeterminationPhase {
    Init,
    ModelTurn,
    ToolSearchForms,
    ToolSearchDictionaries,
    RefuseMultipleCalls,
    RefuseInvalidEntries,
    Accept,
}

/// Classification of one model turn
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Searches (and possibly unknown or malformed calls), no terminal call
    ToolCalls(Vec<ToolInvocation>),
    /// A lone terminal call whose entries all resolve
    TerminalValid { id: String, determination: Determination },
    /// A lone terminal call with problems to report back
    TerminalInvalid { id: String, problems: Vec<String> },
    /// A terminal call alongside any other call
    TerminalMultiple(Vec<ToolInvocation>),
    /// No tool call at all
    NoToolCalls,
}

/// Trace of one completed determination
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeterminationReport {
    pub transitions: Vec<DeterminationPhase>,
    pub turns: usize,
    /// Unknown tools, malformed arguments and tool-less turns
    pub protocol_errors: usize,
}

impl DeterminationReport {
    fn enter(&mut self, phase: DeterminationPhase) {
        self.transitions.push(phase);
    }

    pub fn reached(&self, phase: DeterminationPhase) -> bool {
        self.transitions.contains(&phase)
    }
}

pub struct DeterminationAgent {
    llm: Arc<dyn LlmClient>,
    lexicon: Arc<dyn Lexicon>,
    search: Arc<dyn DictionarySearch>,
    max_turns: usize,
    tools: Vec<ToolDefinition>,
}

impl DeterminationAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        lexicon: Arc<dyn Lexicon>,
        search: Arc<dyn DictionarySearch>,
        max_turns: usize,
    ) -> Self {
        Self {
            llm,
            lexicon,
            search,
            max_turns,
            tools: tools::tool_menu(),
        }
    }

    /// Run the conversation to acceptance, filling `selected_association`
    /// and `determination` on the state
    pub async fn run(&self, state: &mut WorkflowState) -> Result<DeterminationReport> {
        let mut report = DeterminationReport::default();

        report.enter(DeterminationPhase::Init);
        let system_prompt = prompts::system_prompt(state.is_phrase());
        let context = self
            .lexicon
            .lookup_form(&state.word, Some(&state.location_ref))
            .await?;
        let opening = prompts::initial_message(state, &context)?;
        state.conversation.push(ChatMessage::user_text(opening));

        while report.turns < self.max_turns {
            report.turns += 1;
            report.enter(DeterminationPhase::ModelTurn);

            let turn = self
                .llm
                .converse(&system_prompt, &state.conversation, &self.tools)
                .await?;
            debug!(
                word = %state.word,
                turn = report.turns,
                tool_calls = turn.tool_uses.len(),
                "Model turn"
            );

            let outcome = self.classify(&state.word, &turn).await?;
            let content = turn.to_content();
            let replied = !content.is_empty();
            if replied {
                state.conversation.push(ChatMessage::assistant(content));
            }

            match outcome {
                TurnOutcome::TerminalValid { id, mut determination } => {
                    report.enter(DeterminationPhase::Accept);
                    state.conversation.push(ChatMessage::tool_results(vec![tool_result(
                        &id,
                        prompts::ACCEPTED_RESPONSE,
                        false,
                    )]));
                    if determination.word != state.word {
                        debug!(word = %state.word, returned = %determination.word, "Oracle echoed a different word");
                        determination.word = state.word.clone();
                    }
                    let selected = determination.selected_association();
                    info!(
                        word = %state.word,
                        turns = report.turns,
                        entries = selected.len(),
                        "Determination accepted"
                    );
                    state.selected_association = Some(selected);
                    state.determination = Some(determination);
                    return Ok(report);
                }
                TurnOutcome::TerminalInvalid { id, problems } => {
                    report.enter(DeterminationPhase::RefuseInvalidEntries);
                    info!(word = %state.word, problems = problems.len(), "Refusing determination with invalid entries");
                    let message = format!(
                        "WordDetermination was not accepted:\n{}\nOnly propose entries returned by the search tools.",
                        problems.join("\n")
                    );
                    state
                        .conversation
                        .push(ChatMessage::tool_results(vec![tool_result(&id, &message, true)]));
                }
                TurnOutcome::TerminalMultiple(invocations) => {
                    report.enter(DeterminationPhase::RefuseMultipleCalls);
                    info!(word = %state.word, calls = invocations.len(), "Refusing combined terminal call");
                    let results = self.execute(state, &invocations, &mut report).await?;
                    state.conversation.push(ChatMessage::tool_results(results));
                }
                TurnOutcome::ToolCalls(invocations) => {
                    let results = self.execute(state, &invocations, &mut report).await?;
                    state.conversation.push(ChatMessage::tool_results(results));
                }
                TurnOutcome::NoToolCalls => {
                    report.protocol_errors += 1;
                    warn!(word = %state.word, turn = report.turns, "Model turn without tool calls");
                    // an empty turn appended nothing, so the last message is still ours
                    if replied {
                        state
                            .conversation
                            .push(ChatMessage::user_text(prompts::TOOL_REQUIRED_NUDGE));
                    }
                }
            }
        }

        warn!(word = %state.word, turns = report.turns, "Determination turn ceiling reached");
        Err(ResolverError::TurnCeilingExceeded {
            word: state.word.clone(),
            turns: report.turns,
        })
    }

    /// Decide which transition a model turn triggers
    pub async fn classify(&self, word: &str, turn: &AssistantTurn) -> Result<TurnOutcome> {
        let invocations: Vec<ToolInvocation> = turn.tool_uses.iter().map(ToolInvocation::parse).collect();
        let terminals = invocations.iter().filter(|i| i.is_terminal()).count();

        if invocations.is_empty() {
            return Ok(TurnOutcome::NoToolCalls);
        }
        if terminals == 0 {
            return Ok(TurnOutcome::ToolCalls(invocations));
        }
        if invocations.len() > 1 {
            return Ok(TurnOutcome::TerminalMultiple(invocations));
        }

        match invocations.into_iter().next() {
            Some(ToolInvocation::Determination { id, determination }) => {
                let problems = self.validate(word, &determination).await?;
                if problems.is_empty() {
                    Ok(TurnOutcome::TerminalValid { id, determination })
                } else {
                    Ok(TurnOutcome::TerminalInvalid { id, problems })
                }
            }
            Some(other) => Ok(TurnOutcome::ToolCalls(vec![other])),
            None => Ok(TurnOutcome::NoToolCalls),
        }
    }

    /// Problems with a proposed determination; empty when acceptable
    async fn validate(&self, word: &str, determination: &Determination) -> Result<Vec<String>> {
        let selected = determination.selected_association();
        let mut problems = Vec::new();

        if selected.is_empty() && determination.reasoning.trim().is_empty() {
            problems.push("A determination with no entries must explain why in its reasoning.".to_string());
        }
        for reference in &selected {
            if self.lexicon.resolve(reference).await?.is_none() {
                debug!(word = %word, %reference, "Proposed entry does not resolve");
                problems.push(unknown_entry(reference));
            }
        }
        Ok(problems)
    }

    /// Run every invocation of a turn, one tool result per invocation
    async fn execute(
        &self,
        state: &WorkflowState,
        invocations: &[ToolInvocation],
        report: &mut DeterminationReport,
    ) -> Result<Vec<ContentBlock>> {
        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            let block = match invocation {
                ToolInvocation::SearchWordForms { id, query } => {
                    report.enter(DeterminationPhase::ToolSearchForms);
                    debug!(word = %state.word, query = %query, "search_word_forms");
                    let lookup = self.lexicon.lookup_form(query, None).await?;
                    let entries: Vec<serde_json::Value> =
                        lookup.possible.iter().map(LexiconEntry::pruned).collect();
                    tool_result(id, &serde_json::to_string(&entries)?, false)
                }
                ToolInvocation::SearchDictionaries { id, query } => {
                    report.enter(DeterminationPhase::ToolSearchDictionaries);
                    debug!(word = %state.word, query = %query, "search_dictionaries");
                    let hits = self.search.search(query).await?;
                    tool_result(id, &serde_json::to_string(&hits)?, false)
                }
                ToolInvocation::Determination { id, .. } => {
                    tool_result(id, prompts::MULTIPLE_CALLS_REFUSAL, true)
                }
                ToolInvocation::Malformed { id, name, error } => {
                    report.protocol_errors += 1;
                    warn!(word = %state.word, tool = %name, error = %error, "Malformed tool arguments");
                    tool_result(id, &format!("Invalid arguments for {}: {}", name, error), true)
                }
                ToolInvocation::Unrecognized { id, name } => {
                    report.protocol_errors += 1;
                    warn!(word = %state.word, tool = %name, "Unknown tool call");
                    tool_result(id, &format!("Unknown tool: {}", name), true)
                }
            };
            results.push(block);
        }
        Ok(results)
    }
}

fn unknown_entry(reference: &LexiconReference) -> String {
    format!(
        "No entry with headword \"{}\" exists in {}.",
        reference.headword, reference.lexicon_name
    )
}

fn tool_result(id: &str, content: &str, is_error: bool) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: id.to_string(),
        content: content.to_string(),
        is_error,
    }
}
