//! Candidate validation
//!
//! Before a cached association is trusted for a new occurrence, the oracle is
//! asked one yes/no question about it in the context of this segment.
//! Candidates are examined in the order given (newest first) and vetting stops
//! at the first one accepted.

use std::sync::Arc;

use resolver_agentic::{LlmClient, ToolDefinition};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ResolverError, Result};
use crate::lexicon::{Lexicon, LexiconEntry};
use crate::models::{AssociationCandidate, Determination, LexrefSet};

const VALIDATION_TOOL: &str = "validation_result";

const VALIDATOR_SYSTEM_PROMPT: &str = "You are a scholar of Jewish texts. Your task is to validate associations of words to dictionary entries.";

/// A cached candidate accepted for this occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct VettedAssociation {
    pub selected: LexrefSet,
    /// Present when an empty ("no entries apply") candidate was accepted
    pub determination: Option<Determination>,
}

#[derive(Deserialize)]
struct BoolOutput {
    value: bool,
}

/// Resolve every reference of a candidate; a reference that no longer exists
/// yields `StaleReference`
pub async fn resolve_all(
    lexicon: &dyn Lexicon,
    lexrefs: &LexrefSet,
) -> Result<Vec<LexiconEntry>> {
    let mut entries = Vec::with_capacity(lexrefs.len());
    for reference in lexrefs {
        match lexicon.resolve(reference).await? {
            Some(entry) => entries.push(entry),
            None => {
                return Err(ResolverError::StaleReference {
                    reference: reference.clone(),
                })
            }
        }
    }
    Ok(entries)
}

pub struct CandidateValidator {
    llm: Arc<dyn LlmClient>,
    lexicon: Arc<dyn Lexicon>,
}

impl CandidateValidator {
    pub fn new(llm: Arc<dyn LlmClient>, lexicon: Arc<dyn Lexicon>) -> Self {
        Self { llm, lexicon }
    }

    /// First candidate the oracle accepts for `word` in `segment`, if any
    pub async fn vet(
        &self,
        word: &str,
        segment: &str,
        candidates: &[AssociationCandidate],
    ) -> Result<Option<VettedAssociation>> {
        for (position, candidate) in candidates.iter().enumerate() {
            if candidate.is_empty_decision() {
                let reasoning = candidate.reasoning.as_deref().unwrap_or_default();
                if self.ask(&empty_prompt(word, segment, reasoning)).await? {
                    info!(word = %word, position, "Accepted cached empty association");
                    return Ok(Some(VettedAssociation {
                        selected: LexrefSet::new(),
                        determination: Some(Determination::empty(word, reasoning)),
                    }));
                }
                continue;
            }

            let entries = match resolve_all(self.lexicon.as_ref(), &candidate.lexrefs).await {
                Ok(entries) => entries,
                Err(ResolverError::StaleReference { reference }) => {
                    debug!(word = %word, %reference, "Skipping candidate with stale reference");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let contents: Vec<serde_json::Value> = entries.iter().map(LexiconEntry::pruned).collect();
            let rendered = serde_json::to_string_pretty(&contents)?;
            if self.ask(&entries_prompt(word, segment, &rendered)).await? {
                info!(word = %word, position, entries = candidate.lexrefs.len(), "Accepted cached association");
                return Ok(Some(VettedAssociation {
                    selected: candidate.lexrefs.clone(),
                    determination: None,
                }));
            }
        }
        Ok(None)
    }

    async fn ask(&self, prompt: &str) -> Result<bool> {
        let result = self
            .llm
            .chat_with_tool(VALIDATOR_SYSTEM_PROMPT, prompt, &validation_tool())
            .await?;
        let output: BoolOutput = serde_json::from_value(result.arguments)?;
        Ok(output.value)
    }
}

fn validation_tool() -> ToolDefinition {
    ToolDefinition {
        name: VALIDATION_TOOL.to_string(),
        description: "Report whether the proposal holds".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "value": {"type": "boolean"}
            },
            "required": ["value"]
        }),
    }
}

fn entries_prompt(word: &str, segment: &str, entries: &str) -> String {
    format!(
        "For the word {word} in the text {segment}, the following entries are proposed.\n\n{entries}\n\n\
         Please return true if these are valid and sufficient dictionary entries. False, otherwise."
    )
}

fn empty_prompt(word: &str, segment: &str, reasoning: &str) -> String {
    format!(
        "For the word {word} in the text {segment}, it was previously decided that no dictionary entry applies, \
         for this reason:\n\n{reasoning}\n\n\
         Please return true if this reasoning also holds here. False, otherwise."
    )
}
