//! Prompts for the determination conversation

use crate::error::Result;
use crate::lexicon::{LexiconEntry, WordLookup};
use crate::models::WorkflowState;

const DICTIONARIES: &str = "The dictionaries at your disposal include the Jastrow Aramaic Dictionary, the Klein Dictionary of Hebrew, \
the BDB dictionaries of biblical Hebrew and Aramaic, and an encyclopedia of talmudic concepts and idioms called Kovetz Yesodot VaChakirot. \
Each of those is preferable in its domain: Jastrow for Aramaic, Klein for Hebrew, and BDB for Biblical language.";

const CLOSING: &str = "When you are satisfied that you have found the best dictionary entries, call WordDetermination with a short \
explanation of your work, the currently associated dictionary entries that should be kept, those that should be removed, and the \
dictionary entries to add. If no dictionary entry applies, call it with all three lists empty and explain why in the reasoning. \
WordDetermination must be called alone, never together with a search.";

pub(crate) const ACCEPTED_RESPONSE: &str = "Here is your structured response";

pub(crate) const MULTIPLE_CALLS_REFUSAL: &str = "WordDetermination can not be called with other tools.";

pub(crate) const TOOL_REQUIRED_NUDGE: &str = "Please continue by calling one of the available tools.";

pub fn system_prompt(is_phrase: bool) -> String {
    if is_phrase {
        format!(
            "You are a scholar of Jewish texts.\n\
             You will be given a segment of text, a phrase from within that segment, a list of dictionary entries currently \
             associated with that phrase, and sometimes some potential entries that may or may not be correct.\n\
             Your job is to find the dictionary entries that best define the phrase given. If the given entries are not \
             accurate or sufficient, you will need to find the best entries to replace or augment them.\n\
             You will be able to search for structured dictionary entries with headword searches. Please do not search for or \
             return the individual words within the phrase, only entries relating to the whole phrase itself.\n\
             {DICTIONARIES}\n\
             {CLOSING}"
        )
    } else {
        format!(
            "You are a scholar of Jewish texts.\n\
             You will be given a segment of text, a word from within that segment, a list of dictionary entries currently \
             associated with that word, and sometimes some potential entries that may or may not be correct.\n\
             Your job is to find the dictionary entries that best define the word given. If the given entries are not \
             accurate or sufficient, you will need to find the best entries to replace or augment them.\n\
             You will be able to search for structured dictionary entries with plain-text searches across dictionaries, and \
             with specific headword searches.\n\
             {DICTIONARIES}\n\
             {CLOSING}"
        )
    }
}

fn render_entries(entries: &[LexiconEntry]) -> Result<String> {
    let pruned: Vec<serde_json::Value> = entries.iter().map(LexiconEntry::pruned).collect();
    Ok(serde_json::to_string_pretty(&pruned)?)
}

/// Opening message: the occurrence, its associated entries and other possible
/// entries for the same form
pub fn initial_message(state: &WorkflowState, lookup: &WordLookup) -> Result<String> {
    let kind = if state.is_phrase() { "Phrase" } else { "Word" };
    let mut message = format!(
        "From: {}\nText: {}\n{} to define: {}\n---\n",
        state.location_ref, state.segment, kind, state.word
    );

    if lookup.associated.is_empty() {
        message.push_str("There are no entries currently associated with this word.\n");
    } else {
        message.push_str("Associated Entries:\n");
        message.push_str(&render_entries(&lookup.associated)?);
        message.push('\n');
    }

    if !lookup.possible.is_empty() {
        message.push_str("---\nPossible Entries:\n");
        message.push_str(&render_entries(&lookup.possible)?);
        message.push('\n');
    }
    Ok(message)
}
