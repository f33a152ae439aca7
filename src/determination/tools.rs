//! Tool menu offered to the oracle during determination
//!
//! Invocations are dispatched over a closed set: two read-only searches, the
//! terminal `WordDetermination` call, and catch-alls for malformed arguments
//! and unknown tool names.

use resolver_agentic::{ToolDefinition, ToolUse};
use serde::Deserialize;

use crate::models::Determination;

pub const SEARCH_WORD_FORMS: &str = "search_word_forms";
pub const SEARCH_DICTIONARIES: &str = "search_dictionaries";
pub const WORD_DETERMINATION: &str = "WordDetermination";

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

/// One parsed tool invocation from a model turn
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    SearchWordForms { id: String, query: String },
    SearchDictionaries { id: String, query: String },
    Determination { id: String, determination: Determination },
    /// Known tool, arguments did not match its schema
    Malformed { id: String, name: String, error: String },
    Unrecognized { id: String, name: String },
}

impl ToolInvocation {
    pub fn parse(tool_use: &ToolUse) -> Self {
        let id = tool_use.id.clone();
        match tool_use.name.as_str() {
            SEARCH_WORD_FORMS => match serde_json::from_value::<QueryArgs>(tool_use.input.clone()) {
                Ok(args) => ToolInvocation::SearchWordForms { id, query: args.query },
                Err(e) => Self::malformed(id, SEARCH_WORD_FORMS, e),
            },
            SEARCH_DICTIONARIES => match serde_json::from_value::<QueryArgs>(tool_use.input.clone()) {
                Ok(args) => ToolInvocation::SearchDictionaries { id, query: args.query },
                Err(e) => Self::malformed(id, SEARCH_DICTIONARIES, e),
            },
            WORD_DETERMINATION => match serde_json::from_value::<Determination>(tool_use.input.clone()) {
                Ok(determination) => ToolInvocation::Determination { id, determination },
                Err(e) => Self::malformed(id, WORD_DETERMINATION, e),
            },
            other => ToolInvocation::Unrecognized {
                id,
                name: other.to_string(),
            },
        }
    }

    fn malformed(id: String, name: &str, error: serde_json::Error) -> Self {
        ToolInvocation::Malformed {
            id,
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ToolInvocation::SearchWordForms { id, .. }
            | ToolInvocation::SearchDictionaries { id, .. }
            | ToolInvocation::Determination { id, .. }
            | ToolInvocation::Malformed { id, .. }
            | ToolInvocation::Unrecognized { id, .. } => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolInvocation::Determination { .. })
    }
}

fn lexref_array_schema(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "array",
        "description": description,
        "items": {
            "type": "object",
            "properties": {
                "headword": {
                    "type": "string",
                    "description": "The exact headword of the dictionary entry as recorded in the headword field"
                },
                "lexicon_name": {
                    "type": "string",
                    "description": "The name of the lexicon, as recorded in the parent_lexicon field"
                }
            },
            "required": ["headword", "lexicon_name"]
        }
    })
}

/// Full menu, in the order presented to the model
pub fn tool_menu() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_WORD_FORMS.to_string(),
            description: "Given a word form as written, returns structured dictionary entries that match the word form".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Word form to look up"}
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: SEARCH_DICTIONARIES.to_string(),
            description: "Given a text query, returns textual content of dictionary entries that match the query in any part of their entry".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Free-text query"}
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: WORD_DETERMINATION.to_string(),
            description: "Record a determination of dictionary entries to keep, add and remove. This can only be used after all \
                          lookups have completed and determinations have been made. It can not be called with other tools. \
                          It is a terminal tool."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "word": {"type": "string", "description": "The word being determined"},
                    "reasoning": {"type": "string", "description": "The reasoning behind the determination"},
                    "entries_to_keep": lexref_array_schema("The dictionary entries to keep"),
                    "entries_to_remove": lexref_array_schema("The dictionary entries to remove"),
                    "entries_to_add": lexref_array_schema("The dictionary entries to add")
                },
                "required": ["word", "reasoning", "entries_to_keep", "entries_to_remove", "entries_to_add"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_use(name: &str, input: serde_json::Value) -> ToolUse {
        ToolUse {
            id: "toolu_1".to_string(),
            name: name.to_string(),
            input,
        }
    }

    #[test]
    fn test_parse_searches() {
        let parsed = ToolInvocation::parse(&tool_use(SEARCH_WORD_FORMS, serde_json::json!({"query": "שלום"})));
        assert_eq!(
            parsed,
            ToolInvocation::SearchWordForms {
                id: "toolu_1".to_string(),
                query: "שלום".to_string()
            }
        );
        let parsed = ToolInvocation::parse(&tool_use(SEARCH_DICTIONARIES, serde_json::json!({"query": "peace"})));
        assert!(matches!(parsed, ToolInvocation::SearchDictionaries { .. }));
        assert!(!parsed.is_terminal());
    }

    #[test]
    fn test_parse_determination() {
        let parsed = ToolInvocation::parse(&tool_use(
            WORD_DETERMINATION,
            serde_json::json!({
                "word": "שלום",
                "reasoning": "Klein",
                "entries_to_keep": [],
                "entries_to_remove": [],
                "entries_to_add": [{"headword": "שלום", "lexicon_name": "Klein Dictionary"}]
            }),
        ));
        assert!(parsed.is_terminal());
        assert_eq!(parsed.id(), "toolu_1");
    }

    #[test]
    fn test_parse_malformed_and_unknown() {
        let parsed = ToolInvocation::parse(&tool_use(SEARCH_WORD_FORMS, serde_json::json!({"q": 1})));
        assert!(matches!(parsed, ToolInvocation::Malformed { ref name, .. } if name == SEARCH_WORD_FORMS));

        let parsed = ToolInvocation::parse(&tool_use(WORD_DETERMINATION, serde_json::json!({"word": "x"})));
        assert!(matches!(parsed, ToolInvocation::Malformed { .. }));
        assert!(!parsed.is_terminal());

        let parsed = ToolInvocation::parse(&tool_use("translate", serde_json::json!({})));
        assert!(matches!(parsed, ToolInvocation::Unrecognized { ref name, .. } if name == "translate"));
    }

    #[test]
    fn test_menu_names() {
        let names: Vec<String> = tool_menu().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![SEARCH_WORD_FORMS, SEARCH_DICTIONARIES, WORD_DETERMINATION]);
    }
}
