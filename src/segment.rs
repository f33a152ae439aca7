//! Segmentation
//!
//! Splits a segment of text into the distinct words (and optionally
//! multi-word phrases) that get resolved independently.

use std::sync::Arc;

use async_trait::async_trait;
use resolver_agentic::{LlmClient, ToolDefinition};
use serde::Deserialize;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

/// Punctuation stripped from both ends of a token. `'` is kept since it marks
/// abbreviations; internal `"` is kept for acronyms.
const EDGE_PUNCTUATION: &[char] = &['?', '!', ',', '.', ';', ':', '"'];

const PHRASE_TOOL: &str = "phrases_in_segment";

const PHRASE_SYSTEM_PROMPT: &str =
    "You are a scholar of Jewish texts. You identify idioms and fixed expressions in classical Hebrew and Aramaic.";

/// Ordered distinct words of a segment
///
/// Whitespace split, edge punctuation removed, NFC normalized, first
/// occurrence wins.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for token in text.split_whitespace() {
        let trimmed = token.trim_matches(EDGE_PUNCTUATION);
        if trimmed.is_empty() {
            continue;
        }
        let word: String = trimmed.nfc().collect();
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Distinct words and phrases of `text`, in order
    async fn split(&self, text: &str) -> Result<Vec<String>>;
}

/// Single words only
#[derive(Debug, Default, Clone, Copy)]
pub struct WordSegmenter;

#[async_trait]
impl Segmenter for WordSegmenter {
    async fn split(&self, text: &str) -> Result<Vec<String>> {
        Ok(split_words(text))
    }
}

#[derive(Deserialize)]
struct PhrasesInSegment {
    #[serde(default)]
    phrases: Vec<String>,
}

/// Words plus dictionary-worthy phrases found by the oracle
pub struct PhraseSegmenter {
    llm: Arc<dyn LlmClient>,
}

impl PhraseSegmenter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn phrase_tool() -> ToolDefinition {
        ToolDefinition {
            name: PHRASE_TOOL.to_string(),
            description: "Report the multi-word phrases in the segment that might have their own dictionary entry".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "phrases": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Phrases exactly as they appear in the segment"
                    }
                },
                "required": ["phrases"]
            }),
        }
    }
}

#[async_trait]
impl Segmenter for PhraseSegmenter {
    async fn split(&self, text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "In the segment of text below, what multi-word phrases are present that might be found in a dictionary?\n\n{}",
            text
        );
        let result = self
            .llm
            .chat_with_tool(PHRASE_SYSTEM_PROMPT, &prompt, &Self::phrase_tool())
            .await?;
        let found: PhrasesInSegment = serde_json::from_value(result.arguments)?;

        let mut items = split_words(text);
        for phrase in found.phrases {
            let phrase: String = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
            let phrase: String = phrase.nfc().collect();
            // single tokens are already covered by the word split
            if !phrase.contains(' ') || items.contains(&phrase) {
                continue;
            }
            items.push(phrase);
        }
        debug!(count = items.len(), "Segmented text");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver_agentic::{AssistantTurn, ChatMessage, ToolCallResult};

    struct PhraseOracle(serde_json::Value);

    #[async_trait]
    impl LlmClient for PhraseOracle {
        async fn chat_with_tool(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
            tool: &ToolDefinition,
        ) -> anyhow::Result<ToolCallResult> {
            assert!(user_prompt.contains("multi-word phrases"));
            Ok(ToolCallResult {
                tool_name: tool.name.clone(),
                arguments: self.0.clone(),
            })
        }

        async fn converse(
            &self,
            _system_prompt: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> anyhow::Result<AssistantTurn> {
            anyhow::bail!("not used")
        }

        fn model_name(&self) -> &str {
            "phrase-oracle"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[test]
    fn test_split_words_strips_edge_punctuation_and_dedupes() {
        let words = split_words("אמר רבי: \"שלום\" שלום, רז\"ל; ר' יוחנן?!");
        assert_eq!(words, vec!["אמר", "רבי", "שלום", "רז\"ל", "ר'", "יוחנן"]);
    }

    #[test]
    fn test_split_words_normalizes_encodings() {
        // dagesh + qamats in two different orders
        let a = "\u{05D1}\u{05BC}\u{05B8}";
        let b = "\u{05D1}\u{05B8}\u{05BC}";
        assert_eq!(split_words(&format!("{} {}", a, b)).len(), 1);
    }

    #[test]
    fn test_split_words_drops_pure_punctuation() {
        assert_eq!(split_words(" : . ? "), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_phrase_segmenter_appends_phrases() {
        let oracle = PhraseOracle(serde_json::json!({
            "phrases": ["בית  דין", "דין", "בית דין"]
        }));
        let segmenter = PhraseSegmenter::new(Arc::new(oracle));
        let items = segmenter.split("בית דין הגדול").await.unwrap();
        assert_eq!(items, vec!["בית", "דין", "הגדול", "בית דין"]);
    }

    #[tokio::test]
    async fn test_word_segmenter() {
        let items = WordSegmenter.split("a b a").await.unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }
}
