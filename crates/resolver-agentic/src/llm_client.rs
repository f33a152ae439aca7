//! LLM Client Trait
//!
//! Provider-neutral interface for the reasoning oracle: multi-turn
//! conversations with a tool menu, and single-shot forced tool calls for
//! structured output.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tool/function definition offered to the model
///
/// - `parameters` is the JSON Schema of the tool input
/// - Anthropic: maps to an entry of the `tools` array (`input_schema`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (e.g., "search_word_forms")
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: serde_json::Value,
}

/// Result from a forced single tool call
///
/// Contains the structured JSON arguments returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Name of the tool that was called
    pub tool_name: String,
    /// Structured arguments as JSON
    pub arguments: serde_json::Value,
}

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// User message carrying tool results for the preceding assistant turn
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// One model turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    /// Free text the model emitted alongside (or instead of) tool calls
    pub text: String,
    /// Tool invocations, in the order emitted
    pub tool_uses: Vec<ToolUse>,
}

impl AssistantTurn {
    /// Content blocks to append to the conversation as the assistant message
    pub fn to_content(&self) -> Vec<ContentBlock> {
        let mut blocks = Vec::with_capacity(self.tool_uses.len() + 1);
        if !self.text.is_empty() {
            blocks.push(ContentBlock::Text {
                text: self.text.clone(),
            });
        }
        blocks.extend(self.tool_uses.iter().map(|t| ContentBlock::ToolUse {
            id: t.id.clone(),
            name: t.name.clone(),
            input: t.input.clone(),
        }));
        blocks
    }
}

/// Unified LLM client interface
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Call LLM with a single tool, forcing structured output
    ///
    /// Anthropic: tool_use with `tool_choice = {"type": "tool", "name": ...}`
    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult>;

    /// Run one model turn over the whole conversation
    ///
    /// The model is required to call at least one of `tools`.
    async fn converse(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn>;

    /// Get the model name for logging
    fn model_name(&self) -> &str;

    /// Get the provider name for logging
    fn provider_name(&self) -> &str;
}
