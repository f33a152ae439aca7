//! Anthropic Client
//!
//! LLM client implementation for the Anthropic Messages API with tool use.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::llm_client::{
    AssistantTurn, ChatMessage, LlmClient, ToolCallResult, ToolDefinition, ToolUse,
};

/// Default Anthropic model
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic Claude API client
#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    client: reqwest::Client,
    model: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ResponseBlock>,
}

impl AnthropicClient {
    /// Create a new Anthropic client with the given API key
    pub fn new(api_key: String) -> Self {
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_model(api_key, &model)
    }

    /// Create with a specific model
    pub fn with_model(api_key: String, model: &str) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            model: model.to_string(),
        }
    }

    fn tools_json(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters
                })
            })
            .collect()
    }

    /// POST a request body to the Messages API and decode the content blocks
    async fn send(&self, body: &serde_json::Value) -> Result<Vec<ResponseBlock>> {
        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic API error {}: {}", status, body));
        }

        let response_text = response.text().await?;
        tracing::debug!(
            "Anthropic raw response: {}",
            response_text.chars().take(1000).collect::<String>()
        );

        let api_response: ApiResponse = serde_json::from_str(&response_text)
            .map_err(|e| anyhow!("Failed to parse Anthropic response: {}", e))?;
        Ok(api_response.content)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        let body = serde_json::json!({
            "model": &self.model,
            "max_tokens": MAX_TOKENS,
            "system": system_prompt,
            "messages": [{"role": "user", "content": user_prompt}],
            "tools": Self::tools_json(std::slice::from_ref(tool)),
            "tool_choice": {"type": "tool", "name": &tool.name}
        });

        let blocks = self.send(&body).await?;
        blocks
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::ToolUse { name, input, .. } => Some(ToolCallResult {
                    tool_name: name,
                    arguments: input,
                }),
                _ => None,
            })
            .ok_or_else(|| anyhow!("No tool_use block in Anthropic response"))
    }

    async fn converse(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        let body = serde_json::json!({
            "model": &self.model,
            "max_tokens": MAX_TOKENS,
            "system": system_prompt,
            "messages": messages,
            "tools": Self::tools_json(tools),
            "tool_choice": {"type": "any"}
        });

        let mut turn = AssistantTurn::default();
        for block in self.send(&body).await? {
            match block {
                ResponseBlock::Text { text } => turn.text.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => {
                    tracing::debug!(tool = %name, id = %id, "Model requested tool");
                    turn.tool_uses.push(ToolUse { id, name, input });
                }
                ResponseBlock::Other => {}
            }
        }
        Ok(turn)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "Anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model() {
        let client = AnthropicClient::with_model("test-key".to_string(), "claude-3-opus");
        assert_eq!(client.model_name(), "claude-3-opus");
        assert_eq!(client.provider_name(), "Anthropic");
    }

    #[test]
    fn test_tools_json_uses_input_schema() {
        let tool = ToolDefinition {
            name: "search_word_forms".to_string(),
            description: "Search".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let json = AnthropicClient::tools_json(&[tool]);
        assert_eq!(json[0]["name"], "search_word_forms");
        assert_eq!(json[0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_response_blocks_decode() {
        let raw = r#"{"content": [
            {"type": "text", "text": "Looking up"},
            {"type": "tool_use", "id": "toolu_1", "name": "search_word_forms", "input": {"query": "שלום"}},
            {"type": "thinking", "thinking": "..."}
        ]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 3);
        assert!(matches!(parsed.content[1], ResponseBlock::ToolUse { .. }));
        assert!(matches!(parsed.content[2], ResponseBlock::Other));
    }
}
