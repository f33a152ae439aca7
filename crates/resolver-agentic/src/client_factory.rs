//! Client Factory
//!
//! Builds the shared, rate-limited LLM client used by every resolution task.

use std::sync::Arc;

use anyhow::Result;

use super::anthropic_client::AnthropicClient;
use super::llm_client::LlmClient;
use super::rate_limit::{RateLimitedClient, TokenBucket};

/// Oracle client settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_key: String,
    pub model: Option<String>,
    /// Sustained requests per second
    pub rate_per_sec: f64,
    /// Requests allowed back-to-back before throttling
    pub burst: u32,
}

/// Create an Anthropic client wrapped in a process-wide token bucket
pub fn create_llm_client(settings: &ClientSettings) -> Result<Arc<dyn LlmClient>> {
    let inner: Arc<dyn LlmClient> = match &settings.model {
        Some(model) => Arc::new(AnthropicClient::with_model(settings.api_key.clone(), model)),
        None => Arc::new(AnthropicClient::new(settings.api_key.clone())),
    };
    let bucket = Arc::new(TokenBucket::new(settings.rate_per_sec, settings.burst)?);

    tracing::info!(
        provider = inner.provider_name(),
        model = inner.model_name(),
        rate_per_sec = settings.rate_per_sec,
        burst = settings.burst,
        "Created rate-limited LLM client"
    );

    Ok(Arc::new(RateLimitedClient::new(inner, bucket)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_with_explicit_model() {
        let settings = ClientSettings {
            api_key: "test-key".to_string(),
            model: Some("claude-3-5-sonnet-20241022".to_string()),
            rate_per_sec: 1.0,
            burst: 4,
        };
        let client = create_llm_client(&settings).unwrap();
        assert_eq!(client.model_name(), "claude-3-5-sonnet-20241022");
        assert_eq!(client.provider_name(), "Anthropic");
    }

    #[test]
    fn test_invalid_rate_is_rejected() {
        let settings = ClientSettings {
            api_key: "test-key".to_string(),
            model: None,
            rate_per_sec: -1.0,
            burst: 4,
        };
        assert!(create_llm_client(&settings).is_err());
    }
}
