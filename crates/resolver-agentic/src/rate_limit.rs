//! Process-wide rate limiting for LLM calls
//!
//! A token bucket refilled at a sustained rate with a bounded burst.
//! Callers that find the bucket empty sleep until a token is available
//! instead of failing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::llm_client::{AssistantTurn, ChatMessage, LlmClient, ToolCallResult, ToolDefinition};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by every task that calls the model
#[derive(Debug)]
pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(rate_per_sec: f64, burst: u32) -> Result<Self> {
        if !(rate_per_sec.is_finite() && rate_per_sec > 0.0) {
            return Err(anyhow!("rate_per_sec must be positive, got {}", rate_per_sec));
        }
        if burst == 0 {
            return Err(anyhow!("burst must be at least 1"));
        }
        Ok(Self {
            rate_per_sec,
            burst: f64::from(burst),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        })
    }

    /// Take one token, waiting for the bucket to refill if necessary
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate_per_sec)
            };
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available (after refill)
    pub async fn available(&self) -> f64 {
        let state = self.state.lock().await;
        let elapsed = Instant::now()
            .duration_since(state.last_refill)
            .as_secs_f64();
        (state.tokens + elapsed * self.rate_per_sec).min(self.burst)
    }
}

/// LLM client decorator that draws one bucket token per request
pub struct RateLimitedClient {
    inner: Arc<dyn LlmClient>,
    bucket: Arc<TokenBucket>,
}

impl RateLimitedClient {
    pub fn new(inner: Arc<dyn LlmClient>, bucket: Arc<TokenBucket>) -> Self {
        Self { inner, bucket }
    }
}

#[async_trait]
impl LlmClient for RateLimitedClient {
    async fn chat_with_tool(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tool: &ToolDefinition,
    ) -> Result<ToolCallResult> {
        self.bucket.acquire().await;
        self.inner
            .chat_with_tool(system_prompt, user_prompt, tool)
            .await
    }

    async fn converse(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn> {
        self.bucket.acquire().await;
        self.inner.converse(system_prompt, messages, tools).await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(TokenBucket::new(0.0, 1).is_err());
        assert!(TokenBucket::new(f64::NAN, 1).is_err());
        assert!(TokenBucket::new(1.0, 0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let bucket = TokenBucket::new(1.0, 3).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            bucket.acquire().await;
        }
        assert!(Instant::now().duration_since(start) < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill_after_burst() {
        let bucket = TokenBucket::new(2.0, 1).unwrap();
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        let elapsed = Instant::now().duration_since(start);
        // two refills at 2 tokens/sec
        assert!(elapsed >= Duration::from_millis(990), "elapsed {:?}", elapsed);
    }

    /// Records when each request reached the provider
    #[derive(Default)]
    struct Counting {
        calls: std::sync::Mutex<Vec<Instant>>,
    }

    impl Counting {
        fn record(&self) {
            self.calls.lock().unwrap().push(Instant::now());
        }
    }

    #[async_trait]
    impl LlmClient for Counting {
        async fn chat_with_tool(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            tool: &ToolDefinition,
        ) -> Result<ToolCallResult> {
            self.record();
            Ok(ToolCallResult {
                tool_name: tool.name.clone(),
                arguments: serde_json::json!({"value": true}),
            })
        }

        async fn converse(
            &self,
            _system_prompt: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<AssistantTurn> {
            self.record();
            Ok(AssistantTurn::default())
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn provider_name(&self) -> &str {
            "test"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_bucket_throttles_concurrent_callers() {
        let provider = Arc::new(Counting::default());
        let bucket = Arc::new(TokenBucket::new(1.0, 2).unwrap());
        let client: Arc<dyn LlmClient> = Arc::new(RateLimitedClient::new(provider.clone(), bucket));
        let tool = ToolDefinition {
            name: "validation_result".to_string(),
            description: "yes or no".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };

        let start = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|i| {
                let client = client.clone();
                let tool = tool.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        client.converse("system", &[], &[tool]).await.map(|_| ())
                    } else {
                        client.chat_with_tool("system", "question", &tool).await.map(|_| ())
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut offsets: Vec<Duration> = provider
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start))
            .collect();
        offsets.sort();

        assert_eq!(offsets.len(), 5);
        // burst of two goes straight through, the rest wait one refill each
        assert!(offsets[1] < Duration::from_millis(1), "offsets {:?}", offsets);
        for (n, offset) in offsets.iter().enumerate().skip(2) {
            let refills = (n - 1) as u64;
            assert!(
                *offset >= Duration::from_millis(refills * 1000 - 10),
                "call {} at {:?}",
                n,
                offset
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_burst() {
        let bucket = TokenBucket::new(10.0, 2).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(bucket.available().await <= 2.0);
    }
}
