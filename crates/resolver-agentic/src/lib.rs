//! LLM layer for dictionary resolution
//!
//! This crate provides the oracle side of the resolver: a provider-neutral
//! client trait with multi-turn tool use, the Anthropic implementation, and a
//! shared token-bucket rate limiter. It has no storage dependencies - cache
//! and persistence stay in `lexicon-resolver`.
//!
//! ## Architecture
//!
//! ```text
//! resolver task → RateLimitedClient (TokenBucket) → AnthropicClient → Messages API
//! ```

pub mod anthropic_client;
pub mod client_factory;
pub mod llm_client;
pub mod rate_limit;

pub use client_factory::{create_llm_client, ClientSettings};
pub use llm_client::{
    AssistantTurn, ChatMessage, ContentBlock, LlmClient, Role, ToolCallResult, ToolDefinition,
    ToolUse,
};
pub use rate_limit::{RateLimitedClient, TokenBucket};
