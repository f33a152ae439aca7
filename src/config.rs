//! Resolver configuration
//!
//! Loaded from environment variables; every setting except the API key has a
//! default.

use std::str::FromStr;

use resolver_agentic::ClientSettings;

use crate::error::{ResolverError, Result};

pub const DEFAULT_LEXICON_API_BASE: &str = "https://www.sefaria.org";
pub const DEFAULT_RATE_PER_SEC: f64 = 1.0;
pub const DEFAULT_RATE_BURST: u32 = 5;
pub const DEFAULT_MAX_TURNS: usize = 12;

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub anthropic_api_key: String,
    pub anthropic_model: Option<String>,
    /// Sustained oracle requests per second, shared by all word tasks
    pub rate_per_sec: f64,
    pub rate_burst: u32,
    /// Model turns allowed per determination before the word fails
    pub max_turns: usize,
    pub lexicon_api_base: String,
    pub database_url: Option<String>,
}

impl ResolverConfig {
    /// Create config with an explicit API key and defaults elsewhere
    pub fn new(anthropic_api_key: impl Into<String>) -> Self {
        Self {
            anthropic_api_key: anthropic_api_key.into(),
            anthropic_model: None,
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            rate_burst: DEFAULT_RATE_BURST,
            max_turns: DEFAULT_MAX_TURNS,
            lexicon_api_base: DEFAULT_LEXICON_API_BASE.to_string(),
            database_url: None,
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ResolverError::Config("ANTHROPIC_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        config.anthropic_model = lookup("ANTHROPIC_MODEL");
        if let Some(rate) = parse_var(&lookup, "RESOLVER_RATE_PER_SEC")? {
            config.rate_per_sec = rate;
        }
        if let Some(burst) = parse_var(&lookup, "RESOLVER_RATE_BURST")? {
            config.rate_burst = burst;
        }
        if let Some(turns) = parse_var(&lookup, "RESOLVER_MAX_TURNS")? {
            config.max_turns = turns;
        }
        if let Some(base) = lookup("LEXICON_API_BASE") {
            config.lexicon_api_base = base.trim_end_matches('/').to_string();
        }
        config.database_url = lookup("DATABASE_URL");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rate_per_sec.is_finite() && self.rate_per_sec > 0.0) {
            return Err(ResolverError::Config(format!(
                "RESOLVER_RATE_PER_SEC must be positive, got {}",
                self.rate_per_sec
            )));
        }
        if self.rate_burst == 0 {
            return Err(ResolverError::Config(
                "RESOLVER_RATE_BURST must be at least 1".to_string(),
            ));
        }
        if self.max_turns == 0 {
            return Err(ResolverError::Config(
                "RESOLVER_MAX_TURNS must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.lexicon_api_base).map_err(|e| {
            ResolverError::Config(format!(
                "LEXICON_API_BASE '{}' is not a valid URL: {}",
                self.lexicon_api_base, e
            ))
        })?;
        Ok(())
    }

    /// Settings for the shared oracle client
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_key: self.anthropic_api_key.clone(),
            model: self.anthropic_model.clone(),
            rate_per_sec: self.rate_per_sec,
            burst: self.rate_burst,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ResolverError::Config(format!("{} = '{}': {}", key, raw, e))),
    }
}
