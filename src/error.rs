//! Error handling for the resolution engine
//!
//! Protocol violations by the oracle (hallucinated entries, combined terminal
//! calls) are routine state-machine transitions and never surface here; these
//! types cover what a word workflow cannot recover from locally.

use thiserror::Error;

use crate::models::LexiconReference;

/// Main error type for the resolver
#[derive(Error, Debug)]
pub enum ResolverError {
    /// A cached reference no longer resolves against the lexicon
    #[error("Stale lexicon reference {reference}")]
    StaleReference { reference: LexiconReference },

    #[error("Determination for '{word}' did not converge within {turns} turns")]
    TurnCeilingExceeded { word: String, turns: usize },

    #[error("Upstream service '{service}' failed: {message}")]
    Upstream { service: String, message: String },

    #[error("Oracle call failed: {0}")]
    Oracle(#[from] anyhow::Error),

    #[error("Cache invariant violated for '{word}': {message}")]
    CacheInvariant { word: String, message: String },

    #[error("Refusing to record an empty entry set for '{word}' as a confirmed association")]
    EmptyAssociation { word: String },

    #[error("Missing location ref while recording '{word}'")]
    MissingLocation { word: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A word task panicked or was cancelled
    #[error("Word task for '{word}' aborted: {message}")]
    TaskAborted { word: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResolverError {
    pub fn upstream(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ResolverError::Upstream {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Short machine-readable kind, used in segment reports and audit rows
    pub fn kind(&self) -> &'static str {
        match self {
            ResolverError::StaleReference { .. } => "stale_reference",
            ResolverError::TurnCeilingExceeded { .. } => "turn_ceiling_exceeded",
            ResolverError::Upstream { .. } => "upstream",
            ResolverError::Oracle(_) => "oracle",
            ResolverError::CacheInvariant { .. } => "cache_invariant",
            ResolverError::EmptyAssociation { .. } => "empty_association",
            ResolverError::MissingLocation { .. } => "missing_location",
            ResolverError::Config(_) => "config",
            ResolverError::TaskAborted { .. } => "task_aborted",
            ResolverError::Serialization(_) => "serialization",
            #[cfg(feature = "database")]
            ResolverError::Database(_) => "database",
        }
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(error: reqwest::Error) -> Self {
        let service = error
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("http")
            .to_string();
        ResolverError::Upstream {
            service,
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_ceiling_message() {
        let err = ResolverError::TurnCeilingExceeded {
            word: "שלום".to_string(),
            turns: 12,
        };
        assert_eq!(
            err.to_string(),
            "Determination for 'שלום' did not converge within 12 turns"
        );
        assert_eq!(err.kind(), "turn_ceiling_exceeded");
    }

    #[test]
    fn test_anyhow_converts_to_oracle_error() {
        let err: ResolverError = anyhow::anyhow!("rate limited").into();
        assert_eq!(err.kind(), "oracle");
    }
}
