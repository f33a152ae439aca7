//! Workflow audit trail
//!
//! Every step of a word's workflow can be recorded with a snapshot of its
//! state. Logging is fire-and-forget: a failing audit sink is reported with
//! `tracing::warn!` and never affects resolution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::WorkflowState;

/// Steps recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Begin,
    BeginVetting,
    MatchedCandidate,
    NoCandidateMatched,
    BeginDetermination,
    DeterminationAccepted,
    DeterminationFailed,
    NoAssociationFound,
    RecordedAssociation,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Begin => "Begin",
            AuditAction::BeginVetting => "Begin Vet Association Candidates",
            AuditAction::MatchedCandidate => "Matched Association Candidate",
            AuditAction::NoCandidateMatched => "No Association Candidates Matched",
            AuditAction::BeginDetermination => "Begin Determination",
            AuditAction::DeterminationAccepted => "Determination Accepted",
            AuditAction::DeterminationFailed => "Determination Failed",
            AuditAction::NoAssociationFound => "No Association Found",
            AuditAction::RecordedAssociation => "Recorded Association",
        }
    }
}

/// One recorded audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub word: String,
    pub location_ref: String,
    pub snapshot: serde_json::Value,
    pub logged_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn capture(action: AuditAction, state: &WorkflowState) -> Self {
        let snapshot = serde_json::to_value(state).unwrap_or_else(|e| {
            warn!(word = %state.word, error = %e, "Failed to snapshot workflow state");
            serde_json::Value::Null
        });
        Self {
            action,
            word: state.word.clone(),
            location_ref: state.location_ref.clone(),
            snapshot,
            logged_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record a workflow step; never fails the caller
    async fn log(&self, action: AuditAction, state: &WorkflowState);

    async fn clear(&self) -> Result<()>;
}

/// Audit sink that emits one structured tracing event per step
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn log(&self, action: AuditAction, state: &WorkflowState) {
        info!(
            target: "lexicon_resolver::audit",
            action = action.as_str(),
            word = %state.word,
            location_ref = %state.location_ref,
            cached_candidates = state.cached_candidates.len(),
            selected = ?state.selected_association,
            turns = state.conversation.len(),
            "workflow step"
        );
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory audit trail, for tests and inspection
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }

    /// Actions logged for one word, in order
    pub async fn actions_for(&self, word: &str) -> Vec<AuditAction> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.word == word)
            .map(|e| e.action)
            .collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn log(&self, action: AuditAction, state: &WorkflowState) {
        let entry = AuditEntry::capture(action, state);
        self.entries.lock().await.push(entry);
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_audit_log_records_snapshots() {
        let log = MemoryAuditLog::new();
        let state = WorkflowState::new("שלום", "שלום עליכם", "Berakhot 2a:1", vec![]);
        log.log(AuditAction::Begin, &state).await;
        log.log(AuditAction::BeginDetermination, &state).await;

        let entries = log.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].snapshot["word"], "שלום");
        assert_eq!(
            log.actions_for("שלום").await,
            vec![AuditAction::Begin, AuditAction::BeginDetermination]
        );

        log.clear().await.unwrap();
        assert!(log.entries().await.is_empty());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(
            AuditAction::NoCandidateMatched.as_str(),
            "No Association Candidates Matched"
        );
    }
}
