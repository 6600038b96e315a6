//! Conversation row and the per-conversation phase machine.
//!
//! A conversation advances `received → context_retrieved → model_called
//! → validated → persisted`; a provider or schema failure lands in
//! `failed`. Phases are persisted on every transition so no terminal
//! failure is silent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Processing phase of a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// Job accepted, nothing done yet.
    Received,
    /// Context bundle assembled.
    ContextRetrieved,
    /// Model provider returned a reply.
    ModelCalled,
    /// Safety validation complete.
    Validated,
    /// Memory update finished; terminal success.
    Persisted,
    /// Terminal failure — a fallback reply was substituted.
    Failed,
}

impl ConversationPhase {
    /// Stable string form used in SQL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::ContextRetrieved => "context_retrieved",
            Self::ModelCalled => "model_called",
            Self::Validated => "validated",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "received" => Some(Self::Received),
            "context_retrieved" => Some(Self::ContextRetrieved),
            "model_called" => Some(Self::ModelCalled),
            "validated" => Some(Self::Validated),
            "persisted" => Some(Self::Persisted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this phase ends processing.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user turn moving through the orchestrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID (`conv_…`).
    pub id: String,
    /// Owning subject.
    pub subject_id: String,
    /// What the user said or typed.
    pub user_text: String,
    /// The reply JSON, once produced (model output or fallback).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
    /// Current processing phase.
    pub phase: ConversationPhase,
    /// ISO 8601 creation time.
    pub created_at: String,
    /// ISO 8601 last phase-change time.
    pub updated_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
