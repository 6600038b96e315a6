//! The assistant reply schema — the fixed JSON shape the model must produce.
//!
//! The provider returns one JSON object per turn. Parsing is strict on
//! the required narrative fields; list fields tolerate omission (an
//! absent list is an empty list, and the safety validator treats empty
//! red-flags as a finding rather than a parse failure).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::issue::{IssueSeverity, IssueStatus};

/// Reply-schema validation failure — fatal for the attempt that produced it.
#[derive(Debug, Error)]
pub enum ReplyParseError {
    /// The body was not valid JSON or did not match the schema.
    #[error("reply does not match schema: {0}")]
    Schema(#[from] serde_json::Error),
    /// A structurally valid reply with an empty required narrative field.
    #[error("reply field `{0}` is empty")]
    EmptyField(&'static str),
}

/// Instruction action on a tracked issue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueAction {
    /// Start tracking a new concern.
    Create,
    /// Mutate an existing issue.
    Update,
    /// Mark an existing issue resolved.
    Resolve,
    /// No issue change for this turn.
    #[default]
    None,
}

/// One issue-update instruction embedded in a reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedIssueUpdate {
    /// What to do.
    pub action: IssueAction,
    /// Target issue for `update`/`resolve`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    /// Issue label (used for creation and similarity matching).
    pub label: String,
    /// Status to apply.
    pub status: IssueStatus,
    /// Severity to apply.
    pub severity: IssueSeverity,
    /// Why the model suggests this change.
    pub reason: String,
}

/// The full structured reply for one conversation turn.
///
/// `reflection` is the user-facing summary; `recommendations` is the
/// next-steps list; `red_flags` is the warning-signs list the safety
/// validator requires to be non-empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    /// Empathetic restatement of the concern — the reply summary.
    pub reflection: String,
    /// Plain-language interpretation of what might be going on.
    pub interpretation: String,
    /// General guidance points.
    #[serde(default)]
    pub guidance: Vec<String>,
    /// Warning signs that should prompt immediate care.
    #[serde(default)]
    pub red_flags: Vec<String>,
    /// Follow-up question to keep the thread going.
    pub follow_up: String,
    /// Concrete next steps.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Issue-tracking instructions for the memory update.
    #[serde(default)]
    pub suggested_issue_updates: Vec<SuggestedIssueUpdate>,
}

impl AssistantReply {
    /// Parse and validate a raw provider body.
    pub fn from_json(body: &str) -> Result<Self, ReplyParseError> {
        let reply: Self = serde_json::from_str(body)?;
        reply.check_required()?;
        Ok(reply)
    }

    /// Parse and validate an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ReplyParseError> {
        let reply: Self = serde_json::from_value(value)?;
        reply.check_required()?;
        Ok(reply)
    }

    fn check_required(&self) -> Result<(), ReplyParseError> {
        if self.reflection.trim().is_empty() {
            return Err(ReplyParseError::EmptyField("reflection"));
        }
        if self.interpretation.trim().is_empty() {
            return Err(ReplyParseError::EmptyField("interpretation"));
        }
        Ok(())
    }

    /// All user-visible text concatenated, lowercased — the haystack the
    /// safety validator scans for denylisted phrases.
    #[must_use]
    pub fn scan_text(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.reflection, &self.interpretation, &self.follow_up];
        parts.extend(self.guidance.iter().map(String::as_str));
        parts.extend(self.red_flags.iter().map(String::as_str));
        parts.extend(self.recommendations.iter().map(String::as_str));
        parts.join("\n").to_lowercase()
    }

    /// Compact metadata snapshot stored with the conversation event.
    #[must_use]
    pub fn event_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "reflection": self.reflection,
            "interpretation": self.interpretation,
            "redFlagCount": self.red_flags.len(),
            "recommendationCount": self.recommendations.len(),
            "issueUpdateCount": self.suggested_issue_updates.len(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
