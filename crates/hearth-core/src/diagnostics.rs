//! [`Diagnostic`] — structured outcomes for best-effort steps.
//!
//! Memory update and insight detection must never fail the
//! user-visible response path, but their failures must not vanish
//! either. Each best-effort step returns `Result<T, Diagnostic>`; the
//! caller logs the diagnostics and tests can assert on them.

use serde::{Deserialize, Serialize};

/// A recorded failure (or notable skip) from a best-effort step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// The step that produced this, e.g. `"memory_update.event_log"`.
    pub step: String,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Subject the step was running for, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    /// Whether retrying the step could succeed.
    pub retryable: bool,
}

impl Diagnostic {
    /// Build a diagnostic for a step failure.
    #[must_use]
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            subject_id: None,
            retryable: false,
        }
    }

    /// Attach the subject the step was running for.
    #[must_use]
    pub fn for_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Mark the failure as retryable (e.g. a busy storage layer).
    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.step, self.message)
    }
}

/// Log a batch of diagnostics at warn level.
pub fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        tracing::warn!(
            step = %diag.step,
            subject_id = diag.subject_id.as_deref().unwrap_or("-"),
            retryable = diag.retryable,
            "{}",
            diag.message
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
