//! Active-issue types — the tracked, possibly-recurring health concerns.
//!
//! - [`ActiveIssue`]: one tracked concern per subject with a lifecycle status
//! - [`IssueStatus`] / [`IssueSeverity`]: the lifecycle and priority enums
//! - [`IssueHistory`]: append-only audit row for each status/severity change

use serde::{Deserialize, Serialize};

/// Reason string written when the sweep resolves a stale issue.
pub const REASON_STALE_RESOLVED: &str = "no mention in 30 days";

/// Reason string written when the sweep reactivates a recurring issue.
pub const REASON_RECURRENCE: &str = "symptom recurrence";

/// Days of silence after which an `active` issue auto-resolves.
pub const STALE_RESOLVE_DAYS: i64 = 30;

/// A mention within this many days flips an `improving` issue back to `active`.
pub const RECURRENCE_DAYS: i64 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Status / severity
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle status of an [`ActiveIssue`].
///
/// Resolution is a status, never a deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    /// Currently affecting the subject.
    Active,
    /// Reported as getting better.
    Improving,
    /// Watched but not acute.
    Monitoring,
    /// No longer tracked as open.
    Resolved,
}

impl IssueStatus {
    /// Stable string form used in SQL filters and history rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Improving => "improving",
            Self::Monitoring => "monitoring",
            Self::Resolved => "resolved",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "improving" => Some(Self::Improving),
            "monitoring" => Some(Self::Monitoring),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Whether the issue still counts as open.
    #[must_use]
    pub fn is_open(self) -> bool {
        self != Self::Resolved
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity ranking used to prioritize which issues surface in context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Low impact.
    Mild,
    /// Noticeable impact.
    Moderate,
    /// High impact — always surfaces first.
    Severe,
}

impl IssueSeverity {
    /// Stable string form used in SQL filters and history rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mild" => Some(Self::Mild),
            "moderate" => Some(Self::Moderate),
            "severe" => Some(Self::Severe),
            _ => None,
        }
    }

    /// Numeric rank for ordering: severe (3) > moderate (2) > mild (1).
    #[must_use]
    pub fn rank(self) -> i64 {
        match self {
            Self::Mild => 1,
            Self::Moderate => 2,
            Self::Severe => 3,
        }
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ActiveIssue
// ─────────────────────────────────────────────────────────────────────────────

/// A tracked health concern for one subject.
///
/// INVARIANT: at most one semantically similar non-resolved issue per
/// subject — reconciliation merges near-duplicates instead of creating
/// new rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIssue {
    /// Issue ID (`iss_…`).
    pub id: String,
    /// Owning subject.
    pub subject_id: String,
    /// Free-text label, e.g. "Headaches".
    pub label: String,
    /// Lifecycle status.
    pub status: IssueStatus,
    /// Severity ranking.
    pub severity: IssueSeverity,
    /// ISO 8601 first-report time.
    pub first_reported_at: String,
    /// ISO 8601 time of the most recent mention.
    pub last_mentioned_at: String,
    /// Free-text notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// IssueHistory
// ─────────────────────────────────────────────────────────────────────────────

/// Audit row recording one status/severity transition of an issue.
///
/// Append-only; auto-transitions write rows like any other change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueHistory {
    /// History row ID (`hist_…`).
    pub id: String,
    /// Issue this transition belongs to.
    pub issue_id: String,
    /// Status before the change.
    pub old_status: IssueStatus,
    /// Status after the change.
    pub new_status: IssueStatus,
    /// Severity before the change.
    pub old_severity: IssueSeverity,
    /// Severity after the change.
    pub new_severity: IssueSeverity,
    /// Why the transition happened.
    pub reason: String,
    /// ISO 8601 change time.
    pub changed_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
