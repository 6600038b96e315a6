//! The [`Insight`] struct — derived, confidence-scored observations.

use serde::{Deserialize, Serialize};

/// Leading-substring length used for insight de-duplication.
///
/// A new insight whose first [`DEDUP_PREFIX_LEN`] characters appear in
/// an existing insight (or vice versa) is dropped rather than inserted.
/// Documented limitation: this can suppress legitimately new insights
/// that share a prefix and miss duplicates phrased differently.
pub const DEDUP_PREFIX_LEN: usize = 20;

/// A derived natural-language observation about a subject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Insight ID (`ins_…`).
    pub id: String,
    /// Owning subject.
    pub subject_id: String,
    /// The observation, user-readable.
    pub text: String,
    /// Confidence score in `0.0..=1.0`.
    pub confidence: f64,
    /// Issue this insight relates to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_issue_id: Option<String>,
    /// ISO 8601 creation time.
    pub created_at: String,
    /// ISO 8601 last-update time.
    pub updated_at: String,
}

/// The comparable prefix of an insight text for de-duplication.
///
/// Character-based (not byte-based) so multi-byte text never splits a
/// code point.
#[must_use]
pub fn dedup_prefix(text: &str) -> String {
    text.chars().take(DEDUP_PREFIX_LEN).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
