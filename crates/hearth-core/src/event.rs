//! The [`EventMemory`] struct — the append-only observed-event log.
//!
//! Events are stored as a flat struct with base fields at the top level
//! and a `metadata` payload kept as opaque [`serde_json::Value`]. The
//! event log is the canonical source of truth for pattern detection and
//! is never mutated after insert.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind discriminator for an [`EventMemory`] row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// One conversation turn (user text + reply snapshot).
    Conversation,
    /// A recorded vital, e.g. `{"type": "sleep", "value": 6.5}`.
    Vital,
    /// A finding from an uploaded report.
    Report,
    /// A connected-device reading.
    Device,
}

impl EventKind {
    /// Stable string form used in SQL filters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Vital => "vital",
            Self::Report => "report",
            Self::Device => "device",
        }
    }

    /// Parse the stored string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "conversation" => Some(Self::Conversation),
            "vital" => Some(Self::Vital),
            "report" => Some(Self::Report),
            "device" => Some(Self::Device),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable log entry recording something that happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMemory {
    /// Event ID (`evt_…`).
    pub id: String,
    /// Owning subject.
    pub subject_id: String,
    /// Kind discriminator.
    pub kind: EventKind,
    /// Free-text description.
    pub description: String,
    /// Kind-dependent structured payload (opaque JSON).
    pub metadata: Value,
    /// ISO 8601 time the thing happened.
    pub occurred_at: String,
    /// ISO 8601 row-creation time.
    pub created_at: String,
}

impl EventMemory {
    /// Numeric `value` field from a vital event's metadata, if present.
    #[must_use]
    pub fn vital_value(&self) -> Option<f64> {
        self.metadata.get("value").and_then(Value::as_f64)
    }

    /// `type` field from a vital event's metadata, if present.
    #[must_use]
    pub fn vital_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(Value::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
