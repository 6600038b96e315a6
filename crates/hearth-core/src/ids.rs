//! Prefixed entity ID constructors.
//!
//! Every persisted entity carries a string ID of the form
//! `<prefix>_<uuid-v7>`. The prefix makes IDs self-describing in logs
//! and the v7 timestamp component keeps index insertion ordered.

use uuid::Uuid;

/// Build a prefixed UUID v7 ID string.
#[must_use]
pub fn new_prefixed(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7())
}

/// New subject (profile) ID: `sub_…`.
#[must_use]
pub fn subject_id() -> String {
    new_prefixed("sub")
}

/// New active-issue ID: `iss_…`.
#[must_use]
pub fn issue_id() -> String {
    new_prefixed("iss")
}

/// New event-memory ID: `evt_…`.
#[must_use]
pub fn event_id() -> String {
    new_prefixed("evt")
}

/// New insight ID: `ins_…`.
#[must_use]
pub fn insight_id() -> String {
    new_prefixed("ins")
}

/// New issue-history ID: `hist_…`.
#[must_use]
pub fn history_id() -> String {
    new_prefixed("hist")
}

/// New conversation ID: `conv_…`.
#[must_use]
pub fn conversation_id() -> String {
    new_prefixed("conv")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
