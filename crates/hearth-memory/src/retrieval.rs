//! Context-bundle retrieval.
//!
//! Before each model call the orchestrator asks for a [`ContextBundle`]:
//! the subject's top open issues, most recent events, and strongest
//! insights. The three slices are fetched concurrently, and each slice
//! degrades to empty on failure instead of failing the conversation. A
//! degraded slice is logged at warn level and counted in the
//! `hearth_retrieval_slice_degraded_total` metric, so silent context
//! loss is visible in telemetry and tests.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{instrument, warn};

use hearth_core::event::EventMemory;
use hearth_core::insight::Insight;
use hearth_core::issue::{ActiveIssue, IssueStatus};
use hearth_store::MemoryStore;

/// Issues surfaced per bundle: the two highest-priority in
/// `active`/`monitoring`.
pub const ISSUE_SLICE_LIMIT: u32 = 2;

/// Events surfaced per bundle, newest first.
pub const EVENT_SLICE_LIMIT: u32 = 3;

/// Insights surfaced per bundle, highest confidence first.
pub const INSIGHT_SLICE_LIMIT: u32 = 2;

/// Everything the model is told about a subject for one turn.
///
/// An empty bundle (new subject, or every slice degraded) is valid
/// input to the prompt builder.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    /// Top open issues, severity-then-recency ordered.
    pub active_issues: Vec<ActiveIssue>,
    /// Most recent events, newest first.
    pub recent_events: Vec<EventMemory>,
    /// Highest-confidence insights.
    pub insights: Vec<Insight>,
}

impl ContextBundle {
    /// Whether no slice produced anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active_issues.is_empty() && self.recent_events.is_empty() && self.insights.is_empty()
    }
}

/// Assembles [`ContextBundle`]s from the store.
pub struct MemoryRetriever {
    store: Arc<MemoryStore>,
}

impl MemoryRetriever {
    /// New retriever over a shared store.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Fetch all three slices concurrently.
    ///
    /// This never fails: a slice whose query errors comes back empty.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, subject_id: &str) -> ContextBundle {
        let issues = {
            let store = Arc::clone(&self.store);
            let subject = subject_id.to_string();
            tokio::task::spawn_blocking(move || {
                store.list_issues_by_status(
                    &subject,
                    &[IssueStatus::Active, IssueStatus::Monitoring],
                    Some(ISSUE_SLICE_LIMIT),
                )
            })
        };
        let events = {
            let store = Arc::clone(&self.store);
            let subject = subject_id.to_string();
            tokio::task::spawn_blocking(move || store.recent_events(&subject, EVENT_SLICE_LIMIT))
        };
        let insights = {
            let store = Arc::clone(&self.store);
            let subject = subject_id.to_string();
            tokio::task::spawn_blocking(move || store.top_insights(&subject, INSIGHT_SLICE_LIMIT))
        };

        let (issues, events, insights) = tokio::join!(issues, events, insights);

        ContextBundle {
            active_issues: unwrap_slice("active_issues", subject_id, issues),
            recent_events: unwrap_slice("recent_events", subject_id, events),
            insights: unwrap_slice("insights", subject_id, insights),
        }
    }
}

/// Collapse a joined slice result, degrading failures to empty.
fn unwrap_slice<T>(
    slice: &'static str,
    subject_id: &str,
    joined: Result<hearth_store::Result<Vec<T>>, JoinError>,
) -> Vec<T> {
    let outcome = match joined {
        Ok(inner) => inner.map_err(|err| err.to_string()),
        Err(err) => Err(format!("slice task panicked or was cancelled: {err}")),
    };
    match outcome {
        Ok(items) => items,
        Err(message) => {
            warn!(slice, subject_id, %message, "context slice degraded to empty");
            counter!("hearth_retrieval_slice_degraded_total", "slice" => slice).increment(1);
            Vec::new()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::event::EventKind;
    use hearth_core::issue::IssueSeverity;
    use hearth_core::time::days_ago_rfc3339;
    use hearth_store::{CreateEventOptions, CreateInsightOptions, CreateIssueOptions, StoreError};
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let subject = store.create_subject("Maya").unwrap();
        (store, subject.id)
    }

    fn seed_issue(
        store: &MemoryStore,
        subject_id: &str,
        label: &str,
        status: IssueStatus,
        severity: IssueSeverity,
    ) -> ActiveIssue {
        store
            .create_issue(&CreateIssueOptions {
                subject_id,
                label,
                status,
                severity,
                notes: None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn empty_subject_yields_empty_bundle() {
        let (store, subject_id) = setup();
        let retriever = MemoryRetriever::new(store);
        let bundle = retriever.retrieve(&subject_id).await;
        assert!(bundle.is_empty());
    }

    #[tokio::test]
    async fn issue_slice_takes_top_two_open_by_priority() {
        let (store, subject_id) = setup();
        seed_issue(
            &store,
            &subject_id,
            "Mild rash",
            IssueStatus::Active,
            IssueSeverity::Mild,
        );
        let severe = seed_issue(
            &store,
            &subject_id,
            "Migraines",
            IssueStatus::Active,
            IssueSeverity::Severe,
        );
        let monitored = seed_issue(
            &store,
            &subject_id,
            "Sleep quality",
            IssueStatus::Monitoring,
            IssueSeverity::Moderate,
        );
        // Improving and resolved issues stay out of the bundle.
        seed_issue(
            &store,
            &subject_id,
            "Cough",
            IssueStatus::Improving,
            IssueSeverity::Severe,
        );
        seed_issue(
            &store,
            &subject_id,
            "Old sprain",
            IssueStatus::Resolved,
            IssueSeverity::Severe,
        );

        let retriever = MemoryRetriever::new(store);
        let bundle = retriever.retrieve(&subject_id).await;

        assert_eq!(bundle.active_issues.len(), 2);
        assert_eq!(bundle.active_issues[0].id, severe.id);
        assert_eq!(bundle.active_issues[1].id, monitored.id);
    }

    #[tokio::test]
    async fn event_slice_is_three_newest() {
        let (store, subject_id) = setup();
        for day in (0..5).rev() {
            let occurred = days_ago_rfc3339(day);
            let _ = store
                .record_event(&CreateEventOptions {
                    subject_id: &subject_id,
                    kind: EventKind::Conversation,
                    description: &format!("day {day} check-in"),
                    metadata: json!({}),
                    occurred_at: Some(&occurred),
                })
                .unwrap();
        }

        let retriever = MemoryRetriever::new(store);
        let bundle = retriever.retrieve(&subject_id).await;

        assert_eq!(bundle.recent_events.len(), 3);
        assert_eq!(bundle.recent_events[0].description, "day 0 check-in");
        assert_eq!(bundle.recent_events[2].description, "day 2 check-in");
    }

    #[tokio::test]
    async fn insight_slice_is_top_two_by_confidence() {
        let (store, subject_id) = setup();
        for (text, confidence) in [
            ("Hydration dips on busy weekdays for this family", 0.4),
            ("Short sleep tracks with low-energy reports", 0.9),
            ("Evening screen time precedes restless nights", 0.7),
        ] {
            let _ = store
                .record_insight(&CreateInsightOptions {
                    subject_id: &subject_id,
                    text,
                    confidence,
                    related_issue_id: None,
                })
                .unwrap();
        }

        let retriever = MemoryRetriever::new(store);
        let bundle = retriever.retrieve(&subject_id).await;

        assert_eq!(bundle.insights.len(), 2);
        assert!(bundle.insights[0].text.starts_with("Short sleep"));
        assert!(bundle.insights[1].text.starts_with("Evening screen"));
    }

    #[test]
    fn failed_slice_degrades_to_empty() {
        let joined: Result<hearth_store::Result<Vec<ActiveIssue>>, JoinError> =
            Ok(Err(StoreError::Internal("boom".into())));
        let items = unwrap_slice("active_issues", "sub_x", joined);
        assert!(items.is_empty());
    }
}
