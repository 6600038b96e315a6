//! Post-reply memory update.
//!
//! After a reply is produced the orchestrator hands it here. Three
//! steps run in order, each best-effort: event logging, issue
//! reconciliation, and the temporal auto-transition sweep. A failing
//! step records a [`Diagnostic`] and the next step still runs — nothing
//! in this module may fail the user-visible response path.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use hearth_core::diagnostics::Diagnostic;
use hearth_core::event::EventKind;
use hearth_core::issue::{
    ActiveIssue, IssueStatus, RECURRENCE_DAYS, REASON_RECURRENCE, REASON_STALE_RESOLVED,
    STALE_RESOLVE_DAYS,
};
use hearth_core::reply::{AssistantReply, IssueAction, SuggestedIssueUpdate};
use hearth_core::time::{older_than_days, within_days};
use hearth_store::{
    CreateEventOptions, CreateHistoryOptions, CreateIssueOptions, IssueChanges, MemoryStore,
};

use crate::retrieval::ContextBundle;

/// Statuses searched when reconciling a `create` instruction against
/// existing issues.
const RECONCILE_STATUSES: &[IssueStatus] = &[
    IssueStatus::Active,
    IssueStatus::Monitoring,
    IssueStatus::Improving,
];

/// Applies post-reply writes to the store.
pub struct MemoryUpdater {
    store: Arc<MemoryStore>,
}

impl MemoryUpdater {
    /// New updater over a shared store.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Run all three update steps. Returns every diagnostic produced;
    /// an empty vec means a fully clean pass.
    #[instrument(skip(self, user_text, reply, prior))]
    pub fn update(
        &self,
        subject_id: &str,
        user_text: &str,
        reply: &AssistantReply,
        prior: &ContextBundle,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if let Err(diag) = self.log_conversation_event(subject_id, user_text, reply) {
            diagnostics.push(diag);
        }

        for instruction in &reply.suggested_issue_updates {
            if let Err(diag) = self.reconcile(subject_id, instruction, prior) {
                diagnostics.push(diag);
            }
        }

        match self.sweep_auto_transitions(subject_id) {
            Ok(transitions) if transitions > 0 => {
                debug!(subject_id, transitions, "auto-transition sweep applied");
            }
            Ok(_) => {}
            Err(diag) => diagnostics.push(diag),
        }

        diagnostics
    }

    /// Step 1: append the conversation turn to the event log.
    fn log_conversation_event(
        &self,
        subject_id: &str,
        user_text: &str,
        reply: &AssistantReply,
    ) -> Result<(), Diagnostic> {
        self.store
            .record_event(&CreateEventOptions {
                subject_id,
                kind: EventKind::Conversation,
                description: user_text,
                metadata: reply.event_snapshot(),
                occurred_at: None,
            })
            .map(|_| ())
            .map_err(|err| {
                let diag = Diagnostic::new("memory_update.event_log", err.to_string())
                    .for_subject(subject_id);
                if err.is_retryable() { diag.retryable() } else { diag }
            })
    }

    /// Step 2: apply one issue instruction from the reply.
    ///
    /// A `create` that matches an existing open issue becomes an
    /// `update` against that issue instead of a duplicate row.
    fn reconcile(
        &self,
        subject_id: &str,
        instruction: &SuggestedIssueUpdate,
        prior: &ContextBundle,
    ) -> Result<(), Diagnostic> {
        let step = "memory_update.reconcile";
        let diag = |message: String| Diagnostic::new(step, message).for_subject(subject_id);

        match instruction.action {
            IssueAction::None => Ok(()),
            IssueAction::Create => {
                let existing = self
                    .find_similar(subject_id, &instruction.label, prior)
                    .map_err(|err| diag(err.to_string()))?;
                match existing {
                    Some(issue) => {
                        debug!(
                            subject_id,
                            issue_id = %issue.id,
                            label = %instruction.label,
                            "create reconciled onto similar existing issue"
                        );
                        self.apply_change(&issue, instruction, instruction.status)
                            .map_err(|err| diag(err.to_string()))
                    }
                    None => self
                        .store
                        .create_issue(&CreateIssueOptions {
                            subject_id,
                            label: &instruction.label,
                            status: instruction.status,
                            severity: instruction.severity,
                            notes: Some(&instruction.reason),
                        })
                        .map(|_| ())
                        .map_err(|err| diag(err.to_string())),
                }
            }
            IssueAction::Update | IssueAction::Resolve => {
                let Some(issue_id) = instruction.issue_id.as_deref() else {
                    return Err(diag(format!(
                        "{:?} instruction for \"{}\" carries no issue id",
                        instruction.action, instruction.label
                    )));
                };
                let issue = self
                    .store
                    .require_issue(issue_id)
                    .map_err(|err| diag(err.to_string()))?;
                let new_status = if instruction.action == IssueAction::Resolve {
                    IssueStatus::Resolved
                } else {
                    instruction.status
                };
                self.apply_change(&issue, instruction, new_status)
                    .map_err(|err| diag(err.to_string()))
            }
        }
    }

    /// Mutate one issue row, writing a history row first when status or
    /// severity changes. Last-mentioned is always refreshed.
    fn apply_change(
        &self,
        issue: &ActiveIssue,
        instruction: &SuggestedIssueUpdate,
        new_status: IssueStatus,
    ) -> hearth_store::Result<()> {
        let new_severity = instruction.severity;
        if new_status != issue.status || new_severity != issue.severity {
            let _ = self.store.record_history(&CreateHistoryOptions {
                issue_id: &issue.id,
                old_status: issue.status,
                new_status,
                old_severity: issue.severity,
                new_severity,
                reason: &instruction.reason,
            })?;
        }
        let _ = self.store.update_issue(
            &issue.id,
            &IssueChanges {
                status: Some(new_status),
                severity: Some(new_severity),
                notes: None,
            },
        )?;
        Ok(())
    }

    /// Step 3: temporal auto-transition sweep over every open issue.
    ///
    /// - `active` with no mention in over [`STALE_RESOLVE_DAYS`] days
    ///   resolves with reason [`REASON_STALE_RESOLVED`]
    /// - `improving` mentioned within [`RECURRENCE_DAYS`] days flips
    ///   back to `active` with reason [`REASON_RECURRENCE`]
    ///
    /// Transitions change status only, so a second sweep with no new
    /// mentions finds nothing to do. Returns the transition count.
    pub fn sweep_auto_transitions(&self, subject_id: &str) -> Result<u32, Diagnostic> {
        let step = "memory_update.sweep";
        let diag = |message: String| Diagnostic::new(step, message).for_subject(subject_id);

        let open = self
            .store
            .list_open_issues(subject_id)
            .map_err(|err| diag(err.to_string()))?;

        let mut transitions = 0u32;
        for issue in open {
            // Unparseable timestamps (None) leave the row ineligible.
            let target = match issue.status {
                IssueStatus::Active
                    if older_than_days(&issue.last_mentioned_at, STALE_RESOLVE_DAYS)
                        == Some(true) =>
                {
                    Some((IssueStatus::Resolved, REASON_STALE_RESOLVED))
                }
                IssueStatus::Improving
                    if within_days(&issue.last_mentioned_at, RECURRENCE_DAYS) == Some(true) =>
                {
                    Some((IssueStatus::Active, REASON_RECURRENCE))
                }
                _ => None,
            };
            let Some((new_status, reason)) = target else {
                continue;
            };

            let _ = self
                .store
                .record_history(&CreateHistoryOptions {
                    issue_id: &issue.id,
                    old_status: issue.status,
                    new_status,
                    old_severity: issue.severity,
                    new_severity: issue.severity,
                    reason,
                })
                .map_err(|err| diag(err.to_string()))?;
            let _ = self
                .store
                .set_issue_status(&issue.id, new_status)
                .map_err(|err| diag(err.to_string()))?;
            transitions += 1;
        }
        Ok(transitions)
    }

    /// Find an open issue semantically similar to `label`, checking the
    /// prior context bundle before querying the store.
    fn find_similar(
        &self,
        subject_id: &str,
        label: &str,
        prior: &ContextBundle,
    ) -> hearth_store::Result<Option<ActiveIssue>> {
        if let Some(issue) = prior
            .active_issues
            .iter()
            .find(|issue| labels_similar(&issue.label, label))
        {
            return Ok(Some(issue.clone()));
        }
        let candidates = self
            .store
            .list_issues_by_status(subject_id, RECONCILE_STATUSES, None)?;
        Ok(candidates
            .into_iter()
            .find(|issue| labels_similar(&issue.label, label)))
    }
}

/// Label similarity: exact match, substring containment either way, or
/// at least two shared whitespace-delimited keywords. Case-insensitive.
fn labels_similar(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }
    let a_words: HashSet<&str> = a.split_whitespace().collect();
    let b_words: HashSet<&str> = b.split_whitespace().collect();
    a_words.intersection(&b_words).count() >= 2
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
