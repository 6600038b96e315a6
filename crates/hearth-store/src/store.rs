//! High-level [`MemoryStore`] facade.
//!
//! Owns the connection pool and wraps every repository operation in a
//! `SQLITE_BUSY` retry loop. This is the single persistence surface the
//! retrieval, update, detection, and orchestration components talk to —
//! they never touch a raw connection.
//!
//! Concurrent conversations for different subjects share nothing but
//! this store; concurrent updates to the same issue row are not
//! serialized here — last writer wins (documented limitation).

use std::time::Duration;

use serde_json::Value;
use tracing::instrument;

use hearth_core::conversation::{Conversation, ConversationPhase};
use hearth_core::event::{EventKind, EventMemory};
use hearth_core::insight::Insight;
use hearth_core::issue::{ActiveIssue, IssueHistory, IssueStatus};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::conversation::ConversationRepo;
use crate::sqlite::repositories::event::{CreateEventOptions, EventRepo};
use crate::sqlite::repositories::history::{CreateHistoryOptions, HistoryRepo};
use crate::sqlite::repositories::insight::{CreateInsightOptions, InsightRepo};
use crate::sqlite::repositories::issue::{CreateIssueOptions, IssueChanges, IssueRepo};
use crate::sqlite::repositories::subject::{SubjectRepo, SubjectRow};

/// Pooled, busy-retrying persistence accessor over all entities.
pub struct MemoryStore {
    pool: ConnectionPool,
}

impl MemoryStore {
    const BUSY_MAX_RETRIES: u32 = 16;

    /// Wrap an existing pool. Migrations are the caller's concern.
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open an in-memory store with migrations applied (tests, demos).
    pub fn open_in_memory() -> Result<Self> {
        let pool = crate::sqlite::connection::new_in_memory(&ConnectionConfig::default())?;
        let store = Self::new(pool);
        let _ = run_migrations(&*store.conn()?)?;
        Ok(store)
    }

    /// Open a file-backed store with migrations applied.
    pub fn open_file(path: &str) -> Result<Self> {
        let pool = crate::sqlite::connection::new_file(path, &ConnectionConfig::default())?;
        let store = Self::new(pool);
        let _ = run_migrations(&*store.conn()?)?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff
    /// plus ±25% jitter to avoid thundering-herd on a contended file.
    fn retry_on_busy<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;

        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if Self::is_busy(&err) && attempts < Self::BUSY_MAX_RETRIES => {
                    attempts += 1;
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_busy(err: &StoreError) -> bool {
        matches!(
            err,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _))
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subjects
    // ─────────────────────────────────────────────────────────────────────

    /// Create a subject profile row.
    pub fn create_subject(&self, name: &str) -> Result<SubjectRow> {
        self.retry_on_busy(|| SubjectRepo::create(&*self.conn()?, name))
    }

    /// Check whether a subject exists.
    pub fn subject_exists(&self, subject_id: &str) -> Result<bool> {
        self.retry_on_busy(|| SubjectRepo::exists(&*self.conn()?, subject_id))
    }

    /// Delete a subject and (via cascade) all of its memory rows.
    pub fn delete_subject(&self, subject_id: &str) -> Result<bool> {
        self.retry_on_busy(|| SubjectRepo::delete(&*self.conn()?, subject_id))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Active issues
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new tracked issue.
    #[instrument(skip(self, opts), fields(subject_id = opts.subject_id, label = opts.label))]
    pub fn create_issue(&self, opts: &CreateIssueOptions<'_>) -> Result<ActiveIssue> {
        self.retry_on_busy(|| IssueRepo::create(&*self.conn()?, opts))
    }

    /// Get an issue, erroring if absent.
    pub fn require_issue(&self, issue_id: &str) -> Result<ActiveIssue> {
        self.get_issue(issue_id)?
            .ok_or_else(|| StoreError::IssueNotFound(issue_id.to_string()))
    }

    /// Get an issue by ID.
    pub fn get_issue(&self, issue_id: &str) -> Result<Option<ActiveIssue>> {
        self.retry_on_busy(|| IssueRepo::get_by_id(&*self.conn()?, issue_id))
    }

    /// Apply a partial update; always refreshes `last_mentioned_at`.
    pub fn update_issue(&self, issue_id: &str, changes: &IssueChanges<'_>) -> Result<bool> {
        self.retry_on_busy(|| IssueRepo::update(&*self.conn()?, issue_id, changes))
    }

    /// Overwrite `last_mentioned_at` (test seam for temporal rules).
    pub fn set_issue_last_mentioned(&self, issue_id: &str, timestamp: &str) -> Result<bool> {
        self.retry_on_busy(|| IssueRepo::set_last_mentioned_at(&*self.conn()?, issue_id, timestamp))
    }

    /// Set an issue's status without refreshing `last_mentioned_at`.
    pub fn set_issue_status(&self, issue_id: &str, status: IssueStatus) -> Result<bool> {
        self.retry_on_busy(|| IssueRepo::set_status(&*self.conn()?, issue_id, status))
    }

    /// Priority-ordered issues filtered by status set.
    pub fn list_issues_by_status(
        &self,
        subject_id: &str,
        statuses: &[IssueStatus],
        limit: Option<u32>,
    ) -> Result<Vec<ActiveIssue>> {
        self.retry_on_busy(|| IssueRepo::list_by_status(&*self.conn()?, subject_id, statuses, limit))
    }

    /// Every non-resolved issue of a subject.
    pub fn list_open_issues(&self, subject_id: &str) -> Result<Vec<ActiveIssue>> {
        self.retry_on_busy(|| IssueRepo::list_open(&*self.conn()?, subject_id))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event memories
    // ─────────────────────────────────────────────────────────────────────

    /// Append one event to the log.
    #[instrument(skip(self, opts), fields(subject_id = opts.subject_id, kind = %opts.kind))]
    pub fn record_event(&self, opts: &CreateEventOptions<'_>) -> Result<EventMemory> {
        self.retry_on_busy(|| EventRepo::create(&*self.conn()?, opts))
    }

    /// The most recent events for a subject, newest first.
    pub fn recent_events(&self, subject_id: &str, limit: u32) -> Result<Vec<EventMemory>> {
        self.retry_on_busy(|| EventRepo::list_recent(&*self.conn()?, subject_id, limit))
    }

    /// Events of one kind since a timestamp.
    pub fn events_by_kind_since(
        &self,
        subject_id: &str,
        kind: EventKind,
        since: &str,
    ) -> Result<Vec<EventMemory>> {
        self.retry_on_busy(|| EventRepo::list_by_kind_since(&*self.conn()?, subject_id, kind, since))
    }

    /// Events whose description matches any keyword since a timestamp.
    pub fn events_matching(
        &self,
        subject_id: &str,
        keywords: &[&str],
        since: &str,
    ) -> Result<Vec<EventMemory>> {
        self.retry_on_busy(|| EventRepo::list_matching(&*self.conn()?, subject_id, keywords, since))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Insights
    // ─────────────────────────────────────────────────────────────────────

    /// Insert an insight unless it duplicates an existing one.
    #[instrument(skip(self, opts), fields(subject_id = opts.subject_id))]
    pub fn record_insight(&self, opts: &CreateInsightOptions<'_>) -> Result<Option<Insight>> {
        self.retry_on_busy(|| InsightRepo::create_deduped(&*self.conn()?, opts))
    }

    /// Highest-confidence insights for a subject.
    pub fn top_insights(&self, subject_id: &str, limit: u32) -> Result<Vec<Insight>> {
        self.retry_on_busy(|| InsightRepo::list_top(&*self.conn()?, subject_id, limit))
    }

    /// Count a subject's insights.
    pub fn insight_count(&self, subject_id: &str) -> Result<i64> {
        self.retry_on_busy(|| InsightRepo::count(&*self.conn()?, subject_id))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Issue history
    // ─────────────────────────────────────────────────────────────────────

    /// Append a transition audit row.
    pub fn record_history(&self, opts: &CreateHistoryOptions<'_>) -> Result<IssueHistory> {
        self.retry_on_busy(|| HistoryRepo::create(&*self.conn()?, opts))
    }

    /// All transitions of one issue, oldest first.
    pub fn issue_history(&self, issue_id: &str) -> Result<Vec<IssueHistory>> {
        self.retry_on_busy(|| HistoryRepo::list_by_issue(&*self.conn()?, issue_id))
    }

    /// Count transitions of one issue.
    pub fn history_count(&self, issue_id: &str) -> Result<i64> {
        self.retry_on_busy(|| HistoryRepo::count_by_issue(&*self.conn()?, issue_id))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Conversations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a conversation in the `received` phase.
    #[instrument(skip(self, user_text))]
    pub fn create_conversation(&self, subject_id: &str, user_text: &str) -> Result<Conversation> {
        self.retry_on_busy(|| ConversationRepo::create(&*self.conn()?, subject_id, user_text))
    }

    /// Get a conversation, erroring if absent.
    pub fn require_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.retry_on_busy(|| ConversationRepo::get_by_id(&*self.conn()?, conversation_id))?
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))
    }

    /// Advance a conversation's phase.
    pub fn set_conversation_phase(
        &self,
        conversation_id: &str,
        phase: ConversationPhase,
    ) -> Result<bool> {
        self.retry_on_busy(|| ConversationRepo::set_phase(&*self.conn()?, conversation_id, phase))
    }

    /// Store the produced reply JSON on a conversation.
    pub fn set_conversation_reply(&self, conversation_id: &str, reply: &Value) -> Result<bool> {
        self.retry_on_busy(|| ConversationRepo::set_reply(&*self.conn()?, conversation_id, reply))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
