//! Active-issue repository — CRUD and priority-ordered listing.
//!
//! Issues are never hard-deleted; resolution is a status change. The
//! priority ordering (severity rank descending, then most recent
//! mention) is computed in SQL so retrieval and reconciliation see the
//! same order.

use rusqlite::{Connection, OptionalExtension, params};

use hearth_core::ids;
use hearth_core::issue::{ActiveIssue, IssueSeverity, IssueStatus};
use hearth_core::time::now_rfc3339;

use super::invalid_text;
use crate::errors::Result;

const SELECT_COLUMNS: &str =
    "id, subject_id, label, status, severity, first_reported_at, last_mentioned_at, notes";

/// Ordering clause: severe > moderate > mild, ties broken by most
/// recent mention.
const PRIORITY_ORDER: &str = "ORDER BY CASE severity
            WHEN 'severe' THEN 3
            WHEN 'moderate' THEN 2
            ELSE 1
        END DESC,
        last_mentioned_at DESC";

/// Options for creating a new issue.
pub struct CreateIssueOptions<'a> {
    /// Owning subject.
    pub subject_id: &'a str,
    /// Free-text label.
    pub label: &'a str,
    /// Initial status.
    pub status: IssueStatus,
    /// Initial severity.
    pub severity: IssueSeverity,
    /// Optional notes.
    pub notes: Option<&'a str>,
}

/// Partial update of an issue row. `None` fields are left unchanged;
/// `last_mentioned_at` is always refreshed by [`IssueRepo::update`].
#[derive(Default)]
pub struct IssueChanges<'a> {
    /// New status.
    pub status: Option<IssueStatus>,
    /// New severity.
    pub severity: Option<IssueSeverity>,
    /// New notes.
    pub notes: Option<&'a str>,
}

/// Active-issue repository — stateless, every method takes `&Connection`.
pub struct IssueRepo;

impl IssueRepo {
    /// Create a new issue. First-reported and last-mentioned start at now.
    pub fn create(conn: &Connection, opts: &CreateIssueOptions<'_>) -> Result<ActiveIssue> {
        let id = ids::issue_id();
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO active_issues
               (id, subject_id, label, status, severity, first_reported_at, last_mentioned_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                opts.subject_id,
                opts.label,
                opts.status.as_str(),
                opts.severity.as_str(),
                now,
                now,
                opts.notes
            ],
        )?;
        Ok(ActiveIssue {
            id,
            subject_id: opts.subject_id.to_string(),
            label: opts.label.to_string(),
            status: opts.status,
            severity: opts.severity,
            first_reported_at: now.clone(),
            last_mentioned_at: now,
            notes: opts.notes.map(String::from),
        })
    }

    /// Get issue by ID.
    pub fn get_by_id(conn: &Connection, issue_id: &str) -> Result<Option<ActiveIssue>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM active_issues WHERE id = ?1"),
                params![issue_id],
                map_issue,
            )
            .optional()?;
        Ok(row)
    }

    /// Apply a partial update and refresh `last_mentioned_at` to now.
    /// Returns `true` if a row was changed.
    pub fn update(conn: &Connection, issue_id: &str, changes: &IssueChanges<'_>) -> Result<bool> {
        let now = now_rfc3339();
        let changed = conn.execute(
            "UPDATE active_issues SET
               status = COALESCE(?1, status),
               severity = COALESCE(?2, severity),
               notes = COALESCE(?3, notes),
               last_mentioned_at = ?4
             WHERE id = ?5",
            params![
                changes.status.map(IssueStatus::as_str),
                changes.severity.map(IssueSeverity::as_str),
                changes.notes,
                now,
                issue_id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Set status without touching `last_mentioned_at`.
    ///
    /// Auto-transitions use this; a sweep is not a mention.
    pub fn set_status(conn: &Connection, issue_id: &str, status: IssueStatus) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE active_issues SET status = ?1 WHERE id = ?2",
            params![status.as_str(), issue_id],
        )?;
        Ok(changed > 0)
    }

    /// Overwrite `last_mentioned_at` with an explicit timestamp.
    ///
    /// Test seam for temporal rules; production code uses [`update`].
    ///
    /// [`update`]: Self::update
    pub fn set_last_mentioned_at(
        conn: &Connection,
        issue_id: &str,
        timestamp: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE active_issues SET last_mentioned_at = ?1 WHERE id = ?2",
            params![timestamp, issue_id],
        )?;
        Ok(changed > 0)
    }

    /// List a subject's issues filtered by status set, priority-ordered,
    /// optionally limited.
    pub fn list_by_status(
        conn: &Connection,
        subject_id: &str,
        statuses: &[IssueStatus],
        limit: Option<u32>,
    ) -> Result<Vec<ActiveIssue>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..statuses.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let limit_clause = limit.map_or(String::new(), |n| format!(" LIMIT {n}"));
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM active_issues
             WHERE subject_id = ?1 AND status IN ({placeholders})
             {PRIORITY_ORDER}{limit_clause}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&subject_id];
        let status_strs: Vec<&'static str> = statuses.iter().map(|s| s.as_str()).collect();
        for s in &status_strs {
            values.push(s);
        }

        let rows = stmt
            .query_map(values.as_slice(), map_issue)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List every non-resolved issue of a subject (sweep input).
    pub fn list_open(conn: &Connection, subject_id: &str) -> Result<Vec<ActiveIssue>> {
        Self::list_by_status(
            conn,
            subject_id,
            &[
                IssueStatus::Active,
                IssueStatus::Improving,
                IssueStatus::Monitoring,
            ],
            None,
        )
    }
}

fn map_issue(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActiveIssue> {
    let status_raw: String = row.get(3)?;
    let severity_raw: String = row.get(4)?;
    Ok(ActiveIssue {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        label: row.get(2)?,
        status: IssueStatus::parse(&status_raw).ok_or_else(|| invalid_text(3, &status_raw))?,
        severity: IssueSeverity::parse(&severity_raw)
            .ok_or_else(|| invalid_text(4, &severity_raw))?,
        first_reported_at: row.get(5)?,
        last_mentioned_at: row.get(6)?,
        notes: row.get(7)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;
    use crate::sqlite::repositories::subject::SubjectRepo;

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        let subject = SubjectRepo::create(&conn, "Ada").unwrap();
        (conn, subject.id)
    }

    fn create(
        conn: &Connection,
        subject_id: &str,
        label: &str,
        status: IssueStatus,
        severity: IssueSeverity,
    ) -> ActiveIssue {
        IssueRepo::create(
            conn,
            &CreateIssueOptions {
                subject_id,
                label,
                status,
                severity,
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn create_and_get() {
        let (conn, sub) = setup();
        let issue = create(&conn, &sub, "Headaches", IssueStatus::Active, IssueSeverity::Moderate);
        assert!(issue.id.starts_with("iss_"));
        assert_eq!(issue.first_reported_at, issue.last_mentioned_at);

        let found = IssueRepo::get_by_id(&conn, &issue.id).unwrap().unwrap();
        assert_eq!(found, issue);
    }

    #[test]
    fn get_missing_is_none() {
        let (conn, _) = setup();
        assert!(IssueRepo::get_by_id(&conn, "iss_none").unwrap().is_none());
    }

    #[test]
    fn update_refreshes_last_mentioned() {
        let (conn, sub) = setup();
        let issue = create(&conn, &sub, "Headaches", IssueStatus::Active, IssueSeverity::Mild);

        IssueRepo::set_last_mentioned_at(&conn, &issue.id, "2026-01-01T00:00:00+00:00").unwrap();
        let changed = IssueRepo::update(
            &conn,
            &issue.id,
            &IssueChanges {
                severity: Some(IssueSeverity::Severe),
                ..IssueChanges::default()
            },
        )
        .unwrap();
        assert!(changed);

        let updated = IssueRepo::get_by_id(&conn, &issue.id).unwrap().unwrap();
        assert_eq!(updated.severity, IssueSeverity::Severe);
        assert_eq!(updated.status, IssueStatus::Active);
        assert_ne!(updated.last_mentioned_at, "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn update_missing_returns_false() {
        let (conn, _) = setup();
        let changed = IssueRepo::update(&conn, "iss_none", &IssueChanges::default()).unwrap();
        assert!(!changed);
    }

    #[test]
    fn list_filters_by_status() {
        let (conn, sub) = setup();
        create(&conn, &sub, "Headaches", IssueStatus::Active, IssueSeverity::Mild);
        create(&conn, &sub, "Back pain", IssueStatus::Resolved, IssueSeverity::Severe);

        let open =
            IssueRepo::list_by_status(&conn, &sub, &[IssueStatus::Active], None).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].label, "Headaches");
    }

    #[test]
    fn list_orders_by_severity_then_recency() {
        let (conn, sub) = setup();
        let mild = create(&conn, &sub, "Dry skin", IssueStatus::Active, IssueSeverity::Mild);
        let severe = create(&conn, &sub, "Chest pain", IssueStatus::Active, IssueSeverity::Severe);
        let mod_old = create(&conn, &sub, "Headaches", IssueStatus::Active, IssueSeverity::Moderate);
        let mod_new = create(&conn, &sub, "Fatigue", IssueStatus::Active, IssueSeverity::Moderate);

        IssueRepo::set_last_mentioned_at(&conn, &mod_old.id, "2026-01-01T00:00:00+00:00").unwrap();
        IssueRepo::set_last_mentioned_at(&conn, &mod_new.id, "2026-06-01T00:00:00+00:00").unwrap();

        let listed = IssueRepo::list_by_status(
            &conn,
            &sub,
            &[IssueStatus::Active, IssueStatus::Monitoring],
            None,
        )
        .unwrap();
        let ids: Vec<&str> = listed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![
            severe.id.as_str(),
            mod_new.id.as_str(),
            mod_old.id.as_str(),
            mild.id.as_str()
        ]);
    }

    #[test]
    fn list_respects_limit() {
        let (conn, sub) = setup();
        for label in ["a", "b", "c"] {
            create(&conn, &sub, label, IssueStatus::Active, IssueSeverity::Mild);
        }
        let listed =
            IssueRepo::list_by_status(&conn, &sub, &[IssueStatus::Active], Some(2)).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn empty_status_set_is_empty() {
        let (conn, sub) = setup();
        create(&conn, &sub, "Headaches", IssueStatus::Active, IssueSeverity::Mild);
        let listed = IssueRepo::list_by_status(&conn, &sub, &[], None).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn list_open_excludes_resolved() {
        let (conn, sub) = setup();
        create(&conn, &sub, "Headaches", IssueStatus::Improving, IssueSeverity::Mild);
        create(&conn, &sub, "Back pain", IssueStatus::Resolved, IssueSeverity::Mild);
        let open = IssueRepo::list_open(&conn, &sub).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].status, IssueStatus::Improving);
    }
}
