//! Issue-history repository — append-only transition audit trail.

use rusqlite::{Connection, params};

use hearth_core::ids;
use hearth_core::issue::{IssueHistory, IssueSeverity, IssueStatus};
use hearth_core::time::now_rfc3339;

use super::invalid_text;
use crate::errors::Result;

/// Options for recording one transition.
pub struct CreateHistoryOptions<'a> {
    /// Issue the transition belongs to.
    pub issue_id: &'a str,
    /// Status before.
    pub old_status: IssueStatus,
    /// Status after.
    pub new_status: IssueStatus,
    /// Severity before.
    pub old_severity: IssueSeverity,
    /// Severity after.
    pub new_severity: IssueSeverity,
    /// Why the transition happened.
    pub reason: &'a str,
}

/// Issue-history repository — stateless, every method takes `&Connection`.
pub struct HistoryRepo;

impl HistoryRepo {
    /// Append one transition row.
    pub fn create(conn: &Connection, opts: &CreateHistoryOptions<'_>) -> Result<IssueHistory> {
        let id = ids::history_id();
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO issue_history
               (id, issue_id, old_status, new_status, old_severity, new_severity, reason, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                opts.issue_id,
                opts.old_status.as_str(),
                opts.new_status.as_str(),
                opts.old_severity.as_str(),
                opts.new_severity.as_str(),
                opts.reason,
                now
            ],
        )?;
        Ok(IssueHistory {
            id,
            issue_id: opts.issue_id.to_string(),
            old_status: opts.old_status,
            new_status: opts.new_status,
            old_severity: opts.old_severity,
            new_severity: opts.new_severity,
            reason: opts.reason.to_string(),
            changed_at: now,
        })
    }

    /// All transitions of one issue, oldest first.
    pub fn list_by_issue(conn: &Connection, issue_id: &str) -> Result<Vec<IssueHistory>> {
        let mut stmt = conn.prepare(
            "SELECT id, issue_id, old_status, new_status, old_severity, new_severity, reason, changed_at
             FROM issue_history WHERE issue_id = ?1 ORDER BY changed_at ASC",
        )?;
        let rows = stmt
            .query_map(params![issue_id], map_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count transitions recorded for one issue.
    pub fn count_by_issue(conn: &Connection, issue_id: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM issue_history WHERE issue_id = ?1",
            params![issue_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<IssueHistory> {
    let old_status_raw: String = row.get(2)?;
    let new_status_raw: String = row.get(3)?;
    let old_severity_raw: String = row.get(4)?;
    let new_severity_raw: String = row.get(5)?;
    Ok(IssueHistory {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        old_status: IssueStatus::parse(&old_status_raw)
            .ok_or_else(|| invalid_text(2, &old_status_raw))?,
        new_status: IssueStatus::parse(&new_status_raw)
            .ok_or_else(|| invalid_text(3, &new_status_raw))?,
        old_severity: IssueSeverity::parse(&old_severity_raw)
            .ok_or_else(|| invalid_text(4, &old_severity_raw))?,
        new_severity: IssueSeverity::parse(&new_severity_raw)
            .ok_or_else(|| invalid_text(5, &new_severity_raw))?,
        reason: row.get(6)?,
        changed_at: row.get(7)?,
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
    use crate::sqlite::repositories::issue::{CreateIssueOptions, IssueRepo};
    use crate::sqlite::repositories::subject::SubjectRepo;

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        let subject = SubjectRepo::create(&conn, "Ada").unwrap();
        let issue = IssueRepo::create(
            &conn,
            &CreateIssueOptions {
                subject_id: &subject.id,
                label: "Headaches",
                status: IssueStatus::Active,
                severity: IssueSeverity::Mild,
                notes: None,
            },
        )
        .unwrap();
        (conn, issue.id)
    }

    #[test]
    fn create_and_list() {
        let (conn, issue_id) = setup();
        let row = HistoryRepo::create(
            &conn,
            &CreateHistoryOptions {
                issue_id: &issue_id,
                old_status: IssueStatus::Active,
                new_status: IssueStatus::Improving,
                old_severity: IssueSeverity::Mild,
                new_severity: IssueSeverity::Mild,
                reason: "reported improvement",
            },
        )
        .unwrap();
        assert!(row.id.starts_with("hist_"));

        let listed = HistoryRepo::list_by_issue(&conn, &issue_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].reason, "reported improvement");
    }

    #[test]
    fn count_tracks_appends() {
        let (conn, issue_id) = setup();
        assert_eq!(HistoryRepo::count_by_issue(&conn, &issue_id).unwrap(), 0);
        for reason in ["a", "b"] {
            HistoryRepo::create(
                &conn,
                &CreateHistoryOptions {
                    issue_id: &issue_id,
                    old_status: IssueStatus::Active,
                    new_status: IssueStatus::Monitoring,
                    old_severity: IssueSeverity::Mild,
                    new_severity: IssueSeverity::Moderate,
                    reason,
                },
            )
            .unwrap();
        }
        assert_eq!(HistoryRepo::count_by_issue(&conn, &issue_id).unwrap(), 2);
    }

    #[test]
    fn create_for_missing_issue_fails() {
        let (conn, _) = setup();
        let result = HistoryRepo::create(
            &conn,
            &CreateHistoryOptions {
                issue_id: "iss_none",
                old_status: IssueStatus::Active,
                new_status: IssueStatus::Resolved,
                old_severity: IssueSeverity::Mild,
                new_severity: IssueSeverity::Mild,
                reason: "x",
            },
        );
        assert!(result.is_err());
    }
}
