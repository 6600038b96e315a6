//! Insight repository — deduplicated insert and confidence-ordered listing.
//!
//! De-duplication is a leading-substring check in both directions: a
//! candidate whose first 20 characters already appear in a stored
//! insight, or vice versa, is dropped rather than inserted. Known
//! limitation: differently phrased duplicates slip through.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use hearth_core::ids;
use hearth_core::insight::{Insight, dedup_prefix};
use hearth_core::time::now_rfc3339;

use crate::errors::Result;

const SELECT_COLUMNS: &str =
    "id, subject_id, text, confidence, related_issue_id, created_at, updated_at";

/// Options for inserting a new insight.
pub struct CreateInsightOptions<'a> {
    /// Owning subject.
    pub subject_id: &'a str,
    /// The observation text.
    pub text: &'a str,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Linked issue, if any.
    pub related_issue_id: Option<&'a str>,
}

/// Insight repository — stateless, every method takes `&Connection`.
pub struct InsightRepo;

impl InsightRepo {
    /// Insert an insight unless a duplicate already exists.
    ///
    /// Returns `Ok(None)` when the candidate was dropped as a duplicate.
    pub fn create_deduped(
        conn: &Connection,
        opts: &CreateInsightOptions<'_>,
    ) -> Result<Option<Insight>> {
        if Self::has_duplicate(conn, opts.subject_id, opts.text)? {
            debug!(subject_id = opts.subject_id, "insight dropped as duplicate");
            return Ok(None);
        }

        let id = ids::insight_id();
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO insights
               (id, subject_id, text, confidence, related_issue_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                opts.subject_id,
                opts.text,
                opts.confidence,
                opts.related_issue_id,
                now,
                now
            ],
        )?;
        Ok(Some(Insight {
            id,
            subject_id: opts.subject_id.to_string(),
            text: opts.text.to_string(),
            confidence: opts.confidence,
            related_issue_id: opts.related_issue_id.map(String::from),
            created_at: now.clone(),
            updated_at: now,
        }))
    }

    /// Get insight by ID.
    pub fn get_by_id(conn: &Connection, insight_id: &str) -> Result<Option<Insight>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM insights WHERE id = ?1"),
                params![insight_id],
                map_insight,
            )
            .optional()?;
        Ok(row)
    }

    /// The highest-confidence insights for a subject.
    pub fn list_top(conn: &Connection, subject_id: &str, limit: u32) -> Result<Vec<Insight>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM insights
             WHERE subject_id = ?1
             ORDER BY confidence DESC, created_at DESC
             LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![subject_id, limit], map_insight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count a subject's insights.
    pub fn count(conn: &Connection, subject_id: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM insights WHERE subject_id = ?1",
            params![subject_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Leading-substring duplicate check, both directions.
    fn has_duplicate(conn: &Connection, subject_id: &str, candidate: &str) -> Result<bool> {
        let candidate_prefix = dedup_prefix(candidate);
        let mut stmt =
            conn.prepare("SELECT text FROM insights WHERE subject_id = ?1")?;
        let existing = stmt
            .query_map(params![subject_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(existing.iter().any(|text| {
            text.contains(&candidate_prefix) || candidate.contains(&dedup_prefix(text))
        }))
    }
}

fn map_insight(row: &rusqlite::Row<'_>) -> rusqlite::Result<Insight> {
    Ok(Insight {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        text: row.get(2)?,
        confidence: row.get(3)?,
        related_issue_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
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

    fn insert(conn: &Connection, sub: &str, text: &str, confidence: f64) -> Option<Insight> {
        InsightRepo::create_deduped(
            conn,
            &CreateInsightOptions {
                subject_id: sub,
                text,
                confidence,
                related_issue_id: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn create_and_get() {
        let (conn, sub) = setup();
        let insight = insert(&conn, &sub, "Sleep under 6h tracks with fatigue", 0.7).unwrap();
        assert!(insight.id.starts_with("ins_"));

        let found = InsightRepo::get_by_id(&conn, &insight.id).unwrap().unwrap();
        assert_eq!(found, insight);
    }

    #[test]
    fn duplicate_prefix_is_dropped() {
        let (conn, sub) = setup();
        assert!(insert(&conn, &sub, "Sleep under 6h tracks with fatigue", 0.7).is_some());
        // Same leading 20 chars, different tail
        assert!(insert(&conn, &sub, "Sleep under 6h track record improving", 0.9).is_none());
        assert_eq!(InsightRepo::count(&conn, &sub).unwrap(), 1);
    }

    #[test]
    fn duplicate_check_is_bidirectional() {
        let (conn, sub) = setup();
        assert!(insert(&conn, &sub, "More water logged", 0.8).is_some());
        // Existing text's prefix is contained in the longer candidate
        assert!(insert(&conn, &sub, "We noticed: More water logged this week", 0.8).is_none());
    }

    #[test]
    fn different_subjects_do_not_dedup() {
        let (conn, sub) = setup();
        let other = SubjectRepo::create(&conn, "Ben").unwrap();
        assert!(insert(&conn, &sub, "Sleep under 6h tracks with fatigue", 0.7).is_some());
        assert!(insert(&conn, &other.id, "Sleep under 6h tracks with fatigue", 0.7).is_some());
    }

    #[test]
    fn list_top_orders_by_confidence() {
        let (conn, sub) = setup();
        insert(&conn, &sub, "Hydration improved since last month", 0.8).unwrap();
        insert(&conn, &sub, "Stress mentions cluster before symptoms", 0.5).unwrap();
        insert(&conn, &sub, "Sleep under 6h tracks with fatigue", 0.9).unwrap();

        let top = InsightRepo::list_top(&conn, &sub, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert!((top[0].confidence - 0.9).abs() < f64::EPSILON);
        assert!((top[1].confidence - 0.8).abs() < f64::EPSILON);
    }
}
