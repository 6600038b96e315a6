//! Subject repository — the owning profile rows.
//!
//! Subjects are thin here: the wider application manages profiles, but
//! the cascade invariant (deleting a subject deletes all its memory
//! rows) lives in this schema, so the repo carries just enough surface
//! to exercise it.

use rusqlite::{Connection, OptionalExtension, params};

use hearth_core::ids;
use hearth_core::time::now_rfc3339;

use crate::errors::Result;

/// A subject (family-member profile) row.
#[derive(Clone, Debug, PartialEq)]
pub struct SubjectRow {
    /// Subject ID (`sub_…`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// ISO 8601 creation time.
    pub created_at: String,
}

/// Subject repository — stateless, every method takes `&Connection`.
pub struct SubjectRepo;

impl SubjectRepo {
    /// Create a new subject.
    pub fn create(conn: &Connection, name: &str) -> Result<SubjectRow> {
        let id = ids::subject_id();
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO subjects (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, now],
        )?;
        Ok(SubjectRow {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    /// Get subject by ID.
    pub fn get_by_id(conn: &Connection, subject_id: &str) -> Result<Option<SubjectRow>> {
        let row = conn
            .query_row(
                "SELECT id, name, created_at FROM subjects WHERE id = ?1",
                params![subject_id],
                |row| {
                    Ok(SubjectRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Check if a subject exists.
    pub fn exists(conn: &Connection, subject_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE id = ?1)",
            params![subject_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Delete a subject (cascades to all owned rows). Returns `true` if
    /// a row was deleted.
    pub fn delete(conn: &Connection, subject_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM subjects WHERE id = ?1", params![subject_id])?;
        Ok(changed > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
