//! Event-memory repository — append-only observed-event log.
//!
//! No update or delete methods exist on purpose: rows are immutable
//! after insert and the log is the canonical input for pattern
//! detection.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use hearth_core::event::{EventKind, EventMemory};
use hearth_core::ids;
use hearth_core::time::now_rfc3339;

use super::invalid_text;
use crate::errors::Result;

const SELECT_COLUMNS: &str =
    "id, subject_id, kind, description, metadata, occurred_at, created_at";

/// Options for appending an event.
pub struct CreateEventOptions<'a> {
    /// Owning subject.
    pub subject_id: &'a str,
    /// Kind discriminator.
    pub kind: EventKind,
    /// Free-text description.
    pub description: &'a str,
    /// Kind-dependent structured payload.
    pub metadata: Value,
    /// When the thing happened; `None` means now.
    pub occurred_at: Option<&'a str>,
}

/// Event-memory repository — stateless, every method takes `&Connection`.
pub struct EventRepo;

impl EventRepo {
    /// Append one event. The row is immutable afterwards.
    pub fn create(conn: &Connection, opts: &CreateEventOptions<'_>) -> Result<EventMemory> {
        let id = ids::event_id();
        let now = now_rfc3339();
        let occurred_at = opts.occurred_at.map_or_else(|| now.clone(), String::from);
        let metadata_text = serde_json::to_string(&opts.metadata)?;
        let _ = conn.execute(
            "INSERT INTO event_memories
               (id, subject_id, kind, description, metadata, occurred_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                opts.subject_id,
                opts.kind.as_str(),
                opts.description,
                metadata_text,
                occurred_at,
                now
            ],
        )?;
        Ok(EventMemory {
            id,
            subject_id: opts.subject_id.to_string(),
            kind: opts.kind,
            description: opts.description.to_string(),
            metadata: opts.metadata.clone(),
            occurred_at,
            created_at: now,
        })
    }

    /// Get event by ID.
    pub fn get_by_id(conn: &Connection, event_id: &str) -> Result<Option<EventMemory>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM event_memories WHERE id = ?1"),
                params![event_id],
                map_event,
            )
            .optional()?;
        Ok(row)
    }

    /// The most recent events for a subject, newest first.
    pub fn list_recent(conn: &Connection, subject_id: &str, limit: u32) -> Result<Vec<EventMemory>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM event_memories
             WHERE subject_id = ?1
             ORDER BY occurred_at DESC
             LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![subject_id, limit], map_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events of one kind since a timestamp, newest first.
    pub fn list_by_kind_since(
        conn: &Connection,
        subject_id: &str,
        kind: EventKind,
        since: &str,
    ) -> Result<Vec<EventMemory>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM event_memories
             WHERE subject_id = ?1 AND kind = ?2 AND occurred_at >= ?3
             ORDER BY occurred_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![subject_id, kind.as_str(), since], map_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events since a timestamp whose description contains any of the
    /// given keywords (case-insensitive), newest first.
    pub fn list_matching(
        conn: &Connection,
        subject_id: &str,
        keywords: &[&str],
        since: &str,
    ) -> Result<Vec<EventMemory>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let like_clauses = (0..keywords.len())
            .map(|i| format!("description LIKE ?{}", i + 3))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM event_memories
             WHERE subject_id = ?1 AND occurred_at >= ?2 AND ({like_clauses})
             ORDER BY occurred_at DESC"
        );

        let patterns: Vec<String> = keywords.iter().map(|k| format!("%{k}%")).collect();
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&subject_id, &since];
        for p in &patterns {
            values.push(p);
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(values.as_slice(), map_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventMemory> {
    let kind_raw: String = row.get(2)?;
    let metadata_raw: String = row.get(4)?;
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|_| invalid_text(4, &metadata_raw))?;
    Ok(EventMemory {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        kind: EventKind::parse(&kind_raw).ok_or_else(|| invalid_text(2, &kind_raw))?,
        description: row.get(3)?,
        metadata,
        occurred_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
