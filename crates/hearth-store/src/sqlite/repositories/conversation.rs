//! Conversation repository — phase machine persistence.
//!
//! Every phase transition is written immediately so a crashed worker
//! leaves a diagnosable row rather than an in-memory mystery.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use hearth_core::conversation::{Conversation, ConversationPhase};
use hearth_core::ids;
use hearth_core::time::now_rfc3339;

use super::invalid_text;
use crate::errors::Result;

const SELECT_COLUMNS: &str = "id, subject_id, user_text, reply, phase, created_at, updated_at";

/// Conversation repository — stateless, every method takes `&Connection`.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Create a new conversation in the `received` phase.
    pub fn create(conn: &Connection, subject_id: &str, user_text: &str) -> Result<Conversation> {
        let id = ids::conversation_id();
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO conversations (id, subject_id, user_text, reply, phase, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6)",
            params![
                id,
                subject_id,
                user_text,
                ConversationPhase::Received.as_str(),
                now,
                now
            ],
        )?;
        Ok(Conversation {
            id,
            subject_id: subject_id.to_string(),
            user_text: user_text.to_string(),
            reply: None,
            phase: ConversationPhase::Received,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get conversation by ID.
    pub fn get_by_id(conn: &Connection, conversation_id: &str) -> Result<Option<Conversation>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM conversations WHERE id = ?1"),
                params![conversation_id],
                map_conversation,
            )
            .optional()?;
        Ok(row)
    }

    /// Advance the phase. Returns `true` if a row was changed.
    pub fn set_phase(
        conn: &Connection,
        conversation_id: &str,
        phase: ConversationPhase,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE conversations SET phase = ?1, updated_at = ?2 WHERE id = ?3",
            params![phase.as_str(), now_rfc3339(), conversation_id],
        )?;
        Ok(changed > 0)
    }

    /// Store the produced reply JSON. Returns `true` if a row was changed.
    pub fn set_reply(conn: &Connection, conversation_id: &str, reply: &Value) -> Result<bool> {
        let reply_text = serde_json::to_string(reply)?;
        let changed = conn.execute(
            "UPDATE conversations SET reply = ?1, updated_at = ?2 WHERE id = ?3",
            params![reply_text, now_rfc3339(), conversation_id],
        )?;
        Ok(changed > 0)
    }
}

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let reply_raw: Option<String> = row.get(3)?;
    let phase_raw: String = row.get(4)?;
    let reply = match reply_raw {
        Some(text) => Some(serde_json::from_str(&text).map_err(|_| invalid_text(3, &text))?),
        None => None,
    };
    Ok(Conversation {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        user_text: row.get(2)?,
        reply,
        phase: ConversationPhase::parse(&phase_raw).ok_or_else(|| invalid_text(4, &phase_raw))?,
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
    use serde_json::json;

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        let subject = SubjectRepo::create(&conn, "Ada").unwrap();
        (conn, subject.id)
    }

    #[test]
    fn create_starts_received() {
        let (conn, sub) = setup();
        let convo = ConversationRepo::create(&conn, &sub, "My head hurts again").unwrap();
        assert!(convo.id.starts_with("conv_"));
        assert_eq!(convo.phase, ConversationPhase::Received);
        assert!(convo.reply.is_none());
    }

    #[test]
    fn phase_advances_and_persists() {
        let (conn, sub) = setup();
        let convo = ConversationRepo::create(&conn, &sub, "hi").unwrap();

        assert!(
            ConversationRepo::set_phase(&conn, &convo.id, ConversationPhase::ContextRetrieved)
                .unwrap()
        );
        let loaded = ConversationRepo::get_by_id(&conn, &convo.id).unwrap().unwrap();
        assert_eq!(loaded.phase, ConversationPhase::ContextRetrieved);
    }

    #[test]
    fn set_phase_missing_returns_false() {
        let (conn, _) = setup();
        assert!(
            !ConversationRepo::set_phase(&conn, "conv_none", ConversationPhase::Failed).unwrap()
        );
    }

    #[test]
    fn reply_round_trips() {
        let (conn, sub) = setup();
        let convo = ConversationRepo::create(&conn, &sub, "hi").unwrap();
        let reply = json!({"reflection": "I hear you", "interpretation": "x", "followUp": "y"});

        assert!(ConversationRepo::set_reply(&conn, &convo.id, &reply).unwrap());
        let loaded = ConversationRepo::get_by_id(&conn, &convo.id).unwrap().unwrap();
        assert_eq!(loaded.reply.unwrap(), reply);
    }
}
