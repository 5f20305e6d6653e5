//! Message rows - append-only

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::now_rfc3339;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}

impl MessageRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            conversation_id: row.get("conversation_id")?,
            sender_id: row.get("sender_id")?,
            content: row.get("content")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn append(
    conn: &Connection,
    conversation_id: &str,
    sender_id: &str,
    content: &str,
) -> Result<MessageRow> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, conversation_id, sender_id, content, now],
    )?;
    Ok(MessageRow {
        id,
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        content: content.to_string(),
        created_at: now,
    })
}

/// Messages oldest-first (chat order).
pub fn list_for_conversation(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![conversation_id], MessageRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
