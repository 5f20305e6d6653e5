//! Cached mentor advice, one row per process

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::now_rfc3339;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorNoteRow {
    pub process_id: String,
    pub summary: String,
    pub questions: Vec<String>,
    pub exercise: String,
    pub created_at: String,
    pub updated_at: String,
}

impl MentorNoteRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        let questions_json: String = row.get("questions")?;
        Ok(Self {
            process_id: row.get("process_id")?,
            summary: row.get("summary")?,
            questions: serde_json::from_str(&questions_json).unwrap_or_default(),
            exercise: row.get("exercise")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn get_note(conn: &Connection, process_id: &str) -> Result<Option<MentorNoteRow>> {
    conn.query_row(
        "SELECT * FROM mentor_notes WHERE process_id = ?1",
        params![process_id],
        MentorNoteRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Insert or refresh the cached advice for a process.
pub fn upsert_note(
    conn: &Connection,
    process_id: &str,
    summary: &str,
    questions: &[String],
    exercise: &str,
) -> Result<()> {
    let questions_json = serde_json::to_string(questions)?;
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO mentor_notes (process_id, summary, questions, exercise, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(process_id) DO UPDATE SET
            summary = excluded.summary,
            questions = excluded.questions,
            exercise = excluded.exercise,
            updated_at = excluded.updated_at",
        params![process_id, summary, questions_json, exercise, now],
    )?;
    Ok(())
}
