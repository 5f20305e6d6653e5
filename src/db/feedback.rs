//! Peer feedback rows

use std::collections::HashMap;

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::now_rfc3339;
use crate::error::{AtelierError, Result};

pub const FEEDBACK_TYPES: [&str; 3] = ["works", "doesnt_work", "inspired"];
pub const MAX_CONTENT_LEN: usize = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRow {
    pub id: String,
    pub process_id: String,
    pub author_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub created_at: String,
}

impl FeedbackRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            process_id: row.get("process_id")?,
            author_id: row.get("author_id")?,
            kind: row.get("type")?,
            content: row.get("content")?,
            parent_id: row.get("parent_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn add_feedback(
    conn: &Connection,
    process_id: &str,
    author_id: &str,
    kind: &str,
    content: &str,
    parent_id: Option<&str>,
) -> Result<FeedbackRow> {
    if !FEEDBACK_TYPES.contains(&kind) {
        return Err(AtelierError::Invalid(format!(
            "Unknown feedback type: {}",
            kind
        )));
    }
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AtelierError::Invalid("Content is required".into()));
    }
    if trimmed.chars().count() > MAX_CONTENT_LEN {
        return Err(AtelierError::Invalid("Content too long".into()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO feedback (id, process_id, author_id, type, content, parent_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, process_id, author_id, kind, trimmed, parent_id, now],
    )?;
    Ok(FeedbackRow {
        id,
        process_id: process_id.to_string(),
        author_id: author_id.to_string(),
        kind: kind.to_string(),
        content: trimmed.to_string(),
        parent_id: parent_id.map(str::to_string),
        created_at: now,
    })
}

/// Feedback for a process, oldest first.
pub fn list_for_process(conn: &Connection, process_id: &str) -> Result<Vec<FeedbackRow>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM feedback WHERE process_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![process_id], FeedbackRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Feedback counts per process for a batch of feed rows.
pub fn counts_for(conn: &Connection, process_ids: &[String]) -> Result<HashMap<String, i64>> {
    let mut out = HashMap::new();
    if process_ids.is_empty() {
        return Ok(out);
    }
    let placeholders = (0..process_ids.len())
        .map(|i| format!("?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT process_id, COUNT(*) FROM feedback WHERE process_id IN ({}) GROUP BY process_id",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::ToSql> =
        process_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params_ref.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    out.extend(rows);
    Ok(out)
}
