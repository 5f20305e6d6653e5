//! Process CRUD operations
//!
//! A process is created as an empty draft, mutated by autosave, and
//! published exactly once. The publish query carries `AND status = 'draft'`
//! so the draft -> published transition is one-way through this module.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::now_rfc3339;
use crate::error::{AtelierError, Result};

pub const PHASES: [&str; 5] = ["Idea", "Blocked", "Flow", "Revision", "Finished"];
pub const MEDIA_TYPES: [&str; 2] = ["image", "audio"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub phase: String,
    pub visibility: String,
    pub status: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub reflection_question: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProcessRow {
    pub(crate) fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            phase: row.get("phase")?,
            visibility: row.get("visibility")?,
            status: row.get("status")?,
            media_url: row.get("media_url")?,
            media_type: row.get("media_type")?,
            reflection_question: row.get("reflection_question")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Autosave payload. Partial by design - validation is loose for drafts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub phase: Option<String>,
    pub visibility: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub reflection_question: Option<String>,
}

/// Create an empty draft owned by the caller.
pub fn create_draft(conn: &Connection, owner_id: &str) -> Result<ProcessRow> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO processes (id, owner_id, title, description, created_at, updated_at)
         VALUES (?1, ?2, '', '', ?3, ?3)",
        params![id, owner_id, now],
    )?;
    get_process(conn, &id)?.ok_or_else(|| AtelierError::Internal("Draft vanished".into()))
}

pub fn get_process(conn: &Connection, id: &str) -> Result<Option<ProcessRow>> {
    conn.query_row(
        "SELECT * FROM processes WHERE id = ?1",
        params![id],
        ProcessRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Last-write-wins autosave, scoped to the owner.
pub fn autosave(
    conn: &Connection,
    id: &str,
    owner_id: &str,
    update: &ProcessUpdate,
) -> Result<ProcessRow> {
    if let Some(phase) = &update.phase {
        if !PHASES.contains(&phase.as_str()) {
            return Err(AtelierError::Invalid(format!("Unknown phase: {}", phase)));
        }
    }
    if let Some(mt) = &update.media_type {
        if !MEDIA_TYPES.contains(&mt.as_str()) {
            return Err(AtelierError::Invalid(format!("Unknown media type: {}", mt)));
        }
    }
    if let Some(vis) = &update.visibility {
        if vis != "public" && vis != "private" {
            return Err(AtelierError::Invalid(format!("Unknown visibility: {}", vis)));
        }
    }

    let existing = get_process(conn, id)?
        .ok_or_else(|| AtelierError::NotFound(format!("Process {}", id)))?;
    if existing.owner_id != owner_id {
        return Err(AtelierError::Forbidden("Not your process".into()));
    }

    conn.execute(
        "UPDATE processes SET
            title = ?3, description = ?4, phase = ?5, visibility = ?6,
            media_url = ?7, media_type = ?8, reflection_question = ?9,
            updated_at = ?10
         WHERE id = ?1 AND owner_id = ?2",
        params![
            id,
            owner_id,
            update.title.as_ref().unwrap_or(&existing.title),
            update.description.as_ref().or(existing.description.as_ref()),
            update.phase.as_ref().unwrap_or(&existing.phase),
            update.visibility.as_ref().unwrap_or(&existing.visibility),
            update.media_url.as_ref().or(existing.media_url.as_ref()),
            update.media_type.as_ref().or(existing.media_type.as_ref()),
            update
                .reflection_question
                .as_ref()
                .or(existing.reflection_question.as_ref()),
            now_rfc3339(),
        ],
    )?;

    get_process(conn, id)?.ok_or_else(|| AtelierError::Internal("Process vanished".into()))
}

/// Count of published processes owned by an account. The observer-period
/// one-post allowance is counted against this at the publish call site.
pub fn count_published(conn: &Connection, owner_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM processes WHERE owner_id = ?1 AND status = 'published'",
        params![owner_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Flip a draft to published. Requires a description or media; forces
/// public visibility; refuses to touch an already-published row.
pub fn publish(conn: &Connection, id: &str, owner_id: &str) -> Result<ProcessRow> {
    let existing = get_process(conn, id)?
        .ok_or_else(|| AtelierError::NotFound(format!("Process {}", id)))?;
    if existing.owner_id != owner_id {
        return Err(AtelierError::Forbidden("Not your process".into()));
    }
    if existing.status == "published" {
        return Err(AtelierError::Invalid("Already published".into()));
    }
    let has_description = existing
        .description
        .as_deref()
        .map(|d| !d.trim().is_empty())
        .unwrap_or(false);
    if !has_description && existing.media_url.is_none() {
        return Err(AtelierError::Invalid(
            "Add a description or media to publish".into(),
        ));
    }

    conn.execute(
        "UPDATE processes SET status = 'published', visibility = 'public', updated_at = ?3
         WHERE id = ?1 AND owner_id = ?2 AND status = 'draft'",
        params![id, owner_id, now_rfc3339()],
    )?;

    get_process(conn, id)?.ok_or_else(|| AtelierError::Internal("Process vanished".into()))
}

pub fn delete_process(conn: &Connection, id: &str, owner_id: &str) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM processes WHERE id = ?1 AND owner_id = ?2",
        params![id, owner_id],
    )?;
    if changed == 0 {
        return Err(AtelierError::NotFound(format!("Process {}", id)));
    }
    Ok(())
}

/// Published, public processes, newest first, optionally restricted to a
/// set of authors (the following view) and a set of phases.
pub fn list_published(
    conn: &Connection,
    author_ids: Option<&[String]>,
    phases: &[String],
) -> Result<Vec<ProcessRow>> {
    let mut sql = String::from(
        "SELECT * FROM processes WHERE status = 'published' AND visibility = 'public'",
    );
    let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(authors) = author_ids {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = placeholders_from(bound.len(), authors.len());
        sql.push_str(&format!(" AND owner_id IN ({})", placeholders));
        for a in authors {
            bound.push(Box::new(a.clone()));
        }
    }
    if !phases.is_empty() {
        let placeholders = placeholders_from(bound.len(), phases.len());
        sql.push_str(&format!(" AND phase IN ({})", placeholders));
        for p in phases {
            bound.push(Box::new(p.clone()));
        }
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
    let rows = stmt
        .query_map(params_ref.as_slice(), ProcessRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Latest published, public processes by authors in a different creative
/// state than the viewer, excluding the viewer's own. Feeds the daily
/// discovery shuffle.
pub fn list_discovery_candidates(
    conn: &Connection,
    viewer_id: Option<&str>,
    viewer_state: &str,
    limit: u32,
) -> Result<Vec<ProcessRow>> {
    let mut stmt = conn.prepare(
        "SELECT p.* FROM processes p
         JOIN profiles pr ON pr.id = p.owner_id
         WHERE p.status = 'published' AND p.visibility = 'public'
           AND pr.current_state <> ?1
           AND (?2 IS NULL OR p.owner_id <> ?2)
         ORDER BY p.created_at DESC
         LIMIT ?3",
    )?;
    let rows = stmt
        .query_map(params![viewer_state, viewer_id, limit], ProcessRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn placeholders_from(offset: usize, count: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", offset + i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}
