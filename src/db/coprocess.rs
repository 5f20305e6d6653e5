//! Co-processes: small-group shared diaries, pro tier
//!
//! One active co-process per owner, at most four members. Membership is
//! checked here; the pro-plan gate sits in the route layer.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::now_rfc3339;
use crate::error::{AtelierError, Result};

pub const MAX_MEMBERS: i64 = 4;
pub const ENTRY_FEEDBACK_TYPES: [&str; 4] = ["works", "needs_work", "inspired", "resonance"];
pub const ENTRY_MEDIA_TYPES: [&str; 3] = ["image", "audio", "video"];

#[derive(Debug, Clone, Serialize)]
pub struct CoProcessRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl CoProcessRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberRow {
    pub account_id: String,
    pub role: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryRow {
    pub id: String,
    pub co_process_id: String,
    pub author_id: String,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub created_at: String,
}

impl EntryRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            co_process_id: row.get("co_process_id")?,
            author_id: row.get("author_id")?,
            content: row.get("content")?,
            media_url: row.get("media_url")?,
            media_type: row.get("media_type")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryFeedbackRow {
    pub id: String,
    pub entry_id: String,
    pub author_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Option<String>,
    pub created_at: String,
}

/// Create a co-process with the owner as its first member.
/// Refused when the owner already has an active one.
pub fn create(
    conn: &Connection,
    owner_id: &str,
    title: &str,
    description: Option<&str>,
) -> Result<CoProcessRow> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM co_processes WHERE owner_id = ?1 AND status = 'active'",
            params![owner_id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(AtelierError::Invalid(
            "You already have an active co-process".into(),
        ));
    }
    if title.trim().is_empty() {
        return Err(AtelierError::Invalid("A title is required".into()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO co_processes (id, owner_id, title, description, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
        params![id, owner_id, title.trim(), description, now],
    )?;
    conn.execute(
        "INSERT INTO co_process_members (co_process_id, account_id, role, joined_at)
         VALUES (?1, ?2, 'owner', ?3)",
        params![id, owner_id, now],
    )?;

    get(conn, &id)?.ok_or_else(|| AtelierError::Internal("Co-process vanished".into()))
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<CoProcessRow>> {
    conn.query_row(
        "SELECT * FROM co_processes WHERE id = ?1",
        params![id],
        CoProcessRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn members(conn: &Connection, co_process_id: &str) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, role, joined_at FROM co_process_members
         WHERE co_process_id = ?1 ORDER BY joined_at ASC",
    )?;
    let rows = stmt
        .query_map(params![co_process_id], |row| {
            Ok(MemberRow {
                account_id: row.get(0)?,
                role: row.get(1)?,
                joined_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn is_member(conn: &Connection, co_process_id: &str, account_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM co_process_members
         WHERE co_process_id = ?1 AND account_id = ?2",
        params![co_process_id, account_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Add a member. Owner-only at the route layer; here the member cap and
/// duplicate membership are enforced.
pub fn add_member(conn: &Connection, co_process_id: &str, account_id: &str) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM co_process_members WHERE co_process_id = ?1",
        params![co_process_id],
        |row| row.get(0),
    )?;
    if count >= MAX_MEMBERS {
        return Err(AtelierError::Invalid(format!(
            "Co-process is full (max {} members)",
            MAX_MEMBERS
        )));
    }

    conn.execute(
        "INSERT INTO co_process_members (co_process_id, account_id, role, joined_at)
         VALUES (?1, ?2, 'member', ?3)",
        params![co_process_id, account_id, now_rfc3339()],
    )
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            AtelierError::Invalid("Already a member".into())
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn add_entry(
    conn: &Connection,
    co_process_id: &str,
    author_id: &str,
    content: &str,
    media_url: Option<&str>,
    media_type: Option<&str>,
) -> Result<EntryRow> {
    if let Some(mt) = media_type {
        if !ENTRY_MEDIA_TYPES.contains(&mt) {
            return Err(AtelierError::Invalid(format!("Unknown media type: {}", mt)));
        }
    }
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO co_process_entries (id, co_process_id, author_id, content, media_url, media_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, co_process_id, author_id, content, media_url, media_type, now],
    )?;
    Ok(EntryRow {
        id,
        co_process_id: co_process_id.to_string(),
        author_id: author_id.to_string(),
        content: content.to_string(),
        media_url: media_url.map(str::to_string),
        media_type: media_type.map(str::to_string),
        created_at: now,
    })
}

pub fn entries(conn: &Connection, co_process_id: &str) -> Result<Vec<EntryRow>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM co_process_entries WHERE co_process_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![co_process_id], EntryRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Co-process that an entry belongs to (membership checks for entry feedback).
pub fn co_process_of_entry(conn: &Connection, entry_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT co_process_id FROM co_process_entries WHERE id = ?1",
        params![entry_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub fn add_entry_feedback(
    conn: &Connection,
    entry_id: &str,
    author_id: &str,
    kind: &str,
    content: Option<&str>,
) -> Result<EntryFeedbackRow> {
    if !ENTRY_FEEDBACK_TYPES.contains(&kind) {
        return Err(AtelierError::Invalid(format!(
            "Unknown entry feedback type: {}",
            kind
        )));
    }
    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO co_process_feedback (id, entry_id, author_id, type, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, entry_id, author_id, kind, content, now],
    )?;
    Ok(EntryFeedbackRow {
        id,
        entry_id: entry_id.to_string(),
        author_id: author_id.to_string(),
        kind: kind.to_string(),
        content: content.map(str::to_string),
        created_at: now,
    })
}

/// Archive a co-process. Owner-scoped in SQL.
pub fn close(conn: &Connection, co_process_id: &str, owner_id: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE co_processes SET status = 'archived' WHERE id = ?1 AND owner_id = ?2",
        params![co_process_id, owner_id],
    )?;
    if changed == 0 {
        return Err(AtelierError::Forbidden(
            "Only the owner can close a co-process".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{accounts, profiles, Db};

    fn seed(db: &Db, n: usize) -> Vec<String> {
        db.with_conn(|conn| {
            let mut ids = Vec::new();
            for i in 0..n {
                let id = format!("acct-{}", i);
                accounts::create_account(conn, &id, &format!("u{}@example.com", i), "hash")?;
                profiles::create_profile(conn, &id, Some(&format!("user{}", i)))?;
                ids.push(id);
            }
            Ok(ids)
        })
        .unwrap()
    }

    #[test]
    fn test_one_active_per_owner() {
        let db = Db::open_in_memory().unwrap();
        let ids = seed(&db, 1);
        db.with_conn(|conn| {
            let cp = create(conn, &ids[0], "Winter songs", None)?;
            assert!(matches!(
                create(conn, &ids[0], "Another", None),
                Err(AtelierError::Invalid(_))
            ));
            // After closing, a new one is allowed
            close(conn, &cp.id, &ids[0])?;
            create(conn, &ids[0], "Spring songs", None)?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_member_cap() {
        let db = Db::open_in_memory().unwrap();
        let ids = seed(&db, 5);
        db.with_conn(|conn| {
            let cp = create(conn, &ids[0], "Quartet", None)?;
            add_member(conn, &cp.id, &ids[1])?;
            add_member(conn, &cp.id, &ids[2])?;
            add_member(conn, &cp.id, &ids[3])?;
            assert!(matches!(
                add_member(conn, &cp.id, &ids[4]),
                Err(AtelierError::Invalid(_))
            ));
            // Duplicate membership is a friendly error, not a crash
            assert!(matches!(
                add_member(conn, &cp.id, &ids[1]),
                Err(AtelierError::Invalid(_))
            ));
            Ok(())
        })
        .unwrap();
    }
}
