//! Social graph: follows, blocks, reports

use rusqlite::{params, Connection};

use crate::db::now_rfc3339;
use crate::error::{AtelierError, Result};

pub const REPORT_TARGET_TYPES: [&str; 3] = ["process", "feedback", "profile"];

pub fn follow(conn: &Connection, follower_id: &str, followed_id: &str) -> Result<()> {
    if follower_id == followed_id {
        return Err(AtelierError::Invalid("Cannot follow yourself".into()));
    }
    // Re-following is a no-op, not an error
    conn.execute(
        "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![follower_id, followed_id, now_rfc3339()],
    )?;
    Ok(())
}

pub fn unfollow(conn: &Connection, follower_id: &str, followed_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
    )?;
    Ok(())
}

pub fn is_following(conn: &Connection, follower_id: &str, followed_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower_id, followed_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn followed_ids(conn: &Connection, follower_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT followed_id FROM follows WHERE follower_id = ?1")?;
    let rows = stmt
        .query_map(params![follower_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn block(conn: &Connection, blocker_id: &str, blocked_id: &str) -> Result<()> {
    if blocker_id == blocked_id {
        return Err(AtelierError::Invalid("Cannot block yourself".into()));
    }
    conn.execute(
        "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![blocker_id, blocked_id, now_rfc3339()],
    )?;
    Ok(())
}

pub fn blocked_ids(conn: &Connection, blocker_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT blocked_id FROM blocks WHERE blocker_id = ?1")?;
    let rows = stmt
        .query_map(params![blocker_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn report(
    conn: &Connection,
    reporter_id: &str,
    target_id: &str,
    target_type: &str,
    reason: &str,
) -> Result<()> {
    if !REPORT_TARGET_TYPES.contains(&target_type) {
        return Err(AtelierError::Invalid(format!(
            "Unknown report target type: {}",
            target_type
        )));
    }
    if reason.trim().is_empty() {
        return Err(AtelierError::Invalid("A reason is required".into()));
    }
    conn.execute(
        "INSERT INTO reports (id, reporter_id, target_id, target_type, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            uuid::Uuid::new_v4().to_string(),
            reporter_id,
            target_id,
            target_type,
            reason.trim(),
            now_rfc3339()
        ],
    )?;
    Ok(())
}
