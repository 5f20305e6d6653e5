//! Account credential rows
//!
//! Identity lives here: the login identifier, the argon2 hash, and the two
//! bits that matter to the rest of the system - `is_flagged` (moderation
//! override for the observer gate) and the immutable `joined_at` timestamp.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::now_rfc3339;
use crate::error::{AtelierError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct AccountRow {
    pub id: String,
    pub identifier: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_flagged: bool,
    pub is_active: bool,
    pub joined_at: String,
}

impl AccountRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            identifier: row.get("identifier")?,
            password_hash: row.get("password_hash")?,
            is_flagged: row.get("is_flagged")?,
            is_active: row.get("is_active")?,
            joined_at: row.get("joined_at")?,
        })
    }
}

/// Create an account row. The caller provides a pre-hashed password.
pub fn create_account(
    conn: &Connection,
    id: &str,
    identifier: &str,
    password_hash: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, identifier, password_hash, joined_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, identifier, password_hash, now_rfc3339()],
    )
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            AtelierError::Conflict(format!("Identifier already registered: {}", identifier))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &str) -> Result<Option<AccountRow>> {
    conn.query_row(
        "SELECT * FROM accounts WHERE id = ?1",
        params![id],
        AccountRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_account_by_identifier(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<AccountRow>> {
    conn.query_row(
        "SELECT * FROM accounts WHERE identifier = ?1",
        params![identifier],
        AccountRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Moderation action: flag or unflag an account.
pub fn set_flagged(conn: &Connection, id: &str, flagged: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET is_flagged = ?2 WHERE id = ?1",
        params![id, flagged],
    )?;
    if changed == 0 {
        return Err(AtelierError::NotFound(format!("Account {}", id)));
    }
    Ok(())
}
