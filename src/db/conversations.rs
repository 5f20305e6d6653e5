//! Conversation identity and get-or-create
//!
//! An unordered pair of participants is stored as a lexicographically
//! sorted pair; together with the context it forms the uniqueness key.
//! Creation is insert-first: a naive check-then-insert has a TOCTOU gap
//! when both parties initiate first contact at once, so the insert goes
//! straight at the unique index and a constraint violation falls back to a
//! lookup of the row the other request won with.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::{is_unique_violation, now_rfc3339};
use crate::error::{AtelierError, Result};

pub const CONTEXT_TYPES: [&str; 3] = ["process", "profile", "commission"];

#[derive(Debug, Clone, Serialize)]
pub struct ConversationRow {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub context_type: String,
    pub context_id: Option<String>,
    pub created_at: String,
}

impl ConversationRow {
    fn from_row(row: &Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            participant_a: row.get("participant_a")?,
            participant_b: row.get("participant_b")?,
            context_type: row.get("context_type")?,
            context_id: row.get("context_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Order an unordered participant pair into the stored (a, b) form.
pub fn canonical_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

fn lookup(
    conn: &Connection,
    first: &str,
    second: &str,
    context_type: &str,
    context_id: Option<&str>,
) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM conversations
         WHERE participant_a = ?1 AND participant_b = ?2 AND context_type = ?3
           AND IFNULL(context_id, '') = IFNULL(?4, '')",
        params![first, second, context_type, context_id],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Get or create the conversation for a participant pair and context.
///
/// Idempotent for both argument orders; concurrent first-contact attempts
/// from both directions resolve to one row.
pub fn get_or_create(
    conn: &Connection,
    user_x: &str,
    user_y: &str,
    context_type: &str,
    context_id: Option<&str>,
) -> Result<String> {
    if user_x == user_y {
        return Err(AtelierError::Invalid(
            "Cannot start a conversation with yourself".into(),
        ));
    }
    if !CONTEXT_TYPES.contains(&context_type) {
        return Err(AtelierError::Invalid(format!(
            "Unknown context type: {}",
            context_type
        )));
    }

    let (first, second) = canonical_pair(user_x, user_y);
    let id = uuid::Uuid::new_v4().to_string();

    let insert = conn.execute(
        "INSERT INTO conversations (id, participant_a, participant_b, context_type, context_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, first, second, context_type, context_id, now_rfc3339()],
    );

    match insert {
        Ok(_) => Ok(id),
        Err(ref e) if is_unique_violation(e) => {
            lookup(conn, first, second, context_type, context_id)?.ok_or_else(|| {
                AtelierError::Internal(
                    "Conversation insert conflicted but lookup found nothing".into(),
                )
            })
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    conn.query_row(
        "SELECT * FROM conversations WHERE id = ?1",
        params![id],
        ConversationRow::from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// All conversations the account participates in, newest first.
pub fn list_for_account(conn: &Connection, account_id: &str) -> Result<Vec<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM conversations
         WHERE participant_a = ?1 OR participant_b = ?1
         ORDER BY created_at DESC",
    )?;
    let rows = stmt
        .query_map(params![account_id], ConversationRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl ConversationRow {
    pub fn is_participant(&self, account_id: &str) -> bool {
        self.participant_a == account_id || self.participant_b == account_id
    }

    /// The participant that is not the given account.
    pub fn other_participant(&self, account_id: &str) -> &str {
        if self.participant_a == account_id {
            &self.participant_b
        } else {
            &self.participant_a
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{accounts, profiles, Db};

    fn seed_pair(db: &Db) {
        db.with_conn(|conn| {
            for (id, email, name) in [
                ("acct-a", "a@example.com", "ada"),
                ("acct-b", "b@example.com", "ben"),
            ] {
                accounts::create_account(conn, id, email, "hash")?;
                profiles::create_profile(conn, id, Some(name))?;
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_get_or_create_is_order_insensitive() {
        let db = Db::open_in_memory().unwrap();
        seed_pair(&db);

        let (ab, ba) = db
            .with_conn(|conn| {
                let ab = get_or_create(conn, "acct-a", "acct-b", "profile", None)?;
                let ba = get_or_create(conn, "acct-b", "acct-a", "profile", None)?;
                Ok((ab, ba))
            })
            .unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_distinct_contexts_get_distinct_rows() {
        let db = Db::open_in_memory().unwrap();
        seed_pair(&db);

        db.with_conn(|conn| {
            let plain = get_or_create(conn, "acct-a", "acct-b", "profile", None)?;
            let about = get_or_create(conn, "acct-a", "acct-b", "process", Some("proc-1"))?;
            assert_ne!(plain, about);

            // The null-context row is itself unique
            let plain_again = get_or_create(conn, "acct-b", "acct-a", "profile", None)?;
            assert_eq!(plain, plain_again);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_self_conversation_rejected() {
        let db = Db::open_in_memory().unwrap();
        seed_pair(&db);
        let err = db
            .with_conn(|conn| get_or_create(conn, "acct-a", "acct-a", "profile", None))
            .unwrap_err();
        assert!(matches!(err, AtelierError::Invalid(_)));
    }
}
