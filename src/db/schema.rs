//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::{AtelierError, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| AtelierError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| AtelierError::Database(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [version],
    )
    .map_err(|e| AtelierError::Database(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(IDENTITY_SCHEMA)
        .map_err(|e| AtelierError::Database(format!("Failed to create identity tables: {}", e)))?;
    conn.execute_batch(CONTENT_SCHEMA)
        .map_err(|e| AtelierError::Database(format!("Failed to create content tables: {}", e)))?;
    conn.execute_batch(MESSAGING_SCHEMA)
        .map_err(|e| AtelierError::Database(format!("Failed to create messaging tables: {}", e)))?;
    conn.execute_batch(SOCIAL_SCHEMA)
        .map_err(|e| AtelierError::Database(format!("Failed to create social tables: {}", e)))?;
    conn.execute_batch(COPROCESS_SCHEMA)
        .map_err(|e| AtelierError::Database(format!("Failed to create co-process tables: {}", e)))?;
    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| AtelierError::Database(format!("Failed to create indexes: {}", e)))?;
    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    // Add migration steps here as schema evolves
    match from_version {
        _ => {}
    }
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Accounts and profiles
///
/// `accounts.joined_at` is immutable after signup and drives observer mode;
/// `is_flagged` is the moderation override.
const IDENTITY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY NOT NULL,
    identifier TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_flagged INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    joined_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    username TEXT UNIQUE,
    full_name TEXT,
    bio TEXT,
    disciplines TEXT NOT NULL DEFAULT '[]',
    current_state TEXT NOT NULL DEFAULT 'Resting',
    avatar_url TEXT,
    plan TEXT NOT NULL DEFAULT 'free',
    stripe_customer_id TEXT,
    updated_at TEXT NOT NULL
);
"#;

/// Processes and the rows that hang off them
const CONTENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS processes (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    title TEXT NOT NULL DEFAULT '',
    description TEXT,
    phase TEXT NOT NULL DEFAULT 'Idea',
    visibility TEXT NOT NULL DEFAULT 'public',
    status TEXT NOT NULL DEFAULT 'draft',
    media_url TEXT,
    media_type TEXT,
    reflection_question TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS resonances (
    id TEXT PRIMARY KEY NOT NULL,
    process_id TEXT NOT NULL REFERENCES processes(id) ON DELETE CASCADE,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    block_index INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS feedback (
    id TEXT PRIMARY KEY NOT NULL,
    process_id TEXT NOT NULL REFERENCES processes(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    content TEXT NOT NULL,
    parent_id TEXT REFERENCES feedback(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS mentor_notes (
    process_id TEXT PRIMARY KEY NOT NULL REFERENCES processes(id) ON DELETE CASCADE,
    summary TEXT NOT NULL,
    questions TEXT NOT NULL,
    exercise TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Conversations and messages
///
/// participant_a < participant_b always (canonicalized before any read or
/// write); the unique index below is what makes get-or-create race-safe.
const MESSAGING_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY NOT NULL,
    participant_a TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    participant_b TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    context_type TEXT NOT NULL,
    context_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY NOT NULL,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    sender_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

const SOCIAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS follows (
    follower_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    followed_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (follower_id, followed_id)
);

CREATE TABLE IF NOT EXISTS blocks (
    blocker_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    blocked_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (blocker_id, blocked_id)
);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY NOT NULL,
    reporter_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL,
    target_type TEXT NOT NULL,
    reason TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

const COPROCESS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS co_processes (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS co_process_members (
    co_process_id TEXT NOT NULL REFERENCES co_processes(id) ON DELETE CASCADE,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    role TEXT NOT NULL DEFAULT 'member',
    joined_at TEXT NOT NULL,
    PRIMARY KEY (co_process_id, account_id)
);

CREATE TABLE IF NOT EXISTS co_process_entries (
    id TEXT PRIMARY KEY NOT NULL,
    co_process_id TEXT NOT NULL REFERENCES co_processes(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    media_url TEXT,
    media_type TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS co_process_feedback (
    id TEXT PRIMARY KEY NOT NULL,
    entry_id TEXT NOT NULL REFERENCES co_process_entries(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    content TEXT,
    created_at TEXT NOT NULL
);
"#;

/// SQLite treats NULLs in a UNIQUE constraint as distinct, so the nullable
/// resonance block index and conversation context id go through IFNULL with
/// values outside their legal domains (block indexes are >= 0, context ids
/// are UUIDs).
const INDEXES_SCHEMA: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS resonances_unique
    ON resonances(process_id, account_id, IFNULL(block_index, -1));

CREATE UNIQUE INDEX IF NOT EXISTS conversations_unique
    ON conversations(participant_a, participant_b, context_type, IFNULL(context_id, ''));

CREATE INDEX IF NOT EXISTS processes_feed
    ON processes(status, visibility, created_at);

CREATE INDEX IF NOT EXISTS messages_by_conversation
    ON messages(conversation_id, created_at);

CREATE INDEX IF NOT EXISTS feedback_by_process
    ON feedback(process_id, created_at);
"#;
