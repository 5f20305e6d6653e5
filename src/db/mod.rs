//! SQLite database module
//!
//! All persisted state lives here: accounts, profiles, processes,
//! resonances, conversations, messages, feedback, the social graph,
//! cached mentor notes, and co-processes.
//!
//! The application relies on the store for transaction isolation and for
//! the two uniqueness constraints that make the conversation get-or-create
//! and the resonance toggle safe under concurrent use. There is no
//! client-side locking anywhere above this layer.

pub mod accounts;
pub mod conversations;
pub mod coprocess;
pub mod feedback;
pub mod mentor_notes;
pub mod messages;
pub mod processes;
pub mod profiles;
pub mod resonances;
pub mod schema;
pub mod social;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{AtelierError, Result};

/// SQLite database handle
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)
            .map_err(|e| AtelierError::Database(format!("Failed to open SQLite: {}", e)))?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| AtelierError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| AtelierError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| AtelierError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| schema::init_schema(conn))
    }

    /// Run a closure with exclusive access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AtelierError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }
}

/// True when the error is the store's uniqueness-violation signal.
///
/// Two call sites recover from it by re-reading (conversation
/// get-or-create, resonance toggle); the identifier, username, follow,
/// and co-process membership inserts surface it as a Conflict instead.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Current timestamp as an RFC 3339 string, the format every table stores.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = Db::open(&dir.path().join("atelier.db")).unwrap();
        // Schema init is idempotent across re-opens
        drop(db);
        Db::open(&dir.path().join("atelier.db")).unwrap();
    }

    #[test]
    fn test_open_in_memory() {
        let db = Db::open_in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
                    .map_err(Into::into)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
