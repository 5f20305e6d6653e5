//! Resonance rows and the toggle
//!
//! A resonance is a presence/absence row keyed by (process, account,
//! optional block index). The toggle is an existence flip; under a
//! concurrent double-toggle the store's unique index makes the second
//! insert fail, and that failure converges to "already resonated".

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::{is_unique_violation, now_rfc3339};
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct ToggleOutcome {
    pub has_resonated: bool,
}

/// Aggregated resonance status for one process, from the viewer's side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResonanceStatus {
    pub general: SlotStatus,
    pub blocks: HashMap<i64, SlotStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SlotStatus {
    pub has_resonated: bool,
    pub count: i64,
}

fn find_existing(
    conn: &Connection,
    process_id: &str,
    account_id: &str,
    block_index: Option<i64>,
) -> Result<Option<String>> {
    // NULL block matches NULL exactly, not "any block"
    conn.query_row(
        "SELECT id FROM resonances
         WHERE process_id = ?1 AND account_id = ?2
           AND IFNULL(block_index, -1) = IFNULL(?3, -1)",
        params![process_id, account_id, block_index],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Flip the resonance row for (process, account, block slot).
pub fn toggle(
    conn: &Connection,
    process_id: &str,
    account_id: &str,
    block_index: Option<i64>,
) -> Result<ToggleOutcome> {
    if let Some(existing_id) = find_existing(conn, process_id, account_id, block_index)? {
        conn.execute("DELETE FROM resonances WHERE id = ?1", params![existing_id])?;
        return Ok(ToggleOutcome {
            has_resonated: false,
        });
    }

    let insert = conn.execute(
        "INSERT INTO resonances (id, process_id, account_id, block_index, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            uuid::Uuid::new_v4().to_string(),
            process_id,
            account_id,
            block_index,
            now_rfc3339()
        ],
    );

    match insert {
        Ok(_) => Ok(ToggleOutcome { has_resonated: true }),
        // Someone (or a second request from the same account) inserted
        // between our check and insert; converge rather than error.
        Err(ref e) if is_unique_violation(e) => Ok(ToggleOutcome { has_resonated: true }),
        Err(e) => Err(e.into()),
    }
}

/// All resonances for a process, grouped into the whole-process slot and
/// per-block slots, with the viewer's own flags.
pub fn status(
    conn: &Connection,
    process_id: &str,
    viewer_id: Option<&str>,
) -> Result<ResonanceStatus> {
    let mut stmt = conn.prepare(
        "SELECT account_id, block_index FROM resonances WHERE process_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![process_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut out = ResonanceStatus::default();
    for (account_id, block_index) in rows {
        let is_me = viewer_id == Some(account_id.as_str());
        let slot = match block_index {
            None => &mut out.general,
            Some(idx) => out.blocks.entry(idx).or_default(),
        };
        slot.count += 1;
        if is_me {
            slot.has_resonated = true;
        }
    }
    Ok(out)
}

/// Resonance counts per process for a batch of feed rows.
pub fn counts_for(
    conn: &Connection,
    process_ids: &[String],
    viewer_id: Option<&str>,
) -> Result<HashMap<String, (i64, bool)>> {
    let mut out: HashMap<String, (i64, bool)> = HashMap::new();
    if process_ids.is_empty() {
        return Ok(out);
    }

    let placeholders = (0..process_ids.len())
        .map(|i| format!("?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT process_id, account_id FROM resonances WHERE process_id IN ({})",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::ToSql> =
        process_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
    let rows = stmt
        .query_map(params_ref.as_slice(), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (process_id, account_id) in rows {
        let entry = out.entry(process_id).or_insert((0, false));
        entry.0 += 1;
        if viewer_id == Some(account_id.as_str()) {
            entry.1 = true;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{accounts, processes, Db};

    fn seed(db: &Db) -> (String, String) {
        db.with_conn(|conn| {
            accounts::create_account(conn, "acct-1", "a@example.com", "hash")?;
            crate::db::profiles::create_profile(conn, "acct-1", Some("a"))?;
            let draft = processes::create_draft(conn, "acct-1")?;
            Ok(("acct-1".to_string(), draft.id))
        })
        .unwrap()
    }

    #[test]
    fn test_toggle_round_trip() {
        let db = Db::open_in_memory().unwrap();
        let (account, process) = seed(&db);

        db.with_conn(|conn| {
            let first = toggle(conn, &process, &account, None)?;
            assert!(first.has_resonated);
            let second = toggle(conn, &process, &account, None)?;
            assert!(!second.has_resonated);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_block_and_general_are_independent() {
        let db = Db::open_in_memory().unwrap();
        let (account, process) = seed(&db);

        db.with_conn(|conn| {
            assert!(toggle(conn, &process, &account, Some(0))?.has_resonated);
            assert!(toggle(conn, &process, &account, None)?.has_resonated);

            let status = status(conn, &process, Some(&account))?;
            assert_eq!(status.general.count, 1);
            assert!(status.general.has_resonated);
            assert_eq!(status.blocks[&0].count, 1);

            // Toggling the block slot off leaves the general slot alone
            assert!(!toggle(conn, &process, &account, Some(0))?.has_resonated);
            let status = super::status(conn, &process, Some(&account))?;
            assert_eq!(status.general.count, 1);
            assert!(status.blocks.get(&0).is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_insert_converges() {
        let db = Db::open_in_memory().unwrap();
        let (account, process) = seed(&db);

        db.with_conn(|conn| {
            // Simulate the lost race: the row appears between the existence
            // check and the insert. A direct duplicate insert must fail on
            // the unique index, and toggle must report converged state.
            conn.execute(
                "INSERT INTO resonances (id, process_id, account_id, block_index, created_at)
                 VALUES ('r-1', ?1, ?2, NULL, '2026-01-01T00:00:00Z')",
                params![process, account],
            )?;
            let dup = conn.execute(
                "INSERT INTO resonances (id, process_id, account_id, block_index, created_at)
                 VALUES ('r-2', ?1, ?2, NULL, '2026-01-01T00:00:00Z')",
                params![process, account],
            );
            assert!(matches!(dup, Err(ref e) if is_unique_violation(e)));
            Ok(())
        })
        .unwrap();
    }
}
