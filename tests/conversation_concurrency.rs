//! Integration tests for conversation identity under concurrent use
//!
//! Two participants initiating the same conversation from both ends must
//! end up sharing a single row, whichever order the writes land in.

use std::sync::Arc;
use std::thread;

use atelier::db::{accounts, conversations, messages, profiles, Db};

fn seeded_db() -> Db {
    let db = Db::open_in_memory().unwrap();
    db.with_conn(|conn| {
        for (id, identifier) in [("alice", "alice@example.com"), ("bob", "bob@example.com")] {
            accounts::create_account(conn, id, identifier, "hash")?;
            profiles::create_profile(conn, id, Some(id))?;
        }
        Ok(())
    })
    .unwrap();
    db
}

#[test]
fn double_initiation_resolves_to_one_row() {
    let db = Arc::new(seeded_db());

    let handles: Vec<_> = [("alice", "bob"), ("bob", "alice")]
        .into_iter()
        .map(|(from, to)| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                db.with_conn(|conn| {
                    conversations::get_or_create(conn, from, to, "profile", None)
                })
                .unwrap()
            })
        })
        .collect();

    let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids[0], ids[1]);

    let count: i64 = db
        .with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
                .map_err(Into::into)
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn distinct_contexts_stay_separate() {
    let db = seeded_db();

    let (general, about_process) = db
        .with_conn(|conn| {
            let general = conversations::get_or_create(conn, "alice", "bob", "profile", None)?;
            let about_process =
                conversations::get_or_create(conn, "alice", "bob", "process", Some("p1"))?;
            Ok((general, about_process))
        })
        .unwrap();

    assert_ne!(general, about_process);
}

#[test]
fn participants_exchange_messages_in_order() {
    let db = seeded_db();

    let conversation_id = db
        .with_conn(|conn| conversations::get_or_create(conn, "bob", "alice", "profile", None))
        .unwrap();

    db.with_conn(|conn| {
        messages::append(conn, &conversation_id, "alice", "still working on the bridge section")?;
        messages::append(conn, &conversation_id, "bob", "send a rough cut?")?;
        Ok(())
    })
    .unwrap();

    let history = db
        .with_conn(|conn| messages::list_for_conversation(conn, &conversation_id))
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_id, "alice");
    assert_eq!(history[1].sender_id, "bob");

    let conversation = db
        .with_conn(|conn| conversations::get_conversation(conn, &conversation_id))
        .unwrap()
        .unwrap();
    assert!(conversation.is_participant("alice"));
    assert!(conversation.is_participant("bob"));
    assert!(!conversation.is_participant("mallory"));
    assert_eq!(conversation.other_participant("alice"), "bob");
}
